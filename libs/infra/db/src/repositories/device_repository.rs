// [libs/infra/db/src/repositories/device_repository.rs]
/*!
 * =================================================================
 * APARATO: DEVICE REGISTRY REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CICLO DE VIDA DE DISPOSITIVOS PASSKEY
 *
 * Traduce el tipo de dominio `DeviceState` a las columnas planas
 * `state` / `proposal_hash` / `proposal_tx_hash`, y aplica la
 * transición atómica de activación como una única transacción.
 * =================================================================
 */

use chrono::Utc;
use libsql::params;
use passkey_domain_models::{AttestationMetadata, Device, DeviceState, MdsDeviceMetadata};
use tracing::{debug, instrument, warn};

use crate::client::TursoClient;
use crate::errors::DbError;

#[derive(Clone)]
pub struct DeviceRepository {
    client: TursoClient,
}

impl DeviceRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { client }
    }

    /// Inserts a new device row. If the account already has an active
    /// device, the new row is inserted `pending` regardless of caller
    /// intent; otherwise it becomes the account's active device. Existing
    /// pending rows for the account are left untouched.
    #[instrument(skip(self, public_key_x, public_key_y, attestation_object, client_data_json))]
    pub async fn add_device(
        &self,
        account_address: &str,
        device_id: &str,
        device_name: &str,
        device_type: &str,
        credential_id: &str,
        raw_id: &str,
        public_key_x: &str,
        public_key_y: &str,
        attestation_object: Option<&str>,
        client_data_json: Option<&str>,
        proposal_hash: Option<&str>,
        proposal_tx_hash: Option<&str>,
        attestation_metadata: &AttestationMetadata,
    ) -> Result<Device, DbError> {
        let account_address = account_address.to_lowercase();
        let connection = self.client.get_connection()?;

        let has_active: i64 = connection
            .query(
                "SELECT COUNT(*) FROM devices WHERE account_address = ?1 AND state = 'active'",
                params![account_address.clone()],
            )
            .await?
            .next()
            .await?
            .map(|row| row.get::<i64>(0))
            .transpose()?
            .unwrap_or(0);

        let (state_column, proposal_hash_column, proposal_tx_hash_column) = if has_active > 0 {
            ("pending", proposal_hash, proposal_tx_hash)
        } else {
            ("active", None, None)
        };

        let now = Utc::now();
        let attestation_json = serde_json::to_string(attestation_metadata)
            .map_err(|e| DbError::MappingError(e.to_string()))?;

        let insert_result = connection
            .execute(
                r#"
                INSERT INTO devices (
                    device_id, account_address, device_name, device_type,
                    credential_id, raw_id, public_key_x, public_key_y,
                    attestation_object, client_data_json,
                    state, proposal_hash, proposal_tx_hash,
                    attestation_metadata, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)
                "#,
                params![
                    device_id,
                    account_address.clone(),
                    device_name,
                    device_type,
                    credential_id,
                    raw_id,
                    public_key_x,
                    public_key_y,
                    attestation_object,
                    client_data_json,
                    state_column,
                    proposal_hash_column,
                    proposal_tx_hash_column,
                    attestation_json,
                    now.to_rfc3339(),
                ],
            )
            .await;

        if let Err(e) = insert_result {
            let message = e.to_string();
            if message.contains("UNIQUE") {
                return Err(DbError::DeviceConflict(format!("{account_address}/{device_id}")));
            }
            return Err(DbError::QueryError(e));
        }

        self.get_device_by_id(&account_address, device_id)
            .await?
            .ok_or(DbError::DeviceNotFound)
    }

    /// Attaches on-chain proposal identifiers to a previously created
    /// pending device. Fails with `DeviceNotFound` if no row matches.
    #[instrument(skip(self))]
    pub async fn update_device_proposal_hash(
        &self,
        account_address: &str,
        device_id: &str,
        proposal_hash: &str,
        proposal_tx_hash: Option<&str>,
    ) -> Result<(), DbError> {
        let account_address = account_address.to_lowercase();
        let connection = self.client.get_connection()?;

        let rows_affected = connection
            .execute(
                r#"
                UPDATE devices
                SET proposal_hash = ?1, proposal_tx_hash = ?2, updated_at = ?3
                WHERE account_address = ?4 AND device_id = ?5
                "#,
                params![
                    proposal_hash,
                    proposal_tx_hash,
                    Utc::now().to_rfc3339(),
                    account_address.clone(),
                    device_id,
                ],
            )
            .await?;

        if rows_affected == 0 {
            return Err(self.diagnose_device_failure(&account_address, device_id).await);
        }
        Ok(())
    }

    /// Deactivates every active device of `account`, then activates the
    /// unique device whose `public_key_x` matches `new_public_key_x`, as a
    /// single transaction. Never leaves the account with zero or two
    /// active devices.
    #[instrument(skip(self, new_public_key_x))]
    pub async fn activate_device(&self, account_address: &str, new_public_key_x: &str) -> Result<(), DbError> {
        let account_address = account_address.to_lowercase();
        let mut connection = self.client.get_connection()?;
        let transaction = connection
            .transaction()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;

        let now = Utc::now().to_rfc3339();

        transaction
            .execute(
                "UPDATE devices SET state = 'retired', updated_at = ?1 WHERE account_address = ?2 AND state = 'active'",
                params![now.clone(), account_address.clone()],
            )
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;

        let activated = transaction
            .execute(
                "UPDATE devices SET state = 'active', proposal_hash = NULL, proposal_tx_hash = NULL, updated_at = ?1 WHERE account_address = ?2 AND public_key_x = ?3",
                params![now, account_address.clone(), new_public_key_x],
            )
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;

        // `(account, public_key_x)` is expected unique; a count other than
        // exactly 1 (zero, or more than one under ambiguity) aborts rather
        // than risk activating the wrong device.
        if activated != 1 {
            warn!(
                "activation aborted: {} devices matched public_key_x={}",
                activated, new_public_key_x
            );
            transaction
                .rollback()
                .await
                .map_err(|e| DbError::TransactionError(e.to_string()))?;
            return Err(DbError::DeviceNotFound);
        }

        transaction
            .commit()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;
        debug!("device activated for account {}", account_address);
        Ok(())
    }

    /// Returns every device for the account, most-recently-active first.
    #[instrument(skip(self))]
    pub async fn get_devices(&self, account_address: &str) -> Result<Vec<Device>, DbError> {
        let account_address = account_address.to_lowercase();
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT device_id, account_address, device_name, device_type, credential_id,
                       raw_id, public_key_x, public_key_y, attestation_object, client_data_json,
                       state, proposal_hash, proposal_tx_hash, attestation_metadata, mds_metadata,
                       created_at, updated_at, last_used_at
                FROM devices
                WHERE account_address = ?1
                ORDER BY (state = 'active') DESC, created_at DESC
                "#,
                params![account_address],
            )
            .await?;

        let mut devices = Vec::new();
        while let Some(row) = rows.next().await? {
            devices.push(row_to_device(&row)?);
        }
        Ok(devices)
    }

    #[instrument(skip(self))]
    pub async fn get_device_by_credential_id(
        &self,
        account_address: &str,
        credential_id: &str,
    ) -> Result<Option<Device>, DbError> {
        let account_address = account_address.to_lowercase();
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT device_id, account_address, device_name, device_type, credential_id,
                       raw_id, public_key_x, public_key_y, attestation_object, client_data_json,
                       state, proposal_hash, proposal_tx_hash, attestation_metadata, mds_metadata,
                       created_at, updated_at, last_used_at
                FROM devices
                WHERE account_address = ?1 AND credential_id = ?2
                "#,
                params![account_address, credential_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_device(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn update_device_last_used(&self, account_address: &str, device_id: &str) -> Result<(), DbError> {
        let account_address = account_address.to_lowercase();
        let connection = self.client.get_connection()?;
        let rows_affected = connection
            .execute(
                "UPDATE devices SET last_used_at = ?1 WHERE account_address = ?2 AND device_id = ?3",
                params![Utc::now().to_rfc3339(), account_address.clone(), device_id],
            )
            .await?;

        if rows_affected == 0 {
            return Err(self.diagnose_device_failure(&account_address, device_id).await);
        }
        Ok(())
    }

    /// Total device row count irrespective of lifecycle state, for the
    /// admin stats endpoint.
    #[instrument(skip(self))]
    pub async fn count_all(&self) -> Result<i64, DbError> {
        let connection = self.client.get_connection()?;
        let count = connection
            .query("SELECT COUNT(*) FROM devices", params![])
            .await?
            .next()
            .await?
            .map(|row| row.get::<i64>(0))
            .transpose()?
            .unwrap_or(0);
        Ok(count)
    }

    /// Earliest and latest `created_at` across all devices, for the admin
    /// stats endpoint. `None` for both when the table is empty.
    #[instrument(skip(self))]
    pub async fn oldest_and_newest(&self) -> Result<(Option<chrono::DateTime<Utc>>, Option<chrono::DateTime<Utc>>), DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query("SELECT MIN(created_at), MAX(created_at) FROM devices", params![])
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok((None, None));
        };
        let oldest: Option<String> = row.get(0).map_err(|e| DbError::MappingError(e.to_string()))?;
        let newest: Option<String> = row.get(1).map_err(|e| DbError::MappingError(e.to_string()))?;
        Ok((
            oldest.map(parse_timestamp).transpose()?,
            newest.map(parse_timestamp).transpose()?,
        ))
    }

    /// Hard delete. Returns whether a row was removed.
    #[instrument(skip(self))]
    pub async fn remove_device(&self, account_address: &str, device_id: &str) -> Result<bool, DbError> {
        let account_address = account_address.to_lowercase();
        let connection = self.client.get_connection()?;
        let rows_affected = connection
            .execute(
                "DELETE FROM devices WHERE account_address = ?1 AND device_id = ?2",
                params![account_address, device_id],
            )
            .await?;
        Ok(rows_affected > 0)
    }

    /// Attaches a freshly resolved MDS record to a device row, keyed by
    /// aaguid match against the device's attestation metadata, and the
    /// `authenticatorName` that resolution produced (whether from a real
    /// MDS entry or the static fallback table). Called from the Device
    /// Registry after a successful MDS Cache lookup, so that a subsequent
    /// read — which skips re-resolution once `mds_metadata` is no longer
    /// default — still has the resolved name persisted.
    #[instrument(skip(self, mds_metadata, attestation_metadata))]
    pub async fn update_device_mds_metadata(
        &self,
        account_address: &str,
        device_id: &str,
        mds_metadata: &MdsDeviceMetadata,
        attestation_metadata: &AttestationMetadata,
    ) -> Result<(), DbError> {
        let account_address = account_address.to_lowercase();
        let connection = self.client.get_connection()?;
        let mds_json = serde_json::to_string(mds_metadata).map_err(|e| DbError::MappingError(e.to_string()))?;
        let attestation_json =
            serde_json::to_string(attestation_metadata).map_err(|e| DbError::MappingError(e.to_string()))?;
        connection
            .execute(
                "UPDATE devices SET mds_metadata = ?1, attestation_metadata = ?2 WHERE account_address = ?3 AND device_id = ?4",
                params![mds_json, attestation_json, account_address, device_id],
            )
            .await?;
        Ok(())
    }

    async fn get_device_by_id(&self, account_address: &str, device_id: &str) -> Result<Option<Device>, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT device_id, account_address, device_name, device_type, credential_id,
                       raw_id, public_key_x, public_key_y, attestation_object, client_data_json,
                       state, proposal_hash, proposal_tx_hash, attestation_metadata, mds_metadata,
                       created_at, updated_at, last_used_at
                FROM devices
                WHERE account_address = ?1 AND device_id = ?2
                "#,
                params![account_address, device_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_device(&row)?)),
            None => Ok(None),
        }
    }

    /// Distinguishes "no such account/device at all" from other states an
    /// UPDATE's zero-rows-affected result could mean, following the
    /// diagnose-on-zero pattern used across the repository layer.
    async fn diagnose_device_failure(&self, account_address: &str, device_id: &str) -> DbError {
        match self.get_device_by_id(account_address, device_id).await {
            Ok(Some(_)) => DbError::InvalidState(format!("device {device_id} present but update rejected")),
            Ok(None) => DbError::DeviceNotFound,
            Err(e) => e,
        }
    }
}

fn row_to_device(row: &libsql::Row) -> Result<Device, DbError> {
    let state_raw: String = row.get(10).map_err(|e| DbError::MappingError(e.to_string()))?;
    let proposal_hash: Option<String> = row.get(11).map_err(|e| DbError::MappingError(e.to_string()))?;
    let proposal_tx_hash: Option<String> = row.get(12).map_err(|e| DbError::MappingError(e.to_string()))?;

    let state = match (state_raw.as_str(), proposal_hash) {
        ("active", _) => DeviceState::Active,
        ("pending", Some(proposal_hash)) => DeviceState::Pending { proposal_hash, proposal_tx_hash },
        ("pending", None) => DeviceState::Pending { proposal_hash: String::new(), proposal_tx_hash },
        _ => DeviceState::Retired,
    };

    let attestation_metadata_raw: Option<String> = row.get(13).map_err(|e| DbError::MappingError(e.to_string()))?;
    let attestation_metadata = attestation_metadata_raw
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default();

    let mds_metadata_raw: Option<String> = row.get(14).map_err(|e| DbError::MappingError(e.to_string()))?;
    let mds_metadata = mds_metadata_raw
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default();

    Ok(Device {
        device_id: row.get(0).map_err(|e| DbError::MappingError(e.to_string()))?,
        account_address: row.get(1).map_err(|e| DbError::MappingError(e.to_string()))?,
        device_name: row.get(2).map_err(|e| DbError::MappingError(e.to_string()))?,
        device_type: row.get(3).map_err(|e| DbError::MappingError(e.to_string()))?,
        credential_id: row.get(4).map_err(|e| DbError::MappingError(e.to_string()))?,
        raw_id: row.get(5).map_err(|e| DbError::MappingError(e.to_string()))?,
        public_key_x: row.get(6).map_err(|e| DbError::MappingError(e.to_string()))?,
        public_key_y: row.get(7).map_err(|e| DbError::MappingError(e.to_string()))?,
        attestation_object: row.get(8).map_err(|e| DbError::MappingError(e.to_string()))?,
        client_data_json: row.get(9).map_err(|e| DbError::MappingError(e.to_string()))?,
        state,
        attestation_metadata,
        mds_metadata,
        created_at: parse_timestamp(row.get::<String>(15).map_err(|e| DbError::MappingError(e.to_string()))?)?,
        updated_at: parse_timestamp(row.get::<String>(16).map_err(|e| DbError::MappingError(e.to_string()))?)?,
        last_used_at: row
            .get::<Option<String>>(17)
            .map_err(|e| DbError::MappingError(e.to_string()))?
            .map(parse_timestamp)
            .transpose()?,
    })
}

fn parse_timestamp(raw: String) -> Result<chrono::DateTime<Utc>, DbError> {
    chrono::DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::MappingError(format!("malformed timestamp '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repo() -> DeviceRepository {
        let client = TursoClient::connect(":memory:", None).await.unwrap();
        DeviceRepository::new(client)
    }

    #[tokio::test]
    async fn first_device_for_an_account_is_active_with_no_proposal() {
        let repo = repo().await;
        let device = repo
            .add_device(
                "0x1111111111111111111111111111111111111111",
                "dev-1",
                "Mac",
                "platform",
                "cred-1",
                "cmF3MQ==",
                "0xaa",
                "0xbb",
                None,
                None,
                None,
                None,
                &AttestationMetadata::default(),
            )
            .await
            .unwrap();

        assert_eq!(device.state, DeviceState::Active);
    }

    #[tokio::test]
    async fn second_device_during_timelock_is_pending_and_first_is_preserved() {
        let repo = repo().await;
        let account = "0x1111111111111111111111111111111111111111";
        repo.add_device(account, "dev-1", "Mac", "platform", "cred-1", "cmF3MQ==", "0xaa", "0xbb", None, None, None, None, &AttestationMetadata::default())
            .await
            .unwrap();
        repo.add_device(
            account,
            "dev-2",
            "Phone",
            "cross-platform",
            "cred-2",
            "cmF3Mg==",
            "0xcc",
            "0xdd",
            None,
            None,
            Some("0xdead"),
            None,
            &AttestationMetadata::default(),
        )
        .await
        .unwrap();

        let devices = repo.get_devices(account).await.unwrap();
        assert_eq!(devices.len(), 2);
        let dev2 = devices.iter().find(|d| d.device_id == "dev-2").unwrap();
        assert!(matches!(&dev2.state, DeviceState::Pending { proposal_hash, .. } if proposal_hash == "0xdead"));
        let dev1 = devices.iter().find(|d| d.device_id == "dev-1").unwrap();
        assert_eq!(dev1.state, DeviceState::Active);
    }

    #[tokio::test]
    async fn activation_retires_the_previous_active_device_without_deleting_rows() {
        let repo = repo().await;
        let account = "0x1111111111111111111111111111111111111111";
        repo.add_device(account, "dev-1", "Mac", "platform", "cred-1", "cmF3MQ==", "0xaa", "0xbb", None, None, None, None, &AttestationMetadata::default())
            .await
            .unwrap();
        repo.add_device(account, "dev-2", "Phone", "cross-platform", "cred-2", "cmF3Mg==", "0xcc", "0xdd", None, None, Some("0xdead"), None, &AttestationMetadata::default())
            .await
            .unwrap();

        repo.activate_device(account, "0xcc").await.unwrap();

        let devices = repo.get_devices(account).await.unwrap();
        assert_eq!(devices.len(), 2);
        let dev1 = devices.iter().find(|d| d.device_id == "dev-1").unwrap();
        assert_eq!(dev1.state, DeviceState::Retired);
        let dev2 = devices.iter().find(|d| d.device_id == "dev-2").unwrap();
        assert_eq!(dev2.state, DeviceState::Active);
    }

    #[tokio::test]
    async fn activation_of_unknown_public_key_leaves_prior_active_device_untouched() {
        let repo = repo().await;
        let account = "0x1111111111111111111111111111111111111111";
        repo.add_device(account, "dev-1", "Mac", "platform", "cred-1", "cmF3MQ==", "0xaa", "0xbb", None, None, None, None, &AttestationMetadata::default())
            .await
            .unwrap();

        let result = repo.activate_device(account, "0xdoes-not-exist").await;
        assert!(matches!(result, Err(DbError::DeviceNotFound)));

        let devices = repo.get_devices(account).await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].state, DeviceState::Active);
    }

    #[tokio::test]
    async fn re_registering_the_same_account_and_device_id_is_a_conflict() {
        let repo = repo().await;
        let account = "0x1111111111111111111111111111111111111111";
        repo.add_device(account, "dev-1", "Mac", "platform", "cred-1", "cmF3MQ==", "0xaa", "0xbb", None, None, None, None, &AttestationMetadata::default())
            .await
            .unwrap();

        let result = repo
            .add_device(account, "dev-1", "Mac 2", "platform", "cred-1b", "cmF3MWI=", "0xee", "0xff", None, None, None, None, &AttestationMetadata::default())
            .await;

        assert!(matches!(result, Err(DbError::DeviceConflict(_))));
    }

    #[tokio::test]
    async fn update_device_proposal_hash_attaches_on_chain_identifiers() {
        let repo = repo().await;
        let account = "0x1111111111111111111111111111111111111111";
        repo.add_device(account, "dev-1", "Mac", "platform", "cred-1", "cmF3MQ==", "0xaa", "0xbb", None, None, None, None, &AttestationMetadata::default())
            .await
            .unwrap();

        repo.update_device_proposal_hash(account, "dev-1", "0xdead", Some("0xtx")).await.unwrap();

        let device = repo.get_devices(account).await.unwrap().into_iter().next().unwrap();
        assert!(matches!(
            device.state,
            DeviceState::Pending { ref proposal_hash, ref proposal_tx_hash }
                if proposal_hash == "0xdead" && proposal_tx_hash.as_deref() == Some("0xtx")
        ));
    }

    #[tokio::test]
    async fn remove_device_reports_whether_a_row_was_deleted() {
        let repo = repo().await;
        let account = "0x1111111111111111111111111111111111111111";
        repo.add_device(account, "dev-1", "Mac", "platform", "cred-1", "cmF3MQ==", "0xaa", "0xbb", None, None, None, None, &AttestationMetadata::default())
            .await
            .unwrap();

        assert!(repo.remove_device(account, "dev-1").await.unwrap());
        assert!(!repo.remove_device(account, "dev-1").await.unwrap());
    }

    #[tokio::test]
    async fn count_all_and_oldest_newest_reflect_the_table() {
        let repo = repo().await;
        assert_eq!(repo.count_all().await.unwrap(), 0);
        let (oldest, newest) = repo.oldest_and_newest().await.unwrap();
        assert!(oldest.is_none() && newest.is_none());

        repo.add_device(
            "0x1111111111111111111111111111111111111111",
            "dev-1",
            "Mac",
            "platform",
            "cred-1",
            "cmF3MQ==",
            "0xaa",
            "0xbb",
            None,
            None,
            None,
            None,
            &AttestationMetadata::default(),
        )
        .await
        .unwrap();

        assert_eq!(repo.count_all().await.unwrap(), 1);
        let (oldest, newest) = repo.oldest_and_newest().await.unwrap();
        assert!(oldest.is_some() && newest.is_some());
    }
}
