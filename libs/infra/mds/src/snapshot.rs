use std::collections::HashMap;

use chrono::{DateTime, Utc};
use passkey_domain_models::{MdsBlob, MdsDeviceRecord};
use serde_json::Value;

use crate::errors::MdsError;

/// An immutable, fully-indexed view of a verified MDS payload. Refreshers
/// build a new snapshot off to the side and atomically swap it in; readers
/// never block on a refresh in progress.
pub struct MdsSnapshot {
    payload: Value,
    last_updated: DateTime<Utc>,
    next_update: Option<DateTime<Utc>>,
    blob_number: Option<i64>,
    aaguid_index: HashMap<String, usize>,
}

impl MdsSnapshot {
    pub fn from_payload(payload: Value, last_updated: DateTime<Utc>) -> Result<Self, MdsError> {
        let entries = payload
            .get("entries")
            .and_then(Value::as_array)
            .ok_or_else(|| MdsError::MalformedPayload("missing entries array".to_string()))?;

        if entries.is_empty() {
            return Err(MdsError::EmptyEntries);
        }

        let mut aaguid_index = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            if let Some(aaguid) = entry.get("aaguid").and_then(Value::as_str) {
                aaguid_index.insert(aaguid.to_lowercase(), index);
            }
        }

        let next_update = payload
            .get("nextUpdate")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let blob_number = payload.get("no").and_then(Value::as_i64);

        Ok(Self {
            payload,
            last_updated,
            next_update,
            blob_number,
            aaguid_index,
        })
    }

    pub fn into_blob(self) -> MdsBlob {
        MdsBlob {
            payload: self.payload,
            last_updated: self.last_updated,
            next_update: self.next_update,
            blob_number: self.blob_number,
        }
    }

    pub fn to_blob(&self) -> MdsBlob {
        MdsBlob {
            payload: self.payload.clone(),
            last_updated: self.last_updated,
            next_update: self.next_update,
            blob_number: self.blob_number,
        }
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn lookup(&self, aaguid: &str) -> Option<MdsDeviceRecord> {
        let index = *self.aaguid_index.get(&aaguid.to_lowercase())?;
        let entries = self.payload.get("entries")?.as_array()?;
        let entry = entries.get(index)?;

        let statement = entry.get("metadataStatement");
        let description = statement
            .and_then(|s| s.get("description"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let certification_level = entry
            .get("statusReports")
            .and_then(Value::as_array)
            .and_then(|reports| reports.first())
            .and_then(|report| report.get("status"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let is_fido2_certified = certification_level
            .as_deref()
            .map(|level| level.starts_with("FIDO_CERTIFIED"));

        let is_hardware_backed = statement
            .and_then(|s| s.get("keyProtection"))
            .and_then(Value::as_array)
            .map(|protections| {
                protections.iter().any(|p| {
                    matches!(
                        p.as_str(),
                        Some("hardware") | Some("secure_element") | Some("tee")
                    )
                })
            });

        Some(MdsDeviceRecord {
            name: description.clone().unwrap_or_else(|| "Unknown Authenticator".to_string()),
            description,
            is_fido2_certified,
            certification_level,
            is_hardware_backed,
        })
    }
}
