use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The logical lifecycle state of a device, folded at the repository boundary
/// from the `(is_active, proposal_hash, proposal_tx_hash)` columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum DeviceState {
    Active,
    Pending {
        proposal_hash: String,
        proposal_tx_hash: Option<String>,
    },
    Retired,
}

impl DeviceState {
    pub fn is_active(&self) -> bool {
        matches!(self, DeviceState::Active)
    }

    pub fn proposal_hash(&self) -> Option<&str> {
        match self {
            DeviceState::Pending { proposal_hash, .. } => Some(proposal_hash.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationMetadata {
    pub aaguid: Option<String>,
    pub format: Option<String>,
    pub is_hardware_backed: bool,
    pub authenticator_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MdsDeviceMetadata {
    pub description: Option<String>,
    pub is_fido2_certified: Option<bool>,
    pub certification_level: Option<String>,
    pub mds_last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub account_address: String,
    pub device_id: String,
    pub device_name: String,
    pub device_type: String,
    pub credential_id: String,
    pub raw_id: String,
    pub public_key_x: String,
    pub public_key_y: String,
    pub attestation_object: Option<String>,
    pub client_data_json: Option<String>,
    pub state: DeviceState,
    pub attestation_metadata: AttestationMetadata,
    pub mds_metadata: MdsDeviceMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Device {
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}
