use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The most recently persisted, successfully-parsed FIDO MDS payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MdsBlob {
    pub payload: serde_json::Value,
    pub last_updated: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
    pub blob_number: Option<i64>,
}

/// A single authenticator-metadata record resolved from the cache, the
/// static fallback table, or the "unknown" default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MdsDeviceRecord {
    pub name: String,
    pub description: Option<String>,
    pub is_fido2_certified: Option<bool>,
    pub certification_level: Option<String>,
    pub is_hardware_backed: Option<bool>,
}

impl MdsDeviceRecord {
    pub fn unknown() -> Self {
        Self {
            name: "Unknown Authenticator".to_string(),
            ..Default::default()
        }
    }
}
