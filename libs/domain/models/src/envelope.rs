use serde::{Deserialize, Serialize};

/// The unverified wire shape of an authenticated request envelope, as
/// received from either a JSON body or query-string deserialization.
/// Verification (signature recovery, freshness, substring policy) happens
/// one layer up, where the crypto primitive is available.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEnvelope {
    pub account_address: String,
    pub owner_address: String,
    pub signature: String,
    pub message: String,
    pub timestamp: i64,
}
