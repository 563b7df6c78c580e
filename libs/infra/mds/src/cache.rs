use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use chrono::Utc;
use passkey_domain_models::{MdsBlob, MdsDeviceRecord};
use reqwest::Client;
use tracing::{info, instrument, warn};

use crate::errors::MdsError;
use crate::fallback;
use crate::snapshot::MdsSnapshot;
use crate::verifier::MdsSignatureVerifier;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Background subsystem providing AAGUID to authenticator-metadata lookups.
/// The in-memory snapshot is a single atomic-swap reference; readers never
/// take a lock, and a refresh in progress is invisible to them until the
/// swap completes.
pub struct MdsCache {
    current: ArcSwapOption<MdsSnapshot>,
    verifier: Box<dyn MdsSignatureVerifier>,
}

impl MdsCache {
    pub fn new(verifier: Box<dyn MdsSignatureVerifier>) -> Self {
        Self {
            current: ArcSwapOption::empty(),
            verifier,
        }
    }

    /// Seeds the in-memory cache from the most recently persisted blob at
    /// startup, before the refresh timer has had a chance to run.
    pub fn load_persisted(&self, blob: MdsBlob) -> Result<(), MdsError> {
        let snapshot = MdsSnapshot::from_payload(blob.payload, blob.last_updated)?;
        self.current.store(Some(Arc::new(snapshot)));
        Ok(())
    }

    pub fn lookup(&self, aaguid: &str) -> Option<MdsDeviceRecord> {
        self.current.load().as_ref().and_then(|s| s.lookup(aaguid))
    }

    pub fn lookup_with_fallback(&self, aaguid: &str) -> MdsDeviceRecord {
        if let Some(record) = self.lookup(aaguid) {
            return record;
        }
        if let Some(name) = fallback::lookup(aaguid) {
            return MdsDeviceRecord {
                name: name.to_string(),
                is_hardware_backed: Some(true),
                ..Default::default()
            };
        }
        MdsDeviceRecord::unknown()
    }

    pub fn last_updated(&self) -> Option<chrono::DateTime<Utc>> {
        self.current.load().as_ref().map(|s| s.last_updated())
    }

    /// Fetches the JWT-packaged MDS blob from `url`, verifies it via the
    /// configured hook, swaps it into the in-memory cache, and returns the
    /// blob for the caller to persist. On any failure the previous
    /// in-memory cache (if any) is left untouched and `Err` is returned —
    /// callers on the scheduler path must log and continue, never propagate.
    #[instrument(skip(self, url))]
    pub async fn fetch_and_refresh(&self, url: &str) -> Result<MdsBlob, MdsError> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(MdsError::FetchFailed)?;

        let jwt = client.get(url).send().await?.text().await?;
        let segments: Vec<&str> = jwt.trim().split('.').collect();
        if segments.len() != 3 {
            return Err(MdsError::MalformedJwt(segments.len()));
        }

        self.verifier.verify(segments[0], segments[1], segments[2])?;

        let payload_bytes = BASE64_URL
            .decode(segments[1])
            .map_err(|e| MdsError::MalformedPayload(e.to_string()))?;
        let payload: serde_json::Value = serde_json::from_slice(&payload_bytes)
            .map_err(|e| MdsError::MalformedPayload(e.to_string()))?;

        let now = Utc::now();
        let snapshot = Arc::new(MdsSnapshot::from_payload(payload, now)?);
        let blob = snapshot.to_blob();
        self.current.store(Some(snapshot));

        info!("MDS blob refreshed");
        Ok(blob)
    }
}

/// Logged when a refresh fails; callers keep the previous in-memory cache
/// and leave the persisted row untouched.
pub fn log_refresh_failure(error: &MdsError) {
    warn!("MDS refresh failed, retaining previous cache: {}", error);
}
