use crate::errors::MdsError;

/// Extension point for full JWT signature verification of the MDS blob.
/// spec.md defers the algorithm ("Phase 3"); the current trust boundary is
/// TLS to the fixed MDS host. A future implementation plugs in here without
/// touching the fetch/parse/cache pipeline.
pub trait MdsSignatureVerifier: Send + Sync {
    fn verify(&self, header_b64: &str, payload_b64: &str, signature_b64: &str) -> Result<(), MdsError>;
}

/// Default verifier: trusts the TLS channel to the fixed MDS host and
/// performs no cryptographic check of the JWT signature segment.
pub struct TrustTlsOnly;

impl MdsSignatureVerifier for TrustTlsOnly {
    fn verify(&self, _header_b64: &str, _payload_b64: &str, _signature_b64: &str) -> Result<(), MdsError> {
        Ok(())
    }
}
