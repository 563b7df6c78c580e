pub mod cache;
pub mod errors;
pub mod fallback;
pub mod snapshot;
pub mod verifier;

pub use cache::{log_refresh_failure, MdsCache};
pub use errors::MdsError;
pub use verifier::{MdsSignatureVerifier, TrustTlsOnly};

#[cfg(test)]
mod tests {
    use super::*;
    use passkey_domain_models::MdsBlob;
    use serde_json::json;

    fn sample_blob() -> MdsBlob {
        MdsBlob {
            payload: json!({
                "entries": [
                    {
                        "aaguid": "FBFC3007-154E-4ECC-8C0B-6E020557D7BD",
                        "metadataStatement": {
                            "description": "iCloud Keychain",
                            "keyProtection": ["hardware", "secure_element"]
                        },
                        "statusReports": [{"status": "FIDO_CERTIFIED_L1"}]
                    }
                ]
            }),
            last_updated: chrono::Utc::now(),
            next_update: None,
            blob_number: Some(1),
        }
    }

    #[test]
    fn lookup_is_case_insensitive_and_extracts_certification() {
        let cache = MdsCache::new(Box::new(TrustTlsOnly));
        cache.load_persisted(sample_blob()).unwrap();

        let record = cache
            .lookup("fbfc3007-154e-4ecc-8c0b-6e020557d7bd")
            .expect("entry should resolve");
        assert_eq!(record.description.as_deref(), Some("iCloud Keychain"));
        assert_eq!(record.is_fido2_certified, Some(true));
        assert_eq!(record.is_hardware_backed, Some(true));
    }

    #[test]
    fn fallback_used_when_cache_has_no_entry_and_no_fallback_row() {
        let cache = MdsCache::new(Box::new(TrustTlsOnly));
        let record = cache.lookup_with_fallback("00000000-0000-0000-0000-000000000000");
        assert_eq!(record.name, "Unknown Authenticator");
        assert_eq!(record.is_hardware_backed, None);
    }

    #[test]
    fn fallback_table_used_when_mds_cache_empty() {
        let cache = MdsCache::new(Box::new(TrustTlsOnly));
        let record = cache.lookup_with_fallback("fbfc3007-154e-4ecc-8c0b-6e020557d7bd");
        assert_eq!(record.name, "iCloud Keychain (Secure Enclave)");
        assert_eq!(record.is_hardware_backed, Some(true));
    }

    #[test]
    fn empty_entries_array_is_rejected() {
        let blob = MdsBlob {
            payload: json!({"entries": []}),
            last_updated: chrono::Utc::now(),
            next_update: None,
            blob_number: None,
        };
        let cache = MdsCache::new(Box::new(TrustTlsOnly));
        let err = cache.load_persisted(blob).unwrap_err();
        assert!(matches!(err, MdsError::EmptyEntries));
    }
}
