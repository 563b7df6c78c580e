// [apps/gateway/src/envelope.rs]
/*!
 * =================================================================
 * APARATO: AUTH GATEWAY ENVELOPE VERIFICATION (ESTRATO L4)
 * RESPONSABILIDAD: VALIDACIÓN DE FIRMA, FRESCURA Y ANTI-REPLAY
 *
 * `RawEnvelope` (dominio) es la forma cruda, sin verificar, de la
 * petición. `VerifiedEnvelope` solo puede construirse si las cinco
 * reglas del contrato de autenticación se satisfacen; de lo contrario
 * el constructor se niega a producir un valor.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use passkey_domain_models::RawEnvelope;
use passkey_infra_crypto::recover_signer;

use crate::errors::ApiError;

const MAX_CLOCK_SKEW_SECONDS: i64 = 5 * 60;

/// An envelope whose signature has recovered to `owner_address`, whose
/// timestamp is within the freshness window, and whose message contains
/// both addresses. Downstream handlers only ever see this type, never the
/// raw wire shape.
#[derive(Debug, Clone)]
pub struct VerifiedEnvelope {
    pub verified_account: String,
    pub verified_owner: String,
}

impl VerifiedEnvelope {
    pub fn parse(raw: &RawEnvelope, now: DateTime<Utc>) -> Result<Self, ApiError> {
        if raw.account_address.is_empty()
            || raw.owner_address.is_empty()
            || raw.signature.is_empty()
            || raw.message.is_empty()
        {
            return Err(ApiError::Validation("envelope is missing a required field".to_string()));
        }

        let timestamp = DateTime::from_timestamp(raw.timestamp, 0)
            .ok_or_else(|| ApiError::Validation("envelope timestamp is out of range".to_string()))?;
        let skew = (now - timestamp).num_seconds().abs();
        if skew > MAX_CLOCK_SKEW_SECONDS {
            return Err(ApiError::Unauthorized("envelope timestamp expired".to_string()));
        }

        let recovered = recover_signer(raw.message.as_bytes(), &raw.signature)?;
        if !recovered.matches(&raw.owner_address) {
            return Err(ApiError::Unauthorized("recovered signer does not match ownerAddress".to_string()));
        }

        if !raw.message.contains(raw.owner_address.trim_start_matches("0x"))
            || !raw.message.contains(raw.account_address.trim_start_matches("0x"))
        {
            return Err(ApiError::Validation(
                "message must reference both ownerAddress and accountAddress".to_string(),
            ));
        }

        Ok(Self {
            verified_account: raw.account_address.to_lowercase(),
            verified_owner: raw.owner_address.to_lowercase(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sign(message: &[u8], secret_key: &secp256k1::SecretKey) -> String {
        use sha3::{Digest, Keccak256};
        let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
        let mut hasher = Keccak256::new();
        hasher.update(prefix.as_bytes());
        hasher.update(message);
        let digest: [u8; 32] = hasher.finalize().into();

        let secp = secp256k1::Secp256k1::new();
        let msg = secp256k1::Message::from_digest_slice(&digest).unwrap();
        let (recovery_id, compact) = secp.sign_ecdsa_recoverable(&msg, secret_key).serialize_compact();
        let mut wire = compact.to_vec();
        wire.push(27 + recovery_id.to_i32() as u8);
        hex::encode(wire)
    }

    #[test]
    fn rejects_stale_timestamp() {
        let raw = RawEnvelope {
            account_address: "0xabc".to_string(),
            owner_address: "0xdef".to_string(),
            signature: "0x".to_string() + &"11".repeat(65),
            message: "link 0xabc to 0xdef".to_string(),
            timestamp: (Utc::now() - Duration::hours(1)).timestamp(),
        };
        let err = VerifiedEnvelope::parse(&raw, Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn accepts_a_correctly_signed_envelope() {
        let secp = secp256k1::Secp256k1::new();
        let secret_key = secp256k1::SecretKey::from_slice(&[0x22; 32]).unwrap();
        let public_key = secp256k1::PublicKey::from_secret_key(&secp, &secret_key);
        let owner = passkey_infra_crypto::recover_signer(
            b"bootstrap",
            &sign(b"bootstrap", &secret_key),
        )
        .unwrap();
        let _ = public_key;

        let message = format!("link account 0xaccount1111 to owner {}", owner.as_lowercase_hex());
        let signature = sign(message.as_bytes(), &secret_key);

        let raw = RawEnvelope {
            account_address: "0xaccount1111".to_string(),
            owner_address: owner.as_lowercase_hex().to_string(),
            signature,
            message,
            timestamp: Utc::now().timestamp(),
        };

        let verified = VerifiedEnvelope::parse(&raw, Utc::now()).expect("envelope should verify");
        assert_eq!(verified.verified_account, "0xaccount1111");
    }
}
