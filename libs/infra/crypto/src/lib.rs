//! secp256k1 ECDSA recovery and the Ethereum `personal_sign` digest
//! convention, used only by the Auth Gateway's envelope verification step.

use sha3::{Digest, Keccak256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("[CRYPTO_FAULT]: MALFORMED_SIGNATURE -> expected 65 bytes, got {0}")]
    MalformedSignature(usize),

    #[error("[CRYPTO_FAULT]: INVALID_RECOVERY_ID -> {0}")]
    InvalidRecoveryId(u8),

    #[error("[CRYPTO_FAULT]: RECOVERY_REJECTED -> {0}")]
    RecoveryFailed(String),

    #[error("[CRYPTO_FAULT]: MALFORMED_HEX -> {0}")]
    MalformedHex(#[from] hex::FromHexError),
}

/// A 20-byte Ethereum-style address, always compared case-insensitively by
/// callers; this type stores it lowercased without the `0x` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address(String);

impl Address {
    pub fn as_lowercase_hex(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, other: &str) -> bool {
        let other = other.trim_start_matches("0x").to_lowercase();
        self.0 == other
    }
}

/// Parses the standard 65-byte `r || s || v` wire format, accepting both the
/// Ethereum-conventional `v ∈ {27, 28}` and the raw `{0, 1}` recovery id.
pub fn recover_signer(message: &[u8], signature_hex: &str) -> Result<Address, CryptoError> {
    let signature_bytes = hex::decode(signature_hex.trim_start_matches("0x"))?;
    if signature_bytes.len() != 65 {
        return Err(CryptoError::MalformedSignature(signature_bytes.len()));
    }

    let (rs, v_byte) = signature_bytes.split_at(64);
    let v = v_byte[0];
    let recovery_id = match v {
        27 | 28 => v - 27,
        0 | 1 => v,
        other => return Err(CryptoError::InvalidRecoveryId(other)),
    };

    let recovery_id = secp256k1::ecdsa::RecoveryId::from_i32(recovery_id as i32)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;
    let recoverable_signature = secp256k1::ecdsa::RecoverableSignature::from_compact(rs, recovery_id)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;

    let digest = personal_sign_digest(message);
    let message = secp256k1::Message::from_digest_slice(&digest)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;

    let secp = secp256k1::Secp256k1::verification_only();
    let public_key = secp
        .recover_ecdsa(&message, &recoverable_signature)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;

    Ok(public_key_to_address(&public_key))
}

/// `keccak256("\x19Ethereum Signed Message:\n" + len(message) + message)`.
fn personal_sign_digest(message: &[u8]) -> [u8; 32] {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut hasher = Keccak256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

fn public_key_to_address(public_key: &secp256k1::PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    let mut hasher = Keccak256::new();
    hasher.update(&uncompressed[1..]);
    let hash = hasher.finalize();
    Address(hex::encode(&hash[12..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_signature_with_wrong_length() {
        let err = recover_signer(b"hello", "0xaabb").unwrap_err();
        assert!(matches!(err, CryptoError::MalformedSignature(_)));
    }

    #[test]
    fn rejects_invalid_recovery_id() {
        let mut bytes = vec![0u8; 65];
        bytes[64] = 99;
        let signature_hex = hex::encode(bytes);
        let err = recover_signer(b"hello", &signature_hex).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidRecoveryId(99)));
    }

    #[test]
    fn recovers_a_known_signature() {
        let secp = secp256k1::Secp256k1::new();
        let secret_key = secp256k1::SecretKey::from_slice(&[0x11; 32]).unwrap();
        let public_key = secp256k1::PublicKey::from_secret_key(&secp, &secret_key);
        let expected_address = public_key_to_address(&public_key);

        let message = b"verify ownerAddress 0xabc accountAddress 0xdef";
        let digest = personal_sign_digest(message);
        let msg = secp256k1::Message::from_digest_slice(&digest).unwrap();
        let (recovery_id, compact) = secp
            .sign_ecdsa_recoverable(&msg, &secret_key)
            .serialize_compact();

        let mut wire = compact.to_vec();
        wire.push(27 + recovery_id.to_i32() as u8);
        let signature_hex = hex::encode(wire);

        let recovered = recover_signer(message, &signature_hex).unwrap();
        assert_eq!(recovered, expected_address);
    }
}
