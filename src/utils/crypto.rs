use ring::digest::{Context, SHA256};
use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, KeyPair, UnparsedPublicKey, ECDSA_P384_SHA384_FIXED,
    ECDSA_P384_SHA384_FIXED_SIGNING,
};

use crate::error::{BlockchainError, Result};
use data_encoding::HEXLOWER;
use std::time::{SystemTime, UNIX_EPOCH};

/// Length in bytes of one P-384 scalar (`r` or `s`)
pub const P384_SCALAR_LEN: usize = 48;

// SEC1 uncompressed point tag
const UNCOMPRESSED_POINT_TAG: u8 = 0x04;

/// Seconds since the Unix epoch
pub fn current_timestamp() -> Result<i64> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| BlockchainError::Crypto(format!("System time error: {e}")))?
        .as_secs();

    i64::try_from(secs).map_err(|_| BlockchainError::Crypto("Timestamp overflow".to_string()))
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

/// Lowercase hex SHA-256, the digest format used for block hashes and proof checks
pub fn sha256_hex(data: &[u8]) -> String {
    HEXLOWER.encode(&sha256_digest(data))
}

pub fn new_key_pair() -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P384_SHA384_FIXED_SIGNING, &rng)
        .map_err(|e| BlockchainError::Crypto(format!("Failed to generate ECDSA key pair: {e}")))?
        .as_ref()
        .to_vec();
    Ok(pkcs8)
}

/// Uncompressed SEC1 public key for a PKCS#8 P-384 private key
pub fn public_key_from_pkcs8(pkcs8: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P384_SHA384_FIXED_SIGNING, pkcs8, &rng)
        .map_err(|e| {
            BlockchainError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
        })?;
    Ok(key_pair.public_key().as_ref().to_vec())
}

/// Signs `message` and returns the fixed-width `r || s` encoding (96 bytes)
pub fn ecdsa_p384_sha384_sign(pkcs8: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P384_SHA384_FIXED_SIGNING, pkcs8, &rng)
        .map_err(|e| {
            BlockchainError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
        })?;
    let signature = key_pair
        .sign(&rng, message)
        .map_err(|e| BlockchainError::Crypto(format!("Failed to sign message: {e}")))?
        .as_ref()
        .to_vec();
    Ok(signature)
}

/// Verifies a fixed-width `r || s` signature.
///
/// `public_key` may be the 97-byte SEC1 uncompressed point or the bare
/// 96-byte `x || y` form; the tag is added when it is missing.
pub fn ecdsa_p384_sha384_verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    let point = if public_key.len() == 2 * P384_SCALAR_LEN {
        let mut tagged = Vec::with_capacity(public_key.len() + 1);
        tagged.push(UNCOMPRESSED_POINT_TAG);
        tagged.extend_from_slice(public_key);
        tagged
    } else {
        public_key.to_vec()
    };
    let peer_public_key = UnparsedPublicKey::new(&ECDSA_P384_SHA384_FIXED, point);
    peer_public_key.verify(message, signature).is_ok()
}
