// Signature record carried by every transaction, and the verifier that checks it
// against the transaction's canonical encoding.

use crate::core::Transaction;
use crate::error::{BlockchainError, Result};
use crate::utils::{ecdsa_p384_sha384_verify, P384_SCALAR_LEN};
use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

const UNCOMPRESSED_TAG: u8 = 0x04;

/// Signature algorithms a transaction may declare. Only one is implemented;
/// the tag is there so records stay readable when another one is added.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub enum SignatureScheme {
    EcdsaP384,
}

impl SignatureScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureScheme::EcdsaP384 => "ecdsa-p384",
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SignatureScheme {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ecdsa-p384" => Ok(SignatureScheme::EcdsaP384),
            other => Err(BlockchainError::InvalidSignatureShape(format!(
                "unsupported signature type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Signature {
    scheme: SignatureScheme,
    r: String,          // hex, 48 bytes
    s: String,          // hex, 48 bytes
    v: u8,              // recovery id, carried but not needed since the key is embedded
    public_key: String, // hex SEC1 point, with or without the 0x04 tag
}

impl Signature {
    pub fn new(scheme: SignatureScheme, r: String, s: String, v: u8, public_key: String) -> Self {
        Signature {
            scheme,
            r,
            s,
            v,
            public_key,
        }
    }

    /// Builds a signature record from the fixed-width `r || s` bytes that the
    /// P-384 signer produces.
    pub fn from_fixed_bytes(signature: &[u8], public_key: &[u8]) -> Result<Signature> {
        if signature.len() != 2 * P384_SCALAR_LEN {
            return Err(BlockchainError::InvalidSignatureShape(format!(
                "expected {} signature bytes, got {}",
                2 * P384_SCALAR_LEN,
                signature.len()
            )));
        }
        let (r, s) = signature.split_at(P384_SCALAR_LEN);
        Ok(Signature {
            scheme: SignatureScheme::EcdsaP384,
            r: HEXLOWER.encode(r),
            s: HEXLOWER.encode(s),
            v: 0,
            public_key: HEXLOWER.encode(public_key),
        })
    }

    pub fn get_scheme(&self) -> SignatureScheme {
        self.scheme
    }

    pub fn get_r(&self) -> &str {
        self.r.as_str()
    }

    pub fn get_s(&self) -> &str {
        self.s.as_str()
    }

    pub fn get_v(&self) -> u8 {
        self.v
    }

    pub fn get_public_key(&self) -> &str {
        self.public_key.as_str()
    }

    pub(crate) fn check_shape(&self) -> Result<()> {
        for (name, value) in [
            ("r", &self.r),
            ("s", &self.s),
            ("public_key", &self.public_key),
        ] {
            if value.is_empty() {
                return Err(BlockchainError::InvalidSignatureShape(format!(
                    "{name} is empty"
                )));
            }
        }
        Ok(())
    }

    /// Checks `(r, s)` against `message`. Anything that cannot be decoded
    /// simply fails verification.
    pub fn verify(&self, message: &[u8]) -> bool {
        match self.scheme {
            SignatureScheme::EcdsaP384 => {
                let decoded = (
                    HEXLOWER_PERMISSIVE.decode(self.r.as_bytes()),
                    HEXLOWER_PERMISSIVE.decode(self.s.as_bytes()),
                    HEXLOWER_PERMISSIVE.decode(self.public_key.as_bytes()),
                );
                let (Ok(r), Ok(s), Ok(public_key)) = decoded else {
                    return false;
                };
                if r.len() != P384_SCALAR_LEN || s.len() != P384_SCALAR_LEN {
                    return false;
                }
                let mut fixed = r;
                fixed.extend_from_slice(&s);
                ecdsa_p384_sha384_verify(&public_key, &fixed, message)
            }
        }
    }

    pub fn to_record(&self) -> Value {
        json!({
            "type": self.scheme.as_str(),
            "r": self.r,
            "s": self.s,
            "v": self.v,
            "public_key": self.public_key,
        })
    }

    pub fn from_record(record: &Value) -> Result<Signature> {
        let map = record.as_object().ok_or_else(|| {
            BlockchainError::InvalidSignatureShape("signature must be a record".to_string())
        })?;

        let text = |name: &str| -> Result<String> {
            map.get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    BlockchainError::InvalidSignatureShape(format!("missing or non-text {name}"))
                })
        };

        let scheme: SignatureScheme = text("type")?.parse()?;
        let r = text("r")?;
        let s = text("s")?;
        let public_key = text("public_key")?;
        let v = map
            .get("v")
            .and_then(Value::as_u64)
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| {
                BlockchainError::InvalidSignatureShape("missing or invalid v".to_string())
            })?;

        let signature = Signature::new(scheme, r, s, v, public_key);
        signature.check_shape()?;
        Ok(signature)
    }
}

/// Recomputes the transaction's canonical encoding and checks its signature
/// over it. Never fails: malformed input is just an invalid signature.
pub fn verify_signature(transaction: &Transaction) -> bool {
    let message = transaction.canonical_bytes();
    let valid = transaction.get_signature().verify(&message);
    if !valid {
        log::debug!(
            "Signature verification failed for transaction from {}",
            transaction.get_sender()
        );
    }
    valid
}

/// True when the transaction's `sender` names the key that signed it. Both
/// sides are compared as decoded SEC1 points, ignoring hex case and the 0x04
/// tag.
pub fn sender_matches_key(transaction: &Transaction) -> bool {
    let point = |hex: &str| {
        HEXLOWER_PERMISSIVE.decode(hex.as_bytes()).ok().map(|mut bytes| {
            if bytes.len() % 2 == 1 && bytes.first() == Some(&UNCOMPRESSED_TAG) {
                bytes.remove(0);
            }
            bytes
        })
    };
    match (
        point(transaction.get_sender()),
        point(transaction.get_signature().get_public_key()),
    ) {
        (Some(sender), Some(key)) => !sender.is_empty() && sender == key,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ChainId, Gas};
    use crate::wallet::Wallet;

    fn sample_record() -> Value {
        json!({
            "type": "ecdsa-p384",
            "r": "aa",
            "s": "bb",
            "v": 1,
            "public_key": "cc",
        })
    }

    #[test]
    fn test_record_round_trip() {
        let signature = Signature::from_record(&sample_record()).unwrap();
        assert_eq!(signature.get_scheme(), SignatureScheme::EcdsaP384);
        assert_eq!(signature.get_v(), 1);
        assert_eq!(signature.to_record(), sample_record());
    }

    #[test]
    fn test_missing_sub_field_is_shape_error() {
        for field in ["type", "r", "s", "v", "public_key"] {
            let mut record = sample_record();
            record.as_object_mut().unwrap().remove(field);
            let err = Signature::from_record(&record).unwrap_err();
            assert!(
                matches!(err, BlockchainError::InvalidSignatureShape(_)),
                "removing {field} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let mut record = sample_record();
        record["type"] = json!("rsa");
        assert!(matches!(
            Signature::from_record(&record),
            Err(BlockchainError::InvalidSignatureShape(_))
        ));
    }

    #[test]
    fn test_malformed_hex_fails_verification_quietly() {
        let signature = Signature::from_record(&sample_record()).unwrap();
        assert!(!signature.verify(b"anything"));

        let garbage = Signature::new(
            SignatureScheme::EcdsaP384,
            "zz".repeat(48),
            "zz".repeat(48),
            0,
            "04".to_string(),
        );
        assert!(!garbage.verify(b"anything"));
    }

    #[test]
    fn test_from_fixed_bytes_rejects_wrong_length() {
        assert!(Signature::from_fixed_bytes(&[0u8; 10], &[4u8; 97]).is_err());
        let signature = Signature::from_fixed_bytes(&[7u8; 96], &[4u8; 97]).unwrap();
        assert_eq!(signature.get_r().len(), 96);
        assert_eq!(signature.get_s().len(), 96);
    }

    #[test]
    fn test_sender_must_name_signing_key() {
        let wallet = Wallet::new().unwrap();
        let transfer = wallet
            .sign_transfer("bob", 5, 0, ChainId::new(1, 1), Gas::new(0, 1, 1))
            .unwrap();
        assert!(sender_matches_key(&transfer));

        // Same key without the tag and in upper case still matches
        let mut record = transfer.to_record();
        record["signature"]["public_key"] = json!(wallet.public_key_hex()[2..].to_uppercase());
        let untagged = Transaction::from_record(&record).unwrap();
        assert!(sender_matches_key(&untagged));

        let other = Wallet::new().unwrap();
        let mut record = transfer.to_record();
        record["sender"] = json!(other.public_key_hex());
        let claimed = Transaction::from_record(&record).unwrap();
        assert!(!sender_matches_key(&claimed));

        record["sender"] = json!("alice");
        let named = Transaction::from_record(&record).unwrap();
        assert!(!sender_matches_key(&named));
    }
}
