//! Utility functions and helpers
//!
//! Digests, P-384 signing helpers, timestamps and the serialization
//! helpers shared by the ledger and its storage.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    current_timestamp, ecdsa_p384_sha384_sign, ecdsa_p384_sha384_verify, new_key_pair,
    public_key_from_pkcs8, sha256_digest, sha256_hex, P384_SCALAR_LEN,
};

pub use serialization::{canonical_json, deserialize, serialize, sort_keys};
