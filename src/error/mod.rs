//! Error handling for the ledger
//!
//! Structural problems (malformed transactions, bad config, storage failures)
//! surface as `BlockchainError`. Signature and chain-integrity checks are
//! boolean verdicts and never show up here.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

#[derive(Debug, Clone, PartialEq)]
pub enum BlockchainError {
    /// A required transaction field is absent
    MissingField(String),
    /// Payload is not the `{recipient, amount}` shape or the amount is not positive
    InvalidPayload(String),
    /// Nonce is not a non-negative integer
    InvalidNonce(String),
    /// A gas sub-field is missing or negative
    InvalidGas(String),
    /// The signature record is missing required sub-fields
    InvalidSignatureShape(String),
    /// Refusing to build a chain from a block list that does not validate
    InvalidChain(String),
    /// A block offered through `append_validated` was rejected
    InvalidBlock(String),
    /// Cryptographic operation errors
    Crypto(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Database-related errors
    Database(String),
    /// File I/O errors
    Io(String),
    /// Configuration errors
    Config(String),
    /// A lock guarding shared chain state was poisoned
    Concurrency(String),
}

impl BlockchainError {
    /// True for the transaction-shape errors. These reject a single
    /// transaction and never touch chain state.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BlockchainError::MissingField(_)
                | BlockchainError::InvalidPayload(_)
                | BlockchainError::InvalidNonce(_)
                | BlockchainError::InvalidGas(_)
                | BlockchainError::InvalidSignatureShape(_)
        )
    }
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::MissingField(field) => {
                write!(f, "Transaction is missing required field: {field}")
            }
            BlockchainError::InvalidPayload(msg) => write!(f, "Invalid payload: {msg}"),
            BlockchainError::InvalidNonce(msg) => write!(f, "Invalid nonce: {msg}"),
            BlockchainError::InvalidGas(msg) => write!(f, "Invalid gas: {msg}"),
            BlockchainError::InvalidSignatureShape(msg) => {
                write!(f, "Invalid signature structure: {msg}")
            }
            BlockchainError::InvalidChain(msg) => write!(f, "Invalid chain: {msg}"),
            BlockchainError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Database(msg) => write!(f, "Database error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Concurrency(msg) => write!(f, "Concurrency error: {msg}"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<sled::Error> for BlockchainError {
    fn from(err: sled::Error) -> Self {
        BlockchainError::Database(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for BlockchainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for BlockchainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for BlockchainError {
    fn from(err: serde_json::Error) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}
