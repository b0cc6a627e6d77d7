//! # Ledger Chain - My Proof-of-Work Ledger
//!
//! A single-node ledger: an ordered, hash-linked list of blocks, each sealed
//! with a proof-of-work and carrying signed transfer transactions.
//!
//! ## What I Built
//! - **Chain**: append, per-block validation and whole-chain validation
//! - **Proof of Work**: leading-zero SHA-256 puzzle with sequential, random and
//!   multi-threaded cancellable searches
//! - **Difficulty**: one-step retargeting toward a target block time
//! - **Transactions**: schema validation, canonical encoding and ECDSA P-384
//!   signatures
//! - **Storage**: sled block store plus JSON export/import
//!
//! ## How I Organized My Code
//! - `core/`: blocks, transactions, signatures, proof-of-work, difficulty, chain, miner
//! - `wallet/`: key pairs, the local wallet file, signing
//! - `storage/`: sled persistence and JSON files
//! - `config/`: TOML + environment configuration
//! - `utils/`: digests, signing primitives, serialization helpers
//! - `cli/`: command-line definitions used by `main.rs`
//!
//! ## Things to Keep in Mind
//! - Hashes and signatures are computed over key-sorted JSON records, so the
//!   record layout is part of the format
//! - Validation verdicts are booleans; errors are for malformed input
//! - Nothing is global: config and observers are passed in explicitly

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod utils;
pub mod wallet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::{Config, StrategyKind};
pub use crate::core::{
    verify_signature, Block, Chain, ChainId, ChainObserver, DifficultyManager, Gas,
    IntegrityViolation, LogObserver, Miner, MiningJob, MiningOutcome, Payload, ProofOfWork,
    SearchOutcome, SearchStrategy, SharedChain, Signature, SignatureScheme, StopSignal,
    Transaction, TransactionType, TransferPayload, UnsignedTransaction, MAX_DIFFICULTY,
};
pub use error::{BlockchainError, Result};
pub use storage::{load_json, load_json_blocks, save_json, BlockStore};
pub use utils::{current_timestamp, sha256_digest, sha256_hex};
pub use wallet::{Wallet, Wallets};
