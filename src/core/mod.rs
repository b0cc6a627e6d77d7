//! Core ledger functionality
//!
//! Blocks, signed transactions, proof-of-work, difficulty retargeting and the
//! chain that ties them together.

pub mod block;
pub mod blockchain;
pub mod difficulty;
pub mod miner;
pub mod observer;
pub mod proof_of_work;
pub mod signature;
pub mod transaction;

pub use block::{Block, GENESIS_PREVIOUS_HASH};
pub use blockchain::{Chain, SharedChain};
pub use difficulty::DifficultyManager;
pub use miner::{Miner, MiningJob, MiningOutcome};
pub use observer::{ChainObserver, IntegrityViolation, LogObserver};
pub use proof_of_work::{ProofOfWork, SearchOutcome, SearchStrategy, StopSignal, MAX_DIFFICULTY};
pub use signature::{verify_signature, Signature, SignatureScheme};
pub use transaction::{
    ChainId, Gas, Payload, Transaction, TransactionType, TransferPayload, UnsignedTransaction,
};
