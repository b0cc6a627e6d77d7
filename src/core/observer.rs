//! Hooks for watching what the chain does without global state.
//!
//! A `Chain` holds an optional observer and reports appends, retargets and
//! rejected blocks or transactions to it. `LogObserver` routes them to `log`.

use crate::core::{Block, Transaction};
use std::fmt;

/// The check that a block failed during validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// Stored hash differs from the recomputed one
    HashMismatch { stored: String, computed: String },
    /// Proof does not meet the block's difficulty against its predecessor's proof
    InvalidProof {
        previous_proof: u64,
        proof: u64,
        difficulty: u32,
    },
    /// `previous_hash` does not point at the predecessor
    BrokenLink { expected: String, found: String },
    /// First block is not index 0 with previous hash "0"
    BadGenesis,
    /// Block index does not match its position in the chain
    IndexMismatch { expected: u64, found: u64 },
    /// Block claims less work than the chain currently demands
    DifficultyTooLow { required: u32, found: u32 },
    /// A transaction inside the block fails its signature or chain check
    InvalidTransaction { position: usize, reason: String },
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityViolation::HashMismatch { stored, computed } => {
                write!(f, "stored hash {stored} does not match computed hash {computed}")
            }
            IntegrityViolation::InvalidProof {
                previous_proof,
                proof,
                difficulty,
            } => write!(
                f,
                "proof {proof} over previous proof {previous_proof} does not meet difficulty {difficulty}"
            ),
            IntegrityViolation::BrokenLink { expected, found } => {
                write!(f, "previous hash {found} does not match {expected}")
            }
            IntegrityViolation::BadGenesis => write!(f, "genesis block is malformed"),
            IntegrityViolation::IndexMismatch { expected, found } => {
                write!(f, "block index {found} where {expected} was expected")
            }
            IntegrityViolation::DifficultyTooLow { required, found } => {
                write!(f, "block difficulty {found} is below the required {required}")
            }
            IntegrityViolation::InvalidTransaction { position, reason } => {
                write!(f, "transaction {position}: {reason}")
            }
        }
    }
}

pub trait ChainObserver: Send + Sync {
    fn on_block_appended(&self, _block: &Block) {}

    fn on_difficulty_retargeted(&self, _old: u32, _new: u32) {}

    /// `index` is the position the offending block holds or would hold
    fn on_integrity_violation(&self, _index: u64, _violation: &IntegrityViolation) {}

    fn on_transaction_rejected(&self, _transaction: &Transaction, _reason: &str) {}
}

/// Forwards chain events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl ChainObserver for LogObserver {
    fn on_block_appended(&self, block: &Block) {
        log::info!(
            "Block {} appended: {} ({} transactions, difficulty {})",
            block.get_index(),
            block.get_hash(),
            block.get_transactions().len(),
            block.get_difficulty()
        );
    }

    fn on_difficulty_retargeted(&self, old: u32, new: u32) {
        log::info!("Difficulty retargeted {old} -> {new}");
    }

    fn on_integrity_violation(&self, index: u64, violation: &IntegrityViolation) {
        log::warn!("Invalid block at index {index}: {violation}");
    }

    fn on_transaction_rejected(&self, transaction: &Transaction, reason: &str) {
        log::warn!(
            "Rejected transaction from {} (nonce {}): {reason}",
            transaction.get_sender(),
            transaction.get_nonce()
        );
    }
}
