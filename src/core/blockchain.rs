// This is the core chain implementation - the ordered, hash-linked list of blocks
// It owns the only mutation path (append), per-block validation for blocks coming
// from outside, and whole-chain validation for anything loaded or imported

use crate::config::Config;
use crate::core::difficulty::MIN_DIFFICULTY;
use crate::core::observer::{ChainObserver, IntegrityViolation};
use crate::core::{Block, ChainId, DifficultyManager, ProofOfWork, Transaction};
use crate::error::{BlockchainError, Result};
use crate::utils::current_timestamp;
use log::{debug, info, warn};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, RwLock};

pub struct Chain {
    blocks: Vec<Block>,                      // genesis first, never empty
    current_difficulty: u32,                 // difficulty expected of the next block
    pending_transactions: Vec<Transaction>,  // verified, waiting for a block
    difficulty_manager: DifficultyManager,
    chain_id: ChainId,                       // transactions signed for another chain are refused
    observer: Option<Arc<dyn ChainObserver>>,
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("blocks", &self.blocks)
            .field("current_difficulty", &self.current_difficulty)
            .field("pending_transactions", &self.pending_transactions)
            .field("difficulty_manager", &self.difficulty_manager)
            .field("chain_id", &self.chain_id)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Chain {
    /// A fresh chain holding only the genesis block
    pub fn new(config: &Config) -> Chain {
        let genesis = Block::genesis(config.initial_difficulty);
        info!("Creating genesis block {}", genesis.get_hash());
        Chain {
            blocks: vec![genesis],
            current_difficulty: config.initial_difficulty,
            pending_transactions: Vec::new(),
            difficulty_manager: config.difficulty_manager(),
            chain_id: config.chain_id(),
            observer: None,
        }
    }

    /// Rebuilds a chain from blocks supplied from outside (storage, import).
    /// Fails instead of holding a chain that does not validate.
    pub fn from_blocks(blocks: Vec<Block>, config: &Config) -> Result<Chain> {
        if blocks.is_empty() {
            return Err(BlockchainError::InvalidChain(
                "a chain needs at least a genesis block".to_string(),
            ));
        }
        let chain_id = config.chain_id();
        let violation = first_violation(&blocks).or_else(|| {
            blocks.iter().find_map(|block| {
                check_transactions(block, chain_id)
                    .err()
                    .map(|violation| (block.get_index(), violation))
            })
        });
        if let Some((index, violation)) = violation {
            return Err(BlockchainError::InvalidChain(format!(
                "block {index}: {violation}"
            )));
        }

        let difficulty_manager = config.difficulty_manager();
        let head_difficulty = blocks
            .last()
            .map(Block::get_difficulty)
            .unwrap_or(config.initial_difficulty)
            .max(MIN_DIFFICULTY);
        let current_difficulty = difficulty_manager.retarget(&blocks, head_difficulty);
        info!(
            "Loaded chain of {} blocks (next difficulty {current_difficulty})",
            blocks.len()
        );

        Ok(Chain {
            blocks,
            current_difficulty,
            pending_transactions: Vec::new(),
            difficulty_manager,
            chain_id,
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn ChainObserver>) -> Chain {
        self.observer = Some(observer);
        self
    }

    /// Appends a block stamped with the current time. See [`Chain::append_at`].
    pub fn append(
        &mut self,
        transactions: Vec<Transaction>,
        previous_hash: &str,
        proof: u64,
        difficulty: u32,
        retarget: bool,
    ) -> Result<Block> {
        let timestamp = current_timestamp()?;
        Ok(self.append_at(
            timestamp,
            transactions,
            previous_hash,
            proof,
            difficulty,
            retarget,
        ))
    }

    /// Builds the block at `index = len`, appends it and clears the pending
    /// transactions. With `retarget` the difficulty manager picks the
    /// difficulty for the next block.
    ///
    /// This is the trusted local path: the caller is expected to have mined
    /// `proof` against the head. Blocks from elsewhere go through
    /// [`Chain::append_validated`].
    pub fn append_at(
        &mut self,
        timestamp: i64,
        transactions: Vec<Transaction>,
        previous_hash: &str,
        proof: u64,
        difficulty: u32,
        retarget: bool,
    ) -> Block {
        let block = Block::new(
            self.blocks.len() as u64,
            timestamp,
            transactions,
            previous_hash,
            proof,
            difficulty,
        );
        self.push_block(block.clone());
        self.pending_transactions.clear();

        if retarget {
            self.apply_retarget();
        }
        block
    }

    /// The entry point for blocks received from outside. The block must pass
    /// [`Chain::validate_block`], sit at the next index, be mined at no less
    /// than the current difficulty and carry only transactions that verify
    /// for this chain.
    pub fn append_validated(&mut self, block: Block) -> Result<()> {
        let expected = self.blocks.len() as u64;
        let required = self.current_difficulty.max(MIN_DIFFICULTY);
        let verdict = self
            .check_candidate(&block)
            .and_then(|_| {
                if block.get_index() == expected {
                    Ok(())
                } else {
                    Err(IntegrityViolation::IndexMismatch {
                        expected,
                        found: block.get_index(),
                    })
                }
            })
            .and_then(|_| {
                // A peer does not get to pick an easier target than ours
                if block.get_difficulty() >= required {
                    Ok(())
                } else {
                    Err(IntegrityViolation::DifficultyTooLow {
                        required,
                        found: block.get_difficulty(),
                    })
                }
            })
            .and_then(|_| check_transactions(&block, self.chain_id));
        if let Err(violation) = verdict {
            self.report_violation(expected, &violation);
            return Err(BlockchainError::InvalidBlock(violation.to_string()));
        }

        let included = block.get_transactions();
        self.pending_transactions
            .retain(|pending| !included.contains(pending));
        self.push_block(block);
        Ok(())
    }

    /// Checks `candidate` against the current head, in order: stored hash,
    /// proof-of-work against the head's proof at the candidate's difficulty,
    /// then linkage. Stops at the first failure.
    pub fn validate_block(&self, candidate: &Block) -> bool {
        match self.check_candidate(candidate) {
            Ok(()) => true,
            Err(violation) => {
                self.report_violation(self.blocks.len() as u64, &violation);
                false
            }
        }
    }

    /// Re-derives every hash and re-checks every proof and link. Read-only.
    pub fn validate_chain(&self) -> bool {
        match first_violation(&self.blocks) {
            None => {
                debug!("All {} blocks are valid and correctly linked", self.blocks.len());
                true
            }
            Some((index, violation)) => {
                self.report_violation(index, &violation);
                false
            }
        }
    }

    /// Whole-chain validation over an arbitrary block list. An empty list is
    /// not a chain and fails.
    pub fn validate_blocks(blocks: &[Block]) -> bool {
        !blocks.is_empty() && first_violation(blocks).is_none()
    }

    /// Queues a transaction for the next block.
    ///
    /// Malformed transactions are an error. A transaction for another chain,
    /// one whose signature does not verify, or one signed by a key other than
    /// its sender is refused with `Ok(false)`.
    pub fn add_transaction(&mut self, transaction: Transaction) -> Result<bool> {
        transaction.validate()?;

        if transaction.get_chain() != self.chain_id {
            self.report_rejection(&transaction, "chain identifier mismatch");
            return Ok(false);
        }
        if !transaction.verify_signature() {
            self.report_rejection(&transaction, "invalid signature");
            return Ok(false);
        }
        if !transaction.is_signed_by_sender() {
            self.report_rejection(&transaction, "sender does not match signing key");
            return Ok(false);
        }

        self.pending_transactions.push(transaction);
        Ok(true)
    }

    /// Same as [`Chain::add_transaction`] for a raw record
    pub fn add_transaction_record(&mut self, record: &Value) -> Result<bool> {
        let transaction = Transaction::from_record(record)?;
        self.add_transaction(transaction)
    }

    /// What the difficulty manager would pick now. Does not apply it.
    pub fn retarget_difficulty(&self) -> u32 {
        self.difficulty_manager
            .retarget(&self.blocks, self.current_difficulty)
    }

    pub fn get_blocks(&self) -> &[Block] {
        self.blocks.as_slice()
    }

    pub fn last_block(&self) -> &Block {
        // The chain always holds at least the genesis block
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get_current_difficulty(&self) -> u32 {
        self.current_difficulty
    }

    pub fn get_pending_transactions(&self) -> &[Transaction] {
        self.pending_transactions.as_slice()
    }

    pub fn get_chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn get_difficulty_manager(&self) -> &DifficultyManager {
        &self.difficulty_manager
    }

    fn check_candidate(&self, candidate: &Block) -> std::result::Result<(), IntegrityViolation> {
        check_block(self.blocks.last(), candidate)
    }

    fn push_block(&mut self, block: Block) {
        if let Some(observer) = &self.observer {
            observer.on_block_appended(&block);
        }
        info!(
            "Appended block {} with {} transactions: {}",
            block.get_index(),
            block.get_transactions().len(),
            block.get_hash()
        );
        self.blocks.push(block);
    }

    fn apply_retarget(&mut self) {
        let old = self.current_difficulty;
        let new = self.difficulty_manager.retarget(&self.blocks, old);
        if new != old {
            self.current_difficulty = new;
            if let Some(observer) = &self.observer {
                observer.on_difficulty_retargeted(old, new);
            }
        }
    }

    fn report_violation(&self, index: u64, violation: &IntegrityViolation) {
        warn!("Invalid block at index {index}: {violation}");
        if let Some(observer) = &self.observer {
            observer.on_integrity_violation(index, violation);
        }
    }

    fn report_rejection(&self, transaction: &Transaction, reason: &str) {
        warn!(
            "Rejected transaction from {}: {reason}",
            transaction.get_sender()
        );
        if let Some(observer) = &self.observer {
            observer.on_transaction_rejected(transaction, reason);
        }
    }
}

// Hash, then proof-of-work, then linkage. With no predecessor the previous
// proof counts as 0 and the link check is skipped.
fn check_block(
    previous: Option<&Block>,
    block: &Block,
) -> std::result::Result<(), IntegrityViolation> {
    let computed = block.compute_hash();
    if block.get_hash() != computed {
        return Err(IntegrityViolation::HashMismatch {
            stored: block.get_hash().to_string(),
            computed,
        });
    }

    let previous_proof = previous.map(Block::get_proof).unwrap_or(0);
    if !ProofOfWork::is_valid(previous_proof, block.get_proof(), block.get_difficulty()) {
        return Err(IntegrityViolation::InvalidProof {
            previous_proof,
            proof: block.get_proof(),
            difficulty: block.get_difficulty(),
        });
    }

    if let Some(previous) = previous {
        if block.get_previous_hash() != previous.get_hash() {
            return Err(IntegrityViolation::BrokenLink {
                expected: previous.get_hash().to_string(),
                found: block.get_previous_hash().to_string(),
            });
        }
    }
    Ok(())
}

// Every transaction a block carries must be signed for `chain_id`, by its
// sender, over its current contents
fn check_transactions(
    block: &Block,
    chain_id: ChainId,
) -> std::result::Result<(), IntegrityViolation> {
    for (position, transaction) in block.get_transactions().iter().enumerate() {
        let reason = if transaction.get_chain() != chain_id {
            "chain identifier mismatch"
        } else if !transaction.verify_signature() {
            "invalid signature"
        } else if !transaction.is_signed_by_sender() {
            "sender does not match signing key"
        } else {
            continue;
        };
        return Err(IntegrityViolation::InvalidTransaction {
            position,
            reason: reason.to_string(),
        });
    }
    Ok(())
}

// First failing block and why, or None when the whole list is consistent
fn first_violation(blocks: &[Block]) -> Option<(u64, IntegrityViolation)> {
    let genesis = blocks.first()?;
    if !genesis.is_genesis() {
        return Some((0, IntegrityViolation::BadGenesis));
    }
    if !genesis.has_valid_hash() {
        return Some((
            0,
            IntegrityViolation::HashMismatch {
                stored: genesis.get_hash().to_string(),
                computed: genesis.compute_hash(),
            },
        ));
    }

    for (position, pair) in blocks.windows(2).enumerate() {
        let (previous, block) = (&pair[0], &pair[1]);
        let expected = position as u64 + 1;
        debug!("Validating block at index {expected} with hash {}", block.get_hash());

        if let Err(violation) = check_block(Some(previous), block) {
            return Some((expected, violation));
        }
        if block.get_index() != expected {
            return Some((
                expected,
                IntegrityViolation::IndexMismatch {
                    expected,
                    found: block.get_index(),
                },
            ));
        }
    }
    None
}

/// Shares a chain between threads: one writer at a time, any number of
/// concurrent readers, and no read ever sees a half-finished append.
#[derive(Debug, Clone)]
pub struct SharedChain {
    inner: Arc<RwLock<Chain>>,
}

impl SharedChain {
    pub fn new(chain: Chain) -> SharedChain {
        SharedChain {
            inner: Arc::new(RwLock::new(chain)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&Chain) -> R) -> Result<R> {
        let chain = self
            .inner
            .read()
            .map_err(|e| BlockchainError::Concurrency(format!("Chain lock poisoned: {e}")))?;
        Ok(f(&chain))
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Chain) -> R) -> Result<R> {
        let mut chain = self
            .inner
            .write()
            .map_err(|e| BlockchainError::Concurrency(format!("Chain lock poisoned: {e}")))?;
        Ok(f(&mut chain))
    }

    pub fn validate_chain(&self) -> Result<bool> {
        self.read(Chain::validate_chain)
    }

    pub fn validate_block(&self, candidate: &Block) -> Result<bool> {
        self.read(|chain| chain.validate_block(candidate))
    }

    pub fn append_validated(&self, block: Block) -> Result<()> {
        self.write(|chain| chain.append_validated(block))?
    }

    pub fn add_transaction(&self, transaction: Transaction) -> Result<bool> {
        self.write(|chain| chain.add_transaction(transaction))?
    }

    pub fn blocks(&self) -> Result<Vec<Block>> {
        self.read(|chain| chain.get_blocks().to_vec())
    }

    pub fn len(&self) -> Result<usize> {
        self.read(Chain::len)
    }
}

#[cfg(test)]
impl Chain {
    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }
}
