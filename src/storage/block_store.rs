// Sled-backed persistence for the chain. Blocks are bincode-encoded and keyed by
// big-endian index, so iterating the tree yields them in chain order.

use crate::config::Config;
use crate::core::{Block, Chain, Transaction};
use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize, serialize};
use log::info;
use sled::{Batch, Db, Tree};
use std::path::Path;

const BLOCKS_TREE: &str = "blocks";
const PENDING_TREE: &str = "pending";

pub struct BlockStore {
    db: Db,
    blocks: Tree,
    pending: Tree, // transactions queued by the CLI between runs
}

impl BlockStore {
    pub fn open(path: &Path) -> Result<BlockStore> {
        let db = sled::open(path)
            .map_err(|e| BlockchainError::Database(format!("Failed to open database: {e}")))?;
        let blocks = db
            .open_tree(BLOCKS_TREE)
            .map_err(|e| BlockchainError::Database(format!("Failed to open blocks tree: {e}")))?;
        let pending = db
            .open_tree(PENDING_TREE)
            .map_err(|e| BlockchainError::Database(format!("Failed to open pending tree: {e}")))?;
        Ok(BlockStore {
            db,
            blocks,
            pending,
        })
    }

    pub fn put_block(&self, block: &Block) -> Result<()> {
        let block_data = block.serialize()?;
        self.blocks
            .insert(block.get_index().to_be_bytes(), block_data)
            .map_err(|e| BlockchainError::Database(format!("Failed to store block: {e}")))?;
        self.flush()
    }

    /// Replaces whatever is stored with the blocks of `chain`
    pub fn save_chain(&self, chain: &Chain) -> Result<()> {
        let mut batch = Batch::default();
        for key in self.blocks.iter().keys() {
            let key = key
                .map_err(|e| BlockchainError::Database(format!("Failed to read block key: {e}")))?;
            batch.remove(key);
        }
        for block in chain.get_blocks() {
            batch.insert(block.get_index().to_be_bytes().to_vec(), block.serialize()?);
        }
        self.blocks
            .apply_batch(batch)
            .map_err(|e| BlockchainError::Database(format!("Failed to store chain: {e}")))?;
        self.flush()?;
        info!("Saved {} blocks", chain.len());
        Ok(())
    }

    /// Blocks in index order, without any validation
    pub fn load_blocks(&self) -> Result<Vec<Block>> {
        self.blocks
            .iter()
            .values()
            .map(|value| {
                let value = value.map_err(|e| {
                    BlockchainError::Database(format!("Failed to iterate blocks tree: {e}"))
                })?;
                Block::deserialize(value.as_ref())
            })
            .collect()
    }

    /// Loads and validates the stored chain
    pub fn load_chain(&self, config: &Config) -> Result<Chain> {
        let blocks = self.load_blocks()?;
        if blocks.is_empty() {
            return Err(BlockchainError::Database(
                "No existing chain found. Run init first.".to_string(),
            ));
        }
        Chain::from_blocks(blocks, config)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn put_pending(&self, transaction: &Transaction) -> Result<()> {
        let id = self
            .db
            .generate_id()
            .map_err(|e| BlockchainError::Database(format!("Failed to allocate id: {e}")))?;
        self.pending
            .insert(id.to_be_bytes(), serialize(transaction)?)
            .map_err(|e| BlockchainError::Database(format!("Failed to queue transaction: {e}")))?;
        self.flush()
    }

    pub fn load_pending(&self) -> Result<Vec<Transaction>> {
        self.pending
            .iter()
            .values()
            .map(|value| {
                let value = value.map_err(|e| {
                    BlockchainError::Database(format!("Failed to iterate pending tree: {e}"))
                })?;
                deserialize::<Transaction>(value.as_ref())
            })
            .collect()
    }

    pub fn clear_pending(&self) -> Result<()> {
        self.pending
            .clear()
            .map_err(|e| BlockchainError::Database(format!("Failed to clear pending: {e}")))?;
        self.flush()
    }

    fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| BlockchainError::Database(format!("Failed to flush database: {e}")))?;
        Ok(())
    }
}
