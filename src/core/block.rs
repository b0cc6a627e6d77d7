use crate::core::Transaction;
use crate::error::{BlockchainError, Result};
use crate::utils::{canonical_json, deserialize, serialize, sha256_hex};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// `previous_hash` of the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    index: u64,
    timestamp: i64, // seconds
    transactions: Vec<Transaction>,
    previous_hash: String,
    proof: u64,
    difficulty: u32, // leading zero hex digits required of `proof`
    hash: String,
}

impl Block {
    /// Builds a block and seals it with the hash of its contents
    pub fn new(
        index: u64,
        timestamp: i64,
        transactions: Vec<Transaction>,
        previous_hash: &str,
        proof: u64,
        difficulty: u32,
    ) -> Block {
        let mut block = Block {
            index,
            timestamp,
            transactions,
            previous_hash: previous_hash.to_string(),
            proof,
            difficulty,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    pub fn genesis(difficulty: u32) -> Block {
        Block::new(0, 0, vec![], GENESIS_PREVIOUS_HASH, 0, difficulty)
    }

    /// SHA-256 over the key-sorted record of every field except `hash`
    pub fn compute_hash(&self) -> String {
        sha256_hex(&canonical_json(&Value::Object(self.content_record())))
    }

    fn content_record(&self) -> Map<String, Value> {
        let transactions: Vec<Value> = self
            .transactions
            .iter()
            .map(Transaction::to_record)
            .collect();
        let mut map = Map::new();
        map.insert("index".to_string(), json!(self.index));
        map.insert("timestamp".to_string(), json!(self.timestamp));
        map.insert("transactions".to_string(), Value::Array(transactions));
        map.insert("previous_hash".to_string(), json!(self.previous_hash));
        map.insert("proof".to_string(), json!(self.proof));
        map.insert("difficulty".to_string(), json!(self.difficulty));
        map
    }

    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub fn to_record(&self) -> Value {
        let mut map = self.content_record();
        map.insert("hash".to_string(), json!(self.hash));
        Value::Object(map)
    }

    /// Rebuilds a block from its record. The stored `hash` is kept as-is so
    /// that chain validation can tell whether the contents were altered.
    pub fn from_record(record: &Value) -> Result<Block> {
        let map = record
            .as_object()
            .ok_or_else(|| BlockchainError::InvalidBlock("block must be a record".to_string()))?;

        let missing = |name: &str| BlockchainError::InvalidBlock(format!("missing or invalid {name}"));
        let index = map
            .get("index")
            .and_then(Value::as_u64)
            .ok_or_else(|| missing("index"))?;
        let timestamp = map
            .get("timestamp")
            .and_then(Value::as_i64)
            .ok_or_else(|| missing("timestamp"))?;
        let previous_hash = map
            .get("previous_hash")
            .and_then(Value::as_str)
            .ok_or_else(|| missing("previous_hash"))?;
        let proof = map
            .get("proof")
            .and_then(Value::as_u64)
            .ok_or_else(|| missing("proof"))?;
        let difficulty = map
            .get("difficulty")
            .and_then(Value::as_u64)
            .and_then(|d| u32::try_from(d).ok())
            .ok_or_else(|| missing("difficulty"))?;
        let hash = map
            .get("hash")
            .and_then(Value::as_str)
            .ok_or_else(|| missing("hash"))?;
        let transactions = map
            .get("transactions")
            .and_then(Value::as_array)
            .ok_or_else(|| missing("transactions"))?
            .iter()
            .map(Transaction::from_record)
            .collect::<Result<Vec<Transaction>>>()?;

        Ok(Block {
            index,
            timestamp,
            transactions,
            previous_hash: previous_hash.to_string(),
            proof,
            difficulty,
            hash: hash.to_string(),
        })
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn get_proof(&self) -> u64 {
        self.proof
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_shape() {
        let genesis = Block::genesis(4);
        assert_eq!(genesis.get_index(), 0);
        assert_eq!(genesis.get_previous_hash(), "0");
        assert_eq!(genesis.get_proof(), 0);
        assert!(genesis.get_transactions().is_empty());
        assert!(genesis.is_genesis());
        assert!(genesis.has_valid_hash());
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = Block::new(3, 1_700_000_000, vec![], "abc", 42, 2);
        let b = Block::new(3, 1_700_000_000, vec![], "abc", 42, 2);
        assert_eq!(a.get_hash(), b.get_hash());
        assert_eq!(a.compute_hash(), a.compute_hash());
        assert_eq!(a.get_hash().len(), 64);
        assert!(a
            .get_hash()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_every_field_feeds_the_hash() {
        let base = Block::new(1, 100, vec![], "prev", 7, 2);
        let variants = [
            Block::new(2, 100, vec![], "prev", 7, 2),
            Block::new(1, 101, vec![], "prev", 7, 2),
            Block::new(1, 100, vec![], "prex", 7, 2),
            Block::new(1, 100, vec![], "prev", 8, 2),
            Block::new(1, 100, vec![], "prev", 7, 3),
        ];
        for variant in variants {
            assert_ne!(base.get_hash(), variant.get_hash());
        }
    }

    #[test]
    fn test_record_keeps_stored_hash() {
        let block = Block::new(1, 100, vec![], "prev", 7, 2);
        let mut record = block.to_record();
        assert_eq!(Block::from_record(&record).unwrap(), block);

        record["proof"] = json!(8);
        let tampered = Block::from_record(&record).unwrap();
        assert_eq!(tampered.get_hash(), block.get_hash());
        assert!(!tampered.has_valid_hash());
    }

    #[test]
    fn test_record_missing_field() {
        let mut record = Block::genesis(1).to_record();
        record.as_object_mut().unwrap().remove("difficulty");
        assert!(matches!(
            Block::from_record(&record),
            Err(BlockchainError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_bincode_round_trip_preserves_hash() {
        let block = Block::new(5, 500, vec![], "prev", 9, 1);
        let bytes = block.serialize().unwrap();
        let decoded = Block::deserialize(&bytes).unwrap();
        assert_eq!(decoded, block);
        assert!(decoded.has_valid_hash());
    }
}
