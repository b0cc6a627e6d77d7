// JSON export and import of the chain as a list of block records
use crate::config::Config;
use crate::core::{Block, Chain};
use crate::error::{BlockchainError, Result};
use log::info;
use serde_json::Value;
use std::fs;
use std::path::Path;

pub fn save_json(path: &Path, chain: &Chain) -> Result<()> {
    let records: Vec<Value> = chain.get_blocks().iter().map(Block::to_record).collect();
    let contents = serde_json::to_string_pretty(&Value::Array(records))?;
    fs::write(path, contents)?;
    info!("Exported {} blocks to {}", chain.len(), path.display());
    Ok(())
}

/// Reads block records without validating them as a chain
pub fn load_json_blocks(path: &Path) -> Result<Vec<Block>> {
    let contents = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&contents)?;
    value
        .as_array()
        .ok_or_else(|| {
            BlockchainError::InvalidChain("expected a list of block records".to_string())
        })?
        .iter()
        .map(Block::from_record)
        .collect()
}

/// Reads block records and rebuilds a validated chain from them
pub fn load_json(path: &Path, config: &Config) -> Result<Chain> {
    let blocks = load_json_blocks(path)?;
    let chain = Chain::from_blocks(blocks, config)?;
    info!("Imported {} blocks from {}", chain.len(), path.display());
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Gas, ProofOfWork, Transaction};
    use crate::wallet::Wallet;
    use serde_json::json;

    fn config() -> Config {
        Config {
            initial_difficulty: 1,
            ..Config::default()
        }
    }

    fn chain_with_transfer() -> Chain {
        let config = config();
        let mut chain = Chain::new(&config);
        let wallet = Wallet::new().unwrap();
        let transaction = wallet
            .sign_transfer("bob", 9, 0, config.chain_id(), Gas::new(1, 2, 3))
            .unwrap();
        let head = chain.last_block().clone();
        let proof = ProofOfWork::search(head.get_proof(), 1);
        chain.append_at(10, vec![transaction], head.get_hash(), proof, 1, false);
        chain
    }

    #[test]
    fn test_export_then_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        let chain = chain_with_transfer();
        save_json(&path, &chain).unwrap();

        let imported = load_json(&path, &config()).unwrap();
        assert_eq!(imported.get_blocks(), chain.get_blocks());
        assert!(imported.get_blocks()[1].get_transactions()[0].verify_signature());
    }

    #[test]
    fn test_import_rejects_edited_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        save_json(&path, &chain_with_transfer()).unwrap();

        let mut records: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        records[1]["transactions"][0]["payload"]["recipient"] = json!("mallory");
        fs::write(&path, records.to_string()).unwrap();

        assert!(matches!(
            load_json(&path, &config()),
            Err(BlockchainError::InvalidChain(_))
        ));
        assert_eq!(load_json_blocks(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_import_rejects_rehashed_forgery() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        let config = config();
        let wallet = Wallet::new().unwrap();
        let mut record = wallet
            .sign_transfer("bob", 9, 0, config.chain_id(), Gas::new(1, 2, 3))
            .unwrap()
            .to_record();
        record["payload"]["amount"] = json!(1_000_000);
        let forged = Transaction::from_record(&record).unwrap();

        // Every hash, proof and link in the file is consistent
        let mut chain = Chain::new(&config);
        let head = chain.last_block().clone();
        let proof = ProofOfWork::search(head.get_proof(), 1);
        chain.append_at(10, vec![forged], head.get_hash(), proof, 1, false);
        save_json(&path, &chain).unwrap();
        assert!(Chain::validate_blocks(&load_json_blocks(&path).unwrap()));

        match load_json(&path, &config) {
            Err(BlockchainError::InvalidChain(message)) => {
                assert!(message.contains("invalid signature"), "{message}")
            }
            other => panic!("expected InvalidChain, got {other:?}"),
        }
    }

    #[test]
    fn test_import_rejects_non_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        fs::write(&path, "{\"index\": 0}").unwrap();
        assert!(matches!(
            load_json(&path, &config()),
            Err(BlockchainError::InvalidChain(_))
        ));
    }
}
