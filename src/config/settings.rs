use crate::core::difficulty::{DEFAULT_TARGET_BLOCK_TIME, DEFAULT_TOLERANCE_PERCENT};
use crate::core::proof_of_work::MAX_DIFFICULTY;
use crate::core::{ChainId, DifficultyManager, SearchStrategy};
use crate::error::{BlockchainError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const DIFFICULTY_KEY: &str = "LEDGER_DIFFICULTY";
const TARGET_BLOCK_TIME_KEY: &str = "LEDGER_TARGET_BLOCK_TIME";
const WORKERS_KEY: &str = "LEDGER_WORKERS";
const DATA_DIR_KEY: &str = "LEDGER_DATA_DIR";

static DEFAULT_DATA_DIR: &str = "./data";

/// Which candidate generator the miner uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Sequential,
    Random,
}

impl FromStr for StrategyKind {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(StrategyKind::Sequential),
            "random" => Ok(StrategyKind::Random),
            other => Err(BlockchainError::Config(format!(
                "Invalid search strategy: {other}. Valid options: sequential, random"
            ))),
        }
    }
}

// Everything the chain and the CLI can be tuned with. I pass it around
// explicitly instead of keeping a global.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub initial_difficulty: u32,
    pub target_block_time: f64, // seconds
    pub tolerance_percent: f64,
    pub chain_id: u64,
    pub protocol_version: u32,
    pub mining_workers: usize,
    pub search_strategy: StrategyKind,
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            initial_difficulty: 4,
            target_block_time: DEFAULT_TARGET_BLOCK_TIME,
            tolerance_percent: DEFAULT_TOLERANCE_PERCENT,
            chain_id: 1,
            protocol_version: 1,
            mining_workers: 1,
            search_strategy: StrategyKind::Sequential,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl Config {
    /// Reads a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Config> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Default or file-based config with environment overrides applied.
    /// This is what the binary uses.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(difficulty) = env_value::<u32>(DIFFICULTY_KEY)? {
            self.initial_difficulty = difficulty;
        }
        if let Some(target) = env_value::<f64>(TARGET_BLOCK_TIME_KEY)? {
            self.target_block_time = target;
        }
        if let Some(workers) = env_value::<usize>(WORKERS_KEY)? {
            self.mining_workers = workers;
        }
        if let Ok(dir) = env::var(DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(dir);
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_difficulty == 0 || self.initial_difficulty > MAX_DIFFICULTY {
            return Err(BlockchainError::Config(format!(
                "initial_difficulty must be between 1 and {MAX_DIFFICULTY}, got {}",
                self.initial_difficulty
            )));
        }
        if self.target_block_time.is_nan() || self.target_block_time <= 0.0 {
            return Err(BlockchainError::Config(format!(
                "target_block_time must be positive, got {}",
                self.target_block_time
            )));
        }
        if self.tolerance_percent.is_nan() || self.tolerance_percent < 0.0 {
            return Err(BlockchainError::Config(format!(
                "tolerance_percent must not be negative, got {}",
                self.tolerance_percent
            )));
        }
        if self.mining_workers == 0 {
            return Err(BlockchainError::Config(
                "mining_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn difficulty_manager(&self) -> DifficultyManager {
        DifficultyManager::new(self.target_block_time, self.tolerance_percent)
    }

    pub fn chain_id(&self) -> ChainId {
        ChainId::new(self.chain_id, self.protocol_version)
    }

    /// Random searches are unseeded here; seeding is for tests
    pub fn search_strategy(&self) -> SearchStrategy {
        match self.search_strategy {
            StrategyKind::Sequential => SearchStrategy::Sequential { start: 0 },
            StrategyKind::Random => SearchStrategy::Random { seed: None },
        }
    }

    pub fn blocks_db_path(&self) -> PathBuf {
        self.data_dir.join("blocks")
    }
}

fn env_value<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| BlockchainError::Config(format!("Invalid value for {key}: {raw}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.initial_difficulty, 4);
        assert_eq!(config.target_block_time, 10.0);
        assert_eq!(config.tolerance_percent, 5.0);
        assert_eq!(config.chain_id(), ChainId::new(1, 1));
        assert_eq!(config.mining_workers, 1);
        assert_eq!(config.search_strategy(), SearchStrategy::Sequential { start: 0 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            initial_difficulty = 2
            search_strategy = "random"
            data_dir = "/tmp/ledger"
            "#,
        )
        .unwrap();
        assert_eq!(config.initial_difficulty, 2);
        assert_eq!(config.search_strategy, StrategyKind::Random);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/ledger"));
        assert_eq!(config.target_block_time, 10.0);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for bad in [
            "initial_difficulty = 0",
            "initial_difficulty = 65",
            "target_block_time = 0.0",
            "tolerance_percent = -1.0",
            "mining_workers = 0",
        ] {
            assert!(
                matches!(Config::from_toml(bad), Err(BlockchainError::Config(_))),
                "{bad} was accepted"
            );
        }
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            Config::from_toml("initial_difficulty = \"four\""),
            Err(BlockchainError::Config(_))
        ));
    }

    // The only test touching LEDGER_* variables, so it cannot race another one
    #[test]
    fn test_env_overrides() {
        env::set_var(DIFFICULTY_KEY, "2");
        env::set_var(DATA_DIR_KEY, "/tmp/ledger-env");
        let mut config = Config::default();
        let applied = config.apply_env_overrides();
        env::remove_var(DIFFICULTY_KEY);
        env::remove_var(DATA_DIR_KEY);
        applied.unwrap();
        assert_eq!(config.initial_difficulty, 2);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/ledger-env"));
        assert_eq!(config.mining_workers, 1);

        env::set_var(WORKERS_KEY, "many");
        let result = Config::default().apply_env_overrides();
        env::remove_var(WORKERS_KEY);
        match result {
            Err(BlockchainError::Config(message)) => {
                assert_eq!(message, "Invalid value for LEDGER_WORKERS: many")
            }
            other => panic!("expected a config error, got {other:?}"),
        }

        // Parsable but out of range still goes through validation
        env::set_var(DIFFICULTY_KEY, "0");
        let result = Config::load(None);
        env::remove_var(DIFFICULTY_KEY);
        assert!(matches!(result, Err(BlockchainError::Config(_))));
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("Random".parse::<StrategyKind>().unwrap(), StrategyKind::Random);
        assert!("greedy".parse::<StrategyKind>().is_err());
    }
}
