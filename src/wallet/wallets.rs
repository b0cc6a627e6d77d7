use crate::error::Result;
use crate::utils::{deserialize, serialize};
use crate::wallet::Wallet;
use log::info;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const WALLET_FILE: &str = "wallet.dat";

// Local key store, keyed by hex public key and saved with bincode
pub struct Wallets {
    wallets: BTreeMap<String, Wallet>,
    path: PathBuf,
}

impl Wallets {
    /// Opens the wallet file in `data_dir`, or an empty store if there is none yet
    pub fn open(data_dir: &Path) -> Result<Wallets> {
        let path = data_dir.join(WALLET_FILE);
        let wallets = if path.exists() {
            let bytes = fs::read(&path)?;
            deserialize(&bytes)?
        } else {
            BTreeMap::new()
        };
        Ok(Wallets { wallets, path })
    }

    pub fn create_wallet(&mut self) -> Result<String> {
        let wallet = Wallet::new()?;
        let public_key = wallet.public_key_hex();
        self.wallets.insert(public_key.clone(), wallet);
        self.save()?;
        info!("Created wallet {public_key}");
        Ok(public_key)
    }

    pub fn get_public_keys(&self) -> Vec<String> {
        self.wallets.keys().cloned().collect()
    }

    pub fn get_wallet(&self, public_key: &str) -> Option<&Wallet> {
        self.wallets.get(public_key)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        let wallets_bytes = serialize(&self.wallets)?;
        writer.write_all(wallets_bytes.as_slice())?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallets_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut wallets = Wallets::open(dir.path()).unwrap();
        assert!(wallets.get_public_keys().is_empty());
        let public_key = wallets.create_wallet().unwrap();

        let reopened = Wallets::open(dir.path()).unwrap();
        assert_eq!(reopened.get_public_keys(), vec![public_key.clone()]);
        let wallet = reopened.get_wallet(&public_key).unwrap();
        assert_eq!(wallet.public_key_hex(), public_key);
    }
}
