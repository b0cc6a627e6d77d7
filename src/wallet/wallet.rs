use crate::core::{ChainId, Gas, Signature, Transaction, UnsignedTransaction};
use crate::error::{BlockchainError, Result};
use crate::utils::{ecdsa_p384_sha384_sign, new_key_pair, public_key_from_pkcs8};
use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

// A P-384 key pair. The sender identity of everything it signs is the hex
// encoding of its public key.
#[derive(Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode, Zeroize, ZeroizeOnDrop)]
pub struct Wallet {
    pkcs8: Vec<u8>,
    public_key: Vec<u8>, // SEC1 uncompressed, 97 bytes
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = new_key_pair()?;
        Self::from_pkcs8(&pkcs8)
    }

    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Wallet> {
        let public_key = public_key_from_pkcs8(pkcs8)?;
        Ok(Wallet {
            pkcs8: pkcs8.to_vec(),
            public_key,
        })
    }

    /// Restores a wallet from the hex key file written by `pkcs8_hex`
    pub fn from_pkcs8_hex(encoded: &str) -> Result<Wallet> {
        let mut pkcs8 = HEXLOWER_PERMISSIVE
            .decode(encoded.trim().as_bytes())
            .map_err(|e| BlockchainError::Crypto(format!("Invalid key encoding: {e}")))?;
        let wallet = Self::from_pkcs8(&pkcs8);
        pkcs8.zeroize();
        wallet
    }

    pub fn pkcs8_hex(&self) -> String {
        HEXLOWER.encode(&self.pkcs8)
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn public_key_hex(&self) -> String {
        HEXLOWER.encode(&self.public_key)
    }

    /// Signs the canonical bytes of `unsigned` and attaches the signature
    pub fn sign_transaction(&self, unsigned: UnsignedTransaction) -> Result<Transaction> {
        let signature = ecdsa_p384_sha384_sign(&self.pkcs8, &unsigned.canonical_bytes())?;
        let signature = Signature::from_fixed_bytes(&signature, &self.public_key)?;
        unsigned.into_signed(signature)
    }

    pub fn sign_transfer(
        &self,
        recipient: &str,
        amount: u64,
        nonce: u64,
        chain: ChainId,
        gas: Gas,
    ) -> Result<Transaction> {
        let unsigned = UnsignedTransaction::transfer(
            &self.public_key_hex(),
            recipient,
            amount,
            nonce,
            chain,
            gas,
        );
        self.sign_transaction(unsigned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Payload;
    use serde_json::json;

    fn transfer(wallet: &Wallet) -> Transaction {
        wallet
            .sign_transfer("bob", 25, 7, ChainId::new(1, 1), Gas::new(1, 10, 21000))
            .unwrap()
    }

    #[test]
    fn test_sender_is_public_key() {
        let wallet = Wallet::new().unwrap();
        let transaction = transfer(&wallet);
        assert_eq!(transaction.get_sender(), wallet.public_key_hex());
        assert_eq!(wallet.get_public_key().len(), 97);
        assert!(matches!(transaction.get_payload(), Payload::Transfer(_)));
    }

    #[test]
    fn test_signed_transfer_verifies() {
        let wallet = Wallet::new().unwrap();
        assert!(transfer(&wallet).verify_signature());
    }

    #[test]
    fn test_altered_transfer_fails_verification() {
        let wallet = Wallet::new().unwrap();
        let mut record = transfer(&wallet).to_record();
        record["nonce"] = json!(8);
        let altered = Transaction::from_record(&record).unwrap();
        assert!(!altered.verify_signature());
    }

    #[test]
    fn test_other_key_fails_verification() {
        let wallet = Wallet::new().unwrap();
        let other = Wallet::new().unwrap();
        let mut record = transfer(&wallet).to_record();
        record["signature"]["public_key"] = json!(other.public_key_hex());
        let swapped = Transaction::from_record(&record).unwrap();
        assert!(!swapped.verify_signature());
    }

    #[test]
    fn test_pkcs8_hex_restores_same_key() {
        let wallet = Wallet::new().unwrap();
        let restored = Wallet::from_pkcs8_hex(&wallet.pkcs8_hex()).unwrap();
        assert_eq!(restored.public_key_hex(), wallet.public_key_hex());
        assert!(transfer(&restored).verify_signature());
    }

    #[test]
    fn test_bad_key_material() {
        assert!(matches!(
            Wallet::from_pkcs8_hex("not hex"),
            Err(BlockchainError::Crypto(_))
        ));
        assert!(matches!(
            Wallet::from_pkcs8_hex("deadbeef"),
            Err(BlockchainError::Crypto(_))
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let wallet = Wallet::new().unwrap();
        let rendered = format!("{wallet:?}");
        assert!(rendered.contains(&wallet.public_key_hex()));
        assert!(!rendered.contains(&wallet.pkcs8_hex()));
    }
}
