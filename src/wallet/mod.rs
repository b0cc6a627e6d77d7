//! Key management and transaction signing
//!
//! P-384 key pairs, the local wallet file, and signing of transfers.

#[allow(clippy::module_inception)]
pub mod wallet;
pub mod wallets;

pub use wallet::Wallet;
pub use wallets::{Wallets, WALLET_FILE};
