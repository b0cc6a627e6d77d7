use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ledger-chain", about = "Proof-of-work ledger with signed transfers")]
pub struct Opt {
    #[arg(long, global = true, help = "Path to a TOML config file")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "init", about = "Create a new chain holding only the genesis block")]
    Init {
        #[arg(long, help = "Replace an existing chain")]
        force: bool,
    },
    #[command(name = "createwallet", about = "Create a new wallet")]
    Createwallet,
    #[command(name = "listwallets", about = "Print the public keys of local wallets")]
    ListWallets,
    #[command(name = "send", about = "Sign a transfer and queue it for the next block")]
    Send {
        #[arg(help = "Public key of a local wallet")]
        from: String,
        #[arg(help = "Recipient identity")]
        to: String,
        #[arg(help = "Amount to transfer")]
        amount: u64,
        #[arg(long, help = "Sender nonce")]
        nonce: u64,
        #[arg(long, default_value_t = 0, help = "Priority tip")]
        tip: u64,
        #[arg(long = "max-fee", default_value_t = 1, help = "Maximum fee")]
        max_fee: u64,
        #[arg(long, default_value_t = 21000, help = "Gas limit")]
        limit: u64,
        #[arg(long, help = "Mine a block right away")]
        mine: bool,
    },
    #[command(name = "mine", about = "Mine a block with the queued transactions")]
    Mine {
        #[arg(long, help = "Give up after this many seconds")]
        timeout: Option<u64>,
    },
    #[command(name = "validate", about = "Check every hash, proof and link of the stored chain")]
    Validate,
    #[command(name = "printchain", about = "Print all blocks in the chain")]
    Printchain,
    #[command(name = "export", about = "Write the chain to a JSON file")]
    Export {
        #[arg(help = "Destination file")]
        path: PathBuf,
    },
    #[command(name = "import", about = "Replace the stored chain with a validated JSON file")]
    Import {
        #[arg(help = "Source file")]
        path: PathBuf,
    },
}
