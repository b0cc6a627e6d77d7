// Entry point for the ledger CLI. Every command opens the sled store under the
// configured data directory, does its work and exits.
use clap::Parser;
use ledger_chain::{
    load_json, save_json, BlockStore, Chain, Command, Config, Gas, LogObserver, Miner,
    MiningOutcome, Opt, Payload, SharedChain, StopSignal, Wallets,
};
use log::{error, warn, LevelFilter};
use std::fs;
use std::process;
use std::sync::Arc;
use std::time::Duration;

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    // Info by default, RUST_LOG still wins when it is set
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run(opt: Opt) -> CliResult {
    let config = Config::load(opt.config.as_deref())?;
    run_command(opt.command, &config)
}

fn open_store(config: &Config) -> Result<BlockStore, Box<dyn std::error::Error>> {
    fs::create_dir_all(&config.data_dir)?;
    Ok(BlockStore::open(&config.blocks_db_path())?)
}

fn run_command(command: Command, config: &Config) -> CliResult {
    match command {
        Command::Init { force } => {
            let store = open_store(config)?;
            if !store.is_empty() && !force {
                return Err("A chain already exists here. Use --force to replace it.".into());
            }
            let chain = Chain::new(config);
            store.save_chain(&chain)?;
            store.clear_pending()?;
            println!("Genesis block: {}", chain.last_block().get_hash());
        }
        Command::Createwallet => {
            fs::create_dir_all(&config.data_dir)?;
            let mut wallets = Wallets::open(&config.data_dir)?;
            let public_key = wallets.create_wallet()?;
            println!("Your new public key: {public_key}")
        }
        Command::ListWallets => {
            let wallets = Wallets::open(&config.data_dir)?;
            for public_key in wallets.get_public_keys() {
                println!("{public_key}")
            }
        }
        Command::Send {
            from,
            to,
            amount,
            nonce,
            tip,
            max_fee,
            limit,
            mine,
        } => {
            let wallets = Wallets::open(&config.data_dir)?;
            let wallet = wallets
                .get_wallet(&from)
                .ok_or_else(|| format!("No local wallet for {from}"))?;
            let transaction = wallet.sign_transfer(
                &to,
                amount,
                nonce,
                config.chain_id(),
                Gas::new(tip, max_fee, limit),
            )?;

            // Checked against the chain before it is queued
            let store = open_store(config)?;
            let mut chain = store.load_chain(config)?;
            if !chain.add_transaction(transaction.clone())? {
                return Err("Transaction was rejected".into());
            }
            store.put_pending(&transaction)?;

            if mine {
                mine_pending(&store, config, None)?;
            }
            println!("Success!")
        }
        Command::Mine { timeout } => {
            let store = open_store(config)?;
            mine_pending(&store, config, timeout)?;
        }
        Command::Validate => {
            let store = open_store(config)?;
            let blocks = store.load_blocks()?;
            if !Chain::validate_blocks(&blocks) {
                return Err(format!("Chain of {} blocks is invalid", blocks.len()).into());
            }
            println!("Chain of {} blocks is valid", blocks.len());
        }
        Command::Printchain => {
            let store = open_store(config)?;
            for block in store.load_blocks()? {
                println!("Index: {}", block.get_index());
                println!("Timestamp: {}", block.get_timestamp());
                println!("Previous hash: {}", block.get_previous_hash());
                println!("Hash: {}", block.get_hash());
                println!("Proof: {} (difficulty {})", block.get_proof(), block.get_difficulty());
                for transaction in block.get_transactions() {
                    match transaction.get_payload() {
                        Payload::Transfer(transfer) => println!(
                            "- {} {} -> {} amount {} nonce {}",
                            transaction.get_transaction_type(),
                            transaction.get_sender(),
                            transfer.get_recipient(),
                            transfer.get_amount(),
                            transaction.get_nonce()
                        ),
                    }
                }
                println!()
            }
        }
        Command::Export { path } => {
            let store = open_store(config)?;
            let chain = store.load_chain(config)?;
            save_json(&path, &chain)?;
            println!("Exported {} blocks to {}", chain.len(), path.display());
        }
        Command::Import { path } => {
            let chain = load_json(&path, config)?;
            let store = open_store(config)?;
            store.save_chain(&chain)?;
            store.clear_pending()?;
            println!("Imported {} blocks from {}", chain.len(), path.display());
        }
    }
    Ok(())
}

// Loads the chain, re-submits the queued transactions and mines one block on top
fn mine_pending(store: &BlockStore, config: &Config, timeout: Option<u64>) -> CliResult {
    let mut chain = store.load_chain(config)?.with_observer(Arc::new(LogObserver));
    for transaction in store.load_pending()? {
        if !chain.add_transaction(transaction)? {
            warn!("Dropping a queued transaction that no longer verifies");
        }
    }

    let miner = Miner::from_config(SharedChain::new(chain), config);
    let stop = timeout
        .map(|secs| StopSignal::with_timeout(Duration::from_secs(secs)))
        .unwrap_or_default();

    match miner.mine_block(&stop)? {
        MiningOutcome::Mined(block) => {
            store.put_block(&block)?;
            store.clear_pending()?;
            println!(
                "Mined block {} with {} transactions: {}",
                block.get_index(),
                block.get_transactions().len(),
                block.get_hash()
            );
        }
        MiningOutcome::Stale => println!("The chain moved during mining, nothing appended"),
        MiningOutcome::Cancelled => println!("Mining timed out, nothing appended"),
    }
    Ok(())
}
