// Mining loop around a shared chain. The expensive search runs without holding
// any lock; only the snapshot and the final append touch the chain.

use crate::config::Config;
use crate::core::{
    Block, ProofOfWork, SearchOutcome, SearchStrategy, SharedChain, StopSignal, Transaction,
};
use crate::error::Result;
use log::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiningOutcome {
    Mined(Block),
    /// The head moved while the search ran, so the proof is for an old tip
    Stale,
    Cancelled,
}

/// What the miner copied out of the chain before searching
#[derive(Debug, Clone)]
pub struct MiningJob {
    previous_hash: String,
    previous_proof: u64,
    difficulty: u32,
    transactions: Vec<Transaction>,
}

impl MiningJob {
    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn get_previous_proof(&self) -> u64 {
        self.previous_proof
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }
}

pub struct Miner {
    chain: SharedChain,
    workers: usize,
    strategy: SearchStrategy,
}

impl Miner {
    pub fn new(chain: SharedChain) -> Miner {
        Miner {
            chain,
            workers: 1,
            strategy: SearchStrategy::default(),
        }
    }

    pub fn from_config(chain: SharedChain, config: &Config) -> Miner {
        Miner {
            chain,
            workers: config.mining_workers,
            strategy: config.search_strategy(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Miner {
        self.workers = workers.max(1);
        self
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Miner {
        self.strategy = strategy;
        self
    }

    /// Mines one block holding the currently pending transactions
    pub fn mine_block(&self, stop: &StopSignal) -> Result<MiningOutcome> {
        let job = self.prepare()?;
        debug!(
            "Searching for a proof over {} at difficulty {} with {} worker(s)",
            job.previous_proof, job.difficulty, self.workers
        );

        match ProofOfWork::search_parallel(
            job.previous_proof,
            job.difficulty,
            self.workers,
            self.strategy,
            stop,
        ) {
            SearchOutcome::Found(proof) => self.submit(job, proof),
            SearchOutcome::Cancelled => {
                info!("Mining cancelled");
                Ok(MiningOutcome::Cancelled)
            }
        }
    }

    /// Snapshots the head and pending transactions under a read lock
    pub fn prepare(&self) -> Result<MiningJob> {
        self.chain.read(|chain| {
            let head = chain.last_block();
            MiningJob {
                previous_hash: head.get_hash().to_string(),
                previous_proof: head.get_proof(),
                difficulty: chain.get_current_difficulty(),
                transactions: chain.get_pending_transactions().to_vec(),
            }
        })
    }

    /// Appends the block for `job` if the head is still the one it was built on
    pub fn submit(&self, job: MiningJob, proof: u64) -> Result<MiningOutcome> {
        self.chain.write(|chain| -> Result<MiningOutcome> {
            if chain.last_block().get_hash() != job.previous_hash {
                info!("Discarding proof {proof}: the chain head moved during the search");
                return Ok(MiningOutcome::Stale);
            }

            // Transactions submitted after the snapshot go back in the queue
            let late: Vec<Transaction> = chain
                .get_pending_transactions()
                .iter()
                .filter(|pending| !job.transactions.contains(pending))
                .cloned()
                .collect();

            let block = chain.append(
                job.transactions,
                &job.previous_hash,
                proof,
                job.difficulty,
                true,
            )?;
            for transaction in late {
                chain.add_transaction(transaction)?;
            }
            Ok(MiningOutcome::Mined(block))
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Chain, Gas};
    use crate::wallet::Wallet;
    use std::time::Duration;

    fn shared_chain(difficulty: u32) -> (SharedChain, Config) {
        let config = Config {
            initial_difficulty: difficulty,
            ..Config::default()
        };
        (SharedChain::new(Chain::new(&config)), config)
    }

    #[test]
    fn test_mine_block_appends_valid_block() {
        let (chain, _) = shared_chain(2);
        let miner = Miner::new(chain.clone());

        let outcome = miner.mine_block(&StopSignal::new()).unwrap();
        let MiningOutcome::Mined(block) = outcome else {
            panic!("expected a mined block, got {outcome:?}");
        };
        assert_eq!(block.get_index(), 1);
        assert_eq!(chain.len().unwrap(), 2);
        assert!(chain.validate_chain().unwrap());
    }

    #[test]
    fn test_mined_block_carries_pending_transactions() {
        let (chain, config) = shared_chain(1);
        let wallet = Wallet::new().unwrap();
        let transaction = wallet
            .sign_transfer("bob", 5, 0, config.chain_id(), Gas::new(0, 1, 21000))
            .unwrap();
        assert!(chain.add_transaction(transaction.clone()).unwrap());

        let miner = Miner::from_config(chain.clone(), &config).with_workers(2);
        match miner.mine_block(&StopSignal::new()).unwrap() {
            MiningOutcome::Mined(block) => {
                assert_eq!(block.get_transactions(), &[transaction]);
            }
            other => panic!("expected a mined block, got {other:?}"),
        }
        assert!(chain
            .read(|c| c.get_pending_transactions().is_empty())
            .unwrap());
    }

    #[test]
    fn test_late_transactions_stay_pending() {
        let (chain, config) = shared_chain(1);
        let miner = Miner::new(chain.clone());
        let job = miner.prepare().unwrap();

        let wallet = Wallet::new().unwrap();
        let late = wallet
            .sign_transfer("carol", 3, 0, config.chain_id(), Gas::new(0, 1, 21000))
            .unwrap();
        assert!(chain.add_transaction(late.clone()).unwrap());

        let proof = ProofOfWork::search(job.get_previous_proof(), job.get_difficulty());
        let outcome = miner.submit(job, proof).unwrap();
        assert!(matches!(outcome, MiningOutcome::Mined(ref b) if b.get_transactions().is_empty()));
        assert_eq!(
            chain.read(|c| c.get_pending_transactions().to_vec()).unwrap(),
            vec![late]
        );
    }

    #[test]
    fn test_moved_head_is_stale() {
        let (chain, _) = shared_chain(1);
        let miner = Miner::new(chain.clone());
        let job = miner.prepare().unwrap();
        let proof = ProofOfWork::search(job.get_previous_proof(), job.get_difficulty());

        // Another miner wins the race
        assert!(matches!(
            Miner::new(chain.clone()).mine_block(&StopSignal::new()).unwrap(),
            MiningOutcome::Mined(_)
        ));

        assert_eq!(miner.submit(job, proof).unwrap(), MiningOutcome::Stale);
        assert_eq!(chain.len().unwrap(), 2);
        assert!(chain.validate_chain().unwrap());
    }

    #[test]
    fn test_cancelled_mining_leaves_chain_alone() {
        let (chain, _) = shared_chain(1);
        chain
            .write(|c| {
                let head = c.last_block().clone();
                let proof = ProofOfWork::search(head.get_proof(), 1);
                c.append_at(10, vec![], head.get_hash(), proof, 1, false);
            })
            .unwrap();
        let miner = Miner::new(chain.clone()).with_strategy(SearchStrategy::Random { seed: Some(1) });
        let stop = StopSignal::with_timeout(Duration::from_millis(0));
        assert_eq!(miner.mine_block(&stop).unwrap(), MiningOutcome::Cancelled);
        assert_eq!(chain.len().unwrap(), 2);
    }
}
