use crate::utils::sha256_hex;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A hex SHA-256 digest has 64 characters, so no proof can satisfy more
pub const MAX_DIFFICULTY: u32 = 64;

/// Cancellation handle for a running search. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl StopSignal {
    pub fn new() -> StopSignal {
        StopSignal::default()
    }

    /// A signal that also trips once `timeout` has elapsed
    pub fn with_timeout(timeout: Duration) -> StopSignal {
        StopSignal {
            stopped: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        if self.stopped.load(Ordering::Relaxed) {
            return true;
        }
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }
}

/// How candidate proofs are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    /// Consecutive integers from `start`. Deterministic.
    Sequential { start: u64 },
    /// Uniformly sampled integers; seeded for reproducible runs
    Random { seed: Option<u64> },
}

impl Default for SearchStrategy {
    fn default() -> Self {
        SearchStrategy::Sequential { start: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(u64),
    Cancelled,
}

impl SearchOutcome {
    pub fn proof(&self) -> Option<u64> {
        match self {
            SearchOutcome::Found(proof) => Some(*proof),
            SearchOutcome::Cancelled => None,
        }
    }
}

/// Stateless proof-of-work: the predicate and the searches built on it
pub struct ProofOfWork;

impl ProofOfWork {
    /// True when the hex SHA-256 of `"{previous_proof}{candidate_proof}"`
    /// starts with `difficulty` zeros. Mining and validation both use this.
    pub fn is_valid(previous_proof: u64, candidate_proof: u64, difficulty: u32) -> bool {
        if difficulty > MAX_DIFFICULTY {
            return false;
        }
        let guess = format!("{previous_proof}{candidate_proof}");
        let digest = sha256_hex(guess.as_bytes());
        digest.bytes().take(difficulty as usize).all(|b| b == b'0')
    }

    /// Sequential search from 0 until a proof is found.
    ///
    /// `difficulty` must not exceed [`MAX_DIFFICULTY`], debug builds panic
    /// otherwise. The search cannot be interrupted, use
    /// [`ProofOfWork::search_with`] for that.
    pub fn search(previous_proof: u64, difficulty: u32) -> u64 {
        debug_assert!(
            difficulty <= MAX_DIFFICULTY,
            "difficulty {difficulty} exceeds {MAX_DIFFICULTY}, no proof can exist"
        );
        let mut candidate = 0u64;
        while !Self::is_valid(previous_proof, candidate, difficulty) {
            candidate = candidate.wrapping_add(1);
        }
        debug!("Proof found: {candidate} (difficulty {difficulty})");
        candidate
    }

    /// Single-worker search that polls `stop` between attempts
    pub fn search_with(
        previous_proof: u64,
        difficulty: u32,
        strategy: SearchStrategy,
        stop: &StopSignal,
    ) -> SearchOutcome {
        let found = AtomicBool::new(false);
        match run_worker(previous_proof, difficulty, strategy, 0, 1, stop, &found) {
            Some(proof) => SearchOutcome::Found(proof),
            None => SearchOutcome::Cancelled,
        }
    }

    /// Splits the search across `workers` threads. Sequential workers take
    /// interleaved disjoint ranges, random workers get distinct seeds. The
    /// first worker to find a proof wins and the rest stop.
    pub fn search_parallel(
        previous_proof: u64,
        difficulty: u32,
        workers: usize,
        strategy: SearchStrategy,
        stop: &StopSignal,
    ) -> SearchOutcome {
        let workers = workers.max(1);
        if workers == 1 {
            return Self::search_with(previous_proof, difficulty, strategy, stop);
        }

        let found = AtomicBool::new(false);
        let winner = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    let found = &found;
                    scope.spawn(move || {
                        run_worker(
                            previous_proof,
                            difficulty,
                            strategy,
                            worker as u64,
                            workers as u64,
                            stop,
                            found,
                        )
                    })
                })
                .collect();

            handles
                .into_iter()
                .filter_map(|handle| handle.join().ok().flatten())
                .next()
        });

        match winner {
            Some(proof) => {
                debug!("Proof found by one of {workers} workers: {proof}");
                SearchOutcome::Found(proof)
            }
            None => SearchOutcome::Cancelled,
        }
    }
}

// Runs until this worker finds a proof, another worker has won, or `stop` trips.
// Only the worker that flips `found` returns Some.
fn run_worker(
    previous_proof: u64,
    difficulty: u32,
    strategy: SearchStrategy,
    worker: u64,
    workers: u64,
    stop: &StopSignal,
    found: &AtomicBool,
) -> Option<u64> {
    if difficulty > MAX_DIFFICULTY {
        return None;
    }

    let mut next_candidate: Box<dyn FnMut() -> u64> = match strategy {
        SearchStrategy::Sequential { start } => {
            let mut candidate = start.wrapping_add(worker);
            Box::new(move || {
                let current = candidate;
                candidate = candidate.wrapping_add(workers);
                current
            })
        }
        SearchStrategy::Random { seed } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(worker)),
                None => StdRng::from_entropy(),
            };
            Box::new(move || rng.gen::<u64>())
        }
    };

    loop {
        if stop.is_stopped() || found.load(Ordering::Relaxed) {
            return None;
        }
        let candidate = next_candidate();
        if ProofOfWork::is_valid(previous_proof, candidate, difficulty) {
            return found
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .ok()
                .map(|_| candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leading_zeros(previous_proof: u64, candidate: u64) -> usize {
        sha256_hex(format!("{previous_proof}{candidate}").as_bytes())
            .chars()
            .take_while(|c| *c == '0')
            .count()
    }

    #[test]
    fn test_is_valid_matches_digest_prefix() {
        for candidate in 0..200u64 {
            let zeros = leading_zeros(100, candidate) as u32;
            assert!(ProofOfWork::is_valid(100, candidate, zeros));
            assert!(!ProofOfWork::is_valid(100, candidate, zeros + 1));
        }
    }

    #[test]
    fn test_difficulty_zero_accepts_anything() {
        assert!(ProofOfWork::is_valid(0, 0, 0));
        assert!(ProofOfWork::is_valid(12345, 67890, 0));
    }

    #[test]
    fn test_unreachable_difficulty_is_invalid() {
        assert!(!ProofOfWork::is_valid(0, 0, MAX_DIFFICULTY + 1));
    }

    #[test]
    fn test_search_finds_valid_proof() {
        for difficulty in 1..=3 {
            let proof = ProofOfWork::search(42, difficulty);
            assert!(ProofOfWork::is_valid(42, proof, difficulty));
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "no proof can exist")]
    fn test_search_refuses_unreachable_difficulty() {
        ProofOfWork::search(0, MAX_DIFFICULTY + 1);
    }

    #[test]
    fn test_sequential_search_returns_smallest_proof() {
        let proof = ProofOfWork::search(7, 2);
        assert!((0..proof).all(|candidate| !ProofOfWork::is_valid(7, candidate, 2)));
        let outcome = ProofOfWork::search_with(7, 2, SearchStrategy::default(), &StopSignal::new());
        assert_eq!(outcome, SearchOutcome::Found(proof));
    }

    #[test]
    fn test_random_search_with_seed_is_reproducible() {
        let strategy = SearchStrategy::Random { seed: Some(9) };
        let first = ProofOfWork::search_with(1, 2, strategy, &StopSignal::new());
        let second = ProofOfWork::search_with(1, 2, strategy, &StopSignal::new());
        assert_eq!(first, second);
        assert!(ProofOfWork::is_valid(1, first.proof().unwrap(), 2));
    }

    #[test]
    fn test_stopped_signal_cancels_search() {
        let stop = StopSignal::new();
        stop.stop();
        let outcome = ProofOfWork::search_with(0, 1, SearchStrategy::default(), &stop);
        assert_eq!(outcome, SearchOutcome::Cancelled);
    }

    #[test]
    fn test_timeout_cancels_impossible_search() {
        let stop = StopSignal::with_timeout(Duration::from_millis(50));
        let outcome =
            ProofOfWork::search_with(0, MAX_DIFFICULTY, SearchStrategy::default(), &stop);
        assert_eq!(outcome, SearchOutcome::Cancelled);
    }

    #[test]
    fn test_parallel_search_finds_valid_proof() {
        let outcome =
            ProofOfWork::search_parallel(5, 3, 4, SearchStrategy::default(), &StopSignal::new());
        let proof = outcome.proof().expect("a proof should be found");
        assert!(ProofOfWork::is_valid(5, proof, 3));
    }

    #[test]
    fn test_parallel_search_can_be_cancelled() {
        let stop = StopSignal::with_timeout(Duration::from_millis(50));
        let outcome = ProofOfWork::search_parallel(
            0,
            MAX_DIFFICULTY,
            3,
            SearchStrategy::Random { seed: None },
            &stop,
        );
        assert_eq!(outcome, SearchOutcome::Cancelled);
    }
}
