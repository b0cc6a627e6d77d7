use crate::core::proof_of_work::MAX_DIFFICULTY;
use crate::core::{Block, Chain};
use log::info;

// Difficulty adjustment constants
pub const DEFAULT_TARGET_BLOCK_TIME: f64 = 10.0; // seconds
pub const DEFAULT_TOLERANCE_PERCENT: f64 = 5.0; // dead band around the target
pub const RETARGET_WINDOW: usize = 10; // blocks sampled for the average
pub const MIN_DIFFICULTY: u32 = 1;

/// Moves difficulty one step at a time toward the target block time.
/// Reads a block snapshot, never mutates it; the caller applies the result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyManager {
    target_block_time: f64,
    tolerance_percent: f64,
}

impl Default for DifficultyManager {
    fn default() -> Self {
        DifficultyManager::new(DEFAULT_TARGET_BLOCK_TIME, DEFAULT_TOLERANCE_PERCENT)
    }
}

impl DifficultyManager {
    pub fn new(target_block_time: f64, tolerance_percent: f64) -> DifficultyManager {
        DifficultyManager {
            target_block_time,
            tolerance_percent,
        }
    }

    pub fn get_target_block_time(&self) -> f64 {
        self.target_block_time
    }

    pub fn get_tolerance_percent(&self) -> f64 {
        self.tolerance_percent
    }

    /// Next difficulty for a chain whose blocks are `blocks` (genesis first).
    ///
    /// Unchanged until the chain holds more than `RETARGET_WINDOW` blocks.
    /// After that the mean of the 9 gaps between the last 10 timestamps is
    /// compared with the target: too fast adds one, too slow removes one
    /// (never below `MIN_DIFFICULTY`), inside the tolerance band keeps it.
    pub fn retarget(&self, blocks: &[Block], current_difficulty: u32) -> u32 {
        let Some(average) = Self::average_block_time(blocks) else {
            return current_difficulty;
        };

        let target = self.target_block_time;
        let deviation = (average - target).abs();
        let new_difficulty = if deviation * 100.0 <= self.tolerance_percent * target {
            current_difficulty
        } else if average < target {
            current_difficulty.saturating_add(1).min(MAX_DIFFICULTY)
        } else {
            current_difficulty.saturating_sub(1).max(MIN_DIFFICULTY)
        };

        if new_difficulty != current_difficulty {
            info!(
                "Difficulty adjusted {current_difficulty} -> {new_difficulty} (average block time {average:.2}s, target {target:.2}s)"
            );
        }
        new_difficulty
    }

    /// Convenience wrapper reading the chain's own blocks and difficulty
    pub fn retarget_chain(&self, chain: &Chain) -> u32 {
        self.retarget(chain.get_blocks(), chain.get_current_difficulty())
    }

    /// Mean gap between consecutive timestamps of the last `RETARGET_WINDOW`
    /// blocks, or `None` while the chain is too short.
    pub fn average_block_time(blocks: &[Block]) -> Option<f64> {
        if blocks.len() <= RETARGET_WINDOW {
            return None;
        }
        let window = &blocks[blocks.len() - RETARGET_WINDOW..];
        // Timestamps come from outside, so gaps and their sum can exceed i64
        let total: i128 = window
            .windows(2)
            .map(|pair| i128::from(pair[1].get_timestamp()) - i128::from(pair[0].get_timestamp()))
            .sum();
        Some(total as f64 / (RETARGET_WINDOW - 1) as f64)
    }
}
