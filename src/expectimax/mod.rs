//! Depth-bounded expectimax over afterstates.
//!
//! Max nodes pick the best legal afterstate (`score + chance value`); chance
//! nodes average over every empty cell receiving a 2 (90%) or a 4 (10%);
//! exhausted depth falls back to an [`Evaluator`]. Chance values are memoized
//! in a shared [`TranspositionCache`](crate::cache::TranspositionCache).
//!
//! Quick start
//! ```
//! use tdl_2048::engine::Board;
//! use tdl_2048::expectimax::{Expectimax, SearchConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(123);
//! let b0 = Board::initial(&mut rng);
//!
//! let mut ex = Expectimax::with_config(SearchConfig::default().with_max_depth(2));
//! assert!(ex.best_move(b0).is_some());
//! assert!(ex.state_value(b0) > 0.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::cache::mix64;
use crate::engine::{self, Move};

mod evaluator;
mod heuristic;
mod search;

pub use evaluator::Evaluator;
pub use heuristic::HeuristicEvaluator;
pub use search::Expectimax;

/// Search knobs.
///
/// - `max_depth`: plies searched from the root (a max node and a chance node
///   each consume one). Depth 1 is a greedy one-ply evaluation.
/// - `depth_limits`: cap on the remaining depth at a chance node, indexed by
///   the afterstate's empty-cell count.
/// - `cache_enabled`: enable/disable transposition cache usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub max_depth: u32,
    pub depth_limits: [u32; 17],
    pub cache_enabled: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_depth: 3, depth_limits: [u32::MAX; 17], cache_enabled: true }
    }
}

impl SearchConfig {
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    /// Cap the remaining depth at chance nodes with `empty` empty cells.
    pub fn with_depth_limit(mut self, empty: usize, depth: u32) -> Self {
        if let Some(slot) = self.depth_limits.get_mut(empty) {
            *slot = depth;
        }
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache_enabled = false;
        self
    }

    /// Hash of the knobs that change cached chance values. `max_depth` is
    /// left out: an entry's own depth already bounds its subtree.
    pub fn fingerprint(&self) -> u64 {
        self.depth_limits
            .iter()
            .fold(0x5344_4c32_3034_3800, |acc, &limit| mix64(acc ^ limit as u64))
    }

    /// Effective depth of a chance node with `empty` empty cells.
    #[inline]
    pub(crate) fn clamp(&self, depth: u32, empty: u32) -> u32 {
        let limit = self.depth_limits.get(empty as usize).copied().unwrap_or(u32::MAX);
        depth.min(self.max_depth).min(limit)
    }
}

/// Per-branch expected value at the root.
///
/// - `ev` is the move's score plus the chance value of its afterstate.
/// - `legal` is false when the move is a no-op for the current board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Move,
    pub ev: f32,
    pub legal: bool,
}

/// Counters for a single evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// Common helper for constructors to ensure tables are initialized.
fn warm_engine_and_heuristics() {
    engine::new();
    heuristic::warm();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_applies_both_limits() {
        let cfg = SearchConfig::default().with_max_depth(5).with_depth_limit(12, 1);
        assert_eq!(cfg.clamp(4, 3), 4);
        assert_eq!(cfg.clamp(9, 3), 5);
        assert_eq!(cfg.clamp(4, 12), 1);
        assert_eq!(cfg.clamp(4, 99), 4);
    }

    #[test]
    fn fingerprint_tracks_depth_limits_only() {
        let base = SearchConfig::default();
        assert_eq!(base.fingerprint(), base.clone().with_max_depth(7).without_cache().fingerprint());
        assert_ne!(base.fingerprint(), base.clone().with_depth_limit(10, 2).fingerprint());
    }

    #[test]
    fn out_of_range_limit_is_ignored() {
        let cfg = SearchConfig::default().with_depth_limit(40, 0);
        assert_eq!(cfg, SearchConfig::default());
    }
}
