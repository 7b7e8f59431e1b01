use std::sync::Arc;

use log::trace;

use crate::cache::{CacheConfig, TranspositionCache};
use crate::engine::{Board, Move, ILLEGAL, PROB_LOW, TILE_HIGH, TILE_LOW};

use super::{warm_engine_and_heuristics, BranchEval, Evaluator, HeuristicEvaluator, SearchConfig, SearchStats};

/// Depth-bounded expectimax with a shared transposition cache.
///
/// The search is synchronous within one call. Run independent episodes on
/// separate instances (or threads) and hand them the same cache through
/// [`Expectimax::with_cache`] to share work.
///
/// Cache entries are namespaced by [`SearchConfig::fingerprint`] and
/// [`Evaluator::fingerprint`]. Two closures both report fingerprint 0, so
/// searchers with different closure evaluators must not share a cache.
pub struct Expectimax<E: Evaluator = HeuristicEvaluator> {
    cfg: SearchConfig,
    evaluator: E,
    cache: Option<Arc<TranspositionCache>>,
    namespace: u64,
    stats: SearchStats,
}

impl Expectimax<HeuristicEvaluator> {
    pub fn new() -> Self { Self::with_config(SearchConfig::default()) }

    pub fn with_config(cfg: SearchConfig) -> Self { Self::with_evaluator(HeuristicEvaluator::new(), cfg) }
}

impl Default for Expectimax<HeuristicEvaluator> {
    fn default() -> Self { Self::new() }
}

impl<E: Evaluator> Expectimax<E> {
    /// Search with a custom leaf evaluator. A private cache is allocated when
    /// `cfg.cache_enabled` is set.
    pub fn with_evaluator(evaluator: E, cfg: SearchConfig) -> Self {
        let cache = cfg.cache_enabled.then(|| Arc::new(TranspositionCache::new(&CacheConfig::default())));
        Self::with_parts(evaluator, cfg, cache)
    }

    /// Search over an existing (usually shared) cache. `cache` is dropped
    /// when `cfg.cache_enabled` is unset.
    pub fn with_parts(evaluator: E, cfg: SearchConfig, cache: Option<Arc<TranspositionCache>>) -> Self {
        warm_engine_and_heuristics();
        let cache = cache.filter(|_| cfg.cache_enabled);
        let namespace = cfg.fingerprint() ^ evaluator.fingerprint();
        Self { cfg, evaluator, cache, namespace, stats: SearchStats::default() }
    }

    /// Replace the cache with a shared one. Ignored while the cache is disabled.
    pub fn with_cache(mut self, cache: Arc<TranspositionCache>) -> Self {
        if self.cfg.cache_enabled {
            self.cache = Some(cache);
        }
        self
    }

    #[inline]
    pub fn config(&self) -> &SearchConfig { &self.cfg }

    #[inline]
    pub fn evaluator(&self) -> &E { &self.evaluator }

    #[inline]
    pub fn cache(&self) -> Option<&Arc<TranspositionCache>> { self.cache.as_ref() }

    /// Value of a max node at the configured depth; 0 when no move is legal.
    pub fn state_value(&mut self, board: Board) -> f32 {
        let mut stats = SearchStats::default();
        let value = self.max_value(board, self.cfg.max_depth, &mut stats);
        self.stats = stats;
        value
    }

    /// Expected value of each direction at the root, in [`Move::ALL`] order.
    /// Illegal directions are marked `legal = false` with `ev = 0`.
    pub fn branch_evals(&mut self, board: Board) -> [BranchEval; 4] {
        let mut stats = SearchStats::default();
        stats.nodes += 1;
        let depth = self.cfg.max_depth.saturating_sub(1);
        let afters = board.afters();
        let out = Move::ALL.map(|dir| {
            let after = afters[dir.index()];
            if after.info() == ILLEGAL {
                BranchEval { dir, ev: 0.0, legal: false }
            } else {
                let ev = after.info() as f32 + self.chance_value(after, depth, &mut stats);
                BranchEval { dir, ev, legal: true }
            }
        });
        trace!("branch evals for {board:x}: {out:?}");
        self.stats = stats;
        out
    }

    /// Best legal direction, or `None` when the game is over. Ties go to the
    /// earliest direction in [`Move::ALL`].
    #[inline]
    pub fn best_move(&mut self, board: Board) -> Option<Move> {
        let branches = self.branch_evals(board);
        branches
            .iter()
            .filter(|branch| branch.legal)
            .fold(None, |best: Option<&BranchEval>, branch| match best {
                Some(b) if b.ev >= branch.ev => Some(b),
                _ => Some(branch),
            })
            .map(|branch| branch.dir)
    }

    /// Statistics collected from the last call to [`Self::best_move`],
    /// [`Self::branch_evals`] or [`Self::state_value`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }

    fn max_value(&self, board: Board, depth: u32, stats: &mut SearchStats) -> f32 {
        stats.nodes += 1;
        let next = depth.saturating_sub(1);
        let mut best = f32::NEG_INFINITY;
        for after in board.afters() {
            if after.info() == ILLEGAL {
                continue;
            }
            let value = after.info() as f32 + self.chance_value(after, next, stats);
            best = best.max(value);
        }
        if best == f32::NEG_INFINITY { 0.0 } else { best }
    }

    fn chance_value(&self, after: Board, depth: u32, stats: &mut SearchStats) -> f32 {
        stats.nodes += 1;
        let spaces = after.spaces();
        let depth = self.cfg.clamp(depth, spaces.len() as u32);
        if depth == 0 || spaces.is_empty() {
            return self.evaluator.estimate(&after);
        }

        if let Some(cache) = &self.cache {
            if let Some(value) = cache.probe_in(self.namespace, &after, depth) {
                stats.cache_hits += 1;
                return value;
            }
            stats.cache_misses += 1;
        }

        let next = depth - 1;
        let mut total = 0.0f32;
        for cell in spaces.iter() {
            let mut low = after;
            low.set(cell as usize, TILE_LOW);
            let mut high = after;
            high.set(cell as usize, TILE_HIGH);
            total += PROB_LOW * self.max_value(low, next, stats)
                + (1.0 - PROB_LOW) * self.max_value(high, next, stats);
        }
        let value = total / spaces.len() as f32;

        if let Some(cache) = &self.cache {
            cache.store_in(self.namespace, &after, depth, value);
        }
        value
    }
}
