use crate::engine::Board;

/// Long-run value estimate of an afterstate, consulted at search leaves.
///
/// Implementations must be pure with respect to `estimate`: the search calls
/// it from many workers at once and expects the same answer for the same
/// board. `optimize` exists for training collaborators and is never called
/// by the search.
pub trait Evaluator: Sync {
    fn estimate(&self, board: &Board) -> f32;

    /// Move the estimate of `board` toward `target` and return the new
    /// estimate. Evaluators without learnable parameters leave it unchanged.
    fn optimize(&self, board: &Board, target: f32, learning_rate: f32) -> f32 {
        let _ = (target, learning_rate);
        self.estimate(board)
    }

    /// Identifies the estimates this evaluator produces. Searchers sharing a
    /// transposition cache reuse each other's values only when fingerprints
    /// match, so evaluators with different estimates need different values.
    /// Closures all report 0.
    fn fingerprint(&self) -> u64 { 0 }
}

impl<F> Evaluator for F
where
    F: Fn(&Board) -> f32 + Sync,
{
    #[inline]
    fn estimate(&self, board: &Board) -> f32 { self(board) }
}
