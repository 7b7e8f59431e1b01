//! Fixed game loop: pick a move, slide, insert a random tile, repeat until
//! no move is legal.

use log::debug;
use rand::Rng;

use crate::engine::{Board, Move, ILLEGAL};
use crate::expectimax::{Evaluator, Expectimax};

/// Chooses a direction for a board; `None` ends the episode.
pub trait Policy {
    fn choose(&mut self, board: Board) -> Option<Move>;
}

impl<E: Evaluator> Policy for Expectimax<E> {
    #[inline]
    fn choose(&mut self, board: Board) -> Option<Move> { self.best_move(board) }
}

/// One-ply policy: the legal move maximizing `score + estimate(after)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy<E>(pub E);

impl<E: Evaluator> Policy for Greedy<E> {
    fn choose(&mut self, board: Board) -> Option<Move> {
        let afters = board.afters();
        let mut best: Option<(Move, f32)> = None;
        for dir in Move::ALL {
            let after = afters[dir.index()];
            if after.info() == ILLEGAL {
                continue;
            }
            let value = after.info() as f32 + self.0.estimate(&after);
            if best.map_or(true, |(_, v)| value > v) {
                best = Some((dir, value));
            }
        }
        best.map(|(dir, _)| dir)
    }
}

/// Outcome of one episode. `max_tile` is the tile value (2048, not 11).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpisodeStats {
    pub score: u64,
    pub moves: u32,
    pub max_tile: u64,
    pub last: Board,
}

/// Play from `board` until the game is over or the policy gives up.
///
/// ```
/// use tdl_2048::engine::Board;
/// use tdl_2048::episode::{play, Greedy};
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let mut rng = StdRng::seed_from_u64(5);
/// let start = Board::initial(&mut rng);
/// let stats = play(start, &mut Greedy(|b: &Board| b.empty_count() as f32), &mut rng);
/// assert!(stats.moves > 0);
/// assert!(stats.last.is_game_over());
/// ```
pub fn play<P, R>(board: Board, policy: &mut P, rng: &mut R) -> EpisodeStats
where
    P: Policy + ?Sized,
    R: Rng + ?Sized,
{
    let mut board = board;
    let mut score = 0u64;
    let mut moves = 0u32;
    while let Some(dir) = policy.choose(board) {
        let t = board.slide(dir);
        if !t.changed {
            debug!("policy chose illegal move {dir:?} on {board:x}; stopping");
            break;
        }
        score += t.score as u64;
        moves += 1;
        board = t.after.with_random_tile(rng);
    }
    let max_tile = match board.max_tile() {
        0 => 0,
        code => 1u64 << code,
    };
    debug!("episode finished: score {score}, moves {moves}, max tile {max_tile}");
    EpisodeStats { score, moves, max_tile, last: board.with_info(0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectimax::SearchConfig;
    use rand::{rngs::StdRng, SeedableRng};

    fn empties(b: &Board) -> f32 { b.empty_count() as f32 }

    /// Replays a fixed direction cycle, skipping illegal ones.
    struct Cycle(usize);

    impl Policy for Cycle {
        fn choose(&mut self, board: Board) -> Option<Move> {
            let legal = board.operations();
            let start = self.0;
            let dir = (0..4).map(|k| Move::ALL[(start + k) % 4]).find(|d| legal & d.bit() != 0)?;
            self.0 += 1;
            Some(dir)
        }
    }

    #[test]
    fn tile_counts_track_merges_and_inserts() {
        let mut rng = StdRng::seed_from_u64(2024);
        let mut board = Board::initial(&mut rng);
        assert_eq!(board.empty_count(), 14);
        let mut policy = Greedy(empties);
        while let Some(dir) = policy.choose(board) {
            let tiles = 16 - board.empty_count();
            let t = board.slide(dir);
            assert!(t.changed);
            assert_eq!(16 - t.after.empty_count(), tiles - t.merges);
            let next = t.after.with_random_tile(&mut rng);
            assert_eq!(16 - next.empty_count(), tiles - t.merges + 1);
            board = next;
        }
        assert!(board.is_game_over());
    }

    #[test]
    fn score_matches_transition_sum() {
        let mut rng = StdRng::seed_from_u64(11);
        let start = Board::initial(&mut rng);
        let mut replay_rng = StdRng::seed_from_u64(42);
        let stats = play(start, &mut Cycle(0), &mut StdRng::seed_from_u64(42));

        let mut board = start;
        let mut score = 0u64;
        let mut policy = Cycle(0);
        for _ in 0..stats.moves {
            let dir = policy.choose(board).unwrap();
            let t = board.slide(dir);
            score += t.score as u64;
            board = t.after.with_random_tile(&mut replay_rng);
        }
        assert_eq!(score, stats.score);
        assert_eq!(board, stats.last);
        assert!(stats.last.is_game_over());
        assert_eq!(stats.max_tile, 1u64 << stats.last.max_tile());
    }

    #[test]
    fn heuristic_search_reaches_midgame() {
        let mut rng = StdRng::seed_from_u64(3);
        let start = Board::initial(&mut rng);
        let mut ex = Expectimax::with_config(SearchConfig::default().with_max_depth(1));
        let stats = play(start, &mut ex, &mut rng);
        assert!(stats.moves > 50);
        assert!(stats.max_tile >= 64);
        assert!(stats.score > 0);
    }

    #[test]
    fn dead_board_plays_no_moves() {
        let dead = Board::from_cells([1, 2, 1, 2, 2, 1, 2, 1, 1, 2, 1, 2, 2, 1, 2, 1]);
        let stats = play(dead, &mut Greedy(empties), &mut StdRng::seed_from_u64(0));
        assert_eq!(stats, EpisodeStats { score: 0, moves: 0, max_tile: 4, last: dead });
    }
}
