use std::sync::OnceLock;

use crate::engine::Board;

use super::Evaluator;

static HEURISTIC_SCORES: OnceLock<Box<[f32]>> = OnceLock::new();

pub(crate) fn warm() {
    let _ = heuristic_scores();
}

fn heuristic_scores() -> &'static [f32] {
    HEURISTIC_SCORES
        .get_or_init(|| {
            let mut v = vec![0.0f32; 0x1_0000];
            for (i, slot) in v.iter_mut().enumerate() {
                *slot = calc_heuristic_score(i as u32) as f32;
            }
            v.into_boxed_slice()
        })
        .as_ref()
}

/// Hand-tuned line heuristic summed over the four rows and four columns.
///
/// Reads the low 4 bits of each cell only; overflow bits are ignored, which
/// only matters beyond the 32768 tile.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEvaluator;

impl HeuristicEvaluator {
    pub fn new() -> Self {
        warm();
        HeuristicEvaluator
    }
}

impl Evaluator for HeuristicEvaluator {
    #[inline]
    fn estimate(&self, board: &Board) -> f32 {
        let scores = heuristic_scores();
        let rows = board.raw();
        let cols = board.transpose().raw();
        (0..4).fold(0.0, |acc, r| {
            let row = ((rows >> (r << 4)) & 0xffff) as usize;
            let col = ((cols >> (r << 4)) & 0xffff) as usize;
            acc + scores[row] + scores[col]
        })
    }

    fn fingerprint(&self) -> u64 { 0x4845_5552_4953_5443 }
}

// Credit to Nneonneo for heuristic structure
fn calc_heuristic_score(line: u32) -> f64 {
    const LOST_PENALTY: f64 = 200_000.0;
    let tiles: [u32; 4] = std::array::from_fn(|j| (line >> (j << 2)) & 0xf);
    LOST_PENALTY + calc_empty(&tiles) + calc_merges(&tiles) - calc_monotonicity(&tiles) - calc_sum(&tiles)
}

fn calc_sum(line: &[u32; 4]) -> f64 {
    const SUM_POWER: f64 = 3.5;
    const SUM_WEIGHT: f64 = 11.0;
    line.iter().map(|&t| (t as f64).powf(SUM_POWER)).sum::<f64>() * SUM_WEIGHT
}

fn calc_empty(line: &[u32; 4]) -> f64 {
    const EMPTY_WEIGHT: f64 = 270.0;
    line.iter().filter(|&&t| t == 0).count() as f64 * EMPTY_WEIGHT
}

fn calc_merges(line: &[u32; 4]) -> f64 {
    const MERGES_WEIGHT: f64 = 700.0;
    let mut prev = 0;
    let mut counter = 0.;
    let mut merges = 0.;
    for &tile in line {
        if prev == tile && tile != 0 {
            counter += 1.;
        } else if counter > 0. {
            merges += 1. + counter;
            counter = 0.;
        }
        prev = tile;
    }
    if counter > 0. {
        merges += 1. + counter;
    }
    merges * MERGES_WEIGHT
}

fn calc_monotonicity(line: &[u32; 4]) -> f64 {
    const MONOTONICITY_POWER: f64 = 4.0;
    const MONOTONICITY_WEIGHT: f64 = 47.0;
    let mut toward_start = 0.;
    let mut toward_end = 0.;
    for pair in line.windows(2) {
        let a = (pair[0] as f64).powf(MONOTONICITY_POWER);
        let b = (pair[1] as f64).powf(MONOTONICITY_POWER);
        if pair[0] > pair[1] {
            toward_start += a - b;
        } else {
            toward_end += b - a;
        }
    }
    toward_start.min(toward_end) * MONOTONICITY_WEIGHT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_line_scores_penalty_plus_empties() {
        assert_eq!(calc_heuristic_score(0), 200_000.0 + 4.0 * 270.0);
    }

    #[test]
    fn monotone_line_has_no_monotonicity_penalty() {
        let increasing = [1, 2, 3, 4];
        assert_eq!(calc_monotonicity(&increasing), 0.0);
        let zigzag = [1, 3, 1, 3];
        assert!(calc_monotonicity(&zigzag) > 0.0);
    }

    #[test]
    fn merges_count_runs() {
        assert_eq!(calc_merges(&[1, 1, 0, 0]), 2.0 * 700.0);
        assert_eq!(calc_merges(&[2, 2, 2, 0]), 3.0 * 700.0);
        assert_eq!(calc_merges(&[1, 2, 3, 4]), 0.0);
    }

    #[test]
    fn estimate_is_symmetric() {
        let eval = HeuristicEvaluator::new();
        let b = Board::from_raw(0x0000_0012_0031_4521);
        let base = eval.estimate(&b);
        for i in 0..8 {
            assert!((eval.estimate(&b.isomorphic(i)) - base).abs() <= base.abs() * 1e-6);
        }
    }

    #[test]
    fn emptier_boards_score_higher() {
        let eval = HeuristicEvaluator::new();
        assert!(eval.estimate(&Board::from_raw(0x1)) > eval.estimate(&Board::from_raw(0x1212_2121_1212_2121)));
    }
}
