//! tdl-2048: a packed 2048 board, its row-transform table, and a
//! depth-bounded expectimax search over a lockless transposition cache.
//!
//! This crate provides:
//! - A compact `Board` (`engine` module) with table-driven moves, symmetry
//!   transforms and canonicalization
//! - An expectimax searcher (`expectimax` module) over any [`Evaluator`](expectimax::Evaluator)
//! - A shared, lock-free, self-verifying transposition cache (`cache` module)
//! - A fixed game loop for running episodes (`episode` module)
//!
//! Quick start:
//! ```
//! use tdl_2048::engine::{self as GameEngine, Board, Move};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // One-time table init
//! GameEngine::new();
//!
//! // Deterministic board initialization with a seeded RNG
//! let mut rng = StdRng::seed_from_u64(42);
//! let b0 = Board::initial(&mut rng);
//! let t = b0.slide(Move::Left);
//! assert!(t.after.empty_count() >= 14);
//! assert_eq!(b0.canonical(), b0.rotate_right().canonical());
//! ```
pub mod cache;
pub mod engine;
pub mod episode;
pub mod expectimax;
