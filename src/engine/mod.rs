//! Packed 2048 board, row-transform table, and move execution.
//!
//! The board is a plain `Copy` value; every whole-board query combines four
//! lookups into the shared row-transform table (transposing first for
//! column-oriented queries). The table is built lazily on first use, or
//! eagerly with [`new`].
//!
//! ```
//! use tdl_2048::engine::{self as GameEngine, Board, Move};
//! GameEngine::new();
//! let b = Board::from_raw(0x0000_0000_0000_0011);
//! let t = b.slide(Move::Left);
//! assert!(t.changed);
//! assert_eq!(t.score, 4);
//! assert_eq!(t.after, Board::from_raw(0x0000_0000_0000_0002));
//! ```

pub mod state;
pub mod table;

pub use state::{Board, Cells, Move, Transition, ILLEGAL, PROB_LOW, TILE_HIGH, TILE_LOW};
pub use table::{RowEntry, Slide, TABLE_SIZE};

/// Initialize the row-transform table. Safe to call multiple times.
pub fn new() {
    table::init();
}

/// Slide/merge tiles in the given direction. No randomness.
#[inline]
pub fn shift(board: Board, direction: Move) -> Board { board.shift(direction) }

/// True if no move in any direction changes the board.
#[inline]
pub fn is_game_over(board: Board) -> bool { board.is_game_over() }

/// Count the number of empty cells.
#[inline]
pub fn count_empty(board: Board) -> u32 { board.empty_count() }
