//! Row-transform table.
//!
//! Every 20-bit row content (four 4-bit codes in the low 16 bits plus one
//! overflow bit per cell in bits 16..20) maps to a precomputed [`RowEntry`].
//! Cell `j` of a row is nibble `j`, so "left" compacts toward nibble 0.
//!
//! The table is built once, in parallel, behind a `OnceLock` and is never
//! mutated afterwards.

use std::sync::OnceLock;
use std::time::Instant;

use log::debug;
use rayon::prelude::*;

/// Number of distinct 20-bit row contents.
pub const TABLE_SIZE: usize = 1 << 20;

/// Highest tile code a 5-bit cell can hold. Tiles of this code never merge.
pub const MAX_CODE: u32 = 31;

/// Result of sliding one row toward one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slide {
    /// Resulting row, low 4 bits of each cell.
    pub row: u16,
    /// Resulting overflow bits, bit `j` for cell `j`.
    pub ext: u8,
    /// The slide changes the row.
    pub changed: bool,
    /// Number of merges performed.
    pub merges: u8,
    /// Sum of `2^code` over every tile produced by a merge (saturating).
    pub score: u32,
    /// Pairwise ordering code of the row as seen from this side.
    pub mono: u16,
    /// `row` spread into a column: cell `j` lands at bit `16 * j`.
    pub col: u64,
    /// `ext` spread into a column: cell `j` lands at bit `4 * j`.
    pub col_ext: u16,
}

/// Everything precomputed for one 20-bit row content.
#[derive(Debug, Clone, Copy)]
pub struct RowEntry {
    pub left: Slide,
    pub right: Slide,
    /// Bitset of the codes present in the row (bit 0 = empty cell present).
    pub species: u32,
    /// Nibble `v` holds how many cells carry code `v`.
    pub counts: u128,
    /// Nibble `v` holds the mask of cells carrying code `v`.
    pub masks: u128,
    /// Set-bit positions of the low 16 index bits, one per nibble.
    pub layout: u64,
    pub layout_len: u8,
    /// Direction bits this row enables when read as a row (see `Move::bit`).
    pub legal: u8,
    /// Neither slide changes the row.
    pub stuck: bool,
}

impl RowEntry {
    /// Mask of cells (bit `j` for cell `j`) carrying `code`.
    #[inline]
    pub fn mask(&self, code: u32) -> u32 {
        ((self.masks >> (code << 2)) & 0xf) as u32
    }

    /// Number of cells carrying `code`.
    #[inline]
    pub fn count(&self, code: u32) -> u32 {
        ((self.counts >> (code << 2)) & 0xf) as u32
    }

    fn build(index: u32) -> Self {
        let cells = unpack(index);

        let left = slide_toward_start(cells, index);
        let mut mirrored = cells;
        mirrored.reverse();
        let right = {
            let mono = mono_code(&mirrored);
            let (mut out, score, merges) = compact(mirrored);
            out.reverse();
            finish(out, index, score, merges, mono)
        };

        let mut species = 0u32;
        let mut counts = 0u128;
        let mut masks = 0u128;
        for (j, &code) in cells.iter().enumerate() {
            species |= 1 << code;
            counts += 1u128 << (code << 2);
            masks |= 1u128 << ((code << 2) + j as u32);
        }

        let mut layout = 0u64;
        let mut layout_len = 0u8;
        for bit in 0..16 {
            if (index >> bit) & 1 != 0 {
                layout |= (bit as u64) << (layout_len << 2);
                layout_len += 1;
            }
        }

        let mut legal = 0u8;
        if left.changed {
            legal |= LEGAL_LEFT;
        }
        if right.changed {
            legal |= LEGAL_RIGHT;
        }

        RowEntry {
            left,
            right,
            species,
            counts,
            masks,
            layout,
            layout_len,
            legal,
            stuck: !left.changed && !right.changed,
        }
    }
}

// Direction bits: Up = 0, Right = 1, Down = 2, Left = 3. A row that can slide
// left also lets its transposed column slide up, and likewise right/down.
const LEGAL_LEFT: u8 = 0x08 | 0x01;
const LEGAL_RIGHT: u8 = 0x02 | 0x04;

static TABLE: OnceLock<Box<[RowEntry]>> = OnceLock::new();

/// Build the table if it does not exist yet. Repeated calls are no-ops.
pub fn init() {
    let _ = table();
}

#[inline(always)]
pub(crate) fn table() -> &'static [RowEntry] {
    TABLE.get_or_init(build_table)
}

/// Look up the entry for a 20-bit row content.
#[inline(always)]
pub fn lookup(index: u32) -> &'static RowEntry {
    let table = table();
    debug_assert!((index as usize) < TABLE_SIZE);
    &table[index as usize & (TABLE_SIZE - 1)]
}

fn build_table() -> Box<[RowEntry]> {
    let started = Instant::now();
    let entries: Vec<RowEntry> = (0..TABLE_SIZE as u32).into_par_iter().map(RowEntry::build).collect();
    debug_assert!(entries.iter().enumerate().all(|(i, e)| self_check(i as u32, e)));
    debug!(
        "row-transform table built: {} entries, {} bytes, {:?}",
        entries.len(),
        entries.len() * std::mem::size_of::<RowEntry>(),
        started.elapsed()
    );
    entries.into_boxed_slice()
}

/// Construction-time invariants of a single entry.
fn self_check(index: u32, entry: &RowEntry) -> bool {
    let before = unpack(index);
    [entry.left, entry.right].iter().all(|slide| {
        let after = unpack(slide.row as u32 | (slide.ext as u32) << 16);
        let tiles_before = before.iter().filter(|&&c| c != 0).count();
        let tiles_after = after.iter().filter(|&&c| c != 0).count();
        tiles_before == tiles_after + slide.merges as usize
            && slide.changed == (after != before)
            && (slide.merges == 0) == (slide.score == 0)
    }) && (0..=MAX_CODE).map(|v| entry.count(v)).sum::<u32>() == 4
}

/// Split a 20-bit row into four 5-bit codes.
#[inline]
pub(crate) fn unpack(index: u32) -> [u32; 4] {
    let mut cells = [0u32; 4];
    for (j, cell) in cells.iter_mut().enumerate() {
        *cell = ((index >> (j << 2)) & 0xf) | (((index >> (16 + j)) & 1) << 4);
    }
    cells
}

/// Pack four 5-bit codes into a 20-bit row.
#[inline]
pub(crate) fn pack(cells: [u32; 4]) -> u32 {
    cells.iter().enumerate().fold(0, |acc, (j, &code)| {
        acc | ((code & 0xf) << (j << 2)) | (((code >> 4) & 1) << (16 + j))
    })
}

fn slide_toward_start(cells: [u32; 4], index: u32) -> Slide {
    let mono = mono_code(&cells);
    let (out, score, merges) = compact(cells);
    finish(out, index, score, merges, mono)
}

/// Compact toward cell 0, merging each equal adjacent pair once.
fn compact(mut row: [u32; 4]) -> ([u32; 4], u32, u32) {
    let mut top = 0;
    let mut held = 0;
    let mut score = 0u32;
    let mut merges = 0;
    for i in 0..4 {
        let tile = row[i];
        if tile == 0 {
            continue;
        }
        row[i] = 0;
        if held == 0 {
            held = tile;
        } else if tile == held && tile < MAX_CODE {
            let merged = tile + 1;
            row[top] = merged;
            top += 1;
            score = score.saturating_add(1u32 << merged);
            merges += 1;
            held = 0;
        } else {
            row[top] = held;
            top += 1;
            held = tile;
        }
    }
    if held != 0 {
        row[top] = held;
    }
    (row, score, merges)
}

fn finish(out: [u32; 4], index: u32, score: u32, merges: u32, mono: u16) -> Slide {
    let packed = pack(out);
    let mut col = 0u64;
    let mut col_ext = 0u16;
    for (j, &code) in out.iter().enumerate() {
        col |= ((code & 0xf) as u64) << (j << 4);
        col_ext |= (((code >> 4) & 1) as u16) << (j << 2);
    }
    Slide {
        row: (packed & 0xffff) as u16,
        ext: (packed >> 16) as u8,
        changed: packed != index,
        merges: merges as u8,
        score,
        mono,
        col,
        col_ext,
    }
}

/// Two bits per cell pair: equal non-empty `11`, equal empty `00`,
/// first greater `01`, second greater `10`. Six pairs, 12 bits.
fn mono_code(cells: &[u32; 4]) -> u16 {
    const PAIRS: [(usize, usize); 6] = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)];
    PAIRS.iter().enumerate().fold(0, |acc, (k, &(a, b))| {
        let (x, y) = (cells[a], cells[b]);
        let code = if x == y {
            if x != 0 { 0b11 } else { 0b00 }
        } else if x > y {
            0b01
        } else {
            0b10
        };
        acc | (code << (k << 1))
    })
}
