use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use rand::Rng;

use super::table::{self, RowEntry};

/// A direction to slide/merge tiles.
///
/// The discriminant doubles as the bit index used by [`Board::operations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Move {
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
}

impl Move {
    pub const ALL: [Move; 4] = [Move::Up, Move::Right, Move::Down, Move::Left];

    #[inline]
    pub fn index(self) -> usize { self as usize }

    #[inline]
    pub fn bit(self) -> u32 { 1 << (self as u32) }

    #[inline]
    pub fn from_index(i: usize) -> Option<Move> { Move::ALL.get(i).copied() }
}

/// Marker stored in [`Board::info`] for a direction that does not change the board.
pub const ILLEGAL: u32 = u32::MAX;

/// Code inserted with probability [`PROB_LOW`].
pub const TILE_LOW: u32 = 1;
/// Code inserted with probability `1 - PROB_LOW`.
pub const TILE_HIGH: u32 = 2;
pub const PROB_LOW: f32 = 0.9;

/// Packed 4x4 board.
///
/// - `raw`: cell `i` (row-major, 0 = top-left) is nibble `i`, so row `r` is
///   the 16 bits starting at `16 * r`.
/// - `ext`: overflow bit of cell `i` at bit `16 + i`; codes above 15 set it.
/// - `info`: auxiliary field, e.g. the score of the move that produced this
///   afterstate or [`ILLEGAL`]. Ignored by equality, ordering and hashing.
#[derive(Clone, Copy, Default)]
pub struct Board {
    raw: u64,
    ext: u32,
    info: u32,
}

/// Outcome of sliding a board in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub after: Board,
    pub score: u32,
    pub merges: u32,
    /// Exact comparison of the packed board before and after.
    pub changed: bool,
}

/// Up to 16 cell indices packed one per nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cells {
    packed: u64,
    len: u32,
}

impl Cells {
    #[inline]
    pub fn len(&self) -> usize { self.len as usize }

    #[inline]
    pub fn is_empty(&self) -> bool { self.len == 0 }

    #[inline]
    pub fn get(&self, k: usize) -> Option<u32> {
        (k < self.len as usize).then(|| ((self.packed >> (k << 2)) & 0xf) as u32)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len as usize).map(move |k| ((self.packed >> (k << 2)) & 0xf) as u32)
    }
}

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board { raw: 0, ext: 0, info: 0 };

    /// Construct a `Board` from its 64-bit packed cells.
    #[inline]
    pub fn from_raw(raw: u64) -> Self { Board { raw, ext: 0, info: 0 } }

    /// Construct a `Board` from packed cells and overflow bits (bits 16..32).
    #[inline]
    pub fn from_parts(raw: u64, ext: u32) -> Self { Board { raw, ext: ext & 0xffff_0000, info: 0 } }

    /// Build a board from 16 codes in row-major order.
    pub fn from_cells(cells: [u32; 16]) -> Self {
        cells.iter().enumerate().fold(Board::EMPTY, |mut b, (i, &code)| {
            b.set(i, code);
            b
        })
    }

    #[inline]
    pub fn raw(&self) -> u64 { self.raw }

    #[inline]
    pub fn ext(&self) -> u32 { self.ext }

    #[inline]
    pub fn info(&self) -> u32 { self.info }

    #[inline]
    pub fn with_info(mut self, info: u32) -> Self {
        self.info = info;
        self
    }

    /// Random starting position: two distinct cells, the first a 4 with
    /// probability 1/100 and the second with probability 19/100, else 2s.
    ///
    /// ```
    /// use tdl_2048::engine::Board;
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let b = Board::initial(&mut StdRng::seed_from_u64(5));
    /// assert_eq!(b.empty_count(), 14);
    /// ```
    pub fn initial<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let i = rng.gen_range(0..16);
        let j = (i + 1 + rng.gen_range(0..15)) % 16;
        let r = rng.gen_range(0..100);
        let mut b = Board::EMPTY;
        b.set(i, if r >= 1 { TILE_LOW } else { TILE_HIGH });
        b.set(j, if r >= 19 { TILE_LOW } else { TILE_HIGH });
        b
    }

    /// Code at cell `i`, including the overflow bit.
    #[inline]
    pub fn at(&self, i: usize) -> u32 {
        (((self.raw >> (i << 2)) & 0xf) as u32) | ((self.ext >> (i + 12)) & 0x10)
    }

    /// Actual tile value at cell `i` (0 if empty), e.g. 2, 4, 8, ...
    #[inline]
    pub fn tile_value(&self, i: usize) -> u64 {
        match self.at(i) {
            0 => 0,
            code => 1u64 << code,
        }
    }

    /// Overwrite cell `i` with `code` (0..32).
    #[inline]
    pub fn set(&mut self, i: usize, code: u32) {
        self.raw = (self.raw & !(0xf << (i << 2))) | (((code & 0xf) as u64) << (i << 2));
        self.ext = (self.ext & !(1 << (i + 16))) | ((code & 0x10) << (i + 12));
    }

    /// 20-bit content of row `r`: low 16 bits from `raw`, overflow bits at 16..20.
    #[inline]
    pub fn fetch(&self, r: usize) -> u32 {
        (((self.raw >> (r << 4)) & 0xffff) as u32) | ((self.ext >> (r << 2)) & 0xf_0000)
    }

    /// Overwrite row `r` with a 20-bit content.
    #[inline]
    pub fn place(&mut self, r: usize, row: u32) {
        self.raw = (self.raw & !(0xffff << (r << 4))) | (((row & 0xffff) as u64) << (r << 4));
        self.ext = (self.ext & !(0xf_0000 << (r << 2))) | ((row & 0xf_0000) << (r << 2));
    }

    #[inline(always)]
    fn query(&self, r: usize) -> &'static RowEntry { table::lookup(self.fetch(r)) }

    #[inline(always)]
    fn rows(&self) -> [&'static RowEntry; 4] { [self.query(0), self.query(1), self.query(2), self.query(3)] }

    // ---- symmetry ----------------------------------------------------------

    /// Reverse the cells of every row.
    #[inline]
    pub fn mirror(self) -> Self {
        let raw = self.raw;
        let ext = self.ext;
        Board {
            raw: ((raw & 0x000f_000f_000f_000f) << 12)
                | ((raw & 0x00f0_00f0_00f0_00f0) << 4)
                | ((raw & 0x0f00_0f00_0f00_0f00) >> 4)
                | ((raw & 0xf000_f000_f000_f000) >> 12),
            ext: ((ext & 0x1111_0000) << 3)
                | ((ext & 0x2222_0000) << 1)
                | ((ext & 0x4444_0000) >> 1)
                | ((ext & 0x8888_0000) >> 3),
            info: self.info,
        }
    }

    /// Reverse the order of the rows.
    #[inline]
    pub fn flip(self) -> Self {
        let raw = self.raw;
        let ext = self.ext;
        Board {
            raw: ((raw & 0x0000_0000_0000_ffff) << 48)
                | ((raw & 0x0000_0000_ffff_0000) << 16)
                | ((raw & 0x0000_ffff_0000_0000) >> 16)
                | ((raw & 0xffff_0000_0000_0000) >> 48),
            ext: ((ext & 0x000f_0000) << 12)
                | ((ext & 0x00f0_0000) << 4)
                | ((ext & 0x0f00_0000) >> 4)
                | ((ext & 0xf000_0000) >> 12),
            info: self.info,
        }
    }

    // Credit to Nneonneo for the 64-bit part.
    /// Swap rows and columns.
    #[inline]
    pub fn transpose(self) -> Self {
        let x = self.raw;
        let a = (x & 0xf0f0_0f0f_f0f0_0f0f) | ((x & 0x0000_f0f0_0000_f0f0) << 12) | ((x & 0x0f0f_0000_0f0f_0000) >> 12);
        let raw = (a & 0xff00_ff00_00ff_00ff) | ((a & 0x0000_0000_ff00_ff00) << 24) | ((a & 0x00ff_00ff_0000_0000) >> 24);
        let e = self.ext;
        let e = (e & 0xa5a5_0000) | ((e & 0x0a0a_0000) << 3) | ((e & 0x5050_0000) >> 3);
        let ext = (e & 0xcc33_0000) | ((e & 0x00cc_0000) << 6) | ((e & 0x3300_0000) >> 6);
        Board { raw, ext, info: self.info }
    }

    /// Rotate by 180 degrees.
    #[inline]
    pub fn reverse(self) -> Self { self.mirror().flip() }

    /// Rotate 90 degrees clockwise.
    #[inline]
    pub fn rotate_right(self) -> Self { self.transpose().mirror() }

    /// Rotate 90 degrees counter-clockwise.
    #[inline]
    pub fn rotate_left(self) -> Self { self.transpose().flip() }

    /// Rotate clockwise by `r` quarter turns (negative turns rotate the other way).
    #[inline]
    pub fn rotate(self, r: i32) -> Self {
        match r.rem_euclid(4) {
            1 => self.rotate_right(),
            2 => self.reverse(),
            3 => self.rotate_left(),
            _ => self,
        }
    }

    /// One of the 8 symmetry images: `i % 4` quarter turns, mirrored first when
    /// `(i % 8) >= 4`.
    #[inline]
    pub fn isomorphic(self, i: u32) -> Self {
        let b = if (i % 8) / 4 == 1 { self.mirror() } else { self };
        b.rotate((i % 4) as i32)
    }

    /// The smallest of the 8 symmetry images, ordered by `(ext, raw)`.
    pub fn canonical(self) -> Self {
        (1..8).map(|i| self.isomorphic(i)).fold(self, |best, b| if b < best { b } else { best })
    }

    // ---- queries -----------------------------------------------------------

    /// Bitset of the codes on the board (bit 0 set when any cell is empty).
    #[inline]
    pub fn species(&self) -> u32 {
        self.rows().iter().fold(0, |acc, e| acc | e.species)
    }

    /// Highest code on the board (0 for an empty board).
    #[inline]
    pub fn max_tile(&self) -> u32 { 31 - self.species().leading_zeros() }

    /// Number of cells carrying `code`.
    #[inline]
    pub fn numof(&self, code: u32) -> u32 {
        self.rows().iter().map(|e| e.count(code)).sum()
    }

    /// Per-code cell counts.
    pub fn histogram(&self) -> [u8; 32] {
        let rows = self.rows();
        let mut hist = [0u8; 32];
        for (code, slot) in hist.iter_mut().enumerate() {
            *slot = rows.iter().map(|e| e.count(code as u32) as u8).sum();
        }
        hist
    }

    /// 16-bit mask of the cells carrying `code` (bit `i` for cell `i`).
    #[inline]
    pub fn mask(&self, code: u32) -> u32 {
        self.rows().iter().enumerate().fold(0, |acc, (r, e)| acc | (e.mask(code) << (r << 2)))
    }

    /// Cells carrying `code`, in increasing index order.
    #[inline]
    pub fn find(&self, code: u32) -> Cells {
        let e = table::lookup(self.mask(code));
        Cells { packed: e.layout, len: e.layout_len as u32 }
    }

    /// Empty cells, in increasing index order.
    #[inline]
    pub fn spaces(&self) -> Cells { self.find(0) }

    #[inline]
    pub fn empty_count(&self) -> u32 { self.numof(0) }

    /// Left-side monotonicity codes of the rows, 12 bits per row.
    pub fn mono_left(&self) -> u64 {
        self.rows().iter().enumerate().fold(0, |acc, (r, e)| acc | ((e.left.mono as u64) << (12 * r)))
    }

    /// Right-side monotonicity codes of the rows, 12 bits per row.
    pub fn mono_right(&self) -> u64 {
        self.rows().iter().enumerate().fold(0, |acc, (r, e)| acc | ((e.right.mono as u64) << (12 * r)))
    }

    /// Legal directions as a bitmask of [`Move::bit`].
    #[inline]
    pub fn operations(&self) -> u32 {
        let trans = self.transpose();
        let hori = self.rows().iter().fold(0u8, |acc, e| acc | e.legal);
        let vert = trans.rows().iter().fold(0u8, |acc, e| acc | e.legal);
        ((hori & 0x0a) | (vert & 0x05)) as u32
    }

    /// Legal directions in [`Move::ALL`] order.
    pub fn actions(&self) -> impl Iterator<Item = Move> {
        let ops = self.operations();
        Move::ALL.into_iter().filter(move |m| ops & m.bit() != 0)
    }

    /// True if at least one direction changes the board.
    #[inline]
    pub fn is_movable(&self) -> bool {
        self.rows().iter().any(|e| !e.stuck) || self.transpose().rows().iter().any(|e| !e.stuck)
    }

    /// Return true if no legal moves remain.
    #[inline]
    pub fn is_game_over(&self) -> bool { !self.is_movable() }

    // ---- moves -------------------------------------------------------------

    /// Slide/merge in `dir`, reporting score, merges and whether anything changed.
    ///
    /// Horizontal moves read the four rows directly; vertical moves read the
    /// rows of the transpose and place the precomputed column images back.
    #[inline]
    pub fn slide(self, dir: Move) -> Transition {
        let mut raw = 0u64;
        let mut ext = 0u32;
        let mut score = 0u32;
        let mut merges = 0u32;
        match dir {
            Move::Left | Move::Right => {
                for (r, e) in self.rows().iter().enumerate() {
                    let s = if dir == Move::Left { &e.left } else { &e.right };
                    raw |= (s.row as u64) << (r << 4);
                    ext |= (s.ext as u32) << (16 + (r << 2));
                    score = score.saturating_add(s.score);
                    merges += s.merges as u32;
                }
            }
            Move::Up | Move::Down => {
                for (c, e) in self.transpose().rows().iter().enumerate() {
                    let s = if dir == Move::Up { &e.left } else { &e.right };
                    raw |= s.col << (c << 2);
                    ext |= (s.col_ext as u32) << (16 + c);
                    score = score.saturating_add(s.score);
                    merges += s.merges as u32;
                }
            }
        }
        let after = Board { raw, ext, info: self.info };
        Transition { after, score, merges, changed: after != self }
    }

    /// Return the board resulting from sliding/merging tiles in `dir` (no random insert).
    ///
    /// ```
    /// use tdl_2048::engine::{Board, Move};
    /// let b = Board::from_raw(0x1100);
    /// assert_eq!(b.shift(Move::Left), Board::from_raw(0x0002));
    /// ```
    #[inline]
    pub fn shift(self, dir: Move) -> Self { self.slide(dir).after }

    /// Apply `dir` in place. Returns the score gained, or `-1` when the move is
    /// illegal (the board is left unchanged in that case).
    #[inline]
    pub fn operate(&mut self, dir: Move) -> i32 {
        let t = self.slide(dir);
        if t.changed {
            *self = t.after;
            t.score as i32
        } else {
            -1
        }
    }

    /// The four afterstates in [`Move::ALL`] order, each carrying its score in
    /// `info`, or [`ILLEGAL`] when the direction does not change the board.
    #[inline]
    pub fn afters(self) -> [Board; 4] {
        Move::ALL.map(|dir| {
            let t = self.slide(dir);
            t.after.with_info(if t.changed { t.score } else { ILLEGAL })
        })
    }

    /// Insert a random 2 (90%) or 4 (10%) tile into a uniformly chosen empty
    /// cell. A full board is returned unchanged.
    ///
    /// ```
    /// use tdl_2048::engine::Board;
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    /// assert_eq!(b.empty_count(), 14);
    /// ```
    #[inline]
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let spaces = self.spaces();
        if spaces.is_empty() {
            return self;
        }
        let cell = spaces.get(rng.gen_range(0..spaces.len())).unwrap_or(0) as usize;
        let code = if rng.gen_range(0..10) < 9 { TILE_LOW } else { TILE_HIGH };
        let mut b = self;
        b.set(cell, code);
        b
    }

    /// Perform a move then insert a random tile if the move changed the board.
    #[inline]
    pub fn make_move<R: Rng + ?Sized>(self, dir: Move, rng: &mut R) -> Self {
        let t = self.slide(dir);
        if t.changed { t.after.with_random_tile(rng) } else { self }
    }
}

impl PartialEq for Board {
    #[inline]
    fn eq(&self, other: &Self) -> bool { self.raw == other.raw && self.ext == other.ext }
}

impl Eq for Board {}

impl Hash for Board {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
        self.ext.hash(state);
    }
}

impl PartialOrd for Board {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for Board {
    fn cmp(&self, other: &Self) -> Ordering { (self.ext, self.raw).cmp(&(other.ext, other.raw)) }
}

impl From<u64> for Board { fn from(v: u64) -> Self { Board::from_raw(v) } }

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x}|{:04x})", self.raw, self.ext >> 16)
    }
}

/// Lite format: `[raw|ext]` in hex.
impl fmt::LowerHex for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:016x}|{:04x}]", self.raw, self.ext >> 16)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let edge = "+------------------------+";
        writeln!(f, "{edge}")?;
        for r in 0..4 {
            write!(f, "|")?;
            for c in 0..4 {
                match self.tile_value(r * 4 + c) {
                    0 => write!(f, "{:>6}", "")?,
                    v => write!(f, "{v:>6}")?,
                }
            }
            writeln!(f, "|")?;
        }
        writeln!(f, "{edge}")
    }
}
