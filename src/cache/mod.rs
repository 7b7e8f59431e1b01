//! Lockless transposition cache for chance-node values.
//!
//! Each slot is two 64-bit words, `sign` and `data`. `data` packs the value,
//! the depth it was searched to and a hit counter; `sign` is the canonical
//! board XOR `data`. A reader accepts a slot only if `sign ^ data` reproduces
//! the board it asked for, so a torn read (old `sign`, new `data` or the
//! reverse) shows up as a miss instead of a wrong value. No locks, no CAS.
//!
//! Boards carrying overflow bits do not fit the 64-bit key and always miss.
//!
//! A stored value is only meaningful to searchers with the same leaf
//! evaluator and depth limits. Searchers that differ pass distinct
//! namespaces to [`TranspositionCache::probe_in`] / [`TranspositionCache::store_in`];
//! namespace 0 is the plain [`TranspositionCache::probe`] / [`TranspositionCache::store`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::engine::Board;

mod persist;

pub use persist::CacheIoError;

/// Sizing and salting of a [`TranspositionCache`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Number of slots; rounded up to a power of two.
    pub capacity: usize,
    /// Seed of the per-depth salt table.
    pub seed: u64,
    /// Length of the salt table. Deeper requests share the last salt.
    pub max_depth: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 1 << 20, seed: 0x2048_c0de, max_depth: 16 }
    }
}

impl CacheConfig {
    /// Bytes per slot (two `u64` words).
    pub const BLOCK_BYTES: usize = 16;

    /// Largest power-of-two capacity that fits in `mib` MiB (at least 1 slot).
    pub fn with_budget_mib(mib: usize) -> Self {
        let slots = mib.saturating_mul(1024 * 1024) / Self::BLOCK_BYTES;
        let capacity = if slots == 0 { 1 } else { 1 << (usize::BITS - 1 - slots.leading_zeros()) };
        Self { capacity, ..Self::default() }
    }
}

/// Value, depth and hit count packed into one word:
/// bits 0..32 value (`f32` bits), 32..48 depth, 48..64 hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Payload(u64);

impl Payload {
    #[inline]
    fn new(value: f32, depth: u16, hits: u16) -> Self {
        Payload(value.to_bits() as u64 | (depth as u64) << 32 | (hits as u64) << 48)
    }

    #[inline]
    fn value(self) -> f32 { f32::from_bits(self.0 as u32) }

    #[inline]
    fn depth(self) -> u16 { (self.0 >> 32) as u16 }

    #[inline]
    fn hits(self) -> u16 { (self.0 >> 48) as u16 }
}

#[derive(Default)]
pub(crate) struct Block {
    sign: AtomicU64,
    data: AtomicU64,
}

impl Block {
    #[inline]
    fn load(&self) -> (u64, u64) {
        (self.sign.load(Ordering::Relaxed), self.data.load(Ordering::Relaxed))
    }

    #[inline]
    fn write(&self, key: u64, payload: Payload) {
        self.data.store(payload.0, Ordering::Relaxed);
        self.sign.store(key ^ payload.0, Ordering::Relaxed);
    }
}

/// A cached chance-node value and its bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheEntry {
    pub value: f32,
    pub depth: u32,
    pub hits: u32,
}

/// Fixed-capacity, direct-mapped, lockless cache keyed by
/// `(canonical board, depth)`. Shared across threads by reference.
pub struct TranspositionCache {
    blocks: Box<[Block]>,
    mask: usize,
    salts: Box<[u64]>,
}

impl TranspositionCache {
    pub fn new(cfg: &CacheConfig) -> Self {
        let capacity = cfg.capacity.max(1).next_power_of_two();
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let salts: Vec<u64> = (0..cfg.max_depth.max(1)).map(|_| rng.gen()).collect();
        let blocks: Vec<Block> = (0..capacity).map(|_| Block::default()).collect();
        info!(
            "transposition cache allocated: {} slots, {} bytes",
            capacity,
            capacity * CacheConfig::BLOCK_BYTES
        );
        Self::from_parts(blocks.into_boxed_slice(), salts.into_boxed_slice())
    }

    fn from_parts(blocks: Box<[Block]>, salts: Box<[u64]>) -> Self {
        debug_assert!(blocks.len().is_power_of_two());
        let mask = blocks.len() - 1;
        Self { blocks, mask, salts }
    }

    #[inline]
    pub fn capacity(&self) -> usize { self.blocks.len() }

    #[inline]
    pub fn salts(&self) -> &[u64] { &self.salts }

    /// Slot of a canonical key searched to `depth`.
    #[inline]
    fn index(&self, key: u64, depth: u32) -> usize {
        let salt = self.salts[(depth as usize).min(self.salts.len() - 1)];
        (mix64(key ^ salt) as usize) & self.mask
    }

    /// Canonical 64-bit key, or `None` for boards that need overflow bits.
    #[inline]
    fn key(board: &Board) -> Option<u64> {
        if board.ext() != 0 {
            return None;
        }
        Some(board.canonical().raw())
    }

    #[inline]
    fn key_in(namespace: u64, board: &Board) -> Option<u64> {
        let key = Self::key(board)?;
        Some(if namespace == 0 { key } else { key ^ mix64(namespace) })
    }

    /// Look up a value searched to at least `depth`. A hit bumps the slot's
    /// hit counter (saturating).
    #[inline]
    pub fn probe(&self, board: &Board, depth: u32) -> Option<f32> { self.probe_in(0, board, depth) }

    /// [`Self::probe`] within `namespace`. Entries stored under another
    /// namespace fail the signature check.
    #[inline]
    pub fn probe_in(&self, namespace: u64, board: &Board, depth: u32) -> Option<f32> {
        let key = Self::key_in(namespace, board)?;
        let block = &self.blocks[self.index(key, depth)];
        let (sign, data) = block.load();
        if sign ^ data != key {
            return None;
        }
        let payload = Payload(data);
        if (payload.depth() as u32) < depth {
            return None;
        }
        let hits = payload.hits().saturating_add(1);
        block.write(key, Payload::new(payload.value(), payload.depth(), hits));
        Some(payload.value())
    }

    /// Record `value` for `board` searched to `depth`, overwriting the slot.
    /// The hit counter survives only if the slot already held this board.
    #[inline]
    pub fn store(&self, board: &Board, depth: u32, value: f32) { self.store_in(0, board, depth, value) }

    /// [`Self::store`] within `namespace`.
    #[inline]
    pub fn store_in(&self, namespace: u64, board: &Board, depth: u32, value: f32) {
        let Some(key) = Self::key_in(namespace, board) else { return };
        let block = &self.blocks[self.index(key, depth)];
        let (sign, data) = block.load();
        let hits = if sign ^ data == key { Payload(data).hits() } else { 0 };
        let depth = depth.min(u16::MAX as u32) as u16;
        block.write(key, Payload::new(value, depth, hits));
    }

    /// Inspect the slot a `(board, depth)` pair maps to, without touching it.
    pub fn peek(&self, board: &Board, depth: u32) -> Option<CacheEntry> {
        let key = Self::key(board)?;
        let (sign, data) = self.blocks[self.index(key, depth)].load();
        (sign ^ data == key).then(|| {
            let p = Payload(data);
            CacheEntry { value: p.value(), depth: p.depth() as u32, hits: p.hits() as u32 }
        })
    }

    /// Number of slots holding any entry (scan).
    pub fn len_hint(&self) -> usize {
        self.blocks.iter().filter(|b| Payload(b.data.load(Ordering::Relaxed)).depth() != 0).count()
    }

    /// Reset every slot.
    pub fn clear(&self) {
        for block in self.blocks.iter() {
            block.data.store(0, Ordering::Relaxed);
            block.sign.store(0, Ordering::Relaxed);
        }
    }
}

impl fmt::Debug for TranspositionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranspositionCache")
            .field("capacity", &self.capacity())
            .field("salts", &self.salts.len())
            .finish()
    }
}

impl Default for TranspositionCache {
    fn default() -> Self { Self::new(&CacheConfig::default()) }
}

/// 64-bit finalizer (MurmurHash3 `fmix64`).
#[inline]
pub(crate) fn mix64(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    x ^= x >> 33;
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    fn small() -> TranspositionCache {
        TranspositionCache::new(&CacheConfig { capacity: 1 << 10, ..CacheConfig::default() })
    }

    fn board(raw: u64) -> Board { Board::from_raw(raw) }

    #[test]
    fn store_then_probe_round_trips() {
        let cache = small();
        let b = board(0x0000_0012_0031_0001);
        assert_eq!(cache.probe(&b, 3), None);
        cache.store(&b, 3, 1234.5);
        assert_eq!(cache.probe(&b, 3), Some(1234.5));
        assert_eq!(cache.peek(&b, 3).map(|e| (e.depth, e.hits)), Some((3, 1)));
    }

    #[test]
    fn shallower_entry_never_serves_deeper_request() {
        let cache = TranspositionCache::new(&CacheConfig { capacity: 1 << 10, max_depth: 1, ..CacheConfig::default() });
        // With a single salt every depth shares a slot.
        let b = board(0x0000_0000_1200_0021);
        cache.store(&b, 2, 10.0);
        assert_eq!(cache.probe(&b, 3), None);
        assert_eq!(cache.probe(&b, 2), Some(10.0));
        assert_eq!(cache.probe(&b, 1), Some(10.0));
    }

    #[test]
    fn symmetric_boards_share_an_entry() {
        let cache = small();
        let b = board(0x0000_0000_0321_0001);
        cache.store(&b, 2, 42.0);
        for i in 0..8 {
            assert_eq!(cache.probe(&b.isomorphic(i), 2), Some(42.0));
        }
    }

    #[test]
    fn hits_saturate_and_survive_rewrites() {
        let cache = small();
        let b = board(0x1111_0000_0000_0002);
        cache.store(&b, 4, 7.0);
        for _ in 0..3 {
            cache.probe(&b, 4);
        }
        assert_eq!(cache.peek(&b, 4).map(|e| e.hits), Some(3));
        cache.store(&b, 4, 8.0);
        assert_eq!(cache.peek(&b, 4), Some(CacheEntry { value: 8.0, depth: 4, hits: 3 }));

        let key = TranspositionCache::key(&b).unwrap();
        let block = &cache.blocks[cache.index(key, 4)];
        block.write(key, Payload::new(8.0, 4, u16::MAX));
        assert_eq!(cache.probe(&b, 4), Some(8.0));
        assert_eq!(cache.peek(&b, 4).map(|e| e.hits), Some(u16::MAX as u32));
    }

    #[test]
    fn collision_discards_previous_occupant() {
        let cache = TranspositionCache::new(&CacheConfig { capacity: 1, ..CacheConfig::default() });
        let a = board(0x0000_0000_0000_0021);
        let b = board(0x0000_0000_0000_0031);
        cache.store(&a, 2, 1.0);
        cache.probe(&a, 2);
        cache.store(&b, 2, 2.0);
        assert_eq!(cache.probe(&a, 2), None);
        assert_eq!(cache.peek(&b, 2).map(|e| e.hits), Some(0));
    }

    #[test]
    fn single_bit_corruption_is_rejected() {
        let cache = small();
        let b = board(0x0000_0000_0012_2001);
        let key = TranspositionCache::key(&b).unwrap();
        let idx = cache.index(key, 3);
        for bit in 0..128 {
            cache.store(&b, 3, 99.0);
            let block = &cache.blocks[idx];
            if bit < 64 {
                block.sign.fetch_xor(1 << bit, Ordering::Relaxed);
            } else {
                block.data.fetch_xor(1 << (bit - 64), Ordering::Relaxed);
            }
            assert_eq!(cache.probe(&b, 3), None, "bit {bit}");
            cache.clear();
        }
    }

    #[test]
    fn torn_write_is_rejected() {
        let cache = small();
        let b = board(0x0000_0000_0012_2001);
        let key = TranspositionCache::key(&b).unwrap();
        let block = &cache.blocks[cache.index(key, 3)];
        cache.store(&b, 3, 1.0);
        // New data without the matching sign.
        block.data.store(Payload::new(2.0, 3, 0).0, Ordering::Relaxed);
        assert_eq!(cache.probe(&b, 3), None);
    }

    #[test]
    fn empty_board_never_hits_a_fresh_slot() {
        let cache = small();
        assert_eq!(cache.probe(&Board::EMPTY, 1), None);
    }

    #[test]
    fn overflow_boards_bypass_the_cache() {
        let cache = small();
        let b = Board::from_parts(0x1, 0x0001_0000);
        cache.store(&b, 2, 5.0);
        assert_eq!(cache.probe(&b, 2), None);
        assert_eq!(cache.len_hint(), 0);
    }

    #[test]
    fn concurrent_readers_and_writers_only_see_stored_values() {
        let cache = TranspositionCache::new(&CacheConfig { capacity: 1 << 4, ..CacheConfig::default() });
        let boards: Vec<Board> = (1..512u64).map(|i| board(i * 0x0001_0203_0405)).collect();
        let value_of = |b: &Board| (b.canonical().raw() % 1_000_003) as f32;
        (0..8usize).into_par_iter().for_each(|t| {
            for round in 0..200 {
                for (k, b) in boards.iter().enumerate() {
                    if (k + t + round) % 3 == 0 {
                        cache.store(b, 2, value_of(b));
                    } else if let Some(v) = cache.probe(b, 2) {
                        assert_eq!(v, value_of(b));
                    }
                }
            }
        });
    }

    #[test]
    fn budget_rounds_down_to_power_of_two() {
        assert_eq!(CacheConfig::with_budget_mib(1).capacity, 1 << 16);
        assert_eq!(CacheConfig::with_budget_mib(3).capacity, 1 << 17);
        assert_eq!(CacheConfig::with_budget_mib(0).capacity, 1);
    }

    #[test]
    fn namespaces_do_not_share_entries() {
        let cache = small();
        let b = board(0x0000_0000_0012_2001);
        cache.store_in(7, &b, 2, 1.0);
        assert_eq!(cache.probe_in(7, &b, 2), Some(1.0));
        assert_eq!(cache.probe_in(8, &b, 2), None);
        assert_eq!(cache.probe(&b, 2), None);
        cache.store(&b, 2, 2.0);
        assert_eq!(cache.probe(&b, 2), Some(2.0));
        assert_eq!(cache.probe_in(0, &b.mirror(), 2), Some(2.0));
    }

    #[test]
    fn debug_reports_geometry_only() {
        let cache = small();
        assert_eq!(format!("{cache:?}"), "TranspositionCache { capacity: 1024, salts: 16 }");
    }

    #[test]
    fn clear_empties_every_slot() {
        let cache = small();
        for i in 1..50u64 {
            cache.store(&board(i << 4), 2, i as f32);
        }
        assert!(cache.len_hint() > 0);
        cache.clear();
        assert_eq!(cache.len_hint(), 0);
    }
}
