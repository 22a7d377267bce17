//! Transposition and evaluation caches.
//!
//! Two fixed-capacity, lossy, set-associative hash tables keyed by the
//! position's Zobrist key. Both use Hyatt lock-less XOR hashing: the key
//! actually stored is derived from (and checked against) the payload words,
//! so a write torn by a concurrent writer is detected as a key mismatch
//! rather than read as garbage, without a lock.
//!
//! Each table is split into four sub-tables of different sizes (0.325 /
//! 0.275 / 0.225 / 0.175 of total capacity) addressed by `key % sub_len`.
//! A lookup probes all four and returns the first match; this biases most
//! hits into the first two (larger) sub-tables while keeping the overall
//! load factor high. Grounded on the lock-less `AtomicEntry` layout in
//! `other_examples/3e6b1ebe_CooperBigFoot-cesso__crates-cesso-engine-src-search-tt.rs.rs`
//! and the generational aging in
//! `other_examples/64bd0fb1_orielsanchez-chess-engine__src-transposition.rs.rs`,
//! adapted from two atomic words per entry to the field layout spec'd here.

use chess_core::Move;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

const SPLITS: [f64; 4] = [0.325, 0.275, 0.225, 0.175];

/// Scores above this magnitude indicate a forced mate; used to make stored
/// mate scores depth-relative rather than root-relative.
pub const MATE_THRESHOLD: i32 = 28_000;

/// Converts a root-relative score to a TT-storable, ply-relative one.
pub fn score_to_tt(score: i32, ply: u8) -> i32 {
    if score > MATE_THRESHOLD {
        score + ply as i32
    } else if score < -MATE_THRESHOLD {
        score - ply as i32
    } else {
        score
    }
}

/// Reverses [`score_to_tt`].
pub fn score_from_tt(score: i32, ply: u8) -> i32 {
    if score > MATE_THRESHOLD {
        score - ply as i32
    } else if score < -MATE_THRESHOLD {
        score + ply as i32
    } else {
        score
    }
}

fn sub_table_lengths(total_entries: usize) -> [usize; 4] {
    let mut lens = [0usize; 4];
    for (i, split) in SPLITS.iter().enumerate() {
        lens[i] = ((total_entries as f64) * split).floor().max(1.0) as usize;
    }
    lens
}

/// Node type recorded in a transposition-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    /// Empty slot.
    None = 0,
    /// Exact score (PV node).
    Exact = 1,
    /// Lower bound (beta cutoff / fail-high).
    LowerBound = 2,
    /// Upper bound (fail-low / all-node).
    UpperBound = 3,
}

impl Bound {
    const fn from_bits(bits: u64) -> Self {
        match bits & 0x3 {
            1 => Bound::Exact,
            2 => Bound::LowerBound,
            3 => Bound::UpperBound,
            _ => Bound::None,
        }
    }
}

fn compact_move(m: Move) -> u16 {
    let bits = m.to_bits();
    (bits & 0xFFFF) as u16
}

/// Result of a successful transposition-table probe.
#[derive(Debug, Clone, Copy)]
pub struct TtEntry {
    pub depth: u8,
    pub bound: Bound,
    pub score: i32,
    /// From/to/flag only; the caller resolves the full [`Move`] (moved and
    /// captured piece) by looking up `from`/`to` on the current position.
    pub compact_move: u16,
}

struct AtomicSlot {
    word0: AtomicU64,
    word1: AtomicU64,
}

impl AtomicSlot {
    const fn new() -> Self {
        AtomicSlot {
            word0: AtomicU64::new(0),
            word1: AtomicU64::new(0),
        }
    }

    // word0: [63:32] key32 | [31:25] generation(7) | [24:23] bound(2) |
    //        [22:16] depth(7) | [15:0] compact move
    fn pack_word0(key32: u32, generation: u8, bound: Bound, depth: u8, mv: u16) -> u64 {
        ((key32 as u64) << 32)
            | (((generation & 0x7F) as u64) << 25)
            | (((bound as u8) as u64) << 23)
            | (((depth.min(127)) as u64) << 16)
            | mv as u64
    }

    // word1: [63:32] check = key32 ^ word0_lower32 | [31:0] score (as i32 bits)
    fn pack_word1(w0: u64, score: i32) -> u64 {
        let key32 = (w0 >> 32) as u32;
        let lower = (w0 & 0xFFFF_FFFF) as u32;
        let check = (key32 ^ lower) as u64;
        (check << 32) | (score as u32 as u64)
    }

    fn store(&self, hash: u64, generation: u8, bound: Bound, depth: u8, score: i32, mv: u16) {
        let key32 = (hash >> 32) as u32;
        let w0 = Self::pack_word0(key32, generation, bound, depth, mv);
        let w1 = Self::pack_word1(w0, score);
        self.word0.store(w0, Ordering::Relaxed);
        self.word1.store(w1, Ordering::Relaxed);
    }

    fn load(&self, hash: u64) -> Option<(u8, Bound, u8, i32, u16)> {
        let w0 = self.word0.load(Ordering::Relaxed);
        let w1 = self.word1.load(Ordering::Relaxed);

        let key32 = (w0 >> 32) as u32;
        let lower = (w0 & 0xFFFF_FFFF) as u32;
        let check_expected = key32 ^ lower;
        let check_stored = (w1 >> 32) as u32;
        if check_expected != check_stored {
            return None;
        }
        if key32 != (hash >> 32) as u32 {
            return None;
        }

        let generation = ((w0 >> 25) & 0x7F) as u8;
        let bound = Bound::from_bits(w0 >> 23);
        if bound == Bound::None {
            return None;
        }
        let depth = ((w0 >> 16) & 0x7F) as u8;
        let mv = (w0 & 0xFFFF) as u16;
        let score = (w1 & 0xFFFF_FFFF) as u32 as i32;
        Some((generation, bound, depth, score, mv))
    }

    fn peek_meta(&self) -> Option<(u8, Bound, u8, i32)> {
        let w0 = self.word0.load(Ordering::Relaxed);
        let w1 = self.word1.load(Ordering::Relaxed);
        let bound = Bound::from_bits(w0 >> 23);
        if bound == Bound::None {
            return None;
        }
        let generation = ((w0 >> 25) & 0x7F) as u8;
        let depth = ((w0 >> 16) & 0x7F) as u8;
        let score = (w1 & 0xFFFF_FFFF) as u32 as i32;
        Some((generation, bound, depth, score))
    }

    fn key_matches(&self, hash: u64) -> bool {
        let w0 = self.word0.load(Ordering::Relaxed);
        (w0 >> 32) as u32 == (hash >> 32) as u32
    }
}

/// `value_rank` lower is "less worth keeping"; used to pick a replacement
/// victim among the four candidate slots per spec.md §4.5's ordering.
fn value_rank(generation: u8, current_gen: u8, bound: Bound, depth: u8, score: i32) -> (u8, u8, u8, i32) {
    let age = current_gen.wrapping_sub(generation) & 0x7F;
    let youth = 127 - age;
    let bound_rank = match bound {
        Bound::Exact => 2,
        Bound::LowerBound | Bound::UpperBound => 1,
        Bound::None => 0,
    };
    let score_rank = match bound {
        Bound::LowerBound => score,
        Bound::UpperBound => -score,
        _ => 0,
    };
    (youth, bound_rank, depth, score_rank)
}

/// Lock-less, set-associative transposition table.
pub struct Tt {
    tables: [Box<[AtomicSlot]>; 4],
    lens: [usize; 4],
    generation: AtomicU8,
}

impl Tt {
    /// Builds a table sized to approximately `mb` megabytes.
    pub fn new(mb: usize) -> Self {
        let bytes = mb.max(1) * 1024 * 1024;
        let total_entries = (bytes / std::mem::size_of::<AtomicSlot>()).max(4);
        let lens = sub_table_lengths(total_entries);
        let tables = lens.map(|len| (0..len).map(|_| AtomicSlot::new()).collect::<Vec<_>>().into_boxed_slice());
        Tt {
            tables,
            lens,
            generation: AtomicU8::new(0),
        }
    }

    /// Clears every entry and resets the generation counter.
    pub fn clear(&self) {
        for table in &self.tables {
            for slot in table.iter() {
                slot.word0.store(0, Ordering::Relaxed);
                slot.word1.store(0, Ordering::Relaxed);
            }
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    /// Advances the generation counter. Call once per new root search.
    pub fn new_generation(&self) {
        let cur = self.generation.load(Ordering::Relaxed);
        self.generation.store(cur.wrapping_add(1) & 0x7F, Ordering::Relaxed);
    }

    fn current_generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Probes all four candidate slots for `hash`, returning the first
    /// self-consistent match.
    pub fn probe(&self, hash: u64, ply: u8) -> Option<TtEntry> {
        for (table, &len) in self.tables.iter().zip(self.lens.iter()) {
            let idx = (hash % len as u64) as usize;
            if let Some((_, bound, depth, score, mv)) = table[idx].load(hash) {
                return Some(TtEntry {
                    depth,
                    bound,
                    score: score_from_tt(score, ply),
                    compact_move: mv,
                });
            }
        }
        None
    }

    /// Stores an entry, replacing whichever of the four candidate slots is
    /// empty, holds the same key, or is least valuable to keep.
    #[allow(clippy::too_many_arguments)]
    pub fn store(&self, hash: u64, depth: u8, bound: Bound, score: i32, best_move: Move, ply: u8) {
        let generation = self.current_generation();
        let mv = compact_move(best_move);
        let stored_score = score_to_tt(score, ply);

        let mut victim: Option<(usize, usize)> = None;
        let mut victim_rank = None;

        for (t, (table, &len)) in self.tables.iter().zip(self.lens.iter()).enumerate() {
            let idx = (hash % len as u64) as usize;
            let slot = &table[idx];
            if slot.key_matches(hash) || slot.peek_meta().is_none() {
                slot.store(hash, generation, bound, depth, stored_score, mv);
                return;
            }
            let (gen, b, d, s) = slot.peek_meta().unwrap();
            let rank = value_rank(gen, generation, b, d, s);
            if victim_rank.is_none() || rank < victim_rank.unwrap() {
                victim_rank = Some(rank);
                victim = Some((t, idx));
            }
        }

        if let Some((t, idx)) = victim {
            self.tables[t][idx].store(hash, generation, bound, depth, stored_score, mv);
        }
    }
}

// ---- Evaluation cache -------------------------------------------------

/// Result of a successful evaluation-cache probe.
#[derive(Debug, Clone, Copy)]
pub struct EvalEntry {
    pub score: i32,
    pub is_exact: bool,
}

struct AtomicEvalSlot {
    word0: AtomicU64,
    word1: AtomicU64,
}

impl AtomicEvalSlot {
    const fn new() -> Self {
        AtomicEvalSlot {
            word0: AtomicU64::new(0),
            word1: AtomicU64::new(0),
        }
    }

    // word0: [63:32] key32 | [31:25] generation(7) | [24] is_exact | [23] occupied
    fn pack_word0(key32: u32, generation: u8, is_exact: bool) -> u64 {
        ((key32 as u64) << 32) | (((generation & 0x7F) as u64) << 25) | ((is_exact as u64) << 24) | (1 << 23)
    }

    fn pack_word1(w0: u64, score: i32) -> u64 {
        let key32 = (w0 >> 32) as u32;
        let lower = (w0 & 0xFFFF_FFFF) as u32;
        let check = (key32 ^ lower) as u64;
        (check << 32) | (score as u32 as u64)
    }

    fn store(&self, hash: u64, generation: u8, is_exact: bool, score: i32) {
        let key32 = (hash >> 32) as u32;
        let w0 = Self::pack_word0(key32, generation, is_exact);
        let w1 = Self::pack_word1(w0, score);
        self.word0.store(w0, Ordering::Relaxed);
        self.word1.store(w1, Ordering::Relaxed);
    }

    fn load(&self, hash: u64) -> Option<(u8, bool, i32)> {
        let w0 = self.word0.load(Ordering::Relaxed);
        let w1 = self.word1.load(Ordering::Relaxed);
        if (w0 >> 23) & 1 == 0 {
            return None;
        }
        let key32 = (w0 >> 32) as u32;
        let lower = (w0 & 0xFFFF_FFFF) as u32;
        if (key32 ^ lower) != (w1 >> 32) as u32 {
            return None;
        }
        if key32 != (hash >> 32) as u32 {
            return None;
        }
        let generation = ((w0 >> 25) & 0x7F) as u8;
        let is_exact = (w0 >> 24) & 1 != 0;
        let score = (w1 & 0xFFFF_FFFF) as u32 as i32;
        Some((generation, is_exact, score))
    }

    fn peek_meta(&self) -> Option<(u8, bool)> {
        let w0 = self.word0.load(Ordering::Relaxed);
        if (w0 >> 23) & 1 == 0 {
            return None;
        }
        Some((((w0 >> 25) & 0x7F) as u8, (w0 >> 24) & 1 != 0))
    }

    fn key_matches(&self, hash: u64) -> bool {
        let w0 = self.word0.load(Ordering::Relaxed);
        (w0 >> 32) as u32 == (hash >> 32) as u32
    }
}

/// Lock-less, set-associative static-evaluation cache.
///
/// Mirrors [`Tt`]'s layout and replacement shape but stores `(key, score,
/// is_exact, generation)` per spec.md's canonical richer `ETEntry` variant.
pub struct EvalCache {
    tables: [Box<[AtomicEvalSlot]>; 4],
    lens: [usize; 4],
    generation: AtomicU8,
}

impl EvalCache {
    pub fn new(mb: usize) -> Self {
        let bytes = mb.max(1) * 1024 * 1024;
        let total_entries = (bytes / std::mem::size_of::<AtomicEvalSlot>()).max(4);
        let lens = sub_table_lengths(total_entries);
        let tables = lens.map(|len| (0..len).map(|_| AtomicEvalSlot::new()).collect::<Vec<_>>().into_boxed_slice());
        EvalCache {
            tables,
            lens,
            generation: AtomicU8::new(0),
        }
    }

    pub fn clear(&self) {
        for table in &self.tables {
            for slot in table.iter() {
                slot.word0.store(0, Ordering::Relaxed);
                slot.word1.store(0, Ordering::Relaxed);
            }
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    pub fn new_generation(&self) {
        let cur = self.generation.load(Ordering::Relaxed);
        self.generation.store(cur.wrapping_add(1) & 0x7F, Ordering::Relaxed);
    }

    pub fn probe(&self, hash: u64) -> Option<EvalEntry> {
        for (table, &len) in self.tables.iter().zip(self.lens.iter()) {
            let idx = (hash % len as u64) as usize;
            if let Some((_, is_exact, score)) = table[idx].load(hash) {
                return Some(EvalEntry { score, is_exact });
            }
        }
        None
    }

    pub fn store(&self, hash: u64, is_exact: bool, score: i32) {
        let generation = self.generation.load(Ordering::Relaxed);

        let mut victim: Option<(usize, usize)> = None;
        let mut victim_rank: Option<(u8, u8)> = None;

        for (t, (table, &len)) in self.tables.iter().zip(self.lens.iter()).enumerate() {
            let idx = (hash % len as u64) as usize;
            let slot = &table[idx];
            if slot.key_matches(hash) || slot.peek_meta().is_none() {
                slot.store(hash, generation, is_exact, score);
                return;
            }
            let (gen, exact) = slot.peek_meta().unwrap();
            let age = generation.wrapping_sub(gen) & 0x7F;
            let rank = (127 - age, exact as u8);
            if victim_rank.is_none() || rank < victim_rank.unwrap() {
                victim_rank = Some(rank);
                victim = Some((t, idx));
            }
        }

        if let Some((t, idx)) = victim {
            self.tables[t][idx].store(hash, generation, is_exact, score);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::{MoveFlag, Piece, Square};

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    #[test]
    fn tt_store_and_probe_roundtrip() {
        let tt = Tt::new(1);
        let hash = 0xDEAD_BEEF_1234_5678u64;
        let m = Move::new(sq("e2"), sq("e4"), MoveFlag::DoublePush, Piece::Pawn, None);
        tt.store(hash, 5, Bound::Exact, 123, m, 0);

        let entry = tt.probe(hash, 0).expect("entry should be found");
        assert_eq!(entry.depth, 5);
        assert_eq!(entry.bound, Bound::Exact);
        assert_eq!(entry.score, 123);
    }

    #[test]
    fn tt_probe_miss_returns_none() {
        let tt = Tt::new(1);
        assert!(tt.probe(0x1234_5678_9ABC_DEF0, 0).is_none());
    }

    #[test]
    fn tt_mate_score_round_trips_through_ply_adjustment() {
        let mate_score = 29_000 - 3;
        let ply = 5u8;
        let stored = score_to_tt(mate_score, ply);
        assert_eq!(score_from_tt(stored, ply), mate_score);
    }

    #[test]
    fn tt_clear_empties_every_entry() {
        let tt = Tt::new(1);
        let hash = 0xAAAA_BBBB_CCCC_DDDDu64;
        let m = Move::new(sq("d2"), sq("d4"), MoveFlag::DoublePush, Piece::Pawn, None);
        tt.store(hash, 5, Bound::Exact, 50, m, 0);
        assert!(tt.probe(hash, 0).is_some());
        tt.clear();
        assert!(tt.probe(hash, 0).is_none());
    }

    #[test]
    fn eval_cache_store_and_probe_roundtrip() {
        let cache = EvalCache::new(1);
        let hash = 0x1111_2222_3333_4444u64;
        cache.store(hash, true, -57);
        let entry = cache.probe(hash).expect("entry should be found");
        assert_eq!(entry.score, -57);
        assert!(entry.is_exact);
    }

    #[test]
    fn eval_cache_probe_miss_returns_none() {
        let cache = EvalCache::new(1);
        assert!(cache.probe(0x9999_8888_7777_6666).is_none());
    }

    #[test]
    fn generation_replacement_evicts_stale_entries_before_fresh_ones() {
        let tt = Tt::new(1);
        let len = tt.lens[0] as u64;
        // Two different keys landing in the same first sub-table slot.
        let hash_a = 7 * len;
        let hash_b = hash_a + len * 9999; // same `% len` index, different key32
        let m = Move::new(sq("a2"), sq("a4"), MoveFlag::DoublePush, Piece::Pawn, None);

        tt.store(hash_a, 10, Bound::Exact, 0, m, 0);
        tt.new_generation();
        tt.store(hash_b, 1, Bound::LowerBound, 0, m, 0);

        // hash_a's generation is now stale relative to hash_b's; hash_b
        // should have displaced it from every slot it could occupy.
        assert!(tt.probe(hash_b, 0).is_some());
    }
}
