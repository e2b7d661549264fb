//! Computed table: a direct-mapped cache of operation results.
//!
//! Each slot holds one `(op, f, g, h) -> result` entry. Entries carry a
//! generation stamp, so flushing the whole table (required after every
//! reordering) is O(1).
//!
//! Entries do not own references. A cached result may therefore be a dead
//! node; the manager reclaims it on a hit, and garbage collection drops every
//! entry that touches a node it is about to free.
//!
//! The table grows on its own while the hit rate stays above the configured
//! threshold and the unique table is large enough to justify it.

use crate::reference::Ref;
use crate::subtable::{HASH_P1, HASH_P2};

const HASH_P3: u32 = 741_457;

/// Operation tags stored in cache keys.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum CacheOp {
    Ite = 1,
    And,
    Xor,
    Exists,
    AndExists,
    XorExists,
    BooleanDiff,
    Constrain,
    Compose,
    Intersect,
    VarDependent,
    Leq,
    Cofactor,
    Flip,
    AddPlus,
    AddTimes,
    AddMinus,
    AddMinimum,
    AddMaximum,
    AddDivide,
    AddAgreement,
    AddOr,
    AddAnd,
    AddIte,
    AddNegate,
    AddExists,
    BddToAdd,
    AddThreshold,
    AddPattern,
    AddFlip,
}

#[derive(Debug, Copy, Clone)]
struct Entry {
    f: Ref,
    g: Ref,
    h: Ref,
    data: Ref,
    op: CacheOp,
    generation: u32,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            f: Ref::INVALID,
            g: Ref::INVALID,
            h: Ref::INVALID,
            data: Ref::INVALID,
            op: CacheOp::Ite,
            generation: 0, // Invalid
        }
    }
}

/// Cache counters, exposed through the manager.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub slots: usize,
    pub lookups: usize,
    pub hits: usize,
    pub inserts: usize,
    /// Inserts that evicted a different live entry.
    pub collisions: usize,
    /// Entries dropped because they referenced collected nodes.
    pub deletions: usize,
    pub resizes: usize,
}

pub struct ComputedCache {
    entries: Vec<Entry>,
    shift: u32,
    generation: u32,
    /// Hits and misses since the last resize, driving the growth policy.
    hits: f64,
    misses: f64,
    min_hit_ratio: f64,
    hard_max: usize,
    stats: CacheStats,
}

impl ComputedCache {
    /// Creates a cache with `slots` entries (rounded to a power of two).
    ///
    /// `min_hit` is the hit rate in percent above which the cache grows;
    /// `hard_max` caps that growth.
    pub fn new(slots: usize, min_hit: u32, hard_max: usize) -> Self {
        let slots = slots.max(2).next_power_of_two().min(1 << 30);
        let min_hit = min_hit.min(99) as f64;
        let min_hit_ratio = min_hit / (100.0 - min_hit);
        Self {
            entries: vec![Entry::default(); slots],
            shift: 32 - slots.trailing_zeros(),
            generation: 1,
            hits: 0.0,
            misses: slots as f64 * min_hit_ratio + 1.0,
            min_hit_ratio,
            hard_max: hard_max.max(slots),
            stats: CacheStats {
                slots,
                ..CacheStats::default()
            },
        }
    }

    pub fn slots(&self) -> usize {
        self.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn hard_max(&self) -> usize {
        self.hard_max
    }

    pub fn set_hard_max(&mut self, hard_max: usize) {
        self.hard_max = hard_max;
    }

    #[inline]
    fn index(&self, op: CacheOp, f: Ref, g: Ref, h: Ref) -> usize {
        let a = f.raw().wrapping_mul(HASH_P1).wrapping_add(g.raw());
        let b = a.wrapping_mul(HASH_P2).wrapping_add(h.raw());
        let c = b.wrapping_mul(HASH_P3).wrapping_add(op as u32);
        (c.wrapping_mul(HASH_P1) >> self.shift) as usize
    }

    /// Looks up a cached result.
    #[inline]
    pub fn lookup(&mut self, op: CacheOp, f: Ref, g: Ref, h: Ref) -> Option<Ref> {
        self.stats.lookups += 1;
        let entry = &self.entries[self.index(op, f, g, h)];
        if entry.generation == self.generation && entry.op == op && entry.f == f && entry.g == g && entry.h == h {
            self.stats.hits += 1;
            self.hits += 1.0;
            Some(entry.data)
        } else {
            self.misses += 1.0;
            None
        }
    }

    #[inline]
    pub fn insert(&mut self, op: CacheOp, f: Ref, g: Ref, h: Ref, data: Ref) {
        let idx = self.index(op, f, g, h);
        let generation = self.generation;
        let entry = &mut self.entries[idx];
        if entry.generation == generation && (entry.op != op || entry.f != f || entry.g != g || entry.h != h) {
            self.stats.collisions += 1;
        }
        *entry = Entry {
            f,
            g,
            h,
            data,
            op,
            generation,
        };
        self.stats.inserts += 1;
    }

    /// Drops every entry in O(1).
    pub fn clear(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            // Wrapped around: stale stamps could look current again.
            self.entries.fill(Entry::default());
            self.generation = 1;
        }
    }

    /// Drops every entry for which `dead` holds on a key or the result.
    pub fn clear_dead(&mut self, mut dead: impl FnMut(Ref) -> bool) {
        let generation = self.generation;
        for entry in self.entries.iter_mut() {
            if entry.generation != generation {
                continue;
            }
            let touches = [entry.f, entry.g, entry.h, entry.data]
                .into_iter()
                .any(|r| r != Ref::INVALID && dead(r));
            if touches {
                entry.generation = 0;
                self.stats.deletions += 1;
            }
        }
    }

    /// Returns true if the hit rate justifies doubling the table, given the
    /// total number of unique-table slots.
    pub fn wants_to_grow(&self, unique_slots: usize) -> bool {
        let limit = self.hard_max.min(crate::config::MAX_CACHE_TO_SLOTS_RATIO * unique_slots);
        limit >= 2 * self.entries.len() && self.hits > self.misses * self.min_hit_ratio
    }

    /// Rebuilds the table with `slots` entries, keeping the entries that
    /// still map to a distinct slot.
    ///
    /// Returns false, leaving the table untouched, if the memory is refused.
    pub fn resize(&mut self, slots: usize) -> bool {
        let slots = slots.max(2).next_power_of_two().min(1 << 30);
        let mut entries = Vec::new();
        if entries.try_reserve_exact(slots).is_err() {
            return false;
        }
        entries.resize(slots, Entry::default());
        let old = std::mem::replace(&mut self.entries, entries);
        self.shift = 32 - slots.trailing_zeros();
        let generation = self.generation;
        for entry in old.into_iter().filter(|e| e.generation == generation) {
            let idx = self.index(entry.op, entry.f, entry.g, entry.h);
            self.entries[idx] = entry;
        }
        self.hits = 0.0;
        self.misses = slots as f64 * self.min_hit_ratio + 1.0;
        self.stats.slots = slots;
        self.stats.resizes += 1;
        log::debug!("Resized computed cache to {} slots", slots);
        true
    }

    /// Number of bytes held by the table.
    pub fn memory(&self) -> usize {
        self.entries.capacity() * std::mem::size_of::<Entry>()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::types::NodeId;

    fn r(i: u32) -> Ref {
        Ref::positive(NodeId::new(i))
    }

    #[test]
    fn test_insert_lookup() {
        let mut cache = ComputedCache::new(16, 30, 1024);
        cache.insert(CacheOp::And, r(1), r(2), r(0), r(7));
        assert_eq!(cache.lookup(CacheOp::And, r(1), r(2), r(0)), Some(r(7)));
        assert_eq!(cache.lookup(CacheOp::Xor, r(1), r(2), r(0)), None);
        assert_eq!(cache.lookup(CacheOp::And, r(2), r(1), r(0)), None);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().lookups, 3);
    }

    #[test]
    fn test_clear_is_total() {
        let mut cache = ComputedCache::new(16, 30, 1024);
        for i in 0..8 {
            cache.insert(CacheOp::Ite, r(i), r(i + 1), r(i + 2), r(i));
        }
        cache.clear();
        for i in 0..8 {
            assert_eq!(cache.lookup(CacheOp::Ite, r(i), r(i + 1), r(i + 2)), None);
        }
    }

    #[test]
    fn test_clear_dead_drops_touching_entries() {
        let mut cache = ComputedCache::new(64, 30, 1024);
        cache.insert(CacheOp::And, r(1), r(2), Ref::INVALID, r(3));
        cache.insert(CacheOp::And, r(4), r(5), Ref::INVALID, r(6));
        cache.clear_dead(|x| x.id() == NodeId::new(3));
        assert_eq!(cache.lookup(CacheOp::And, r(1), r(2), Ref::INVALID), None);
        assert_eq!(cache.lookup(CacheOp::And, r(4), r(5), Ref::INVALID), Some(r(6)));
        assert_eq!(cache.stats().deletions, 1);
    }

    #[test]
    fn test_resize_keeps_entries() {
        let mut cache = ComputedCache::new(4, 30, 1024);
        cache.insert(CacheOp::Xor, r(1), r(2), Ref::INVALID, r(9));
        assert!(cache.resize(64));
        assert_eq!(cache.slots(), 64);
        assert_eq!(cache.lookup(CacheOp::Xor, r(1), r(2), Ref::INVALID), Some(r(9)));
    }

    #[test]
    fn test_growth_policy() {
        let mut cache = ComputedCache::new(4, 30, 1 << 20);
        cache.insert(CacheOp::And, r(1), r(2), Ref::INVALID, r(3));
        for _ in 0..100 {
            cache.lookup(CacheOp::And, r(1), r(2), Ref::INVALID);
        }
        assert!(cache.wants_to_grow(1 << 10));
        assert!(!cache.wants_to_grow(1));
    }
}
