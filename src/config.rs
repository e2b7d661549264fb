//! Manager configuration.
//!
//! Every knob of the engine lives in [`ManagerConfig`]. Fields are public so a
//! config can be written as a struct literal, and each one also has a
//! `with_*` builder for chaining off `ManagerConfig::default()`.

use std::time::Duration;

use crate::reorder::{GroupCheck, ReorderMethod};

/// Initial number of buckets of each level subtable.
pub const DEFAULT_UNIQUE_SLOTS: usize = 256;
/// Initial number of computed-cache slots.
pub const DEFAULT_CACHE_SLOTS: usize = 262_144;
/// A subtable is grown once it holds this many keys per bucket.
pub const MAX_SUBTABLE_DENSITY: usize = 4;
/// Collection trigger while the table is small.
pub const GC_FRAC_HI: f64 = MAX_SUBTABLE_DENSITY as f64 * 1.0;
/// Collection trigger once the table has grown past the loose threshold.
pub const GC_FRAC_LO: f64 = MAX_SUBTABLE_DENSITY as f64 * 0.25;
/// Collection trigger when memory is tight.
pub const GC_FRAC_MIN: f64 = 0.2;
/// Number of nodes allocated at once when the free list runs dry.
pub const MEM_CHUNK: usize = 1022;
/// Live-node count at which the first automatic reordering fires.
pub const FIRST_REORDER: usize = 4004;
/// Fraction (1/n) of the memory budget the unique table may use before
/// collection becomes more aggressive.
pub const MAX_LOOSE_FRACTION: usize = 5;
/// Fraction (1/n) of the memory budget the computed cache may use.
pub const MAX_CACHE_FRACTION: usize = 3;
/// Fraction (1/n) of the memory budget held back as an emergency stash.
pub const STASH_FRACTION: usize = 64;
/// Upper bound on the cache size relative to the total number of slots.
pub const MAX_CACHE_TO_SLOTS_RATIO: usize = 4;

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Number of variables created up front.
    pub num_vars: usize,
    /// Initial bucket count of each subtable (rounded up to a power of two).
    pub unique_slots: usize,
    /// Initial cache size in slots (rounded down to a power of two).
    pub cache_size: usize,
    /// Hard cap on automatic cache growth, in slots.
    pub max_cache_size: Option<usize>,
    /// Memory budget in bytes. Zero means unlimited.
    pub max_memory: usize,
    /// Sifting aborts a direction once the size exceeds `best * max_growth`.
    pub max_growth: f64,
    /// Whether the unique table may collect garbage on its own.
    pub gc_enabled: bool,
    /// Whether reordering is triggered automatically by table growth.
    pub auto_reorder: bool,
    /// Heuristic used by automatic reordering.
    pub auto_method: ReorderMethod,
    /// Live-node count that triggers the first automatic reordering.
    pub first_reorder: usize,
    /// Growth factor between two automatic reorderings.
    pub reorder_growth: f64,
    /// Maximum number of variables sifted per pass.
    pub sift_max_var: usize,
    /// Maximum number of swaps per reordering call.
    pub sift_max_swaps: usize,
    /// Wall-clock budget for one reordering call.
    pub time_limit: Option<Duration>,
    /// Hit rate (percent) above which the cache is grown.
    pub min_hit: u32,
    /// Extended symmetry: percentage of nodes allowed to violate symmetry.
    pub symm_violation: u32,
    /// Extended symmetry: percentage of arcs allowed to bypass the pair.
    pub arc_violation: u32,
    /// Second-difference aggregation threshold (percent).
    pub recomb: i32,
    /// Aggregation predicate used by group sifting.
    pub group_check: GroupCheck,
    /// Genetic population size. Zero picks one from the variable count.
    pub population_size: usize,
    /// Genetic crossover trials. Zero picks one from the variable count.
    pub crossovers: usize,
    /// Seed of the default random source.
    pub seed: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            num_vars: 0,
            unique_slots: DEFAULT_UNIQUE_SLOTS,
            cache_size: DEFAULT_CACHE_SLOTS,
            max_cache_size: None,
            max_memory: 0,
            max_growth: 1.2,
            gc_enabled: true,
            auto_reorder: false,
            auto_method: ReorderMethod::Sift,
            first_reorder: FIRST_REORDER,
            reorder_growth: 2.0,
            sift_max_var: 1000,
            sift_max_swaps: 2_000_000,
            time_limit: None,
            min_hit: 30,
            symm_violation: 0,
            arc_violation: 0,
            recomb: 0,
            group_check: GroupCheck::ExtendedSymmetry,
            population_size: 0,
            crossovers: 0,
            seed: 1,
        }
    }
}

impl ManagerConfig {
    pub fn with_num_vars(mut self, num_vars: usize) -> Self {
        self.num_vars = num_vars;
        self
    }

    pub fn with_unique_slots(mut self, slots: usize) -> Self {
        self.unique_slots = slots;
        self
    }

    pub fn with_cache_size(mut self, slots: usize) -> Self {
        self.cache_size = slots;
        self
    }

    pub fn with_max_cache_size(mut self, slots: usize) -> Self {
        self.max_cache_size = Some(slots);
        self
    }

    pub fn with_max_memory(mut self, bytes: usize) -> Self {
        self.max_memory = bytes;
        self
    }

    pub fn with_max_growth(mut self, max_growth: f64) -> Self {
        self.max_growth = max_growth;
        self
    }

    pub fn with_gc(mut self, enabled: bool) -> Self {
        self.gc_enabled = enabled;
        self
    }

    /// Enables automatic reordering with the given heuristic.
    pub fn with_auto_reorder(mut self, method: ReorderMethod) -> Self {
        self.auto_reorder = true;
        self.auto_method = method;
        self
    }

    pub fn with_first_reorder(mut self, threshold: usize) -> Self {
        self.first_reorder = threshold;
        self
    }

    pub fn with_reorder_growth(mut self, ratio: f64) -> Self {
        self.reorder_growth = ratio;
        self
    }

    pub fn with_sift_max_var(mut self, max_var: usize) -> Self {
        self.sift_max_var = max_var;
        self
    }

    pub fn with_sift_max_swaps(mut self, max_swaps: usize) -> Self {
        self.sift_max_swaps = max_swaps;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_min_hit(mut self, percent: u32) -> Self {
        self.min_hit = percent;
        self
    }

    pub fn with_group_check(mut self, check: GroupCheck) -> Self {
        self.group_check = check;
        self
    }

    pub fn with_symmetry_violation(mut self, symm_violation: u32, arc_violation: u32) -> Self {
        self.symm_violation = symm_violation;
        self.arc_violation = arc_violation;
        self
    }

    pub fn with_recomb(mut self, recomb: i32) -> Self {
        self.recomb = recomb;
        self
    }

    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    pub fn with_crossovers(mut self, crossovers: usize) -> Self {
        self.crossovers = crossovers;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
