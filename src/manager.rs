//! The decision-diagram manager.
//!
//! A [`Manager`] owns every piece of shared state: the node arena, one
//! subtable per level, the constant table, the computed cache and the
//! bookkeeping of the reordering subsystem. All operations go through it, so
//! structural sharing and canonicity hold across every diagram it hands out.
//!
//! # References
//!
//! Functions are plain [`Ref`] handles. A handle stays valid, and keeps
//! denoting the same Boolean function, for as long as it is *held*:
//!
//! - every operation returning a `Ref` hands it over already held once;
//!   give it back with [`Manager::release`] when done,
//! - [`Manager::hold`] adds one more hold,
//! - constants and projection functions ([`Manager::var`]) are held by the
//!   manager itself and need no bookkeeping. The permanent terminals
//!   (`one`, `zero`, the infinities) ignore holds and releases.
//!
//! Unheld nodes become *dead*. They stay in the unique table and may be
//! revived by a later lookup until a garbage collection frees them.
//!
//! # Example
//!
//! ```
//! use dd_rs::manager::Manager;
//!
//! let mut mgr = Manager::new(3);
//! let (x0, x1) = (mgr.var(0), mgr.var(1));
//! let f = mgr.and(x0, x1).unwrap();
//! let g = mgr.and(x1, x0).unwrap();
//! assert_eq!(f, g);
//! assert!(mgr.eval(f, &[true, true, false]));
//! mgr.release(f);
//! mgr.release(g);
//! ```

use std::fmt;
use std::mem::size_of;
use std::time::Duration;

use log::{debug, warn};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::cache::{CacheStats, ComputedCache};
use crate::config::*;
use crate::error::{Abort, DdError, Result};
use crate::interact::InteractionMatrix;
use crate::node::Node;
use crate::reference::Ref;
use crate::reorder::linear::LinearMatrix;
use crate::reorder::{ReorderBudget, ReorderMethod};
use crate::storage::NodeStorage;
use crate::subtable::{ConstTable, Subtable};
use crate::types::{Level, NodeId, Var};

/// Values closer than this are considered the same terminal.
pub const EPSILON: f64 = 1e-12;

/// Events a hook can subscribe to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum HookKind {
    PreReorder,
    PostReorder,
    PreGc,
    PostGc,
}

/// Snapshot handed to hooks.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HookInfo {
    pub kind: HookKind,
    /// Heuristic being run, for reordering hooks.
    pub method: Option<ReorderMethod>,
    /// Total number of nodes in the unique table, dead ones included.
    pub nodes: usize,
    pub dead: usize,
}

pub type Hook = Box<dyn FnMut(&HookInfo)>;

/// Running counters of the manager.
#[derive(Debug, Default, Copy, Clone)]
pub(crate) struct Counters {
    pub gc_count: usize,
    pub gc_time: Duration,
    pub nodes_freed: usize,
    pub reorderings: usize,
    pub reorder_time: Duration,
    pub peak_nodes: usize,
    pub swaps: usize,
}

pub struct Manager {
    pub(crate) config: ManagerConfig,
    pub(crate) nodes: NodeStorage,
    /// Subtables indexed by level.
    pub(crate) subtables: Vec<Subtable>,
    pub(crate) consts: ConstTable,
    /// Variable index to level.
    pub(crate) perm: Vec<usize>,
    /// Level to variable index.
    pub(crate) invperm: Vec<usize>,
    /// Projection functions, indexed by variable.
    pub(crate) vars: Vec<Ref>,
    pub(crate) one: Ref,
    pub(crate) add_zero: Ref,
    pub(crate) plus_inf: Ref,
    pub(crate) minus_inf: Ref,
    pub(crate) cache: ComputedCache,

    /// Nodes in the unique table, constants and dead nodes included.
    pub(crate) keys: usize,
    pub(crate) dead: usize,
    /// Total number of buckets over all subtables.
    pub(crate) slots: usize,
    pub(crate) min_dead: usize,
    pub(crate) gc_frac: f64,
    pub(crate) loose_up_to: usize,
    pub(crate) density: usize,

    /// Projection functions referenced only by the manager; maintained
    /// during reordering.
    pub(crate) isolated: usize,
    pub(crate) next_dyn: usize,
    pub(crate) auto_reorder: bool,
    pub(crate) auto_method: ReorderMethod,
    pub(crate) reordering: bool,
    pub(crate) interact: InteractionMatrix,
    /// Group ring by level: each level points to the next level of its
    /// group, and the last level of a group points back to the first.
    pub(crate) group_next: Vec<usize>,
    /// Caller-declared groups, members listed top first.
    pub(crate) declared_groups: Vec<Vec<usize>>,
    /// Symmetry groups found by the last symmetric sifting, top group first.
    pub(crate) symmetry: Vec<Vec<Var>>,
    pub(crate) linear: Option<LinearMatrix>,
    pub(crate) budget: ReorderBudget,

    pub(crate) rng: Box<dyn RngCore>,
    hooks: Vec<(HookKind, Hook)>,
    pub(crate) stats: Counters,
    pub(crate) stack: Vec<NodeId>,
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("vars", &self.vars.len())
            .field("keys", &self.keys)
            .field("dead", &self.dead)
            .field("slots", &self.slots)
            .field("cache_slots", &self.cache.slots())
            .finish()
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Manager {
    /// Creates a manager with `num_vars` variables and default settings.
    pub fn new(num_vars: usize) -> Self {
        Self::with_config(ManagerConfig::default().with_num_vars(num_vars))
    }

    /// Creates a manager with the given initial variable count, cache size
    /// (slots) and memory budget in bytes (0 for unlimited).
    pub fn create(num_vars: usize, cache_size: usize, max_memory: usize) -> Self {
        Self::with_config(
            ManagerConfig::default()
                .with_num_vars(num_vars)
                .with_cache_size(cache_size)
                .with_max_memory(max_memory),
        )
    }

    pub fn with_config(config: ManagerConfig) -> Self {
        let unique_slots = crate::subtable::round_slots(config.unique_slots);
        let cache_slots = config.cache_size.max(2).next_power_of_two();
        let cache_hard_max = match (config.max_cache_size, config.max_memory) {
            (Some(max), _) => max,
            (None, 0) => cache_slots * 16,
            (None, budget) => (budget / MAX_CACHE_FRACTION / 32).max(cache_slots),
        };
        let loose_up_to = if config.max_memory == 0 {
            1 << 22
        } else {
            config.max_memory / size_of::<NodeId>() / MAX_LOOSE_FRACTION
        };

        let mut mgr = Self {
            nodes: NodeStorage::new(config.max_memory),
            subtables: Vec::new(),
            consts: ConstTable::new(unique_slots, EPSILON),
            perm: Vec::new(),
            invperm: Vec::new(),
            vars: Vec::new(),
            one: Ref::INVALID,
            add_zero: Ref::INVALID,
            plus_inf: Ref::INVALID,
            minus_inf: Ref::INVALID,
            cache: ComputedCache::new(cache_slots, config.min_hit, cache_hard_max),
            keys: 0,
            dead: 0,
            slots: 0,
            min_dead: 0,
            gc_frac: GC_FRAC_HI,
            loose_up_to,
            density: MAX_SUBTABLE_DENSITY,
            isolated: 0,
            next_dyn: config.first_reorder,
            auto_reorder: config.auto_reorder,
            auto_method: config.auto_method,
            reordering: false,
            interact: InteractionMatrix::new(0),
            group_next: Vec::new(),
            declared_groups: Vec::new(),
            symmetry: Vec::new(),
            linear: None,
            budget: ReorderBudget::default(),
            rng: Box::new(ChaCha8Rng::seed_from_u64(config.seed)),
            hooks: Vec::new(),
            stats: Counters::default(),
            stack: Vec::new(),
            config,
        };

        mgr.one = mgr.permanent_constant(1.0);
        mgr.add_zero = mgr.permanent_constant(0.0);
        mgr.plus_inf = mgr.permanent_constant(f64::INFINITY);
        mgr.minus_inf = mgr.permanent_constant(f64::NEG_INFINITY);

        for _ in 0..mgr.config.num_vars {
            if let Err(e) = mgr.new_var() {
                warn!("Stopped creating variables at {}: {}", mgr.vars.len(), e);
                break;
            }
        }
        mgr.min_dead = (mgr.gc_frac * mgr.slots as f64) as usize;
        debug!(
            "Created manager: {} vars, {} unique slots per level, {} cache slots",
            mgr.vars.len(),
            unique_slots,
            mgr.cache.slots()
        );
        mgr
    }

    fn permanent_constant(&mut self, value: f64) -> Ref {
        // The arena always has room for the handful of permanent terminals.
        let r = self.unique_const(value).expect("node arena too small for the terminals");
        // Saturated counters never move, so stray releases cannot kill it.
        self.nodes[r.id()].refs = Node::MAX_REF;
        r
    }

    /// Returns the configuration the manager was created with.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Adds a new variable at the bottom of the order.
    pub fn new_var(&mut self) -> Result<Var> {
        let index = self.vars.len();
        if index as u64 > Var::MAX_INDEX as u64 {
            return Err(DdError::invalid("too many variables"));
        }
        let level = self.subtables.len();
        let slots = crate::subtable::round_slots(self.config.unique_slots);
        self.subtables.push(Subtable::new(slots));
        self.slots += slots;
        self.perm.push(level);
        self.invperm.push(index);
        self.group_next.push(level);
        if let Some(linear) = self.linear.as_mut() {
            linear.grow(index + 1);
        }

        let projection = match self.make_projection(index as u32, level) {
            Ok(r) => r,
            Err(_) => {
                self.subtables.pop();
                self.slots -= slots;
                self.perm.pop();
                self.invperm.pop();
                self.group_next.pop();
                return Err(DdError::OutOfMemory);
            }
        };
        self.vars.push(projection);
        self.min_dead = (self.gc_frac * self.slots as f64) as usize;
        Ok(Var::new(index as u32))
    }

    /// Creates the node `(index, 1, 0)` in the empty subtable at `level`,
    /// held by the manager.
    fn make_projection(&mut self, index: u32, level: usize) -> std::result::Result<Ref, Abort> {
        let (high, low) = (self.one, -self.one);
        let id = self.alloc_node(Node::internal(index, high, low))?;
        let probe = self.subtables[level].probe(high, low, self.nodes.as_slice());
        self.subtables[level].insert_at(probe, id, self.nodes.as_mut_slice());
        self.keys += 1;
        self.nodes[high.id()].inc_ref();
        self.nodes[low.id()].inc_ref();
        self.nodes[id].refs = 1;
        Ok(Ref::positive(id))
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Projection function of `var`. The manager keeps it alive.
    ///
    /// # Panics
    ///
    /// Panics if `var` was never created.
    pub fn var(&self, var: impl Into<Var>) -> Ref {
        let var = var.into();
        self.vars[var.index()]
    }

    /// Complement of the projection function of `var`.
    pub fn nvar(&self, var: impl Into<Var>) -> Ref {
        -self.var(var)
    }

    /// The constant true function (also the ADD constant 1).
    pub fn one(&self) -> Ref {
        self.one
    }

    /// The constant false function.
    pub fn zero(&self) -> Ref {
        -self.one
    }

    /// The ADD constant 0.
    pub fn add_zero(&self) -> Ref {
        self.add_zero
    }

    pub fn plus_infinity(&self) -> Ref {
        self.plus_inf
    }

    pub fn minus_infinity(&self) -> Ref {
        self.minus_inf
    }

    /// Returns the terminal with the given value, held once.
    pub fn constant(&mut self, value: f64) -> Result<Ref> {
        if value.is_nan() {
            return Err(DdError::invalid("constant value is NaN"));
        }
        self.run(|mgr| mgr.unique_const(value))
    }

    pub fn is_constant(&self, f: Ref) -> bool {
        self.nodes[f.id()].is_terminal()
    }

    /// Value of a terminal node; `None` for internal nodes.
    ///
    /// Complemented edges to the unit terminal evaluate to 0.
    pub fn constant_value(&self, f: Ref) -> Option<f64> {
        let node = &self.nodes[f.id()];
        if !node.is_terminal() {
            None
        } else if f.is_negated() {
            Some(0.0)
        } else {
            Some(node.value)
        }
    }

    /// Adds one hold on `f`.
    pub fn hold(&mut self, f: Ref) {
        self.ref_node(f);
    }

    /// Gives back one hold on `f`, killing nodes that lose their last one.
    pub fn release(&mut self, f: Ref) {
        self.deref_node(f);
    }

    /// Current reference count of the node behind `f`.
    pub fn ref_count(&self, f: Ref) -> u32 {
        self.nodes[f.id()].refs
    }

    /// Variable index of the top node of `f`, or `None` for constants.
    pub fn top_var(&self, f: Ref) -> Option<Var> {
        let node = &self.nodes[f.id()];
        if node.is_terminal() {
            None
        } else {
            Some(Var::new(node.index))
        }
    }

    /// Then-cofactor of the top node, with the edge complement applied.
    pub fn high(&self, f: Ref) -> Ref {
        self.nodes[f.id()].high.negate_if(f.is_negated())
    }

    /// Else-cofactor of the top node, with the edge complement applied.
    pub fn low(&self, f: Ref) -> Ref {
        self.nodes[f.id()].low.negate_if(f.is_negated())
    }

    pub fn level_of(&self, var: impl Into<Var>) -> Level {
        Level::new(self.perm[var.into().index()])
    }

    pub fn var_at(&self, level: impl Into<Level>) -> Var {
        Var::new(self.invperm[level.into().index()] as u32)
    }

    /// Variables from the top level down.
    pub fn order(&self) -> Vec<Var> {
        self.invperm.iter().map(|&v| Var::new(v as u32)).collect()
    }

    /// Level of the top node of `f`; constants sit below every level.
    #[inline]
    pub(crate) fn level_of_ref(&self, f: Ref) -> usize {
        let index = self.nodes[f.id()].index;
        if index == Var::CONST_INDEX {
            usize::MAX
        } else {
            self.perm[index as usize]
        }
    }

    /// Number of projection functions nobody but the manager holds.
    pub(crate) fn count_isolated(&self) -> usize {
        self.vars.iter().filter(|v| self.nodes[v.id()].refs == 1).count()
    }

    /// Live nodes, not counting isolated projection functions.
    ///
    /// This is the quantity reordering minimises.
    pub fn size(&self) -> usize {
        self.keys - self.dead - self.count_isolated()
    }

    /// Nodes in the unique table, dead ones and constants included.
    pub fn node_count(&self) -> usize {
        self.keys
    }

    pub fn dead_count(&self) -> usize {
        self.dead
    }

    pub fn live_count(&self) -> usize {
        self.keys - self.dead
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn reorderings(&self) -> usize {
        self.stats.reorderings
    }

    pub fn gc_count(&self) -> usize {
        self.stats.gc_count
    }

    /// Largest node count observed at the start of a reordering or
    /// collection.
    pub fn peak_nodes(&self) -> usize {
        self.stats.peak_nodes.max(self.keys)
    }

    /// Total time spent in garbage collection.
    pub fn gc_time(&self) -> Duration {
        self.stats.gc_time
    }

    /// Total time spent reordering.
    pub fn reorder_time(&self) -> Duration {
        self.stats.reorder_time
    }

    /// Bytes held by the arena, the unique table and the cache.
    pub fn memory_in_use(&self) -> usize {
        self.nodes.memory() + (self.slots + self.consts.slots()) * size_of::<NodeId>() + self.cache.memory()
    }

    /// Live-node count that will trigger the next automatic reordering.
    pub fn next_reordering(&self) -> usize {
        self.next_dyn
    }

    pub fn enable_auto_reorder(&mut self, method: ReorderMethod) {
        self.auto_reorder = true;
        if method != ReorderMethod::Same {
            self.auto_method = method;
        }
    }

    pub fn disable_auto_reorder(&mut self) {
        self.auto_reorder = false;
    }

    pub fn auto_reorder_enabled(&self) -> Option<ReorderMethod> {
        self.auto_reorder.then_some(self.auto_method)
    }

    /// Replaces the random source of the stochastic heuristics.
    pub fn set_rng(&mut self, rng: impl RngCore + 'static) {
        self.rng = Box::new(rng);
    }

    pub fn add_hook(&mut self, kind: HookKind, hook: Hook) {
        self.hooks.push((kind, hook));
    }

    /// Removes every hook registered for `kind`.
    pub fn remove_hooks(&mut self, kind: HookKind) {
        self.hooks.retain(|(k, _)| *k != kind);
    }

    pub(crate) fn run_hooks(&mut self, kind: HookKind, method: Option<ReorderMethod>) {
        if self.hooks.is_empty() {
            return;
        }
        let info = HookInfo {
            kind,
            method,
            nodes: self.keys,
            dead: self.dead,
        };
        for (k, hook) in self.hooks.iter_mut() {
            if *k == kind {
                hook(&info);
            }
        }
    }

    /// Runs a recursive operation to completion and holds its result.
    ///
    /// An automatic reordering fired from inside the recursion unwinds it
    /// with [`Abort::Reordered`]; the operation is then restarted from the
    /// caller's roots, which reordering preserved.
    pub(crate) fn run(&mut self, mut op: impl FnMut(&mut Self) -> std::result::Result<Ref, Abort>) -> Result<Ref> {
        loop {
            match op(self) {
                Ok(r) => {
                    self.ref_node(r);
                    return Ok(r);
                }
                Err(Abort::Reordered) => continue,
                Err(Abort::OutOfMemory) => return Err(DdError::OutOfMemory),
            }
        }
    }

    /// Same as [`Manager::run`] for operations returning plain values.
    pub(crate) fn run_value<T>(&mut self, mut op: impl FnMut(&mut Self) -> std::result::Result<T, Abort>) -> Result<T> {
        loop {
            match op(self) {
                Ok(v) => return Ok(v),
                Err(Abort::Reordered) => continue,
                Err(Abort::OutOfMemory) => return Err(DdError::OutOfMemory),
            }
        }
    }

    pub(crate) fn check_var(&self, var: Var) -> Result<()> {
        if var.index() < self.vars.len() {
            Ok(())
        } else {
            Err(DdError::invalid(format!("variable {} does not exist", var)))
        }
    }

    pub(crate) fn check_ref(&self, f: Ref) -> Result<()> {
        if f == Ref::INVALID || f.id().index() >= self.nodes.len() || self.nodes.is_free(f.id()) {
            Err(DdError::invalid(format!("{} is not a live node", f)))
        } else {
            Ok(())
        }
    }
}
