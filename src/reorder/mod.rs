//! Dynamic variable reordering.
//!
//! # Theory: Variable Ordering
//!
//! The size of a decision diagram is highly sensitive to the order in which
//! variables appear along its paths. For some functions, different orderings
//! make the size vary from linear to exponential in the number of variables.
//!
//! Consider `f = (x₁ ∧ y₁) ∨ (x₂ ∧ y₂) ∨ ... ∨ (xₙ ∧ yₙ)`:
//!
//! - **Good ordering** (x₁, y₁, x₂, y₂, ..., xₙ, yₙ): O(n) nodes.
//!   Related variables are close together, enabling more sharing.
//! - **Bad ordering** (x₁, x₂, ..., xₙ, y₁, y₂, ..., yₙ): O(2ⁿ) nodes.
//!
//! Finding the optimal ordering is NP-complete, so the manager improves the
//! ordering with heuristics built on local transformations.
//!
//! # The Swap Primitive
//!
//! Every heuristic is a control strategy over one operation: exchanging two
//! *adjacent* levels in place ([`Manager::swap_in_place`]). Only the nodes of
//! the upper level that have a child on the lower level are re-expressed;
//! they keep their identity, so every handle the client holds keeps denoting
//! the same function. Two variables that never occur together in a support
//! (see [`crate::interact`]) are exchanged by swapping their subtables.
//!
//! # Rudell's Sifting Algorithm
//!
//! For each variable, largest subtable first:
//! 1. move it to the closer boundary of the range, one swap at a time,
//! 2. move it to the other boundary,
//! 3. walk back to the position that gave the smallest diagram.
//!
//! A direction is abandoned when the size exceeds `max_growth` times the best
//! size seen so far, or when the interaction matrix proves that no further
//! reduction is possible.
//!
//! # Other Heuristics
//!
//! - **Symmetric / group sifting**: adjacent variables found symmetric (or
//!   similar enough, or declared together) are merged into blocks that are
//!   sifted as a unit.
//! - **Linear sifting**: after each swap, tries replacing the upper variable
//!   with its XNOR against the lower one, keeping the transform when it
//!   shrinks the diagram.
//! - **Window permutation**: tries all k! orders of k consecutive levels,
//!   visiting each through a single adjacent swap.
//! - **Random swapping, annealing, genetic**: stochastic searches driven by
//!   the manager's random source.
//! - **Exact**: dynamic programming over subsets of the levels.
//!
//! # References
//!
//! - R. Rudell. "Dynamic variable ordering for ordered binary decision diagrams."
//!   ICCAD 1993. DOI: 10.1109/ICCAD.1993.580054
//!
//! - S. Panda, F. Somenzi. "Who are the variables in your neighborhood."
//!   ICCAD 1995.
//!
//! - C. Meinel & T. Theobald. "Algorithms and Data Structures in VLSI Design."
//!   Springer, 1998. Chapter 4.

pub(crate) mod anneal;
pub(crate) mod exact;
pub(crate) mod genetic;
pub(crate) mod group;
pub(crate) mod linear;
pub(crate) mod random;
pub(crate) mod sift;
pub(crate) mod swap;
pub(crate) mod symmetry;
pub(crate) mod window;

use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::{DdError, Result, Step};
use crate::manager::{HookKind, Manager};
use crate::types::Var;

pub use exact::MAX_EXACT_VARS;
pub use linear::LinearRow;

/// Reordering heuristics.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ReorderMethod {
    /// Whatever method automatic reordering is configured with.
    Same,
    None,
    Random,
    RandomPivot,
    Sift,
    SiftConverge,
    SymmSift,
    SymmSiftConverge,
    Window2,
    Window3,
    Window4,
    Window2Converge,
    Window3Converge,
    Window4Converge,
    GroupSift,
    GroupSiftConverge,
    Annealing,
    Genetic,
    Linear,
    LinearConverge,
    Exact,
}

impl ReorderMethod {
    pub const ALL: [ReorderMethod; 19] = [
        ReorderMethod::Random,
        ReorderMethod::RandomPivot,
        ReorderMethod::Sift,
        ReorderMethod::SiftConverge,
        ReorderMethod::SymmSift,
        ReorderMethod::SymmSiftConverge,
        ReorderMethod::Window2,
        ReorderMethod::Window3,
        ReorderMethod::Window4,
        ReorderMethod::Window2Converge,
        ReorderMethod::Window3Converge,
        ReorderMethod::Window4Converge,
        ReorderMethod::GroupSift,
        ReorderMethod::GroupSiftConverge,
        ReorderMethod::Annealing,
        ReorderMethod::Genetic,
        ReorderMethod::Linear,
        ReorderMethod::LinearConverge,
        ReorderMethod::Exact,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ReorderMethod::Same => "same",
            ReorderMethod::None => "none",
            ReorderMethod::Random => "random",
            ReorderMethod::RandomPivot => "random-pivot",
            ReorderMethod::Sift => "sift",
            ReorderMethod::SiftConverge => "sift-converge",
            ReorderMethod::SymmSift => "symm-sift",
            ReorderMethod::SymmSiftConverge => "symm-sift-converge",
            ReorderMethod::Window2 => "window2",
            ReorderMethod::Window3 => "window3",
            ReorderMethod::Window4 => "window4",
            ReorderMethod::Window2Converge => "window2-converge",
            ReorderMethod::Window3Converge => "window3-converge",
            ReorderMethod::Window4Converge => "window4-converge",
            ReorderMethod::GroupSift => "group-sift",
            ReorderMethod::GroupSiftConverge => "group-sift-converge",
            ReorderMethod::Annealing => "annealing",
            ReorderMethod::Genetic => "genetic",
            ReorderMethod::Linear => "linear",
            ReorderMethod::LinearConverge => "linear-converge",
            ReorderMethod::Exact => "exact",
        }
    }
}

impl fmt::Display for ReorderMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReorderMethod {
    type Err = DdError;

    fn from_str(s: &str) -> Result<Self> {
        [ReorderMethod::Same, ReorderMethod::None]
            .into_iter()
            .chain(ReorderMethod::ALL)
            .find(|m| m.name() == s)
            .ok_or_else(|| DdError::invalid(format!("unknown reordering method '{}'", s)))
    }
}

/// Aggregation predicate used by group sifting to merge adjacent variables.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum GroupCheck {
    /// Only caller-declared groups are kept together.
    None,
    /// Merge variables that are symmetric up to the configured violation
    /// tolerances.
    ExtendedSymmetry,
    /// Merge variables whose subtable sizes show a sharp second difference.
    SecondDifference,
}

/// Statistics of one reordering call.
#[derive(Debug, Clone, PartialEq)]
pub struct ReorderStats {
    pub method: ReorderMethod,
    /// Size (see [`Manager::size`]) before reordering.
    pub initial_size: usize,
    pub final_size: usize,
    /// Number of adjacent swaps performed.
    pub swaps: usize,
    pub elapsed: Duration,
}

impl ReorderStats {
    fn skipped(method: ReorderMethod, size: usize) -> Self {
        Self {
            method,
            initial_size: size,
            final_size: size,
            swaps: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate the size reduction ratio.
    pub fn reduction_ratio(&self) -> f64 {
        if self.initial_size == 0 {
            return 0.0;
        }
        1.0 - (self.final_size as f64 / self.initial_size as f64)
    }

    /// Calculate the percentage reduction.
    pub fn reduction_percent(&self) -> f64 {
        self.reduction_ratio() * 100.0
    }
}

/// Swap and time budget of the running reordering call.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReorderBudget {
    pub swaps: usize,
    pub max_swaps: usize,
    pub deadline: Option<Instant>,
}

impl ReorderBudget {
    pub fn new(max_swaps: usize, time_limit: Option<Duration>) -> Self {
        Self {
            swaps: 0,
            max_swaps,
            deadline: time_limit.map(|limit| Instant::now() + limit),
        }
    }

    pub fn exhausted(&self) -> bool {
        self.swaps >= self.max_swaps || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum MoveKind {
    Swap,
    /// Swap followed by a kept linear transform.
    LinearTransform,
    /// Undo of a [`MoveKind::LinearTransform`]: redone as swap, then transform.
    InverseTransform,
}

/// One step of a heuristic, with the size it produced.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Move {
    pub x: usize,
    pub y: usize,
    pub size: usize,
    pub kind: MoveKind,
}

impl Move {
    pub fn swap(x: usize, y: usize, size: usize) -> Self {
        Self {
            x,
            y,
            size,
            kind: MoveKind::Swap,
        }
    }
}

/// Smallest size over a move history that started at `initial`.
pub(crate) fn best_size(initial: usize, moves: &[Move]) -> usize {
    moves.iter().map(|m| m.size).fold(initial, usize::min)
}

impl Manager {
    /// Reorders the variables with `method` to reduce the diagram size.
    ///
    /// Nothing happens when [`Manager::size`] is below `min_size`, when the
    /// method is [`ReorderMethod::None`], or when called from a hook while a
    /// reordering is running. [`ReorderMethod::Same`] stands for the method
    /// configured for automatic reordering.
    ///
    /// Every held handle keeps its function. Running out of swaps or time
    /// is not an error: the heuristic stops at the best order found so far.
    /// On [`DdError::OutOfMemory`] the diagram is left consistent, in some
    /// order between the initial one and the best one found.
    ///
    /// # Example
    ///
    /// ```
    /// use dd_rs::manager::Manager;
    /// use dd_rs::reorder::ReorderMethod;
    ///
    /// let mut mgr = Manager::new(6);
    /// // (x0 ∧ x3) ∨ (x1 ∧ x4) ∨ (x2 ∧ x5) needs related variables adjacent.
    /// let mut f = mgr.zero();
    /// for i in 0..3u32 {
    ///     let term = mgr.and(mgr.var(i), mgr.var(i + 3)).unwrap();
    ///     let g = mgr.or(f, term).unwrap();
    ///     mgr.release(term);
    ///     mgr.release(f);
    ///     f = g;
    /// }
    /// let stats = mgr.reduce_heap(ReorderMethod::Sift, 0).unwrap();
    /// assert!(stats.final_size <= stats.initial_size);
    /// assert!(mgr.eval(f, &[true, false, false, true, false, false]));
    /// mgr.release(f);
    /// ```
    pub fn reduce_heap(&mut self, method: ReorderMethod, min_size: usize) -> Result<ReorderStats> {
        let method = if method == ReorderMethod::Same { self.auto_method } else { method };
        let size = self.size();
        if method == ReorderMethod::None || self.reordering || size < min_size || self.vars.is_empty() {
            return Ok(ReorderStats::skipped(method, size));
        }

        let start = Instant::now();
        self.stats.reorderings += 1;
        self.run_hooks(HookKind::PreReorder, Some(method));
        self.prepare_reordering();
        let initial_size = self.reorder_size();
        let swaps_before = self.stats.swaps;
        debug!("Reordering with {}: {} nodes, {} variables", method, initial_size, self.vars.len());

        let upper = self.vars.len() - 1;
        let outcome = self.run_method(method, 0, upper);
        self.finish_reordering();

        let constants = self.consts.keys;
        let next = ((self.keys - constants + 1) as f64 * self.config.reorder_growth) as usize + constants;
        if self.stats.reorderings < 20 || next > self.next_dyn {
            self.next_dyn = next;
        } else {
            self.next_dyn += 20;
        }

        self.run_hooks(HookKind::PostReorder, Some(method));
        let elapsed = start.elapsed();
        self.stats.reorder_time += elapsed;
        let stats = ReorderStats {
            method,
            initial_size,
            final_size: self.reorder_size(),
            swaps: self.stats.swaps - swaps_before,
            elapsed,
        };

        match outcome {
            Ok(()) => {
                info!(
                    "Reordered with {}: {} -> {} nodes, {} swaps in {:?}",
                    method, stats.initial_size, stats.final_size, stats.swaps, stats.elapsed
                );
                Ok(stats)
            }
            Err(_) => {
                warn!(
                    "Reordering with {} ran out of memory after {} swaps; {} nodes",
                    method, stats.swaps, stats.final_size
                );
                Err(DdError::OutOfMemory)
            }
        }
    }

    /// Imposes `order` (variables from the top level down) by adjacent
    /// swaps.
    ///
    /// `order` must be a permutation of every variable. Imposing the order
    /// already in effect does nothing.
    pub fn shuffle_heap(&mut self, order: &[Var]) -> Result<()> {
        let n = self.vars.len();
        if order.len() != n {
            return Err(DdError::invalid(format!(
                "permutation has {} entries for {} variables",
                order.len(),
                n
            )));
        }
        let mut seen = vec![false; n];
        for &v in order {
            self.check_var(v)?;
            if std::mem::replace(&mut seen[v.index()], true) {
                return Err(DdError::invalid(format!("variable {} appears twice in permutation", v)));
            }
        }
        if order.iter().enumerate().all(|(level, v)| self.invperm[level] == v.index()) {
            return Ok(());
        }
        if self.reordering {
            return Err(DdError::invalid("shuffle requested while reordering"));
        }

        debug!("Shuffling {} variables", n);
        self.prepare_reordering();
        let outcome = self.shuffle(order);
        self.finish_reordering();
        outcome.map_err(|_| DdError::OutOfMemory)
    }

    /// Sifts each variable of `order` up to its target level.
    pub(crate) fn shuffle(&mut self, order: &[Var]) -> Step<()> {
        let indices: Vec<usize> = order.iter().map(|v| v.index()).collect();
        self.impose_order(0, &indices)
    }

    /// Variables of the levels `lower..=upper`, top first.
    pub(crate) fn current_order(&self, lower: usize, upper: usize) -> Vec<usize> {
        self.invperm[lower..=upper].to_vec()
    }

    /// Places the variables of `order` on consecutive levels from `lower`
    /// down. They must be the variables currently found on those levels.
    pub(crate) fn impose_order(&mut self, lower: usize, order: &[usize]) -> Step<()> {
        for (offset, &var) in order.iter().enumerate() {
            let mut x = self.perm[var];
            while x > lower + offset {
                self.swap_in_place(x - 1)?;
                x -= 1;
            }
        }
        Ok(())
    }

    /// Declares the `size` variables currently at consecutive levels from
    /// the level of `first` as a group. Group sifting moves a declared group
    /// as a unit.
    pub fn make_group(&mut self, first: Var, size: usize) -> Result<()> {
        self.check_var(first)?;
        let top = self.perm[first.index()];
        if size == 0 || top + size > self.vars.len() {
            return Err(DdError::invalid(format!(
                "group of {} variables from {} exceeds the order",
                size, first
            )));
        }
        let members = self.invperm[top..top + size].to_vec();
        let overlaps = self.declared_groups.iter().flatten().any(|v| members.contains(v));
        if overlaps {
            return Err(DdError::invalid(format!("group from {} overlaps an existing group", first)));
        }
        debug!("Declared group of {} variables from {}", size, first);
        self.declared_groups.push(members);
        Ok(())
    }

    /// How the diagram variable `var` is computed from the client variables
    /// after linear sifting. The identity row when no transform is recorded.
    pub fn linear_row(&self, var: Var) -> Result<LinearRow> {
        self.check_var(var)?;
        Ok(match &self.linear {
            Some(linear) => linear.row(var.index()),
            None => LinearRow::identity(var),
        })
    }

    /// Groups of variables found symmetric by the last symmetric sifting,
    /// top group first. Singletons are omitted.
    pub fn symmetry_groups(&self) -> &[Vec<Var>] {
        &self.symmetry
    }

    /// The quantity heuristics minimise while reordering.
    #[inline]
    pub(crate) fn reorder_size(&self) -> usize {
        self.keys - self.isolated
    }

    fn prepare_reordering(&mut self) {
        self.reordering = true;
        self.cache.clear();
        self.sweep(false);
        self.isolated = self.count_isolated();
        self.build_interaction();
        self.stats.peak_nodes = self.stats.peak_nodes.max(self.keys);
        self.budget = ReorderBudget::new(self.config.sift_max_swaps, self.config.time_limit);
    }

    fn finish_reordering(&mut self) {
        self.shrink_subtables();
        self.reset_groups(0, self.vars.len());
        self.interact = Default::default();
        self.min_dead = (self.gc_frac * self.slots as f64) as usize;
        self.reordering = false;
    }

    fn run_method(&mut self, method: ReorderMethod, lower: usize, upper: usize) -> Step<()> {
        match method {
            ReorderMethod::Same | ReorderMethod::None => Ok(()),
            ReorderMethod::Random => self.random_swapping(lower, upper, false),
            ReorderMethod::RandomPivot => self.random_swapping(lower, upper, true),
            ReorderMethod::Sift => self.sifting(lower, upper),
            ReorderMethod::SiftConverge => self.until_converged(|mgr| mgr.sifting(lower, upper)),
            ReorderMethod::SymmSift => self.symm_sifting(lower, upper, false),
            ReorderMethod::SymmSiftConverge => self.symm_sifting(lower, upper, true),
            ReorderMethod::Window2 => self.window_reorder(lower, upper, 2, false),
            ReorderMethod::Window3 => self.window_reorder(lower, upper, 3, false),
            ReorderMethod::Window4 => self.window_reorder(lower, upper, 4, false),
            ReorderMethod::Window2Converge => self.window_reorder(lower, upper, 2, true),
            ReorderMethod::Window3Converge => self.window_reorder(lower, upper, 3, true),
            ReorderMethod::Window4Converge => self.window_reorder(lower, upper, 4, true),
            ReorderMethod::GroupSift => self.group_sifting(lower, upper, false),
            ReorderMethod::GroupSiftConverge => self.group_sifting(lower, upper, true),
            ReorderMethod::Annealing => self.annealing(lower, upper),
            ReorderMethod::Genetic => self.genetic(lower, upper),
            ReorderMethod::Linear => self.linear_sifting(lower, upper),
            ReorderMethod::LinearConverge => self.until_converged(|mgr| mgr.linear_sifting(lower, upper)),
            ReorderMethod::Exact => self.exact(lower, upper),
        }
    }

    /// Repeats a pass while it keeps reducing the size.
    pub(crate) fn until_converged(&mut self, mut pass: impl FnMut(&mut Self) -> Step<()>) -> Step<()> {
        loop {
            let before = self.reorder_size();
            pass(self)?;
            if self.reorder_size() >= before || self.budget.exhausted() {
                return Ok(());
            }
        }
    }

    /// Variable indices in the order sifting visits them: largest subtable
    /// first, at most `sift_max_var` of them.
    pub(crate) fn sift_order(&self) -> Vec<usize> {
        let mut vars: Vec<usize> = (0..self.vars.len()).collect();
        vars.sort_by_key(|&v| Reverse(self.subtables[self.perm[v]].keys));
        vars.truncate(self.config.sift_max_var);
        vars
    }

    /// Walks back through `moves` (undoing the most recent first) to the
    /// closest position of minimum size.
    pub(crate) fn sift_backward(&mut self, initial: usize, moves: &[Move]) -> Step<()> {
        let best = best_size(initial, moves);
        for m in moves.iter().rev() {
            if m.size == best {
                return Ok(());
            }
            match m.kind {
                MoveKind::Swap => {
                    self.swap_in_place(m.x)?;
                }
                MoveKind::LinearTransform => {
                    self.linear_in_place(m.x)?;
                    self.swap_in_place(m.x)?;
                }
                MoveKind::InverseTransform => {
                    self.swap_in_place(m.x)?;
                    self.linear_in_place(m.x)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use test_log::test;

    use super::*;
    use crate::reference::Ref;

    /// `(x0 ∧ x_{n/2}) ∨ (x1 ∧ x_{n/2+1}) ∨ ...`: exponential in the
    /// identity order, linear once each pair is adjacent.
    pub fn pairs_function(mgr: &mut Manager) -> Ref {
        let half = mgr.num_vars() as u32 / 2;
        let mut f = mgr.zero();
        mgr.hold(f);
        for i in 0..half {
            let term = mgr.and(mgr.var(i), mgr.var(i + half)).unwrap();
            let g = mgr.or(f, term).unwrap();
            mgr.release(term);
            mgr.release(f);
            f = g;
        }
        f
    }

    /// A few random functions over all variables.
    pub fn random_functions(mgr: &mut Manager, seed: u64, count: usize) -> Vec<Ref> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n = mgr.num_vars() as u32;
        let mut roots = Vec::new();
        for _ in 0..count {
            let mut f = mgr.zero();
            mgr.hold(f);
            for _ in 0..6 {
                let mut cube = mgr.one();
                mgr.hold(cube);
                for _ in 0..3 {
                    let v = rng.gen_range(0..n);
                    let lit = if rng.gen_bool(0.5) { mgr.var(v) } else { mgr.nvar(v) };
                    let c = mgr.and(cube, lit).unwrap();
                    mgr.release(cube);
                    cube = c;
                }
                let g = if rng.gen_bool(0.3) { mgr.xor(f, cube).unwrap() } else { mgr.or(f, cube).unwrap() };
                mgr.release(cube);
                mgr.release(f);
                f = g;
            }
            roots.push(f);
        }
        roots
    }

    /// Truth tables of `roots` over every assignment.
    pub fn truth_tables(mgr: &Manager, roots: &[Ref]) -> Vec<Vec<bool>> {
        let n = mgr.num_vars();
        roots
            .iter()
            .map(|&f| {
                (0..1u32 << n)
                    .map(|bits| {
                        let assignment: Vec<bool> = (0..n).map(|i| bits >> i & 1 == 1).collect();
                        mgr.eval(f, &assignment)
                    })
                    .collect()
            })
            .collect()
    }

    /// Checks structure and truth tables after some reordering step.
    pub fn assert_preserved(mgr: &Manager, roots: &[Ref], tables: &[Vec<bool>]) {
        let report = mgr.debug_check();
        assert!(report.is_ok(), "{:?}", report.errors);
        assert_eq!(&truth_tables(mgr, roots), tables);
    }

    #[test]
    fn test_method_names_round_trip() {
        for m in ReorderMethod::ALL {
            assert_eq!(m.to_string().parse::<ReorderMethod>().unwrap(), m);
        }
        assert_eq!("same".parse::<ReorderMethod>().unwrap(), ReorderMethod::Same);
        assert!(matches!("bogus".parse::<ReorderMethod>(), Err(DdError::InvalidArgument(_))));
    }

    #[test]
    fn test_reduce_heap_skips_small() {
        let mut mgr = Manager::new(4);
        let f = pairs_function(&mut mgr);
        let stats = mgr.reduce_heap(ReorderMethod::Sift, 1000).unwrap();
        assert_eq!(stats.swaps, 0);
        assert_eq!(mgr.reorderings(), 0);
        let stats = mgr.reduce_heap(ReorderMethod::None, 0).unwrap();
        assert_eq!(stats.swaps, 0);
        mgr.release(f);
    }

    #[test]
    fn test_sift_shrinks_pairs() {
        let mut mgr = Manager::new(8);
        let f = pairs_function(&mut mgr);
        let tables = truth_tables(&mgr, &[f]);
        let stats = mgr.reduce_heap(ReorderMethod::Sift, 0).unwrap();
        assert!(stats.final_size < stats.initial_size);
        assert!(stats.reduction_percent() > 0.0);
        assert_eq!(mgr.reorderings(), 1);
        assert_preserved(&mgr, &[f], &tables);
        mgr.release(f);
    }

    #[test]
    fn test_every_method_preserves_functions() {
        for method in ReorderMethod::ALL {
            let mut mgr = Manager::new(7);
            let roots = random_functions(&mut mgr, 7, 4);
            let tables = truth_tables(&mgr, &roots);
            let stats = mgr.reduce_heap(method, 0).unwrap();
            assert_eq!(stats.method, method);
            assert_preserved(&mgr, &roots, &tables);
            for f in roots {
                mgr.release(f);
            }
            mgr.garbage_collect();
            assert_eq!(mgr.dead_count(), 0);
            if !matches!(method, ReorderMethod::Linear | ReorderMethod::LinearConverge) {
                // Only the constants and the projection functions are left.
                assert_eq!(mgr.node_count(), 4 + 7, "{} leaked nodes", method);
            }
        }
    }

    #[test]
    fn test_shuffle_heap() {
        let mut mgr = Manager::new(5);
        let roots = random_functions(&mut mgr, 3, 3);
        let tables = truth_tables(&mgr, &roots);
        let keys = mgr.node_count();

        let identity = mgr.order();
        mgr.shuffle_heap(&identity).unwrap();
        assert_eq!(mgr.node_count(), keys);

        let order: Vec<Var> = [3u32, 0, 4, 2, 1].iter().map(|&v| Var::new(v)).collect();
        mgr.shuffle_heap(&order).unwrap();
        assert_eq!(mgr.order(), order);
        assert_preserved(&mgr, &roots, &tables);

        let short: Vec<Var> = order[..4].to_vec();
        assert!(matches!(mgr.shuffle_heap(&short), Err(DdError::InvalidArgument(_))));
        let twice: Vec<Var> = [0u32, 0, 1, 2, 3].iter().map(|&v| Var::new(v)).collect();
        assert!(matches!(mgr.shuffle_heap(&twice), Err(DdError::InvalidArgument(_))));
        for f in roots {
            mgr.release(f);
        }
    }

    #[test]
    fn test_make_group_validation() {
        let mut mgr = Manager::new(6);
        mgr.make_group(Var::new(1), 2).unwrap();
        assert!(matches!(mgr.make_group(Var::new(2), 2), Err(DdError::InvalidArgument(_))));
        assert!(matches!(mgr.make_group(Var::new(5), 2), Err(DdError::InvalidArgument(_))));
        assert!(matches!(mgr.make_group(Var::new(4), 0), Err(DdError::InvalidArgument(_))));
        mgr.make_group(Var::new(3), 3).unwrap();
    }

    #[test]
    fn test_reorder_hooks_and_threshold() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut mgr = Manager::new(6);
        let seen = Rc::new(RefCell::new(Vec::new()));
        for kind in [HookKind::PreReorder, HookKind::PostReorder] {
            let sink = Rc::clone(&seen);
            mgr.add_hook(kind, Box::new(move |info| sink.borrow_mut().push((info.kind, info.method))));
        }
        let f = pairs_function(&mut mgr);
        mgr.reduce_heap(ReorderMethod::Same, 0).unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![
                (HookKind::PreReorder, Some(ReorderMethod::Sift)),
                (HookKind::PostReorder, Some(ReorderMethod::Sift)),
            ]
        );
        let constants = mgr.consts.keys;
        assert_eq!(mgr.next_reordering(), (mgr.node_count() - constants + 1) * 2 + constants);
        mgr.release(f);
    }

    #[test]
    fn test_auto_reorder_fires_during_operations() {
        let config = crate::config::ManagerConfig::default()
            .with_num_vars(12)
            .with_auto_reorder(ReorderMethod::Sift)
            .with_first_reorder(40);
        let mut mgr = Manager::with_config(config);
        let f = pairs_function(&mut mgr);
        assert!(mgr.reorderings() > 0);
        let mut assignment = vec![false; 12];
        assignment[2] = true;
        assignment[8] = true;
        assert!(mgr.eval(f, &assignment));
        assignment[8] = false;
        assert!(!mgr.eval(f, &assignment));
        assert!(mgr.debug_check().is_ok());
        mgr.release(f);
    }
}
