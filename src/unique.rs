//! Unique table: find-or-create, reference counting and table growth.
//!
//! The recursive engine follows one protocol throughout:
//!
//! - a procedure returns its result with the reference count it had when it
//!   was found or made; a brand-new node starts at zero,
//! - the caller takes a reference on a result before it calls anything that
//!   may allocate,
//! - once the result has been linked under a parent node, the caller drops
//!   its reference with [`Manager::deref_plain`] (the parent now owns it).
//!
//! Under this protocol every zero-count node reachable from the tables is
//! *dead*: its children were already released when it died, and reviving it
//! takes its children back transitively ([`Manager::reclaim`]).

use log::{debug, warn};

use crate::config::{GC_FRAC_HI, GC_FRAC_LO, GC_FRAC_MIN};
use crate::error::{Abort, Step};
use crate::manager::Manager;
use crate::node::Node;
use crate::reference::Ref;
use crate::types::{NodeId, Var};

impl Manager {
    /// Returns the node `(index, high, low)`, creating it if needed.
    ///
    /// The caller guarantees that `high != low`, that `high` is regular and
    /// that both children are referenced.
    pub(crate) fn unique_inter(&mut self, index: u32, high: Ref, low: Ref) -> Step<Ref> {
        debug_assert!(!high.is_negated());
        debug_assert_ne!(high, low);
        let level = self.perm[index as usize];
        debug_assert!(self.level_of_ref(high) > level);
        debug_assert!(self.level_of_ref(low) > level);

        let mut probe = self.subtables[level].probe(high, low, self.nodes.as_slice());
        if let Some(id) = probe.found {
            if self.nodes[id].refs == 0 {
                self.reclaim(id);
            }
            return Ok(Ref::positive(id));
        }

        if self.auto_reorder
            && !self.reordering
            && self.auto_method != crate::reorder::ReorderMethod::None
            && self.keys - self.dead >= self.next_dyn
        {
            self.auto_reorder_now();
            return Err(Abort::Reordered);
        }

        let sub = &self.subtables[level];
        if sub.keys > sub.max_keys(self.density) {
            let crowded = self.dead > self.min_dead
                || (self.dead > self.min_dead / 2 && sub.dead as f64 > sub.keys as f64 * 0.95);
            if self.config.gc_enabled && crowded {
                self.collect_garbage(true);
            } else {
                self.grow_subtable(level);
            }
            probe = self.subtables[level].probe(high, low, self.nodes.as_slice());
        }

        let gc_before = self.stats.gc_count;
        let id = self.alloc_node(Node::internal(index, high, low))?;
        if self.stats.gc_count != gc_before {
            probe = self.subtables[level].probe(high, low, self.nodes.as_slice());
        }
        self.subtables[level].insert_at(probe, id, self.nodes.as_mut_slice());
        self.keys += 1;
        self.nodes[high.id()].inc_ref();
        self.nodes[low.id()].inc_ref();
        Ok(Ref::positive(id))
    }

    /// Returns the node for `var ? high : low`, normalising the complement
    /// of the then-edge and skipping redundant tests.
    ///
    /// Children must be referenced, as for [`Manager::unique_inter`].
    #[inline]
    pub(crate) fn make_node(&mut self, index: u32, high: Ref, low: Ref) -> Step<Ref> {
        if high == low {
            return Ok(high);
        }
        if high.is_negated() {
            Ok(-self.unique_inter(index, -high, -low)?)
        } else {
            self.unique_inter(index, high, low)
        }
    }

    /// ADD flavour of [`Manager::make_node`]: no complement normalisation.
    #[inline]
    pub(crate) fn make_add_node(&mut self, index: u32, high: Ref, low: Ref) -> Step<Ref> {
        if high == low {
            Ok(high)
        } else {
            self.unique_inter(index, high, low)
        }
    }

    /// Makes `index ? high : low` out of two results the caller holds, and
    /// gives the caller's holds over to the new node.
    ///
    /// On failure both holds are released.
    pub(crate) fn join(&mut self, index: u32, high: Ref, low: Ref) -> Step<Ref> {
        match self.make_node(index, high, low) {
            Ok(r) => {
                self.deref_plain(high);
                self.deref_plain(low);
                Ok(r)
            }
            Err(err) => {
                self.deref_node(high);
                self.deref_node(low);
                Err(err)
            }
        }
    }

    /// [`Manager::join`] without complement normalisation.
    pub(crate) fn join_add(&mut self, index: u32, high: Ref, low: Ref) -> Step<Ref> {
        match self.make_add_node(index, high, low) {
            Ok(r) => {
                self.deref_plain(high);
                self.deref_plain(low);
                Ok(r)
            }
            Err(err) => {
                self.deref_node(high);
                self.deref_node(low);
                Err(err)
            }
        }
    }

    /// Holds the result of a step, or releases `temps` if it failed.
    #[inline]
    pub(crate) fn keep(&mut self, step: Step<Ref>, temps: &[Ref]) -> Step<Ref> {
        match step {
            Ok(r) => {
                self.ref_node(r);
                Ok(r)
            }
            Err(err) => {
                for &t in temps {
                    self.deref_node(t);
                }
                Err(err)
            }
        }
    }

    /// Returns the terminal with the given value, creating it if needed.
    pub(crate) fn unique_const(&mut self, value: f64) -> Step<Ref> {
        if self.consts.keys > self.consts.slots() * self.density {
            let crowded = self.dead > self.min_dead || 10 * self.consts.dead > 9 * self.consts.keys;
            if self.config.gc_enabled && crowded {
                self.collect_garbage(true);
            } else {
                let slots = self.consts.slots() * 2;
                self.consts.resize(slots, self.nodes.as_mut_slice());
            }
        }

        let value = self.consts.normalize(value);
        let bucket = match self.consts.find(value, self.nodes.as_slice()) {
            Ok(id) => {
                if self.nodes[id].refs == 0 {
                    self.reclaim(id);
                }
                return Ok(Ref::positive(id));
            }
            Err(bucket) => bucket,
        };

        // Collection never resizes the table, so the bucket stays valid.
        let id = self.alloc_node(Node::terminal(value))?;
        self.consts.insert_at(bucket, id, self.nodes.as_mut_slice());
        self.keys += 1;
        Ok(Ref::positive(id))
    }

    /// Takes a node slot from the arena.
    ///
    /// When the arena is exhausted, falls back in order on the emergency
    /// stash, then on a forced garbage collection, before giving up.
    pub(crate) fn alloc_node(&mut self, node: Node) -> Step<NodeId> {
        if let Some(id) = self.nodes.alloc(node) {
            return Ok(id);
        }
        if self.nodes.release_stash() {
            self.slow_table_growth();
            if let Some(id) = self.nodes.alloc(node) {
                return Ok(id);
            }
        }
        if self.dead > 0 && !self.reordering {
            self.garbage_collect();
            if let Some(id) = self.nodes.alloc(node) {
                return Ok(id);
            }
        }
        warn!("Out of memory: {} nodes in use, {} dead", self.nodes.in_use(), self.dead);
        Err(Abort::OutOfMemory)
    }

    /// Makes collection eager and stops table growth once the stash is gone.
    pub(crate) fn slow_table_growth(&mut self) {
        self.gc_frac = GC_FRAC_MIN;
        self.min_dead = (GC_FRAC_MIN * self.slots as f64) as usize;
        self.density *= 4;
        let slots = self.cache.slots();
        self.cache.set_hard_max(slots);
        debug!("Emergency stash released; table growth slowed down");
    }

    /// Doubles the subtable at `level`, unless the memory situation asks
    /// for more eager collection instead.
    pub(crate) fn grow_subtable(&mut self, level: usize) {
        if self.gc_frac == GC_FRAC_HI && self.slots > self.loose_up_to {
            self.gc_frac = GC_FRAC_LO;
            self.min_dead = (GC_FRAC_LO * self.slots as f64) as usize;
            debug!("Switching to GC fraction {} at {} slots", GC_FRAC_LO, self.slots);
        }
        if self.gc_frac != GC_FRAC_MIN && self.over_budget() {
            self.gc_frac = GC_FRAC_MIN;
            self.min_dead = (GC_FRAC_MIN * self.slots as f64) as usize;
            debug!("Memory budget reached; switching to GC fraction {}", GC_FRAC_MIN);
            return;
        }
        let old = self.subtables[level].slots();
        self.subtables[level].resize(old * 2, self.nodes.as_mut_slice());
        self.slots += self.subtables[level].slots() - old;
        self.min_dead = (self.gc_frac * self.slots as f64) as usize;
        debug!("Grew subtable at level {} to {} slots", level, old * 2);
    }

    fn over_budget(&self) -> bool {
        let budget = self.config.max_memory;
        budget != 0 && self.memory_in_use() > budget - budget / crate::config::STASH_FRACTION
    }

    /// Revives a dead node and, transitively, its dead descendants.
    ///
    /// On return the node itself is back at a zero count but no longer
    /// counted as dead: the caller is expected to reference it.
    pub(crate) fn reclaim(&mut self, id: NodeId) {
        let mut stack = std::mem::take(&mut self.stack);
        stack.push(id);
        while let Some(n) = stack.pop() {
            let node = &mut self.nodes[n];
            if node.refs == 0 {
                let index = node.index;
                self.dead -= 1;
                if index == Var::CONST_INDEX {
                    self.consts.dead -= 1;
                } else {
                    self.subtables[self.perm[index as usize]].dead -= 1;
                }
            }
            let node = &mut self.nodes[n];
            node.inc_ref();
            if node.refs == 1 && !node.is_terminal() {
                let (high, low) = (node.high.id(), node.low.id());
                stack.push(high);
                stack.push(low);
            }
        }
        self.stack = stack;
        self.nodes[id].dec_ref();
    }

    /// Adds a reference to the node behind `f`.
    #[inline]
    pub(crate) fn ref_node(&mut self, f: Ref) {
        self.nodes[f.id()].inc_ref();
    }

    /// Drops a reference without releasing children. Only for nodes that
    /// are known to stay referenced from elsewhere.
    #[inline]
    pub(crate) fn deref_plain(&mut self, f: Ref) {
        self.nodes[f.id()].dec_ref();
    }

    /// Drops a reference; nodes reaching zero die and release their
    /// children in turn.
    pub(crate) fn deref_node(&mut self, f: Ref) {
        let mut stack = std::mem::take(&mut self.stack);
        stack.push(f.id());
        while let Some(n) = stack.pop() {
            let node = &mut self.nodes[n];
            debug_assert!(node.refs > 0, "releasing unreferenced node {}", n);
            node.dec_ref();
            if node.refs == 0 {
                let index = node.index;
                let terminal = node.is_terminal();
                let (high, low) = (node.high.id(), node.low.id());
                self.dead += 1;
                if terminal {
                    self.consts.dead += 1;
                } else {
                    self.subtables[self.perm[index as usize]].dead += 1;
                    stack.push(high);
                    stack.push(low);
                }
            }
        }
        self.stack = stack;
    }

    /// Fires the automatic reordering from inside the unique table.
    fn auto_reorder_now(&mut self) {
        let method = self.auto_method;
        debug!("Automatic reordering at {} live nodes", self.keys - self.dead);
        if let Err(err) = self.reduce_heap(method, 10) {
            warn!("Automatic reordering failed: {}", err);
        }
        // Make sure the trigger moves even if the heuristic bailed out.
        let live = self.keys - self.dead;
        if live >= self.next_dyn {
            self.next_dyn = live.saturating_mul(2);
        }
    }

    /// Cache lookup that revives dead results and drives cache growth.
    #[inline]
    pub(crate) fn cache_lookup(&mut self, op: crate::cache::CacheOp, f: Ref, g: Ref, h: Ref) -> Option<Ref> {
        match self.cache.lookup(op, f, g, h) {
            Some(r) => {
                if self.nodes[r.id()].refs == 0 {
                    self.reclaim(r.id());
                }
                Some(r)
            }
            None => {
                if self.cache.wants_to_grow(self.slots) {
                    let slots = self.cache.slots() * 2;
                    self.cache.resize(slots);
                }
                None
            }
        }
    }
}
