//! In-place exchange of adjacent levels.
//!
//! ```text
//!  level x:      f                    f            (same node, now tests y)
//!              /   \                /   \
//!  level y:  f1     f0     =>    g1      g0        (g* test x, new or shared)
//!           / \    / \           / \     / \
//!         f11 f10 f01 f00      f11 f01 f10 f00
//! ```
//!
//! Nodes of level `x` without a child on level `y` need no work, and neither
//! do the nodes of level `y`: they only change level. Re-expressed nodes keep
//! their slot, so every handle stays valid. Nodes of level `y` that lose
//! their last parent are freed on the spot; no node is left dead.

use log::warn;

use crate::error::{Abort, Step};
use crate::manager::Manager;
use crate::node::Node;
use crate::reference::Ref;
use crate::types::NodeId;

impl Manager {
    /// Exchanges the variables at levels `x` and `x + 1`.
    ///
    /// Returns the new [`Manager::reorder_size`]. Fails only before anything
    /// was changed.
    pub(crate) fn swap_in_place(&mut self, x: usize) -> Step<usize> {
        let y = x + 1;
        debug_assert!(y < self.subtables.len());
        debug_assert_eq!(self.subtables[x].dead, 0);
        debug_assert_eq!(self.subtables[y].dead, 0);
        let xindex = self.invperm[x];
        let yindex = self.invperm[y];
        self.budget.swaps += 1;
        self.stats.swaps += 1;

        if self.interacts(xindex, yindex) {
            self.reexpress_for_swap(x, y, xindex as u32, yindex as u32)?;
        }

        // The y table now holds every node testing `yindex`, and the x table
        // every node testing `xindex`.
        self.subtables.swap(x, y);
        self.perm[xindex] = y;
        self.perm[yindex] = x;
        self.invperm[x] = yindex;
        self.invperm[y] = xindex;
        self.fit_subtable(x);
        self.fit_subtable(y);
        Ok(self.reorder_size())
    }

    fn reexpress_for_swap(&mut self, x: usize, y: usize, xindex: u32, yindex: u32) -> Step<()> {
        let on_y = |nodes: &[Node], r: Ref| nodes[r.id().index()].index == yindex;
        let moved = {
            let nodes = self.nodes.as_slice();
            self.subtables[x]
                .iter(nodes)
                .filter(|&id| on_y(nodes, nodes[id.index()].high) || on_y(nodes, nodes[id.index()].low))
                .count()
        };
        self.reserve_nodes(2 * moved)?;
        let isolated_before = self.isolated_pair(xindex, yindex);

        let ids = self.subtables[x].drain(self.nodes.as_slice());
        let mut dependent = Vec::with_capacity(moved);
        for id in ids {
            let node = &self.nodes[id];
            let nodes = self.nodes.as_slice();
            if on_y(nodes, node.high) || on_y(nodes, node.low) {
                dependent.push(id);
            } else {
                self.subtables[x].insert(id, self.nodes.as_mut_slice());
            }
        }

        for f in dependent {
            let (f11, f10, f01, f00) = self.grandchildren(f, yindex);
            let (f1, f0) = (self.nodes[f].high, self.nodes[f].low);

            self.nodes[f1.id()].dec_ref();
            let new1 = self.find_or_add(x, xindex, f11, f01)?;
            self.nodes[f0.id()].dec_ref();
            let new0 = self.find_or_add(x, xindex, f10, f00)?;
            debug_assert!(!new1.is_negated());

            let node = &mut self.nodes[f];
            node.index = yindex;
            node.high = new1;
            node.low = new0;
            self.subtables[y].insert(f, self.nodes.as_mut_slice());
        }

        self.free_unreferenced(y);
        self.isolated = self.isolated + self.isolated_pair(xindex, yindex) - isolated_before;
        Ok(())
    }

    /// The four cofactors of `f` with respect to its own variable and the
    /// variable `yindex` right below it, complements resolved.
    pub(crate) fn grandchildren(&self, f: NodeId, yindex: u32) -> (Ref, Ref, Ref, Ref) {
        let node = &self.nodes[f];
        let (f1, f0) = (node.high, node.low);
        let (f11, f10) = if self.nodes[f1.id()].index == yindex {
            (self.nodes[f1.id()].high, self.nodes[f1.id()].low)
        } else {
            (f1, f1)
        };
        let (f01, f00) = if self.nodes[f0.id()].index == yindex {
            let child = &self.nodes[f0.id()];
            (child.high.negate_if(f0.is_negated()), child.low.negate_if(f0.is_negated()))
        } else {
            (f0, f0)
        };
        (f11, f10, f01, f00)
    }

    /// Returns `index ? high : low` from the subtable at `level`, taking one
    /// reference on it. Used only while reordering: allocation cannot fail
    /// after [`Manager::reserve_nodes`], and the table is not resized.
    pub(crate) fn find_or_add(&mut self, level: usize, index: u32, high: Ref, low: Ref) -> Step<Ref> {
        if high == low {
            self.nodes[high.id()].inc_ref();
            return Ok(high);
        }
        let negated = high.is_negated();
        let (high, low) = (high.negate_if(negated), low.negate_if(negated));
        let probe = self.subtables[level].probe(high, low, self.nodes.as_slice());
        let id = match probe.found {
            Some(id) => {
                self.nodes[id].inc_ref();
                id
            }
            None => {
                let id = self.nodes.alloc(Node::internal(index, high, low)).ok_or(Abort::OutOfMemory)?;
                self.subtables[level].insert_at(probe, id, self.nodes.as_mut_slice());
                self.keys += 1;
                self.nodes[high.id()].inc_ref();
                self.nodes[low.id()].inc_ref();
                self.nodes[id].refs = 1;
                id
            }
        };
        Ok(Ref::new(id, negated))
    }

    /// Frees the nodes of the subtable at `level` that lost every parent.
    /// Their children are referenced from elsewhere and cannot die.
    pub(crate) fn free_unreferenced(&mut self, level: usize) {
        let mut freed = Vec::new();
        self.subtables[level].extract(self.nodes.as_mut_slice(), &mut freed, |n| n.refs == 0);
        for &id in &freed {
            let (high, low) = (self.nodes[id].high, self.nodes[id].low);
            self.nodes[high.id()].dec_ref();
            self.nodes[low.id()].dec_ref();
            debug_assert!(self.nodes[high.id()].refs > 0 && self.nodes[low.id()].refs > 0);
            self.nodes.free(id);
        }
        self.keys -= freed.len();
    }

    /// Number of the two projection functions held by the manager only.
    pub(crate) fn isolated_pair(&self, xindex: u32, yindex: u32) -> usize {
        [xindex, yindex]
            .iter()
            .filter(|&&i| self.nodes[self.vars[i as usize].id()].refs == 1)
            .count()
    }

    /// Makes room for `n` nodes before a level is touched.
    pub(crate) fn reserve_nodes(&mut self, n: usize) -> Step<()> {
        if self.nodes.reserve(n) {
            return Ok(());
        }
        if self.nodes.release_stash() {
            self.slow_table_growth();
            if self.nodes.reserve(n) {
                return Ok(());
            }
        }
        warn!("Cannot reserve {} nodes for a level exchange", n);
        Err(Abort::OutOfMemory)
    }

    /// Grows the subtable at `level` while it is over its density.
    fn fit_subtable(&mut self, level: usize) {
        let sub = &self.subtables[level];
        let mut slots = sub.slots();
        while sub.keys > slots * self.density {
            slots *= 2;
        }
        if slots != sub.slots() {
            let old = sub.slots();
            self.subtables[level].resize(slots, self.nodes.as_mut_slice());
            self.slots += slots - old;
        }
    }

    /// Gives back the slots of subtables left mostly empty by reordering.
    pub(crate) fn shrink_subtables(&mut self) {
        let initial = crate::subtable::round_slots(self.config.unique_slots);
        for level in 0..self.subtables.len() {
            let sub = &self.subtables[level];
            let mut slots = sub.slots();
            while slots > initial && sub.keys < slots / 2 {
                slots /= 2;
            }
            if slots != sub.slots() {
                let old = sub.slots();
                self.subtables[level].resize(slots, self.nodes.as_mut_slice());
                self.slots -= old - slots;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::reorder::tests::{random_functions, truth_tables};
    use crate::types::Var;

    fn prepare(mgr: &mut Manager) {
        mgr.reordering = true;
        mgr.cache.clear();
        mgr.sweep(false);
        mgr.isolated = mgr.count_isolated();
        mgr.build_interaction();
        mgr.budget = crate::reorder::ReorderBudget::new(usize::MAX, None);
    }

    #[test]
    fn test_swap_exchanges_levels() {
        let mut mgr = Manager::new(3);
        let f = mgr.and(mgr.var(0), mgr.var(1)).unwrap();
        prepare(&mut mgr);
        let size = mgr.swap_in_place(0).unwrap();
        mgr.reordering = false;

        assert_eq!(mgr.order(), vec![Var::new(1), Var::new(0), Var::new(2)]);
        assert_eq!(mgr.top_var(f), Some(Var::new(1)));
        assert_eq!(mgr.high(mgr.high(f)), mgr.one());
        assert!(mgr.eval(f, &[true, true, false]));
        assert!(!mgr.eval(f, &[false, true, false]));
        assert_eq!(size, mgr.size());
        assert!(mgr.debug_check().is_ok());
        mgr.release(f);
    }

    #[test]
    fn test_swap_twice_restores_structure() {
        let mut mgr = Manager::new(6);
        let roots = random_functions(&mut mgr, 11, 5);
        let tables = truth_tables(&mgr, &roots);
        prepare(&mut mgr);
        let before = mgr.reorder_size();
        for x in 0..5 {
            mgr.swap_in_place(x).unwrap();
            mgr.swap_in_place(x).unwrap();
            assert_eq!(mgr.reorder_size(), before);
        }
        mgr.reordering = false;
        assert_eq!(truth_tables(&mgr, &roots), tables);
        assert!(mgr.debug_check().is_ok());
        for f in roots {
            mgr.release(f);
        }
    }

    #[test]
    fn test_swap_non_interacting_variables() {
        let mut mgr = Manager::new(4);
        let f = mgr.and(mgr.var(0), mgr.var(2)).unwrap();
        let g = mgr.and(mgr.var(1), mgr.var(3)).unwrap();
        prepare(&mut mgr);
        let keys = mgr.node_count();
        mgr.swap_in_place(0).unwrap();
        mgr.swap_in_place(1).unwrap();
        mgr.reordering = false;
        assert_eq!(mgr.node_count(), keys);
        assert_eq!(mgr.order(), vec![Var::new(1), Var::new(2), Var::new(0), Var::new(3)]);
        assert!(mgr.eval(f, &[true, false, true, false]));
        assert!(mgr.eval(g, &[false, true, false, true]));
        assert!(mgr.debug_check().is_ok());
        mgr.release(f);
        mgr.release(g);
    }

    #[test]
    fn test_swap_tracks_isolated_projections() {
        let mut mgr = Manager::new(3);
        // x0 ? x1 : 0 holds the projection of x1 as a child.
        let f = mgr.and(mgr.var(0), mgr.var(1)).unwrap();
        prepare(&mut mgr);
        assert_eq!(mgr.isolated, 2);
        mgr.swap_in_place(0).unwrap();
        assert_eq!(mgr.isolated, mgr.count_isolated());
        mgr.swap_in_place(1).unwrap();
        assert_eq!(mgr.isolated, mgr.count_isolated());
        mgr.reordering = false;
        mgr.release(f);
    }
}
