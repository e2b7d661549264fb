//! Symmetric sifting.
//!
//! Two variables `x` and `y` are symmetric in `f` when exchanging them does
//! not change `f`: `f[x:=1,y:=0] = f[x:=0,y:=1]`. Symmetric variables end up
//! adjacent in good orders, so once found they are sifted as one block.

use log::debug;

use crate::error::Step;
use crate::manager::Manager;
use crate::reorder::group::Aggregation;
use crate::types::Var;

impl Manager {
    /// Whether the variables at adjacent levels `x` and `y = x + 1` are
    /// symmetric in every function of the diagram.
    ///
    /// Every node of level `x` must reach level `y` through both children,
    /// with matching cofactors, and no node of level `y` may have a parent
    /// outside level `x`.
    pub(crate) fn symm_check(&self, x: usize, y: usize) -> bool {
        let nodes = self.nodes.as_slice();
        let one = self.one;
        let yindex = self.invperm[y];
        if self.subtables[x].keys == 1 {
            return false;
        }
        if self.subtables[y].keys == 1 && self.nodes[self.vars[yindex].id()].refs == 1 {
            return false;
        }

        let mut positive = true;
        let mut negative = true;
        let mut arcs = 0usize;
        for id in self.subtables[x].iter(nodes) {
            let node = &nodes[id.index()];
            let high_on_y = nodes[node.high.id().index()].index as usize == yindex;
            let low_on_y = nodes[node.low.id().index()].index as usize == yindex;
            let projection = node.high == one && node.low.regular() == one && node.refs == 1;
            if !high_on_y && !low_on_y && !projection {
                return false;
            }
            arcs += high_on_y as usize + low_on_y as usize;
            if !projection {
                let (f11, f10, f01, f00) = self.grandchildren(id, yindex as u32);
                positive &= f01 == f10;
                negative &= f11 == f00;
                if !positive && !negative {
                    return false;
                }
            }
        }

        let total = self.subtables[y].iter(nodes).map(|id| nodes[id.index()].refs as usize).sum::<usize>() - 1;
        arcs == total
    }

    /// Symmetric sifting of `lower..=upper`. The symmetry groups found are
    /// kept for [`Manager::symmetry_groups`].
    pub(crate) fn symm_sifting(&mut self, lower: usize, upper: usize, converge: bool) -> Step<()> {
        let outcome = if converge {
            self.until_converged(|mgr| mgr.block_sifting(lower, upper, Aggregation::Symmetry))
        } else {
            self.block_sifting(lower, upper, Aggregation::Symmetry)
        };
        self.record_symmetry(lower, upper);
        outcome
    }

    fn record_symmetry(&mut self, lower: usize, upper: usize) {
        self.symmetry.clear();
        let mut level = lower;
        while level <= upper {
            let bottom = self.group_bottom(level);
            if bottom > level {
                let group: Vec<Var> = (level..=bottom).map(|l| Var::new(self.invperm[l] as u32)).collect();
                self.symmetry.push(group);
            }
            level = bottom + 1;
        }
        let grouped: usize = self.symmetry.iter().map(Vec::len).sum();
        debug!(
            "Symmetric sifting: {} groups covering {} variables",
            self.symmetry.len(),
            grouped
        );
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::reorder::tests::{assert_preserved, random_functions, truth_tables};
    use crate::reorder::ReorderMethod;

    #[test]
    fn test_symm_check_on_conjunction() {
        let mut mgr = Manager::new(3);
        let f = mgr.and(mgr.var(0), mgr.var(1)).unwrap();
        mgr.build_interaction();
        assert!(mgr.symm_check(0, 1));
        mgr.release(f);
    }

    #[test]
    fn test_symm_check_rejects_asymmetric() {
        let mut mgr = Manager::new(3);
        let g = mgr.or(mgr.var(1), mgr.var(2)).unwrap();
        let k = mgr.ite(mgr.var(0), g, mgr.var(1)).unwrap();
        mgr.release(g);
        mgr.garbage_collect();
        // x0 ? (x1 ∨ x2) : x1 is not symmetric in x0 and x1.
        assert!(!mgr.symm_check(0, 1));
        mgr.release(k);
    }

    #[test]
    fn test_symmetric_variables_are_grouped() {
        // Threshold function "at least two of x0..x3" is totally symmetric;
        // x4 ⊕ x5 is symmetric too.
        let mut mgr = Manager::new(6);
        let mut f = mgr.zero();
        for i in 0..4u32 {
            for j in i + 1..4 {
                let t = mgr.and(mgr.var(i), mgr.var(j)).unwrap();
                let g = mgr.or(f, t).unwrap();
                mgr.release(t);
                mgr.release(f);
                f = g;
            }
        }
        let p = mgr.xor(mgr.var(4), mgr.var(5)).unwrap();
        let tables = truth_tables(&mgr, &[f, p]);
        mgr.reduce_heap(ReorderMethod::SymmSift, 0).unwrap();
        assert_preserved(&mgr, &[f, p], &tables);

        let groups = mgr.symmetry_groups().to_vec();
        assert!(!groups.is_empty());
        for group in &groups {
            let top = mgr.level_of(group[0]).index();
            for (i, &v) in group.iter().enumerate() {
                assert_eq!(mgr.level_of(v).index(), top + i);
            }
        }
        let threshold: Vec<Var> = (0..4u32).map(Var::new).collect();
        assert!(groups.iter().any(|g| g.iter().all(|v| threshold.contains(v)) && g.len() >= 2));
        mgr.release(f);
        mgr.release(p);
    }

    #[test]
    fn test_symm_sift_converge_preserves() {
        let mut mgr = Manager::new(7);
        let roots = random_functions(&mut mgr, 17, 4);
        let tables = truth_tables(&mgr, &roots);
        let stats = mgr.reduce_heap(ReorderMethod::SymmSiftConverge, 0).unwrap();
        assert!(stats.final_size <= stats.initial_size * 2);
        assert_preserved(&mgr, &roots, &tables);
        for f in roots {
            mgr.release(f);
        }
    }
}
