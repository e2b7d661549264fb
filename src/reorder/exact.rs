//! Exact reordering by dynamic programming over variable subsets.
//!
//! The number of nodes labelled `v` depends only on the *set* of variables
//! above `v`, not on their order (Friedman and Supowit). So the cheapest
//! order of a set `S` on the top levels extends to `S ∪ {v}` by measuring
//! the width of `v` placed right below it:
//!
//! ```text
//! cost(S ∪ {v}) = min over v of cost(S) + width(v | S above)
//! ```
//!
//! Subsets are processed by size, so only two layers are kept. The size
//! reached by sifting bounds every partial cost.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::error::Step;
use crate::manager::Manager;

/// Largest range the dynamic program is attempted on.
pub const MAX_EXACT_VARS: usize = 16;

impl Manager {
    pub(crate) fn exact(&mut self, lower: usize, upper: usize) -> Step<()> {
        self.sifting(lower, upper)?;
        let m = upper - lower + 1;
        if m < 2 {
            return Ok(());
        }
        if m > MAX_EXACT_VARS {
            warn!("Exact reordering of {} variables is out of reach; keeping the sifted order", m);
            return Ok(());
        }

        let sifted = self.current_order(lower, upper);
        let sifted_size = self.reorder_size();
        let bound: isize = (lower..=upper).map(|level| self.level_weight(level)).sum();
        let vars = sifted.clone();

        let mut layer: BTreeMap<u32, (isize, Vec<usize>)> = BTreeMap::new();
        layer.insert(0, (0, Vec::new()));
        for depth in 0..m {
            let level = lower + depth;
            let mut next: BTreeMap<u32, (isize, Vec<usize>)> = BTreeMap::new();
            for (mask, (cost, prefix)) in layer {
                if self.budget.exhausted() {
                    debug!("Exact reordering stopped by its budget at depth {}", depth);
                    return self.impose_order(lower, &sifted);
                }
                self.impose_order(lower, &prefix)?;
                for (bit, &var) in vars.iter().enumerate() {
                    if mask & (1 << bit) != 0 {
                        continue;
                    }
                    self.move_variable(self.perm[var], level)?;
                    let total = cost + self.level_weight(level);
                    if total > bound {
                        continue;
                    }
                    let key = mask | (1 << bit);
                    if next.get(&key).map_or(true, |&(best, _)| total < best) {
                        let mut order = prefix.clone();
                        order.push(var);
                        next.insert(key, (total, order));
                    }
                }
            }
            layer = next;
        }

        let full = (1u32 << m) - 1;
        match layer.remove(&full) {
            Some((cost, order)) => {
                self.impose_order(lower, &order)?;
                debug!("Exact order found: range cost {} (sifting bound {})", cost, bound);
                if self.reorder_size() > sifted_size {
                    self.impose_order(lower, &sifted)?;
                }
                Ok(())
            }
            None => self.impose_order(lower, &sifted),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::reorder::tests::{assert_preserved, pairs_function, random_functions, truth_tables};
    use crate::reorder::ReorderMethod;
    use crate::types::Var;

    /// Smallest size over every order, by brute force.
    fn brute_force_min(mgr: &mut Manager) -> usize {
        let n = mgr.num_vars();
        let changes = crate::reorder::window::plain_changes(n);
        let mut best = mgr.size();
        for p in changes {
            let mut order = mgr.order();
            order.swap(p, p + 1);
            mgr.shuffle_heap(&order).unwrap();
            best = best.min(mgr.size());
        }
        best
    }

    #[test]
    fn test_exact_matches_brute_force() {
        let mut mgr = Manager::new(5);
        let roots = random_functions(&mut mgr, 77, 3);
        let tables = truth_tables(&mgr, &roots);
        let optimum = brute_force_min(&mut mgr);
        let identity: Vec<Var> = (0..5u32).map(Var::new).collect();
        mgr.shuffle_heap(&identity).unwrap();

        mgr.reduce_heap(ReorderMethod::Exact, 0).unwrap();
        assert_eq!(mgr.size(), optimum);
        assert_preserved(&mgr, &roots, &tables);
        for f in roots {
            mgr.release(f);
        }
    }

    #[test]
    fn test_exact_not_worse_than_sifting() {
        let sizes: Vec<usize> = [ReorderMethod::Sift, ReorderMethod::Exact]
            .into_iter()
            .map(|method| {
                let mut mgr = Manager::new(8);
                let f = pairs_function(&mut mgr);
                let stats = mgr.reduce_heap(method, 0).unwrap();
                mgr.release(f);
                stats.final_size
            })
            .collect();
        assert!(sizes[1] <= sizes[0]);
    }
}
