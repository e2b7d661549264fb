//! Rudell's sifting.

use log::debug;

use crate::error::Step;
use crate::manager::Manager;
use crate::reorder::Move;

impl Manager {
    /// Nodes of `level` that can vanish, not counting an isolated projection.
    pub(crate) fn level_weight(&self, level: usize) -> isize {
        let var = self.invperm[level];
        let isolated = self.nodes[self.vars[var].id()].refs == 1;
        self.subtables[level].keys as isize - isolated as isize
    }

    /// Sifts every variable of the levels `lower..=upper`, largest subtable
    /// first.
    pub(crate) fn sifting(&mut self, lower: usize, upper: usize) -> Step<()> {
        let mut sifted = 0;
        for var in self.sift_order() {
            if self.budget.exhausted() {
                debug!("Sifting stopped by its budget after {} variables", sifted);
                break;
            }
            let x = self.perm[var];
            if x < lower || x > upper {
                continue;
            }
            self.sift_aux(x, lower, upper)?;
            sifted += 1;
        }
        Ok(())
    }

    /// Moves the variable at level `x` through the range and leaves it at
    /// the best position seen.
    pub(crate) fn sift_aux(&mut self, x: usize, lower: usize, upper: usize) -> Step<()> {
        let initial = self.reorder_size();
        let mut moves = Vec::new();
        if x == lower {
            self.sift_down(x, upper, &mut moves)?;
        } else if x == upper {
            self.sift_up(x, lower, &mut moves)?;
        } else if x - lower > upper - x {
            let end = self.sift_down(x, upper, &mut moves)?;
            self.sift_up(end, lower, &mut moves)?;
        } else {
            let end = self.sift_up(x, lower, &mut moves)?;
            self.sift_down(end, upper, &mut moves)?;
        }
        self.sift_backward(initial, &moves)
    }

    /// Moves the variable at level `y` up towards `lower`. Returns the level
    /// where it stopped.
    ///
    /// The part of the diagram below the variable does not change, nor does
    /// the part above it that does not interact with it. The rest may vanish
    /// at best, except for the nodes at `lower`: this gives a lower bound on
    /// the size reachable by moving further.
    pub(crate) fn sift_up(&mut self, mut y: usize, lower: usize, moves: &mut Vec<Move>) -> Step<usize> {
        let yindex = self.invperm[y];
        let mut limit = self.reorder_size() as isize;
        let mut bound = limit;
        for z in lower + 1..y {
            if self.interacts(self.invperm[z], yindex) {
                bound -= self.level_weight(z);
            }
        }
        bound -= self.level_weight(y);

        while y > lower && bound <= limit {
            let x = y - 1;
            let xindex = self.invperm[x];
            let size = self.swap_in_place(x)?;
            if self.interacts(xindex, yindex) {
                bound += self.level_weight(y);
            }
            moves.push(Move::swap(x, y, size));
            let size = size as isize;
            if size as f64 > limit as f64 * self.config.max_growth {
                return Ok(x);
            }
            limit = limit.min(size);
            y = x;
        }
        Ok(y)
    }

    /// Moves the variable at level `x` down towards `upper`. Returns the
    /// level where it stopped.
    ///
    /// At best, every node of the interacting levels below disappears; the
    /// pass stops once even that could not beat the best size.
    pub(crate) fn sift_down(&mut self, mut x: usize, upper: usize, moves: &mut Vec<Move>) -> Step<usize> {
        let xindex = self.invperm[x];
        let mut size = self.reorder_size() as isize;
        let mut limit = size;
        let mut reducible: isize = (x + 1..=upper)
            .filter(|&y| self.interacts(xindex, self.invperm[y]))
            .map(|y| self.level_weight(y))
            .sum();

        while x < upper && size - reducible < limit {
            let y = x + 1;
            if self.interacts(xindex, self.invperm[y]) {
                reducible -= self.level_weight(y);
            }
            let swapped = self.swap_in_place(x)?;
            moves.push(Move::swap(x, y, swapped));
            size = swapped as isize;
            if size as f64 > limit as f64 * self.config.max_growth {
                return Ok(y);
            }
            limit = limit.min(size);
            x = y;
        }
        Ok(x)
    }

    /// Moves the variable at level `from` to level `to` by adjacent swaps.
    pub(crate) fn move_variable(&mut self, from: usize, to: usize) -> Step<usize> {
        let mut size = self.reorder_size();
        let mut x = from;
        while x < to {
            size = self.swap_in_place(x)?;
            x += 1;
        }
        while x > to {
            size = self.swap_in_place(x - 1)?;
            x -= 1;
        }
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::reorder::tests::{assert_preserved, pairs_function, random_functions, truth_tables};
    use crate::reorder::ReorderMethod;
    use crate::types::Var;

    #[test]
    fn test_sift_never_grows() {
        for seed in 0..4 {
            let mut mgr = Manager::new(8);
            let roots = random_functions(&mut mgr, seed, 5);
            let tables = truth_tables(&mgr, &roots);
            let stats = mgr.reduce_heap(ReorderMethod::Sift, 0).unwrap();
            assert!(stats.final_size <= stats.initial_size);
            assert_preserved(&mgr, &roots, &tables);
            for f in roots {
                mgr.release(f);
            }
        }
    }

    #[test]
    fn test_sift_converge_shrinks_pairs() {
        let mut mgr = Manager::new(8);
        let f = pairs_function(&mut mgr);
        let before = mgr.dag_size(f);
        let stats = mgr.reduce_heap(ReorderMethod::SiftConverge, 0).unwrap();
        assert!(stats.final_size < stats.initial_size);
        assert!(mgr.dag_size(f) < before);
        // Never below the optimum: two nodes per pair plus the constant.
        assert!(mgr.dag_size(f) >= 9);
        mgr.release(f);
    }

    #[test]
    fn test_swap_budget_stops_sifting() {
        let config = crate::config::ManagerConfig::default().with_num_vars(8).with_sift_max_swaps(3);
        let mut mgr = Manager::with_config(config);
        let f = pairs_function(&mut mgr);
        let stats = mgr.reduce_heap(ReorderMethod::Sift, 0).unwrap();
        // The variable being sifted when the budget ran out still finishes.
        assert!(stats.swaps < 3 + 3 * 7);
        assert!(stats.final_size <= stats.initial_size);
        mgr.release(f);
    }

    #[test]
    fn test_move_variable() {
        let mut mgr = Manager::new(5);
        let roots = random_functions(&mut mgr, 9, 3);
        let tables = truth_tables(&mgr, &roots);
        mgr.reordering = true;
        mgr.cache.clear();
        mgr.sweep(false);
        mgr.isolated = mgr.count_isolated();
        mgr.build_interaction();
        mgr.move_variable(0, 4).unwrap();
        assert_eq!(mgr.var_at(crate::types::Level::new(4)), Var::new(0));
        mgr.move_variable(4, 1).unwrap();
        assert_eq!(mgr.var_at(crate::types::Level::new(1)), Var::new(0));
        mgr.reordering = false;
        assert_preserved(&mgr, &roots, &tables);
        for f in roots {
            mgr.release(f);
        }
    }
}
