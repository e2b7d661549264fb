//! Random swapping.

use log::debug;
use rand::Rng;

use crate::error::Step;
use crate::manager::Manager;
use crate::reorder::Move;

impl Manager {
    /// Exchanges random pairs of levels of `lower..=upper`, keeping each
    /// exchange only up to its best intermediate order. With `pivot`, the
    /// pair straddles the largest subtable.
    pub(crate) fn random_swapping(&mut self, lower: usize, upper: usize, pivot: bool) -> Step<()> {
        if upper <= lower {
            return Ok(());
        }
        let iterations = upper - lower + 1;
        for _ in 0..iterations {
            if self.budget.exhausted() {
                break;
            }
            let (x, y) = if pivot {
                self.pick_around_pivot(lower, upper)
            } else {
                self.pick_pair(lower, upper)
            };
            let initial = self.reorder_size();
            let mut moves = Vec::new();
            self.swap_any(x, y, &mut moves)?;
            self.sift_backward(initial, &moves)?;
            debug!("Random swap of levels {} and {}: {} -> {}", x, y, initial, self.reorder_size());
        }
        Ok(())
    }

    fn pick_pair(&mut self, lower: usize, upper: usize) -> (usize, usize) {
        let x = self.rng.gen_range(lower..=upper);
        let mut y = self.rng.gen_range(lower..=upper);
        while y == x {
            y = self.rng.gen_range(lower..=upper);
        }
        (x.min(y), x.max(y))
    }

    fn pick_around_pivot(&mut self, lower: usize, upper: usize) -> (usize, usize) {
        let pivot = (lower..=upper)
            .rev()
            .max_by_key(|&level| self.subtables[level].keys)
            .unwrap_or(lower);
        let y = if pivot == upper {
            pivot
        } else {
            self.rng.gen_range(pivot + 1..=upper)
        };
        let x = if pivot == lower {
            lower
        } else {
            self.rng.gen_range(lower..pivot)
        };
        (x, y)
    }

    /// Exchanges the variables at levels `x < y` by adjacent swaps,
    /// recording every intermediate size.
    pub(crate) fn swap_any(&mut self, x: usize, y: usize, moves: &mut Vec<Move>) -> Step<()> {
        for level in x..y {
            let size = self.swap_in_place(level)?;
            moves.push(Move::swap(level, level + 1, size));
        }
        for level in (x..y - 1).rev() {
            let size = self.swap_in_place(level)?;
            moves.push(Move::swap(level, level + 1, size));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use test_log::test;

    use super::*;
    use crate::reorder::tests::{assert_preserved, pairs_function, random_functions, truth_tables};
    use crate::reorder::ReorderMethod;
    use crate::types::Var;

    #[test]
    fn test_swap_any_exchanges_two_variables() {
        let mut mgr = Manager::new(5);
        let roots = random_functions(&mut mgr, 2, 3);
        let tables = truth_tables(&mgr, &roots);
        mgr.reordering = true;
        mgr.cache.clear();
        mgr.sweep(false);
        mgr.isolated = mgr.count_isolated();
        mgr.build_interaction();
        let mut moves = Vec::new();
        mgr.swap_any(1, 4, &mut moves).unwrap();
        mgr.reordering = false;
        assert_eq!(moves.len(), 5);
        let order: Vec<Var> = [0u32, 4, 2, 3, 1].iter().map(|&v| Var::new(v)).collect();
        assert_eq!(mgr.order(), order);
        assert_preserved(&mgr, &roots, &tables);
        for f in roots {
            mgr.release(f);
        }
    }

    #[test]
    fn test_random_swapping_never_grows() {
        for method in [ReorderMethod::Random, ReorderMethod::RandomPivot] {
            let mut mgr = Manager::new(8);
            mgr.set_rng(ChaCha8Rng::seed_from_u64(99));
            let f = pairs_function(&mut mgr);
            let tables = truth_tables(&mgr, &[f]);
            let stats = mgr.reduce_heap(method, 0).unwrap();
            assert!(stats.final_size <= stats.initial_size);
            assert_preserved(&mgr, &[f], &tables);
            mgr.release(f);
        }
    }

    #[test]
    fn test_random_swapping_is_reproducible() {
        let orders: Vec<Vec<Var>> = (0..2)
            .map(|_| {
                let mut mgr = Manager::new(8);
                mgr.set_rng(ChaCha8Rng::seed_from_u64(5));
                let f = pairs_function(&mut mgr);
                mgr.reduce_heap(ReorderMethod::Random, 0).unwrap();
                mgr.release(f);
                mgr.order()
            })
            .collect();
        assert_eq!(orders[0], orders[1]);
    }
}
