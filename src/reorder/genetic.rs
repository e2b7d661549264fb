//! Genetic reordering.
//!
//! A population of orders is evolved by partially matched crossover (PMX).
//! Every individual is sifted before it is scored, so the search explores
//! local optima of sifting. Parents are drawn by a roulette wheel weighted
//! by the reciprocal of the size; a child replaces the largest individual
//! when it is smaller.

use std::collections::HashMap;

use log::debug;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::Step;
use crate::manager::Manager;

#[derive(Debug, Clone)]
struct Individual {
    order: Vec<usize>,
    size: usize,
}

/// Partially matched crossover: the child takes `donor` on the cyclic
/// segment `cut1..cut2` and `base` elsewhere, with clashes resolved through
/// the segment mapping.
pub(crate) fn pmx(base: &[usize], donor: &[usize], cut1: usize, cut2: usize) -> Vec<usize> {
    let n = base.len();
    let mut child = vec![usize::MAX; n];
    let mut segment: HashMap<usize, usize> = HashMap::new();
    let mut i = cut1;
    while i != cut2 {
        child[i] = donor[i];
        segment.insert(donor[i], i);
        i = (i + 1) % n;
    }
    let mut i = cut2;
    while i != cut1 {
        let mut v = base[i];
        while let Some(&pos) = segment.get(&v) {
            v = base[pos];
        }
        child[i] = v;
        i = (i + 1) % n;
    }
    child
}

impl Manager {
    pub(crate) fn genetic(&mut self, lower: usize, upper: usize) -> Step<()> {
        self.sifting(lower, upper)?;
        let nvars = upper - lower + 1;
        if nvars < 2 {
            return Ok(());
        }
        let popsize = match self.config.population_size {
            0 => (3 * nvars).min(120),
            size => size,
        }
        .max(4);
        let crossovers = match self.config.crossovers {
            0 => (3 * nvars).min(60),
            count => count,
        }
        .min(popsize);

        // Sifted results of orders already built, by starting order.
        let mut computed: HashMap<Vec<usize>, Individual> = HashMap::new();
        let current = self.current_order(lower, upper);
        let mut population = vec![Individual {
            order: current.clone(),
            size: self.reorder_size(),
        }];
        computed.insert(current.clone(), population[0].clone());

        let mut start = current.clone();
        start.reverse();
        while population.len() < popsize && !self.budget.exhausted() {
            let individual = self.build_individual(lower, &start, &mut computed)?;
            population.push(individual);
            start = current.clone();
            start.shuffle(&mut self.rng);
        }

        for _ in 0..crossovers {
            if self.budget.exhausted() || population.len() < 2 {
                break;
            }
            let (mom, dad) = self.roulette(&population);
            let cut1 = self.rng.gen_range(0..nvars);
            let mut cut2 = self.rng.gen_range(0..nvars);
            while cut2 == cut1 {
                cut2 = self.rng.gen_range(0..nvars);
            }
            let children = [
                pmx(&population[mom].order, &population[dad].order, cut1, cut2),
                pmx(&population[dad].order, &population[mom].order, cut1, cut2),
            ];
            for child in children {
                let child = self.build_individual(lower, &child, &mut computed)?;
                let largest = (0..population.len())
                    .max_by_key(|&i| population[i].size)
                    .unwrap_or(0);
                if child.size < population[largest].size {
                    population[largest] = child;
                }
            }
        }

        let best = population
            .iter()
            .min_by_key(|individual| individual.size)
            .map(|individual| individual.order.clone())
            .unwrap_or(current);
        debug!(
            "Genetic reordering: population {}, {} crossovers, best size {}",
            population.len(),
            crossovers,
            population.iter().map(|i| i.size).min().unwrap_or(0)
        );
        self.impose_order(lower, &best)
    }

    /// Imposes `order`, sifts it, and returns the sifted order with its size.
    fn build_individual(
        &mut self,
        lower: usize,
        order: &[usize],
        computed: &mut HashMap<Vec<usize>, Individual>,
    ) -> Step<Individual> {
        if let Some(known) = computed.get(order) {
            return Ok(known.clone());
        }
        let upper = lower + order.len() - 1;
        self.impose_order(lower, order)?;
        self.sifting(lower, upper)?;
        let individual = Individual {
            order: self.current_order(lower, upper),
            size: self.reorder_size(),
        };
        computed.insert(order.to_vec(), individual.clone());
        Ok(individual)
    }

    /// Two distinct parents, each drawn with probability proportional to
    /// the reciprocal of its size.
    fn roulette(&mut self, population: &[Individual]) -> (usize, usize) {
        let weights = population.iter().map(|i| 1.0 / i.size.max(1) as f64);
        match WeightedIndex::new(weights) {
            Ok(wheel) => {
                let mom = wheel.sample(&mut self.rng);
                let mut dad = wheel.sample(&mut self.rng);
                while dad == mom {
                    dad = wheel.sample(&mut self.rng);
                }
                (mom, dad)
            }
            Err(_) => (0, 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use test_log::test;

    use super::*;
    use crate::config::ManagerConfig;
    use crate::reorder::tests::{assert_preserved, pairs_function, random_functions, truth_tables};
    use crate::reorder::ReorderMethod;

    #[test]
    fn test_pmx_produces_permutations() {
        let a = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let b = vec![3, 7, 5, 1, 6, 8, 2, 4];
        for (cut1, cut2) in [(3, 6), (6, 2), (0, 7), (5, 4)] {
            for child in [pmx(&a, &b, cut1, cut2), pmx(&b, &a, cut1, cut2)] {
                let mut sorted = child.clone();
                sorted.sort_unstable();
                assert_eq!(sorted, a);
            }
        }
        // 8 maps to 6, which maps to 5; 1 maps to 4.
        assert_eq!(pmx(&a, &b, 3, 6), vec![4, 2, 3, 1, 6, 8, 7, 5]);
    }

    #[test]
    fn test_genetic_not_worse_than_sifting() {
        let sizes: Vec<usize> = [ReorderMethod::Sift, ReorderMethod::Genetic]
            .into_iter()
            .map(|method| {
                let mut mgr = Manager::new(7);
                mgr.set_rng(ChaCha8Rng::seed_from_u64(17));
                let roots = random_functions(&mut mgr, 40, 4);
                let tables = truth_tables(&mgr, &roots);
                let stats = mgr.reduce_heap(method, 0).unwrap();
                assert_preserved(&mgr, &roots, &tables);
                for f in roots {
                    mgr.release(f);
                }
                stats.final_size
            })
            .collect();
        assert!(sizes[1] <= sizes[0]);
    }

    #[test]
    fn test_genetic_with_small_population() {
        let config = ManagerConfig::default()
            .with_num_vars(6)
            .with_population_size(2)
            .with_crossovers(3);
        let mut mgr = Manager::with_config(config);
        let f = pairs_function(&mut mgr);
        let tables = truth_tables(&mgr, &[f]);
        let stats = mgr.reduce_heap(ReorderMethod::Genetic, 0).unwrap();
        assert!(stats.final_size < stats.initial_size);
        assert_preserved(&mgr, &[f], &tables);
        mgr.release(f);
    }
}
