//! Reordering benchmarks.
//!
//! Each iteration builds a fresh diagram in a poor order and reorders it, so
//! the measurement covers the swaps and the garbage collection they trigger.
//!
//! Run with:
//! ```bash
//! cargo bench --bench reorder
//! ```

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use dd_rs::{Manager, Ref, ReorderMethod};

// ============================================================================
// Helper: separated pairs
// ============================================================================

/// `(x₀ ∧ xₙ) ∨ (x₁ ∧ xₙ₊₁) ∨ ...`, exponential in the initial order.
fn pairs(pairs: usize) -> (Manager, Ref) {
    let mut mgr = Manager::new(2 * pairs);
    let mut f = mgr.zero();
    for i in 0..pairs as u32 {
        let term = mgr.and(mgr.var(i), mgr.var(i + pairs as u32)).unwrap();
        let g = mgr.or(f, term).unwrap();
        mgr.release(term);
        mgr.release(f);
        f = g;
    }
    (mgr, f)
}

// ============================================================================
// Helper: random CNF
// ============================================================================

/// Conjunction of random 3-literal clauses.
fn random_cnf(num_vars: usize, clauses: usize, seed: u64) -> (Manager, Ref) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut mgr = Manager::new(num_vars);
    let mut f = mgr.one();
    for _ in 0..clauses {
        let lits: Vec<Ref> = (0..3)
            .map(|_| {
                let v = rng.gen_range(0..num_vars as u32);
                if rng.gen_bool(0.5) {
                    mgr.var(v)
                } else {
                    mgr.nvar(v)
                }
            })
            .collect();
        let clause = mgr.or_all(lits).unwrap();
        let g = mgr.and(f, clause).unwrap();
        mgr.release(clause);
        mgr.release(f);
        f = g;
    }
    (mgr, f)
}

fn bench_pairs(c: &mut Criterion) {
    let mut group = c.benchmark_group("reorder_pairs");
    group.sample_size(20);

    for method in [
        ReorderMethod::Sift,
        ReorderMethod::SiftConverge,
        ReorderMethod::SymmSift,
        ReorderMethod::GroupSift,
        ReorderMethod::Linear,
        ReorderMethod::Window3,
        ReorderMethod::Random,
    ] {
        group.bench_with_input(BenchmarkId::new(method.name(), 8), &method, |b, &method| {
            b.iter_batched(
                || pairs(8),
                |(mut mgr, f)| {
                    let stats = mgr.reduce_heap(method, 0).unwrap();
                    mgr.release(f);
                    stats.final_size
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_stochastic(c: &mut Criterion) {
    let mut group = c.benchmark_group("reorder_stochastic");
    group.sample_size(10);

    for method in [ReorderMethod::Annealing, ReorderMethod::Genetic, ReorderMethod::Exact] {
        group.bench_with_input(BenchmarkId::new(method.name(), 6), &method, |b, &method| {
            b.iter_batched(
                || pairs(6),
                |(mut mgr, f)| {
                    let stats = mgr.reduce_heap(method, 0).unwrap();
                    mgr.release(f);
                    stats.final_size
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_random_cnf(c: &mut Criterion) {
    let mut group = c.benchmark_group("reorder_cnf");
    group.sample_size(10);

    for num_vars in [16, 24] {
        group.bench_with_input(BenchmarkId::new("sift", num_vars), &num_vars, |b, &n| {
            b.iter_batched(
                || random_cnf(n, 2 * n, 42),
                |(mut mgr, f)| {
                    let stats = mgr.reduce_heap(ReorderMethod::Sift, 0).unwrap();
                    mgr.release(f);
                    stats.final_size
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pairs, bench_stochastic, bench_random_cnf);
criterion_main!(benches);
