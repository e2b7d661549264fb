#![allow(dead_code)]

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use dd_rs::{Manager, Ref};

/// Truth table of a function over `num_vars` variables, as a bit vector
/// indexed by the assignment (variable `i` is bit `i`).
pub type Table = Vec<bool>;

pub fn assignment(bits: u32, num_vars: usize) -> Vec<bool> {
    (0..num_vars).map(|i| bits >> i & 1 == 1).collect()
}

pub fn table_of(mgr: &Manager, f: Ref) -> Table {
    let n = mgr.num_vars();
    (0..1u32 << n).map(|bits| mgr.eval(f, &assignment(bits, n))).collect()
}

pub fn tables_of(mgr: &Manager, roots: &[Ref]) -> Vec<Table> {
    roots.iter().map(|&f| table_of(mgr, f)).collect()
}

/// Pointwise combination of truth tables.
pub fn zip_with(a: &Table, b: &Table, op: impl Fn(bool, bool) -> bool) -> Table {
    a.iter().zip(b).map(|(&x, &y)| op(x, y)).collect()
}

/// `(x₀ ∧ xₖ) ∨ (x₁ ∧ xₖ₊₁) ∨ ...` with `k = num_vars / 2`.
pub fn pairs(mgr: &mut Manager) -> Ref {
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

/// A random function built from random cubes joined by OR and XOR.
pub fn random_function(mgr: &mut Manager, rng: &mut impl Rng, cubes: usize, width: usize) -> Ref {
    let n = mgr.num_vars() as u32;
    let mut f = mgr.zero();
    mgr.hold(f);
    for _ in 0..cubes {
        let mut cube = mgr.one();
        mgr.hold(cube);
        for _ in 0..width {
            let v = rng.gen_range(0..n);
            let lit = if rng.gen_bool(0.5) { mgr.var(v) } else { mgr.nvar(v) };
            let c = mgr.and(cube, lit).unwrap();
            mgr.release(cube);
            cube = c;
        }
        let g = if rng.gen_bool(0.25) {
            mgr.xor(f, cube).unwrap()
        } else {
            mgr.or(f, cube).unwrap()
        };
        mgr.release(cube);
        mgr.release(f);
        f = g;
    }
    f
}

pub fn random_functions(mgr: &mut Manager, seed: u64, count: usize) -> Vec<Ref> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count).map(|_| random_function(mgr, &mut rng, 10, 4)).collect()
}

pub fn release_all(mgr: &mut Manager, roots: impl IntoIterator<Item = Ref>) {
    for f in roots {
        mgr.release(f);
    }
}
