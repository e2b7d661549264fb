mod common;

use std::cell::Cell;
use std::rc::Rc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use test_log::test;

use common::*;
use dd_rs::{DdError, HookInfo, HookKind, Manager, Ref, Var};

/// A fixed sequence of operations; collects garbage halfway if asked.
fn workload(mgr: &mut Manager, collect: bool) -> Vec<Ref> {
    let mut rng = ChaCha8Rng::seed_from_u64(77);
    let inputs: Vec<Ref> = (0..6).map(|_| random_function(mgr, &mut rng, 8, 3)).collect();
    let cube = mgr.cube(&[Var::new(0), Var::new(3), Var::new(6)]).unwrap();

    let mut results = Vec::new();
    for w in inputs.windows(2) {
        let scratch = mgr.xor(w[0], w[1]).unwrap();
        let kept = mgr.and_abstract(scratch, w[1], cube).unwrap();
        mgr.release(scratch);
        results.push(kept);
    }
    if collect {
        assert!(mgr.garbage_collect() > 0);
    }
    for w in inputs.windows(3) {
        let r = mgr.ite(w[0], w[1], w[2]).unwrap();
        results.push(r);
        let s = mgr.xor(w[0], w[1]).unwrap();
        results.push(s);
    }

    release_all(mgr, inputs);
    mgr.release(cube);
    results
}

#[test]
fn test_cache_is_not_observable_across_gc() {
    let mut plain = Manager::new(9);
    let mut collected = Manager::new(9);
    let a = workload(&mut plain, false);
    let b = workload(&mut collected, true);

    assert_eq!(tables_of(&plain, &a), tables_of(&collected, &b));
    let sizes_a: Vec<usize> = a.iter().map(|&f| plain.dag_size(f)).collect();
    let sizes_b: Vec<usize> = b.iter().map(|&f| collected.dag_size(f)).collect();
    assert_eq!(sizes_a, sizes_b);
    assert!(collected.gc_count() > plain.gc_count());
    assert!(collected.debug_check().is_ok());

    release_all(&mut plain, a);
    release_all(&mut collected, b);
}

#[test]
fn test_cache_hits_return_same_handle() {
    let mut mgr = Manager::new(6);
    let fs = random_functions(&mut mgr, 8, 2);
    let r1 = mgr.and(fs[0], fs[1]).unwrap();
    let hits = mgr.cache_stats().hits;
    let r2 = mgr.and(fs[0], fs[1]).unwrap();
    assert_eq!(r1, r2);
    assert!(mgr.cache_stats().hits > hits);
    release_all(&mut mgr, [r1, r2]);
    release_all(&mut mgr, fs);
}

#[test]
fn test_gc_hooks_and_counters() {
    let mut mgr = Manager::new(6);
    let pre = Rc::new(Cell::new(0));
    let post = Rc::new(Cell::new(0));
    {
        let pre = Rc::clone(&pre);
        mgr.add_hook(HookKind::PreGc, Box::new(move |_: &HookInfo| pre.set(pre.get() + 1)));
        let post = Rc::clone(&post);
        mgr.add_hook(
            HookKind::PostGc,
            Box::new(move |info: &HookInfo| {
                assert_eq!(info.dead, 0);
                post.set(post.get() + 1);
            }),
        );
    }

    let fs = random_functions(&mut mgr, 4, 3);
    release_all(&mut mgr, fs);
    assert!(mgr.dead_count() > 0);
    let freed = mgr.garbage_collect();
    assert!(freed > 0);
    assert_eq!(mgr.dead_count(), 0);
    assert_eq!((pre.get(), post.get()), (1, 1));
    assert_eq!(mgr.gc_count(), 1);
    assert!(mgr.peak_nodes() >= freed);
}

#[test]
fn test_dead_nodes_are_resurrected() {
    let mut mgr = Manager::new(4);
    let f = mgr.xor(mgr.var(0), mgr.var(2)).unwrap();
    let table = table_of(&mgr, f);
    mgr.release(f);
    assert!(mgr.dead_count() > 0);
    let g = mgr.xor(mgr.var(0), mgr.var(2)).unwrap();
    assert_eq!(g, f);
    assert_eq!(table_of(&mgr, g), table);
    assert!(mgr.debug_check().is_ok());
    mgr.release(g);
}

#[test]
fn test_memory_budget_reports_out_of_memory() {
    let n = 24;
    let mut mgr = Manager::create(n, 1024, 32 * 1024);
    let half = n as u32 / 2;
    let mut f = mgr.zero();
    let mut failure = None;
    for i in 0..half {
        let term = match mgr.and(mgr.var(i), mgr.var(i + half)) {
            Ok(term) => term,
            Err(e) => {
                failure = Some(e);
                break;
            }
        };
        let g = mgr.or(f, term);
        mgr.release(term);
        match g {
            Ok(g) => {
                mgr.release(f);
                f = g;
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    assert_eq!(failure, Some(DdError::OutOfMemory));

    // The manager stays usable and consistent.
    let report = mgr.debug_check();
    assert!(report.is_ok(), "{}", report);
    mgr.release(f);
    mgr.garbage_collect();
    let small = mgr.and(mgr.var(0), mgr.var(1)).unwrap();
    assert!(mgr.eval(small, &[true; 24]));
    mgr.release(small);
}
