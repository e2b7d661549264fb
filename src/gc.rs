//! Garbage collection.
//!
//! Dead nodes already gave back their children when they died, so a
//! collection only has to unlink every zero-count node from its subtable and
//! return it to the free list. Cache entries touching those nodes are dropped
//! first, since the cache holds no references of its own.

use std::time::Instant;

use log::debug;

use crate::config::GC_FRAC_HI;
use crate::manager::{HookKind, Manager};
use crate::types::NodeId;

impl Manager {
    /// Collects garbage as the unique table's growth policy requests it.
    ///
    /// While the table is small and the stash is intact, a request that
    /// would find many dead nodes is turned into a switch to lazier
    /// collection instead. Returns the number of nodes freed.
    pub(crate) fn collect_garbage(&mut self, clear_cache: bool) -> usize {
        if clear_cache
            && self.gc_frac == crate::config::GC_FRAC_LO
            && self.slots <= self.loose_up_to
            && self.nodes.stash_available()
        {
            self.gc_frac = GC_FRAC_HI;
            self.min_dead = (GC_FRAC_HI * self.slots as f64) as usize;
            debug!("Switching back to GC fraction {}", GC_FRAC_HI);
            return 0;
        }
        self.sweep(clear_cache)
    }

    /// Frees every dead node now.
    ///
    /// Returns the number of nodes freed.
    pub fn garbage_collect(&mut self) -> usize {
        self.sweep(true)
    }

    pub(crate) fn sweep(&mut self, clear_cache: bool) -> usize {
        self.run_hooks(HookKind::PreGc, None);
        if self.dead == 0 {
            self.run_hooks(HookKind::PostGc, None);
            return 0;
        }

        let start = Instant::now();
        self.stats.gc_count += 1;
        self.stats.peak_nodes = self.stats.peak_nodes.max(self.keys);
        debug!(
            "Garbage collecting {} dead nodes out of {} (min {})",
            self.dead, self.keys, self.min_dead
        );

        if clear_cache {
            let nodes = &self.nodes;
            self.cache.clear_dead(|r| nodes[r.id()].refs == 0);
        }

        let mut freed: Vec<NodeId> = Vec::with_capacity(self.dead);
        for sub in self.subtables.iter_mut() {
            if sub.dead == 0 {
                continue;
            }
            let removed = sub.extract(self.nodes.as_mut_slice(), &mut freed, |n| n.refs == 0);
            debug_assert_eq!(removed, sub.dead, "dead count mismatch in subtable");
            sub.dead = 0;
        }
        if self.consts.dead != 0 {
            let removed = self.consts.extract(self.nodes.as_mut_slice(), &mut freed, |n| n.refs == 0);
            debug_assert_eq!(removed, self.consts.dead, "dead count mismatch in constant table");
            self.consts.dead = 0;
        }
        debug_assert_eq!(freed.len(), self.dead, "global dead count mismatch");

        let total = freed.len();
        for id in freed {
            self.nodes.free(id);
        }
        self.keys -= total;
        self.dead = 0;
        self.stats.nodes_freed += total;
        self.stats.gc_time += start.elapsed();
        debug!("Garbage collection freed {} nodes in {:?}", total, start.elapsed());

        self.run_hooks(HookKind::PostGc, None);
        total
    }
}
