//! Window permutation.
//!
//! Slides a window of `k` consecutive levels down the order and tries every
//! permutation of each window. The permutations are visited by "plain
//! changes" (Steinhaus-Johnson-Trotter), so each one is a single adjacent
//! swap away from the previous one.

use log::debug;

use crate::error::Step;
use crate::manager::Manager;

/// Window positions to swap, in order, to visit all `k!` permutations of a
/// window of `k` levels. Position `p` exchanges levels `p` and `p + 1`.
pub(crate) fn plain_changes(k: usize) -> Vec<usize> {
    if k <= 1 {
        return Vec::new();
    }
    let sub = plain_changes(k - 1);
    let mut changes = Vec::with_capacity((1..=k).product::<usize>() - 1);
    let mut leftwards = true;
    for i in 0..=sub.len() {
        for j in 0..k - 1 {
            changes.push(if leftwards { k - 2 - j } else { j });
        }
        if let Some(&p) = sub.get(i) {
            // The last element sits at the left end after a leftward sweep.
            changes.push(if leftwards { p + 1 } else { p });
        }
        leftwards = !leftwards;
    }
    changes
}

impl Manager {
    /// Window permutation of size `k` (2 to 4) over `lower..=upper`.
    pub(crate) fn window_reorder(&mut self, lower: usize, upper: usize, k: usize, converge: bool) -> Step<()> {
        let k = k.min(upper - lower + 1);
        if k < 2 {
            return Ok(());
        }
        let changes = plain_changes(k);
        if converge {
            self.window_converge(lower, upper, k, &changes)
        } else {
            self.window_pass(lower, upper, k, &changes)
        }
    }

    fn window_pass(&mut self, lower: usize, upper: usize, k: usize, changes: &[usize]) -> Step<()> {
        for top in lower..=upper + 1 - k {
            if self.budget.exhausted() {
                debug!("Window permutation stopped by its budget at level {}", top);
                break;
            }
            self.permute_window(top, changes)?;
        }
        Ok(())
    }

    /// Converging window permutation. A window is permuted again only when
    /// an improvement in an overlapping window moved one of its levels.
    fn window_converge(&mut self, lower: usize, upper: usize, k: usize, changes: &[usize]) -> Step<()> {
        let mut events = vec![true; upper + 2 - k - lower];
        let mut rounds = 0;
        while events.contains(&true) {
            rounds += 1;
            for x in 0..events.len() {
                if !events[x] {
                    continue;
                }
                if self.budget.exhausted() {
                    debug!("Converging window permutation stopped by its budget after {} rounds", rounds);
                    return Ok(());
                }
                events[x] = false;
                if let Some((first, last)) = self.permute_window(lower + x, changes)? {
                    let (first, last) = (x + first, x + last);
                    for (w, event) in events.iter_mut().enumerate() {
                        if w != x && w <= last && w + k > first {
                            *event = true;
                        }
                    }
                }
            }
        }
        debug!("Converging window permutation settled after {} rounds", rounds);
        Ok(())
    }

    /// Tries every permutation of the window starting at `top` and keeps the
    /// first smallest one.
    ///
    /// Returns the first and last window positions that changed, or `None`
    /// if the window kept its order.
    fn permute_window(&mut self, top: usize, changes: &[usize]) -> Step<Option<(usize, usize)>> {
        let mut best = self.reorder_size();
        let mut best_at = 0;
        for (i, &p) in changes.iter().enumerate() {
            let size = self.swap_in_place(top + p)?;
            if size < best {
                best = size;
                best_at = i + 1;
            }
        }
        for &p in changes[best_at..].iter().rev() {
            self.swap_in_place(top + p)?;
        }

        let k = changes.iter().max().map_or(1, |&p| p + 2);
        let mut order: Vec<usize> = (0..k).collect();
        for &p in &changes[..best_at] {
            order.swap(p, p + 1);
        }
        let mut moved = order.iter().enumerate().filter(|&(i, &v)| i != v).map(|(i, _)| i);
        Ok(moved.next().map(|first| (first, moved.last().unwrap_or(first))))
    }
}
