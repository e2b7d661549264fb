//! Block sifting: symmetric and group sifting.
//!
//! Adjacent levels that belong together form a *group*, kept as a ring in
//! `group_next`: inside a group each level points to the one below, and the
//! bottom level points back to the top. A singleton points to itself.
//!
//! A group is sifted as a unit by exchanging it with the neighboring group,
//! one variable at a time. Before each exchange the aggregation predicate is
//! asked whether the two groups facing each other should merge instead.

use log::debug;

use crate::error::Step;
use crate::manager::Manager;
use crate::reference::Ref;
use crate::reorder::{best_size, GroupCheck, Move};

/// When two adjacent groups are merged during block sifting.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Aggregation {
    /// Exact symmetry of the two facing variables.
    Symmetry,
    /// The predicate configured for group sifting.
    Group(GroupCheck),
}

/// Moves of one block since its group last changed.
struct History {
    initial: usize,
    moves: Vec<Move>,
}

impl History {
    fn restart(&mut self, size: usize) {
        self.initial = size;
        self.moves.clear();
    }
}

impl Manager {
    /// Makes every level of `from..to` a singleton group.
    pub(crate) fn reset_groups(&mut self, from: usize, to: usize) {
        for level in from..to {
            self.group_next[level] = level;
        }
    }

    pub(crate) fn group_bottom(&self, level: usize) -> usize {
        let mut l = level;
        while self.group_next[l] > l {
            l = self.group_next[l];
        }
        l
    }

    pub(crate) fn group_top(&self, level: usize) -> usize {
        self.group_next[self.group_bottom(level)]
    }

    /// Makes `top..=bottom` one group.
    pub(crate) fn link_group(&mut self, top: usize, bottom: usize) {
        for level in top..bottom {
            self.group_next[level] = level + 1;
        }
        self.group_next[bottom] = top;
    }

    /// Exchanges the block of `upper_size` levels starting at `top` with the
    /// block of `lower_size` levels right below it. Both keep their internal
    /// order and stay groups.
    pub(crate) fn exchange_blocks(&mut self, top: usize, upper_size: usize, lower_size: usize) -> Step<usize> {
        let mut size = self.reorder_size();
        for i in 0..lower_size {
            let mut level = top + upper_size + i;
            for _ in 0..upper_size {
                size = self.swap_in_place(level - 1)?;
                level -= 1;
            }
        }
        self.link_group(top, top + lower_size - 1);
        self.link_group(top + lower_size, top + lower_size + upper_size - 1);
        Ok(size)
    }

    /// Group sifting: sifts every group of `lower..=upper`, merging adjacent
    /// variables the configured [`GroupCheck`] accepts. Declared groups are
    /// made contiguous first and always move as a unit.
    pub(crate) fn group_sifting(&mut self, lower: usize, upper: usize, converge: bool) -> Step<()> {
        self.link_declared_groups(lower, upper)?;
        let how = Aggregation::Group(self.config.group_check);
        if converge {
            self.until_converged(|mgr| mgr.block_sifting(lower, upper, how))
        } else {
            self.block_sifting(lower, upper, how)
        }
    }

    /// Brings the members of each declared group to consecutive levels,
    /// below the topmost member, and links them. Gathering one group can
    /// shift another, so linking waits until every group is in place.
    fn link_declared_groups(&mut self, lower: usize, upper: usize) -> Step<()> {
        let groups = self.declared_groups.clone();
        for members in &groups {
            let mut members = members.clone();
            members.sort_unstable_by_key(|&v| self.perm[v]);
            let top = self.perm[members[0]];
            let bottom = top + members.len() - 1;
            if top < lower || bottom > upper {
                continue;
            }
            if self.perm[members[members.len() - 1]] != bottom {
                debug!("Gathering declared group at level {}", top);
                for (offset, &var) in members.iter().enumerate().skip(1) {
                    self.move_variable(self.perm[var], top + offset)?;
                }
            }
        }

        self.reset_groups(lower, upper + 1);
        for members in &groups {
            let top = members.iter().map(|&v| self.perm[v]).min().unwrap_or(0);
            let bottom = members.iter().map(|&v| self.perm[v]).max().unwrap_or(0);
            if top >= lower && bottom <= upper && bottom - top + 1 == members.len() {
                self.link_group(top, bottom);
            }
        }
        Ok(())
    }

    /// One pass of block sifting over `lower..=upper`: each group is sifted
    /// once, largest subtable first.
    pub(crate) fn block_sifting(&mut self, lower: usize, upper: usize, how: Aggregation) -> Step<()> {
        let mut sifted = vec![false; self.vars.len()];
        for var in self.sift_order() {
            if self.budget.exhausted() {
                debug!("Block sifting stopped by its budget");
                break;
            }
            let x = self.perm[var];
            if sifted[var] || x < lower || x > upper {
                continue;
            }
            self.block_sift_aux(x, lower, upper, how)?;
            let x = self.perm[var];
            for level in self.group_top(x)..=self.group_bottom(x) {
                sifted[self.invperm[level]] = true;
            }
        }
        Ok(())
    }

    fn block_sift_aux(&mut self, x: usize, lower: usize, upper: usize, how: Aggregation) -> Step<()> {
        let mut history = History {
            initial: self.reorder_size(),
            moves: Vec::new(),
        };
        let top = self.group_top(x);
        let bottom = self.group_bottom(x);
        if top == lower {
            self.block_sift_down(top, upper, how, &mut history)?;
        } else if bottom == upper {
            self.block_sift_up(top, lower, how, &mut history)?;
        } else if top - lower > upper - bottom {
            let top = self.block_sift_down(top, upper, how, &mut history)?;
            self.block_sift_up(top, lower, how, &mut history)?;
        } else {
            let top = self.block_sift_up(top, lower, how, &mut history)?;
            self.block_sift_down(top, upper, how, &mut history)?;
        }
        self.block_backward(&history)
    }

    /// Moves the group starting at `top` up. Returns its new top level.
    fn block_sift_up(&mut self, mut top: usize, lower: usize, how: Aggregation, history: &mut History) -> Step<usize> {
        let mut limit = self.reorder_size();
        while top > lower {
            let above = top - 1;
            let utop = self.group_top(above);
            let bottom = self.group_bottom(top);
            if self.aggregate(how, above, top) {
                self.link_group(utop, bottom);
                top = utop;
                history.restart(self.reorder_size());
                continue;
            }
            let own = bottom - top + 1;
            let size = self.exchange_blocks(utop, top - utop, own)?;
            history.moves.push(Move::swap(utop + own - 1, utop + own, size));
            top = utop;
            if size as f64 > limit as f64 * self.config.max_growth {
                break;
            }
            limit = limit.min(size);
        }
        Ok(top)
    }

    /// Moves the group starting at `top` down. Returns its new top level.
    fn block_sift_down(&mut self, mut top: usize, upper: usize, how: Aggregation, history: &mut History) -> Step<usize> {
        let mut limit = self.reorder_size();
        loop {
            let bottom = self.group_bottom(top);
            if bottom >= upper {
                break;
            }
            let below = bottom + 1;
            let lbottom = self.group_bottom(below);
            if self.aggregate(how, bottom, below) {
                self.link_group(top, lbottom);
                history.restart(self.reorder_size());
                continue;
            }
            let other = lbottom - bottom;
            let size = self.exchange_blocks(top, bottom - top + 1, other)?;
            history.moves.push(Move::swap(top + other - 1, top + other, size));
            top += other;
            if size as f64 > limit as f64 * self.config.max_growth {
                break;
            }
            limit = limit.min(size);
        }
        Ok(top)
    }

    /// Exchanges blocks back until the smallest recorded size is reached.
    fn block_backward(&mut self, history: &History) -> Step<()> {
        let best = best_size(history.initial, &history.moves);
        for m in history.moves.iter().rev() {
            if m.size == best {
                break;
            }
            let xtop = self.group_top(m.x);
            debug_assert_eq!(self.group_top(m.y), m.y);
            let ybottom = self.group_bottom(m.y);
            self.exchange_blocks(xtop, m.x - xtop + 1, ybottom - m.y + 1)?;
        }
        Ok(())
    }

    /// Whether the groups meeting at levels `x` and `y = x + 1` merge.
    fn aggregate(&self, how: Aggregation, x: usize, y: usize) -> bool {
        match how {
            Aggregation::Symmetry => self.symm_check(x, y),
            Aggregation::Group(GroupCheck::None) => false,
            Aggregation::Group(GroupCheck::ExtendedSymmetry) => self.ext_symm_check(x, y),
            Aggregation::Group(GroupCheck::SecondDifference) => self.sec_diff_check(x, y),
        }
    }

    /// Symmetry of the variables at `x` and `y`, up to the configured number
    /// of violating nodes and of arcs into `y` bypassing `x`.
    pub(crate) fn ext_symm_check(&self, x: usize, y: usize) -> bool {
        let yindex = self.invperm[y];
        if !self.interacts(self.invperm[x], yindex) {
            return false;
        }
        let nodes = self.nodes.as_slice();
        let one = self.one;
        let on_y = |r: Ref| nodes[r.id().index()].index as usize == yindex;

        let mut counter = (self.subtables[x].keys as f64 * self.config.symm_violation as f64 / 100.0 + 0.5) as usize;
        let mut arcs = 0usize;
        for id in self.subtables[x].iter(nodes) {
            let node = &nodes[id.index()];
            let projection = node.high == one && node.low.regular() == one && node.refs == 1;
            arcs += on_y(node.high) as usize + on_y(node.low) as usize;
            if !on_y(node.high) && !on_y(node.low) && !projection {
                if counter == 0 {
                    return false;
                }
                counter -= 1;
            }
            let (f11, f10, f01, f00) = self.grandchildren(id, yindex as u32);
            if !projection && f01 != f10 && f11 != f00 {
                if counter == 0 {
                    return false;
                }
                counter -= 1;
            }
        }

        let total: isize = self.subtables[y].iter(nodes).map(|id| nodes[id.index()].refs as isize).sum::<isize>() - 1;
        let allowed = (self.subtables[y].keys as f64 * self.config.arc_violation as f64 / 100.0 + 0.5) as isize;
        arcs as isize >= total - allowed
    }

    /// A sharp drop of the subtable sizes below `x` relative to above it.
    pub(crate) fn sec_diff_check(&self, x: usize, y: usize) -> bool {
        if x == 0 {
            return false;
        }
        let nx = self.subtables[x].keys as f64;
        let nx_1 = self.subtables[x - 1].keys as f64;
        let sx = self.subtables[y].keys as f64 / nx - nx / nx_1;
        sx < self.config.recomb as f64 / 100.0 && self.interacts(self.invperm[x], self.invperm[y])
    }
}
