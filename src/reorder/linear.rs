//! Linear sifting.
//!
//! Besides exchanging two adjacent levels, linear sifting may replace the
//! upper variable `x` by `x XNOR y`. The transform is its own inverse and,
//! like a swap, re-expresses the nodes of level `x` in place:
//!
//! ```text
//! f = x ? (y ? f11 : f10) : (y ? f01 : f00)
//!   = x' ? (y ? f11 : f00) : (y ? f01 : f10)      with x' = x XNOR y
//! ```
//!
//! The diagram variables are then affine functions over GF(2) of the client
//! variables. [`LinearMatrix`] records them so that evaluation and
//! [`Manager::linear_row`] can map client assignments onto the diagram.

use log::debug;

use crate::error::Step;
use crate::manager::Manager;
use crate::reorder::{Move, MoveKind};
use crate::types::Var;

/// Row `i` holds the client variables XORed into diagram variable `i`,
/// plus a complement bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearMatrix {
    n: usize,
    words: usize,
    rows: Vec<u64>,
    complement: Vec<bool>,
}

/// One diagram variable as a linear combination of client variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearRow {
    /// Client variables XORed together, by increasing index.
    pub vars: Vec<Var>,
    /// True if the XOR is complemented.
    pub complemented: bool,
}

impl LinearRow {
    pub fn identity(var: Var) -> Self {
        Self {
            vars: vec![var],
            complemented: false,
        }
    }
}

impl LinearMatrix {
    /// The identity transform over `n` variables.
    pub fn new(n: usize) -> Self {
        let words = n.div_ceil(64).max(1);
        let mut rows = vec![0; n * words];
        for i in 0..n {
            rows[i * words + i / 64] |= 1 << (i % 64);
        }
        Self {
            n,
            words,
            rows,
            complement: vec![false; n],
        }
    }

    pub fn num_vars(&self) -> usize {
        self.n
    }

    /// Extends the matrix to `n` variables; new variables map to themselves.
    pub fn grow(&mut self, n: usize) {
        if n <= self.n {
            return;
        }
        let mut grown = Self::new(n);
        for i in 0..self.n {
            let (old, new) = (i * self.words, i * grown.words);
            grown.rows[new..new + grown.words].fill(0);
            grown.rows[new..new + self.words].copy_from_slice(&self.rows[old..old + self.words]);
        }
        grown.complement[..self.n].copy_from_slice(&self.complement);
        *self = grown;
    }

    #[inline]
    fn bit(&self, row: usize, col: usize) -> bool {
        self.rows[row * self.words + col / 64] >> (col % 64) & 1 == 1
    }

    /// Replaces diagram variable `x` by `x XNOR y`.
    pub fn xnor_rows(&mut self, x: usize, y: usize) {
        for w in 0..self.words {
            let v = self.rows[y * self.words + w];
            self.rows[x * self.words + w] ^= v;
        }
        self.complement[x] ^= !self.complement[y];
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::new(self.n)
    }

    /// Values of the diagram variables for a client assignment.
    pub fn apply(&self, assignment: &[bool]) -> Vec<bool> {
        (0..self.n)
            .map(|i| {
                let parity = (0..self.n)
                    .filter(|&j| self.bit(i, j) && assignment.get(j).copied().unwrap_or(false))
                    .count();
                (parity % 2 == 1) ^ self.complement[i]
            })
            .collect()
    }

    /// Diagram variables whose row contains client variable `j`.
    pub fn column(&self, j: usize) -> Vec<usize> {
        (0..self.n).filter(|&i| self.bit(i, j)).collect()
    }

    pub fn row(&self, i: usize) -> LinearRow {
        LinearRow {
            vars: (0..self.n).filter(|&j| self.bit(i, j)).map(|j| Var::new(j as u32)).collect(),
            complemented: self.complement[i],
        }
    }
}

impl Manager {
    /// True once linear sifting has left a non-trivial transform behind.
    pub(crate) fn linear_active(&self) -> bool {
        self.linear.as_ref().is_some_and(|linear| !linear.is_identity())
    }

    /// Diagram variables flipped by flipping client variable `var`.
    pub(crate) fn linear_column(&self, var: usize) -> Vec<Var> {
        match &self.linear {
            Some(linear) if var < linear.num_vars() => {
                linear.column(var).into_iter().map(|i| Var::new(i as u32)).collect()
            }
            _ => vec![Var::new(var as u32)],
        }
    }

    /// Replaces the variable at level `x` by its XNOR with the variable at
    /// level `x + 1`. Levels and variable indices stay where they are.
    ///
    /// Returns the new [`Manager::reorder_size`].
    pub(crate) fn linear_in_place(&mut self, x: usize) -> Step<usize> {
        let y = x + 1;
        let xindex = self.invperm[x];
        let yindex = self.invperm[y];
        if !self.interacts(xindex, yindex) {
            return Ok(self.reorder_size());
        }
        let (xi, yi) = (xindex as u32, yindex as u32);
        self.reserve_nodes(2 * self.subtables[x].keys)?;
        let isolated_before = self.isolated_pair(xi, yi);

        let ids = self.subtables[x].drain(self.nodes.as_slice());
        for &f in &ids {
            let (f11, f10, f01, f00) = self.grandchildren(f, yi);
            let (f1, f0) = (self.nodes[f].high, self.nodes[f].low);

            self.nodes[f1.id()].dec_ref();
            let new1 = self.find_or_add(y, yi, f11, f00)?;
            self.nodes[f0.id()].dec_ref();
            let new0 = self.find_or_add(y, yi, f01, f10)?;
            debug_assert!(!new1.is_negated());

            let node = &mut self.nodes[f];
            node.high = new1;
            node.low = new0;
        }
        for f in ids {
            self.subtables[x].insert(f, self.nodes.as_mut_slice());
        }

        self.free_unreferenced(y);
        self.isolated = self.isolated + self.isolated_pair(xi, yi) - isolated_before;
        let n = self.vars.len();
        self.linear.get_or_insert_with(|| LinearMatrix::new(n)).xnor_rows(xindex, yindex);
        Ok(self.reorder_size())
    }

    /// Sifting where every swap is followed by a trial linear transform.
    pub(crate) fn linear_sifting(&mut self, lower: usize, upper: usize) -> Step<()> {
        let n = self.vars.len();
        match self.linear.as_mut() {
            Some(linear) => linear.grow(n),
            None => self.linear = Some(LinearMatrix::new(n)),
        }

        let mut transforms = 0;
        for var in self.sift_order() {
            if self.budget.exhausted() {
                debug!("Linear sifting stopped by its budget");
                break;
            }
            let x = self.perm[var];
            if x < lower || x > upper {
                continue;
            }
            transforms += self.linear_sift_aux(x, lower, upper)?;
        }
        debug!("Linear sifting kept {} transforms", transforms);
        Ok(())
    }

    /// Returns the number of transforms kept on the way.
    fn linear_sift_aux(&mut self, x: usize, lower: usize, upper: usize) -> Step<usize> {
        let initial = self.reorder_size();
        let mut moves = Vec::new();
        if x == lower {
            self.linear_sift_down(x, upper, &mut moves)?;
        } else if x == upper {
            self.linear_sift_up(x, lower, &mut moves)?;
        } else if x - lower > upper - x {
            self.linear_sift_down(x, upper, &mut moves)?;
            self.undo_linear_moves(&mut moves)?;
            self.linear_sift_up(x, lower, &mut moves)?;
        } else {
            self.linear_sift_up(x, lower, &mut moves)?;
            self.undo_linear_moves(&mut moves)?;
            self.linear_sift_down(x, upper, &mut moves)?;
        }
        let kept = moves.iter().filter(|m| m.kind == MoveKind::LinearTransform).count();
        self.sift_backward(initial, &moves)?;
        Ok(kept)
    }

    /// One swap of levels `x` and `x + 1` plus a trial transform, kept
    /// only when it shrinks the diagram.
    fn linear_step(&mut self, x: usize, moves: &mut Vec<Move>) -> Step<usize> {
        // Variable that ends up at the lower level.
        let lower_var = self.invperm[x];
        let upper_var = self.invperm[x + 1];
        let size = self.swap_in_place(x)?;
        let transformed = self.linear_in_place(x)?;
        let mut m = Move::swap(x, x + 1, size);
        if transformed >= size {
            self.linear_in_place(x)?;
        } else if self.interacts(lower_var, upper_var) {
            m.size = transformed;
            m.kind = MoveKind::LinearTransform;
            self.interact.inherit(lower_var, upper_var);
        }
        moves.push(m);
        Ok(m.size)
    }

    fn linear_sift_up(&mut self, mut y: usize, lower: usize, moves: &mut Vec<Move>) -> Step<()> {
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
            let size = self.linear_step(x, moves)? as isize;
            if self.interacts(xindex, yindex) {
                bound += self.level_weight(y);
            }
            if size as f64 > limit as f64 * self.config.max_growth {
                break;
            }
            limit = limit.min(size);
            y = x;
        }
        Ok(())
    }

    fn linear_sift_down(&mut self, mut x: usize, upper: usize, moves: &mut Vec<Move>) -> Step<()> {
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
            size = self.linear_step(x, moves)? as isize;
            if size as f64 > limit as f64 * self.config.max_growth {
                break;
            }
            limit = limit.min(size);
            x = y;
        }
        Ok(())
    }

    /// Takes back `moves` in reverse, recording each inverse step so the
    /// following pass can walk through them again.
    fn undo_linear_moves(&mut self, moves: &mut Vec<Move>) -> Step<()> {
        let done = std::mem::take(moves);
        for m in done.iter().rev() {
            let (size, kind) = match m.kind {
                MoveKind::Swap => (self.swap_in_place(m.x)?, MoveKind::Swap),
                MoveKind::LinearTransform => {
                    self.linear_in_place(m.x)?;
                    (self.swap_in_place(m.x)?, MoveKind::InverseTransform)
                }
                MoveKind::InverseTransform => {
                    self.swap_in_place(m.x)?;
                    (self.linear_in_place(m.x)?, MoveKind::LinearTransform)
                }
            };
            moves.push(Move { size, kind, ..*m });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::reorder::tests::{assert_preserved, pairs_function, random_functions, truth_tables};
    use crate::reorder::ReorderMethod;

    #[test]
    fn test_matrix_xnor_is_involution() {
        let mut m = LinearMatrix::new(3);
        assert!(m.is_identity());
        m.xnor_rows(0, 1);
        assert_eq!(m.row(0).vars, vec![Var::new(0), Var::new(1)]);
        assert!(m.row(0).complemented);
        // x0 XNOR x1 with x0 = 1, x1 = 0.
        assert_eq!(m.apply(&[true, false, true]), vec![false, false, true]);
        m.xnor_rows(0, 1);
        assert!(m.is_identity());
    }

    #[test]
    fn test_matrix_grow_keeps_rows() {
        let mut m = LinearMatrix::new(70);
        m.xnor_rows(65, 3);
        m.grow(130);
        assert_eq!(m.num_vars(), 130);
        assert_eq!(m.row(65).vars, vec![Var::new(3), Var::new(65)]);
        assert_eq!(m.row(129), LinearRow::identity(Var::new(129)));
    }

    #[test]
    fn test_linear_in_place_preserves_functions() {
        let mut mgr = Manager::new(5);
        let roots = random_functions(&mut mgr, 5, 4);
        let tables = truth_tables(&mgr, &roots);
        mgr.reordering = true;
        mgr.cache.clear();
        mgr.sweep(false);
        mgr.isolated = mgr.count_isolated();
        mgr.build_interaction();
        for x in 0..4 {
            let before = mgr.reorder_size();
            mgr.linear_in_place(x).unwrap();
            assert_preserved(&mgr, &roots, &tables);
            assert_eq!(mgr.linear_in_place(x).unwrap(), before);
        }
        mgr.reordering = false;
        assert!(mgr.linear.as_ref().map_or(true, |m| m.is_identity()));
        for f in roots {
            mgr.release(f);
        }
    }

    #[test]
    fn test_linear_sifting_on_xor_chain() {
        let mut mgr = Manager::new(6);
        let mut f = mgr.one();
        for i in 0..3u32 {
            let t = mgr.xor(mgr.var(i), mgr.var(i + 3)).unwrap();
            let g = mgr.and(f, t).unwrap();
            mgr.release(t);
            mgr.release(f);
            f = g;
        }
        let tables = truth_tables(&mgr, &[f]);
        let stats = mgr.reduce_heap(ReorderMethod::Linear, 0).unwrap();
        assert!(stats.final_size <= stats.initial_size);
        assert_preserved(&mgr, &[f], &tables);
        for v in 0..6u32 {
            assert!(!mgr.linear_row(Var::new(v)).unwrap().vars.is_empty());
        }
        mgr.release(f);
    }

    #[test]
    fn test_linear_converge_on_pairs() {
        let mut mgr = Manager::new(8);
        let f = pairs_function(&mut mgr);
        let tables = truth_tables(&mgr, &[f]);
        let stats = mgr.reduce_heap(ReorderMethod::LinearConverge, 0).unwrap();
        assert!(stats.final_size < stats.initial_size);
        assert_preserved(&mgr, &[f], &tables);
        mgr.release(f);
    }
}
