//! Variable-interaction matrix.
//!
//! Two variables *interact* if some root of the shared diagram depends on
//! both of them. Variables that do not interact can be swapped by exchanging
//! their subtables outright, and sifting uses the matrix to bound how far a
//! variable can usefully move.
//!
//! The matrix is rebuilt once per reordering call and is stale as soon as
//! new nodes are created.
//!
//! ```text
//!        y: 1  2  3
//!   x=0:   [0][1][2]
//!   x=1:      [3][4]
//!   x=2:         [5]
//! ```

use crate::bitset::BitSet;
use crate::manager::Manager;
use crate::types::NodeId;

/// Upper triangle of a symmetric bit matrix over variable indices.
#[derive(Debug, Clone, Default)]
pub struct InteractionMatrix {
    n: usize,
    bits: Vec<u64>,
}

impl InteractionMatrix {
    /// Creates an empty matrix over `n` variables.
    pub fn new(n: usize) -> Self {
        let pairs = n * n.saturating_sub(1) / 2;
        Self {
            n,
            bits: vec![0; pairs.div_ceil(64)],
        }
    }

    pub fn num_vars(&self) -> usize {
        self.n
    }

    #[inline]
    fn position(&self, x: usize, y: usize) -> usize {
        let (x, y) = if x < y { (x, y) } else { (y, x) };
        debug_assert!(y < self.n);
        (((self.n << 1) - x - 3) * x >> 1) + y - 1
    }

    /// Records that `x` and `y` interact.
    pub fn set(&mut self, x: usize, y: usize) {
        if x == y {
            return;
        }
        let p = self.position(x, y);
        self.bits[p / 64] |= 1 << (p % 64);
    }

    /// Returns true if `x` and `y` interact. Order of arguments is irrelevant.
    pub fn test(&self, x: usize, y: usize) -> bool {
        if x == y || x >= self.n || y >= self.n {
            return false;
        }
        let p = self.position(x, y);
        self.bits[p / 64] & (1 << (p % 64)) != 0
    }

    /// Marks every pair of the given support as interacting.
    fn set_all(&mut self, support: &[usize]) {
        for (i, &x) in support.iter().enumerate() {
            for &y in &support[i + 1..] {
                self.set(x, y);
            }
        }
    }

    /// After `x` has been replaced by `x XNOR y`, `x` inherits every
    /// interaction of `y`.
    pub fn inherit(&mut self, x: usize, y: usize) {
        for i in 0..self.n {
            if i != x && i != y && self.test(i, y) {
                self.set(i, x);
            }
        }
    }
}

impl Manager {
    /// Rebuilds the interaction matrix from the current unique table.
    ///
    /// Levels are scanned from the top. A node not reached from an earlier
    /// root is a root itself: its support is collected with a DFS that
    /// skips nodes already seen during the same root's traversal, and every
    /// pair in that support is recorded.
    pub(crate) fn build_interaction(&mut self) {
        let n = self.vars.len();
        let mut matrix = InteractionMatrix::new(n);
        let mut reached = BitSet::new(self.nodes.len());
        let mut local = BitSet::new(self.nodes.len());
        let mut in_support = vec![false; n];
        let mut support: Vec<usize> = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let nodes = self.nodes.as_slice();

        for sub in &self.subtables {
            for root in sub.iter(nodes) {
                if reached.is_marked(root) {
                    continue;
                }
                stack.push(root);
                while let Some(id) = stack.pop() {
                    let node = &nodes[id.index()];
                    if node.is_terminal() || !local.mark(id) {
                        continue;
                    }
                    reached.mark(id);
                    let index = node.index as usize;
                    if !in_support[index] {
                        in_support[index] = true;
                        support.push(index);
                    }
                    stack.push(node.high.id());
                    stack.push(node.low.id());
                }
                matrix.set_all(&support);
                for &v in &support {
                    in_support[v] = false;
                }
                support.clear();
                local.clear();
            }
        }
        self.interact = matrix;
    }

    /// Returns true if the two variables occurred together in some root's
    /// support at the last interaction scan.
    pub(crate) fn interacts(&self, x: usize, y: usize) -> bool {
        self.interact.test(x, y)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_matrix_is_symmetric() {
        let mut m = InteractionMatrix::new(5);
        m.set(3, 1);
        assert!(m.test(1, 3));
        assert!(m.test(3, 1));
        assert!(!m.test(1, 2));
        m.set(0, 4);
        m.set(3, 4);
        assert!(m.test(4, 0));
        assert!(m.test(4, 3));
        assert!(!m.test(2, 2));
    }

    #[test]
    fn test_every_pair_has_its_own_bit() {
        let n = 13;
        let mut seen = std::collections::HashSet::new();
        let m = InteractionMatrix::new(n);
        for x in 0..n {
            for y in (x + 1)..n {
                assert!(seen.insert(m.position(x, y)));
            }
        }
        assert_eq!(seen.len(), n * (n - 1) / 2);
        assert!(seen.iter().all(|&p| p < n * (n - 1) / 2));
    }

    #[test]
    fn test_inherit() {
        let mut m = InteractionMatrix::new(4);
        m.set(1, 2);
        m.set(2, 3);
        m.inherit(0, 2);
        assert!(m.test(0, 1));
        assert!(m.test(0, 3));
    }

    #[test]
    fn test_build_from_diagram() {
        let mut mgr = Manager::new(4);
        let f = mgr.and(mgr.var(0), mgr.var(2)).unwrap();
        let g = mgr.xor(mgr.var(1), mgr.var(3)).unwrap();
        mgr.build_interaction();
        assert!(mgr.interacts(0, 2));
        assert!(mgr.interacts(1, 3));
        assert!(!mgr.interacts(0, 1));
        assert!(!mgr.interacts(2, 3));
        mgr.release(f);
        mgr.release(g);
    }
}
