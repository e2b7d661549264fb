//! Per-level subtables with intrusive, sorted collision chains.
//!
//! The unique table is split by level: `subtables[l]` holds every internal
//! node whose variable currently sits at level `l`. A subtable is an array of
//! bucket heads; collision chains run through `Node.next`, so a node needs no
//! separate entry record.
//!
//! ```text
//! Subtable for level k:
//! ┌─────────────────────────────────────────────────┐
//! │ buckets: [NodeId; 2^bits]                       │
//! │   [0] ─────► Node@5 ──► Node@12 ──► ∅           │
//! │   [1] ─────► ∅                                  │
//! │   [2] ─────► Node@3 ──► ∅                       │
//! │   ...                                           │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! Chains are kept sorted by `(high, low)` in decreasing order. A failed
//! lookup therefore stops early and already knows where the new node goes,
//! and level swaps can splice nodes in without a second search.
//!
//! The bucket index takes the *top* bits of a multiplicative hash, so
//! doubling the table splits every chain into two buckets without reordering
//! it.
//!
//! Terminals live in a separate [`ConstTable`], keyed by value.

use crate::node::Node;
use crate::reference::Ref;
use crate::types::NodeId;

pub(crate) const HASH_P1: u32 = 12_582_917;
pub(crate) const HASH_P2: u32 = 4_256_249;

#[inline]
fn hash_pair(a: u32, b: u32, shift: u32) -> usize {
    (a.wrapping_mul(HASH_P1).wrapping_add(b).wrapping_mul(HASH_P2) >> shift) as usize
}

fn shift_for(slots: usize) -> u32 {
    debug_assert!(slots.is_power_of_two() && slots >= 2);
    32 - slots.trailing_zeros()
}

/// Rounds a requested slot count to a usable power of two.
pub fn round_slots(slots: usize) -> usize {
    slots.max(2).next_power_of_two().min(1 << 30)
}

/// Result of walking a chain for a `(high, low)` pair.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Probe {
    pub found: Option<NodeId>,
    bucket: usize,
    /// Node after which a new node must be linked, or `INVALID` for the head.
    prev: NodeId,
}

/// A subtable storing the nodes of a single level.
#[derive(Debug, Clone)]
pub struct Subtable {
    buckets: Vec<NodeId>,
    shift: u32,
    /// Number of nodes in the subtable, dead ones included.
    pub keys: usize,
    /// Number of nodes with a zero reference count.
    pub dead: usize,
}

impl Subtable {
    pub fn new(slots: usize) -> Self {
        let slots = round_slots(slots);
        Self {
            buckets: vec![NodeId::INVALID; slots],
            shift: shift_for(slots),
            keys: 0,
            dead: 0,
        }
    }

    pub fn slots(&self) -> usize {
        self.buckets.len()
    }

    /// Key count past which the subtable should grow.
    pub fn max_keys(&self, density: usize) -> usize {
        self.buckets.len() * density
    }

    #[inline]
    fn bucket_of(&self, high: Ref, low: Ref) -> usize {
        hash_pair(high.raw(), low.raw(), self.shift)
    }

    /// Looks up the node `(high, low)`.
    pub fn probe(&self, high: Ref, low: Ref, nodes: &[Node]) -> Probe {
        let bucket = self.bucket_of(high, low);
        let mut prev = NodeId::INVALID;
        let mut cur = self.buckets[bucket];

        while cur.is_valid() && high < nodes[cur.index()].high {
            prev = cur;
            cur = nodes[cur.index()].next;
        }
        while cur.is_valid() && high == nodes[cur.index()].high && low < nodes[cur.index()].low {
            prev = cur;
            cur = nodes[cur.index()].next;
        }

        let found = if cur.is_valid() && nodes[cur.index()].high == high && nodes[cur.index()].low == low {
            Some(cur)
        } else {
            None
        };
        Probe { found, bucket, prev }
    }

    #[inline]
    pub fn find(&self, high: Ref, low: Ref, nodes: &[Node]) -> Option<NodeId> {
        self.probe(high, low, nodes).found
    }

    /// Links `id` at the position recorded by a failed probe.
    pub fn insert_at(&mut self, probe: Probe, id: NodeId, nodes: &mut [Node]) {
        debug_assert!(probe.found.is_none());
        if probe.prev.is_valid() {
            nodes[id.index()].next = nodes[probe.prev.index()].next;
            nodes[probe.prev.index()].next = id;
        } else {
            nodes[id.index()].next = self.buckets[probe.bucket];
            self.buckets[probe.bucket] = id;
        }
        self.keys += 1;
    }

    /// Links `id` into its sorted position.
    pub fn insert(&mut self, id: NodeId, nodes: &mut [Node]) {
        let node = nodes[id.index()];
        let probe = self.probe(node.high, node.low, nodes);
        self.insert_at(probe, id, nodes);
    }

    /// Unlinks every node for which `remove` holds and appends it to `out`.
    ///
    /// Returns the number of nodes removed. The `keys` counter is adjusted;
    /// the `dead` counter is left to the caller.
    pub fn extract(&mut self, nodes: &mut [Node], out: &mut Vec<NodeId>, mut remove: impl FnMut(&Node) -> bool) -> usize {
        let mut removed = 0;
        for b in 0..self.buckets.len() {
            let mut prev = NodeId::INVALID;
            let mut cur = self.buckets[b];
            while cur.is_valid() {
                let next = nodes[cur.index()].next;
                if remove(&nodes[cur.index()]) {
                    if prev.is_valid() {
                        nodes[prev.index()].next = next;
                    } else {
                        self.buckets[b] = next;
                    }
                    out.push(cur);
                    removed += 1;
                } else {
                    prev = cur;
                }
                cur = next;
            }
        }
        self.keys -= removed;
        removed
    }

    /// Empties the subtable, returning its nodes in chain order.
    pub fn drain(&mut self, nodes: &[Node]) -> Vec<NodeId> {
        let ids = self.ids(nodes);
        self.buckets.fill(NodeId::INVALID);
        self.keys = 0;
        self.dead = 0;
        ids
    }

    /// Rebuilds the subtable with `slots` buckets.
    pub fn resize(&mut self, slots: usize, nodes: &mut [Node]) {
        let slots = round_slots(slots);
        if slots == self.buckets.len() {
            return;
        }
        let ids = self.ids(nodes);
        let dead = self.dead;
        self.buckets = vec![NodeId::INVALID; slots];
        self.shift = shift_for(slots);
        self.keys = 0;
        for id in ids {
            self.insert(id, nodes);
        }
        self.dead = dead;
    }

    pub fn iter<'a>(&'a self, nodes: &'a [Node]) -> impl Iterator<Item = NodeId> + 'a {
        self.buckets.iter().flat_map(move |&head| ChainIter { current: head, nodes })
    }

    pub fn ids(&self, nodes: &[Node]) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(self.keys);
        ids.extend(self.iter(nodes));
        ids
    }

    /// Checks that every chain is sorted and hashed into the right bucket.
    pub fn chains_sorted(&self, nodes: &[Node]) -> bool {
        for (b, &head) in self.buckets.iter().enumerate() {
            let mut last: Option<(Ref, Ref)> = None;
            for id in (ChainIter { current: head, nodes }) {
                let n = &nodes[id.index()];
                if self.bucket_of(n.high, n.low) != b {
                    return false;
                }
                if let Some(prev) = last {
                    if (n.high, n.low) >= prev {
                        return false;
                    }
                }
                last = Some((n.high, n.low));
            }
        }
        true
    }
}

/// Iterator over a collision chain.
struct ChainIter<'a> {
    current: NodeId,
    nodes: &'a [Node],
}

impl Iterator for ChainIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.current.is_valid() {
            return None;
        }
        let id = self.current;
        self.current = self.nodes[id.index()].next;
        Some(id)
    }
}

/// Table of terminal nodes, keyed by value.
///
/// Values closer than `epsilon` are identified. Magnitudes below `epsilon`
/// are flushed to zero, values are hashed by their position on an epsilon
/// grid, and equality is checked exactly first so infinities match
/// themselves.
#[derive(Debug, Clone)]
pub struct ConstTable {
    buckets: Vec<NodeId>,
    shift: u32,
    pub keys: usize,
    pub dead: usize,
    pub epsilon: f64,
}

impl ConstTable {
    pub fn new(slots: usize, epsilon: f64) -> Self {
        let slots = round_slots(slots);
        Self {
            buckets: vec![NodeId::INVALID; slots],
            shift: shift_for(slots),
            keys: 0,
            dead: 0,
            epsilon,
        }
    }

    pub fn slots(&self) -> usize {
        self.buckets.len()
    }

    /// Canonical form of a terminal value. Every NaN maps to one terminal.
    pub fn normalize(&self, value: f64) -> f64 {
        if value.is_nan() {
            f64::NAN
        } else if value.abs() < self.epsilon {
            0.0
        } else {
            value
        }
    }

    /// Snaps a value to the epsilon grid. Values closer than epsilon land on
    /// the same or on adjacent grid points.
    #[inline]
    fn grid(&self, value: f64) -> f64 {
        if value.is_finite() && self.epsilon > 0.0 {
            (value / self.epsilon).round()
        } else {
            value
        }
    }

    #[inline]
    fn bucket_of_grid(&self, grid: f64) -> usize {
        let bits = grid.to_bits();
        hash_pair(bits as u32, (bits >> 32) as u32, self.shift)
    }

    #[inline]
    fn bucket_of(&self, value: f64) -> usize {
        self.bucket_of_grid(self.grid(value))
    }

    /// Looks up a (normalized) value. Returns the bucket on a miss.
    pub fn find(&self, value: f64, nodes: &[Node]) -> Result<NodeId, usize> {
        let grid = self.grid(value);
        let home = self.bucket_of_grid(grid);
        let neighbours = if value.is_finite() { [grid - 1.0, grid + 1.0] } else { [grid, grid] };
        let buckets = [home, self.bucket_of_grid(neighbours[0]), self.bucket_of_grid(neighbours[1])];
        for (i, &bucket) in buckets.iter().enumerate() {
            if buckets[..i].contains(&bucket) {
                continue;
            }
            let mut cur = self.buckets[bucket];
            while cur.is_valid() {
                let v = nodes[cur.index()].value;
                if v == value || (v - value).abs() < self.epsilon || (v.is_nan() && value.is_nan()) {
                    return Ok(cur);
                }
                cur = nodes[cur.index()].next;
            }
        }
        Err(home)
    }

    pub fn insert_at(&mut self, bucket: usize, id: NodeId, nodes: &mut [Node]) {
        nodes[id.index()].next = self.buckets[bucket];
        self.buckets[bucket] = id;
        self.keys += 1;
    }

    pub fn insert(&mut self, id: NodeId, nodes: &mut [Node]) {
        let bucket = self.bucket_of(nodes[id.index()].value);
        self.insert_at(bucket, id, nodes);
    }

    pub fn extract(&mut self, nodes: &mut [Node], out: &mut Vec<NodeId>, mut remove: impl FnMut(&Node) -> bool) -> usize {
        let mut removed = 0;
        for b in 0..self.buckets.len() {
            let mut prev = NodeId::INVALID;
            let mut cur = self.buckets[b];
            while cur.is_valid() {
                let next = nodes[cur.index()].next;
                if remove(&nodes[cur.index()]) {
                    if prev.is_valid() {
                        nodes[prev.index()].next = next;
                    } else {
                        self.buckets[b] = next;
                    }
                    out.push(cur);
                    removed += 1;
                } else {
                    prev = cur;
                }
                cur = next;
            }
        }
        self.keys -= removed;
        removed
    }

    pub fn resize(&mut self, slots: usize, nodes: &mut [Node]) {
        let ids: Vec<NodeId> = self.iter(nodes).collect();
        let slots = round_slots(slots);
        self.buckets = vec![NodeId::INVALID; slots];
        self.shift = shift_for(slots);
        self.keys = 0;
        for id in ids {
            self.insert(id, nodes);
        }
    }

    pub fn iter<'a>(&'a self, nodes: &'a [Node]) -> impl Iterator<Item = NodeId> + 'a {
        self.buckets.iter().flat_map(move |&head| ChainIter { current: head, nodes })
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn leaf(id: u32) -> Ref {
        Ref::positive(NodeId::new(id))
    }

    fn make_nodes(pairs: &[(Ref, Ref)]) -> Vec<Node> {
        let mut nodes = vec![Node::terminal(1.0)];
        for &(high, low) in pairs {
            nodes.push(Node::internal(0, high, low));
        }
        nodes
    }

    #[test]
    fn test_insert_find() {
        let one = leaf(0);
        let mut nodes = make_nodes(&[(one, -one), (leaf(1), -one), (one, leaf(2))]);
        let mut st = Subtable::new(4);

        for i in 1..=3 {
            st.insert(NodeId::new(i), &mut nodes);
        }
        assert_eq!(st.keys, 3);
        assert_eq!(st.find(one, -one, &nodes), Some(NodeId::new(1)));
        assert_eq!(st.find(leaf(1), -one, &nodes), Some(NodeId::new(2)));
        assert_eq!(st.find(one, leaf(2), &nodes), Some(NodeId::new(3)));
        assert_eq!(st.find(leaf(2), one, &nodes), None);
        assert!(st.chains_sorted(&nodes));
    }

    #[test]
    fn test_collision_chains_stay_sorted() {
        let pairs: Vec<(Ref, Ref)> = (1..40u32).map(|i| (leaf(i % 7), -leaf(i))).collect();
        let mut nodes = make_nodes(&pairs);
        let mut st = Subtable::new(2);
        for i in 1..40 {
            st.insert(NodeId::new(i), &mut nodes);
        }
        assert!(st.chains_sorted(&nodes));

        st.resize(16, &mut nodes);
        assert_eq!(st.slots(), 16);
        assert_eq!(st.keys, 39);
        assert!(st.chains_sorted(&nodes));
        for (i, &(high, low)) in pairs.iter().enumerate() {
            assert_eq!(st.find(high, low, &nodes), Some(NodeId::new(i as u32 + 1)));
        }

        st.resize(4, &mut nodes);
        assert!(st.chains_sorted(&nodes));
        assert_eq!(st.iter(&nodes).count(), 39);
    }

    #[test]
    fn test_extract() {
        let one = leaf(0);
        let mut nodes = make_nodes(&[(one, -one), (leaf(1), -one), (one, leaf(2))]);
        let mut st = Subtable::new(2);
        for i in 1..=3 {
            st.insert(NodeId::new(i), &mut nodes);
        }
        nodes[2].refs = 1;
        let mut out = Vec::new();
        assert_eq!(st.extract(&mut nodes, &mut out, |n| n.refs == 0), 2);
        out.sort();
        assert_eq!(out, vec![NodeId::new(1), NodeId::new(3)]);
        assert_eq!(st.keys, 1);
        assert_eq!(st.find(leaf(1), -one, &nodes), Some(NodeId::new(2)));
    }

    #[test]
    fn test_const_table_epsilon() {
        let mut nodes = vec![Node::terminal(1.0), Node::terminal(f64::INFINITY)];
        let mut table = ConstTable::new(8, 1e-12);
        table.insert(NodeId::new(0), &mut nodes);
        table.insert(NodeId::new(1), &mut nodes);

        assert_eq!(table.find(1.0, &nodes), Ok(NodeId::new(0)));
        assert_eq!(table.find(f64::INFINITY, &nodes), Ok(NodeId::new(1)));
        assert_eq!(table.find(1.0 + 5e-13, &nodes), Ok(NodeId::new(0)));
        assert_eq!(table.find(1.0 - 5e-13, &nodes), Ok(NodeId::new(0)));
        assert!(table.find(2.0, &nodes).is_err());
        assert_eq!(table.normalize(1e-15), 0.0);
        assert_eq!(table.normalize(-0.5), -0.5);
    }
}
