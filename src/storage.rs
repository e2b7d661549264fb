//! Node arena.
//!
//! All nodes of a manager live in one `Vec<Node>` and are addressed by
//! [`NodeId`]. Collected slots are threaded into a free list through their
//! `next` field and stamped with [`Var::FREE_INDEX`], so a stale id can be
//! told apart from a live node in debug checks.
//!
//! The arena grows in chunks of [`MEM_CHUNK`] nodes until it reaches its
//! slot limit. A small emergency stash is held back beyond that limit; it is
//! handed out at most once, when everything else has failed, so that the
//! manager gets a chance to collect garbage or finish the current operation.

use std::mem::size_of;
use std::ops::{Index, IndexMut};

use log::{debug, warn};

use crate::config::{MEM_CHUNK, STASH_FRACTION};
use crate::node::Node;
use crate::types::{NodeId, Var};

/// Smallest arena a budget can produce; enough for the permanent terminals.
const MIN_SLOTS: usize = 64;

#[derive(Debug)]
pub struct NodeStorage {
    nodes: Vec<Node>,
    free_head: NodeId,
    free_len: usize,
    /// Maximum number of slots, not counting the stash.
    limit: usize,
    /// Slots held back for emergencies.
    stash_slots: usize,
    /// Ballast released together with the stash when there is no budget.
    ballast: Option<Vec<u8>>,
    stash_released: bool,
}

impl NodeStorage {
    /// Creates an arena bounded by `max_memory` bytes. Zero means unbounded.
    pub fn new(max_memory: usize) -> Self {
        let node_size = size_of::<Node>();
        let (limit, stash_slots, ballast) = if max_memory == 0 {
            let stash_slots = MEM_CHUNK * 4;
            let ballast = vec![0u8; stash_slots * node_size];
            (NodeId::MAX as usize, 0, Some(ballast))
        } else {
            let total = (max_memory / node_size).clamp(MIN_SLOTS, NodeId::MAX as usize);
            let stash_slots = total / STASH_FRACTION;
            (total - stash_slots, stash_slots, None)
        };
        Self {
            nodes: Vec::new(),
            free_head: NodeId::INVALID,
            free_len: 0,
            limit,
            stash_slots,
            ballast,
            stash_released: false,
        }
    }

    /// Number of slots ever handed out (live or free).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of slots currently in use.
    pub fn in_use(&self) -> usize {
        self.nodes.len() - self.free_len
    }

    pub fn free_len(&self) -> usize {
        self.free_len
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes currently held by the arena.
    pub fn memory(&self) -> usize {
        self.nodes.capacity() * size_of::<Node>() + self.ballast.as_ref().map_or(0, |b| b.capacity())
    }

    pub fn stash_available(&self) -> bool {
        !self.stash_released
    }

    /// Returns true if `n` more nodes can be allocated without failing.
    pub fn can_allocate(&self, n: usize) -> bool {
        self.free_len + (self.limit - self.nodes.len().min(self.limit)) >= n
    }

    /// Makes sure the next `n` allocations succeed without growing past
    /// the limit or hitting a failed reallocation.
    pub fn reserve(&mut self, n: usize) -> bool {
        if !self.can_allocate(n) {
            return false;
        }
        let fresh = n.saturating_sub(self.free_len);
        fresh == 0 || self.nodes.try_reserve(fresh).is_ok()
    }

    /// Places `node` in a free slot.
    ///
    /// Returns `None` when the free list is empty and the arena has reached
    /// its limit or the allocator refuses to grow it.
    pub fn alloc(&mut self, node: Node) -> Option<NodeId> {
        if self.free_head.is_valid() {
            let id = self.free_head;
            self.free_head = self.nodes[id.index()].next;
            self.free_len -= 1;
            self.nodes[id.index()] = node;
            return Some(id);
        }

        let len = self.nodes.len();
        if len >= self.limit {
            return None;
        }
        if len == self.nodes.capacity() {
            let chunk = MEM_CHUNK.min(self.limit - len);
            if self.nodes.try_reserve(chunk).is_err() {
                warn!("Node arena could not grow past {} slots", len);
                return None;
            }
        }
        self.nodes.push(node);
        Some(NodeId::new(len as u32))
    }

    /// Returns a slot to the free list.
    pub fn free(&mut self, id: NodeId) {
        let slot = &mut self.nodes[id.index()];
        debug_assert_ne!(slot.index, Var::FREE_INDEX, "double free of {}", id);
        slot.index = Var::FREE_INDEX;
        slot.refs = 0;
        slot.next = self.free_head;
        self.free_head = id;
        self.free_len += 1;
    }

    pub fn is_free(&self, id: NodeId) -> bool {
        self.nodes[id.index()].index == Var::FREE_INDEX
    }

    /// Hands the emergency stash over to the arena.
    ///
    /// Returns false if the stash was already spent.
    pub fn release_stash(&mut self) -> bool {
        if self.stash_released {
            return false;
        }
        self.stash_released = true;
        self.ballast = None;
        self.limit = (self.limit + self.stash_slots).min(NodeId::MAX as usize);
        debug!("Released emergency stash of {} node slots", self.stash_slots);
        true
    }

    pub fn as_slice(&self) -> &[Node] {
        &self.nodes
    }

    pub fn as_mut_slice(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    /// Iterates over the ids of all slots that are not in the free list.
    pub fn live_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.index != Var::FREE_INDEX)
            .map(|(i, _)| NodeId::new(i as u32))
    }
}

impl Index<NodeId> for NodeStorage {
    type Output = Node;

    #[inline]
    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

impl IndexMut<NodeId> for NodeStorage {
    #[inline]
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }
}
