//! Visited marks for whole-diagram traversals.
//!
//! Traversals (support, DAG size, interaction scan, consistency checks) run
//! with an explicit stack and need one "seen" bit per node slot. A [`BitSet`]
//! remembers which words it dirtied, so clearing it after a traversal costs
//! time proportional to the nodes visited, not to the size of the arena.

use crate::types::NodeId;

#[derive(Debug, Clone, Default)]
pub struct BitSet {
    words: Vec<u64>,
    /// Indices of words that may hold a set bit.
    dirty: Vec<usize>,
    count: usize,
}

impl BitSet {
    const BITS: usize = 64;

    /// Creates a set able to hold `capacity` bits without growing.
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(Self::BITS)],
            dirty: Vec::new(),
            count: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        let (w, b) = (index / Self::BITS, index % Self::BITS);
        w < self.words.len() && self.words[w] & (1 << b) != 0
    }

    /// Sets a bit. Returns true if it was clear.
    #[inline]
    pub fn insert(&mut self, index: usize) -> bool {
        let (w, b) = (index / Self::BITS, index % Self::BITS);
        if w >= self.words.len() {
            self.words.resize(w + 1, 0);
        }
        let word = &mut self.words[w];
        if *word & (1 << b) != 0 {
            return false;
        }
        if *word == 0 {
            self.dirty.push(w);
        }
        *word |= 1 << b;
        self.count += 1;
        true
    }

    /// Marks a node slot. Returns true if it was not marked yet.
    #[inline]
    pub fn mark(&mut self, id: NodeId) -> bool {
        self.insert(id.index())
    }

    #[inline]
    pub fn is_marked(&self, id: NodeId) -> bool {
        self.contains(id.index())
    }

    /// Clears every bit set since the last clear.
    pub fn clear(&mut self) {
        for w in self.dirty.drain(..) {
            self.words[w] = 0;
        }
        self.count = 0;
    }

    /// Iterates over the set bits in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let b = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(w * Self::BITS + b)
            })
        })
    }
}
