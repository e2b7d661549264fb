use crate::reference::Ref;
use crate::types::{NodeId, Var};

/// A decision-diagram node.
///
/// The same record serves internal nodes and terminals:
///
/// - internal nodes carry a variable `index` and two edges, `high` (then) and
///   `low` (else); the then-edge is always regular,
/// - terminals carry [`Var::CONST_INDEX`] and a `value`.
///
/// `next` links the node into its subtable's collision chain while it is
/// alive, and into the free list once it has been collected.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Node {
    pub index: u32,
    pub high: Ref,
    pub low: Ref,
    pub next: NodeId,
    pub refs: u32,
    pub value: f64,
}

impl Node {
    /// Saturation point of the reference counter.
    pub const MAX_REF: u32 = u32::MAX;

    pub fn internal(index: u32, high: Ref, low: Ref) -> Self {
        Self {
            index,
            high,
            low,
            next: NodeId::INVALID,
            refs: 0,
            value: 0.0,
        }
    }

    pub fn terminal(value: f64) -> Self {
        Self {
            index: Var::CONST_INDEX,
            high: Ref::INVALID,
            low: Ref::INVALID,
            next: NodeId::INVALID,
            refs: 0,
            value,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.index == Var::CONST_INDEX
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.refs == 0
    }

    /// Increments the reference counter, sticking at [`Node::MAX_REF`].
    #[inline]
    pub fn inc_ref(&mut self) {
        self.refs = self.refs.saturating_add(1);
    }

    /// Decrements the reference counter. A saturated counter never moves.
    #[inline]
    pub fn dec_ref(&mut self) {
        if self.refs != Self::MAX_REF {
            debug_assert!(self.refs > 0, "reference count underflow");
            self.refs = self.refs.saturating_sub(1);
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::terminal(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturating_refs() {
        let mut node = Node::internal(0, Ref::INVALID, Ref::INVALID);
        assert!(node.is_dead());
        node.inc_ref();
        assert_eq!(node.refs, 1);
        node.dec_ref();
        assert!(node.is_dead());

        node.refs = Node::MAX_REF;
        node.inc_ref();
        assert_eq!(node.refs, Node::MAX_REF);
        node.dec_ref();
        assert_eq!(node.refs, Node::MAX_REF);
    }

    #[test]
    fn test_terminal() {
        let node = Node::terminal(2.5);
        assert!(node.is_terminal());
        assert_eq!(node.value, 2.5);
        assert!(!Node::internal(3, Ref::INVALID, Ref::INVALID).is_terminal());
    }
}
