//! Type-safe wrappers for variables, levels and node slots.
//!
//! A decision diagram distinguishes the *identity* of a variable (its index,
//! fixed for the lifetime of the manager) from its *position* in the current
//! order (its level, changed by reordering). Mixing the two up is the most
//! common source of reordering bugs, so both get their own newtype.

use std::fmt;

/// A variable index (0-based).
///
/// Indices are stable across reordering operations: the variable `x3` stays
/// `x3` wherever sifting moves it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(u32);

impl Var {
    /// Index reserved for terminal (constant) nodes.
    pub const CONST_INDEX: u32 = u32::MAX;

    /// Index stamped on arena slots sitting in the free list.
    pub const FREE_INDEX: u32 = u32::MAX - 1;

    /// Largest index usable by a real variable.
    pub const MAX_INDEX: u32 = u32::MAX - 2;

    /// Creates a variable with the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index` collides with one of the reserved indices.
    pub fn new(index: u32) -> Self {
        assert!(index <= Self::MAX_INDEX, "Variable index {} is reserved", index);
        Var(index)
    }

    /// Returns the raw variable index.
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Returns the variable index as a `usize` for array indexing.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl From<u32> for Var {
    fn from(index: u32) -> Self {
        Var::new(index)
    }
}

impl From<Var> for u32 {
    fn from(var: Var) -> Self {
        var.0
    }
}

/// A level in the variable ordering (0-indexed).
///
/// # Invariants
///
/// - Level 0 is the topmost level (closest to the roots)
/// - Levels increase downward toward the terminals
/// - After reordering, the same variable may occupy a different level
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Level(usize);

impl Level {
    /// Pseudo-level of terminal nodes: below every variable level.
    pub const TERMINAL: Level = Level(usize::MAX);

    pub const fn new(index: usize) -> Self {
        Level(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }

    /// Returns the level immediately below this one.
    pub fn next(self) -> Self {
        Level(self.0 + 1)
    }

    /// Returns the level immediately above this one, if any.
    pub fn prev(self) -> Option<Self> {
        if self.0 == 0 {
            None
        } else {
            Some(Level(self.0 - 1))
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::TERMINAL
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_terminal() {
            write!(f, "L⊤")
        } else {
            write!(f, "L{}", self.0)
        }
    }
}

impl From<usize> for Level {
    fn from(index: usize) -> Self {
        Level(index)
    }
}

impl From<Level> for usize {
    fn from(level: Level) -> Self {
        level.0
    }
}

/// A node slot in the manager's arena.
///
/// Only the lower 31 bits are usable since a [`Ref`](crate::reference::Ref)
/// spends one bit on the complement flag.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Largest slot index representable inside a `Ref`.
    pub const MAX: u32 = 0x7FFF_FFFE;

    /// End-of-chain marker for intrusive collision chains and the free list.
    pub const INVALID: NodeId = NodeId(0x7FFF_FFFF);

    pub const fn new(index: u32) -> Self {
        NodeId(index)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "@{}", self.0)
        } else {
            write!(f, "@-")
        }
    }
}

impl From<u32> for NodeId {
    fn from(index: u32) -> Self {
        NodeId::new(index)
    }
}

impl From<NodeId> for usize {
    fn from(id: NodeId) -> Self {
        id.0 as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_roundtrip() {
        let v = Var::new(7);
        assert_eq!(v.id(), 7);
        assert_eq!(v.index(), 7);
        assert_eq!(u32::from(v), 7);
        assert_eq!(format!("{}", v), "x7");
    }

    #[test]
    #[should_panic]
    fn test_var_const_index_rejected() {
        let _ = Var::new(Var::CONST_INDEX);
    }

    #[test]
    fn test_level_navigation() {
        let l = Level::new(3);
        assert_eq!(l.next(), Level::new(4));
        assert_eq!(l.prev(), Some(Level::new(2)));
        assert_eq!(Level::new(0).prev(), None);
        assert!(Level::new(0) < Level::TERMINAL);
        assert!(Level::TERMINAL.is_terminal());
    }

    #[test]
    fn test_node_id_sentinel() {
        assert!(NodeId::new(0).is_valid());
        assert!(!NodeId::INVALID.is_valid());
        assert_eq!(format!("{}", NodeId::new(12)), "@12");
    }
}
