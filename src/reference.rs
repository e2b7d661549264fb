use std::fmt::{Display, Formatter};
use std::ops::Neg;

use crate::types::NodeId;

/// An edge to a decision-diagram node, possibly complemented.
///
/// Uses a 32-bit representation where the least significant bit is the
/// complement flag and the remaining bits store the node slot. Equality on
/// `Ref` is pointer equality, which canonicity turns into semantic equality.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Ref(u32);

impl Ref {
    /// Sentinel value for an invalid/uninitialized edge.
    pub const INVALID: Self = Self(0xFFFF_FFFF);

    /// Creates a new edge to `id`, complemented when `negated` is set.
    pub const fn new(id: NodeId, negated: bool) -> Self {
        Self((id.raw() << 1) | (negated as u32))
    }

    /// Creates a regular (non-complemented) edge.
    pub const fn positive(id: NodeId) -> Self {
        Self::new(id, false)
    }

    /// Creates a complemented edge.
    pub const fn negative(id: NodeId) -> Self {
        Self::new(id, true)
    }

    /// Returns the node slot this edge points to.
    #[inline]
    pub const fn id(self) -> NodeId {
        NodeId::new(self.0 >> 1)
    }

    /// Returns true if this edge is complemented.
    #[inline]
    pub const fn is_negated(self) -> bool {
        (self.0 & 1) != 0
    }

    /// Returns the regular (non-complemented) version of this edge.
    #[inline]
    pub const fn regular(self) -> Self {
        Self(self.0 & !1)
    }

    /// Complements the edge when `cond` holds.
    #[inline]
    pub const fn negate_if(self, cond: bool) -> Self {
        Self(self.0 ^ (cond as u32))
    }

    /// Returns the raw underlying value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl Default for Ref {
    fn default() -> Self {
        Self::INVALID
    }
}

// -Ref
impl Neg for Ref {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(self.0 ^ 1)
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_negated() {
            write!(f, "~{}", self.id())
        } else {
            write!(f, "{}", self.id())
        }
    }
}
