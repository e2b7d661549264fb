//! Error types.

use std::fmt;

/// Errors reported by the public API.
///
/// The two categories are kept distinct: running out of memory can happen on
/// any call that creates nodes, while an invalid argument is a usage error
/// detected before any work is done.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum DdError {
    /// The node pool is exhausted and every fallback reserve has been spent,
    /// or the configured memory budget would be exceeded.
    OutOfMemory,
    /// A caller contract that is cheap to check was violated.
    InvalidArgument(String),
}

impl DdError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        DdError::InvalidArgument(msg.into())
    }
}

impl fmt::Display for DdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DdError::OutOfMemory => f.write_str("decision diagram operation ran out of memory"),
            DdError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for DdError {}

impl From<DdError> for std::io::Error {
    fn from(err: DdError) -> Self {
        match err {
            DdError::OutOfMemory => std::io::ErrorKind::OutOfMemory.into(),
            DdError::InvalidArgument(msg) => std::io::Error::new(std::io::ErrorKind::InvalidInput, msg),
        }
    }
}

/// Internal unwinding signal of the recursive procedures.
///
/// `Reordered` never escapes the crate: the public entry points catch it and
/// restart the whole operation from the caller's (still valid) roots.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) enum Abort {
    OutOfMemory,
    Reordered,
}

pub type Result<T, E = DdError> = std::result::Result<T, E>;

/// Outcome of an internal step that may have to unwind.
pub(crate) type Step<T> = std::result::Result<T, Abort>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(DdError::OutOfMemory.to_string(), "decision diagram operation ran out of memory");
        assert_eq!(
            DdError::invalid("cube expected").to_string(),
            "invalid argument: cube expected"
        );
    }

    #[test]
    fn test_io_conversion_keeps_category() {
        let oom: std::io::Error = DdError::OutOfMemory.into();
        assert_eq!(oom.kind(), std::io::ErrorKind::OutOfMemory);
        let inv: std::io::Error = DdError::invalid("x").into();
        assert_eq!(inv.kind(), std::io::ErrorKind::InvalidInput);
    }
}
