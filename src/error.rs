//! Error types

use ::std::collections::TryReserveError;

/// Errors returned by the fallible [`BlockVec`](crate::BlockVec) operations
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BlockVecError {
  /// An element was requested at or past the end of the `BlockVec`.
  #[error("index is out of bounds, index: {index}, len: {len}")]
  IndexOutOfBounds { index: usize, len: usize },

  /// `front`, `back`, or `pop_back` was called on an empty `BlockVec`.
  #[error("no elements in the BlockVec")]
  Empty,

  /// The requested length does not fit in a `usize`.
  #[error("capacity would exceed maximum: {max_len}")]
  CapacityOverflow { max_len: usize },

  /// The allocator could not provide a new block.
  #[error("failed to allocate a block of {capacity} elements")]
  AllocationFailed {
    capacity: usize,
    #[source]
    source: TryReserveError,
  },
}

/// Result alias for `BlockVec` operations.
pub type Result<T> = ::core::result::Result<T, BlockVecError>;
