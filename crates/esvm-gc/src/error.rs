//! Errors surfaced by the heap and collector.

use thiserror::Error;

/// Errors that can occur while allocating or collecting.
#[derive(Debug, Error)]
pub enum GcError {
    /// The heap could not satisfy an allocation even after the configured
    /// number of collection retries.
    #[error("out of memory after {0} collection attempts")]
    OutOfMemory(u32),
}

/// Result type for fallible `esvm-gc` operations.
pub type Result<T> = std::result::Result<T, GcError>;
