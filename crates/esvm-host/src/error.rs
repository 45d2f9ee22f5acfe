//! Host-facing error kinds (spec section 6.3): the subset of
//! [`esvm_core::ErrorKind`] a host application branches on, plus the
//! API-misuse kinds (`StackUnderflow`, `InvalidIndex`, `StackOverflow`)
//! that only ever originate on this side of the boundary.

use thiserror::Error;

/// Errors the host API surfaces directly, distinct from a thrown script
/// exception (which arrives as [`esvm_core::VmError::Exception`] and is
/// reported to the host as `HostError::Script`).
#[derive(Debug, Error)]
pub enum HostError {
    #[error("stack index {0} is out of range")]
    InvalidIndex(i32),
    #[error("not enough values on the stack: requested {requested}, have {available}")]
    StackUnderflow { requested: usize, available: usize },
    #[error("stack would exceed its maximum size of {max} slots")]
    StackOverflow { max: usize },
    #[error("{0}")]
    Script(#[from] esvm_core::VmError),
    #[error("value at index {0} is not a {1}")]
    TypeMismatch(i32, &'static str),
}

pub type HostResult<T> = Result<T, HostError>;
