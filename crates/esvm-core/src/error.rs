//! VM error types (spec section 6.3's error kinds, plus the thrown-value
//! wrapper used to propagate a script exception out through `Result`).

use thiserror::Error;

use crate::value::Value;

/// The coarse error kind reported across the host API boundary.
///
/// `Error`/`EvalError`/`RangeError`/`ReferenceError`/`SyntaxError`/
/// `TypeError`/`UriError` mirror ES5.1's native error constructors
/// (section 15.11). The remainder are host/engine-internal: they never
/// correspond to a constructible script-visible error object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    EvalError,
    RangeError,
    ReferenceError,
    SyntaxError,
    TypeError,
    UriError,
    /// An opcode or builtin the host chose not to link in.
    UnimplementedError,
    /// A bug in the engine itself, not a script-level fault.
    InternalError,
    /// Allocation failed (heap at its configured limit, or the host
    /// allocator returned null).
    AllocError,
    /// An invariant the engine checks at a safepoint was violated.
    AssertionError,
    /// The host API was called in a way its contract forbids (wrong
    /// stack shape, wrong value kind at a given index, etc).
    ApiError,
    /// A script exception reached the top of the call stack unhandled.
    UncaughtError,
}

/// VM execution errors.
#[derive(Debug, Error)]
pub enum VmError {
    #[error("TypeError: {0}")]
    TypeError(String),

    #[error("ReferenceError: {0}")]
    ReferenceError(String),

    #[error("RangeError: {0}")]
    RangeError(String),

    #[error("SyntaxError: {0}")]
    SyntaxError(String),

    #[error("EvalError: {0}")]
    EvalError(String),

    #[error("URIError: {0}")]
    UriError(String),

    #[error("InternalError: {0}")]
    InternalError(String),

    /// A bytecode form the interpreter recognizes but has no handler for
    /// (e.g. an opcode reserved for a feature this build excludes).
    #[error("not implemented: {0}")]
    Unimplemented(String),

    #[error("allocation failed: {0}")]
    AllocError(String),

    #[error("assertion failed: {0}")]
    AssertionError(String),

    #[error("host API misuse: {0}")]
    ApiError(String),

    #[error("RangeError: Maximum call stack size exceeded")]
    StackOverflow,

    #[error("OutOfMemory")]
    OutOfMemory,

    /// A thrown JS exception that has propagated out of script execution.
    #[error("Uncaught exception: {0}")]
    Exception(Box<ThrownValue>),

    #[error("Bytecode error: {0}")]
    Bytecode(#[from] esvm_bytecode::BytecodeError),

    /// Execution was interrupted (host-requested cancellation).
    #[error("Execution interrupted")]
    Interrupted,
}

/// A thrown JavaScript value, carrying enough context to report a stack
/// trace back through the host API.
#[derive(Debug)]
pub struct ThrownValue {
    pub value: Value,
    pub message: String,
    pub stack: Vec<StackFrame>,
}

impl std::fmt::Display for ThrownValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// One frame of a captured error stack trace.
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub function_name: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl VmError {
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    pub fn reference_error(msg: impl Into<String>) -> Self {
        Self::ReferenceError(msg.into())
    }

    pub fn range_error(msg: impl Into<String>) -> Self {
        Self::RangeError(msg.into())
    }

    pub fn syntax_error(msg: impl Into<String>) -> Self {
        Self::SyntaxError(msg.into())
    }

    pub fn eval_error(msg: impl Into<String>) -> Self {
        Self::EvalError(msg.into())
    }

    pub fn uri_error(msg: impl Into<String>) -> Self {
        Self::UriError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    pub fn unimplemented(msg: impl Into<String>) -> Self {
        Self::Unimplemented(msg.into())
    }

    pub fn alloc_error(msg: impl Into<String>) -> Self {
        Self::AllocError(msg.into())
    }

    pub fn assertion_failed(msg: impl Into<String>) -> Self {
        Self::AssertionError(msg.into())
    }

    pub fn api_error(msg: impl Into<String>) -> Self {
        Self::ApiError(msg.into())
    }

    pub fn interrupted() -> Self {
        Self::Interrupted
    }

    /// Wraps a thrown script value, deriving a display message from it.
    pub fn exception(value: Value) -> Self {
        let message = if let Some(s) = value.as_string() {
            s.as_str().to_string()
        } else {
            format!("{:?}", value)
        };
        Self::Exception(Box::new(ThrownValue {
            message,
            value,
            stack: Vec::new(),
        }))
    }

    /// The coarse kind reported at the host API boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VmError::TypeError(_) => ErrorKind::TypeError,
            VmError::ReferenceError(_) => ErrorKind::ReferenceError,
            VmError::RangeError(_) | VmError::StackOverflow => ErrorKind::RangeError,
            VmError::SyntaxError(_) | VmError::Bytecode(_) => ErrorKind::SyntaxError,
            VmError::EvalError(_) => ErrorKind::EvalError,
            VmError::UriError(_) => ErrorKind::UriError,
            VmError::InternalError(_) | VmError::Interrupted => ErrorKind::InternalError,
            VmError::Unimplemented(_) => ErrorKind::UnimplementedError,
            VmError::AllocError(_) | VmError::OutOfMemory => ErrorKind::AllocError,
            VmError::AssertionError(_) => ErrorKind::AssertionError,
            VmError::ApiError(_) => ErrorKind::ApiError,
            VmError::Exception(_) => ErrorKind::UncaughtError,
        }
    }
}

impl From<String> for VmError {
    fn from(s: String) -> Self {
        VmError::type_error(s)
    }
}

impl From<&str> for VmError {
    fn from(s: &str) -> Self {
        VmError::type_error(s)
    }
}

/// Result type for VM operations.
pub type VmResult<T> = Result<T, VmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_maps_native_error_constructors() {
        assert_eq!(VmError::type_error("x").kind(), ErrorKind::TypeError);
        assert_eq!(VmError::range_error("x").kind(), ErrorKind::RangeError);
        assert_eq!(VmError::StackOverflow.kind(), ErrorKind::RangeError);
    }

    #[test]
    fn exception_kind_is_uncaught() {
        let err = VmError::exception(Value::number(1.0));
        assert_eq!(err.kind(), ErrorKind::UncaughtError);
    }

    #[test]
    fn string_conversion_yields_type_error() {
        let err: VmError = "bad input".into();
        assert!(matches!(err, VmError::TypeError(_)));
    }
}
