//! Bytecode errors

use thiserror::Error;

/// Errors that can occur during bytecode operations
#[derive(Debug, Error)]
pub enum BytecodeError {
    /// Invalid magic bytes in bytecode file
    #[error("Invalid magic bytes")]
    InvalidMagic,

    /// Unsupported bytecode version
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u32),

    /// Invalid opcode
    #[error("Invalid opcode: {0}")]
    InvalidOpcode(u8),

    /// Invalid operand
    #[error("Invalid operand at offset {0}")]
    InvalidOperand(usize),

    /// Unexpected end of bytecode
    #[error("Unexpected end of bytecode")]
    UnexpectedEnd,

    /// IO error during serialization
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON payload inside an otherwise well-formed module.
    #[error("malformed module payload: {0}")]
    Malformed(String),
}

impl BytecodeError {
    pub(crate) fn from_serde(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// Result type for bytecode operations
pub type Result<T> = std::result::Result<T, BytecodeError>;
