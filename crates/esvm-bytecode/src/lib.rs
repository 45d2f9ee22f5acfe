//! Bytecode template format consumed by the esvm interpreter core.
//!
//! This crate defines the wire shape an external compiler produces and
//! `esvm-core` consumes: opcodes, the decoded [`instruction::Instruction`]
//! representation, the constant pool, function templates, and the module
//! container that bundles them together (spec section 6.4). No compiler
//! lives here — only the format it must emit.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod constant;
pub mod error;
pub mod function;
pub mod instruction;
pub mod module;
pub mod operand;

pub use constant::{Constant, ConstantPool};
pub use error::{BytecodeError, Result};
pub use function::{Function, FunctionBuilder, FunctionFlags, SourceMap, UpvalueCapture};
pub use instruction::{Instruction, Opcode};
pub use module::Module;
pub use operand::{ConstantIndex, FunctionIndex, JumpOffset, LocalIndex, Register};

/// Bytecode format version. Bumped whenever [`Module::to_bytes`]'s payload
/// shape changes in a way that breaks older readers.
pub const BYTECODE_VERSION: u32 = 1;

/// Magic bytes at the start of every serialized module.
pub const BYTECODE_MAGIC: [u8; 8] = *b"ESVMBC\0\0";
