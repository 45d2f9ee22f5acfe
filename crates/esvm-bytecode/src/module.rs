//! Bytecode module format: the template an external compiler hands the
//! engine (spec section 6.4).

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::constant::ConstantPool;
use crate::error::{BytecodeError, Result};
use crate::function::Function;
use crate::{BYTECODE_MAGIC, BYTECODE_VERSION};

/// A compiled bytecode module: one source file's worth of function
/// templates plus the constant pool they share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// Source URL/path, used in stack traces.
    pub source_url: String,
    /// Constant pool shared across every function in this module.
    pub constants: ConstantPool,
    /// Functions defined in this module; index 0 need not be the entry
    /// point, so `entry_point` names it explicitly.
    pub functions: Vec<Function>,
    /// Index into `functions` of the top-level program function.
    pub entry_point: u32,
    /// Original source text, kept only when the compiler was asked to
    /// retain it for debugging (`_source` in spec section 6.4).
    pub source: Option<String>,
}

impl Module {
    /// Starts building a module for the given source URL.
    pub fn builder(source_url: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder::new(source_url)
    }

    /// Serializes the module to its on-disk byte format: magic, version,
    /// length-prefixed JSON payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&BYTECODE_MAGIC);
        bytes.extend_from_slice(&BYTECODE_VERSION.to_le_bytes());
        let data = serde_json::to_vec(self).map_err(BytecodeError::from_serde)?;
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&data);
        Ok(bytes)
    }

    /// Deserializes a module from bytes produced by [`Module::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 16 {
            return Err(BytecodeError::UnexpectedEnd);
        }
        if bytes[0..8] != BYTECODE_MAGIC {
            return Err(BytecodeError::InvalidMagic);
        }
        let version = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        if version != BYTECODE_VERSION {
            return Err(BytecodeError::UnsupportedVersion(version));
        }
        let data_len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
        if bytes.len() < 16 + data_len {
            return Err(BytecodeError::UnexpectedEnd);
        }
        let mut module: Module =
            serde_json::from_slice(&bytes[16..16 + data_len]).map_err(BytecodeError::from_serde)?;
        module.constants.rebuild_dedup_index();
        Ok(module)
    }

    /// Writes the module's serialized form to a writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes()?)?;
        Ok(())
    }

    /// Reads a module's serialized form from a reader.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    /// The module's entry point function.
    pub fn entry_function(&self) -> Option<&Function> {
        self.functions.get(self.entry_point as usize)
    }

    /// Looks up a function by index.
    pub fn function(&self, index: u32) -> Option<&Function> {
        self.functions.get(index as usize)
    }
}

/// Builder for [`Module`].
#[derive(Debug)]
pub struct ModuleBuilder {
    source_url: String,
    constants: ConstantPool,
    functions: Vec<Function>,
    entry_point: u32,
    source: Option<String>,
}

impl ModuleBuilder {
    /// Creates a new builder for the given source URL.
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            constants: ConstantPool::new(),
            functions: Vec::new(),
            entry_point: 0,
            source: None,
        }
    }

    /// Replaces the constant pool wholesale.
    pub fn constants(mut self, constants: ConstantPool) -> Self {
        self.constants = constants;
        self
    }

    /// Mutable access to the constant pool being built.
    pub fn constants_mut(&mut self) -> &mut ConstantPool {
        &mut self.constants
    }

    /// Adds a function, returning its index.
    pub fn add_function(&mut self, function: Function) -> u32 {
        let idx = self.functions.len() as u32;
        self.functions.push(function);
        idx
    }

    /// Sets the entry point function index.
    pub fn entry_point(mut self, index: u32) -> Self {
        self.entry_point = index;
        self
    }

    /// Retains the original source text for debugging.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Builds the module.
    pub fn build(self) -> Module {
        Module {
            source_url: self.source_url,
            constants: self.constants,
            functions: self.functions,
            entry_point: self.entry_point,
            source: self.source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;
    use crate::operand::Register;

    #[test]
    fn module_roundtrip() {
        let mut builder = Module::builder("test.js");
        builder.constants_mut().add_string("hello");
        builder.constants_mut().add_number(42.0);

        let func = Function::builder()
            .name("main")
            .instruction(Instruction::LoadTrue { dst: Register(0) })
            .instruction(Instruction::Return { src: Register(0) })
            .build();
        builder.add_function(func);

        let module = builder.build();
        let bytes = module.to_bytes().unwrap();
        let restored = Module::from_bytes(&bytes).unwrap();

        assert_eq!(restored.source_url, "test.js");
        assert_eq!(restored.constants.len(), 2);
        assert_eq!(restored.functions.len(), 1);
    }

    #[test]
    fn invalid_magic_rejected() {
        let bytes = b"INVALID\0........";
        let result = Module::from_bytes(bytes);
        assert!(matches!(result, Err(BytecodeError::InvalidMagic)));
    }

    #[test]
    fn truncated_input_rejected() {
        let bytes = b"short";
        let result = Module::from_bytes(bytes);
        assert!(matches!(result, Err(BytecodeError::UnexpectedEnd)));
    }
}
