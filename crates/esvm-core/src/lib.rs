//! # esvm-core
//!
//! The embeddable execution engine: a tagged `Value` representation, a
//! mark-and-sweep heap, three-part property-storage objects, and the
//! register-based bytecode executor that consumes a compiled
//! [`esvm_bytecode::Module`].
//!
//! ## Design Principles
//!
//! - **No parser, no compiler**: this crate only runs bytecode a separate
//!   compiler already produced.
//! - **Functions are objects**: there is no `Value::Function` variant;
//!   a callable is an ordinary object whose [`object::FunctionData`]
//!   payload is compiled, native, or bound.
//! - **Register-based**: matches `esvm-bytecode`'s instruction format.
//! - **Single-threaded per isolate**: every type here is `!Send`/`!Sync`
//!   by construction (see `isolate.rs`).

#![warn(clippy::all)]

pub mod context;
pub mod convert;
pub mod error;
pub mod gc;
pub mod interpreter;
pub mod isolate;
pub mod object;
pub mod string;
pub mod thread;
pub mod value;

pub use context::{NativeContext, VmContext};
pub use convert::{FromValue, IntoValue};
pub use error::{ErrorKind, ThrownValue, VmError, VmResult};
pub use gc::GcRef;
pub use interpreter::{call, run_module};
pub use isolate::{Isolate, IsolateConfig};
pub use object::{
    FunctionData, JsObject, ObjectClass, PropertyAttributes, PropertyDescriptor, PropertyKey,
    PropertyValue,
};
pub use string::{JsString, StringTable};
pub use thread::{CallFrame, Catcher, CatcherKind, IteratorResult, Thread, ThreadStatus};
pub use value::{HostPointer, JsBuffer, NativeFn, UpvalueCell, Value};
