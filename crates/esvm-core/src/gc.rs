//! Thin re-export layer over `esvm-gc`'s `Rc`-backed heap.
//!
//! `JsObject` and `JsBuffer` both implement `esvm_gc::Traceable` and can
//! hold outgoing references to other heap values, so every constructor
//! site registers the fresh `Rc` with the owning `Isolate`'s
//! `esvm_gc::Heap` right after allocating it (`ctx.heap.register(&obj)`),
//! putting it in the cycle collector's sweep. `JsString` also implements
//! `Traceable` but its `trace` is a no-op — a string holds no outgoing
//! references, so it can never be part of a cycle, only ever kept alive
//! by one; it is managed purely by `Rc`'s own refcount via the intern
//! table in `string.rs` and is not registered with `Heap`.

pub use esvm_gc::{CollectionStats, EmergencyFlags, GcConfig, GcRef, Heap, Traceable};
