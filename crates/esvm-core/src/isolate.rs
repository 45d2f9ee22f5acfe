//! An independent VM execution environment.
//!
//! The source's `Isolate` is `Send`-but-not-`Sync`, entered via an RAII
//! guard that installs thread-locals, with a separate `IsolateHandle`
//! carrying `Arc<AtomicBool>` flags so another OS thread can request
//! interruption. None of that applies here: `esvm_gc::Heap` and `GcRef`
//! (a plain `Rc`) are `!Send`/`!Sync` by construction, so an `Isolate`
//! can never cross a thread boundary in the first place, and there is
//! only ever one caller talking to it. See `DESIGN.md` for this drop.

use std::rc::Rc;

use crate::context::VmContext;
use crate::object::{JsObject, ObjectClass};
use crate::string::StringTable;

/// Tuning knobs for a new [`Isolate`].
#[derive(Debug, Clone)]
pub struct IsolateConfig {
    /// Maximum number of nested script call frames before a `RangeError`
    /// ("Maximum call stack size exceeded") is thrown.
    pub max_stack_depth: usize,
    /// Maximum nesting of native (host) calls re-entering the engine.
    pub max_native_depth: usize,
    /// Number of heap allocations between automatic collections.
    pub gc_allocation_trigger: usize,
    /// Whether top-level code runs in strict mode by default.
    pub strict_mode: bool,
}

impl Default for IsolateConfig {
    fn default() -> Self {
        Self {
            max_stack_depth: 10_000,
            max_native_depth: 1_000,
            gc_allocation_trigger: 10_000,
            strict_mode: false,
        }
    }
}

/// One VM: a heap, an interned-string table, and the execution context
/// (global object plus the current thread).
pub struct Isolate {
    pub config: IsolateConfig,
    pub heap: Rc<esvm_gc::Heap>,
    pub strings: StringTable,
    pub context: VmContext,
}

impl Isolate {
    pub fn new(config: IsolateConfig) -> Self {
        let heap = Rc::new(esvm_gc::Heap::new(esvm_gc::GcConfig {
            allocation_trigger: config.gc_allocation_trigger,
            ..esvm_gc::GcConfig::default()
        }));
        let global = Rc::new(JsObject::with_class(None, ObjectClass::Ordinary));
        heap.register(&global);
        let context = VmContext::new(global, heap.clone());
        Self {
            config,
            heap,
            strings: StringTable::new(),
            context,
        }
    }

    /// Runs a mark-and-sweep collection if the allocation trigger has been
    /// crossed; returns `true` if a collection actually ran.
    pub fn collect_if_needed(&self) -> bool {
        if self.heap.should_collect() {
            self.collect_garbage();
            true
        } else {
            false
        }
    }

    /// Forces a mark-and-sweep collection now, regardless of the trigger.
    pub fn collect_garbage(&self) -> esvm_gc::CollectionStats {
        let mut roots: Vec<Rc<dyn esvm_gc::Traceable>> =
            vec![self.context.global.clone() as Rc<dyn esvm_gc::Traceable>];
        self.context
            .main_thread()
            .borrow()
            .trace(&mut |r| roots.push(r));
        let current = self.context.current_thread();
        if !Rc::ptr_eq(&current, &self.context.main_thread()) {
            current.borrow().trace(&mut |r| roots.push(r));
        }
        self.heap.collect(&roots, esvm_gc::EmergencyFlags::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_isolate_has_an_empty_global_on_the_main_thread() {
        let isolate = Isolate::new(IsolateConfig::default());
        assert!(isolate.context.is_main_thread_current());
        assert_eq!(isolate.context.global.own_keys().len(), 0);
    }

    #[test]
    fn collect_garbage_runs_without_panicking_on_a_fresh_isolate() {
        let isolate = Isolate::new(IsolateConfig::default());
        let stats = isolate.collect_garbage();
        assert_eq!(stats.freed, 0);
    }
}
