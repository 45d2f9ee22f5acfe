//! The process-wide heap: the registry of live heap values and the
//! allocation trigger policy that decides when to run a collection.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::object::GcHeader;

/// Anything a collection cycle can trace and, if confirmed to be garbage
/// kept alive only by a reference cycle, finalize and release.
///
/// `esvm-core`'s `JsString`, `JsObject`, and buffer types all implement this.
/// Ordinary (acyclic) lifetime is handled by `Rc`'s own strong count — this
/// trait exists only for the cycle-breaking mark-and-sweep pass described in
/// spec section 4.11.
pub trait Traceable: std::fmt::Debug {
    /// The GC header embedded in this value.
    fn header(&self) -> &GcHeader;

    /// Invokes `visit` once for every heap value this one directly holds a
    /// strong reference to.
    fn trace(&self, visit: &mut dyn FnMut(Rc<dyn Traceable>));

    /// Runs this value's finalizer, if it has one (a script-visible
    /// `_finalizer` own property on an object, for instance). Called at most
    /// once per value; the collector guarantees this by checking
    /// `GcHeader::is_finalized` first.
    fn run_finalizer(&self) {}

    /// Clears this value's internal strong references so that, once this is
    /// the last thing holding them, a confirmed-unreachable cycle actually
    /// drops and frees. Called only after `run_finalizer`, and only if the
    /// value is still unreachable afterward.
    fn break_cycle(&self) {}
}

/// A heap-allocated value, reference-counted like every other script value.
///
/// This implementation backs heap references with `Rc` rather than a
/// hand-rolled refcount field (see spec section 3.2): ordinary "refcount
/// reaches zero -> free immediately" behavior (section 4.12) is simply
/// `Rc`'s own `Drop`. The collector in `mark_sweep` exists only to find and
/// break reference cycles that `Rc` alone can never collect.
pub type GcRef<T> = Rc<T>;

/// GC tuning parameters (spec section 4.2/4.11 trigger policy).
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Number of heap-value allocations between automatic collections.
    pub allocation_trigger: usize,
    /// Maximum number of back-to-back collection attempts on allocation
    /// pressure before giving up (spec's allocator retry ladder; see
    /// `DESIGN.md` for why this only governs trigger policy and not raw
    /// allocation failure, which Rust's global allocator does not expose as
    /// a recoverable error).
    pub max_retries: u32,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            allocation_trigger: 16 * 1024,
            max_retries: 3,
        }
    }
}

/// Flags that make a collection cycle skip optional work, mirroring the
/// source's emergency-mode bits used when allocation is still failing after
/// a normal collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmergencyFlags {
    /// Skip shrinking the registry's backing storage.
    pub skip_compact: bool,
    /// Skip running finalizers this cycle (deferred to the next one).
    pub suppress_finalizers: bool,
}

/// Outcome of one `Heap::collect` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStats {
    /// Values visited while marking.
    pub marked: usize,
    /// Values whose finalizer ran this cycle.
    pub finalized: usize,
    /// Values actually released this cycle (cycle broken or finalized twice).
    pub freed: usize,
}

/// The process-wide heap.
///
/// Holds the registry used by the cycle collector and the allocation
/// counters that decide when to run one. `Heap` is intentionally neither
/// `Send` nor `Sync`: spec section 5 requires exactly one OS thread to drive
/// a given heap, and `Rc`/`RefCell`/`Cell` enforce that at compile time
/// rather than leaving it as a documented-only rule.
pub struct Heap {
    registry: RefCell<Vec<Weak<dyn Traceable>>>,
    config: GcConfig,
    allocations_since_gc: Cell<usize>,
    collection_count: Cell<u64>,
}

impl Heap {
    /// Creates a new, empty heap with the given configuration.
    pub fn new(config: GcConfig) -> Self {
        Self {
            registry: RefCell::new(Vec::new()),
            config,
            allocations_since_gc: Cell::new(0),
            collection_count: Cell::new(0),
        }
    }

    /// The heap's tuning configuration.
    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Registers a freshly allocated heap value so the cycle collector can
    /// find it later. Every constructor of a GC-participating type must call
    /// this exactly once.
    pub fn register<T: Traceable + 'static>(&self, value: &GcRef<T>) {
        let weak: Weak<dyn Traceable> = Rc::downgrade(value) as Weak<dyn Traceable>;
        self.registry.borrow_mut().push(weak);
        let count = self.allocations_since_gc.get() + 1;
        self.allocations_since_gc.set(count);
    }

    /// True when the allocation counter has crossed the configured trigger
    /// and a collection should be run before continuing.
    pub fn should_collect(&self) -> bool {
        self.allocations_since_gc.get() >= self.config.allocation_trigger
    }

    /// Number of completed collection cycles.
    pub fn collection_count(&self) -> u64 {
        self.collection_count.get()
    }

    /// Number of live entries currently tracked in the registry (includes
    /// entries whose value has already been dropped and not yet pruned).
    pub fn registry_len(&self) -> usize {
        self.registry.borrow().len()
    }

    pub(crate) fn registry(&self) -> &RefCell<Vec<Weak<dyn Traceable>>> {
        &self.registry
    }

    pub(crate) fn note_collection(&self) {
        self.allocations_since_gc.set(0);
        self.collection_count.set(self.collection_count.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Leaf(GcHeader);

    impl Traceable for Leaf {
        fn header(&self) -> &GcHeader {
            &self.0
        }
        fn trace(&self, _visit: &mut dyn FnMut(Rc<dyn Traceable>)) {}
    }

    #[test]
    fn register_tracks_allocations() {
        let heap = Heap::new(GcConfig {
            allocation_trigger: 2,
            max_retries: 3,
        });
        let a = Rc::new(Leaf(GcHeader::new(crate::object::HeapTag::Object)));
        heap.register(&a);
        assert!(!heap.should_collect());
        let b = Rc::new(Leaf(GcHeader::new(crate::object::HeapTag::Object)));
        heap.register(&b);
        assert!(heap.should_collect());
    }
}
