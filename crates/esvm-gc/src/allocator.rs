//! Allocation trigger policy (spec section 4.2).
//!
//! Rust's global allocator aborts the process on out-of-memory rather than
//! returning a recoverable error from `Rc::new`/`Box::new`, so the source's
//! "alloc fails, run GC, retry up to K times, last attempt emergency-mode"
//! ladder has no literal counterpart for raw allocation failure. What
//! carries over is the *policy*: proactively collecting once the heap has
//! grown by its configured trigger amount, and escalating to an emergency
//! (finalizer-suppressing, compaction-skipping) collection if the heap is
//! still over budget immediately afterward.

use std::rc::Rc;

use crate::heap::{CollectionStats, EmergencyFlags, Heap, Traceable};

/// Runs `Heap::collect` under the source's retry policy: a normal
/// collection first, then up to `config().max_retries - 1` additional
/// emergency collections if the registry is still over the configured
/// trigger size afterward.
///
/// Returns the stats of the last collection actually run.
pub fn collect_with_retry(heap: &Heap, roots: &[Rc<dyn Traceable>]) -> CollectionStats {
    let mut stats = heap.collect(roots, EmergencyFlags::default());
    let mut attempt = 1;
    while heap.registry_len() >= heap.config().allocation_trigger && attempt < heap.config().max_retries {
        stats = heap.collect(
            roots,
            EmergencyFlags {
                skip_compact: false,
                suppress_finalizers: true,
            },
        );
        attempt += 1;
    }
    stats
}

/// Allocates a new GC-participating value, registering it with the heap and
/// triggering a collection first if the heap is over its allocation budget.
///
/// This is the "heap-relative alloc" of spec section 4.2: unlike the raw
/// allocator, it is permitted to run a full collection before handing back
/// the new value.
pub fn alloc<T: Traceable + 'static>(heap: &Heap, roots: &[Rc<dyn Traceable>], make: impl FnOnce() -> T) -> Rc<T> {
    if heap.should_collect() {
        collect_with_retry(heap, roots);
    }
    let value = Rc::new(make());
    heap.register(&value);
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::GcConfig;
    use crate::object::{GcHeader, HeapTag};

    #[derive(Debug)]
    struct Leaf(GcHeader);

    impl Traceable for Leaf {
        fn header(&self) -> &GcHeader {
            &self.0
        }
        fn trace(&self, _visit: &mut dyn FnMut(Rc<dyn Traceable>)) {}
    }

    #[test]
    fn alloc_triggers_collection_at_budget() {
        let heap = Heap::new(GcConfig {
            allocation_trigger: 1,
            max_retries: 2,
        });
        let _a = alloc(&heap, &[], || Leaf(GcHeader::new(HeapTag::Object)));
        assert_eq!(heap.collection_count(), 0);
        // Dropping `_a` releases it immediately via Rc, so the next alloc's
        // pre-collection finds nothing left to free.
        drop(_a);
        let _b = alloc(&heap, &[], || Leaf(GcHeader::new(HeapTag::Object)));
        assert_eq!(heap.collection_count(), 1);
    }
}
