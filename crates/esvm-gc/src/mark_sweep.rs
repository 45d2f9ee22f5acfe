//! The mark-and-sweep cycle collector (spec section 4.11).
//!
//! Ordinary heap values are released the instant their last `Rc` drops —
//! that is spec section 4.12's refcount-hybrid behavior, and it requires no
//! code here at all. This module exists purely to find and break reference
//! cycles `Rc` can never free on its own, using the same phase structure
//! (mark roots, mark reachable, mark finalizable, sweep, run finalizers)
//! the source collector uses, adapted to an iterative worklist instead of a
//! recursion-capped one: a heap-allocated `VecDeque` has no depth limit, so
//! the source's TEMPROOT-and-rescan dance (needed only to bound native
//! C-stack recursion) has nothing to do here.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::heap::{CollectionStats, EmergencyFlags, Heap, Traceable};
use crate::object::bump_mark_version;

impl Heap {
    /// Runs one full collection cycle.
    ///
    /// `roots` must include everything the embedder considers a GC root:
    /// the current thread, the global object, the built-in string table
    /// entries that are heap values, and any value referenced from the
    /// pending unwind/error state (spec section 4.11 phases 1-2). Objects
    /// already queued for refcount-driven finalization are ordinary `Rc`
    /// owners by the time they reach here, so they need no separate root
    /// list: they are reachable from `roots` or they are not.
    pub fn collect(&self, roots: &[Rc<dyn Traceable>], emergency: EmergencyFlags) -> CollectionStats {
        bump_mark_version();

        // Phases 1-3: mark roots, then mark everything transitively
        // reachable from them. A plain FIFO worklist replaces the source's
        // recursion-capped marker; there is no stack depth to exhaust.
        let mut worklist: VecDeque<Rc<dyn Traceable>> = VecDeque::new();
        for root in roots {
            if !root.header().is_marked() {
                root.header().mark();
                worklist.push_back(root.clone());
            }
        }
        let mut marked = worklist.len();
        while let Some(obj) = worklist.pop_front() {
            obj.trace(&mut |child| {
                if !child.header().is_marked() {
                    child.header().mark();
                    marked += 1;
                    worklist.push_back(child);
                }
            });
        }

        // Phase 4-6: sweep the registry. A dead Weak means the value was
        // already freed by ordinary Rc::drop (the refcount-hybrid path,
        // spec 4.12) and needs no action. A live-but-unmarked value is
        // either garbage kept alive only by a cycle, or an object whose
        // finalizer ran on a previous cycle and is still unreachable — in
        // which case it is freed for real now by breaking its cycle.
        let mut to_finalize = Vec::new();
        let mut freed = 0usize;
        self.registry().borrow_mut().retain(|weak| match weak.upgrade() {
            None => false,
            Some(obj) => {
                if obj.header().is_marked() {
                    true
                } else if obj.header().is_finalized() {
                    if !emergency.suppress_finalizers {
                        obj.break_cycle();
                        freed += 1;
                        false
                    } else {
                        true
                    }
                } else {
                    obj.header().set_finalizable(true);
                    to_finalize.push(obj);
                    true
                }
            }
        });

        // Phase 9 (run before compaction here since compaction is a
        // storage-shrinking step with no observable script effect, so its
        // relative order versus finalizers is not load-bearing): run each
        // newly-finalizable value's finalizer exactly once. The object
        // graph is still fully intact at this point because nothing was
        // freed or had its cycle broken yet.
        let finalized = to_finalize.len();
        if !emergency.suppress_finalizers {
            for obj in to_finalize {
                obj.run_finalizer();
                obj.header().set_finalized();
            }
        }

        // Phase 7: compact the registry's own storage (emergency-only
        // concept in the source; here it is cheap enough to always do
        // unless explicitly suppressed).
        if !emergency.skip_compact {
            self.registry().borrow_mut().shrink_to_fit();
        }

        self.note_collection();
        CollectionStats {
            marked,
            finalized,
            freed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::GcConfig;
    use crate::object::{GcHeader, HeapTag};
    use std::cell::{Cell, RefCell};

    #[derive(Debug)]
    struct Node {
        header: GcHeader,
        link: RefCell<Option<Rc<Node>>>,
        finalized: Rc<Cell<bool>>,
    }

    impl Traceable for Node {
        fn header(&self) -> &GcHeader {
            &self.header
        }
        fn trace(&self, visit: &mut dyn FnMut(Rc<dyn Traceable>)) {
            if let Some(link) = self.link.borrow().as_ref() {
                visit(link.clone() as Rc<dyn Traceable>);
            }
        }
        fn run_finalizer(&self) {
            self.finalized.set(true);
        }
        fn break_cycle(&self) {
            *self.link.borrow_mut() = None;
        }
    }

    #[test]
    fn reachable_survives_two_cycles() {
        let heap = Heap::new(GcConfig::default());
        let fin = Rc::new(Cell::new(false));
        let node = Rc::new(Node {
            header: GcHeader::new(HeapTag::Object),
            link: RefCell::new(None),
            finalized: fin.clone(),
        });
        heap.register(&node);
        let roots: Vec<Rc<dyn Traceable>> = vec![node.clone() as Rc<dyn Traceable>];
        heap.collect(&roots, EmergencyFlags::default());
        assert!(!fin.get());
        assert_eq!(heap.registry_len(), 1);
    }

    #[test]
    fn cycle_is_finalized_then_freed() {
        let heap = Heap::new(GcConfig::default());
        let fin_a = Rc::new(Cell::new(false));
        let fin_b = Rc::new(Cell::new(false));
        let a = Rc::new(Node {
            header: GcHeader::new(HeapTag::Object),
            link: RefCell::new(None),
            finalized: fin_a.clone(),
        });
        let b = Rc::new(Node {
            header: GcHeader::new(HeapTag::Object),
            link: RefCell::new(Some(a.clone())),
            finalized: fin_b.clone(),
        });
        *a.link.borrow_mut() = Some(b.clone());
        heap.register(&a);
        heap.register(&b);
        drop(a);
        drop(b);

        // First cycle: nothing is rooted, so both are unreachable but still
        // alive via their mutual references; finalizers run, nothing freed.
        let stats1 = heap.collect(&[], EmergencyFlags::default());
        assert_eq!(stats1.finalized, 2);
        assert_eq!(stats1.freed, 0);
        assert!(fin_a.get() && fin_b.get());

        // Second cycle: still unreachable and already finalized, so the
        // cycle is broken and both entries are freed.
        let stats2 = heap.collect(&[], EmergencyFlags::default());
        assert_eq!(stats2.freed, 2);
        assert_eq!(heap.registry_len(), 0);
    }
}
