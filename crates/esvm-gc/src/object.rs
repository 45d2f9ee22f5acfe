//! The heap object header shared by every garbage-collected value.

use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};

/// Global mark version counter.
///
/// Bumped once per mark-and-sweep cycle instead of walking every live header
/// to reset it to white. A header is "white" (unmarked) whenever its own
/// `mark_version` no longer matches this counter, which gives an O(1) phase
/// reset at the cost of one global load per mark check.
static MARK_VERSION: AtomicU32 = AtomicU32::new(0);

/// Returns the mark version stamped by the most recently started collection.
#[inline]
pub fn current_mark_version() -> u32 {
    MARK_VERSION.load(Ordering::Acquire)
}

/// Starts a new collection cycle, invalidating every header's mark in O(1).
#[inline]
pub fn bump_mark_version() -> u32 {
    MARK_VERSION.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
}

/// Coarse type discriminant stored in the header's low bits (spec "type" field).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapTag {
    /// Interned string.
    String = 0,
    /// Ordinary object (including arrays, functions, threads, arguments).
    Object = 1,
    /// Fixed or dynamic byte buffer.
    Buffer = 2,
}

bitflags::bitflags! {
    /// The 6 GC flag bits from the header's flag word.
    ///
    /// Only these bits are interpreted by `esvm-gc`; the remaining
    /// type-specific flag bits live in each heap type's own flags field
    /// (`esvm-core`'s `ObjectFlags`, for instance) rather than here, matching
    /// the spec's header/user-flags split.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GcFlags: u8 {
        /// Reachable from a root in the current mark phase.
        const REACHABLE    = 0b0000_0001;
        /// Pushed back onto the mark worklist after hitting a depth cap.
        ///
        /// Unused by this implementation's iterative marker (see
        /// `mark_sweep::mark_all`), kept only so a header's flag word has a
        /// stable bit position if an embedder wants to inspect it.
        const TEMPROOT     = 0b0000_0010;
        /// Reachable only via a garbage cycle; queued to run its finalizer
        /// before the cycle is broken.
        const FINALIZABLE  = 0b0000_0100;
        /// Finalizer has already run once; do not run it again.
        const FINALIZED    = 0b0000_1000;
    }
}

/// Header embedded at the front of every heap-allocated value.
///
/// Carries the spec's type tag and GC flag bits. The refcount itself is not
/// stored here: this implementation backs script-visible references with
/// `Arc`, so ordinary refcounting is Rust's own `Arc` strong count rather
/// than a hand-rolled counter (see `DESIGN.md`). The mark/tag bits that the
/// cycle collector needs remain explicit because `Arc` has no mark bit of
/// its own.
#[derive(Debug)]
pub struct GcHeader {
    tag: HeapTag,
    flags: Cell<GcFlags>,
    mark_version: Cell<u32>,
}

impl GcHeader {
    /// Creates a fresh, unmarked header for a value of the given type.
    pub const fn new(tag: HeapTag) -> Self {
        Self {
            tag,
            flags: Cell::new(GcFlags::empty()),
            mark_version: Cell::new(0),
        }
    }

    /// The value's coarse heap type.
    pub fn tag(&self) -> HeapTag {
        self.tag
    }

    /// True if this header was marked reachable during the current cycle.
    #[inline]
    pub fn is_marked(&self) -> bool {
        self.mark_version.get() == current_mark_version() && self.flags.get().contains(GcFlags::REACHABLE)
    }

    /// Marks this header reachable for the current cycle.
    #[inline]
    pub fn mark(&self) {
        if self.mark_version.get() != current_mark_version() {
            self.flags.set(GcFlags::empty());
        }
        self.mark_version.set(current_mark_version());
        let mut f = self.flags.get();
        f.insert(GcFlags::REACHABLE);
        self.flags.set(f);
    }

    /// Clears the reachable bit without touching the version stamp.
    ///
    /// Used by `mark_sweep` when re-evaluating a header across sweep passes.
    pub fn unmark(&self) {
        let mut f = self.flags.get();
        f.remove(GcFlags::REACHABLE);
        self.flags.set(f);
    }

    /// Reads the finalization-related flags.
    pub fn flags(&self) -> GcFlags {
        self.flags.get()
    }

    /// Sets or clears `FINALIZABLE`.
    pub fn set_finalizable(&self, value: bool) {
        let mut f = self.flags.get();
        f.set(GcFlags::FINALIZABLE, value);
        self.flags.set(f);
    }

    /// Sets `FINALIZED`, marking that the finalizer has already run.
    pub fn set_finalized(&self) {
        let mut f = self.flags.get();
        f.insert(GcFlags::FINALIZED);
        self.flags.set(f);
    }

    /// True once `set_finalized` has been called.
    pub fn is_finalized(&self) -> bool {
        self.flags.get().contains(GcFlags::FINALIZED)
    }
}

impl Clone for GcHeader {
    fn clone(&self) -> Self {
        // A cloned value is a distinct heap entity with fresh GC state.
        Self::new(self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unmarked() {
        let h = GcHeader::new(HeapTag::Object);
        assert!(!h.is_marked());
    }

    #[test]
    fn mark_unmark_roundtrip() {
        let h = GcHeader::new(HeapTag::Object);
        h.mark();
        assert!(h.is_marked());
        h.unmark();
        assert!(!h.is_marked());
    }

    #[test]
    fn version_bump_invalidates_old_marks() {
        let h = GcHeader::new(HeapTag::Object);
        h.mark();
        assert!(h.is_marked());
        bump_mark_version();
        assert!(!h.is_marked());
        h.mark();
        assert!(h.is_marked());
    }

    #[test]
    fn finalizable_flags() {
        let h = GcHeader::new(HeapTag::Object);
        assert!(!h.is_finalized());
        h.set_finalizable(true);
        assert!(h.flags().contains(GcFlags::FINALIZABLE));
        h.set_finalized();
        assert!(h.is_finalized());
    }
}
