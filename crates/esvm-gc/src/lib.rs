//! Heap allocator, string-table support, and the hybrid refcount /
//! mark-and-sweep collector that backs `esvm-core`'s value representation.
//!
//! ## Design
//!
//! - **Ordinary lifetime**: an `Rc` strong count. A heap value is freed the
//!   instant its last owner drops it, exactly like spec section 4.12's
//!   refcount-hybrid behavior, with no bookkeeping required from this crate.
//! - **Cycles**: the [`mark_sweep`] module finds and breaks reference
//!   cycles `Rc` cannot collect on its own, via an explicit worklist over
//!   the [`heap::Traceable`] trait.
//! - **Allocation policy**: [`allocator`] decides when to run a collection
//!   and with what emergency flags, following spec section 4.2.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod allocator;
pub mod error;
pub mod heap;
pub mod mark_sweep;
pub mod object;

pub use error::{GcError, Result};
pub use heap::{CollectionStats, EmergencyFlags, GcConfig, GcRef, Heap, Traceable};
pub use object::{GcHeader, HeapTag};
