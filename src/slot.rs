//! Atomic Slot - the single synchronization primitive of the venue.
//!
//! Every mutable pointer-like field in the book structures (book head,
//! order forward-link) is an `AtomicSlot`: a compare-and-swap cell holding
//! an arena index. There is no lock anywhere on the hot path; all mutation
//! goes through `compare_and_set`, and callers retry from a fresh read when
//! it fails.
//!
//! ## Identity, not equality
//!
//! `compare_and_set` compares the stored *index*, never the order it points
//! to. Two orders with identical price and quantity are still distinct
//! slots. Because the arena never recycles an index (see [`crate::arena`]),
//! index equality is object identity and the classic ABA trap cannot occur:
//! an expected value can only match if the structure genuinely still holds
//! the same order.

use std::sync::atomic::{AtomicU32, Ordering};

/// Sentinel index representing an empty slot (like a null pointer)
pub const NULL_INDEX: u32 = u32::MAX;

/// Sentinel stored in a departing head's forward link while it is being
/// unlinked from a book. A CAS that expected a real successor fails against
/// it, so nothing can be spliced in behind an order that is leaving the
/// chain. Walkers treat it like the end of the list.
pub const SEALED_INDEX: u32 = u32::MAX - 1;

/// Type alias for arena indices - our "compressed pointers".
/// Using u32 instead of 64-bit pointers keeps nodes small and lets the
/// links live in a single `AtomicU32`.
pub type OrderIndex = u32;

/// A CAS cell over an [`OrderIndex`].
///
/// All operations are total (no blocking) and use sequentially consistent
/// ordering. SeqCst is sufficient here: the insertion and matching protocols
/// re-validate after every failed CAS, so no weaker ordering is needed for
/// correctness and the stronger one keeps the protocols easy to reason about.
#[derive(Debug)]
pub struct AtomicSlot(AtomicU32);

impl AtomicSlot {
    /// Create an empty slot (holds `NULL_INDEX`).
    #[inline]
    pub const fn empty() -> Self {
        Self(AtomicU32::new(NULL_INDEX))
    }

    /// Create a slot holding `index`.
    #[inline]
    pub const fn new(index: OrderIndex) -> Self {
        Self(AtomicU32::new(index))
    }

    /// Read the current index.
    #[inline]
    pub fn get(&self) -> OrderIndex {
        self.0.load(Ordering::SeqCst)
    }

    /// Unconditionally publish `index`.
    #[inline]
    pub fn set(&self, index: OrderIndex) {
        self.0.store(index, Ordering::SeqCst);
    }

    /// Publish `new` iff the slot still holds `expected`.
    ///
    /// Returns `true` on success. On failure the slot is untouched and the
    /// caller is expected to re-read and retry.
    #[inline]
    pub fn compare_and_set(&self, expected: OrderIndex, new: OrderIndex) -> bool {
        self.0
            .compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Returns true if the slot is empty.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.get() == NULL_INDEX
    }
}

impl Default for AtomicSlot {
    fn default() -> Self {
        Self::empty()
    }
}
