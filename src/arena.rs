//! Order arena - pre-allocated storage addressed by stable indices.
//!
//! All orders live in one contiguous slab allocated at venue start. An order
//! is referred to everywhere (book heads, forward links, handles) by its
//! `u32` slot index, never by address.
//!
//! ## Why indices are never recycled
//!
//! A CAS-linked structure that frees and reuses nodes is exposed to the ABA
//! problem: a slot can be observed holding X, freed, reallocated for a new
//! order, and a stale CAS expecting X still succeeds against the impostor.
//! This arena closes that hole by construction - allocation is a bump
//! counter and slots are never returned. A fully filled order is simply
//! unlinked and its slot goes dead. The cost is a hard capacity ceiling,
//! surfaced to submitters as a rejection rather than a silent drop.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::slot::{AtomicSlot, OrderIndex, NULL_INDEX, SEALED_INDEX};

/// One order's storage slot.
///
/// `id`, `price` and `original` are written exactly once, during allocation,
/// before the order is published into any book; the CAS that links the order
/// makes them visible to every reader that traverses to it. Only `remaining`,
/// `retired` and `next` mutate afterwards, and only through CAS (plus the
/// matcher's compensating restore).
///
/// `remaining == 0` alone does not mean the order is done: a matcher that
/// has committed one leg of a trade but not yet the other leaves the order
/// at a *transient* zero, and may restore the quantity if its second leg
/// loses. Only the `retired` flag, set once the final fill has fully
/// committed, makes the zero permanent and the order safe to unlink.
#[derive(Debug)]
pub struct OrderRecord {
    id: AtomicU64,
    price: AtomicU64,
    original: AtomicU64,
    remaining: AtomicU64,
    retired: AtomicBool,
    next: AtomicSlot,
}

impl OrderRecord {
    const fn vacant() -> Self {
        Self {
            id: AtomicU64::new(0),
            price: AtomicU64::new(0),
            original: AtomicU64::new(0),
            remaining: AtomicU64::new(0),
            retired: AtomicBool::new(false),
            next: AtomicSlot::empty(),
        }
    }

    /// Order id (globally unique, monotonically assigned).
    #[inline]
    pub fn id(&self) -> u64 {
        self.id.load(Ordering::Relaxed)
    }

    /// Limit price in integer ticks. Immutable after allocation.
    #[inline]
    pub fn price(&self) -> u64 {
        self.price.load(Ordering::Relaxed)
    }

    /// Quantity the order was submitted with. Immutable after allocation.
    #[inline]
    pub fn original(&self) -> u64 {
        self.original.load(Ordering::Relaxed)
    }

    /// Unfilled quantity. Zero means fully filled and logically removed.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::SeqCst)
    }

    /// Forward link to the next order in this order's book.
    #[inline]
    pub fn next(&self) -> &AtomicSlot {
        &self.next
    }

    /// Returns true once the order has no quantity left. This may be a
    /// transient state; see [`OrderRecord::is_retired`].
    #[inline]
    pub fn is_filled(&self) -> bool {
        self.remaining() == 0
    }

    /// Mark the order permanently done. Called by the matcher that committed
    /// the final fill, after both legs of that match have landed; from this
    /// point the zero remaining can never be restored and the order may be
    /// unlinked from its book.
    #[inline]
    pub fn retire(&self) {
        debug_assert!(self.is_filled(), "retiring an order with live quantity");
        self.retired.store(true, Ordering::SeqCst);
    }

    /// Returns true once the final fill has fully committed.
    #[inline]
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    /// Consume `amount` from the remaining quantity iff it still equals
    /// `expected` (the matcher's snapshot). Returns false without touching
    /// anything if a concurrent matcher got there first.
    #[inline]
    pub fn consume(&self, expected: u64, amount: u64) -> bool {
        debug_assert!(amount > 0 && amount <= expected, "over-consume");
        self.remaining
            .compare_exchange(expected, expected - amount, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Give back quantity taken by a half-committed match whose other leg
    /// lost its CAS. Never exceeds the original quantity.
    #[inline]
    pub fn restore(&self, amount: u64) {
        let prior = self.remaining.fetch_add(amount, Ordering::SeqCst);
        debug_assert!(prior + amount <= self.original(), "restore past original");
    }
}

/// Pre-allocated order slab with atomic bump allocation.
///
/// `alloc` is wait-free: one `fetch_add` claims a slot, field stores
/// initialize it, and the caller publishes it by linking it into a book.
pub struct OrderArena {
    records: Box<[OrderRecord]>,
    next_free: AtomicU32,
}

impl OrderArena {
    /// Create an arena with room for `capacity` orders.
    ///
    /// # Panics
    /// Panics if capacity reaches `SEALED_INDEX` (it and `NULL_INDEX` are
    /// reserved as sentinels).
    pub fn new(capacity: u32) -> Self {
        assert!(capacity < SEALED_INDEX, "capacity must stay below the sentinel indices");
        let records = (0..capacity).map(|_| OrderRecord::vacant()).collect();
        Self {
            records,
            next_free: AtomicU32::new(0),
        }
    }

    /// Claim and initialize a slot for a new order.
    ///
    /// Returns `None` when the arena is out of slots. The returned index is
    /// not yet visible to any book; the caller publishes it via
    /// [`crate::order_book::OrderBook::insert`].
    pub fn alloc(&self, id: u64, price: u64, quantity: u64) -> Option<OrderIndex> {
        let index = self.next_free.fetch_add(1, Ordering::SeqCst);
        if index as usize >= self.records.len() {
            // Park the counter at capacity so it cannot wrap after ~4B
            // failed submissions.
            self.next_free.store(self.records.len() as u32, Ordering::SeqCst);
            return None;
        }

        let record = &self.records[index as usize];
        record.id.store(id, Ordering::Relaxed);
        record.price.store(price, Ordering::Relaxed);
        record.original.store(quantity, Ordering::Relaxed);
        record.remaining.store(quantity, Ordering::SeqCst);
        record.retired.store(false, Ordering::SeqCst);
        record.next.set(NULL_INDEX);
        Some(index)
    }

    /// Direct slot access.
    #[inline]
    pub fn get(&self, index: OrderIndex) -> &OrderRecord {
        debug_assert!((index as usize) < self.records.len(), "index out of bounds");
        &self.records[index as usize]
    }

    /// Number of slots claimed so far.
    #[inline]
    pub fn allocated(&self) -> u32 {
        self.next_free
            .load(Ordering::SeqCst)
            .min(self.records.len() as u32)
    }

    /// Total slot capacity.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.records.len() as u32
    }

    /// Returns true when no slots remain.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.allocated() == self.capacity()
    }
}

impl std::fmt::Debug for OrderArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderArena")
            .field("capacity", &self.capacity())
            .field("allocated", &self.allocated())
            .finish()
    }
}
