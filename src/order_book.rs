//! Order Book - one side of one symbol, as a CAS-linked sorted list.
//!
//! A book is a singly linked sequence of arena indices ordered by strict
//! price priority (bids descending, asks ascending), ties broken by arrival
//! (first arrival nearer the head). There is no book-wide lock: the head and
//! every forward link are [`AtomicSlot`]s, and insertion commits with exactly
//! one CAS.
//!
//! ## Insertion protocol
//!
//! 1. Walk the list from head into a local snapshot. Walking a local copy
//!    avoids following links that another thread is rewriting mid-traversal,
//!    at the cost of a full re-scan per retry.
//! 2. Pick the target link from the snapshot: the head slot if the new order
//!    outranks the current head, otherwise the first predecessor whose
//!    successor the new order outranks (or the tail).
//! 3. Re-verify the target link still holds what the snapshot saw, point the
//!    new order at that successor, and CAS the link. Any failure means a
//!    concurrent insert or unlink got there first: back off and retry from
//!    step 1.
//!
//! Retries are bounded. When the budget runs out, a small number of forced
//! attempts install the order at the head unconditionally - forward progress
//! is bought by giving up strict price position for that one order (it is
//! still present and still matchable, just possibly out of rank). This is the
//! venue's single documented ordering compromise; callers who prefer strict
//! ordering can set `forced_attempts` to zero and handle
//! [`InsertExhausted`] instead.
//!
//! ## Unlink protocol
//!
//! Only a retired head (final fill fully committed) is ever unlinked, and the
//! unlink is two steps: first CAS the departing order's forward link to
//! [`SEALED_INDEX`], then CAS the head slot past it. Sealing first closes a
//! lost-insert race: an inserter holding a stale snapshot that still names
//! the departing order as predecessor would otherwise link a new order
//! behind it *after* the head has moved on, stranding the new order outside
//! the chain. Against a sealed link that CAS fails and the inserter retries
//! from the live head. If the head CAS then loses (a better order was pushed
//! in front mid-unlink), the link is unsealed and the unlink retried later.

use thiserror::Error;
use tracing::warn;

use crate::arena::OrderArena;
use crate::events::{OrderView, Side};
use crate::retry::RetryPolicy;
use crate::slot::{AtomicSlot, OrderIndex, NULL_INDEX, SEALED_INDEX};

/// Where an accepted order ended up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertPosition {
    /// Installed at its correct price-time position
    Ordered,
    /// Installed at the head by the fallback, possibly out of price rank
    ForcedHead,
}

/// Both the retry budget and the forced-attempt budget ran out.
///
/// The order is not in the book and the book is unchanged.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
#[error("insertion retries exhausted under contention")]
pub struct InsertExhausted;

/// One price-ordered side of a symbol's book.
#[derive(Debug)]
pub struct OrderBook {
    head: AtomicSlot,
    side: Side,
}

impl OrderBook {
    /// Create an empty book for the given side.
    pub const fn new(side: Side) -> Self {
        Self {
            head: AtomicSlot::empty(),
            side,
        }
    }

    /// Which side this book holds.
    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Current head index (`NULL_INDEX` when empty).
    #[inline]
    pub fn head(&self) -> OrderIndex {
        self.head.get()
    }

    /// Returns true if no order is linked.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    /// Strict priority comparison: does price `a` beat price `b` on this
    /// side? Equal prices never outrank each other, which is what preserves
    /// arrival order among ties.
    #[inline]
    fn outranks(&self, a: u64, b: u64) -> bool {
        match self.side {
            Side::Bid => a > b,
            Side::Ask => a < b,
        }
    }

    /// Link an allocated order into the book at its price-time position.
    ///
    /// The caller guarantees the order was validated (positive price and
    /// quantity) and is not yet visible to any book. On success the order is
    /// published; the position tells the caller whether the fallback fired.
    pub fn insert(
        &self,
        arena: &OrderArena,
        index: OrderIndex,
        policy: &RetryPolicy,
    ) -> Result<InsertPosition, InsertExhausted> {
        let price = arena.get(index).price();

        for attempt in 0..policy.max_insert_retries {
            if self.try_insert_once(arena, index, price) {
                return Ok(InsertPosition::Ordered);
            }
            policy.sleep_backoff(attempt + 1);
        }

        // Retry budget gone: force the order in at the head, re-reading the
        // head fresh each attempt. Ordering may be violated; the order is
        // never silently dropped once past validation.
        for _ in 0..policy.forced_attempts {
            let head = self.head.get();
            arena.get(index).next().set(head);
            if self.head.compare_and_set(head, index) {
                warn!(
                    side = ?self.side,
                    order_id = arena.get(index).id(),
                    "forced head insertion after retry budget exhausted"
                );
                return Ok(InsertPosition::ForcedHead);
            }
            if !policy.forced_pause.is_zero() {
                std::thread::sleep(policy.forced_pause);
            }
        }

        Err(InsertExhausted)
    }

    /// One optimistic attempt: snapshot, locate, single CAS.
    fn try_insert_once(&self, arena: &OrderArena, index: OrderIndex, price: u64) -> bool {
        // Step 1: snapshot the list as of one walk. A sealed link means the
        // node ahead is being unlinked; everything past it is reachable from
        // the new head, so the walk stops and the re-verify below catches
        // any stale pick.
        let head = self.head.get();
        let mut snapshot = Vec::new();
        let mut cursor = head;
        while cursor != NULL_INDEX && cursor != SEALED_INDEX {
            snapshot.push(cursor);
            cursor = arena.get(cursor).next().get();
        }

        // Step 2a: head position - empty book, or the new order strictly
        // outranks the current head.
        if snapshot.is_empty() || self.outranks(price, arena.get(head).price()) {
            arena.get(index).next().set(head);
            return self.head.compare_and_set(head, index);
        }

        // Step 2b: first adjacent pair the new order slots between, or the
        // tail. Equal prices are passed over, keeping arrival order.
        for (i, &prev_idx) in snapshot.iter().enumerate() {
            let successor = snapshot.get(i + 1).copied().unwrap_or(NULL_INDEX);
            if successor != NULL_INDEX && !self.outranks(price, arena.get(successor).price()) {
                continue;
            }

            let prev = arena.get(prev_idx);
            // The link may have moved since the snapshot walk; a stale
            // expected value would splice into the wrong place.
            if prev.next().get() != successor {
                return false;
            }
            arena.get(index).next().set(successor);
            return prev.next().compare_and_set(successor, index);
        }

        // Unreachable: the tail pair always accepts.
        false
    }

    /// Best-effort ordered view of the live orders in this book.
    ///
    /// Fully filled orders that have not been unlinked yet are skipped; they
    /// are logically gone. Under concurrent mutation the walk reflects some
    /// recent state, not a linearizable cut.
    pub fn snapshot(&self, arena: &OrderArena) -> Vec<OrderView> {
        let mut views = Vec::new();
        let mut cursor = self.head.get();
        while cursor != NULL_INDEX && cursor != SEALED_INDEX {
            let record = arena.get(cursor);
            let remaining = record.remaining();
            if remaining > 0 {
                views.push(OrderView {
                    id: record.id(),
                    price: record.price(),
                    remaining,
                    original: record.original(),
                });
            }
            cursor = record.next().get();
        }
        views
    }

    /// Advance the head past a retired order. Best effort: failure just
    /// means another thread moved the head (or owns this unlink) first.
    ///
    /// The departing order's forward link is sealed before the head moves,
    /// so an insert racing with a stale snapshot cannot splice a new order
    /// in behind a node that is leaving the chain.
    pub(crate) fn unlink_head(&self, arena: &OrderArena, expected: OrderIndex) -> bool {
        let link = arena.get(expected).next();
        let next = link.get();
        if next == SEALED_INDEX {
            return false; // another unlinker owns this head
        }
        if !link.compare_and_set(next, SEALED_INDEX) {
            return false; // successor changed under us; re-read and retry
        }
        if self.head.compare_and_set(expected, next) {
            return true;
        }
        // A better order was pushed in front mid-unlink. Unseal so the
        // chain stays walkable; the node is still linked and the next pass
        // will unlink it once it is back at the head.
        link.set(next);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn book_with_arena(side: Side, cap: u32) -> (OrderArena, OrderBook) {
        (OrderArena::new(cap), OrderBook::new(side))
    }

    fn insert(arena: &OrderArena, book: &OrderBook, id: u64, price: u64, qty: u64) -> InsertPosition {
        let idx = arena.alloc(id, price, qty).unwrap();
        book.insert(arena, idx, &RetryPolicy::spinning()).unwrap()
    }

    fn prices(arena: &OrderArena, book: &OrderBook) -> Vec<u64> {
        book.snapshot(arena).iter().map(|v| v.price).collect()
    }

    fn ids(arena: &OrderArena, book: &OrderBook) -> Vec<u64> {
        book.snapshot(arena).iter().map(|v| v.id).collect()
    }

    #[test]
    fn test_bids_sorted_descending() {
        let (arena, book) = book_with_arena(Side::Bid, 10);
        insert(&arena, &book, 1, 1_000_000, 10);
        insert(&arena, &book, 2, 3_000_000, 10);
        insert(&arena, &book, 3, 2_000_000, 10);

        assert_eq!(prices(&arena, &book), vec![3_000_000, 2_000_000, 1_000_000]);
    }

    #[test]
    fn test_asks_sorted_ascending() {
        let (arena, book) = book_with_arena(Side::Ask, 10);
        insert(&arena, &book, 1, 2_000_000, 10);
        insert(&arena, &book, 2, 1_000_000, 10);
        insert(&arena, &book, 3, 3_000_000, 10);

        assert_eq!(prices(&arena, &book), vec![1_000_000, 2_000_000, 3_000_000]);
    }

    #[test]
    fn test_equal_prices_keep_arrival_order() {
        let (arena, book) = book_with_arena(Side::Bid, 10);
        insert(&arena, &book, 1, 2_000_000, 10);
        insert(&arena, &book, 2, 2_000_000, 10);
        insert(&arena, &book, 3, 2_000_000, 10);
        insert(&arena, &book, 4, 3_000_000, 10); // outranks all three

        assert_eq!(ids(&arena, &book), vec![4, 1, 2, 3]);
    }

    #[test]
    fn test_insert_into_empty_book() {
        let (arena, book) = book_with_arena(Side::Ask, 10);
        assert!(book.is_empty());
        insert(&arena, &book, 1, 1_500_000, 5);
        assert!(!book.is_empty());
        assert_eq!(ids(&arena, &book), vec![1]);
    }

    #[test]
    fn test_forced_fallback_keeps_order_present() {
        let (arena, book) = book_with_arena(Side::Bid, 10);
        insert(&arena, &book, 1, 3_000_000, 10);
        insert(&arena, &book, 2, 1_000_000, 10);

        // No ordered attempts at all: the fallback must still land the order.
        let policy = RetryPolicy {
            max_insert_retries: 0,
            ..RetryPolicy::spinning()
        };
        let idx = arena.alloc(3, 2_000_000, 10).unwrap();
        let position = book.insert(&arena, idx, &policy).unwrap();

        assert_eq!(position, InsertPosition::ForcedHead);
        // Present at the head even though rank says it belongs in the middle.
        assert_eq!(ids(&arena, &book), vec![3, 1, 2]);
    }

    #[test]
    fn test_exhausted_when_no_budget_at_all() {
        let (arena, book) = book_with_arena(Side::Bid, 10);
        let policy = RetryPolicy {
            max_insert_retries: 0,
            forced_attempts: 0,
            ..RetryPolicy::spinning()
        };
        let idx = arena.alloc(1, 1_000_000, 10).unwrap();
        assert_eq!(book.insert(&arena, idx, &policy), Err(InsertExhausted));
        assert!(book.is_empty());
    }

    #[test]
    fn test_snapshot_skips_filled_orders() {
        let (arena, book) = book_with_arena(Side::Ask, 10);
        insert(&arena, &book, 1, 1_000_000, 10);
        insert(&arena, &book, 2, 2_000_000, 10);

        // Fill the head without unlinking it
        let head = arena.get(book.head());
        assert!(head.consume(10, 10));

        assert_eq!(ids(&arena, &book), vec![2]);
    }

    #[test]
    fn test_unlink_seals_link_against_late_splice() {
        let (arena, book) = book_with_arena(Side::Bid, 10);
        let a = arena.alloc(1, 3_000_000, 10).unwrap();
        book.insert(&arena, a, &RetryPolicy::spinning()).unwrap();
        let b = arena.alloc(2, 2_000_000, 10).unwrap();
        book.insert(&arena, b, &RetryPolicy::spinning()).unwrap();

        // Head fully fills and is unlinked.
        assert!(arena.get(a).consume(10, 10));
        arena.get(a).retire();
        assert!(book.unlink_head(&arena, a));
        assert_eq!(book.head(), b);

        // An inserter that snapshotted [a, b] before the unlink would try
        // to splice between them. The sealed link rejects the CAS, forcing
        // it back to a fresh walk from the live head.
        let x = arena.alloc(3, 2_500_000, 10).unwrap();
        assert_eq!(arena.get(a).next().get(), SEALED_INDEX);
        assert!(!arena.get(a).next().compare_and_set(b, x));

        // The retried insert lands reachable from the head.
        book.insert(&arena, x, &RetryPolicy::spinning()).unwrap();
        assert_eq!(ids(&arena, &book), vec![3, 2]);
    }

    #[test]
    fn test_unlink_unseals_when_head_moves_first() {
        let (arena, book) = book_with_arena(Side::Bid, 10);
        let a = arena.alloc(1, 2_000_000, 10).unwrap();
        book.insert(&arena, a, &RetryPolicy::spinning()).unwrap();
        let b = arena.alloc(2, 1_000_000, 10).unwrap();
        book.insert(&arena, b, &RetryPolicy::spinning()).unwrap();

        assert!(arena.get(a).consume(10, 10));
        arena.get(a).retire();

        // A better bid lands in front before the unlink's head CAS.
        let c = arena.alloc(3, 3_000_000, 10).unwrap();
        book.insert(&arena, c, &RetryPolicy::spinning()).unwrap();

        // The unlink backs off and the link is unsealed, so the chain
        // stays fully walkable.
        assert!(!book.unlink_head(&arena, a));
        assert_eq!(arena.get(a).next().get(), b);
        assert_eq!(ids(&arena, &book), vec![3, 2]);
    }

    #[test]
    fn test_concurrent_inserts_stay_sorted() {
        let arena = Arc::new(OrderArena::new(4_000));
        let book = Arc::new(OrderBook::new(Side::Bid));

        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let arena = Arc::clone(&arena);
                let book = Arc::clone(&book);
                std::thread::spawn(move || {
                    // Generous budget: this test asserts the sorted-book
                    // property, which only holds while the fallback stays
                    // quiet.
                    let policy = RetryPolicy {
                        max_insert_retries: 1_000_000,
                        ..RetryPolicy::spinning()
                    };
                    for i in 0..1_000u64 {
                        let id = t * 1_000 + i;
                        let price = 1_000_000 + (id % 97) * 10_000;
                        let idx = arena.alloc(id, price, 10).unwrap();
                        let pos = book.insert(&arena, idx, &policy).unwrap();
                        assert_eq!(pos, InsertPosition::Ordered, "fallback must not fire");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let views = book.snapshot(&arena);
        assert_eq!(views.len(), 4_000);
        for pair in views.windows(2) {
            assert!(pair[0].price >= pair[1].price, "bid book out of order");
        }
        let mut seen = std::collections::HashSet::new();
        for v in &views {
            assert!(seen.insert(v.id), "order {} appears twice", v.id);
        }
    }
}
