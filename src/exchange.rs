//! Exchange - the venue facade.
//!
//! Owns the order arena, the symbol registry and the retry policy, and
//! exposes the whole API surface: `submit`, `drain`, `drain_all` and
//! `snapshot`. Validation lives here (not in the books): a non-positive
//! price or quantity is rejected before any slot is claimed or any book is
//! touched.
//!
//! Every method takes `&self`; the venue is meant to be shared across
//! submitter and drainer threads behind an `Arc` with no outer lock.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::arena::OrderArena;
use crate::events::{BookSnapshot, MatchReport, OrderHandle, Side, SubmitError};
use crate::matching;
use crate::order_book::InsertPosition;
use crate::registry::SymbolRegistry;
use crate::retry::RetryPolicy;

/// A multi-symbol, lock-free limit-order matching venue.
pub struct Exchange {
    arena: OrderArena,
    registry: SymbolRegistry,
    policy: RetryPolicy,
    next_order_id: AtomicU64,
    forced_inserts: AtomicU64,
}

impl Exchange {
    /// Create a venue with room for `capacity` orders and the default
    /// retry policy.
    pub fn new(capacity: u32) -> Self {
        Self::with_policy(capacity, RetryPolicy::default())
    }

    /// Create a venue with an explicit retry policy.
    pub fn with_policy(capacity: u32, policy: RetryPolicy) -> Self {
        Self {
            arena: OrderArena::new(capacity),
            registry: SymbolRegistry::new(),
            policy,
            next_order_id: AtomicU64::new(1),
            forced_inserts: AtomicU64::new(0),
        }
    }

    /// Submit a limit order.
    ///
    /// Validates, claims an arena slot, resolves the symbol's books
    /// (creating them on first sight of the symbol) and links the order at
    /// its price-time position. Submission never matches by itself; crosses
    /// happen when some thread drains the symbol.
    pub fn submit(
        &self,
        symbol: &str,
        side: Side,
        quantity: u64,
        price: u64,
    ) -> Result<OrderHandle, SubmitError> {
        if quantity == 0 {
            return Err(SubmitError::InvalidQuantity);
        }
        if price == 0 {
            return Err(SubmitError::InvalidPrice);
        }

        let entry = self.registry.get_or_create(symbol);
        let id = self.next_order_id.fetch_add(1, Ordering::Relaxed);
        let index = self
            .arena
            .alloc(id, price, quantity)
            .ok_or(SubmitError::CapacityExhausted)?;

        match entry.book(side).insert(&self.arena, index, &self.policy) {
            Ok(InsertPosition::Ordered) => {}
            Ok(InsertPosition::ForcedHead) => {
                self.forced_inserts.fetch_add(1, Ordering::Relaxed);
            }
            // The claimed slot stays dead; it was never linked anywhere.
            Err(_) => return Err(SubmitError::InsertionExhausted),
        }

        debug!(symbol, ?side, quantity, price, order_id = id, "order accepted");
        Ok(OrderHandle {
            id,
            side,
            price,
            quantity,
            index,
        })
    }

    /// Drain all crossable quantity for one symbol.
    ///
    /// A symbol never seen by `submit` yields an empty report.
    pub fn drain(&self, symbol: &str) -> MatchReport {
        match self.registry.lookup(symbol) {
            Some(entry) => matching::drain(
                &self.arena,
                entry.bids(),
                entry.asks(),
                entry.symbol(),
                &self.policy,
            ),
            None => MatchReport::default(),
        }
    }

    /// Drain every registered symbol, in registry order.
    pub fn drain_all(&self) -> MatchReport {
        let mut report = MatchReport::default();
        self.registry.for_each(|entry| {
            report.merge(matching::drain(
                &self.arena,
                entry.bids(),
                entry.asks(),
                entry.symbol(),
                &self.policy,
            ));
        });
        report
    }

    /// Best-effort diagnostic view of one symbol's books.
    pub fn snapshot(&self, symbol: &str) -> Option<BookSnapshot> {
        let entry = self.registry.lookup(symbol)?;
        Some(BookSnapshot {
            symbol: entry.symbol().to_owned(),
            bids: entry.bids().snapshot(&self.arena),
            asks: entry.asks().snapshot(&self.arena),
        })
    }

    /// Unfilled quantity of a submitted order.
    pub fn remaining(&self, handle: &OrderHandle) -> u64 {
        self.arena.get(handle.index).remaining()
    }

    /// Number of symbols the venue has seen.
    pub fn symbol_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of order slots claimed so far.
    pub fn order_count(&self) -> u32 {
        self.arena.allocated()
    }

    /// Total arena capacity.
    pub fn capacity(&self) -> u32 {
        self.arena.capacity()
    }

    /// How many inserts landed through the forced-head fallback.
    ///
    /// Non-zero means the sorted-book guarantee may have been weakened for
    /// that many orders (they are present, their position is unspecified).
    pub fn forced_inserts(&self) -> u64 {
        self.forced_inserts.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("symbols", &self.symbol_count())
            .field("orders", &self.order_count())
            .field("capacity", &self.capacity())
            .field("forced_inserts", &self.forced_inserts())
            .finish()
    }
}
