//! Public vocabulary of the venue: sides, errors, match events, snapshots.
//!
//! Match events are produced by the matcher and handed to whatever
//! collaborator wants them (log queue, CSV dump, telemetry); the venue never
//! formats or persists them itself.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::slot::OrderIndex;

/// Order side (bid = buy, ask = sell)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    Bid = 0,
    /// Sell side (asks)
    Ask = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

/// Why a submission was rejected.
///
/// Validation failures are reported before any book mutation. The two
/// exhaustion variants are soft failures: the venue is still internally
/// consistent and the caller may resubmit.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitError {
    /// Quantity must be strictly positive
    #[error("invalid quantity: must be greater than zero")]
    InvalidQuantity,
    /// Price must be strictly positive
    #[error("invalid price: must be greater than zero")]
    InvalidPrice,
    /// Both the retry budget and the forced-insertion budget ran out
    #[error("insertion retries exhausted under contention")]
    InsertionExhausted,
    /// The order arena has no free slots left
    #[error("order capacity exhausted")]
    CapacityExhausted,
}

/// Stable handle to a successfully submitted order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderHandle {
    /// Globally unique order id
    pub id: u64,
    /// Side the order rests on
    pub side: Side,
    /// Limit price in ticks
    pub price: u64,
    /// Submitted quantity
    pub quantity: u64,
    pub(crate) index: OrderIndex,
}

/// One executed cross between the best bid and the best ask of a symbol.
///
/// The price is always the resting ask's price: under price-time priority
/// the order that arrived first at its book sets the terms.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchEvent {
    /// Ticker symbol the cross happened on
    pub symbol: String,
    /// Quantity filled on both sides
    pub quantity: u64,
    /// Execution price in ticks (the ask's limit price)
    pub price: u64,
    /// Id of the bid-side order
    pub bid_order_id: u64,
    /// Id of the ask-side order
    pub ask_order_id: u64,
    /// Wall-clock time the match was committed
    pub timestamp: DateTime<Utc>,
}

/// Outcome of one draining pass.
#[derive(Clone, Debug, Default)]
pub struct MatchReport {
    /// Matches committed during the pass, in commit order
    pub events: Vec<MatchEvent>,
    /// True if the pass hit its iteration ceiling and aborted early.
    /// Not fatal - the next drain resumes where this one stopped.
    pub exhausted: bool,
}

impl MatchReport {
    /// Number of matches applied.
    #[inline]
    pub fn matches_applied(&self) -> usize {
        self.events.len()
    }

    /// Total quantity crossed during the pass.
    pub fn total_quantity(&self) -> u64 {
        self.events.iter().map(|e| e.quantity).sum()
    }

    /// Fold another pass's outcome into this one (used by `drain_all`).
    pub fn merge(&mut self, other: MatchReport) {
        self.events.extend(other.events);
        self.exhausted |= other.exhausted;
    }
}

/// Read-only view of one resting order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OrderView {
    /// Order id
    pub id: u64,
    /// Limit price in ticks
    pub price: u64,
    /// Unfilled quantity at the time of the walk
    pub remaining: u64,
    /// Originally submitted quantity
    pub original: u64,
}

/// Best-effort diagnostic view of one symbol's books.
///
/// Taken while other threads may be mutating the books, so it reflects
/// *some* recent state, not a linearizable point-in-time cut.
#[derive(Clone, Debug)]
pub struct BookSnapshot {
    /// The symbol the snapshot belongs to
    pub symbol: String,
    /// Bid orders, best (highest) price first
    pub bids: Vec<OrderView>,
    /// Ask orders, best (lowest) price first
    pub asks: Vec<OrderView>,
}
