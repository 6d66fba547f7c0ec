//! Matching - drains crossable quantity between a bid book and an ask book.
//!
//! A draining pass repeatedly looks at the two heads: while the best bid
//! prices at or above the best ask, quantity moves. The pass races freely
//! against concurrent inserts and other drainers, so every decision is
//! optimistic and re-validated at commit time:
//!
//! - a head at zero remaining is skipped (and unlinked best-effort) only
//!   once it is *retired* - its final fill fully committed. A head at a
//!   transient zero belongs to a match mid-commit on another thread, which
//!   will either retire it or restore the quantity; unlinking it early
//!   would let a later compensating restore resurrect quantity on an order
//!   no book can reach. Such a head is waited out, not stepped past;
//! - the matched quantity is committed leg by leg with CAS against the
//!   snapshotted remaining values - if the bid leg lands but the ask leg
//!   loses to a concurrent drainer, the bid leg is restored and the
//!   iteration abandoned, so nothing is double-decremented and no quantity
//!   is lost;
//! - a match is counted (and its event emitted) only when both legs land,
//!   and only then is a fully consumed side retired and unlinked.
//!
//! Passes are bounded by the policy's iteration ceiling so a pathological
//! contention storm cannot wedge a caller; hitting the ceiling is reported
//! in the [`MatchReport`] and the next drain simply resumes.

use chrono::Utc;
use tracing::{debug, warn};

use crate::arena::OrderArena;
use crate::events::{MatchEvent, MatchReport};
use crate::order_book::OrderBook;
use crate::retry::RetryPolicy;
use crate::slot::NULL_INDEX;

/// Drain all crossable quantity between `bids` and `asks` for one symbol.
pub fn drain(
    arena: &OrderArena,
    bids: &OrderBook,
    asks: &OrderBook,
    symbol: &str,
    policy: &RetryPolicy,
) -> MatchReport {
    let mut report = MatchReport::default();
    let mut iterations = 0u32;

    loop {
        let bid_idx = bids.head();
        let ask_idx = asks.head();
        if bid_idx == NULL_INDEX || ask_idx == NULL_INDEX {
            break; // one side is empty
        }

        let bid = arena.get(bid_idx);
        let ask = arena.get(ask_idx);
        if bid.price() < ask.price() {
            break; // no cross possible
        }

        if iterations >= policy.max_match_iterations {
            warn!(symbol, iterations, "drain pass hit iteration ceiling, aborting");
            report.exhausted = true;
            break;
        }
        iterations += 1;

        // Long or spinning passes give the scheduler a chance every so
        // often.
        if iterations % 100 == 0 {
            std::thread::yield_now();
        }

        // Snapshot both remaining quantities.
        let bid_remaining = bid.remaining();
        let ask_remaining = ask.remaining();

        // A retired head is logically gone; step the book past it without
        // counting a match. A transient zero (mid-commit elsewhere) is
        // re-read until the owning matcher retires or restores it.
        if bid_remaining == 0 {
            if bid.is_retired() {
                bids.unlink_head(arena, bid_idx);
            }
            continue;
        }
        if ask_remaining == 0 {
            if ask.is_retired() {
                asks.unlink_head(arena, ask_idx);
            }
            continue;
        }

        let matched = bid_remaining.min(ask_remaining);

        // Commit leg by leg against the snapshot. Either leg failing means a
        // concurrent drainer moved first; re-loop without counting.
        if !bid.consume(bid_remaining, matched) {
            continue;
        }
        if !ask.consume(ask_remaining, matched) {
            bid.restore(matched);
            continue;
        }

        // Cross at the resting ask's price: the side that was already
        // waiting in the book sets the terms.
        let event = MatchEvent {
            symbol: symbol.to_owned(),
            quantity: matched,
            price: ask.price(),
            bid_order_id: bid.id(),
            ask_order_id: ask.id(),
            timestamp: Utc::now(),
        };
        debug!(
            symbol,
            quantity = matched,
            price = event.price,
            bid_order_id = event.bid_order_id,
            ask_order_id = event.ask_order_id,
            "matched"
        );
        report.events.push(event);

        // Both legs landed: retire and unlink whichever side was fully
        // consumed. The zero is permanent only from here on.
        if bid_remaining == matched {
            bid.retire();
            bids.unlink_head(arena, bid_idx);
        }
        if ask_remaining == matched {
            ask.retire();
            asks.unlink_head(arena, ask_idx);
        }
    }

    report
}
