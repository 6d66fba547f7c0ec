//! # Crossbook
//!
//! A lock-free, multi-symbol limit order book matching venue.
//!
//! ## Design Principles
//!
//! - **No global lock**: submitters and drainers synchronize only through
//!   compare-and-swap cells and atomic counters, never a book-wide mutex
//! - **Stable Indices**: orders live in a pre-allocated arena and are linked
//!   by `u32` indices that are never recycled, closing the ABA hole
//! - **Fixed-Point Prices**: integer ticks everywhere; no floating point in
//!   ordering or matching
//! - **Bounded Everything**: every optimistic loop has a retry or iteration
//!   ceiling and reports exhaustion instead of hanging
//!
//! ## Architecture
//!
//! ```text
//! [Submitter Threads] --> Exchange::submit --> SymbolRegistry --> OrderBook (CAS insert)
//! [Drainer Threads]   --> Exchange::drain  ------------------^--> matching (CAS consume)
//! ```

pub mod arena;
pub mod events;
pub mod exchange;
pub mod matching;
pub mod order_book;
pub mod price;
pub mod registry;
pub mod retry;
pub mod slot;

// Re-exports for convenience
pub use arena::{OrderArena, OrderRecord};
pub use events::{BookSnapshot, MatchEvent, MatchReport, OrderHandle, OrderView, Side, SubmitError};
pub use exchange::Exchange;
pub use order_book::{InsertExhausted, InsertPosition, OrderBook};
pub use price::{ticks_from_decimal, ticks_to_decimal, PRICE_SCALE};
pub use registry::{SymbolRegistry, NUM_BUCKETS};
pub use retry::RetryPolicy;
pub use slot::{AtomicSlot, OrderIndex, NULL_INDEX, SEALED_INDEX};
