//! Symbol Registry - fixed-capacity directory from ticker to book pair.
//!
//! A symbol's (bid book, ask book) pair is found by hashing the ticker with
//! FNV-1a into one of [`NUM_BUCKETS`] buckets; symbols that collide share a
//! bucket through an immutable chain of entries. Entries are published by a
//! CAS on the bucket head, so two threads racing to create the same symbol
//! cannot both install one: the loser observes the winner's entry on the
//! re-walk and adopts it. Once published, an entry lives until the registry
//! is dropped - book pairs are never replaced or removed.
//!
//! Lookup walks the chain without mutating or blocking.

use std::sync::atomic::{AtomicPtr, Ordering};

use crate::events::Side;
use crate::order_book::OrderBook;

/// Number of hash buckets in the directory. Power of two so the hash can be
/// masked instead of divided.
pub const NUM_BUCKETS: usize = 1024;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1a over the symbol bytes. Stable, cheap, and well distributed
/// for short strings like tickers.
fn fnv1a(symbol: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in symbol.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// One symbol's directory entry: the ticker and its two books, plus the
/// collision-chain link. `next` is written once at construction (to the
/// bucket head observed at publish time) and never mutated afterwards, so
/// chains only ever grow at the head.
pub struct SymbolEntry {
    symbol: Box<str>,
    bids: OrderBook,
    asks: OrderBook,
    next: AtomicPtr<SymbolEntry>,
}

impl SymbolEntry {
    fn new(symbol: &str, next: *mut SymbolEntry) -> Self {
        Self {
            symbol: symbol.into(),
            bids: OrderBook::new(Side::Bid),
            asks: OrderBook::new(Side::Ask),
            next: AtomicPtr::new(next),
        }
    }

    /// The ticker this entry belongs to.
    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// The bid book (buy side).
    #[inline]
    pub fn bids(&self) -> &OrderBook {
        &self.bids
    }

    /// The ask book (sell side).
    #[inline]
    pub fn asks(&self) -> &OrderBook {
        &self.asks
    }

    /// The book for the given side.
    #[inline]
    pub fn book(&self, side: Side) -> &OrderBook {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }
}

/// Fixed-capacity, CAS-published symbol directory.
pub struct SymbolRegistry {
    buckets: Box<[AtomicPtr<SymbolEntry>]>,
}

impl SymbolRegistry {
    /// Create an empty registry with [`NUM_BUCKETS`] buckets.
    pub fn new() -> Self {
        let buckets = (0..NUM_BUCKETS)
            .map(|_| AtomicPtr::new(std::ptr::null_mut()))
            .collect();
        Self { buckets }
    }

    /// Bucket index a symbol hashes to. Exposed so tests can construct
    /// colliding symbol pairs.
    #[inline]
    pub fn bucket_of(symbol: &str) -> usize {
        fnv1a(symbol) as usize & (NUM_BUCKETS - 1)
    }

    /// Find a symbol's entry without creating it.
    pub fn lookup(&self, symbol: &str) -> Option<&SymbolEntry> {
        let mut cursor = self.buckets[Self::bucket_of(symbol)].load(Ordering::Acquire);
        while !cursor.is_null() {
            // Safety: entries are only freed in Drop, which requires
            // exclusive access to the registry; any entry reachable from a
            // bucket stays valid for the registry's lifetime.
            let entry = unsafe { &*cursor };
            if entry.symbol() == symbol {
                return Some(entry);
            }
            cursor = entry.next.load(Ordering::Acquire);
        }
        None
    }

    /// Find a symbol's entry, creating and publishing it exactly once if it
    /// does not exist yet.
    ///
    /// Creation is a race that at most one thread wins: the new entry is
    /// CAS-installed as the bucket head iff the head is still what the
    /// chain walk observed. A losing thread frees its candidate and
    /// re-walks - either it finds the symbol (some racer created it) or it
    /// retries against the new head.
    pub fn get_or_create(&self, symbol: &str) -> &SymbolEntry {
        let bucket = &self.buckets[Self::bucket_of(symbol)];
        loop {
            let head = bucket.load(Ordering::Acquire);

            let mut cursor = head;
            while !cursor.is_null() {
                // Safety: see lookup.
                let entry = unsafe { &*cursor };
                if entry.symbol() == symbol {
                    return entry;
                }
                cursor = entry.next.load(Ordering::Acquire);
            }

            // Absent as of this walk: try to publish a fresh entry chained
            // in front of the observed head.
            let candidate = Box::into_raw(Box::new(SymbolEntry::new(symbol, head)));
            match bucket.compare_exchange(head, candidate, Ordering::AcqRel, Ordering::Acquire) {
                // Safety: we just published it; it is never freed before Drop.
                Ok(_) => return unsafe { &*candidate },
                Err(_) => {
                    // Lost the publish race; the candidate was never shared.
                    // Safety: candidate came from Box::into_raw above and no
                    // other thread has seen it.
                    unsafe { drop(Box::from_raw(candidate)) };
                }
            }
        }
    }

    /// Visit every entry in registry order (bucket 0..N, chain order within
    /// a bucket). No cross-symbol ordering is promised beyond that.
    pub fn for_each(&self, mut f: impl FnMut(&SymbolEntry)) {
        for bucket in self.buckets.iter() {
            let mut cursor = bucket.load(Ordering::Acquire);
            while !cursor.is_null() {
                // Safety: see lookup.
                let entry = unsafe { &*cursor };
                f(entry);
                cursor = entry.next.load(Ordering::Acquire);
            }
        }
    }

    /// Number of symbols currently registered.
    pub fn len(&self) -> usize {
        let mut count = 0;
        self.for_each(|_| count += 1);
        count
    }

    /// Returns true if no symbol has been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SymbolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SymbolRegistry {
    fn drop(&mut self) {
        for bucket in self.buckets.iter() {
            let mut cursor = bucket.swap(std::ptr::null_mut(), Ordering::AcqRel);
            while !cursor.is_null() {
                // Safety: exclusive access; each entry was created by
                // Box::into_raw in get_or_create and is freed exactly once.
                let entry = unsafe { Box::from_raw(cursor) };
                cursor = entry.next.load(Ordering::Acquire);
            }
        }
    }
}
