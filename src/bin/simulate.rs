//! Trading simulation driver.
//!
//! Spawns N submitter threads firing random orders at a shared venue, each
//! draining the symbol it just touched. Match events flow through a lock-free
//! queue to a dedicated logger thread (so no worker ever blocks on I/O),
//! which aggregates per-symbol totals and can dump every trade to CSV.
//! Submit latency is recorded per worker and reported as percentiles.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use crossbeam_queue::SegQueue;
use hdrhistogram::Histogram;
use rand::prelude::*;
use rustc_hash::FxHashMap;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crossbook::{Exchange, MatchEvent, Side, SubmitError, PRICE_SCALE};

#[derive(Parser, Debug)]
#[command(name = "simulate", about = "Concurrent random-order trading simulation")]
struct Args {
    /// Total number of orders across all workers
    #[arg(long, default_value_t = 100_000)]
    orders: u64,

    /// Number of submitter threads
    #[arg(long, default_value_t = 4)]
    threads: u64,

    /// Comma-separated ticker symbols to trade
    #[arg(long, default_value = "AAPL,GOOG,TSLA,MSFT,AMZN,META,NFLX,NVDA,PYPL,INTC")]
    symbols: String,

    /// Order arena capacity
    #[arg(long, default_value_t = 1_000_000)]
    capacity: u32,

    /// PRNG seed (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Pin each worker to a CPU core
    #[arg(long)]
    pin: bool,

    /// Write every match event to this CSV file
    #[arg(long)]
    trades_out: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let symbols: Vec<String> = args.symbols.split(',').map(|s| s.trim().to_owned()).collect();
    let seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen());

    info!(
        orders = args.orders,
        threads = args.threads,
        symbols = symbols.len(),
        seed,
        "starting simulation"
    );

    let exchange = Arc::new(Exchange::new(args.capacity));
    let match_queue: Arc<SegQueue<MatchEvent>> = Arc::new(SegQueue::new());
    let workers_done = Arc::new(AtomicBool::new(false));
    let rejected = Arc::new(AtomicU64::new(0));

    // Logger thread: the only place match events are formatted or persisted.
    let logger = {
        let queue = Arc::clone(&match_queue);
        let done = Arc::clone(&workers_done);
        let trades_out = args.trades_out.clone();
        std::thread::spawn(move || {
            let mut writer = trades_out.map(|path| {
                csv::Writer::from_path(path).expect("failed to create trades CSV")
            });
            let mut per_symbol: FxHashMap<String, u64> = FxHashMap::default();
            let mut matches = 0u64;
            let mut quantity = 0u64;

            loop {
                match queue.pop() {
                    Some(event) => {
                        matches += 1;
                        quantity += event.quantity;
                        *per_symbol.entry(event.symbol.clone()).or_default() += event.quantity;
                        if let Some(w) = writer.as_mut() {
                            w.serialize(&event).expect("failed to write trade row");
                        }
                    }
                    None if done.load(Ordering::Acquire) => break,
                    None => std::thread::yield_now(),
                }
            }

            if let Some(mut w) = writer {
                w.flush().expect("failed to flush trades CSV");
            }
            (matches, quantity, per_symbol)
        })
    };

    let core_ids = if args.pin {
        core_affinity::get_core_ids().unwrap_or_default()
    } else {
        Vec::new()
    };

    let start = Instant::now();
    let per_worker = args.orders / args.threads;

    let workers: Vec<_> = (0..args.threads)
        .map(|t| {
            let exchange = Arc::clone(&exchange);
            let queue = Arc::clone(&match_queue);
            let rejected = Arc::clone(&rejected);
            let symbols = symbols.clone();
            let core = core_ids.get(t as usize % core_ids.len().max(1)).copied();
            std::thread::spawn(move || {
                if let Some(core) = core {
                    core_affinity::set_for_current(core);
                }

                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t));
                // Auto-resizing: backoff sleeps push tail latencies far past
                // any fixed bound, and a dropped sample would skew the tail.
                let mut latency =
                    Histogram::<u64>::new(3).expect("bad histogram precision");

                for _ in 0..per_worker {
                    let symbol = &symbols[rng.gen_range(0..symbols.len())];
                    let side = if rng.gen_bool(0.5) { Side::Bid } else { Side::Ask };
                    let quantity = rng.gen_range(1..=100);
                    // $50.00 to $500.00 in whole cents
                    let price = rng.gen_range(50_00..=500_00) * (PRICE_SCALE / 100);

                    let begin = Instant::now();
                    let outcome = exchange.submit(symbol, side, quantity, price);
                    latency
                        .record(begin.elapsed().as_nanos() as u64)
                        .expect("latency sample rejected");

                    match outcome {
                        Ok(_) => {}
                        Err(SubmitError::CapacityExhausted) => break,
                        Err(_) => {
                            rejected.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                    }

                    for event in exchange.drain(symbol).events {
                        queue.push(event);
                    }
                }

                latency
            })
        })
        .collect();

    let mut latency = Histogram::<u64>::new(3).expect("bad histogram precision");
    for w in workers {
        latency.add(w.join().expect("worker panicked")).unwrap();
    }

    // Final sweep: anything left crossable after the workers stop.
    for event in exchange.drain_all().events {
        match_queue.push(event);
    }

    workers_done.store(true, Ordering::Release);
    let (matches, quantity, per_symbol) = logger.join().expect("logger panicked");
    let elapsed = start.elapsed();

    println!("\n=== Simulation Report ===");
    println!("Orders:       {}", exchange.order_count());
    println!("Rejected:     {}", rejected.load(Ordering::Relaxed));
    println!("Matches:      {matches}");
    println!("Matched qty:  {quantity}");
    println!("Symbols:      {}", exchange.symbol_count());
    println!("Forced heads: {}", exchange.forced_inserts());
    println!("Elapsed:      {:.4} s", elapsed.as_secs_f64());
    println!(
        "Throughput:   {:.0} orders/sec",
        exchange.order_count() as f64 / elapsed.as_secs_f64()
    );
    println!("--- submit latency (ns) ---");
    println!("P50:    {:6}", latency.value_at_quantile(0.50));
    println!("P90:    {:6}", latency.value_at_quantile(0.90));
    println!("P99:    {:6}", latency.value_at_quantile(0.99));
    println!("P99.9:  {:6}", latency.value_at_quantile(0.999));
    println!("Max:    {:6}", latency.max());
    println!("--- matched quantity by symbol ---");
    let mut rows: Vec<_> = per_symbol.into_iter().collect();
    rows.sort();
    for (symbol, qty) in rows {
        println!("{symbol:8} {qty:>12}");
    }
}
