//! Example walking a request counter across a month boundary.
//!
//! This example shows how to:
//! - Restore the live counter at start-up
//! - Count requests from several threads
//! - Checkpoint on a simulated timer, rolling over into a new month
//! - Read back the full monthly history

use std::sync::Arc;
use std::thread;

use chrono::{Duration, TimeZone, Utc};
use tally::{CounterStore, FileView, LiveCounter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("tally monthly rollover example");

    let dir = std::env::temp_dir().join("tally_rollover_example");
    let _ = std::fs::remove_dir_all(&dir);

    let counter = Arc::new(LiveCounter::new());
    let store = CounterStore::new(FileView::open(&dir)?, Arc::clone(&counter));

    // Simulated wall clock: one save tick every six hours, starting late in December.
    let mut now = Utc.with_ymd_and_hms(2018, 12, 30, 0, 0, 0).unwrap();
    store.load_current(&now)?;
    let mut rollover = store.rollover_coordinator_at(&now)?;

    for tick in 0..12 {
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let c = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..250 {
                        c.increment();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().map_err(|_| "worker panicked")?;
        }

        let saved = store.checkpoint(&mut rollover, &now)?;
        println!(
            "tick {tick:2} @ {now}: saved {} under {}{}",
            saved.total,
            saved.period,
            if saved.rolled_over { " (rolled over)" } else { "" }
        );
        now += Duration::hours(6);
    }

    println!("\nHistory:");
    if let Some(history) = store.load_all()? {
        for entry in &history.dated {
            println!(
                "  {}  {:>6}",
                entry.period_start.format("%Y-%m"),
                entry.counter.total.unwrap_or_default()
            );
        }
    }

    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}
