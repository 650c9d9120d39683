//! Microbenchmarks for the per-request increment and the periodic save.
//!
//! Run with: `cargo bench -p tally -- counter`

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;

use chrono::{TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tally::{CounterStore, FileView, LiveCounter, MemoryView};
use tempfile::tempdir;

fn bench_increment(c: &mut Criterion) {
    let counter = LiveCounter::new();

    c.bench_function("counter/increment", |b| {
        b.iter(|| black_box(&counter).increment());
    });
}

fn bench_increment_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("counter/increment_contended");

    for threads in [2u64, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let counter = Arc::new(LiveCounter::new());
                let workers: Vec<_> = (0..threads)
                    .map(|_| {
                        let c = Arc::clone(&counter);
                        thread::spawn(move || {
                            for _ in 0..10_000 {
                                c.increment();
                            }
                        })
                    })
                    .collect();
                for w in workers {
                    w.join().unwrap();
                }
                black_box(counter.load())
            });
        });
    }

    group.finish();
}

fn bench_save(c: &mut Criterion) {
    let now = Utc.with_ymd_and_hms(2018, 12, 5, 14, 44, 12).unwrap();

    let memory = CounterStore::new(MemoryView::new(), Arc::new(LiveCounter::new()));
    c.bench_function("counter/save_memory", |b| {
        b.iter(|| {
            memory.counter().increment();
            memory.save_current(black_box(&now)).unwrap()
        });
    });

    let temp_dir = tempdir().unwrap();
    let file = CounterStore::new(
        FileView::open(temp_dir.path()).unwrap(),
        Arc::new(LiveCounter::new()),
    );
    c.bench_function("counter/save_file", |b| {
        b.iter(|| {
            file.counter().increment();
            file.save_current(black_box(&now)).unwrap()
        });
    });
}

fn bench_load_all(c: &mut Criterion) {
    let store = CounterStore::new(MemoryView::new(), Arc::new(LiveCounter::new()));
    for year in 2000..2025 {
        for month in 1..=12 {
            let now = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap();
            store.counter().store(u64::from(month));
            store.save_current(&now).unwrap();
        }
    }

    c.bench_function("counter/load_all_300_periods", |b| {
        b.iter(|| black_box(store.load_all().unwrap()));
    });
}

criterion_group!(
    benches,
    bench_increment,
    bench_increment_contended,
    bench_save,
    bench_load_all
);
criterion_main!(benches);
