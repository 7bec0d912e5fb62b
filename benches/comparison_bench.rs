//! Comparison benchmarks between fieldwire and serde-based formats
//!
//! Run with: cargo bench comparison_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fieldwire::{Externalize, Registry};
use serde::{Deserialize, Serialize};

// Test data structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Externalize)]
struct TradeMessage {
    seq: u32,
    timestamp_ns: u64,
    price: i64,
    quantity: u32,
    symbol: Option<String>,
    note: Option<String>,
}

impl TradeMessage {
    fn new_minimal() -> Self {
        Self {
            seq: 12345,
            timestamp_ns: 1_700_000_000_000_000_000,
            price: 50_000_000,
            quantity: 100,
            symbol: None,
            note: None,
        }
    }

    fn new_with_symbol() -> Self {
        Self {
            symbol: Some("AAPL".to_string()),
            ..Self::new_minimal()
        }
    }

    fn new_full() -> Self {
        Self {
            symbol: Some("AAPL".to_string()),
            note: Some("Buy order".to_string()),
            ..Self::new_minimal()
        }
    }
}

// Column-shaped payload where dense compression matters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Externalize)]
struct PriceSeries {
    prices: Vec<i64>,
    volumes: Vec<Option<u32>>,
}

fn price_series(len: usize) -> PriceSeries {
    PriceSeries {
        prices: (0..len as i64).map(|i| 50_000_000 + i % 250).collect(),
        volumes: (0..len as u32)
            .map(|i| if i % 9 == 0 { None } else { Some(100 + i % 50) })
            .collect(),
    }
}

fn test_cases() -> [(&'static str, TradeMessage); 3] {
    [
        ("minimal", TradeMessage::new_minimal()),
        ("with_symbol", TradeMessage::new_with_symbol()),
        ("full", TradeMessage::new_full()),
    ]
}

fn bench_encoding_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoding_comparison");
    let registry = Registry::default();

    for (name, trade) in &test_cases() {
        // fieldwire
        group.bench_with_input(BenchmarkId::new("fieldwire", name), trade, |b, trade| {
            b.iter(|| {
                let encoded = registry.to_raw_bytes(black_box(trade)).unwrap();
                black_box(encoded);
            });
        });

        // Bincode
        group.bench_with_input(BenchmarkId::new("bincode", name), trade, |b, trade| {
            b.iter(|| {
                let encoded = bincode::serialize(black_box(trade)).unwrap();
                black_box(encoded);
            });
        });

        // Postcard
        group.bench_with_input(BenchmarkId::new("postcard", name), trade, |b, trade| {
            b.iter(|| {
                let encoded = postcard::to_allocvec(black_box(trade)).unwrap();
                black_box(encoded);
            });
        });

        // JSON (for comparison)
        group.bench_with_input(BenchmarkId::new("json", name), trade, |b, trade| {
            b.iter(|| {
                let encoded = serde_json::to_vec(black_box(trade)).unwrap();
                black_box(encoded);
            });
        });
    }

    group.finish();
}

fn bench_decoding_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("decoding_comparison");
    let registry = Registry::default();

    for (name, trade) in &test_cases() {
        // Pre-encode data for each format
        let fieldwire_data = registry.to_raw_bytes(trade).unwrap();
        let bincode_data = bincode::serialize(trade).unwrap();
        let postcard_data = postcard::to_allocvec(trade).unwrap();
        let json_data = serde_json::to_vec(trade).unwrap();

        // fieldwire
        group.bench_with_input(
            BenchmarkId::new("fieldwire", name),
            &fieldwire_data,
            |b, data| {
                b.iter(|| {
                    let decoded: TradeMessage = registry.from_raw_bytes(black_box(data)).unwrap();
                    black_box(decoded);
                });
            },
        );

        // Bincode
        group.bench_with_input(
            BenchmarkId::new("bincode", name),
            &bincode_data,
            |b, data| {
                b.iter(|| {
                    let decoded: TradeMessage = bincode::deserialize(black_box(data)).unwrap();
                    black_box(decoded);
                });
            },
        );

        // Postcard
        group.bench_with_input(
            BenchmarkId::new("postcard", name),
            &postcard_data,
            |b, data| {
                b.iter(|| {
                    let decoded: TradeMessage = postcard::from_bytes(black_box(data)).unwrap();
                    black_box(decoded);
                });
            },
        );

        // JSON
        group.bench_with_input(BenchmarkId::new("json", name), &json_data, |b, data| {
            b.iter(|| {
                let decoded: TradeMessage = serde_json::from_slice(black_box(data)).unwrap();
                black_box(decoded);
            });
        });
    }

    group.finish();
}

fn bench_series_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("series_roundtrip");
    group.sample_size(50);

    let registry = Registry::default();
    let series = price_series(10_000);

    group.bench_function("fieldwire", |b| {
        b.iter(|| {
            let encoded = registry.to_raw_bytes(black_box(&series)).unwrap();
            let decoded: PriceSeries = registry.from_raw_bytes(black_box(&encoded)).unwrap();
            black_box(decoded);
        });
    });

    group.bench_function("bincode", |b| {
        b.iter(|| {
            let encoded = bincode::serialize(black_box(&series)).unwrap();
            let decoded: PriceSeries = bincode::deserialize(black_box(&encoded)).unwrap();
            black_box(decoded);
        });
    });

    group.bench_function("postcard", |b| {
        b.iter(|| {
            let encoded = postcard::to_allocvec(black_box(&series)).unwrap();
            let decoded: PriceSeries = postcard::from_bytes(black_box(&encoded)).unwrap();
            black_box(decoded);
        });
    });

    group.finish();
}

fn bench_size_comparison(c: &mut Criterion) {
    let registry = Registry::default();

    println!("\n=== SERIALIZED SIZE COMPARISON ===");

    for (name, trade) in [
        ("minimal", TradeMessage::new_minimal()),
        ("full", TradeMessage::new_full()),
    ] {
        println!("\n{} message:", name);
        println!("  fieldwire: {} bytes", registry.to_raw_bytes(&trade).unwrap().len());
        println!("  Bincode:   {} bytes", bincode::serialize(&trade).unwrap().len());
        println!("  Postcard:  {} bytes", postcard::to_allocvec(&trade).unwrap().len());
        println!("  JSON:      {} bytes", serde_json::to_vec(&trade).unwrap().len());
    }

    let series = price_series(10_000);
    println!("\nprice series (10k rows):");
    println!("  fieldwire: {} bytes", registry.to_raw_bytes(&series).unwrap().len());
    println!("  Bincode:   {} bytes", bincode::serialize(&series).unwrap().len());
    println!("  Postcard:  {} bytes", postcard::to_allocvec(&series).unwrap().len());

    // Dummy benchmark just to include in the suite
    c.bench_function("size_comparison_dummy", |b| {
        b.iter(|| {
            black_box(42);
        });
    });
}

criterion_group!(
    benches,
    bench_encoding_comparison,
    bench_decoding_comparison,
    bench_series_comparison,
    bench_size_comparison
);
criterion_main!(benches);
