//! Basic usage example for fieldwire
//!
//! Run with: cargo run --example basic_usage

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use fieldwire::*;

#[derive(Debug, Default, Clone, PartialEq, Externalize)]
enum Side {
    #[default]
    Buy,
    Sell,
}

#[derive(Debug, Default, Clone, PartialEq, Externalize)]
struct Header {
    seq: u32,
    timestamp_ns: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Externalize)]
struct Trade {
    price: i64,
    quantity: u32,
    side: Side,
    symbol: Option<String>,
    note: Option<String>,
    #[externalize(skip)]
    scratch: Vec<u8>,
    #[externalize(parent)]
    header: Header,
}

#[derive(Debug, Default, PartialEq, Externalize)]
struct Session {
    trades: Vec<Trade>,
    prices: Vec<i64>,
    halted: Vec<bool>,
    fills: VecDeque<Option<u32>>,
    limits: BTreeMap<String, i64>,
    keepalive: Duration,
}

#[derive(Debug, PartialEq, Externalize)]
#[externalize(no_factory)]
struct Handle {
    fd: i32,
}

fn main() -> Result<()> {
    println!("fieldwire Basic Usage Example");
    println!("=============================");

    let registry = Registry::default();

    // Example 1: one struct, raw bytes
    println!("\n1. Simple Trade:");
    {
        let trade = Trade {
            price: 50_000_000,
            quantity: 100,
            header: Header {
                seq: 12345,
                timestamp_ns: 1_700_000_000_000_000_000,
            },
            ..Default::default()
        };

        let raw = registry.to_raw_bytes(&trade)?;
        println!("  Encoded {} bytes", raw.len());

        let decoded: Trade = registry.from_raw_bytes(&raw)?;
        println!(
            "  Decoded: seq={}, price={}, qty={}, side={:?}, symbol={:?}",
            decoded.header.seq, decoded.price, decoded.quantity, decoded.side, decoded.symbol
        );
    }

    // Example 2: field order, parent fields last, skipped fields absent
    println!("\n2. Trade Schema:");
    {
        let schema = registry.schema::<Trade>()?;
        let names: Vec<_> = schema.field_names().collect();
        println!("  {} fields: {:?}", schema.len(), names);
    }

    // Example 3: nested containers inside the default gzip envelope
    println!("\n3. Session with Containers:");
    {
        let session = Session {
            trades: vec![Trade {
                symbol: Some("AAPL".into()),
                note: Some("Stop loss order".into()),
                side: Side::Sell,
                ..Default::default()
            }],
            prices: (0..1_000).map(|i| 50_000_000 + i % 10).collect(),
            halted: (0..1_000).map(|i| i % 100 == 0).collect(),
            fills: VecDeque::from([Some(10), None, Some(30)]),
            limits: BTreeMap::from([("AAPL".to_string(), 1_000), ("MSFT".to_string(), 500)]),
            keepalive: Duration::from_secs(30),
        };

        let raw = registry.to_raw_bytes(&session)?;
        let enveloped = registry.to_bytes(&session)?;
        println!("  Raw stream: {} bytes", raw.len());
        println!("  Gzip envelope: {} bytes", enveloped.len());

        let decoded: Session = registry.from_bytes(&enveloped)?;
        assert_eq!(decoded, session);
        println!("  Round trip OK");
    }

    // Example 4: checksummed framing catches corruption
    println!("\n4. Framed Envelope:");
    {
        let framed = Registry::new(Config::default().with_envelope(EnvelopeKind::Framed));
        let mut bytes = framed.to_bytes(&vec![1i32, 2, 3])?;
        println!("  Framed stream: {} bytes", bytes.len());

        let last = bytes.len() - 5;
        bytes[last] ^= 0xFF;
        match framed.from_bytes::<Vec<i32>>(&bytes) {
            Err(err) => println!("  Corrupted stream rejected: {}", err),
            Ok(_) => println!("  Corruption was not detected"),
        }
    }

    // Example 5: types without a construction strategy
    println!("\n5. Missing Constructor:");
    {
        match registry.to_raw_bytes(&Handle { fd: 3 }) {
            Err(Error::MissingConstructor(name)) => println!("  {} cannot be decoded", name),
            Err(err) => println!("  Unexpected error: {}", err),
            Ok(_) => println!("  Unexpectedly encoded"),
        }
        println!("  Cached schemas: {}", registry.cached_classes());
    }

    println!("\nAll examples completed successfully!");
    Ok(())
}
