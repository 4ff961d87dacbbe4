//! Benchmarks for local-tier set/del, the operations that drive
//! coherence-bus events (publishing is skipped — no bus attached — so
//! these numbers isolate the tier's own invalidation cost).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tiercache::adaptor::Adaptor;
use tiercache::error::Result;
use tiercache::local::{LocalOptions, LocalTier, MokaByteStore};
use tiercache::record::Record;
use tiercache::telemetry::{TelemetryLogger, TraceContext};
use tokio::runtime::Runtime;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BenchRecord {
    key: String,
    value: u64,
    zero: bool,
}

impl Record for BenchRecord {
    fn key(&self) -> String {
        self.key.clone()
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self).expect("serialize"))
    }

    fn deserialize(&mut self, bytes: &[u8]) -> Result<()> {
        *self = serde_json::from_slice(bytes).expect("deserialize");
        Ok(())
    }

    fn is_zero(&self) -> bool {
        self.zero
    }
}

fn setup() -> (LocalTier, Runtime) {
    let rt = Runtime::new().unwrap();
    let tier = LocalTier::new(LocalOptions::default(), Arc::new(MokaByteStore::new(100_000)));
    (tier, rt)
}

fn ctx() -> TraceContext {
    TraceContext::new("bench", Arc::new(TelemetryLogger::new()))
}

fn bench_del_single_key(c: &mut Criterion) {
    let (tier, rt) = setup();

    rt.block_on(async {
        let mut ctx = ctx();
        for i in 0..100 {
            let record = BenchRecord { key: format!("bench:inv:{i}"), value: i, zero: false };
            Adaptor::<String, BenchRecord>::set(&tier, &mut ctx, &record).await.unwrap();
        }
    });

    c.bench_function("local_del_single_key", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut ctx = ctx();
                let key = format!("bench:inv:{}", rand::random::<u8>() % 100);
                black_box(Adaptor::<String, BenchRecord>::del(&tier, &mut ctx, &key).await.unwrap());
            });
        });
    });
}

fn bench_overwrite_existing_key(c: &mut Criterion) {
    let (tier, rt) = setup();

    rt.block_on(async {
        let mut ctx = ctx();
        for i in 0..100 {
            let record = BenchRecord { key: format!("bench:upd:{i}"), value: i, zero: false };
            Adaptor::<String, BenchRecord>::set(&tier, &mut ctx, &record).await.unwrap();
        }
    });

    c.bench_function("local_overwrite_existing_key", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut ctx = ctx();
                let idx = rand::random::<u8>() % 100;
                let record = BenchRecord { key: format!("bench:upd:{idx}"), value: 999, zero: false };
                black_box(Adaptor::<String, BenchRecord>::set(&tier, &mut ctx, &record).await.unwrap());
            });
        });
    });
}

criterion_group!(benches, bench_del_single_key, bench_overwrite_existing_key);
criterion_main!(benches);
