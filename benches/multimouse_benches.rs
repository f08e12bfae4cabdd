#![cfg(feature = "bench")]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use multimouse::bench_support::FanOutContext;
use std::sync::Arc;
use tokio::runtime::Runtime;

const PAYLOAD: &str = r#"{"clientId":1,"x":10.5,"y":20.25}"#;

fn create_runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn fan_out_benches(c: &mut Criterion) {
    let runtime = create_runtime();

    let ctx_small = Arc::new(runtime.block_on(FanOutContext::with_clients(32)));
    let ctx_large = Arc::new(runtime.block_on(FanOutContext::with_clients(256)));

    c.bench_function("fan_out_32", |b| {
        let ctx = ctx_small.clone();
        b.to_async(&runtime).iter(|| async {
            ctx.broadcaster.fan_out(black_box(PAYLOAD)).await;
        });
    });

    c.bench_function("fan_out_256", |b| {
        let ctx = ctx_large.clone();
        b.to_async(&runtime).iter(|| async {
            ctx.broadcaster.fan_out(black_box(PAYLOAD)).await;
        });
    });
}

fn registry_benches(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let ctx = Arc::new(runtime.block_on(FanOutContext::with_clients(128)));

    c.bench_function("pool_snapshot_128", |b| {
        let ctx = ctx.clone();
        b.to_async(&runtime).iter(|| async {
            black_box(ctx.pool.snapshot().await);
        });
    });
}

criterion_group!(multimouse, fan_out_benches, registry_benches);
criterion_main!(multimouse);
