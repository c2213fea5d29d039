use criterion::{Criterion, criterion_group, criterion_main};
use tickbook::{OrderBook, Side, TickRatio};

fn matching_benchmarks(c: &mut Criterion) {
    let book = OrderBook::new(TickRatio::HUNDREDTH, 1.0, 200.0).expect("book");
    c.bench_function("rest_and_cross", |b| {
        b.iter(|| {
            book.insert_limit_order(Side::Sell, 100.0, 1, None, None)
                .expect("sell");
            book.insert_limit_order(Side::Buy, 100.0, 1, None, None)
                .expect("buy");
        });
    });

    let deep = OrderBook::new(TickRatio::HUNDREDTH, 1.0, 200.0).expect("book");
    for level in 0..64u64 {
        deep.insert_limit_order(Side::Sell, 100.0 + level as f64 * 0.01, 8, None, None)
            .expect("seed");
    }
    c.bench_function("market_sweep", |b| {
        b.iter(|| {
            deep.insert_limit_order(Side::Sell, 100.0, 8, None, None)
                .expect("replenish");
            deep.insert_market_order(Side::Buy, 8, None, None)
                .expect("sweep");
        });
    });

    let pulls = OrderBook::new(TickRatio::HUNDREDTH, 1.0, 200.0).expect("book");
    c.bench_function("insert_and_pull", |b| {
        b.iter(|| {
            let id = pulls
                .insert_limit_order(Side::Buy, 50.0, 1, None, None)
                .expect("insert");
            pulls.pull_order(id, true).expect("pull");
        });
    });
}

criterion_group!(benches, matching_benchmarks);
criterion_main!(benches);
