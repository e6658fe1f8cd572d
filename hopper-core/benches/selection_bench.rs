use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use hopper_core::eligibility::EligibilityPolicy;
use hopper_core::infrastructure::ReservationStore;
use hopper_core::infrastructure_in_memory::InMemoryReservationStore;
use hopper_core::selector::{Selector, SelectorConfig};
use hopper_core::source::BatchSource;
use hopper_core::types::Candidate;

fn listing(count: usize) -> Vec<Candidate> {
    (0..count)
        .map(|i| Candidate::new(format!("srv-{}", i), (i % 12) as u32, 10))
        .collect()
}

fn bench_eligibility(c: &mut Criterion) {
    let policy = EligibilityPolicy::default().with_slack(2);
    let servers = listing(1000);

    c.bench_function("eligibility_screen_1000", |b| {
        b.iter(|| black_box(servers.iter().filter(|s| policy.is_eligible(s)).count()))
    });
}

fn bench_batch_selection(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime");
    let mut group = c.benchmark_group("batch_selection");

    for reserved in [0usize, 100, 500] {
        group.bench_with_input(
            BenchmarkId::new("reserved_ahead", reserved),
            &reserved,
            |b, &reserved| {
                b.iter(|| {
                    runtime.block_on(async {
                        let store = Arc::new(InMemoryReservationStore::new());
                        let servers = listing(1000);

                        // Reserve the first N eligible servers so the pass must skip them
                        let policy = EligibilityPolicy::default();
                        for s in servers.iter().filter(|s| policy.is_eligible(s)).take(reserved) {
                            store.put(&s.id, "bench", 450).await.ok();
                        }

                        let selector = Selector::new(store, policy, SelectorConfig::default());
                        let mut source = BatchSource::new(servers);
                        black_box(selector.select_once(&mut source).await.ok())
                    })
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_eligibility, bench_batch_selection);
criterion_main!(benches);
