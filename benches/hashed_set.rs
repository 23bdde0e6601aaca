use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use association::chunk::{ChunkManager, VisitTracker};
use association::stdx::bitset::{BitSet, words_for_bits};

const CHURN_ROUNDS: usize = 1_000;

/// Insert/find/erase churn through the visit tracker's hashed set at a few
/// occupancy levels.
fn bench_tracker_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("visit_tracker_churn");
    for occupancy in [4usize, 8, 15] {
        group.throughput(Throughput::Elements(CHURN_ROUNDS as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(occupancy),
            &occupancy,
            |b, &occupancy| {
                b.iter(|| {
                    let mut tracker = VisitTracker::new();
                    for id in 0..occupancy as i64 {
                        tracker.insert(id);
                    }
                    for round in 0..CHURN_ROUNDS as i64 {
                        // Cycle one slot while the rest stay resident.
                        let id = 1_000 + round;
                        tracker.insert(id);
                        black_box(tracker.is_valid(id));
                        tracker.erase(id);
                    }
                    black_box(tracker.len())
                });
            },
        );
    }
    group.finish();
}

/// Multi-bit claim/release cycles at increasing claim widths.
fn bench_bitset_claim(c: &mut Criterion) {
    type PoolBits = BitSet<1024, { words_for_bits(1024) }>;

    let mut group = c.benchmark_group("bitset_claim");
    for width in [1usize, 4, 16] {
        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            // Half-full pool so every claim scans past occupied words.
            let mut base = PoolBits::empty();
            for idx in (0..1024).step_by(2) {
                base.set(idx);
            }
            let mut indexes = vec![0usize; width];
            b.iter(|| {
                let mut bits = base;
                assert!(bits.claim(&mut indexes));
                bits.release(&indexes);
                black_box(indexes[width - 1])
            });
        });
    }
    group.finish();
}

/// Full visit lifecycle against the manager: register, create, hand off, end.
fn bench_visit_lifecycle(c: &mut Criterion) {
    c.bench_function("visit_lifecycle", |b| {
        let manager = ChunkManager::new(0);
        let chunk_ids: Vec<i64> = (0..8).collect();
        let mut next_visit = 0i64;
        b.iter(|| {
            let first = next_visit;
            let second = next_visit + 1;
            next_visit += 2;

            manager.register_visit(first).unwrap();
            let start = manager.start_visit(first, &chunk_ids).unwrap();
            black_box(&start.to_read);

            manager.register_visit(second).unwrap();
            manager.start_visit(second, &chunk_ids).unwrap();

            manager.end_visit(first, false);
            manager.end_visit(second, false);
        });
    });
}

criterion_group!(
    benches,
    bench_tracker_churn,
    bench_bitset_claim,
    bench_visit_lifecycle
);
criterion_main!(benches);
