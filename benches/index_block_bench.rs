//! Benchmarks for the index block codec and the block pool
//!
//! Covers:
//! - index block decode and serialize
//! - compare_equal and diff_against on nearly-equal blocks
//! - pool acquire/release cycles, single threaded and contended
//! - presence bitset construction over a long chain

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;
use waveform_index::constants::{FULL_BITMAP, MAX_EXTENTS};
use waveform_index::{Extent, IndexBlock, IndexBlockPool, PoolConfig, SeedName};

fn seed_name() -> SeedName {
    SeedName::parse("NTBOU  BHZ").unwrap()
}

/// Index block with every extent used and full
fn full_block(number: i32) -> IndexBlock {
    let mut block = IndexBlock::new(seed_name(), number);
    for (i, extent) in block.extents.iter_mut().enumerate() {
        *extent = Extent {
            bitmap: FULL_BITMAP,
            ..Extent::starting_at(1000 + 64 * i as i32)
        };
    }
    block
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(1));

    let block = full_block(42);
    let raw = block.serialize();

    group.bench_function("serialize", |b| b.iter(|| black_box(black_box(&block).serialize())));
    group.bench_function("load", |b| b.iter(|| black_box(IndexBlock::load(black_box(&raw), 42).unwrap())));

    group.finish();
}

fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");

    let ours = full_block(7);
    for differing in [0usize, 1, MAX_EXTENTS / 2] {
        let mut theirs = ours.clone();
        for extent in theirs.extents.iter_mut().take(differing) {
            extent.bitmap &= !1;
        }
        group.bench_with_input(BenchmarkId::new("compare_equal", differing), &theirs, |b, theirs| {
            b.iter(|| black_box(ours.compare_equal(black_box(theirs))))
        });
        group.bench_with_input(BenchmarkId::new("diff_against", differing), &theirs, |b, theirs| {
            b.iter(|| black_box(ours.diff_against(black_box(theirs))))
        });
    }

    group.finish();
}

fn bench_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool");
    let raw = full_block(3).serialize();

    group.bench_function("acquire_release", |b| {
        let pool = IndexBlockPool::new();
        pool.prewarm(16);
        b.iter(|| {
            let handle = pool.acquire(&raw, 3).unwrap();
            pool.release(handle).unwrap();
        })
    });

    for threads in [2usize, 4, 8] {
        group.throughput(Throughput::Elements((threads * 100) as u64));
        group.bench_with_input(BenchmarkId::new("contended", threads), &threads, |b, &threads| {
            let pool = Arc::new(IndexBlockPool::with_config(PoolConfig::default()));
            b.iter(|| {
                let workers: Vec<_> = (0..threads)
                    .map(|_| {
                        let pool = Arc::clone(&pool);
                        thread::spawn(move || {
                            for _ in 0..100 {
                                let handle = pool.acquire(&raw, 3).unwrap();
                                pool.with_block(handle, |block| black_box(block.used_extent_count())).unwrap();
                                pool.release(handle).unwrap();
                            }
                        })
                    })
                    .collect();
                for worker in workers {
                    worker.join().unwrap();
                }
            })
        });
    }

    group.finish();
}

fn bench_presence(c: &mut Criterion) {
    let blocks: Vec<IndexBlock> = (0..200).map(full_block).collect();

    c.bench_function("presence_union_200_blocks", |b| {
        b.iter(|| {
            let mut presence = fixedbitset::FixedBitSet::new();
            for block in &blocks {
                block.union_presence_into(&mut presence, usize::MAX);
            }
            black_box(presence.count_ones(..))
        })
    });
}

criterion_group!(benches, bench_codec, bench_compare, bench_pool, bench_presence);
criterion_main!(benches);
