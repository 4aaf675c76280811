//! Criterion benchmarks for the pi engine.
//!
//! Run with: `cargo bench`
//! View HTML reports in: `target/criterion/report/index.html`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use cod_core::algo::{base_triple, binary_split, binary_split_parallel};
use cod_core::{compute_pi, compute_pi_with, term_count, Evaluation, PiInt, PiOps, PiOptions, Triple};

/// Left fold over the terms, for comparison with the balanced split tree.
///
/// Operand sizes are maximally unbalanced, so every product pays the full
/// cost of the accumulated value.
fn split_linear(a: u64, b: u64) -> Triple {
    let mut acc = base_triple(a);
    for k in a + 1..b {
        let t = base_triple(k);
        acc = Triple {
            p: acc.p.product(&t.p),
            r: t.q.product(&acc.r) + acc.p.product(&t.r),
            q: acc.q.product(&t.q),
        };
    }
    acc
}

/// Benchmark comparing the linear fold vs binary splitting.
fn linear_vs_split_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("linear_vs_split");
    // Limit sample size for the linear fold as it gets very slow
    group.sample_size(10);

    for terms in [100u64, 500, 1_000, 2_000] {
        group.throughput(Throughput::Elements(terms));

        group.bench_with_input(BenchmarkId::new("linear", terms), &terms, |b, &n| {
            b.iter(|| split_linear(1, black_box(n) + 1))
        });

        group.bench_with_input(BenchmarkId::new("binary_split", terms), &terms, |b, &n| {
            b.iter(|| binary_split(1, black_box(n) + 1))
        });
    }

    group.finish();
}

/// Benchmark comparing the evaluation strategies at various digit counts.
fn strategy_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("strategy_comparison");
    group.sample_size(20);

    for digits in [1_000i64, 10_000, 50_000, 100_000] {
        group.throughput(Throughput::Elements(digits as u64));

        for evaluation in [Evaluation::Sequential, Evaluation::Parallel, Evaluation::Adaptive] {
            let options = PiOptions::with_evaluation(evaluation);
            group.bench_with_input(
                BenchmarkId::new(evaluation.to_string(), digits),
                &digits,
                |b, &d| b.iter(|| compute_pi_with(black_box(d), &options)),
            );
        }
    }

    group.finish();
}

/// Benchmark the split engine alone, without the final square root and division.
fn engine_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_scaling");
    group.sample_size(10);

    for exp in 3..=6 {
        let digits = 10u64.pow(exp);
        let terms = term_count(digits);
        group.throughput(Throughput::Elements(terms));

        group.bench_with_input(BenchmarkId::from_parameter(digits), &terms, |b, &n| {
            b.iter(|| binary_split_parallel(1, black_box(n)))
        });
    }

    group.finish();
}

/// Benchmark small digit counts (where fixed costs dominate).
fn small_input_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("small_inputs");

    for digits in [1i64, 10, 50, 100, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(digits), &digits, |b, &d| {
            b.iter(|| compute_pi(black_box(d)))
        });
    }

    group.finish();
}

/// Benchmark the final fixed-point square root on its own.
fn isqrt_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixed_point_isqrt");
    group.sample_size(20);

    for bits in [10_000usize, 100_000, 1_000_000] {
        let radicand = PiInt::from(10_005u32).shl_bits(2 * bits);
        group.bench_with_input(BenchmarkId::from_parameter(bits), &radicand, |b, n| {
            b.iter(|| black_box(n).isqrt())
        });
    }

    group.finish();
}

/// Benchmark scalability with number of cores.
fn scalability_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("scalability_cores");
    let digits = 200_000i64; // Large enough to see parallel benefits
    group.sample_size(10);
    group.throughput(Throughput::Elements(digits as u64));

    for threads in [1, 2, 4, 8, 16] {
        // The global rayon pool is fixed once initialized, so each
        // measurement runs inside its own pool.
        group.bench_with_input(BenchmarkId::new("threads", threads), &threads, |b, &t| {
            b.iter_custom(|iters| {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(t)
                    .build()
                    .unwrap();
                let options = PiOptions::with_evaluation(Evaluation::Parallel);

                let start = std::time::Instant::now();
                for _ in 0..iters {
                    pool.install(|| {
                        let _ = compute_pi_with(black_box(digits), &options);
                    });
                }
                start.elapsed()
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    strategy_comparison,
    engine_scaling,
    small_input_benchmark,
    isqrt_benchmark,
    linear_vs_split_comparison,
    scalability_benchmark,
);
criterion_main!(benches);
