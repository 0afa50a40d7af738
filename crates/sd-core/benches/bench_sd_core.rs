use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sd_core::{CompressedPrompt, CompressionMetrics};

fn bench_metrics_new(c: &mut Criterion) {
    c.bench_function("metrics_new_10000", |b| {
        b.iter(|| {
            for i in 0..10_000i64 {
                black_box(CompressionMetrics::new(black_box(i * 2), black_box(i), 5, None).ok());
            }
        })
    });
}

fn bench_derived(c: &mut Criterion) {
    let prompts: Vec<CompressedPrompt> = (0..1000i64)
        .map(|i| {
            let m = CompressionMetrics::new(i * 3, i, i, None).unwrap();
            CompressedPrompt::new(format!("compressed {i}"), m)
        })
        .collect();

    c.bench_function("derived_savings_ratio_1000", |b| {
        b.iter(|| {
            let mut total = 0.0;
            for p in &prompts {
                total += p.savings_percent() + p.compression_ratio();
            }
            black_box(total)
        })
    });

    c.bench_function("stats_report_1000", |b| {
        b.iter(|| {
            for p in &prompts {
                black_box(p.stats_report());
            }
        })
    });
}

criterion_group!(benches, bench_metrics_new, bench_derived);
criterion_main!(benches);
