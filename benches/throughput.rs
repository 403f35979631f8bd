use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rulebook::{by_ids, fact, rule_ref, Facts, RuleRepositoryBuilder, Validator};

fn build_shared_validator() -> (Arc<Validator>, Facts) {
    let n = 20;
    let mut builder = RuleRepositoryBuilder::new();
    let mut entries = Vec::with_capacity(n);

    for i in 0..n {
        let name = format!("f{i}");
        let path = name.clone();
        builder = builder.rule(&format!("r{i}"), move |r| r.when(fact(&path).gte(1_i64)));
        entries.push((name, Facts::Int(10)));
    }

    let mut chain = rule_ref("r0").and(rule_ref("r1"));
    for i in 2..n {
        chain = chain.and(rule_ref(&format!("r{i}")));
    }
    builder = builder.rule("final", move |r| r.when(chain));

    let validator = Validator::builder(builder.build().unwrap()).build();
    (Arc::new(validator), Facts::map(entries))
}

fn bench_throughput(c: &mut Criterion) {
    let thread_counts = [1, 2, 4, 8];

    let mut group = c.benchmark_group("throughput");
    group.measurement_time(Duration::from_secs(5));

    for &threads in &thread_counts {
        let (validator, facts) = build_shared_validator();

        group.bench_function(format!("{threads}_threads"), |b| {
            b.iter_custom(|iters| {
                let per_thread = iters / threads as u64;
                let workers: Vec<_> = (0..threads)
                    .map(|_| {
                        let (validator, facts) = (Arc::clone(&validator), facts.clone());
                        thread::spawn(move || {
                            let selector = by_ids(["final"]);
                            let start = Instant::now();
                            for _ in 0..per_thread {
                                black_box(validator.is_valid(&facts, &selector).ok());
                            }
                            start.elapsed()
                        })
                    })
                    .collect();

                // Wall time of the slowest worker.
                workers
                    .into_iter()
                    .map(|w| w.join().unwrap())
                    .max()
                    .unwrap_or(Duration::ZERO)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_throughput);
criterion_main!(benches);
