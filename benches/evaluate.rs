use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rulebook::{
    by_ids, fact, rule_ref, this, Facts, PathResolver, RuleRepositoryBuilder, SimpleRuleRepository, Validator,
};

/// `n` leaf rules (each comparing a unique fact) and one rule that ANDs them
/// all together, plus matching facts.
fn build_chain(n: usize) -> (SimpleRuleRepository, Facts) {
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

    (builder.build().unwrap(), Facts::map(entries))
}

/// A dispatching rule over a list of `n` items.
fn build_fan_out(n: usize) -> (SimpleRuleRepository, Facts) {
    let repository = RuleRepositoryBuilder::new()
        .rule("positive", |r| r.when(this().gt(0_i64)))
        .rule("items", |r| r.dispatch().on("items/*", by_ids(["positive"])).build())
        .build()
        .unwrap();
    let facts = Facts::map([("items", Facts::list((0..n).map(|i| i as i64 + 1)))]);
    (repository, facts)
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_validation");

    for &n in &[5, 20, 50] {
        let (repository, facts) = build_chain(n);
        let validator = Validator::builder(repository).build();
        let selector = by_ids(["final"]);
        group.bench_function(format!("{n}_rule_chain"), |b| {
            b.iter(|| validator.validate(black_box(&facts), &selector).unwrap());
        });
    }

    for &n in &[10, 100, 1000] {
        let (repository, facts) = build_fan_out(n);
        let validator = Validator::builder(repository).build();
        let selector = by_ids(["items"]);
        group.bench_function(format!("{n}_item_dispatch"), |b| {
            b.iter(|| validator.validate(black_box(&facts), &selector).unwrap());
        });
    }

    group.finish();
}

fn bench_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("paths");
    let resolver = PathResolver::default();

    let (_, facts) = build_fan_out(100);
    let many = resolver.parse("**").unwrap();
    group.bench_function("expand_many_levels_100", |b| {
        b.iter(|| resolver.resolve_pattern(black_box(&facts), &many).count());
    });

    group.bench_function("parse", |b| {
        b.iter(|| resolver.parse(black_box("orders/*/lines/**/qty")).unwrap());
    });

    group.finish();
}

fn bench_repository_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("repository_build");

    for &n in &[5, 20, 50] {
        group.bench_function(format!("{n}_rules"), |b| {
            b.iter(|| black_box(build_chain(n)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_validate, bench_paths, bench_repository_build);
criterion_main!(benches);
