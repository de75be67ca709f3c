//! Query executor benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ormq_core::config::ExecutorConfig;
use ormq_core::prelude::*;

fn populate(members: usize, teams: usize, config: ExecutorConfig) -> Database {
    let db = Database::new(model::catalog()).with_config(config);
    for id in 1..=teams as i64 {
        db.insert(&Team::new(id, format!("team{}", id))).unwrap();
    }
    for id in 1..=members as i64 {
        let team = Some(id % teams as i64 + 1);
        let age = (id % 80) as i32;
        let member = if id % 10 == 0 {
            Member::anonymous(id, age, team)
        } else {
            Member::new(id, format!("member{}", id), age, team)
        };
        db.insert(&member).unwrap();
    }
    db
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");
    let db = populate(10_000, 10, ExecutorConfig::default());
    let snapshot = db.snapshot();
    let executor = snapshot.executor();
    let m = QMember::member();

    group.bench_function("eq", |b| {
        let query = QueryFactory::new()
            .select_from(&m)
            .where_(m.username.eq("member500"))
            .build()
            .unwrap();
        b.iter(|| black_box(executor.fetch(&query).unwrap()));
    });

    group.bench_function("between", |b| {
        let query = QueryFactory::new()
            .select_from(&m)
            .where_(m.age.between(20, 40))
            .build()
            .unwrap();
        b.iter(|| black_box(executor.fetch(&query).unwrap()));
    });

    group.bench_function("like", |b| {
        let query = QueryFactory::new()
            .select_from(&m)
            .where_(m.username.contains("99"))
            .build()
            .unwrap();
        b.iter(|| black_box(executor.fetch(&query).unwrap()));
    });

    group.finish();
}

fn bench_sort_and_page(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort");
    let db = populate(10_000, 10, ExecutorConfig::default());
    let snapshot = db.snapshot();
    let executor = snapshot.executor();
    let m = QMember::member();

    group.bench_function("order_by_two_keys", |b| {
        let query = QueryFactory::new()
            .select_from(&m)
            .order_by(m.age.desc())
            .order_by(m.username.asc().nulls_last())
            .offset(100)
            .limit(20)
            .build()
            .unwrap();
        b.iter(|| black_box(executor.fetch_results(&query).unwrap()));
    });

    group.finish();
}

fn bench_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("join");
    let m = QMember::member();
    let t = QTeam::team();
    let query = QueryFactory::new()
        .select_from(&m)
        .join(&m.team, &t)
        .where_(t.name.eq("team1"))
        .build()
        .unwrap();

    for size in [100, 1_000, 10_000] {
        for (label, threshold) in [("nested_loop", usize::MAX), ("hash", 0)] {
            let db = populate(size, 50, ExecutorConfig::new().with_hash_join_threshold(threshold));
            let snapshot = db.snapshot();
            group.bench_with_input(BenchmarkId::new(label, size), &size, |b, _| {
                let executor = snapshot.executor();
                b.iter(|| black_box(executor.fetch(&query).unwrap()));
            });
        }
    }

    group.finish();
}

fn bench_group_by(c: &mut Criterion) {
    let db = populate(10_000, 50, ExecutorConfig::default());
    let snapshot = db.snapshot();
    let executor = snapshot.executor();
    let m = QMember::member();
    let t = QTeam::team();

    c.bench_function("group_by/avg_age_per_team", |b| {
        let query = QueryFactory::new()
            .select(vec![(&t.name).into(), m.age.avg().into()])
            .from(&m)
            .join(&m.team, &t)
            .group_by(&t.name)
            .build()
            .unwrap();
        b.iter(|| black_box(executor.fetch(&query).unwrap()));
    });
}

criterion_group!(benches, bench_filter, bench_sort_and_page, bench_join, bench_group_by);
criterion_main!(benches);
