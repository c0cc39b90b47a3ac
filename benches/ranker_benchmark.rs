use criterion::{criterion_group, criterion_main, Criterion};
use intra_lookup::db::MemoryProfileStore;
use intra_lookup::models::ProfileRecord;
use intra_lookup::services::SearchRanker;
use std::hint::black_box;
use std::sync::Arc;

fn profile(i: usize) -> ProfileRecord {
    ProfileRecord {
        login: format!("user{:05}", i),
        display_name: format!("Student Number {}", i),
        email: None,
        image_url: None,
        image_small_url: None,
        wallet: 0,
        correction_points: 0,
        location: None,
        pool_year: None,
        cursus: vec![],
        projects: vec![],
        enriched: false,
        last_refreshed_at: chrono::Utc::now(),
    }
}

fn benchmark_suggest(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("Failed to build runtime");

    // Campus-sized cache
    let store = MemoryProfileStore::new();
    store.seed((0..10_000).map(profile));
    let ranker = SearchRanker::new(Arc::new(store));

    let mut group = c.benchmark_group("suggest");

    group.bench_function("login_prefix_many_matches", |b| {
        b.iter(|| rt.block_on(ranker.suggest(black_box("user0"), 10)))
    });

    group.bench_function("all_tiers_scanned", |b| {
        b.iter(|| rt.block_on(ranker.suggest(black_box("number 42"), 10)))
    });

    group.bench_function("no_match", |b| {
        b.iter(|| rt.block_on(ranker.suggest(black_box("zzz"), 10)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_suggest);
criterion_main!(benches);
