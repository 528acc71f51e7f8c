use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use storyrag_embeddings::StaticEmbeddingProvider;
use storyrag_retrieval::{
    HybridRetrieval, NormalizeOptions, RetrievalConfig, SearchCandidate, hybrid_search, normalize,
};
use storyrag_store::{Filters, MemoryStore, StoreConfig, StoryDocument};
use tokio::runtime::Runtime;

const DIMENSIONS: usize = 16;

fn embedding_for(i: usize) -> Vec<f32> {
    (0..DIMENSIONS)
        .map(|d| (((i * 31 + d * 7) % 97) as f32 / 97.0) - 0.5)
        .collect()
}

fn create_test_stories(count: usize) -> Vec<StoryDocument> {
    const TOPICS: [&str; 5] = [
        "password reset",
        "single sign-on",
        "billing export",
        "dark mode",
        "audit log",
    ];
    (0..count)
        .map(|i| {
            let topic = TOPICS[i % TOPICS.len()];
            StoryDocument::new(
                format!("{i}"),
                format!("HC-{i}"),
                format!("As a user I want {topic} number {i}"),
            )
            .with_description(format!("Acceptance criteria for {topic} story {i}"))
            .with_embedding(embedding_for(i))
        })
        .collect()
}

fn setup_retrieval(story_count: usize) -> HybridRetrieval {
    let store =
        MemoryStore::with_documents(StoreConfig::default(), create_test_stories(story_count));
    let provider = StaticEmbeddingProvider::new().with_fallback(embedding_for(7));
    HybridRetrieval::new(RetrievalConfig::default(), Arc::new(provider), Arc::new(store)).unwrap()
}

fn bench_search_latency(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("search_latency");

    for story_count in [100, 500, 1000, 5000] {
        group.throughput(Throughput::Elements(story_count as u64));

        let retrieval = setup_retrieval(story_count);
        let filters = Filters::new();

        group.bench_with_input(
            BenchmarkId::from_parameter(story_count),
            &story_count,
            |b, _| {
                b.to_async(&rt).iter(|| async {
                    let results = retrieval
                        .search(black_box("password reset"), &filters)
                        .await
                        .unwrap();
                    black_box(results);
                });
            },
        );
    }

    group.finish();
}

fn bench_query_shapes(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let retrieval = setup_retrieval(1000);
    let filters = Filters::new();

    let mut group = c.benchmark_group("query_shapes");

    group.bench_function("key_lookup", |b| {
        b.to_async(&rt).iter(|| async {
            let results = retrieval.search(black_box("HC-42"), &filters).await.unwrap();
            black_box(results);
        });
    });

    group.bench_function("typo_query", |b| {
        b.to_async(&rt).iter(|| async {
            let results = retrieval
                .search(black_box("pasword resett"), &filters)
                .await
                .unwrap();
            black_box(results);
        });
    });

    group.finish();
}

fn bench_fusion(c: &mut Criterion) {
    let mut group = c.benchmark_group("fusion");

    for size in [10, 100, 1000] {
        let bm25: Vec<SearchCandidate> = (0..size)
            .map(|i| {
                SearchCandidate::new(format!("{i}"), format!("HC-{i}"), "story", (size - i) as f32)
            })
            .collect();
        let vector: Vec<SearchCandidate> = (0..size)
            .map(|i| {
                SearchCandidate::new(
                    format!("{}", i * 2),
                    format!("HC-{}", i * 2),
                    "story",
                    1.0 - i as f32 / size as f32,
                )
            })
            .collect();
        let filters = Filters::new();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let fused = hybrid_search(
                    black_box(&vector),
                    black_box(&bm25),
                    10,
                    &filters,
                    0.5,
                    0.5,
                );
                black_box(fused);
            });
        });
    }

    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let options = NormalizeOptions {
        remove_special_chars: true,
        ..Default::default()
    };
    c.bench_function("normalize", |b| {
        b.iter(|| {
            black_box(normalize(
                black_box("  As a USER, I want to reset my password (HC-257) via e-mail!  "),
                &options,
            ))
        });
    });
}

criterion_group!(
    benches,
    bench_search_latency,
    bench_query_shapes,
    bench_fusion,
    bench_normalize
);
criterion_main!(benches);
