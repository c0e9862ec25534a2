use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use docdex::core::config::Config;
use docdex::core::context::WorkContext;
use docdex::core::types::Etag;
use docdex::indexing::index::Index;
use docdex::indexing::map::SourceDocument;
use docdex::indexing::view_generator::SimpleViewGenerator;
use docdex::query::types::IndexQuery;
use docdex::schema::definition::{FieldStorage, IndexDefinition};
use docdex::search::projection::FieldsToFetch;
use docdex::storage::accessor::InMemoryStorage;
use docdex::storage::layout::IndexStorage;
use rand::Rng;
use serde_json::json;
use std::sync::Arc;

const CITIES: [&str; 8] = ["hadera", "haifa", "tel-aviv", "eilat", "acre", "jaffa", "safed", "ashdod"];

fn memory_index() -> Index {
    let config = Config { run_in_memory: true, ..Config::default() };
    let index_storage = Arc::new(IndexStorage::in_memory(&config));
    let context = WorkContext::new(config, Arc::new(InMemoryStorage::new()), index_storage);
    let definition = IndexDefinition::new("Users/ByCity").store("__all_fields", FieldStorage::Yes);
    let generator = SimpleViewGenerator::projecting(&["Name", "City", "Age"]);
    Index::new(definition, Arc::new(generator), Arc::new(context)).unwrap()
}

/// Helper to create source documents with random cities and ages
fn create_documents(first: u64, count: u64) -> Vec<SourceDocument> {
    let mut rng = rand::thread_rng();
    (first..first + count)
        .map(|id| {
            let city = CITIES[rng.gen_range(0..CITIES.len())];
            SourceDocument::new(
                format!("users/{}", id),
                Etag(id),
                json!({"Name": format!("user {}", id), "City": city, "Age": rng.gen_range(18..90)}),
            )
        })
        .collect()
}

fn bench_index_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_documents");

    for batch_size in [10u64, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), batch_size, |b, &batch_size| {
            let index = memory_index();
            let mut next = 0;
            b.iter(|| {
                let docs = create_documents(next, batch_size);
                next += batch_size;
                black_box(index.index_documents(&docs).unwrap());
            });
        });
    }
    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let index = memory_index();
    index.index_documents(&create_documents(0, 5000)).unwrap();

    c.bench_function("term_query_first_page", |b| {
        b.iter(|| {
            let results = index.query(IndexQuery::new("City:haifa"), FieldsToFetch::none(), &|_| true).unwrap();
            black_box(results.len());
        });
    });

    c.bench_function("sorted_query_deep_page", |b| {
        b.iter(|| {
            let query = IndexQuery::new("").sort_by("-Age_Range").with_paging(2000, 50);
            black_box(index.query(query, FieldsToFetch::none(), &|_| true).unwrap());
        });
    });

    c.bench_function("distinct_projection", |b| {
        b.iter(|| {
            let query = IndexQuery::new("").with_paging(0, 8);
            black_box(index.query(query, FieldsToFetch::new(&["City"], true), &|_| true).unwrap());
        });
    });

    c.bench_function("intersection_query", |b| {
        b.iter(|| {
            let query = IndexQuery::new("City:haifa INTERSECT Age:42");
            black_box(index.intersection_query(query, FieldsToFetch::none(), &|_| true).unwrap());
        });
    });
}

criterion_group!(benches, bench_index_batches, bench_queries);
criterion_main!(benches);
