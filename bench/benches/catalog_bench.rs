//! Criterion benchmark harness: measures the SQLite catalog operations for
//! both relational schemas at two dataset sizes.

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use etl_core::NestedRecord;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use storage_bench::catalog::flat_table::FlatTable;
use storage_bench::catalog::json_table::JsonTable;
use storage_bench::catalog::sqlite::SqliteBackend;
use storage_bench::catalog::{Backend, Catalog, InsertSource, Representation};
use storage_bench::dataset;
use storage_bench::Generator;

/// Dataset sizes to benchmark.
fn dataset_sizes() -> Vec<(&'static str, usize)> {
    vec![("1k", 1_000), ("10k", 10_000)]
}

/// Generated files plus the parsed nested documents for one size.
struct Fixture {
    _dir: tempfile::TempDir,
    flat: PathBuf,
    nested: Vec<NestedRecord>,
}

fn fixture(n: usize) -> Fixture {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let (flat, nested) = Generator::seeded(2024)
        .generate(n, dir.path())
        .expect("Failed to generate dataset");
    let nested = dataset::read_nested(&nested).expect("Failed to read documents");
    Fixture {
        _dir: dir,
        flat,
        nested,
    }
}

impl Fixture {
    fn source_for(&self, catalog: &dyn Catalog<Conn = Connection>) -> InsertSource<'_> {
        match catalog.configuration().representation() {
            Representation::Flat => InsertSource::Flat(self.flat_path()),
            Representation::Nested => InsertSource::Nested(&self.nested),
        }
    }

    fn flat_path(&self) -> &Path {
        &self.flat
    }
}

/// Fresh in-memory database with the catalog loaded and indexed.
fn loaded(catalog: &dyn Catalog<Conn = Connection>, fx: &Fixture) -> Connection {
    let mut conn = SqliteBackend::in_memory()
        .connect()
        .expect("Failed to open in-memory SQLite");
    catalog.reset(&mut conn).expect("Failed to reset");
    catalog
        .insert(&mut conn, fx.source_for(catalog))
        .expect("Failed to insert");
    catalog
        .create_indexes(&mut conn)
        .expect("Failed to create indexes");
    conn
}

fn bench_catalog(c: &mut Criterion, name: &str, catalog: &dyn Catalog<Conn = Connection>) {
    let mut group = c.benchmark_group(format!("catalog/{name}"));
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for (label, n) in dataset_sizes() {
        let fx = fixture(n);

        group.bench_function(BenchmarkId::new("insert", label), |b| {
            b.iter_batched(
                || {
                    let mut conn = SqliteBackend::in_memory().connect().expect("open");
                    catalog.reset(&mut conn).expect("reset");
                    conn
                },
                |mut conn| {
                    catalog
                        .insert(&mut conn, fx.source_for(catalog))
                        .expect("insert failed")
                },
                BatchSize::PerIteration,
            );
        });

        let mut conn = loaded(catalog, &fx);
        group.bench_function(BenchmarkId::new("flat_query", label), |b| {
            b.iter(|| catalog.flat_query(&mut conn).expect("flat query failed"));
        });
        group.bench_function(BenchmarkId::new("nested_query", label), |b| {
            b.iter(|| catalog.nested_query(&mut conn).expect("nested query failed"));
        });
        group.bench_function(BenchmarkId::new("complex_query", label), |b| {
            b.iter(|| catalog.complex_query(&mut conn).expect("complex query failed"));
        });
        group.bench_function(BenchmarkId::new("update", label), |b| {
            b.iter(|| catalog.update(&mut conn).expect("update failed"));
        });
    }
    group.finish();
}

fn bench_flat_table(c: &mut Criterion) {
    bench_catalog(c, "relational_flat", &FlatTable::new());
}

fn bench_json_table(c: &mut Criterion) {
    bench_catalog(c, "relational_semi_structured", &JsonTable::new());
}

criterion_group!(benches, bench_flat_table, bench_json_table);
criterion_main!(benches);
