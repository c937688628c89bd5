//! The timing harness: generate the datasets, then drive every catalog of
//! both backends through the six operations and time each one.
//!
//! A run either returns a complete [`TimingReport`] or fails as a whole.
//! Whatever happens, each connection opened by the run is closed once and the
//! generated files are deleted.

use crate::catalog::redis_store::RedisBackend;
use crate::catalog::sqlite::SqliteBackend;
use crate::catalog::{
    Backend, Catalog, CityStats, Configuration, InsertSource, Operation, Representation,
};
use crate::config::BenchConfig;
use crate::dataset::{self, DatasetFiles};
use crate::error::HarnessError;
use crate::generator::Generator;
use crate::report::TimingReport;
use etl_core::NestedRecord;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub struct Harness<R, D> {
    relational: R,
    document: D,
    output_dir: PathBuf,
    generator: Generator,
}

impl Harness<SqliteBackend, RedisBackend> {
    /// SQLite and Redis backends as described by `config`.
    pub fn from_config(config: &BenchConfig) -> Self {
        Harness::new(
            SqliteBackend::new(&config.relational.path),
            RedisBackend::new(config.document.url()),
            &config.output_dir,
        )
        .with_generator(Generator::with_seed(config.seed))
    }
}

impl<R: Backend, D: Backend> Harness<R, D> {
    pub fn new(relational: R, document: D, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            relational,
            document,
            output_dir: output_dir.into(),
            generator: Generator::default(),
        }
    }

    /// Replace the entropy-seeded default generator.
    pub fn with_generator(mut self, generator: Generator) -> Self {
        self.generator = generator;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Benchmark every configuration on `n` generated records.
    pub fn run(&self, n: usize) -> Result<TimingReport, HarnessError> {
        if n == 0 {
            return Err(HarnessError::InvalidRecordCount);
        }

        let mut rel = self
            .relational
            .connect()
            .map_err(|source| HarnessError::Connection {
                backend: self.relational.kind(),
                source,
            })?;
        let mut doc = match self.document.connect() {
            Ok(conn) => conn,
            Err(source) => {
                release(&self.relational, rel);
                return Err(HarnessError::Connection {
                    backend: self.document.kind(),
                    source,
                });
            }
        };

        let outcome = self.run_connected(n, &mut rel, &mut doc);

        release(&self.relational, rel);
        release(&self.document, doc);

        if let Ok(report) = &outcome {
            log::info!(
                "Benchmark finished: {} configurations",
                report.configuration_count()
            );
        }
        outcome
    }

    fn run_connected(
        &self,
        n: usize,
        rel: &mut R::Conn,
        doc: &mut D::Conn,
    ) -> Result<TimingReport, HarnessError> {
        // Dropping the guard deletes both files on every exit path.
        let files = DatasetFiles::in_dir(&self.output_dir);
        self.generator
            .write(n, &files)
            .map_err(HarnessError::Generation)?;

        let mut sources = Sources::new(&files);
        let mut report = TimingReport::new();

        for catalog in self.relational.catalogs() {
            run_catalog(catalog.as_ref(), rel, &mut sources, &mut report)?;
        }
        for catalog in self.document.catalogs() {
            run_catalog(catalog.as_ref(), doc, &mut sources, &mut report)?;
        }
        Ok(report)
    }
}

/// Close `conn`, logging rather than returning a failure.
fn release<B: Backend>(backend: &B, conn: B::Conn) {
    match backend.close(conn) {
        Ok(()) => log::debug!("Closed {} connection", backend.kind()),
        Err(e) => log::warn!("Failed to close {} connection: {e:#}", backend.kind()),
    }
}

/// Run `f` and measure it with the monotonic clock. Nothing else happens
/// between the two clock reads.
pub fn timed<T, E>(f: impl FnOnce() -> Result<T, E>) -> Result<(T, Duration), E> {
    let start = Instant::now();
    let value = f()?;
    Ok((value, start.elapsed()))
}

/// Insert inputs, resolved once per run.
struct Sources<'f> {
    files: &'f DatasetFiles,
    nested: Option<Vec<NestedRecord>>,
}

impl<'f> Sources<'f> {
    fn new(files: &'f DatasetFiles) -> Self {
        Self {
            files,
            nested: None,
        }
    }

    fn resolve(&mut self, configuration: Configuration) -> Result<InsertSource<'_>, HarnessError> {
        let dataset_err = |source| HarnessError::Dataset {
            configuration,
            source,
        };
        match configuration.representation() {
            Representation::Flat => {
                dataset::require(self.files.flat_path()).map_err(dataset_err)?;
                Ok(InsertSource::Flat(self.files.flat_path()))
            }
            Representation::Nested => {
                if self.nested.is_none() {
                    let docs = dataset::read_nested(self.files.nested_path()).map_err(dataset_err)?;
                    self.nested = Some(docs);
                }
                Ok(InsertSource::Nested(self.nested.as_deref().unwrap_or_default()))
            }
        }
    }
}

/// What an operation returned, kept for logging once the clock has stopped.
enum Outcome {
    Loaded(u64),
    Indexed,
    Count(u64),
    Groups(Vec<CityStats>),
    Updated(u64),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Loaded(n) => write!(f, "{n} records loaded"),
            Outcome::Indexed => f.write_str("indexes built"),
            Outcome::Count(n) => write!(f, "{n} matches"),
            Outcome::Groups(rows) => {
                write!(f, "{} groups", rows.len())?;
                if let Some(top) = rows.first() {
                    write!(f, ", oldest {} ({:.2}, n={})", top.city, top.avg_age, top.count)?;
                }
                Ok(())
            }
            Outcome::Updated(n) => write!(f, "{n} records updated"),
        }
    }
}

fn execute<C>(
    catalog: &dyn Catalog<Conn = C>,
    conn: &mut C,
    operation: Operation,
    source: InsertSource<'_>,
) -> anyhow::Result<Outcome> {
    Ok(match operation {
        Operation::Insert => Outcome::Loaded(catalog.insert(conn, source)?),
        Operation::IndexCreation => {
            catalog.create_indexes(conn)?;
            Outcome::Indexed
        }
        Operation::FlatQuery => Outcome::Count(catalog.flat_query(conn)?),
        Operation::NestedQuery => Outcome::Count(catalog.nested_query(conn)?),
        Operation::ComplexQuery => Outcome::Groups(catalog.complex_query(conn)?),
        Operation::Update => Outcome::Updated(catalog.update(conn)?),
    })
}

fn run_catalog<C>(
    catalog: &dyn Catalog<Conn = C>,
    conn: &mut C,
    sources: &mut Sources<'_>,
    report: &mut TimingReport,
) -> Result<(), HarnessError> {
    let configuration = catalog.configuration();
    log::info!("Running {configuration}...");

    catalog
        .reset(conn)
        .map_err(|source| HarnessError::Reset {
            configuration,
            source,
        })?;
    let source = sources.resolve(configuration)?;

    for operation in Operation::ALL {
        let (outcome, elapsed) = timed(|| execute(catalog, conn, operation, source)).map_err(
            |source| HarnessError::Operation {
                configuration,
                operation,
                source,
            },
        )?;
        let seconds = elapsed.as_secs_f64();
        report.record(configuration, operation, seconds);
        log::debug!("{configuration} {operation}: {seconds:.4}s, {outcome}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_passes_value_through() {
        let (value, elapsed) = timed(|| Ok::<_, ()>(7)).unwrap();
        assert_eq!(value, 7);
        assert!(elapsed.as_secs_f64() >= 0.0);
    }

    #[test]
    fn timed_measures_the_call() {
        let (_, elapsed) = timed(|| {
            std::thread::sleep(Duration::from_millis(20));
            Ok::<_, ()>(())
        })
        .unwrap();
        assert!(elapsed >= Duration::from_millis(20));
    }

    #[test]
    fn timed_propagates_errors() {
        let err = timed(|| Err::<(), _>("boom")).unwrap_err();
        assert_eq!(err, "boom");
    }

    #[test]
    fn zero_records_rejected_before_connecting() {
        // An unreachable port would fail to connect; n == 0 must win first.
        let harness = Harness::new(
            SqliteBackend::new("/nonexistent/dir/bench.sqlite3"),
            RedisBackend::new("redis://127.0.0.1:1/0"),
            "unused",
        );
        assert!(matches!(harness.run(0), Err(HarnessError::InvalidRecordCount)));
    }

    #[test]
    fn nested_source_is_loaded_once() {
        let dir = tempfile::tempdir().unwrap();
        let files = DatasetFiles::in_dir(dir.path());
        Generator::seeded(4).write(12, &files).unwrap();

        let mut sources = Sources::new(&files);
        let first = match sources.resolve(Configuration::RelationalSemiStructured).unwrap() {
            InsertSource::Nested(docs) => docs.len(),
            InsertSource::Flat(_) => panic!("expected nested source"),
        };
        assert_eq!(first, 12);

        // Served from memory even with the file gone.
        std::fs::remove_file(files.nested_path()).unwrap();
        assert!(matches!(
            sources.resolve(Configuration::DocumentNested).unwrap(),
            InsertSource::Nested(docs) if docs.len() == 12
        ));
    }

    #[test]
    fn missing_flat_file_is_a_dataset_error() {
        let dir = tempfile::tempdir().unwrap();
        let files = DatasetFiles::in_dir(dir.path());
        let mut sources = Sources::new(&files);
        let err = sources.resolve(Configuration::DocumentFlat).unwrap_err();
        assert_eq!(err.configuration(), Some(Configuration::DocumentFlat));
        assert!(matches!(err, HarnessError::Dataset { .. }));
    }

    #[test]
    fn outcome_display() {
        let rows = vec![CityStats {
            city: "Boston".to_string(),
            avg_age: 44.5,
            count: 2,
        }];
        assert_eq!(
            Outcome::Groups(rows).to_string(),
            "1 groups, oldest Boston (44.50, n=2)"
        );
        assert_eq!(Outcome::Count(3).to_string(), "3 matches");
    }
}
