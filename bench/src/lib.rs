//! Storage Schema Benchmark
//!
//! Measures what a schema choice costs on two kinds of store by running the
//! same logical workload against four configurations:
//! - **relational+flat**: SQLite table, hobbies as a delimited column
//! - **relational+semi-structured**: SQLite table with a JSON document column
//! - **document+flat**: Redis hashes, hobbies as a delimited field
//! - **document+nested**: Redis JSON documents with a hobby list and metadata
//!
//! Each configuration is reset, loaded, indexed, queried three ways and
//! updated; every step is timed on its own and collected into a
//! [`TimingReport`].
//!
//! Run the suite: `cargo run --release -- [records]`
//! Run benchmarks: `cargo bench`
//! Run tests: `cargo test` (add `-- --ignored` with a Redis server for the
//! document catalogs)

pub mod catalog;
pub mod config;
pub mod dataset;
pub mod error;
pub mod generator;
pub mod harness;
pub mod report;

pub use catalog::{Backend, Catalog, CityStats, Configuration, InsertSource, Operation};
pub use config::BenchConfig;
pub use error::{DatasetError, HarnessError};
pub use generator::Generator;
pub use harness::Harness;
pub use report::TimingReport;
