//! The operation catalog: six logical operations, implemented once per
//! storage configuration.
//!
//! Four implementations are provided:
//! - [`flat_table::FlatTable`]: SQLite table with one column per field
//! - [`json_table::JsonTable`]: SQLite table with a JSON document column
//! - [`hash_collection::HashCollection`]: Redis hashes, hobbies as a delimited string
//! - [`json_collection::JsonCollection`]: Redis JSON documents with nested fields
//!
//! A [`Backend`] owns the connection lifecycle for two of them.

pub mod flat_table;
pub mod hash_collection;
pub mod json_collection;
pub mod json_table;
pub mod redis_store;
pub mod sqlite;

use anyhow::Result;
use etl_core::NestedRecord;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// `flat_query` counts records strictly older than this.
pub const FLAT_QUERY_MIN_AGE: u32 = 30;
/// `complex_query` keeps records strictly older than this.
pub const COMPLEX_QUERY_MIN_AGE: u32 = 25;
/// Hobby tag matched by `nested_query` and `complex_query`.
pub const QUERY_HOBBY: &str = "sports";
/// `update` increments the age of everyone living here.
pub const UPDATE_CITY: &str = "New York";

/// One backend type paired with one schema style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Configuration {
    RelationalFlat,
    RelationalSemiStructured,
    DocumentFlat,
    DocumentNested,
}

impl Configuration {
    /// Every configuration, in run order.
    pub const ALL: [Configuration; 4] = [
        Configuration::RelationalFlat,
        Configuration::RelationalSemiStructured,
        Configuration::DocumentFlat,
        Configuration::DocumentNested,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Configuration::RelationalFlat => "relational+flat",
            Configuration::RelationalSemiStructured => "relational+semi-structured",
            Configuration::DocumentFlat => "document+flat",
            Configuration::DocumentNested => "document+nested",
        }
    }

    /// Which dataset file feeds this configuration's insert.
    pub fn representation(self) -> Representation {
        match self {
            Configuration::RelationalFlat | Configuration::DocumentFlat => Representation::Flat,
            Configuration::RelationalSemiStructured | Configuration::DocumentNested => {
                Representation::Nested
            }
        }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Configuration {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Configuration::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown configuration '{s}'"))
    }
}

/// Dataset encoding a configuration consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// Delimited table, hobbies as one string column.
    Flat,
    /// Document array, hobbies as a list plus a metadata sub-record.
    Nested,
}

/// The six timed operations, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    Insert,
    IndexCreation,
    FlatQuery,
    NestedQuery,
    ComplexQuery,
    Update,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Insert,
        Operation::IndexCreation,
        Operation::FlatQuery,
        Operation::NestedQuery,
        Operation::ComplexQuery,
        Operation::Update,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::IndexCreation => "index_creation",
            Operation::FlatQuery => "flat_query",
            Operation::NestedQuery => "nested_query",
            Operation::ComplexQuery => "complex_query",
            Operation::Update => "update",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Operation::ALL
            .into_iter()
            .find(|o| o.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown operation '{s}'"))
    }
}

/// One group of the complex query: records per city with their mean age.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityStats {
    pub city: String,
    pub avg_age: f64,
    pub count: u64,
}

/// Sort grouped rows by average age, oldest first.
pub(crate) fn sort_by_avg_age_desc(rows: &mut [CityStats]) {
    rows.sort_by(|a, b| {
        b.avg_age
            .total_cmp(&a.avg_age)
            .then_with(|| a.city.cmp(&b.city))
    });
}

/// What `insert` loads from.
#[derive(Debug, Clone, Copy)]
pub enum InsertSource<'a> {
    /// Path of the flat CSV table; read inside the timed insert.
    Flat(&'a Path),
    /// Nested documents, already parsed from the JSON file.
    Nested(&'a [NestedRecord]),
}

impl InsertSource<'_> {
    pub fn representation(&self) -> Representation {
        match self {
            InsertSource::Flat(_) => Representation::Flat,
            InsertSource::Nested(_) => Representation::Nested,
        }
    }
}

/// One configuration's implementation of the six operations.
///
/// Every method performs exactly the work that belongs to its operation so the
/// harness can time each call on its own. Query methods return fully
/// materialised results.
pub trait Catalog {
    type Conn;

    fn configuration(&self) -> Configuration;

    /// Drop and recreate the empty storage target. Not timed.
    fn reset(&self, conn: &mut Self::Conn) -> Result<()>;

    /// Bulk-load the whole dataset. Returns the number of records loaded.
    fn insert(&self, conn: &mut Self::Conn, source: InsertSource<'_>) -> Result<u64>;

    /// Build the secondary indexes the queries and the update rely on.
    fn create_indexes(&self, conn: &mut Self::Conn) -> Result<()>;

    /// Count records with age above [`FLAT_QUERY_MIN_AGE`].
    fn flat_query(&self, conn: &mut Self::Conn) -> Result<u64>;

    /// Count records whose hobbies contain [`QUERY_HOBBY`].
    fn nested_query(&self, conn: &mut Self::Conn) -> Result<u64>;

    /// Group records older than [`COMPLEX_QUERY_MIN_AGE`] with [`QUERY_HOBBY`]
    /// by city, ordered by average age descending.
    fn complex_query(&self, conn: &mut Self::Conn) -> Result<Vec<CityStats>>;

    /// Increment age by one for everyone in [`UPDATE_CITY`]; durable on return.
    /// Returns the number of records changed.
    fn update(&self, conn: &mut Self::Conn) -> Result<u64>;
}

/// A storage backend: opens and closes one connection and hosts two
/// configurations on it.
pub trait Backend {
    type Conn;

    /// Short label used in logs and errors ("relational", "document").
    fn kind(&self) -> &'static str;

    fn connect(&self) -> Result<Self::Conn>;

    /// The backend's catalogs, in run order.
    fn catalogs(&self) -> Vec<Box<dyn Catalog<Conn = Self::Conn>>>;

    /// Release the connection.
    fn close(&self, conn: Self::Conn) -> Result<()>;
}

/// Error for an insert handed the other dataset representation.
pub(crate) fn wrong_source(configuration: Configuration, source: InsertSource<'_>) -> anyhow::Error {
    anyhow::anyhow!(
        "{configuration} loads {:?} data, got {:?}",
        configuration.representation(),
        source.representation()
    )
}
