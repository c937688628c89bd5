//! Flat relational schema: one column per field, hobbies as a delimited string.
//!
//! The hobby filter is a containment check on the delimited column, so it
//! cannot seek an index; the hobbies index only lets SQLite scan a narrower
//! structure than the table.

use super::{
    wrong_source, Catalog, CityStats, Configuration, InsertSource, COMPLEX_QUERY_MIN_AGE,
    FLAT_QUERY_MIN_AGE, QUERY_HOBBY, UPDATE_CITY,
};
use crate::dataset;
use anyhow::{Context, Result};
use etl_core::FlatRecord;
use rusqlite::{params, Connection};

pub const TABLE: &str = "people_flat";

/// Delimited-token match on the hobbies column.
const HOBBY_MATCH: &str = "(',' || hobbies || ',') LIKE ('%,' || ?1 || ',%')";

pub struct FlatTable;

impl FlatTable {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FlatTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog for FlatTable {
    type Conn = Connection;

    fn configuration(&self) -> Configuration {
        Configuration::RelationalFlat
    }

    fn reset(&self, conn: &mut Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {TABLE};
             CREATE TABLE {TABLE} (
                id      INTEGER PRIMARY KEY,
                name    TEXT    NOT NULL,
                age     INTEGER NOT NULL,
                city    TEXT    NOT NULL,
                hobbies TEXT    NOT NULL
             );"
        ))
        .with_context(|| format!("recreate {TABLE}"))?;
        Ok(())
    }

    fn insert(&self, conn: &mut Connection, source: InsertSource<'_>) -> Result<u64> {
        let InsertSource::Flat(path) = source else {
            return Err(wrong_source(self.configuration(), source));
        };

        let mut reader = dataset::open_flat(path)?;
        let tx = conn.transaction()?;
        let mut loaded = 0u64;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {TABLE} (id, name, age, city, hobbies) VALUES (?1, ?2, ?3, ?4, ?5)"
            ))?;
            for row in reader.deserialize::<FlatRecord>() {
                let r = row.with_context(|| format!("read {}", path.display()))?;
                stmt.execute(params![r.id as i64, r.name, r.age, r.city, r.hobbies])?;
                loaded += 1;
            }
        }
        tx.commit().context("commit flat load")?;
        Ok(loaded)
    }

    fn create_indexes(&self, conn: &mut Connection) -> Result<()> {
        let tx = conn.transaction()?;
        tx.execute_batch(&format!(
            "CREATE INDEX idx_{TABLE}_age     ON {TABLE}(age);
             CREATE INDEX idx_{TABLE}_city    ON {TABLE}(city);
             CREATE INDEX idx_{TABLE}_hobbies ON {TABLE}(hobbies);"
        ))?;
        tx.commit()?;
        Ok(())
    }

    fn flat_query(&self, conn: &mut Connection) -> Result<u64> {
        let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {TABLE} WHERE age > ?1"),
            params![FLAT_QUERY_MIN_AGE],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }

    fn nested_query(&self, conn: &mut Connection) -> Result<u64> {
        let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {TABLE} WHERE {HOBBY_MATCH}"),
            params![QUERY_HOBBY],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }

    fn complex_query(&self, conn: &mut Connection) -> Result<Vec<CityStats>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT city, AVG(age) AS avg_age, COUNT(*) AS count
             FROM {TABLE}
             WHERE {HOBBY_MATCH} AND age > ?2
             GROUP BY city
             ORDER BY avg_age DESC"
        ))?;
        let rows = stmt.query_map(params![QUERY_HOBBY, COMPLEX_QUERY_MIN_AGE], |r| {
            Ok(CityStats {
                city: r.get(0)?,
                avg_age: r.get(1)?,
                count: r.get::<_, i64>(2)? as u64,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn update(&self, conn: &mut Connection) -> Result<u64> {
        let tx = conn.transaction()?;
        let changed = tx.execute(
            &format!("UPDATE {TABLE} SET age = age + 1 WHERE city = ?1"),
            params![UPDATE_CITY],
        )?;
        tx.commit()?;
        Ok(changed as u64)
    }
}
