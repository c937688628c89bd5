//! Semi-structured relational schema: each record is one JSON document in a
//! `TEXT` column, queried through SQLite's JSON functions.
//!
//! Age and city get expression indexes. Hobby containment is served by an
//! inverted `(hobby, id)` table built from `json_each` at index time.

use super::{
    wrong_source, Catalog, CityStats, Configuration, InsertSource, COMPLEX_QUERY_MIN_AGE,
    FLAT_QUERY_MIN_AGE, QUERY_HOBBY, UPDATE_CITY,
};
use anyhow::{Context, Result};
use rusqlite::{params, Connection};

pub const TABLE: &str = "people_json";
pub const HOBBY_TABLE: &str = "people_json_hobbies";

/// Rows of [`TABLE`] whose document lists the hobby bound to `?1`.
const HAS_HOBBY: &str = "id IN (SELECT id FROM people_json_hobbies WHERE hobby = ?1)";

pub struct JsonTable;

impl JsonTable {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog for JsonTable {
    type Conn = Connection;

    fn configuration(&self) -> Configuration {
        Configuration::RelationalSemiStructured
    }

    fn reset(&self, conn: &mut Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {HOBBY_TABLE};
             DROP TABLE IF EXISTS {TABLE};
             CREATE TABLE {TABLE} (
                id   INTEGER PRIMARY KEY,
                data TEXT NOT NULL CHECK (json_valid(data))
             );"
        ))
        .with_context(|| format!("recreate {TABLE}"))?;
        Ok(())
    }

    fn insert(&self, conn: &mut Connection, source: InsertSource<'_>) -> Result<u64> {
        let InsertSource::Nested(docs) = source else {
            return Err(wrong_source(self.configuration(), source));
        };

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!("INSERT INTO {TABLE} (id, data) VALUES (?1, ?2)"))?;
            for doc in docs {
                let json = serde_json::to_string(doc)
                    .with_context(|| format!("encode document {}", doc.id))?;
                stmt.execute(params![doc.id as i64, json])?;
            }
        }
        tx.commit().context("commit JSON load")?;
        Ok(docs.len() as u64)
    }

    fn create_indexes(&self, conn: &mut Connection) -> Result<()> {
        let tx = conn.transaction()?;
        tx.execute_batch(&format!(
            "CREATE INDEX idx_{TABLE}_age  ON {TABLE} (json_extract(data, '$.age'));
             CREATE INDEX idx_{TABLE}_city ON {TABLE} (json_extract(data, '$.city'));
             CREATE TABLE {HOBBY_TABLE} (
                hobby TEXT    NOT NULL,
                id    INTEGER NOT NULL,
                PRIMARY KEY (hobby, id)
             ) WITHOUT ROWID;
             INSERT OR IGNORE INTO {HOBBY_TABLE} (hobby, id)
                SELECT h.value, p.id
                FROM {TABLE} AS p, json_each(p.data, '$.hobbies') AS h;"
        ))?;
        tx.commit()?;
        Ok(())
    }

    fn flat_query(&self, conn: &mut Connection) -> Result<u64> {
        let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {TABLE} WHERE json_extract(data, '$.age') > ?1"),
            params![FLAT_QUERY_MIN_AGE],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }

    fn nested_query(&self, conn: &mut Connection) -> Result<u64> {
        let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {TABLE} WHERE {HAS_HOBBY}"),
            params![QUERY_HOBBY],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }

    fn complex_query(&self, conn: &mut Connection) -> Result<Vec<CityStats>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT json_extract(data, '$.city')     AS city,
                    AVG(json_extract(data, '$.age')) AS avg_age,
                    COUNT(*)                         AS count
             FROM {TABLE}
             WHERE {HAS_HOBBY} AND json_extract(data, '$.age') > ?2
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
            &format!(
                "UPDATE {TABLE}
                 SET data = json_set(data, '$.age', json_extract(data, '$.age') + 1)
                 WHERE json_extract(data, '$.city') = ?1"
            ),
            params![UPDATE_CITY],
        )?;
        tx.commit()?;
        Ok(changed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sqlite::{row_count, SqliteBackend};
    use crate::catalog::Backend;
    use crate::generator::Generator;
    use etl_core::NestedRecord;
    use std::collections::BTreeMap;

    fn loaded(n: usize) -> (Connection, Vec<NestedRecord>) {
        let docs = Generator::seeded(23).nested_records(n);
        let table = JsonTable::new();
        let mut conn = SqliteBackend::in_memory().connect().unwrap();
        table.reset(&mut conn).unwrap();
        assert_eq!(
            table.insert(&mut conn, InsertSource::Nested(&docs)).unwrap(),
            n as u64
        );
        (conn, docs)
    }

    #[test]
    fn insert_keeps_nested_fields() {
        let (conn, docs) = loaded(50);
        assert_eq!(row_count(&conn, TABLE).unwrap(), 50);

        let (year, hobbies): (u32, i64) = conn
            .query_row(
                &format!(
                    "SELECT json_extract(data, '$.metadata.created_year'),
                            json_array_length(data, '$.hobbies')
                     FROM {TABLE} WHERE id = ?1"
                ),
                params![docs[0].id as i64],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(year, docs[0].metadata.created_year);
        assert_eq!(hobbies as usize, docs[0].hobbies.len());
    }

    #[test]
    fn insert_rejects_flat_source() {
        let table = JsonTable::new();
        let mut conn = SqliteBackend::in_memory().connect().unwrap();
        table.reset(&mut conn).unwrap();
        let path = std::path::Path::new("data.csv");
        assert!(table.insert(&mut conn, InsertSource::Flat(path)).is_err());
    }

    #[test]
    fn reset_drops_hobby_index_table() {
        let (mut conn, _) = loaded(20);
        let table = JsonTable::new();
        table.create_indexes(&mut conn).unwrap();
        table.reset(&mut conn).unwrap();
        // Index creation must succeed again on the fresh table.
        table.create_indexes(&mut conn).unwrap();
        assert_eq!(row_count(&conn, HOBBY_TABLE).unwrap(), 0);
    }

    #[test]
    fn queries_match_the_data() {
        let (mut conn, docs) = loaded(500);
        let table = JsonTable::new();
        table.create_indexes(&mut conn).unwrap();

        let older = docs.iter().filter(|d| d.age > FLAT_QUERY_MIN_AGE).count() as u64;
        assert_eq!(table.flat_query(&mut conn).unwrap(), older);

        let sporty = docs.iter().filter(|d| d.has_hobby(QUERY_HOBBY)).count() as u64;
        assert_eq!(table.nested_query(&mut conn).unwrap(), sporty);

        let mut expected: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
        for d in docs
            .iter()
            .filter(|d| d.age > COMPLEX_QUERY_MIN_AGE && d.has_hobby(QUERY_HOBBY))
        {
            let e = expected.entry(d.city.as_str()).or_default();
            e.0 += d.age as u64;
            e.1 += 1;
        }
        let groups = table.complex_query(&mut conn).unwrap();
        assert_eq!(groups.len(), expected.len());
        for g in &groups {
            let (sum, count) = expected[g.city.as_str()];
            assert_eq!(g.count, count);
            assert!((g.avg_age - sum as f64 / count as f64).abs() < 1e-9);
        }
        assert!(groups.windows(2).all(|w| w[0].avg_age >= w[1].avg_age));
    }

    #[test]
    fn update_rewrites_age_inside_documents() {
        let (mut conn, docs) = loaded(400);
        let table = JsonTable::new();
        table.create_indexes(&mut conn).unwrap();

        let ny: Vec<&NestedRecord> = docs.iter().filter(|d| d.city == UPDATE_CITY).collect();
        assert_eq!(table.update(&mut conn).unwrap(), ny.len() as u64);

        for d in ny.iter().take(5) {
            let raw: String = conn
                .query_row(
                    &format!("SELECT data FROM {TABLE} WHERE id = ?1"),
                    params![d.id as i64],
                    |r| r.get(0),
                )
                .unwrap();
            let back: NestedRecord = serde_json::from_str(&raw).unwrap();
            assert_eq!(back.age, d.age + 1);
            assert_eq!(back.metadata.created_year, d.metadata.created_year);
            assert!((back.metadata.score - d.metadata.score).abs() < 1e-9);
        }
    }
}
