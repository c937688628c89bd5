//! Flat document collection: one Redis hash per record, hobbies kept as the
//! delimited string from the CSV.
//!
//! The hobby index is built by tokenising that string, so the nested-field
//! query costs the same set lookup as in the nested collection.

use super::redis_store::{self, doc_key, ids_key, IndexedFields, PIPELINE_BATCH_SIZE};
use super::{wrong_source, Catalog, CityStats, Configuration, InsertSource};
use crate::dataset;
use anyhow::{Context, Result};
use etl_core::records::split_hobbies;
use etl_core::FlatRecord;
use redis::{pipe, Connection};

pub const COLLECTION: &str = "bench:people_flat";

/// Two commands (HSET + SADD) are queued per record.
const RECORDS_PER_PIPELINE: usize = PIPELINE_BATCH_SIZE / 2;

pub struct HashCollection {
    name: String,
}

impl HashCollection {
    pub fn new() -> Self {
        Self::named(COLLECTION)
    }

    /// Use a different key prefix.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn flush(&self, con: &mut Connection, batch: &[FlatRecord]) -> Result<()> {
        let ids = ids_key(&self.name);
        let mut pipeline = pipe();
        for r in batch {
            pipeline
                .cmd("HSET")
                .arg(doc_key(&self.name, r.id))
                .arg("name")
                .arg(&r.name)
                .arg("age")
                .arg(r.age)
                .arg("city")
                .arg(&r.city)
                .arg("hobbies")
                .arg(&r.hobbies)
                .ignore();
            pipeline.cmd("SADD").arg(&ids).arg(r.id).ignore();
        }
        pipeline
            .query::<()>(con)
            .with_context(|| format!("pipeline HSET into {}", self.name))
    }
}

impl Default for HashCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog for HashCollection {
    type Conn = Connection;

    fn configuration(&self) -> Configuration {
        Configuration::DocumentFlat
    }

    fn reset(&self, con: &mut Connection) -> Result<()> {
        let removed = redis_store::drop_collection(con, &self.name)?;
        log::debug!("Dropped {removed} keys under {}", self.name);
        Ok(())
    }

    fn insert(&self, con: &mut Connection, source: InsertSource<'_>) -> Result<u64> {
        let InsertSource::Flat(path) = source else {
            return Err(wrong_source(self.configuration(), source));
        };

        let mut reader = dataset::open_flat(path)?;
        let mut batch: Vec<FlatRecord> = Vec::with_capacity(RECORDS_PER_PIPELINE);
        let mut loaded = 0u64;
        for row in reader.deserialize::<FlatRecord>() {
            batch.push(row.with_context(|| format!("read {}", path.display()))?);
            if batch.len() == RECORDS_PER_PIPELINE {
                self.flush(con, &batch)?;
                loaded += batch.len() as u64;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            self.flush(con, &batch)?;
            loaded += batch.len() as u64;
        }
        Ok(loaded)
    }

    fn create_indexes(&self, con: &mut Connection) -> Result<()> {
        let ids = redis_store::document_ids(con, &self.name)?;
        let mut docs = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(PIPELINE_BATCH_SIZE) {
            let mut pipeline = pipe();
            for &id in chunk {
                pipeline
                    .cmd("HMGET")
                    .arg(doc_key(&self.name, id))
                    .arg("age")
                    .arg("city")
                    .arg("hobbies");
            }
            let fields: Vec<(u32, String, String)> = pipeline
                .query(con)
                .with_context(|| format!("pipeline HMGET from {}", self.name))?;
            docs.extend(chunk.iter().zip(fields).map(|(&id, (age, city, hobbies))| {
                IndexedFields {
                    id,
                    age,
                    city,
                    hobbies: split_hobbies(&hobbies).map(str::to_string).collect(),
                }
            }));
        }
        redis_store::write_indexes(con, &self.name, &docs)
    }

    fn flat_query(&self, con: &mut Connection) -> Result<u64> {
        redis_store::count_older_than_threshold(con, &self.name)
    }

    fn nested_query(&self, con: &mut Connection) -> Result<u64> {
        redis_store::count_with_query_hobby(con, &self.name)
    }

    fn complex_query(&self, con: &mut Connection) -> Result<Vec<CityStats>> {
        redis_store::group_by_city(con, &self.name, |con, ids| {
            let mut cities = Vec::with_capacity(ids.len());
            for chunk in ids.chunks(PIPELINE_BATCH_SIZE) {
                let mut pipeline = pipe();
                for &id in chunk {
                    pipeline.cmd("HGET").arg(doc_key(&self.name, id)).arg("city");
                }
                let batch: Vec<String> = pipeline
                    .query(con)
                    .with_context(|| format!("pipeline HGET city from {}", self.name))?;
                cities.extend(batch);
            }
            Ok(cities)
        })
    }

    fn update(&self, con: &mut Connection) -> Result<u64> {
        let ids = redis_store::ids_in_update_city(con, &self.name)?;
        let age_index = redis_store::age_index_key(&self.name);
        for chunk in ids.chunks(RECORDS_PER_PIPELINE) {
            let mut pipeline = pipe();
            pipeline.atomic();
            for &id in chunk {
                pipeline
                    .cmd("HINCRBY")
                    .arg(doc_key(&self.name, id))
                    .arg("age")
                    .arg(1)
                    .ignore();
                pipeline
                    .cmd("ZINCRBY")
                    .arg(&age_index)
                    .arg(1)
                    .arg(id)
                    .ignore();
            }
            pipeline
                .query::<()>(con)
                .with_context(|| format!("pipeline age update in {}", self.name))?;
        }
        Ok(ids.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    //! These need a live server: `BENCH_REDIS_URL` (default
    //! `redis://127.0.0.1:6379/15`). Run with `cargo test -- --ignored`.

    use super::*;
    use crate::catalog::redis_store::RedisBackend;
    use crate::catalog::{
        Backend, COMPLEX_QUERY_MIN_AGE, FLAT_QUERY_MIN_AGE, QUERY_HOBBY, UPDATE_CITY,
    };
    use crate::generator::Generator;
    use std::collections::BTreeMap;

    fn live() -> Connection {
        let url = std::env::var("BENCH_REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379/15".to_string());
        RedisBackend::new(url).connect().unwrap()
    }

    fn loaded(name: &str, n: usize) -> (Connection, HashCollection, Vec<FlatRecord>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(dataset::FLAT_FILE_NAME);
        let records = Generator::seeded(31).flat_records(n);
        dataset::write_flat(&path, &records).unwrap();

        let mut con = live();
        let coll = HashCollection::named(format!("bench-test:{name}"));
        coll.reset(&mut con).unwrap();
        assert_eq!(coll.insert(&mut con, InsertSource::Flat(&path)).unwrap(), n as u64);
        (con, coll, records)
    }

    #[test]
    #[ignore]
    fn reset_removes_every_key() {
        let (mut con, coll, _) = loaded("hash-reset", 50);
        coll.create_indexes(&mut con).unwrap();
        coll.reset(&mut con).unwrap();
        let left: Vec<String> = redis::cmd("KEYS")
            .arg(format!("{}:*", coll.name()))
            .query(&mut con)
            .unwrap();
        assert!(left.is_empty(), "{left:?}");
    }

    #[test]
    #[ignore]
    fn queries_match_the_data() {
        let (mut con, coll, records) = loaded("hash-queries", 5_000);
        coll.create_indexes(&mut con).unwrap();

        let has_sports = |r: &FlatRecord| r.hobby_tags().any(|h| h == QUERY_HOBBY);
        let older = records.iter().filter(|r| r.age > FLAT_QUERY_MIN_AGE).count() as u64;
        assert_eq!(coll.flat_query(&mut con).unwrap(), older);
        let sporty = records.iter().filter(|r| has_sports(r)).count() as u64;
        assert_eq!(coll.nested_query(&mut con).unwrap(), sporty);

        let mut expected: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
        for r in records
            .iter()
            .filter(|r| r.age > COMPLEX_QUERY_MIN_AGE && has_sports(r))
        {
            let e = expected.entry(r.city.as_str()).or_default();
            e.0 += r.age as u64;
            e.1 += 1;
        }
        let groups = coll.complex_query(&mut con).unwrap();
        assert_eq!(groups.len(), expected.len());
        for g in &groups {
            let (sum, count) = expected[g.city.as_str()];
            assert_eq!(g.count, count);
            assert!((g.avg_age - sum as f64 / count as f64).abs() < 1e-9);
        }
        coll.reset(&mut con).unwrap();
    }

    #[test]
    #[ignore]
    fn update_moves_hash_and_age_index_together() {
        let (mut con, coll, records) = loaded("hash-update", 1_000);
        coll.create_indexes(&mut con).unwrap();

        let ny: Vec<&FlatRecord> = records.iter().filter(|r| r.city == UPDATE_CITY).collect();
        assert_eq!(coll.update(&mut con).unwrap(), ny.len() as u64);

        for r in ny.iter().take(5) {
            let age: u32 = redis::cmd("HGET")
                .arg(doc_key(coll.name(), r.id))
                .arg("age")
                .query(&mut con)
                .unwrap();
            let score: f64 = redis::cmd("ZSCORE")
                .arg(redis_store::age_index_key(coll.name()))
                .arg(r.id)
                .query(&mut con)
                .unwrap();
            assert_eq!(age, r.age + 1);
            assert_eq!(score, (r.age + 1) as f64);
        }
        coll.reset(&mut con).unwrap();
    }
}
