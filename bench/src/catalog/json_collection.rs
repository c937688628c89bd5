//! Nested document collection: each record stored whole as a JSON string,
//! hobbies as an array and metadata as a sub-object.

use super::redis_store::{self, doc_key, ids_key, IndexedFields, PIPELINE_BATCH_SIZE};
use super::{wrong_source, Catalog, CityStats, Configuration, InsertSource};
use anyhow::{Context, Result};
use etl_core::NestedRecord;
use redis::{pipe, Connection};

pub const COLLECTION: &str = "bench:people_nested";

/// Two commands are queued per document on every write path.
const DOCS_PER_PIPELINE: usize = PIPELINE_BATCH_SIZE / 2;

pub struct JsonCollection {
    name: String,
}

impl JsonCollection {
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

    /// Load and decode the documents stored under `ids`, in order.
    fn fetch(&self, con: &mut Connection, ids: &[u64]) -> Result<Vec<NestedRecord>> {
        let mut docs = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(PIPELINE_BATCH_SIZE) {
            let mut pipeline = pipe();
            for &id in chunk {
                pipeline.cmd("GET").arg(doc_key(&self.name, id));
            }
            let raw: Vec<String> = pipeline
                .query(con)
                .with_context(|| format!("pipeline GET from {}", self.name))?;
            for (id, json) in chunk.iter().zip(raw) {
                let doc: NestedRecord = serde_json::from_str(&json)
                    .with_context(|| format!("decode document {id} of {}", self.name))?;
                docs.push(doc);
            }
        }
        Ok(docs)
    }
}

impl Default for JsonCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog for JsonCollection {
    type Conn = Connection;

    fn configuration(&self) -> Configuration {
        Configuration::DocumentNested
    }

    fn reset(&self, con: &mut Connection) -> Result<()> {
        let removed = redis_store::drop_collection(con, &self.name)?;
        log::debug!("Dropped {removed} keys under {}", self.name);
        Ok(())
    }

    fn insert(&self, con: &mut Connection, source: InsertSource<'_>) -> Result<u64> {
        let InsertSource::Nested(docs) = source else {
            return Err(wrong_source(self.configuration(), source));
        };

        let ids = ids_key(&self.name);
        for chunk in docs.chunks(DOCS_PER_PIPELINE) {
            let mut pipeline = pipe();
            for doc in chunk {
                let json = serde_json::to_string(doc)
                    .with_context(|| format!("encode document {}", doc.id))?;
                pipeline
                    .cmd("SET")
                    .arg(doc_key(&self.name, doc.id))
                    .arg(json)
                    .ignore();
                pipeline.cmd("SADD").arg(&ids).arg(doc.id).ignore();
            }
            pipeline
                .query::<()>(con)
                .with_context(|| format!("pipeline SET into {}", self.name))?;
        }
        Ok(docs.len() as u64)
    }

    fn create_indexes(&self, con: &mut Connection) -> Result<()> {
        let ids = redis_store::document_ids(con, &self.name)?;
        let fields: Vec<IndexedFields> = self
            .fetch(con, &ids)?
            .into_iter()
            .map(|d| IndexedFields {
                id: d.id,
                age: d.age,
                city: d.city,
                hobbies: d.hobbies,
            })
            .collect();
        redis_store::write_indexes(con, &self.name, &fields)
    }

    fn flat_query(&self, con: &mut Connection) -> Result<u64> {
        redis_store::count_older_than_threshold(con, &self.name)
    }

    fn nested_query(&self, con: &mut Connection) -> Result<u64> {
        redis_store::count_with_query_hobby(con, &self.name)
    }

    fn complex_query(&self, con: &mut Connection) -> Result<Vec<CityStats>> {
        redis_store::group_by_city(con, &self.name, |con, ids| {
            Ok(self.fetch(con, ids)?.into_iter().map(|d| d.city).collect())
        })
    }

    fn update(&self, con: &mut Connection) -> Result<u64> {
        let ids = redis_store::ids_in_update_city(con, &self.name)?;
        let age_index = redis_store::age_index_key(&self.name);
        for chunk in ids.chunks(DOCS_PER_PIPELINE) {
            let docs = self.fetch(con, chunk)?;
            let mut pipeline = pipe();
            pipeline.atomic();
            for mut doc in docs {
                doc.age += 1;
                let json = serde_json::to_string(&doc)
                    .with_context(|| format!("encode document {}", doc.id))?;
                pipeline
                    .cmd("SET")
                    .arg(doc_key(&self.name, doc.id))
                    .arg(json)
                    .ignore();
                pipeline
                    .cmd("ZINCRBY")
                    .arg(&age_index)
                    .arg(1)
                    .arg(doc.id)
                    .ignore();
            }
            pipeline
                .query::<()>(con)
                .with_context(|| format!("pipeline age update in {}", self.name))?;
        }
        Ok(ids.len() as u64)
    }
}
