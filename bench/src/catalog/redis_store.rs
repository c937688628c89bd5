//! Redis / KeyDB as the document backend.
//!
//! Each collection lives under its own key prefix:
//!
//! - `{coll}:doc:{id}`            one document (hash or JSON string)
//! - `{coll}:ids`                 set of every document id
//! - `{coll}:idx:age`             sorted set, score = age, member = id
//! - `{coll}:idx:city:{city}`     set of ids living in `city`
//! - `{coll}:idx:hobby:{tag}`     set of ids listing hobby `tag`
//!
//! Secondary indexes are only written by `create_indexes`; `update` keeps the
//! age index in step with the documents it changes.

use super::hash_collection::HashCollection;
use super::json_collection::JsonCollection;
use super::{
    sort_by_avg_age_desc, Backend, Catalog, CityStats, COMPLEX_QUERY_MIN_AGE, FLAT_QUERY_MIN_AGE,
    QUERY_HOBBY, UPDATE_CITY,
};
use anyhow::{Context, Result};
use redis::{pipe, Connection};
use std::collections::{HashMap, HashSet};

/// Number of commands batched into one pipeline round trip.
pub const PIPELINE_BATCH_SIZE: usize = 4096;

/// Keys fetched per `SCAN` step when dropping a collection.
const SCAN_COUNT: usize = 1000;

/// Opens one Redis connection and hosts the hash and JSON collections.
#[derive(Debug, Clone)]
pub struct RedisBackend {
    url: String,
}

impl RedisBackend {
    /// `url` is a `redis://[user[:password]@]host:port/db` descriptor.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Backend for RedisBackend {
    type Conn = Connection;

    fn kind(&self) -> &'static str {
        "document"
    }

    fn connect(&self) -> Result<Connection> {
        let client = redis::Client::open(self.url.as_str()).context("open Redis client")?;
        let mut con = client.get_connection().context("connect to Redis")?;
        redis::cmd("PING")
            .query::<String>(&mut con)
            .context("Redis PING")?;
        log::info!("Connected to Redis at {}", redacted(&self.url));
        Ok(con)
    }

    fn catalogs(&self) -> Vec<Box<dyn Catalog<Conn = Connection>>> {
        vec![
            Box::new(HashCollection::new()),
            Box::new(JsonCollection::new()),
        ]
    }

    fn close(&self, con: Connection) -> Result<()> {
        // The socket is shut when the connection is dropped.
        drop(con);
        log::debug!("Closed Redis connection");
        Ok(())
    }
}

/// Strip the password from a connection URL before logging it.
fn redacted(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            let creds = &url[scheme + 3..at];
            let user = creds.split(':').next().unwrap_or_default();
            format!("{}{user}:***{}", &url[..scheme + 3], &url[at..])
        }
        _ => url.to_string(),
    }
}

// ---------------------------------------------------------------------------
//  Key helpers
// ---------------------------------------------------------------------------

pub fn doc_key(coll: &str, id: u64) -> String {
    format!("{coll}:doc:{id}")
}

pub fn ids_key(coll: &str) -> String {
    format!("{coll}:ids")
}

pub fn age_index_key(coll: &str) -> String {
    format!("{coll}:idx:age")
}

pub fn city_index_key(coll: &str, city: &str) -> String {
    format!("{coll}:idx:city:{city}")
}

pub fn hobby_index_key(coll: &str, tag: &str) -> String {
    format!("{coll}:idx:hobby:{tag}")
}

// ---------------------------------------------------------------------------
//  Collection lifecycle
// ---------------------------------------------------------------------------

/// Delete every key under `{coll}:`. Returns the number of keys removed.
pub fn drop_collection(con: &mut Connection, coll: &str) -> Result<u64> {
    let pattern = format!("{coll}:*");
    let mut keys: Vec<String> = Vec::new();
    let mut cursor: u64 = 0;
    loop {
        let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(&pattern)
            .arg("COUNT")
            .arg(SCAN_COUNT)
            .query(con)
            .with_context(|| format!("SCAN {pattern}"))?;
        keys.extend(batch);
        if next == 0 {
            break;
        }
        cursor = next;
    }

    // SCAN may return a key more than once.
    keys.sort_unstable();
    keys.dedup();

    let mut removed = 0u64;
    for chunk in keys.chunks(PIPELINE_BATCH_SIZE) {
        let n: u64 = redis::cmd("DEL")
            .arg(chunk)
            .query(con)
            .with_context(|| format!("DEL {pattern}"))?;
        removed += n;
    }
    Ok(removed)
}

/// All document ids of a collection, ascending.
pub fn document_ids(con: &mut Connection, coll: &str) -> Result<Vec<u64>> {
    let mut ids: Vec<u64> = redis::cmd("SMEMBERS")
        .arg(ids_key(coll))
        .query(con)
        .with_context(|| format!("SMEMBERS {}", ids_key(coll)))?;
    ids.sort_unstable();
    Ok(ids)
}

/// Fields of one document the secondary indexes cover.
pub struct IndexedFields {
    pub id: u64,
    pub age: u32,
    pub city: String,
    pub hobbies: Vec<String>,
}

/// Write the age, city and hobby indexes for `docs`.
pub fn write_indexes(con: &mut Connection, coll: &str, docs: &[IndexedFields]) -> Result<()> {
    let age_key = age_index_key(coll);
    for chunk in docs.chunks(PIPELINE_BATCH_SIZE) {
        let mut pipeline = pipe();
        for doc in chunk {
            pipeline
                .cmd("ZADD")
                .arg(&age_key)
                .arg(doc.age)
                .arg(doc.id)
                .ignore();
            pipeline
                .cmd("SADD")
                .arg(city_index_key(coll, &doc.city))
                .arg(doc.id)
                .ignore();
            for tag in &doc.hobbies {
                pipeline
                    .cmd("SADD")
                    .arg(hobby_index_key(coll, tag))
                    .arg(doc.id)
                    .ignore();
            }
        }
        pipeline
            .query::<()>(con)
            .with_context(|| format!("pipeline index writes for {coll}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
//  Index-backed queries shared by both collections
// ---------------------------------------------------------------------------

/// Count documents with age above [`FLAT_QUERY_MIN_AGE`].
pub fn count_older_than_threshold(con: &mut Connection, coll: &str) -> Result<u64> {
    let n: u64 = redis::cmd("ZCOUNT")
        .arg(age_index_key(coll))
        .arg(format!("({FLAT_QUERY_MIN_AGE}"))
        .arg("+inf")
        .query(con)
        .context("ZCOUNT age index")?;
    Ok(n)
}

/// Count documents listing [`QUERY_HOBBY`].
pub fn count_with_query_hobby(con: &mut Connection, coll: &str) -> Result<u64> {
    let n: u64 = redis::cmd("SCARD")
        .arg(hobby_index_key(coll, QUERY_HOBBY))
        .query(con)
        .context("SCARD hobby index")?;
    Ok(n)
}

/// Match, group and sort for the complex query.
///
/// `cities` resolves the city of each matching id, in order, using whatever
/// document encoding the collection stores.
pub fn group_by_city<F>(con: &mut Connection, coll: &str, cities: F) -> Result<Vec<CityStats>>
where
    F: FnOnce(&mut Connection, &[u64]) -> Result<Vec<String>>,
{
    let aged: Vec<(u64, f64)> = redis::cmd("ZRANGEBYSCORE")
        .arg(age_index_key(coll))
        .arg(format!("({COMPLEX_QUERY_MIN_AGE}"))
        .arg("+inf")
        .arg("WITHSCORES")
        .query(con)
        .context("ZRANGEBYSCORE age index")?;
    let sporty: HashSet<u64> = redis::cmd("SMEMBERS")
        .arg(hobby_index_key(coll, QUERY_HOBBY))
        .query(con)
        .context("SMEMBERS hobby index")?;

    let (ids, ages): (Vec<u64>, Vec<f64>) =
        aged.into_iter().filter(|(id, _)| sporty.contains(id)).unzip();
    let resolved = cities(con, &ids)?;
    anyhow::ensure!(
        resolved.len() == ids.len(),
        "resolved {} cities for {} documents",
        resolved.len(),
        ids.len()
    );

    let mut groups: HashMap<String, (f64, u64)> = HashMap::new();
    for (city, age) in resolved.into_iter().zip(ages) {
        let g = groups.entry(city).or_insert((0.0, 0));
        g.0 += age;
        g.1 += 1;
    }

    let mut rows: Vec<CityStats> = groups
        .into_iter()
        .map(|(city, (sum, count))| CityStats {
            city,
            avg_age: sum / count as f64,
            count,
        })
        .collect();
    sort_by_avg_age_desc(&mut rows);
    Ok(rows)
}

/// Ids of documents in [`UPDATE_CITY`], from the city index.
pub fn ids_in_update_city(con: &mut Connection, coll: &str) -> Result<Vec<u64>> {
    let key = city_index_key(coll, UPDATE_CITY);
    let mut ids: Vec<u64> = redis::cmd("SMEMBERS")
        .arg(&key)
        .query(con)
        .with_context(|| format!("SMEMBERS {key}"))?;
    ids.sort_unstable();
    Ok(ids)
}
