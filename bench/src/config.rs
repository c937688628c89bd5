//! Run configuration: how many records, where to put files, and how to reach
//! the two backends.
//!
//! Only the binary reads the environment. Library callers build a
//! [`BenchConfig`] directly or start from [`BenchConfig::default`].

use anyhow::{Context, Result};
use log::LevelFilter;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_RECORDS: usize = 5000;
pub const DEFAULT_OUTPUT_DIR: &str = "data";
pub const DEFAULT_SQLITE_PATH: &str = "bench.sqlite3";
pub const DEFAULT_REDIS_HOST: &str = "127.0.0.1";
pub const DEFAULT_REDIS_PORT: u16 = 6379;
pub const DEFAULT_LOG_FILE: &str = "bench.log";

#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    /// Records per representation; must be at least 1.
    pub records: usize,
    /// Where the dataset files are written for the duration of a run.
    pub output_dir: PathBuf,
    /// Fixed generator seed. `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Write the JSON report here when set.
    pub report_path: Option<PathBuf>,
    pub relational: RelationalConfig,
    pub document: DocumentConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationalConfig {
    /// SQLite database file, or `:memory:`.
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentConfig {
    pub host: String,
    pub port: u16,
    pub database: u32,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub level: LevelFilter,
    /// `None` logs to stderr only.
    pub file: Option<String>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            records: DEFAULT_RECORDS,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            seed: None,
            report_path: None,
            relational: RelationalConfig::default(),
            document: DocumentConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SQLITE_PATH),
        }
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_REDIS_HOST.to_string(),
            port: DEFAULT_REDIS_PORT,
            database: 0,
            username: None,
            password: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            file: Some(DEFAULT_LOG_FILE.to_string()),
        }
    }
}

impl DocumentConfig {
    /// `redis://[user[:password]@]host:port/db`
    pub fn url(&self) -> String {
        let auth = match (&self.username, &self.password) {
            (Some(user), Some(pass)) => format!("{user}:{pass}@"),
            (Some(user), None) => format!("{user}@"),
            (None, Some(pass)) => format!(":{pass}@"),
            (None, None) => String::new(),
        };
        format!("redis://{auth}{}:{}/{}", self.host, self.port, self.database)
    }
}

impl BenchConfig {
    /// Load `.env` if present, then read the `BENCH_*` variables.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key → value source. Unset and blank keys keep
    /// their defaults; malformed numbers are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(v) = get("BENCH_RECORDS") {
            config.records = parse("BENCH_RECORDS", &v)?;
        }
        if let Some(v) = get("BENCH_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("BENCH_SEED") {
            config.seed = Some(parse("BENCH_SEED", &v)?);
        }
        config.report_path = get("BENCH_REPORT_PATH").map(PathBuf::from);

        if let Some(v) = get("BENCH_SQLITE_PATH") {
            config.relational.path = PathBuf::from(v);
        }

        if let Some(v) = get("BENCH_REDIS_HOST") {
            config.document.host = v;
        }
        if let Some(v) = get("BENCH_REDIS_PORT") {
            config.document.port = parse("BENCH_REDIS_PORT", &v)?;
        }
        if let Some(v) = get("BENCH_REDIS_DB") {
            config.document.database = parse("BENCH_REDIS_DB", &v)?;
        }
        config.document.username = get("BENCH_REDIS_USER");
        config.document.password = get("BENCH_REDIS_PASSWORD");

        if let Some(v) = get("BENCH_LOG_LEVEL") {
            config.log.level = parse_log_level(&v)
                .with_context(|| format!("BENCH_LOG_LEVEL: unknown level '{v}'"))?;
        }
        if let Some(v) = lookup("BENCH_LOG_FILE") {
            let trimmed = v.trim();
            config.log.file = if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(trimmed.to_string())
            };
        }

        Ok(config)
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("{key}: invalid value '{value}'"))
}

pub fn parse_log_level(value: &str) -> Option<LevelFilter> {
    match value.to_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}
