//! Query configuration.
//!
//! Every setting starts from its default, is overridden by the process
//! environment, and finally by the properties attached to a single query.
//! Environment variables are the property names upper-cased with dots
//! replaced by underscores, e.g. `CELLGRAPH_QUERY_FETCHTYPE`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const FETCH_TYPE: &str = "cellgraph.query.fetchtype";
pub const POOL_SIZE_MIN: &str = "cellgraph.query.threadpool.size.min";
pub const POOL_SIZE_MAX: &str = "cellgraph.query.threadpool.size.max";
pub const THREAD_DEPTH_MAX: &str = "cellgraph.query.thread.depth.max";
pub const TABLE_CACHE_SIZE: &str = "cellgraph.query.tablecache.size";
pub const TABLE_CACHE_TIMEOUT_SECS: &str = "cellgraph.query.tablecache.timeout";
pub const IN_DELIMITER: &str = "cellgraph.query.in.delimiter";

/// How edges of assembled graphs are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchType {
    #[default]
    Serial,
    Parallel,
}

impl FromStr for FetchType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" => Ok(FetchType::Serial),
            "parallel" => Ok(FetchType::Parallel),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FetchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchType::Serial => f.write_str("serial"),
            FetchType::Parallel => f.write_str("parallel"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub fetch_type: FetchType,
    pub pool_size_min: usize,
    pub pool_size_max: usize,
    /// Maximum depth at which parallel fetches fan out further.
    pub thread_depth_max: usize,
    pub table_cache_size: usize,
    pub table_cache_timeout: Duration,
    /// Separator for IN/NOT_IN literals that do not name their own.
    pub in_delimiter: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            fetch_type: FetchType::Serial,
            pool_size_min: 10,
            pool_size_max: 10,
            thread_depth_max: 3,
            table_cache_size: 64,
            table_cache_timeout: Duration::from_secs(300),
            in_delimiter: " ".to_string(),
        }
    }
}

/// Environment variable holding the system-wide value of `property`.
pub fn env_name(property: &str) -> String {
    property.replace('.', "_").to_ascii_uppercase()
}

fn parse<T: FromStr>(property: &str, value: &str, scope: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        Error::Config(format!(
            "invalid {scope} query configuration value '{value}' for property, {property}"
        ))
    })
}

impl QueryConfig {
    /// Defaults, then the process environment, then `properties`.
    pub fn resolve(properties: &BTreeMap<String, String>) -> Result<Self> {
        Self::resolve_with(properties, |name| std::env::var(name).ok())
    }

    /// Like [`QueryConfig::resolve`] with an explicit environment lookup.
    pub fn resolve_with<F>(properties: &BTreeMap<String, String>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply(|p| env(&env_name(p)), "system")?;
        config.apply(|p| properties.get(p).cloned(), "query")?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides this configuration with the query's own properties.
    pub fn with_overrides(&self, properties: &BTreeMap<String, String>) -> Result<Self> {
        let mut config = self.clone();
        config.apply(|p| properties.get(p).cloned(), "query")?;
        config.validate()?;
        Ok(config)
    }

    fn apply<F>(&mut self, lookup: F, scope: &str) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(FETCH_TYPE) {
            self.fetch_type = v.parse().map_err(|_| {
                Error::Config(format!(
                    "unknown {scope} query configuration value '{v}' for property, {FETCH_TYPE}"
                ))
            })?;
        }
        if let Some(v) = lookup(POOL_SIZE_MIN) {
            self.pool_size_min = parse(POOL_SIZE_MIN, &v, scope)?;
        }
        if let Some(v) = lookup(POOL_SIZE_MAX) {
            self.pool_size_max = parse(POOL_SIZE_MAX, &v, scope)?;
        }
        if let Some(v) = lookup(THREAD_DEPTH_MAX) {
            self.thread_depth_max = parse(THREAD_DEPTH_MAX, &v, scope)?;
        }
        if let Some(v) = lookup(TABLE_CACHE_SIZE) {
            self.table_cache_size = parse(TABLE_CACHE_SIZE, &v, scope)?;
        }
        if let Some(v) = lookup(TABLE_CACHE_TIMEOUT_SECS) {
            self.table_cache_timeout =
                Duration::from_secs(parse(TABLE_CACHE_TIMEOUT_SECS, &v, scope)?);
        }
        if let Some(v) = lookup(IN_DELIMITER) {
            // Delimiters may be whitespace; keep the value untrimmed.
            self.in_delimiter = v;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.pool_size_max == 0 || self.pool_size_min > self.pool_size_max {
            return Err(Error::Config(format!(
                "thread pool size min {} must not exceed max {} (max > 0)",
                self.pool_size_min, self.pool_size_max
            )));
        }
        if self.table_cache_size == 0 {
            return Err(Error::Config("table cache size must be positive".into()));
        }
        if self.in_delimiter.is_empty() {
            return Err(Error::Config("IN/NOT_IN delimiter must not be empty".into()));
        }
        Ok(())
    }
}
