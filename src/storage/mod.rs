//! Pluggable outcome storage
//!
//! Stores are append-only: an outcome is immutable once appended, and a
//! second append with the same request id is a conflict. Records come
//! back from [`OutcomeStore::list`] in append order, which is also the
//! attestation chain order.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::outcome::Outcome;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Append/lookup interface over outcome records
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    /// Backend name used in logs
    fn name(&self) -> &str;

    /// Append an outcome. Fails with `DuplicateRequest` if the request id
    /// is already stored, or `StorageUnavailable` on backend failure.
    async fn append(&self, outcome: &Outcome) -> Result<()>;

    /// Look up an outcome by request id, or `NotFound`
    async fn get(&self, request_id: &str) -> Result<Outcome>;

    /// All outcomes in append order
    async fn list(&self) -> Result<Vec<Outcome>>;

    /// Attestation digest of the most recently appended outcome
    async fn latest_digest(&self) -> Result<Option<String>>;

    async fn len(&self) -> Result<usize>;

    async fn contains(&self, request_id: &str) -> Result<bool> {
        match self.get(request_id).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Named storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    Sqlite,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Sqlite => f.write_str("sqlite"),
        }
    }
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(Error::Config(format!("Unknown storage backend: {}", other))),
        }
    }
}

/// Resolve the configured backend to a concrete store
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn OutcomeStore>> {
    match config.backend {
        StorageKind::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageKind::Sqlite => {
            let store = SqliteStore::connect(&config.database_url).await?;
            Ok(Arc::new(store))
        }
    }
}
