//! In-memory outcome store
//!
//! An append-only vector plus a request-id index, both behind one mutex
//! so an append and its index entry become visible together.

use super::OutcomeStore;
use crate::error::{Error, Result};
use crate::outcome::Outcome;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    records: Vec<Outcome>,
    index: HashMap<String, usize>,
}

/// In-memory store for outcomes
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutcomeStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn append(&self, outcome: &Outcome) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.index.contains_key(&outcome.request_id) {
            return Err(Error::DuplicateRequest(outcome.request_id.clone()));
        }
        let position = inner.records.len();
        inner.records.push(outcome.clone());
        inner.index.insert(outcome.request_id.clone(), position);
        Ok(())
    }

    async fn get(&self, request_id: &str) -> Result<Outcome> {
        let inner = self.inner.lock().await;
        inner
            .index
            .get(request_id)
            .map(|&i| inner.records[i].clone())
            .ok_or_else(|| Error::NotFound(request_id.to_string()))
    }

    async fn list(&self) -> Result<Vec<Outcome>> {
        Ok(self.inner.lock().await.records.clone())
    }

    async fn latest_digest(&self) -> Result<Option<String>> {
        Ok(self
            .inner
            .lock()
            .await
            .records
            .last()
            .map(|o| o.attestation.digest.clone()))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.inner.lock().await.records.len())
    }
}
