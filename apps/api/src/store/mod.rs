//! Portfolio persistence.
//!
//! Handlers only see `Arc<dyn PortfolioStore>`, so the backing store can be
//! swapped (memory, directory of JSON files) without touching the API layer.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::portfolio::Portfolio;

pub mod json_dir;
pub mod memory;

pub use json_dir::JsonDirStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid portfolio id: {0}")]
    InvalidId(String),

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Identifier-keyed portfolio store.
///
/// `put` replaces the whole record at an id; fields are never merged with a
/// previous version. Concurrent writes to one id are last-write-wins.
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    /// Creates a record under a fresh id when `id` is `None` or empty,
    /// otherwise overwrites the record at `id`. Returns the stored record.
    async fn put(&self, id: Option<String>, record: Portfolio) -> Result<Portfolio, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Portfolio>, StoreError>;

    /// Snapshot of every stored record keyed by id.
    async fn list(&self) -> Result<BTreeMap<String, Portfolio>, StoreError>;
}

/// Resolves the target id and stamps `id` and `updatedAt` on the record.
pub(crate) fn stamp(id: Option<String>, record: Portfolio) -> (String, Portfolio) {
    let id = id
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let stored = Portfolio {
        id: Some(id.clone()),
        updated_at: Some(Utc::now()),
        ..record
    };
    (id, stored)
}
