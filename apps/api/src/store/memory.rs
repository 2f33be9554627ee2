use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::portfolio::Portfolio;
use crate::store::{stamp, PortfolioStore, StoreError};

/// Process-lifetime store. Everything vanishes on restart.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Portfolio>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PortfolioStore for MemoryStore {
    async fn put(&self, id: Option<String>, record: Portfolio) -> Result<Portfolio, StoreError> {
        let (id, stored) = stamp(id, record);
        let mut records = self.records.write().await;
        records.insert(id.clone(), stored.clone());
        debug!(%id, total = records.len(), "portfolio stored in memory");
        Ok(stored)
    }

    async fn get(&self, id: &str) -> Result<Option<Portfolio>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<BTreeMap<String, Portfolio>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .map(|(id, p)| (id.clone(), p.clone()))
            .collect())
    }
}
