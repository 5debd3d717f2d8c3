//! Token → original value storage
//!
//! Two backends share one contract: a durable SQLite table and a volatile
//! in-process map. Inserting a token that already exists is a no-op, never
//! an overwrite and never an error. The volatile store is only emptied by
//! an explicit `clear()` from whoever owns it.

mod memory;
mod sqlite;

pub use memory::MemoryMappingStore;
pub use sqlite::SqliteMappingStore;

use crate::config::{MappingConfig, StoreBackend};
use crate::detection::PiiCategory;
use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMapping {
    pub token: String,
    pub original_value: String,
}

impl TokenMapping {
    pub fn new(token: impl Into<String>, original_value: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            original_value: original_value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingStatistics {
    pub total_mappings: usize,
    pub mappings_by_category: BTreeMap<PiiCategory, usize>,
}

pub trait MappingStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Insert-if-absent.
    fn put(&self, mapping: &TokenMapping) -> Result<()>;

    fn get(&self, token: &str) -> Result<Option<String>>;

    fn len(&self) -> Result<usize> {
        Ok(self.statistics()?.total_mappings)
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Removes every mapping and returns how many were removed.
    fn clear(&self) -> Result<usize>;

    fn statistics(&self) -> Result<MappingStatistics>;
}

/// Builds the backend named by the configuration.
pub fn open_store(config: &MappingConfig) -> Result<Arc<dyn MappingStore>> {
    match config.backend {
        StoreBackend::Sqlite => Ok(Arc::new(SqliteMappingStore::new(config)?)),
        StoreBackend::Memory => Ok(Arc::new(MemoryMappingStore::new())),
    }
}
