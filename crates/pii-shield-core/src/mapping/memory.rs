use super::{MappingStatistics, MappingStore, TokenMapping};
use crate::error::Result;
use crate::token::token_category;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

/// Volatile store for demos and offline use. Its contents live exactly as
/// long as the owning value, or until the owner calls `clear()`.
#[derive(Default)]
pub struct MemoryMappingStore {
    mappings: RwLock<HashMap<String, String>>,
}

impl MemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MappingStore for MemoryMappingStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn len(&self) -> Result<usize> {
        Ok(self.mappings.read().len())
    }

    fn put(&self, mapping: &TokenMapping) -> Result<()> {
        self.mappings
            .write()
            .entry(mapping.token.clone())
            .or_insert_with(|| mapping.original_value.clone());
        debug!("Stored in-memory mapping for {}", mapping.token);
        Ok(())
    }

    fn get(&self, token: &str) -> Result<Option<String>> {
        Ok(self.mappings.read().get(token).cloned())
    }

    fn clear(&self) -> Result<usize> {
        let mut mappings = self.mappings.write();
        let removed = mappings.len();
        mappings.clear();
        info!("Cleared {} in-memory mappings", removed);
        Ok(removed)
    }

    fn statistics(&self) -> Result<MappingStatistics> {
        let mappings = self.mappings.read();
        let mut stats = MappingStatistics {
            total_mappings: mappings.len(),
            ..Default::default()
        };
        for category in mappings.keys().filter_map(|token| token_category(token)) {
            *stats.mappings_by_category.entry(category).or_insert(0) += 1;
        }
        Ok(stats)
    }
}
