//! Store doubles shared by unit tests.

use crate::error::{PiiError, Result};
use crate::mapping::{MappingStatistics, MappingStore, MemoryMappingStore, TokenMapping};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Memory store that counts every call it receives.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryMappingStore,
    pub puts: AtomicUsize,
    pub gets: AtomicUsize,
}

impl CountingStore {
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

impl MappingStore for CountingStore {
    fn backend_name(&self) -> &'static str {
        "counting"
    }

    fn put(&self, mapping: &TokenMapping) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(mapping)
    }

    fn get(&self, token: &str) -> Result<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(token)
    }

    fn clear(&self) -> Result<usize> {
        self.inner.clear()
    }

    fn statistics(&self) -> Result<MappingStatistics> {
        self.inner.statistics()
    }
}

/// Store whose writes fail for values containing `poison`, and whose reads
/// always fail.
pub struct FailingStore {
    inner: MemoryMappingStore,
    poison: String,
}

impl FailingStore {
    pub fn new(poison: &str) -> Self {
        Self {
            inner: MemoryMappingStore::new(),
            poison: poison.to_string(),
        }
    }
}

impl MappingStore for FailingStore {
    fn backend_name(&self) -> &'static str {
        "failing"
    }

    fn put(&self, mapping: &TokenMapping) -> Result<()> {
        if mapping.original_value.contains(&self.poison) {
            return Err(PiiError::Storage("connection refused".to_string()));
        }
        self.inner.put(mapping)
    }

    fn get(&self, _token: &str) -> Result<Option<String>> {
        Err(PiiError::Storage("connection refused".to_string()))
    }

    fn clear(&self) -> Result<usize> {
        self.inner.clear()
    }

    fn statistics(&self) -> Result<MappingStatistics> {
        self.inner.statistics()
    }
}
