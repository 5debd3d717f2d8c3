//! Durable mapping storage using SQLite

use super::{MappingStatistics, MappingStore, TokenMapping};
use crate::config::MappingConfig;
use crate::error::{PiiError, Result};
use crate::token::token_category;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteMappingStore {
    conn: Mutex<Connection>,
    database_path: PathBuf,
    retention_days: Option<u32>,
}

impl SqliteMappingStore {
    pub fn new(config: &MappingConfig) -> Result<Self> {
        let conn = if config.database_path == Path::new(":memory:") {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = config.database_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    PiiError::Storage(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
            Connection::open(&config.database_path)?
        };
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let store = Self {
            conn: Mutex::new(conn),
            database_path: config.database_path.clone(),
            retention_days: config.retention_days,
        };
        store.initialize_schema()?;
        store.cleanup_expired_mappings()?;

        info!("Initialized mapping store at {:?}", store.database_path);
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS pii_mappings (
                token TEXT PRIMARY KEY,
                original TEXT NOT NULL,
                category TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_pii_mappings_created_at
             ON pii_mappings(created_at)",
            [],
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Deletes mappings older than the configured retention window.
    pub fn cleanup_expired_mappings(&self) -> Result<usize> {
        let Some(retention_days) = self.retention_days else {
            return Ok(0);
        };
        let cutoff_time = now_secs()?.saturating_sub(u64::from(retention_days) * 24 * 60 * 60);

        let deleted = self.conn.lock().execute(
            "DELETE FROM pii_mappings WHERE created_at < ?1",
            params![cutoff_time],
        )?;

        if deleted > 0 {
            info!(
                "Cleaned up {} expired mappings older than {} days",
                deleted, retention_days
            );
        }
        Ok(deleted)
    }
}

impl MappingStore for SqliteMappingStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn put(&self, mapping: &TokenMapping) -> Result<()> {
        let category = token_category(&mapping.token)
            .map(|c| c.as_str())
            .unwrap_or("UNKNOWN");
        let now = now_secs()?;

        // The primary key makes this atomic under concurrent writers.
        let inserted = self.conn.lock().execute(
            "INSERT OR IGNORE INTO pii_mappings (token, original, category, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![mapping.token, mapping.original_value, category, now],
        )?;

        if inserted == 0 {
            debug!("Mapping for {} already present", mapping.token);
        } else {
            debug!("Stored mapping for {}", mapping.token);
        }
        Ok(())
    }

    fn get(&self, token: &str) -> Result<Option<String>> {
        let original: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT original FROM pii_mappings WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .optional()?;

        Ok(original)
    }

    fn clear(&self) -> Result<usize> {
        let deleted = self.conn.lock().execute("DELETE FROM pii_mappings", [])?;
        warn!("Cleared all {} mappings from database", deleted);
        Ok(deleted)
    }

    fn statistics(&self) -> Result<MappingStatistics> {
        let conn = self.conn.lock();
        let total_mappings: i64 =
            conn.query_row("SELECT COUNT(*) FROM pii_mappings", [], |row| row.get(0))?;

        let mut stats = MappingStatistics {
            total_mappings: total_mappings as usize,
            ..Default::default()
        };

        let mut stmt =
            conn.prepare("SELECT category, COUNT(*) FROM pii_mappings GROUP BY category")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (category, count) = row?;
            match category.parse() {
                Ok(category) => {
                    stats.mappings_by_category.insert(category, count as usize);
                }
                Err(_) => debug!("Skipping {} mappings with category {}", count, category),
            }
        }

        Ok(stats)
    }
}

fn now_secs() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| PiiError::Storage(format!("system clock before epoch: {}", e)))
}
