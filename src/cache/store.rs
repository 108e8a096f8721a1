//! Persistent tag cache using redb.
//!
//! Caches extracted tags per file, keyed by absolute path and validated by
//! an exact (mtime_ns, size) stamp. On a warm run with unchanged files the
//! parse stage is skipped entirely.
//!
//! Cache structure:
//! - Database: `<root>/.tagmap.tags.cache.v1/tags.redb`
//! - Key: absolute file path
//! - Value: bincode-serialized (mtime_ns, size, Vec<Tag>)
//!
//! Design decisions:
//! - Stamp equality is exact, not newer-than: a restored backup with an
//!   older mtime must also invalidate
//! - Writes are buffered and land in one transaction at `commit()`, so a
//!   run hits the disk once; redb fsyncs on commit
//! - An unopenable store (lock held, corruption, permissions) degrades to
//!   an in-memory map for the run after a single warning
//! - The schema version lives in the directory name; bumping it makes old
//!   stores invisible instead of needing migration

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::io::Io;
use crate::types::{FileStamp, Tag};

/// Table definition for the tag cache.
/// Key = absolute file path, Value = serialized CacheEntry
const TAGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("tags");

/// Cache schema version; bumped on any incompatible change to `CacheEntry`
/// or the table layout.
pub const TAGS_CACHE_VERSION: u32 = 1;

/// Name of the cache directory created at the repository root.
pub fn cache_dir_name() -> String {
    format!(".tagmap.tags.cache.v{TAGS_CACHE_VERSION}")
}

/// Cache entry: validation stamp + extracted tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    mtime_ns: u128,
    size: u64,
    tags: Vec<Tag>,
}

impl CacheEntry {
    fn stamp(&self) -> FileStamp {
        FileStamp {
            mtime_ns: self.mtime_ns,
            size: self.size,
        }
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).context("failed to serialize cache entry")
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).context("failed to deserialize cache entry")
    }
}

/// Persistent tag cache with in-memory degradation.
///
/// Owned by the map builder for a run's lifetime. `put` buffers; `commit`
/// persists everything pending in one transaction and must be called before
/// a successful run exits (including a cancelled one).
pub struct TagCache {
    /// Open database, or None when degraded to memory
    db: Option<Database>,
    /// Fallback store used when the database could not be opened
    mem: HashMap<String, CacheEntry>,
    /// Writes buffered since the last commit
    pending: HashMap<String, CacheEntry>,
    /// Cache directory, kept for diagnostics
    #[allow(dead_code)]
    cache_dir: PathBuf,
}

impl TagCache {
    /// Open or create the tag cache under `root`.
    ///
    /// Never fails: any problem opening the store (locked by another
    /// process, corruption, permissions) produces one warning through `io`
    /// and an in-memory cache for the run.
    pub fn open(root: &Path, io: &dyn Io) -> Self {
        let cache_dir = root.join(cache_dir_name());

        let db = std::fs::create_dir_all(&cache_dir)
            .map_err(anyhow::Error::from)
            .and_then(|_| {
                Database::create(cache_dir.join("tags.redb")).map_err(anyhow::Error::from)
            })
            .map_err(|e| {
                io.tool_warning(&format!(
                    "unable to open tag cache in {}, using in-memory cache for this run: {e}",
                    cache_dir.display()
                ));
            })
            .ok();

        Self {
            db,
            mem: HashMap::new(),
            pending: HashMap::new(),
            cache_dir,
        }
    }

    /// Purely in-memory cache; used for tests and for `refresh=always` runs
    /// that discard prior state.
    pub fn in_memory() -> Self {
        Self {
            db: None,
            mem: HashMap::new(),
            pending: HashMap::new(),
            cache_dir: PathBuf::new(),
        }
    }

    /// True when the persistent store could not be opened.
    pub fn is_degraded(&self) -> bool {
        self.db.is_none()
    }

    /// Get cached tags for a file iff the stored stamp equals `stamp`.
    pub fn get(&self, fname: &str, stamp: FileStamp) -> Option<Vec<Tag>> {
        let entry = self.lookup(fname)?;
        if entry.stamp() == stamp {
            Some(entry.tags)
        } else {
            None
        }
    }

    /// Get cached tags regardless of stamp (refresh=manual).
    pub fn get_unvalidated(&self, fname: &str) -> Option<Vec<Tag>> {
        self.lookup(fname).map(|e| e.tags)
    }

    fn lookup(&self, fname: &str) -> Option<CacheEntry> {
        if let Some(entry) = self.pending.get(fname) {
            return Some(entry.clone());
        }
        if let Some(entry) = self.mem.get(fname) {
            return Some(entry.clone());
        }

        let db = self.db.as_ref()?;
        let read_txn = db.begin_read().ok()?;
        let table = read_txn.open_table(TAGS_TABLE).ok()?;
        let value_guard = table.get(fname).ok()??;
        CacheEntry::from_bytes(value_guard.value()).ok()
    }

    /// Buffer tags for a file with its current stamp.
    /// Nothing reaches disk until `commit()`.
    pub fn put(&mut self, fname: &str, stamp: FileStamp, tags: Vec<Tag>) {
        self.pending.insert(
            fname.to_string(),
            CacheEntry {
                mtime_ns: stamp.mtime_ns,
                size: stamp.size,
                tags,
            },
        );
    }

    /// Drop every entry, persistent and pending (refresh=always).
    pub fn clear(&mut self) {
        self.pending.clear();
        self.mem.clear();

        let Some(db) = self.db.as_ref() else { return };
        let Ok(write_txn) = db.begin_write() else {
            return;
        };
        {
            let Ok(mut table) = write_txn.open_table(TAGS_TABLE) else {
                return;
            };
            let keys: Vec<String> = table
                .iter()
                .ok()
                .into_iter()
                .flatten()
                .filter_map(|r| r.ok())
                .map(|(k, _)| k.value().to_string())
                .collect();
            for key in keys {
                let _ = table.remove(key.as_str());
            }
        }
        let _ = write_txn.commit();
    }

    /// Flush all pending writes in one transaction.
    ///
    /// In degraded mode the pending entries move to the in-memory store so
    /// later lookups in the same run still hit.
    pub fn commit(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let Some(db) = self.db.as_ref() else {
            self.mem.extend(self.pending.drain());
            return Ok(());
        };

        let write_txn = db
            .begin_write()
            .context("failed to begin cache write transaction")?;
        {
            let mut table = write_txn
                .open_table(TAGS_TABLE)
                .context("failed to open tags table")?;
            for (fname, entry) in &self.pending {
                let bytes = entry.to_bytes()?;
                table
                    .insert(fname.as_str(), bytes.as_slice())
                    .with_context(|| format!("failed to insert cache entry for {fname}"))?;
            }
        }
        write_txn.commit().context("failed to commit tag cache")?;
        self.pending.clear();

        Ok(())
    }
}
