//! Content-addressed backup store
//!
//! Layout under the store root:
//! - `metadata.json` - the index (written atomically)
//! - `files/` - snapshot data, gzip-compressed above the size threshold
//!
//! The index lives behind a mutex. Hashing and data writes happen outside
//! the lock; the duplicate check is repeated under the lock before the
//! record is appended.

use chrono::{Duration as ChronoDuration, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::errors::{BackupError, Result};
use super::record::{
    BackupIndex, BackupRecord, BackupStatistics, INFO_COMPRESSED, INFO_MTIME,
};
use crate::config::BackupConfig;
use crate::file_tools::file_write;

/// Index file name at the store root
pub const INDEX_FILE: &str = "metadata.json";

/// Sub-directory holding snapshot data
pub const DATA_DIR: &str = "files";

/// Hex SHA-256 of a byte slice
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Persistent, de-duplicating snapshot store
#[derive(Debug)]
pub struct BackupStore {
    root: PathBuf,
    config: BackupConfig,
    index: Mutex<BackupIndex>,
}

impl BackupStore {
    /// Open (or initialise) a store at `root`
    ///
    /// An unreadable index is moved aside to `metadata.json.corrupt` and a
    /// fresh one is started.
    pub fn open(root: &Path, config: BackupConfig) -> Result<Self> {
        fs::create_dir_all(root.join(DATA_DIR))?;
        let index = load_index(root)?;
        debug!(
            root = %root.display(),
            backups = index.backups.len(),
            "backup store opened"
        );
        Ok(Self {
            root: root.to_path_buf(),
            config,
            index: Mutex::new(index),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Snapshot `path` and record it in the index
    ///
    /// Returns the existing record when identical content for the same path
    /// is already stored.
    pub fn create_backup(
        &self,
        path: &Path,
        reason: &str,
        linked_fix_id: Option<&str>,
        issues_fixed: &[String],
    ) -> Result<BackupRecord> {
        let resolved = match fs::canonicalize(path) {
            Ok(p) => p,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BackupError::SourceNotFound(path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let meta = fs::metadata(&resolved)?;
        if !meta.is_file() {
            return Err(BackupError::NotAFile(resolved.display().to_string()));
        }

        let bytes = fs::read(&resolved)?;
        let hash = content_hash(&bytes);

        if let Some(existing) = self.index.lock().find_duplicate(&resolved, &hash) {
            debug!(
                backup_id = %existing.backup_id,
                file = %resolved.display(),
                "identical content already backed up"
            );
            return Ok(existing.clone());
        }

        let timestamp = Utc::now();
        let compressed = bytes.len() as u64 > self.config.compression_threshold_bytes;
        let backup_id = format!(
            "{}_{}_{}",
            timestamp.format("%Y%m%d_%H%M%S_%6f"),
            &hash[..8],
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let backup_path = self
            .root
            .join(DATA_DIR)
            .join(data_file_name(&resolved, &backup_id, compressed));

        let data = if compressed { gzip(&bytes)? } else { bytes.clone() };
        file_write(&backup_path, &data)?;

        let mut additional_info = BTreeMap::new();
        additional_info.insert(INFO_COMPRESSED.to_string(), serde_json::json!(compressed));
        if let Some(secs) = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
        {
            additional_info.insert(INFO_MTIME.to_string(), serde_json::json!(secs));
        }

        let record = BackupRecord {
            backup_id,
            original_path: resolved.clone(),
            backup_path,
            timestamp,
            content_hash: hash,
            size: bytes.len() as u64,
            reason: reason.to_string(),
            linked_fix_id: linked_fix_id.map(str::to_string),
            issues_fixed: issues_fixed.to_vec(),
            created_by: self.config.created_by.clone(),
            additional_info,
        };

        let evicted = {
            let mut index = self.index.lock();

            // Lost a race with an identical backup
            if let Some(existing) = index.find_duplicate(&resolved, &record.content_hash) {
                let existing = existing.clone();
                drop(index);
                remove_data_file(&record);
                return Ok(existing);
            }

            index.backups.push(record.clone());
            let evicted = index.evict_excess(&resolved, self.config.max_backups_per_file);

            if let Err(e) = self.persist(&index) {
                // Undo the in-memory change so the index matches disk
                index.backups.retain(|r| r.backup_id != record.backup_id);
                for old in evicted {
                    index.backups.push(old);
                }
                index.backups.sort_by_key(|r| r.timestamp);
                drop(index);
                remove_data_file(&record);
                return Err(e);
            }
            evicted
        };

        for old in &evicted {
            debug!(backup_id = %old.backup_id, "evicting old backup");
            remove_data_file(old);
        }

        info!(
            backup_id = %record.backup_id,
            file = %record.original_path.display(),
            size = record.size,
            compressed,
            "backup created"
        );
        Ok(record)
    }

    /// Write a backup's content back to its original path (or `target`)
    ///
    /// Returns the path that was written.
    pub fn restore_backup(&self, backup_id: &str, target: Option<&Path>) -> Result<PathBuf> {
        let record = self
            .get_backup(backup_id)
            .ok_or_else(|| BackupError::NotFound(backup_id.to_string()))?;

        let content = self.read_content(&record)?;
        let target = target
            .map(Path::to_path_buf)
            .unwrap_or_else(|| record.original_path.clone());

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        file_write(&target, &content)?;

        if let Some(mtime) = record.original_mtime() {
            let applied = fs::File::options()
                .write(true)
                .open(&target)
                .and_then(|f| f.set_modified(mtime));
            if let Err(e) = applied {
                warn!(file = %target.display(), "could not restore mtime: {}", e);
            }
        }

        info!(backup_id, file = %target.display(), "backup restored");
        Ok(target)
    }

    /// Uncompressed content of a backup
    pub fn read_backup(&self, backup_id: &str) -> Result<Vec<u8>> {
        let record = self
            .get_backup(backup_id)
            .ok_or_else(|| BackupError::NotFound(backup_id.to_string()))?;
        self.read_content(&record)
    }

    /// Re-hash the stored data and compare with the recorded hash
    pub fn verify_backup(&self, backup_id: &str) -> Result<bool> {
        let record = self
            .get_backup(backup_id)
            .ok_or_else(|| BackupError::NotFound(backup_id.to_string()))?;
        let content = self.read_content(&record)?;
        Ok(content_hash(&content) == record.content_hash)
    }

    pub fn get_backup(&self, backup_id: &str) -> Option<BackupRecord> {
        self.index.lock().find(backup_id).cloned()
    }

    /// Most recent backup of `path`
    pub fn latest_backup_for(&self, path: &Path) -> Option<BackupRecord> {
        self.list_backups(Some(path), 1).into_iter().next()
    }

    /// Backups newest-first, optionally for one path, at most `limit`
    pub fn list_backups(&self, path: Option<&Path>, limit: usize) -> Vec<BackupRecord> {
        let resolved = path.map(resolve_path);
        let index = self.index.lock();
        index
            .backups
            .iter()
            .rev()
            .filter(|r| match &resolved {
                Some(p) => &r.original_path == p,
                None => true,
            })
            .take(limit)
            .cloned()
            .collect()
    }

    /// Remove one backup and its data
    pub fn delete_backup(&self, backup_id: &str) -> Result<BackupRecord> {
        let removed = {
            let mut index = self.index.lock();
            let pos = index
                .backups
                .iter()
                .position(|r| r.backup_id == backup_id)
                .ok_or_else(|| BackupError::NotFound(backup_id.to_string()))?;
            let removed = index.backups.remove(pos);
            if let Err(e) = self.persist(&index) {
                index.backups.insert(pos, removed);
                return Err(e);
            }
            removed
        };
        remove_data_file(&removed);
        info!(backup_id, "backup deleted");
        Ok(removed)
    }

    /// Delete backups older than `retention_days`; returns how many went
    pub fn cleanup_expired(&self, retention_days: u32) -> Result<usize> {
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(retention_days));
        let expired: Vec<BackupRecord> = {
            let mut index = self.index.lock();
            let before = index.backups.clone();
            let (expired, kept): (Vec<_>, Vec<_>) = index
                .backups
                .drain(..)
                .partition(|r| r.timestamp < cutoff);
            index.backups = kept;
            if expired.is_empty() {
                return Ok(0);
            }
            if let Err(e) = self.persist(&index) {
                index.backups = before;
                return Err(e);
            }
            expired
        };

        for record in &expired {
            remove_data_file(record);
        }
        info!(
            removed = expired.len(),
            retention_days, "expired backups cleaned up"
        );
        Ok(expired.len())
    }

    /// Cleanup using the configured retention period
    pub fn cleanup_default(&self) -> Result<usize> {
        self.cleanup_expired(self.config.retention_days)
    }

    pub fn get_statistics(&self) -> BackupStatistics {
        let index = self.index.lock();
        let mut stats = BackupStatistics {
            total_backups: index.backups.len(),
            ..Default::default()
        };
        let mut paths = HashSet::new();

        for record in &index.backups {
            stats.total_size += record.size;
            stats.stored_size += fs::metadata(&record.backup_path)
                .map(|m| m.len())
                .unwrap_or(0);
            if record.is_compressed() {
                stats.compressed_backups += 1;
            }
            paths.insert(record.original_path.clone());
            *stats.by_reason.entry(record.reason.clone()).or_insert(0) += 1;
            *stats
                .by_day
                .entry(record.timestamp.format("%Y-%m-%d").to_string())
                .or_insert(0) += 1;

            stats.oldest = Some(match stats.oldest {
                Some(t) if t <= record.timestamp => t,
                _ => record.timestamp,
            });
            stats.newest = Some(match stats.newest {
                Some(t) if t >= record.timestamp => t,
                _ => record.timestamp,
            });
        }

        stats.files_tracked = paths.len();
        if stats.total_backups > 0 {
            stats.average_size = stats.total_size as f64 / stats.total_backups as f64;
        }
        stats
    }

    fn read_content(&self, record: &BackupRecord) -> Result<Vec<u8>> {
        let data = match fs::read(&record.backup_path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BackupError::DataMissing {
                    backup_id: record.backup_id.clone(),
                    path: record.backup_path.display().to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        if record.is_compressed() {
            gunzip(&data)
        } else {
            Ok(data)
        }
    }

    fn persist(&self, index: &BackupIndex) -> Result<()> {
        let json = serde_json::to_vec_pretty(index)?;
        file_write(&self.root.join(INDEX_FILE), &json)?;
        Ok(())
    }
}

fn load_index(root: &Path) -> Result<BackupIndex> {
    let path = root.join(INDEX_FILE);
    let text = match fs::read(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BackupIndex::default()),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_slice::<BackupIndex>(&text) {
        Ok(index) => Ok(index),
        Err(e) => {
            let aside = root.join(format!("{}.corrupt", INDEX_FILE));
            warn!(
                index = %path.display(),
                moved_to = %aside.display(),
                "backup index unreadable ({}), starting fresh",
                e
            );
            fs::rename(&path, &aside)?;
            Ok(BackupIndex::default())
        }
    }
}

/// Canonical form of `path`, or an absolute form when it no longer exists
fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(p) = fs::canonicalize(path) {
        return p;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// `<stem>_<backup_id><ext>[.gz]`
fn data_file_name(original: &Path, backup_id: &str, compressed: bool) -> String {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let ext = original
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let gz = if compressed { ".gz" } else { "" };
    format!("{}_{}{}{}", stem, backup_id, ext, gz)
}

fn remove_data_file(record: &BackupRecord) {
    if let Err(e) = fs::remove_file(&record.backup_path) {
        if e.kind() != ErrorKind::NotFound {
            warn!(
                backup_id = %record.backup_id,
                "could not remove backup data {}: {}",
                record.backup_path.display(),
                e
            );
        }
    }
}

fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
