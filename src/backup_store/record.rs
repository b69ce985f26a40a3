//! Backup index records
//!
//! The on-disk index is `metadata.json` at the store root. Field names follow
//! the index file layout; the Rust names are the in-memory view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Index format version written to new stores
pub const INDEX_VERSION: &str = "1.0";

pub(crate) const INFO_COMPRESSED: &str = "compressed";
pub(crate) const INFO_MTIME: &str = "original_mtime_secs";

/// One retained snapshot of a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub backup_id: String,
    /// Resolved (canonical) path of the file that was backed up
    #[serde(rename = "original_file_path")]
    pub original_path: PathBuf,
    /// Location of the snapshot data inside the store
    #[serde(rename = "backup_file_path")]
    pub backup_path: PathBuf,
    pub timestamp: DateTime<Utc>,
    /// Hex SHA-256 of the uncompressed content
    #[serde(rename = "file_hash")]
    pub content_hash: String,
    /// Uncompressed size in bytes
    #[serde(rename = "file_size")]
    pub size: u64,
    pub reason: String,
    #[serde(rename = "fix_request_id", default)]
    pub linked_fix_id: Option<String>,
    #[serde(default)]
    pub issues_fixed: Vec<String>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub additional_info: BTreeMap<String, serde_json::Value>,
}

impl BackupRecord {
    /// Whether the snapshot data is gzip-compressed
    pub fn is_compressed(&self) -> bool {
        self.additional_info
            .get(INFO_COMPRESSED)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Modification time of the original file when it was backed up
    pub fn original_mtime(&self) -> Option<SystemTime> {
        let secs = self.additional_info.get(INFO_MTIME)?.as_f64()?;
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        Some(UNIX_EPOCH + Duration::from_secs_f64(secs))
    }
}

/// Contents of `metadata.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupIndex {
    pub version: String,
    pub created_at: DateTime<Utc>,
    /// Records in creation order
    #[serde(default)]
    pub backups: Vec<BackupRecord>,
}

impl Default for BackupIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION.to_string(),
            created_at: Utc::now(),
            backups: Vec::new(),
        }
    }
}

impl BackupIndex {
    pub fn find(&self, backup_id: &str) -> Option<&BackupRecord> {
        self.backups.iter().find(|r| r.backup_id == backup_id)
    }

    /// Existing record for the same path and content
    pub fn find_duplicate(&self, path: &Path, content_hash: &str) -> Option<&BackupRecord> {
        self.backups
            .iter()
            .find(|r| r.original_path == path && r.content_hash == content_hash)
    }

    pub fn count_for(&self, path: &Path) -> usize {
        self.backups
            .iter()
            .filter(|r| r.original_path == path)
            .count()
    }

    /// Remove the oldest records for `path` until at most `keep` remain
    ///
    /// Returns the removed records so their data files can be deleted.
    pub fn evict_excess(&mut self, path: &Path, keep: usize) -> Vec<BackupRecord> {
        let excess = self.count_for(path).saturating_sub(keep);
        if excess == 0 {
            return Vec::new();
        }

        let mut evicted = Vec::with_capacity(excess);
        let mut remaining = excess;
        self.backups.retain(|r| {
            if remaining > 0 && r.original_path == path {
                remaining -= 1;
                evicted.push(r.clone());
                false
            } else {
                true
            }
        });
        evicted
    }
}

/// Aggregate numbers over the whole index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupStatistics {
    pub total_backups: usize,
    /// Sum of uncompressed sizes
    pub total_size: u64,
    /// Sum of on-disk data sizes (compressed where applicable)
    pub stored_size: u64,
    pub average_size: f64,
    pub files_tracked: usize,
    pub compressed_backups: usize,
    pub by_reason: BTreeMap<String, usize>,
    /// Backups per day, keyed `YYYY-MM-DD`
    pub by_day: BTreeMap<String, usize>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, path: &str, hash: &str) -> BackupRecord {
        BackupRecord {
            backup_id: id.to_string(),
            original_path: PathBuf::from(path),
            backup_path: PathBuf::from(format!("/store/{}", id)),
            timestamp: Utc::now(),
            content_hash: hash.to_string(),
            size: 10,
            reason: "test".to_string(),
            linked_fix_id: None,
            issues_fixed: vec![],
            created_by: "tests".to_string(),
            additional_info: BTreeMap::new(),
        }
    }

    #[test]
    fn test_evict_excess_removes_oldest_for_path_only() {
        let mut index = BackupIndex::default();
        index.backups.push(record("a1", "/a.py", "h1"));
        index.backups.push(record("b1", "/b.py", "h1"));
        index.backups.push(record("a2", "/a.py", "h2"));
        index.backups.push(record("a3", "/a.py", "h3"));

        let evicted = index.evict_excess(Path::new("/a.py"), 2);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].backup_id, "a1");

        let ids: Vec<_> = index.backups.iter().map(|r| r.backup_id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "a2", "a3"]);
    }

    #[test]
    fn test_find_duplicate() {
        let mut index = BackupIndex::default();
        index.backups.push(record("a1", "/a.py", "h1"));
        assert!(index.find_duplicate(Path::new("/a.py"), "h1").is_some());
        assert!(index.find_duplicate(Path::new("/a.py"), "h2").is_none());
        assert!(index.find_duplicate(Path::new("/b.py"), "h1").is_none());
    }

    #[test]
    fn test_index_field_names() {
        let mut index = BackupIndex::default();
        index.backups.push(record("a1", "/a.py", "h1"));
        let json = serde_json::to_value(&index).unwrap();
        let entry = &json["backups"][0];
        assert_eq!(entry["original_file_path"], "/a.py");
        assert_eq!(entry["file_hash"], "h1");
        assert_eq!(entry["file_size"], 10);
        assert!(entry.get("fix_request_id").is_some());
    }

    #[test]
    fn test_compressed_and_mtime_flags() {
        let mut r = record("a1", "/a.py", "h1");
        assert!(!r.is_compressed());
        assert!(r.original_mtime().is_none());

        r.additional_info
            .insert(INFO_COMPRESSED.to_string(), serde_json::json!(true));
        r.additional_info
            .insert(INFO_MTIME.to_string(), serde_json::json!(1_700_000_000.0));
        assert!(r.is_compressed());
        assert_eq!(
            r.original_mtime(),
            Some(UNIX_EPOCH + Duration::from_secs(1_700_000_000))
        );
    }
}
