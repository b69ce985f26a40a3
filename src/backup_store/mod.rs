//! Backup store: durable snapshots of files before they are modified
//!
//! Snapshots are de-duplicated per (path, content hash), compressed above a
//! size threshold and evicted oldest-first beyond a per-file limit.

mod errors;
mod record;
mod store;

pub use errors::{BackupError, Result};
pub use record::{BackupIndex, BackupRecord, BackupStatistics, INDEX_VERSION};
pub use store::{content_hash, BackupStore, DATA_DIR, INDEX_FILE};
