//! File tools: deterministic filesystem operations
//!
//! Atomic writes against the real filesystem.

mod file_write;

pub use file_write::{file_write, stage_write, FileWriteError, StagedWrite};
