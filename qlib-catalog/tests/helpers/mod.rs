//! Test Helper Utilities
//!
//! Shared utilities for qlib-catalog integration tests

pub mod log_capture;

pub use log_capture::{capture_logs, LogCapture};

use std::path::{Path, PathBuf};

/// Write a fixture file into `dir` and return its path
pub fn write_fixture(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}
