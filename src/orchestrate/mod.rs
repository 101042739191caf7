//! Worker-pool orchestration: parallel jar remap, parallel source-tree
//! apply, and the file-hash gate for incremental extraction. OS threads
//! only, bounded `std::sync::mpsc` channels as the work queues.

pub mod hash;
pub mod jar;
pub mod source;

use std::path::{Path, PathBuf};

use crate::error::Result;

pub(crate) fn list_files_recursive(root: &Path) -> Result<Vec<PathBuf>> {
    let mut result = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                stack.push(path);
            } else {
                result.push(path);
            }
        }
    }
    result.sort();
    Ok(result)
}

/// `max(1, cpu_count - 1)` remap workers, pairing with a dedicated writer.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2).saturating_sub(1).max(1)
}
