//! Parallel SHA-256 hashing of a source tree, used to gate incremental
//! extraction: a file is skipped if its fresh hash matches the existing
//! `RangeMap`'s recorded hash for that relative path.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::parse::FnvIndexMap;
use super::list_files_recursive;

/// Hashes every file under `root` in parallel, keyed by its path
/// relative to `root`. Worker count is `max(2, available_parallelism)`.
pub fn hash_tree(root: &Path) -> Result<FnvIndexMap<String, Vec<u8>>> {
    let files = list_files_recursive(root)?;
    let worker_count = thread::available_parallelism().map(|n| n.get()).unwrap_or(2).max(2);

    let (work_tx, work_rx) = mpsc::channel::<PathBuf>();
    for file in &files {
        work_tx.send(file.clone()).unwrap();
    }
    drop(work_tx);
    let work_rx = Mutex::new(work_rx);
    let (result_tx, result_rx) = mpsc::channel::<Result<(PathBuf, Vec<u8>)>>();

    thread::scope(|scope| {
        for _ in 0..worker_count {
            let work_rx = &work_rx;
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                loop {
                    let next = { work_rx.lock().unwrap().recv() };
                    let path = match next {
                        Ok(path) => path,
                        Err(_) => break,
                    };
                    let outcome = hash_file(&path).map(|digest| (path.clone(), digest));
                    if result_tx.send(outcome).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);
    });

    let mut hashes = FnvIndexMap::default();
    for outcome in result_rx {
        let (path, digest) = outcome?;
        let relative = path.strip_prefix(root)
            .map_err(|_| Error::Invariant(format!("{:?} is not under {:?}", path, root)))?;
        hashes.insert(relative.to_string_lossy().replace('\\', "/"), digest);
    }
    Ok(hashes)
}

fn hash_file(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hasher.finalize().to_vec())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hashes_every_file_keyed_by_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("pkg/A.java"), b"class A {}").unwrap();
        std::fs::write(dir.path().join("pkg/B.java"), b"class B {}").unwrap();

        let hashes = hash_tree(dir.path()).unwrap();
        assert_eq!(hashes.len(), 2);
        assert!(hashes.contains_key("pkg/A.java"));
        assert!(hashes.contains_key("pkg/B.java"));
        assert_ne!(hashes["pkg/A.java"], hashes["pkg/B.java"]);

        let rehashed = hash_tree(dir.path()).unwrap();
        assert_eq!(hashes["pkg/A.java"], rehashed["pkg/A.java"]);
    }
}
