//! Parallel application of a `RangeMap`'s recorded renames across a
//! source tree: each worker applies `apply::apply_references` to its
//! file's parallel relative path under the output directory.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;

use log::{debug, info};

use crate::apply::apply_references;
use crate::error::{Error, Result};
use crate::mapping::FastMappings;
use crate::ranges::RangeMap;
use super::{default_worker_count, list_files_recursive};

pub fn apply_tree(
    input_dir: &Path,
    output_dir: &Path,
    range_map: &RangeMap,
    mappings: &FastMappings,
) -> Result<()> {
    let files = list_files_recursive(input_dir)?;
    let worker_count = default_worker_count();

    let (work_tx, work_rx) = mpsc::channel::<PathBuf>();
    for file in &files {
        work_tx.send(file.clone()).unwrap();
    }
    drop(work_tx);
    let work_rx = Mutex::new(work_rx);
    let first_error: Mutex<Option<Error>> = Mutex::new(None);

    thread::scope(|scope| {
        for _ in 0..worker_count {
            let work_rx = &work_rx;
            let first_error = &first_error;
            scope.spawn(move || {
                loop {
                    let next = { work_rx.lock().unwrap().recv() };
                    let path = match next {
                        Ok(path) => path,
                        Err(_) => break,
                    };
                    if first_error.lock().unwrap().is_some() {
                        break;
                    }
                    if let Err(e) = apply_one_file(input_dir, output_dir, &path, range_map, mappings) {
                        let mut slot = first_error.lock().unwrap();
                        if slot.is_none() {
                            *slot = Some(e);
                        }
                        break;
                    }
                }
            });
        }
    });

    if let Some(error) = first_error.into_inner().unwrap() {
        return Err(error);
    }
    info!("applied ranges across {} files", files.len());
    Ok(())
}

fn apply_one_file(
    input_dir: &Path,
    output_dir: &Path,
    path: &Path,
    range_map: &RangeMap,
    mappings: &FastMappings,
) -> Result<()> {
    let relative = path.strip_prefix(input_dir)
        .map_err(|_| Error::Invariant(format!("{:?} is not under {:?}", path, input_dir)))?;
    let relative_key = relative.to_string_lossy().replace('\\', "/");
    let out_path = output_dir.join(relative);
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let references = range_map.sorted_references(&relative_key);
    debug!("applying {} references to {}", references.len(), relative_key);
    let input = std::fs::File::open(path)?;
    let output = std::fs::File::create(&out_path)?;
    apply_references(&relative_key, input, output, &references, mappings)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mapping::ClassMappings;
    use crate::parse::FnvIndexMap;
    use crate::ranges::{FieldReference, FileLocation};

    #[test]
    fn applies_renames_across_a_small_tree() {
        let input_dir = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        std::fs::write(input_dir.path().join("A.java"), b"class Foo { int bar; }\n").unwrap();

        let mut fields = FnvIndexMap::default();
        fields.insert("A.java".to_string(), vec![FieldReference::new(
            FileLocation::new(16, 19).unwrap(), "Foo".into(), "bar".into(),
        ).unwrap()]);
        let range_map = RangeMap::new(fields, FnvIndexMap::default(), FnvIndexMap::default()).unwrap();

        let mut classes = FnvIndexMap::default();
        let mut foo = ClassMappings::new("Foo".into());
        foo.set_field_name("bar".into(), "baz".into());
        classes.insert("Foo".into(), foo);
        let mappings = FastMappings::new(classes);

        apply_tree(input_dir.path(), output_dir.path(), &range_map, &mappings).unwrap();

        let output = std::fs::read(output_dir.path().join("A.java")).unwrap();
        assert_eq!(output, b"class Foo { int baz; }\n");
    }
}
