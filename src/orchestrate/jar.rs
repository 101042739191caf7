//! Parallel jar remap: a pool of worker threads pulls entries from a
//! shared archive, remaps `.class` entries' constant pools, and a
//! single writer thread owns the output zip. Entry order is
//! nondeterministic; a worker's fatal error aborts the whole run.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::mpsc::{self, sync_channel};
use std::sync::Mutex;
use std::thread;

use log::{debug, warn};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::classfile::{ConstantPoolDecoder, ConstantPoolRemapper};
use crate::error::{Error, Result};
use crate::mapping::FastMappings;
use super::default_worker_count;

const QUEUE_CAPACITY: usize = 256;

struct Entry {
    name: String,
    bytes: Vec<u8>,
}

pub fn remap_jar(input_path: &Path, output_path: &Path, mappings: &FastMappings) -> Result<()> {
    let input_file = File::open(input_path)?;
    let archive = Mutex::new(ZipArchive::new(input_file)
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?);
    let entry_count = archive.lock().unwrap().len();
    let worker_count = default_worker_count();

    let (work_tx, work_rx) = mpsc::channel::<usize>();
    for i in 0..entry_count {
        work_tx.send(i).unwrap();
    }
    drop(work_tx);
    let work_rx = Mutex::new(work_rx);

    let (out_tx, out_rx) = sync_channel::<std::result::Result<Entry, Error>>(QUEUE_CAPACITY);
    let output_file = File::create(output_path)?;

    thread::scope(|scope| {
        for _ in 0..worker_count {
            let work_rx = &work_rx;
            let archive = &archive;
            let out_tx = out_tx.clone();
            let mappings = mappings;
            scope.spawn(move || {
                loop {
                    let next = { work_rx.lock().unwrap().recv() };
                    let index = match next {
                        Ok(index) => index,
                        Err(_) => break,
                    };
                    let result = process_entry(archive, index, mappings);
                    let stop = result.is_err();
                    if out_tx.send(result).is_err() || stop {
                        break;
                    }
                }
            });
        }
        drop(out_tx);

        let mut writer = ZipWriter::new(output_file);
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        let mut written = 0usize;
        for entry in out_rx {
            match entry {
                Ok(entry) => {
                    debug!("writing jar entry {}", entry.name);
                    writer.start_file(&entry.name, options)
                        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, format!("starting entry {:?}: {}", entry.name, e))))?;
                    std::io::Write::write_all(&mut writer, &entry.bytes)
                        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, format!("writing entry {:?}: {}", entry.name, e))))?;
                    written += 1;
                }
                Err(e) => {
                    warn!("aborting jar remap: {}", e);
                    return Err(e);
                }
            }
        }
        writer.finish().map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        debug!("wrote {} jar entries", written);
        Ok(())
    })
}

fn process_entry(archive: &Mutex<ZipArchive<File>>, index: usize, mappings: &FastMappings) -> std::result::Result<Entry, Error> {
    let (name, mut bytes) = {
        let mut archive = archive.lock().unwrap();
        let mut file = archive.by_index(index)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, format!("reading entry {}: {}", index, e))))?;
        let name = file.name().to_string();
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, format!("reading entry {:?}: {}", name, e))))?;
        (name, bytes)
    };

    if name.ends_with(".class") {
        let decoder = ConstantPoolDecoder::parse(&bytes)
            .map_err(|e| annotate(e, &name))?;
        bytes = ConstantPoolRemapper::remap(&decoder, mappings)
            .map_err(|e| annotate(e, &name))?;
        let class_internal_name = name.trim_end_matches(".class");
        let new_name = mappings.remap_class_name(class_internal_name);
        let output_name = format!("{}.class", new_name);
        Ok(Entry { name: output_name, bytes })
    } else {
        Ok(Entry { name, bytes })
    }
}

fn annotate(e: Error, entry_name: &str) -> Error {
    match e {
        Error::ConstantPoolDecode(msg) => Error::ConstantPoolDecode(format!("{}: {}", entry_name, msg)),
        Error::InvalidMappings(msg) => Error::InvalidMappings(format!("{}: {}", entry_name, msg)),
        other => other,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::classfile::MAGIC;
    use crate::mapping::ClassMappings;
    use crate::parse::FnvIndexMap;
    use std::io::Write as _;

    fn minimal_class_file(class_name: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&52u16.to_be_bytes());
        buf.extend_from_slice(&3u16.to_be_bytes()); // 2 constants + 1
        buf.push(1); // Utf8
        buf.extend_from_slice(&(class_name.len() as u16).to_be_bytes());
        buf.extend_from_slice(class_name.as_bytes());
        buf.push(7); // ClassRef
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&[0, 0, 0]); // trailing access_flags/this/super stub
        buf
    }

    #[test]
    fn remaps_class_entries_and_passes_through_others() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("in.jar");
        let output_path = dir.path().join("out.jar");

        {
            let file = std::fs::File::create(&input_path).unwrap();
            let mut writer = ZipWriter::new(file);
            writer.start_file("Foo.class", FileOptions::default()).unwrap();
            writer.write_all(&minimal_class_file("Foo")).unwrap();
            writer.start_file("resources/readme.txt", FileOptions::default()).unwrap();
            writer.write_all(b"hello").unwrap();
            writer.finish().unwrap();
        }

        let mut classes = FnvIndexMap::default();
        let mut foo = ClassMappings::new("Foo".into());
        foo.remapped_name = Some("Qux".into());
        classes.insert("Foo".into(), foo);
        let mappings = FastMappings::new(classes);

        remap_jar(&input_path, &output_path, &mappings).unwrap();

        let output_file = std::fs::File::open(&output_path).unwrap();
        let mut archive = ZipArchive::new(output_file).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"Qux.class".to_string()));
        assert!(names.contains(&"resources/readme.txt".to_string()));

        let mut text_entry = archive.by_name("resources/readme.txt").unwrap();
        let mut contents = String::new();
        text_entry.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "hello");
    }
}
