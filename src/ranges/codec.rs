//! MessagePack envelope for `RangeMap` (see the range-map file format).
//!
//! The envelope is a fixed three-key dictionary (`fieldReferences`,
//! `methodReferences`, `fileHashes`); each reference blob packs its own
//! big-endian integers ahead of a UTF-8 payload, independent of the
//! surrounding MessagePack framing.

use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use rmp::decode::{self, ValueReadError};
use rmp::encode;

use crate::error::{Error, Result};
use crate::parse::FnvIndexMap;
use super::{FieldReference, MethodReference, FileLocation, RangeMap};

const KEY_FIELD_REFERENCES: &str = "fieldReferences";
const KEY_METHOD_REFERENCES: &str = "methodReferences";
const KEY_FILE_HASHES: &str = "fileHashes";

pub fn write_range_map<W: Write>(map: &RangeMap, mut out: W) -> Result<()> {
    encode::write_map_len(&mut out, 3).map_err(encode_err)?;

    write_str(&mut out, KEY_FIELD_REFERENCES)?;
    encode::write_map_len(&mut out, map.field_references_map().len() as u32).map_err(encode_err)?;
    for (file, refs) in map.field_references_map() {
        write_str(&mut out, file)?;
        encode::write_array_len(&mut out, refs.len() as u32).map_err(encode_err)?;
        for r in refs {
            let blob = encode_field_blob(r)?;
            encode::write_bin(&mut out, &blob).map_err(encode_err)?;
        }
    }

    write_str(&mut out, KEY_METHOD_REFERENCES)?;
    encode::write_map_len(&mut out, map.method_references_map().len() as u32).map_err(encode_err)?;
    for (file, refs) in map.method_references_map() {
        write_str(&mut out, file)?;
        encode::write_array_len(&mut out, refs.len() as u32).map_err(encode_err)?;
        for r in refs {
            let blob = encode_method_blob(r)?;
            encode::write_bin(&mut out, &blob).map_err(encode_err)?;
        }
    }

    write_str(&mut out, KEY_FILE_HASHES)?;
    encode::write_map_len(&mut out, map.file_hashes_map().len() as u32).map_err(encode_err)?;
    for (file, hash) in map.file_hashes_map() {
        write_str(&mut out, file)?;
        encode::write_bin(&mut out, hash).map_err(encode_err)?;
    }
    Ok(())
}

pub fn read_range_map<R: Read>(mut input: R) -> Result<RangeMap> {
    let top_len = decode::read_map_len(&mut input).map_err(decode_err)?;
    if top_len != 3 {
        return Err(Error::Invariant(format!(
            "range map dictionary must have exactly 3 keys, got {}", top_len
        )));
    }

    let mut field_references = None;
    let mut method_references = None;
    let mut file_hashes = None;

    for _ in 0..top_len {
        let key = read_str(&mut input)?;
        match key.as_str() {
            KEY_FIELD_REFERENCES => {
                if field_references.is_some() {
                    return Err(Error::Invariant("duplicate fieldReferences key".into()));
                }
                field_references = Some(read_field_references(&mut input)?);
            }
            KEY_METHOD_REFERENCES => {
                if method_references.is_some() {
                    return Err(Error::Invariant("duplicate methodReferences key".into()));
                }
                method_references = Some(read_method_references(&mut input)?);
            }
            KEY_FILE_HASHES => {
                if file_hashes.is_some() {
                    return Err(Error::Invariant("duplicate fileHashes key".into()));
                }
                file_hashes = Some(read_file_hashes(&mut input)?);
            }
            other => {
                return Err(Error::Invariant(format!("unknown range map key {:?}", other)));
            }
        }
    }

    RangeMap::new(
        field_references.ok_or_else(|| Error::Invariant("missing fieldReferences".into()))?,
        method_references.ok_or_else(|| Error::Invariant("missing methodReferences".into()))?,
        file_hashes.ok_or_else(|| Error::Invariant("missing fileHashes".into()))?,
    )
}

fn read_field_references<R: Read>(input: &mut R) -> Result<FnvIndexMap<String, Vec<FieldReference>>> {
    let len = decode::read_map_len(input).map_err(decode_err)?;
    let mut result = FnvIndexMap::default();
    for _ in 0..len {
        let file = read_str(input)?;
        if result.contains_key(&file) {
            return Err(Error::Invariant(format!("duplicate file key {:?}", file)));
        }
        let count = decode::read_array_len(input).map_err(decode_err)?;
        let mut refs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            refs.push(decode_field_blob(&read_bin(input)?)?);
        }
        result.insert(file, refs);
    }
    Ok(result)
}

fn read_method_references<R: Read>(input: &mut R) -> Result<FnvIndexMap<String, Vec<MethodReference>>> {
    let len = decode::read_map_len(input).map_err(decode_err)?;
    let mut result = FnvIndexMap::default();
    for _ in 0..len {
        let file = read_str(input)?;
        if result.contains_key(&file) {
            return Err(Error::Invariant(format!("duplicate file key {:?}", file)));
        }
        let count = decode::read_array_len(input).map_err(decode_err)?;
        let mut refs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            refs.push(decode_method_blob(&read_bin(input)?)?);
        }
        result.insert(file, refs);
    }
    Ok(result)
}

fn read_file_hashes<R: Read>(input: &mut R) -> Result<FnvIndexMap<String, Vec<u8>>> {
    let len = decode::read_map_len(input).map_err(decode_err)?;
    let mut result = FnvIndexMap::default();
    for _ in 0..len {
        let file = read_str(input)?;
        if result.contains_key(&file) {
            return Err(Error::Invariant(format!("duplicate file key {:?}", file)));
        }
        result.insert(file, read_bin(input)?);
    }
    Ok(result)
}

fn owner_and_name(internal_name: &str) -> Result<(String, String)> {
    let idx = internal_name.rfind('/').ok_or_else(|| {
        Error::Invariant(format!("reference name {:?} is missing an owner/member separator", internal_name))
    })?;
    let (owner, rest) = internal_name.split_at(idx);
    let name = &rest[1..];
    let owner_well_formed = !owner.is_empty() && owner.split('/').all(|segment| !segment.is_empty());
    if !owner_well_formed || name.is_empty() || name.contains('/') {
        return Err(Error::Invariant(format!("invalid owner/member name {:?}", internal_name)));
    }
    Ok((owner.to_string(), name.to_string()))
}

fn encode_field_blob(r: &FieldReference) -> Result<Vec<u8>> {
    let mut blob = Vec::new();
    blob.write_i32::<BigEndian>(r.location.start as i32)?;
    blob.write_i32::<BigEndian>(r.location.end as i32)?;
    let combined = format!("{}/{}", r.owner, r.name);
    blob.write_u16::<BigEndian>(combined.len() as u16)?;
    blob.extend_from_slice(combined.as_bytes());
    Ok(blob)
}

fn decode_field_blob(blob: &[u8]) -> Result<FieldReference> {
    let mut cursor = std::io::Cursor::new(blob);
    let start = cursor.read_i32::<BigEndian>()? as u32;
    let end = cursor.read_i32::<BigEndian>()? as u32;
    let len = cursor.read_u16::<BigEndian>()? as usize;
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;
    let combined = String::from_utf8(buf)
        .map_err(|e| Error::Invariant(format!("invalid utf8 in field reference: {}", e)))?;
    let (owner, name) = owner_and_name(&combined)?;
    FieldReference::new(FileLocation::new(start, end)?, owner, name)
}

fn encode_method_blob(r: &MethodReference) -> Result<Vec<u8>> {
    let mut blob = Vec::new();
    blob.write_i32::<BigEndian>(r.location.start as i32)?;
    blob.write_i32::<BigEndian>(r.location.end as i32)?;
    let combined = format!("{}/{}", r.owner, r.name);
    blob.write_u16::<BigEndian>(combined.len() as u16)?;
    blob.extend_from_slice(combined.as_bytes());
    blob.write_u16::<BigEndian>(r.descriptor.len() as u16)?;
    blob.extend_from_slice(r.descriptor.as_bytes());
    Ok(blob)
}

fn decode_method_blob(blob: &[u8]) -> Result<MethodReference> {
    let mut cursor = std::io::Cursor::new(blob);
    let start = cursor.read_i32::<BigEndian>()? as u32;
    let end = cursor.read_i32::<BigEndian>()? as u32;
    let len = cursor.read_u16::<BigEndian>()? as usize;
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;
    let combined = String::from_utf8(buf)
        .map_err(|e| Error::Invariant(format!("invalid utf8 in method reference: {}", e)))?;
    let desc_len = cursor.read_u16::<BigEndian>()? as usize;
    let mut desc_buf = vec![0u8; desc_len];
    cursor.read_exact(&mut desc_buf)?;
    let descriptor = String::from_utf8(desc_buf)
        .map_err(|e| Error::Invariant(format!("invalid utf8 in method descriptor: {}", e)))?;
    let (owner, name) = owner_and_name(&combined)?;
    MethodReference::new(FileLocation::new(start, end)?, owner, name, descriptor)
}

fn write_str<W: Write>(out: &mut W, s: &str) -> Result<()> {
    encode::write_str(out, s).map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))
}
fn read_str<R: Read>(input: &mut R) -> Result<String> {
    let mut buf = [0u8; 4096];
    decode::read_str(input, &mut buf)
        .map(|s| s.to_string())
        .map_err(|e| Error::Invariant(format!("invalid range map string key: {:?}", e)))
}
fn read_bin<R: Read>(input: &mut R) -> Result<Vec<u8>> {
    let len = decode::read_bin_len(input).map_err(decode_err)?;
    let mut buf = vec![0u8; len as usize];
    input.read_exact(&mut buf)?;
    Ok(buf)
}

fn encode_err<E: std::fmt::Display>(e: E) -> Error {
    Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}
fn decode_err(e: ValueReadError) -> Error {
    Error::Invariant(format!("malformed range map: {}", e))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ranges::FileLocation;

    fn sample_map(seed: u32) -> RangeMap {
        let mut fields = FnvIndexMap::default();
        let mut methods = FnvIndexMap::default();
        let mut hashes = FnvIndexMap::default();

        for file_index in 0..(1 + seed % 5) {
            let file = format!("pkg/File{}{}.java", seed, file_index);
            let mut field_refs = Vec::new();
            let mut pos = 0u32;
            for field_index in 0..(1 + (seed + file_index) % 15) {
                let name = format!("f{}", field_index);
                field_refs.push(FieldReference::new(
                    FileLocation::new(pos, pos + name.len() as u32).unwrap(),
                    format!("pkg/Owner{}", seed),
                    name.clone(),
                ).unwrap());
                pos += name.len() as u32 + 4;
            }
            fields.insert(file.clone(), field_refs);

            let mut method_refs = Vec::new();
            for method_index in 0..(1 + (seed + file_index) % 15) {
                let name = format!("m{}", method_index);
                method_refs.push(MethodReference::new(
                    FileLocation::new(pos, pos + name.len() as u32).unwrap(),
                    format!("pkg/Owner{}", seed),
                    name.clone(),
                    "()V".to_string(),
                ).unwrap());
                pos += name.len() as u32 + 4;
            }
            methods.insert(file.clone(), method_refs);
            hashes.insert(file, vec![seed as u8, file_index as u8]);
        }
        RangeMap::new(fields, methods, hashes).unwrap()
    }

    #[test]
    fn round_trips_several_generated_maps() {
        for seed in [1u32, 17, 101] {
            let map = sample_map(seed);
            let mut buf = Vec::new();
            write_range_map(&map, &mut buf).unwrap();
            let decoded = read_range_map(Cursor::new(buf)).unwrap();
            assert_eq!(decoded, map);
        }
    }

    #[test]
    fn rejects_wrong_top_level_key_count() {
        let mut buf = Vec::new();
        encode::write_map_len(&mut buf, 2).unwrap();
        write_str(&mut buf, KEY_FIELD_REFERENCES).unwrap();
        encode::write_map_len(&mut buf, 0).unwrap();
        write_str(&mut buf, KEY_METHOD_REFERENCES).unwrap();
        encode::write_map_len(&mut buf, 0).unwrap();
        let err = read_range_map(Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, Error::Invariant(_)));
    }

    #[test]
    fn rejects_unknown_top_level_key() {
        let mut buf = Vec::new();
        encode::write_map_len(&mut buf, 3).unwrap();
        write_str(&mut buf, KEY_FIELD_REFERENCES).unwrap();
        encode::write_map_len(&mut buf, 0).unwrap();
        write_str(&mut buf, KEY_METHOD_REFERENCES).unwrap();
        encode::write_map_len(&mut buf, 0).unwrap();
        write_str(&mut buf, "bogus").unwrap();
        encode::write_map_len(&mut buf, 0).unwrap();
        let err = read_range_map(Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, Error::Invariant(_)));
    }

    #[test]
    fn owner_and_name_rejects_missing_separator() {
        assert!(owner_and_name("NoSlash").is_err());
    }

    #[test]
    fn owner_and_name_rejects_empty_path_segments() {
        assert!(owner_and_name("a/b//bar").is_err());
        assert!(owner_and_name("/bar").is_err());
        assert!(owner_and_name("a/b/").is_err());
    }

    #[test]
    fn owner_and_name_accepts_nested_package_owner() {
        assert_eq!(owner_and_name("a/b/Foo/bar").unwrap(), ("a/b/Foo".to_string(), "bar".to_string()));
    }
}
