//! Rewrites one file's bytes against a sorted reference list: copy
//! everything outside a recorded span verbatim, replace the span's
//! bytes with the mapped name if one exists.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::mapping::FastMappings;
use crate::ranges::MemberReference;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Apply `references` (must be pre-sorted by `FileLocation`) to `input`,
/// writing the rewritten bytes to `output`. `file` identifies the file in
/// diagnostics; it plays no role in the rewrite itself.
pub fn apply_references<R: Read, W: Write>(
    file: &str,
    mut input: R,
    mut output: W,
    references: &[MemberReference],
    mappings: &FastMappings,
) -> Result<()> {
    let mut pos: u64 = 0;
    let mut prior: Option<&MemberReference> = None;

    for reference in references {
        let location = reference.location();
        if pos > location.start as u64 {
            let prior_desc = prior.map(|p| p.location().to_string()).unwrap_or_default();
            return Err(Error::OverlappingReferences {
                file: file.to_string(),
                first: prior_desc,
                second: location.to_string(),
            });
        }

        copy_exact(&mut input, &mut output, location.start as u64 - pos, pos)?;
        pos = location.start as u64;

        let mut name_buf = vec![0u8; location.size() as usize];
        read_fully(&mut input, &mut name_buf, pos)?;
        let actual = String::from_utf8(name_buf)
            .map_err(|_| Error::IdentifierMismatch {
                offset: pos,
                expected: reference.name().to_string(),
                actual: "<invalid utf8>".to_string(),
            })?;
        if actual != reference.name() {
            return Err(Error::IdentifierMismatch {
                offset: pos,
                expected: reference.name().to_string(),
                actual,
            });
        }

        let new_name = lookup_new_name(mappings, reference);
        output.write_all(new_name.as_bytes())?;

        pos += location.size() as u64;
        prior = Some(reference);
    }

    std::io::copy(&mut input, &mut output)?;
    Ok(())
}

fn lookup_new_name<'a>(mappings: &'a FastMappings, reference: &'a MemberReference) -> std::borrow::Cow<'a, str> {
    let found = match reference {
        MemberReference::Field(f) => mappings.field_name(&f.owner, &f.name),
        MemberReference::Method(m) => mappings.method_name(&m.owner, &m.name, &m.descriptor),
    };
    match found {
        Some(new_name) => std::borrow::Cow::Borrowed(new_name),
        None => std::borrow::Cow::Borrowed(reference.name()),
    }
}

fn copy_exact<R: Read, W: Write>(input: &mut R, output: &mut W, amount: u64, offset: u64) -> Result<()> {
    let mut remaining = amount;
    let mut buf = [0u8; COPY_BUFFER_SIZE];
    let mut at = offset;
    while remaining > 0 {
        let chunk = remaining.min(buf.len() as u64) as usize;
        let num_read = input.read(&mut buf[..chunk])?;
        if num_read == 0 {
            return Err(Error::UnexpectedEof { offset: at });
        }
        output.write_all(&buf[..num_read])?;
        remaining -= num_read as u64;
        at += num_read as u64;
    }
    Ok(())
}

/// Reads exactly `buf.len()` bytes, advancing by the actual bytes read
/// on each iteration rather than a fixed per-iteration amount.
fn read_fully<R: Read>(input: &mut R, buf: &mut [u8], offset: u64) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let num_read = input.read(&mut buf[filled..])?;
        if num_read == 0 {
            return Err(Error::UnexpectedEof { offset: offset + filled as u64 });
        }
        filled += num_read;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mapping::ClassMappings;
    use crate::parse::FnvIndexMap;
    use crate::ranges::{FieldReference, FileLocation};

    fn mappings_with_field_rename(owner: &str, old: &str, new: &str) -> FastMappings {
        let mut classes = FnvIndexMap::default();
        let mut class = ClassMappings::new(owner.into());
        class.set_field_name(old.into(), new.into());
        classes.insert(owner.into(), class);
        FastMappings::new(classes)
    }

    #[test]
    fn scenario_s1_renames_field_reference() {
        let input = b"class Foo { int bar; }\n";
        let reference = MemberReference::Field(FieldReference::new(
            FileLocation::new(16, 19).unwrap(), "Foo".into(), "bar".into(),
        ).unwrap());
        let mappings = mappings_with_field_rename("Foo", "bar", "baz");
        let mut output = Vec::new();
        apply_references("Foo.java", &input[..], &mut output, &[reference], &mappings).unwrap();
        assert_eq!(output, b"class Foo { int baz; }\n");
    }

    #[test]
    fn scenario_s2_identity_mapping_is_byte_exact() {
        let input = b"class Foo { int bar; }\n";
        let reference = MemberReference::Field(FieldReference::new(
            FileLocation::new(16, 19).unwrap(), "Foo".into(), "bar".into(),
        ).unwrap());
        let mappings = FastMappings::empty();
        let mut output = Vec::new();
        apply_references("Foo.java", &input[..], &mut output, &[reference], &mappings).unwrap();
        assert_eq!(output, &input[..]);
    }

    #[test]
    fn scenario_s3_mismatch_reports_offset_and_names() {
        let input = b"bar...";
        let reference = MemberReference::Field(FieldReference::new(
            FileLocation::new(0, 3).unwrap(), "Foo".into(), "foo".into(),
        ).unwrap());
        let mappings = FastMappings::empty();
        let mut output = Vec::new();
        let err = apply_references("Foo.java", &input[..], &mut output, &[reference], &mappings).unwrap_err();
        match err {
            Error::IdentifierMismatch { offset, expected, actual } => {
                assert_eq!(offset, 0);
                assert_eq!(expected, "foo");
                assert_eq!(actual, "bar");
            }
            other => panic!("expected IdentifierMismatch, got {:?}", other),
        }
    }

    #[test]
    fn scenario_s4_overlapping_references_fail() {
        let input = b"0123456789abcxy";
        let first = MemberReference::Field(FieldReference::new(
            FileLocation::new(10, 13).unwrap(), "Foo".into(), "abc".into(),
        ).unwrap());
        let second = MemberReference::Field(FieldReference::new(
            FileLocation::new(12, 15).unwrap(), "Foo".into(), "xyz".into(),
        ).unwrap());
        let mappings = FastMappings::empty();
        let mut output = Vec::new();
        let err = apply_references("Foo.java", &input[..], &mut output, &[first, second], &mappings).unwrap_err();
        match err {
            Error::OverlappingReferences { file, .. } => assert_eq!(file, "Foo.java"),
            other => panic!("expected OverlappingReferences, got {:?}", other),
        }
    }
}
