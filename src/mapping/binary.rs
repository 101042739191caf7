//! Reader/writer for the binary mapping file (`.srg.dat`): a short
//! ASCII header naming an optional compression codec, followed by a
//! flat class/method/field table.

use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Error, Result};
use crate::parse::FnvIndexMap;
use super::{ClassMappings, FastMappings};

const MAGIC: &[u8] = b"SuperSrg binary mappings";
const VERSION: u32 = 1;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Codec {
    None,
    Lz4Frame,
    Gzip,
}
impl Codec {
    fn name(self) -> &'static str {
        match self {
            Codec::None => "",
            Codec::Lz4Frame => "lz4-frame",
            Codec::Gzip => "gzip",
        }
    }
    fn parse(name: &str) -> Result<Codec> {
        match name {
            "" => Ok(Codec::None),
            "lz4-frame" => Ok(Codec::Lz4Frame),
            "gzip" => Ok(Codec::Gzip),
            "lzma2" => Err(Error::BinaryMappings("lzma2 compression is reserved, not supported".into())),
            other => Err(Error::BinaryMappings(format!("unknown compression codec {:?}", other))),
        }
    }
}

pub fn write_mappings<W: Write>(mappings: &FastMappings, mut out: W, codec_name: &str) -> Result<()> {
    let codec = Codec::parse(codec_name)?;

    out.write_all(MAGIC)?;
    out.write_u8(0)?;
    out.write_u32::<BigEndian>(VERSION)?;
    out.write_u16::<BigEndian>(codec.name().len() as u16)?;
    out.write_all(codec.name().as_bytes())?;

    let mut body = Vec::new();
    write_body(mappings, &mut body)?;

    match codec {
        Codec::None => out.write_all(&body)?,
        Codec::Lz4Frame => {
            let compressed = lz4_flex::compress_prepend_size(&body);
            out.write_all(&compressed)?;
        }
        Codec::Gzip => {
            let mut encoder = GzEncoder::new(out, Compression::default());
            encoder.write_all(&body)?;
            encoder.finish()?;
        }
    }
    Ok(())
}

pub fn read_mappings<R: Read>(mut input: R) -> Result<FastMappings> {
    let mut magic = vec![0u8; MAGIC.len()];
    input.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(Error::BinaryMappings("bad header magic".into()));
    }
    let zero = input.read_u8()?;
    if zero != 0 {
        return Err(Error::BinaryMappings("missing header terminator".into()));
    }
    let version = input.read_u32::<BigEndian>()?;
    if version != VERSION {
        return Err(Error::BinaryMappings(format!("unsupported version {}", version)));
    }
    let codec_len = input.read_u16::<BigEndian>()? as usize;
    let mut codec_bytes = vec![0u8; codec_len];
    input.read_exact(&mut codec_bytes)?;
    let codec_name = String::from_utf8(codec_bytes)
        .map_err(|_| Error::BinaryMappings("compression codec name is not ascii/utf8".into()))?;
    let codec = Codec::parse(&codec_name)?;

    let mut compressed = Vec::new();
    input.read_to_end(&mut compressed)?;
    let body = match codec {
        Codec::None => compressed,
        Codec::Lz4Frame => lz4_flex::decompress_size_prepended(&compressed)
            .map_err(|e| Error::BinaryMappings(format!("lz4 frame decode failed: {}", e)))?,
        Codec::Gzip => {
            let mut decoder = GzDecoder::new(Cursor::new(compressed));
            let mut buf = Vec::new();
            decoder.read_to_end(&mut buf)
                .map_err(|e| Error::BinaryMappings(format!("gzip decode failed: {}", e)))?;
            buf
        }
    };
    read_body(&mut Cursor::new(body))
}

fn write_body<W: Write>(mappings: &FastMappings, out: &mut W) -> Result<()> {
    out.write_u32::<BigEndian>(mappings.classes().len() as u32)?;
    for class in mappings.classes().values() {
        write_prefixed(out, class.original_name.as_bytes())?;
        write_prefixed(out, class.remapped_name.as_deref().unwrap_or("").as_bytes())?;

        out.write_u32::<BigEndian>(class.method_names.len() as u32)?;
        for ((descriptor, old_name), new_name) in &class.method_names {
            write_prefixed(out, old_name.as_bytes())?;
            write_prefixed(out, new_name.as_bytes())?;
            write_prefixed(out, descriptor.as_bytes())?;
            write_prefixed(out, b"")?; // newDesc, ignored on read
        }

        out.write_u32::<BigEndian>(class.field_names.len() as u32)?;
        for (old_name, new_name) in &class.field_names {
            write_prefixed(out, old_name.as_bytes())?;
            write_prefixed(out, new_name.as_bytes())?;
        }
    }
    Ok(())
}

fn read_body<R: Read>(input: &mut R) -> Result<FastMappings> {
    let class_count = input.read_u32::<BigEndian>()?;
    let mut classes = FnvIndexMap::default();
    for _ in 0..class_count {
        let original_name = read_prefixed_string(input)?;
        let new_name = read_prefixed_string(input)?;
        let mut class = ClassMappings::new(original_name.clone());
        if !new_name.is_empty() {
            class.remapped_name = Some(new_name);
        }

        let method_count = input.read_u32::<BigEndian>()?;
        for _ in 0..method_count {
            let orig_name = read_prefixed_string(input)?;
            let new_name = read_prefixed_string(input)?;
            let orig_desc = read_prefixed_string(input)?;
            let _new_desc_ignored = read_prefixed_string(input)?;
            // Empty newName is a skip marker; the descriptor fields are
            // still consumed above so the reader stays aligned.
            if !new_name.is_empty() {
                class.set_method_name(orig_name, orig_desc, new_name);
            }
        }

        let field_count = input.read_u32::<BigEndian>()?;
        for _ in 0..field_count {
            let orig_name = read_prefixed_string(input)?;
            let new_name = read_prefixed_string(input)?;
            class.set_field_name(orig_name, new_name);
        }

        classes.insert(original_name, class);
    }
    Ok(FastMappings::new(classes))
}

fn write_prefixed<W: Write>(out: &mut W, bytes: &[u8]) -> Result<()> {
    out.write_u16::<BigEndian>(bytes.len() as u16)?;
    out.write_all(bytes)?;
    Ok(())
}

fn read_prefixed_string<R: Read>(input: &mut R) -> Result<String> {
    let len = input.read_u16::<BigEndian>()? as usize;
    let mut buf = vec![0u8; len];
    input.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| Error::BinaryMappings(format!("invalid utf8: {}", e)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_under_each_codec() {
        let mut classes = FnvIndexMap::default();
        let mut foo = ClassMappings::new("Foo".into());
        foo.remapped_name = Some("Qux".into());
        foo.set_field_name("bar".into(), "baz".into());
        foo.set_method_name("a".into(), "()V".into(), "tick".into());
        classes.insert("Foo".into(), foo);
        let mappings = FastMappings::new(classes);

        for codec in ["", "lz4-frame", "gzip"] {
            let mut buf = Vec::new();
            write_mappings(&mappings, &mut buf, codec).unwrap();
            let decoded = read_mappings(Cursor::new(buf)).unwrap();
            assert_eq!(decoded.remap_class_name("Foo"), "Qux");
            assert_eq!(decoded.field_name("Foo", "bar"), Some("baz"));
            assert_eq!(decoded.method_name("Foo", "a", "()V"), Some("tick"));
        }
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = b"SuperSrg binary mappingZ".to_vec(); // last byte mistyped
        buf.push(0);
        buf.extend_from_slice(&1u32.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        let err = read_mappings(Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, Error::BinaryMappings(_)));
    }

    #[test]
    fn rejects_reserved_lzma2_codec() {
        assert!(Codec::parse("lzma2").is_err());
    }
}
