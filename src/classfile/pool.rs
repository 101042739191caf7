//! Parses a class-file buffer's constant pool into tag+offset tables,
//! without eagerly decoding strings or symbolic references.

use std::cell::RefCell;
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{Error, Result};
use super::{MAGIC, MAX_SUPPORTED_MAJOR_VERSION};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Tag {
    Reserved = 0,
    Utf8 = 1,
    Integer = 3,
    Float = 4,
    Long = 5,
    Double = 6,
    ClassRef = 7,
    StringRef = 8,
    FieldRef = 9,
    MethodRef = 10,
    InterfaceMethodRef = 11,
    NameAndType = 12,
    MethodHandle = 15,
    MethodType = 16,
    InvokeDynamic = 18,
}
impl Tag {
    fn from_byte(byte: u8) -> Result<Tag> {
        Ok(match byte {
            0 => Tag::Reserved,
            1 => Tag::Utf8,
            3 => Tag::Integer,
            4 => Tag::Float,
            5 => Tag::Long,
            6 => Tag::Double,
            7 => Tag::ClassRef,
            8 => Tag::StringRef,
            9 => Tag::FieldRef,
            10 => Tag::MethodRef,
            11 => Tag::InterfaceMethodRef,
            12 => Tag::NameAndType,
            15 => Tag::MethodHandle,
            16 => Tag::MethodType,
            18 => Tag::InvokeDynamic,
            other => return Err(Error::UnsupportedTag(other)),
        })
    }
}

/// A parsed constant pool: parallel `tags`/`offsets` tables indexed
/// 0-based (the class-file format indexes from 1), plus the byte range
/// the pool occupied in the source buffer.
pub struct ConstantPoolDecoder {
    buffer: Vec<u8>,
    tags: Vec<Tag>,
    offsets: Vec<u32>,
    pub version: u16,
    pub start: usize,
    pub end: usize,
    utf8_cache: RefCell<Vec<Option<std::rc::Rc<str>>>>,
}
impl ConstantPoolDecoder {
    pub fn parse(buffer: &[u8]) -> Result<ConstantPoolDecoder> {
        let mut cursor = Cursor::new(buffer);
        let magic = cursor.read_u32::<BigEndian>().map_err(eof)?;
        if magic != MAGIC {
            return Err(Error::ConstantPoolDecode(format!("bad magic {:#x}", magic)));
        }
        let _minor = cursor.read_u16::<BigEndian>().map_err(eof)?;
        let version = cursor.read_u16::<BigEndian>().map_err(eof)?;
        if version > MAX_SUPPORTED_MAJOR_VERSION {
            return Err(Error::ConstantPoolDecode(format!(
                "class file major version {} exceeds supported maximum {}",
                version, MAX_SUPPORTED_MAJOR_VERSION
            )));
        }
        let count = cursor.read_u16::<BigEndian>().map_err(eof)?;
        if count < 1 {
            return Err(Error::ConstantPoolDecode("constant pool count must be at least 1".into()));
        }
        let size = (count - 1) as usize;

        let mut tags = Vec::with_capacity(size);
        let mut offsets = Vec::with_capacity(size);
        let mut i = 0usize;
        while i < size {
            let tag_byte = cursor.read_u8().map_err(eof)?;
            let tag = Tag::from_byte(tag_byte)?;
            let offset = cursor.position() as u32;
            tags.push(tag);
            offsets.push(offset);
            match tag {
                Tag::Utf8 => {
                    let len = cursor.read_u16::<BigEndian>().map_err(eof)?;
                    skip(&mut cursor, len as u64)?;
                }
                Tag::Integer | Tag::Float | Tag::FieldRef | Tag::MethodRef
                | Tag::InterfaceMethodRef | Tag::NameAndType | Tag::InvokeDynamic => {
                    skip(&mut cursor, 4)?;
                }
                Tag::Long | Tag::Double => {
                    skip(&mut cursor, 8)?;
                    // the following slot is reserved and not separately addressable
                    tags.push(Tag::Reserved);
                    offsets.push(offset);
                    i += 1;
                }
                Tag::ClassRef | Tag::StringRef | Tag::MethodType => {
                    skip(&mut cursor, 2)?;
                }
                Tag::MethodHandle => {
                    skip(&mut cursor, 3)?;
                }
                Tag::Reserved => unreachable!("reserved tag is never read from the buffer"),
            }
            i += 1;
        }

        let end = cursor.position() as usize;
        let cache_len = tags.len();
        Ok(ConstantPoolDecoder {
            buffer: buffer.to_vec(),
            tags,
            offsets,
            version,
            start: 0,
            end,
            utf8_cache: RefCell::new(vec![None; cache_len]),
        })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.tags.len()
    }

    #[inline]
    pub fn byte_size(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn tag(&self, index: usize) -> Tag {
        self.tags[index]
    }

    #[inline]
    pub fn offset(&self, index: usize) -> u32 {
        self.offsets[index]
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// The modified-UTF8 string at slot `index`, decoded and cached.
    pub fn utf8(&self, index: usize) -> Result<std::rc::Rc<str>> {
        if self.tags[index] != Tag::Utf8 {
            return Err(Error::Invariant(format!("slot {} is not a UTF8 constant", index)));
        }
        if let Some(cached) = self.utf8_cache.borrow()[index].clone() {
            return Ok(cached);
        }
        let offset = self.offsets[index] as usize;
        let len = u16::from_be_bytes([self.buffer[offset], self.buffer[offset + 1]]) as usize;
        let bytes = &self.buffer[offset + 2..offset + 2 + len];
        let decoded: std::rc::Rc<str> = cesu8::from_java_cesu8(bytes)
            .map_err(|e| Error::ConstantPoolDecode(format!("invalid modified utf8 at slot {}: {}", index, e)))?
            .into_owned()
            .into();
        self.utf8_cache.borrow_mut()[index] = Some(decoded.clone());
        Ok(decoded)
    }

    /// Packs a `NameAndType` slot's two big-endian `u16` fields into one
    /// `u32`: low half is the name index, high half is the descriptor index.
    pub fn name_and_type(&self, index: usize) -> Result<u32> {
        if self.tags[index] != Tag::NameAndType {
            return Err(Error::Invariant(format!("slot {} is not a NameAndType constant", index)));
        }
        let offset = self.offsets[index] as usize;
        let name_index = u16::from_be_bytes([self.buffer[offset], self.buffer[offset + 1]]);
        let descriptor_index = u16::from_be_bytes([self.buffer[offset + 2], self.buffer[offset + 3]]);
        Ok((name_index as u32) | ((descriptor_index as u32) << 16))
    }

    /// The `ClassRef`'s pointed-at UTF8 slot index (1-based, class-file convention).
    pub fn class_ref_name_index(&self, index: usize) -> Result<u16> {
        if self.tags[index] != Tag::ClassRef {
            return Err(Error::Invariant(format!("slot {} is not a ClassRef constant", index)));
        }
        let offset = self.offsets[index] as usize;
        Ok(u16::from_be_bytes([self.buffer[offset], self.buffer[offset + 1]]))
    }

    /// A `FieldRef`/`MethodRef`/`InterfaceMethodRef`'s `(class_index, name_and_type_index)` pair.
    pub fn ref_indices(&self, index: usize) -> Result<(u16, u16)> {
        let offset = self.offsets[index] as usize;
        let class_index = u16::from_be_bytes([self.buffer[offset], self.buffer[offset + 1]]);
        let nat_index = u16::from_be_bytes([self.buffer[offset + 2], self.buffer[offset + 3]]);
        Ok((class_index, nat_index))
    }
}

fn skip(cursor: &mut Cursor<&[u8]>, amount: u64) -> Result<()> {
    let new_pos = cursor.position() + amount;
    if new_pos > cursor.get_ref().len() as u64 {
        return Err(Error::ConstantPoolDecode("read past end of buffer".into()));
    }
    cursor.set_position(new_pos);
    Ok(())
}

fn eof(e: std::io::Error) -> Error {
    Error::ConstantPoolDecode(format!("unexpected end of buffer: {}", e))
}
