//! Emits a remapped constant pool: new UTF8 and `NameAndType` entries
//! are appended after the original slots rather than rewritten in
//! place, since a `NameAndType`'s correct remapping depends on which
//! `FieldRef`/`MethodRef` uses it.

use byteorder::{BigEndian, WriteBytesExt};

use crate::error::{Error, Result};
use crate::mapping::FastMappings;
use crate::parse::FnvIndexMap;
use super::pool::{ConstantPoolDecoder, Tag};
use super::MAGIC;

pub struct ConstantPoolRemapper;
impl ConstantPoolRemapper {
    /// Rewrites `decoder`'s source buffer against `mappings`, returning
    /// the full class file bytes (header, remapped pool, appended
    /// constants, and the post-pool tail copied verbatim).
    pub fn remap(decoder: &ConstantPoolDecoder, mappings: &FastMappings) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(decoder.buffer().len() + 256);
        out.write_u32::<BigEndian>(MAGIC)?;
        out.write_u16::<BigEndian>(0)?; // minor version
        out.write_u16::<BigEndian>(decoder.version)?;
        let count_patch_at = out.len();
        out.write_u16::<BigEndian>(0)?; // patched below

        let orig_count = decoder.size() as u32 + 1;
        let mut builder = PoolBuilder::new(orig_count);

        let mut i = 0usize;
        while i < decoder.size() {
            match decoder.tag(i) {
                Tag::Reserved => {}
                Tag::Utf8 => {
                    let offset = decoder.offset(i) as usize;
                    let len = u16::from_be_bytes([decoder.buffer()[offset], decoder.buffer()[offset + 1]]) as usize;
                    out.push(Tag::Utf8 as u8);
                    out.extend_from_slice(&decoder.buffer()[offset..offset + 2 + len]);
                }
                tag @ (Tag::Long | Tag::Double) => {
                    let offset = decoder.offset(i) as usize;
                    out.push(tag as u8);
                    out.extend_from_slice(&decoder.buffer()[offset..offset + 8]);
                }
                Tag::Integer | Tag::Float | Tag::StringRef | Tag::NameAndType
                | Tag::MethodHandle | Tag::InvokeDynamic => {
                    copy_verbatim(decoder, i, &mut out);
                }
                Tag::ClassRef => emit_class_ref(decoder, mappings, i, &mut builder, &mut out)?,
                Tag::FieldRef => emit_member_ref(decoder, mappings, i, Tag::FieldRef, &mut builder, &mut out)?,
                Tag::MethodRef => emit_member_ref(decoder, mappings, i, Tag::MethodRef, &mut builder, &mut out)?,
                Tag::InterfaceMethodRef => emit_member_ref(decoder, mappings, i, Tag::InterfaceMethodRef, &mut builder, &mut out)?,
                Tag::MethodType => emit_method_type(decoder, mappings, i, &mut builder, &mut out)?,
            }
            i += 1;
        }

        let new_count = orig_count + builder.appended_count;
        (&mut out[count_patch_at..count_patch_at + 2]).write_u16::<BigEndian>(new_count as u16)?;
        out.extend_from_slice(&builder.appended_bytes);
        out.extend_from_slice(&decoder.buffer()[decoder.end..]);
        Ok(out)
    }
}

fn copy_verbatim(decoder: &ConstantPoolDecoder, index: usize, out: &mut Vec<u8>) {
    let tag = decoder.tag(index);
    let offset = decoder.offset(index) as usize;
    let payload_len = match tag {
        Tag::Integer | Tag::Float | Tag::FieldRef | Tag::MethodRef
        | Tag::InterfaceMethodRef | Tag::NameAndType | Tag::InvokeDynamic => 4,
        Tag::ClassRef | Tag::StringRef | Tag::MethodType => 2,
        Tag::MethodHandle => 3,
        _ => unreachable!("copy_verbatim called for variable-length or reserved tag"),
    };
    out.push(tag as u8);
    out.extend_from_slice(&decoder.buffer()[offset..offset + payload_len]);
}

fn resolve_class_name(decoder: &ConstantPoolDecoder, class_ref_slot_1based: u16) -> Result<std::rc::Rc<str>> {
    let name_index = decoder.class_ref_name_index(class_ref_slot_1based as usize - 1)?;
    decoder.utf8(name_index as usize - 1)
}

fn emit_class_ref(
    decoder: &ConstantPoolDecoder,
    mappings: &FastMappings,
    index: usize,
    builder: &mut PoolBuilder,
    out: &mut Vec<u8>,
) -> Result<()> {
    let name_index = decoder.class_ref_name_index(index)?;
    let class_name = decoder.utf8(name_index as usize - 1)?;
    match mappings.remapped_class_name(&class_name) {
        Some(new_name) => {
            if new_name.is_empty() {
                return Err(Error::InvalidMappings(format!("class {:?} has an empty remapped name", class_name)));
            }
            let new_utf8_index = builder.intern_utf8(new_name);
            out.push(Tag::ClassRef as u8);
            out.write_u16::<BigEndian>(new_utf8_index)?;
        }
        None => copy_verbatim(decoder, index, out),
    }
    Ok(())
}

fn emit_member_ref(
    decoder: &ConstantPoolDecoder,
    mappings: &FastMappings,
    index: usize,
    tag: Tag,
    builder: &mut PoolBuilder,
    out: &mut Vec<u8>,
) -> Result<()> {
    let (class_index, nat_index) = decoder.ref_indices(index)?;
    let class_name = resolve_class_name(decoder, class_index)?;
    let class_mappings = mappings.class_mappings(&class_name);

    let packed = decoder.name_and_type(nat_index as usize - 1)?;
    let name_index = (packed & 0xFFFF) as u16;
    let descriptor_index = (packed >> 16) as u16;
    let old_name = decoder.utf8(name_index as usize - 1)?;
    let old_descriptor = decoder.utf8(descriptor_index as usize - 1)?;

    let (new_name, new_descriptor) = match class_mappings {
        Some(cm) => {
            let new_name = match tag {
                Tag::FieldRef => cm.field_name(&old_name),
                _ => cm.method_name(&old_name, &old_descriptor),
            };
            let new_descriptor = if tag == Tag::FieldRef {
                mappings.remap_type_descriptor(&old_descriptor)?
            } else {
                mappings.remap_method_descriptor(&old_descriptor)?
            };
            (new_name.map(str::to_string), new_descriptor.into_owned())
        }
        None => (None, old_descriptor.to_string()),
    };

    let descriptor_changed = new_descriptor != old_descriptor.as_ref();
    let changed = new_name.is_some() || descriptor_changed;
    if changed {
        let name_utf8 = match &new_name {
            Some(final_name) => builder.intern_utf8(final_name),
            None => name_index,
        };
        let descriptor_utf8 = if descriptor_changed {
            builder.intern_utf8(&new_descriptor)
        } else {
            descriptor_index
        };
        let new_nat_index = builder.intern_name_and_type(name_utf8, descriptor_utf8);
        out.push(tag as u8);
        out.write_u16::<BigEndian>(class_index)?;
        out.write_u16::<BigEndian>(new_nat_index)?;
    } else {
        copy_verbatim(decoder, index, out);
    }
    Ok(())
}

fn emit_method_type(
    decoder: &ConstantPoolDecoder,
    mappings: &FastMappings,
    index: usize,
    builder: &mut PoolBuilder,
    out: &mut Vec<u8>,
) -> Result<()> {
    let offset = decoder.offset(index) as usize;
    let descriptor_index = u16::from_be_bytes([decoder.buffer()[offset], decoder.buffer()[offset + 1]]);
    let descriptor = decoder.utf8(descriptor_index as usize - 1)?;
    let new_descriptor = mappings.remap_method_descriptor(&descriptor)?;
    if new_descriptor.as_ref() != descriptor.as_ref() {
        let new_index = builder.intern_utf8(&new_descriptor);
        out.push(Tag::MethodType as u8);
        out.write_u16::<BigEndian>(new_index)?;
    } else {
        copy_verbatim(decoder, index, out);
    }
    Ok(())
}

/// Tracks the append-only buffer of new UTF8/`NameAndType` entries and
/// dedupes repeat interns within a single remap run.
struct PoolBuilder {
    orig_count: u32,
    appended_count: u32,
    appended_bytes: Vec<u8>,
    utf8_interned: FnvIndexMap<String, u16>,
    nat_interned: FnvIndexMap<(u16, u16), u16>,
}
impl PoolBuilder {
    fn new(orig_count: u32) -> PoolBuilder {
        PoolBuilder {
            orig_count,
            appended_count: 0,
            appended_bytes: Vec::new(),
            utf8_interned: FnvIndexMap::default(),
            nat_interned: FnvIndexMap::default(),
        }
    }

    fn next_index(&self) -> u16 {
        (self.orig_count + self.appended_count) as u16
    }

    fn intern_utf8(&mut self, text: &str) -> u16 {
        if let Some(&index) = self.utf8_interned.get(text) {
            return index;
        }
        let index = self.next_index();
        self.appended_bytes.push(Tag::Utf8 as u8);
        self.appended_bytes.extend_from_slice(&(text.len() as u16).to_be_bytes());
        self.appended_bytes.extend_from_slice(text.as_bytes());
        self.appended_count += 1;
        self.utf8_interned.insert(text.to_string(), index);
        index
    }

    fn intern_name_and_type(&mut self, name_index: u16, descriptor_index: u16) -> u16 {
        if let Some(&index) = self.nat_interned.get(&(name_index, descriptor_index)) {
            return index;
        }
        let index = self.next_index();
        self.appended_bytes.push(Tag::NameAndType as u8);
        self.appended_bytes.extend_from_slice(&name_index.to_be_bytes());
        self.appended_bytes.extend_from_slice(&descriptor_index.to_be_bytes());
        self.appended_count += 1;
        self.nat_interned.insert((name_index, descriptor_index), index);
        index
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mapping::ClassMappings;

    fn build_class_file(constants: &[(u8, Vec<u8>)]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&52u16.to_be_bytes());
        buf.extend_from_slice(&((constants.len() + 1) as u16).to_be_bytes());
        for (tag, payload) in constants {
            buf.push(*tag);
            buf.extend_from_slice(payload);
        }
        // trailing bytes representing access_flags etc, copied through untouched
        buf.extend_from_slice(&[0xAB, 0xCD, 0xEF]);
        buf
    }

    fn utf8(s: &str) -> (u8, Vec<u8>) {
        let mut payload = (s.len() as u16).to_be_bytes().to_vec();
        payload.extend_from_slice(s.as_bytes());
        (Tag::Utf8 as u8, payload)
    }

    #[test]
    fn scenario_s5_field_ref_remap_appends_expected_entries() {
        // slot1 = Utf8 "Foo", slot2 = ClassRef->slot1, slot3 = Utf8 "bar",
        // slot4 = Utf8 "I", slot5 = NameAndType(3,4), slot6 = FieldRef(2,5)
        let constants = vec![
            utf8("Foo"),
            (Tag::ClassRef as u8, 1u16.to_be_bytes().to_vec()),
            utf8("bar"),
            utf8("I"),
            (Tag::NameAndType as u8, [3u16.to_be_bytes(), 4u16.to_be_bytes()].concat()),
            (Tag::FieldRef as u8, [2u16.to_be_bytes(), 5u16.to_be_bytes()].concat()),
        ];
        let buffer = build_class_file(&constants);
        let decoder = ConstantPoolDecoder::parse(&buffer).unwrap();

        let mut classes = FnvIndexMap::default();
        let mut foo = ClassMappings::new("Foo".into());
        foo.remapped_name = Some("Qux".into());
        foo.set_field_name("bar".into(), "baz".into());
        classes.insert("Foo".into(), foo);
        let mappings = FastMappings::new(classes);

        let output = ConstantPoolRemapper::remap(&decoder, &mappings).unwrap();
        // trailing bytes after the pool are bit-identical
        assert_eq!(&output[output.len() - 3..], &[0xAB, 0xCD, 0xEF]);

        let new_decoder = ConstantPoolDecoder::parse(&output).unwrap();
        assert_eq!(new_decoder.size(), decoder.size() + 3);
        let utf8_strings: Vec<String> = (0..new_decoder.size())
            .filter(|&i| new_decoder.tag(i) == Tag::Utf8)
            .map(|i| new_decoder.utf8(i).unwrap().to_string())
            .collect();
        assert!(utf8_strings.contains(&"baz".to_string()));
        assert!(utf8_strings.contains(&"Qux".to_string()));
    }

    #[test]
    fn identity_mapping_round_trips_byte_identical() {
        let constants = vec![
            utf8("Foo"),
            (Tag::ClassRef as u8, 1u16.to_be_bytes().to_vec()),
        ];
        let buffer = build_class_file(&constants);
        let decoder = ConstantPoolDecoder::parse(&buffer).unwrap();
        let output = ConstantPoolRemapper::remap(&decoder, &FastMappings::empty()).unwrap();
        assert_eq!(output, buffer);
    }
}
