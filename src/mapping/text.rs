//! Developer-facing compatibility layer: build a `FastMappings` from the
//! same compact, human-readable lines the retained `format` module
//! parses into the legacy `Mappings` trait. Never read by the
//! `apply`/`remap-jar` pipelines themselves; `.srg.dat` is canonical there.
//!
//! Line shapes, disambiguated by whitespace-separated token count:
//! - `owner newOwner` (2 tokens) — class rename
//! - `owner oldField newField` (3 tokens) — field rename
//! - `owner oldMethod descriptor newMethod` (4 tokens) — method rename

use crate::error::{Error, Result};
use crate::parse::FnvIndexMap;
use super::{ClassMappings, FastMappings};

pub fn parse_compact_lines<'a, I: IntoIterator<Item = &'a str>>(lines: I) -> Result<FastMappings> {
    let mut classes: FnvIndexMap<String, ClassMappings> = FnvIndexMap::default();
    for (line_number, line) in lines.into_iter().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [owner, new_owner] => {
                classes.entry(owner.to_string())
                    .or_insert_with(|| ClassMappings::new(owner.to_string()))
                    .remapped_name = Some(new_owner.to_string());
            }
            [owner, old_field, new_field] => {
                classes.entry(owner.to_string())
                    .or_insert_with(|| ClassMappings::new(owner.to_string()))
                    .set_field_name(old_field.to_string(), new_field.to_string());
            }
            [owner, old_method, descriptor, new_method] => {
                classes.entry(owner.to_string())
                    .or_insert_with(|| ClassMappings::new(owner.to_string()))
                    .set_method_name(old_method.to_string(), descriptor.to_string(), new_method.to_string());
            }
            _ => {
                return Err(Error::Command(format!(
                    "line {}: expected 2, 3 or 4 whitespace-separated tokens, got {:?}",
                    line_number + 1, line
                )));
            }
        }
    }
    Ok(FastMappings::new(classes))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_class_field_and_method_lines() {
        let mappings = parse_compact_lines([
            "Foo Qux",
            "Foo bar baz",
            "Foo a ()V tick",
        ]).unwrap();
        assert_eq!(mappings.remap_class_name("Foo"), "Qux");
        assert_eq!(mappings.field_name("Foo", "bar"), Some("baz"));
        assert_eq!(mappings.method_name("Foo", "a", "()V"), Some("tick"));
    }
}
