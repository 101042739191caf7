//! The shared mapping lookup both remap pipelines use: a per-class
//! dictionary of field/method renames plus a cached, total rewriter for
//! JVM type and method descriptors.

pub mod binary;
pub mod cache;
pub mod text;

use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::parse::FnvIndexMap;
use crate::types::{JavaType, ReferenceType, TypeDescriptor};
use crate::descriptor::MethodSignature;
use cache::BoundedCache;

const TYPE_CACHE_CAPACITY: usize = 10_000;
const METHOD_CACHE_CAPACITY: usize = 100_000;

/// One class's renames: its own new internal name (if any), its field
/// simple-name renames, and its method renames keyed by
/// `(descriptor, old simple name)`.
#[derive(Clone, Debug, Default)]
pub struct ClassMappings {
    pub original_name: String,
    pub remapped_name: Option<String>,
    pub field_names: FnvIndexMap<String, String>,
    pub method_names: FnvIndexMap<(String, String), String>,
}
impl ClassMappings {
    pub fn new(original_name: String) -> ClassMappings {
        ClassMappings { original_name, ..Default::default() }
    }

    pub fn field_name(&self, old_name: &str) -> Option<&str> {
        self.field_names.get(old_name).map(String::as_str)
    }

    pub fn method_name(&self, old_name: &str, descriptor: &str) -> Option<&str> {
        self.method_names.get(&(descriptor.to_string(), old_name.to_string())).map(String::as_str)
    }

    pub fn set_field_name(&mut self, old_name: String, new_name: String) {
        self.field_names.insert(old_name, new_name);
    }

    pub fn set_method_name(&mut self, old_name: String, descriptor: String, new_name: String) {
        self.method_names.insert((descriptor, old_name), new_name);
    }
}

/// Class→renames dictionary plus bounded, concurrency-safe descriptor
/// rewrite caches. Shared read-mostly across all remap workers.
pub struct FastMappings {
    classes: FnvIndexMap<String, ClassMappings>,
    descriptor_type_cache: BoundedCache<String>,
    descriptor_method_cache: BoundedCache<String>,
}
impl FastMappings {
    pub fn new(classes: FnvIndexMap<String, ClassMappings>) -> FastMappings {
        FastMappings {
            classes,
            descriptor_type_cache: BoundedCache::new(TYPE_CACHE_CAPACITY),
            descriptor_method_cache: BoundedCache::new(METHOD_CACHE_CAPACITY),
        }
    }

    pub fn empty() -> FastMappings {
        FastMappings::new(FnvIndexMap::default())
    }

    pub fn class_mappings(&self, internal_name: &str) -> Option<&ClassMappings> {
        self.classes.get(internal_name)
    }

    pub fn field_name(&self, owner: &str, old_name: &str) -> Option<&str> {
        self.class_mappings(owner)?.field_name(old_name)
    }

    pub fn method_name(&self, owner: &str, old_name: &str, descriptor: &str) -> Option<&str> {
        self.class_mappings(owner)?.method_name(old_name, descriptor)
    }

    pub fn remapped_class_name(&self, internal_name: &str) -> Option<&str> {
        self.class_mappings(internal_name)?.remapped_name.as_deref()
    }

    /// The new internal name for `internal_name`, or the name unchanged.
    pub fn remap_class_name<'a>(&'a self, internal_name: &'a str) -> Cow<'a, str> {
        match self.remapped_class_name(internal_name) {
            Some(new_name) => Cow::Borrowed(new_name),
            None => Cow::Borrowed(internal_name),
        }
    }

    fn remap_reference(&self, reference: &ReferenceType) -> Option<ReferenceType> {
        self.remapped_class_name(reference.internal_name())
            .map(ReferenceType::from_internal_name)
    }

    /// Rewrite a JVM type descriptor (`Lpkg/Cls;`, `[I`, `B`, ...),
    /// replacing only class names with a `remappedName`. Memoised; a
    /// cache miss just recomputes, so correctness never depends on it.
    pub fn remap_type_descriptor(&self, descriptor: &str) -> Result<Cow<'static, str>> {
        if let Some(cached) = self.descriptor_type_cache.get(descriptor) {
            return Ok(Cow::Owned(cached));
        }
        let parsed = TypeDescriptor::parse_descriptor(descriptor).ok_or_else(|| {
            Error::Invariant(format!("malformed type descriptor {:?}", descriptor))
        })?;
        let rewritten = match parsed.maybe_map_class(|r| self.remap_reference(r)) {
            Some(new_type) => new_type.descriptor().to_string(),
            None => descriptor.to_string(),
        };
        self.descriptor_type_cache.insert(descriptor.to_string(), rewritten.clone());
        Ok(Cow::Owned(rewritten))
    }

    /// Rewrite a JVM method descriptor (`(params)return`), same rules
    /// as `remap_type_descriptor` applied to each parameter and the
    /// return type.
    pub fn remap_method_descriptor(&self, descriptor: &str) -> Result<Cow<'static, str>> {
        if let Some(cached) = self.descriptor_method_cache.get(descriptor) {
            return Ok(Cow::Owned(cached));
        }
        let parsed = MethodSignature::parse_text(descriptor).map_err(|_| {
            Error::Invariant(format!("malformed method descriptor {:?}", descriptor))
        })?;
        let rewritten = parsed.map_class(|r| self.remap_reference(r));
        let result = rewritten.descriptor().to_string();
        self.descriptor_method_cache.insert(descriptor.to_string(), result.clone());
        Ok(Cow::Owned(result))
    }

    pub fn classes(&self) -> &FnvIndexMap<String, ClassMappings> {
        &self.classes
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> FastMappings {
        let mut classes = FnvIndexMap::default();
        let mut foo = ClassMappings::new("Foo".into());
        foo.remapped_name = Some("Qux".into());
        foo.set_field_name("bar".into(), "baz".into());
        classes.insert("Foo".into(), foo);
        FastMappings::new(classes)
    }

    #[test]
    fn remaps_field_and_class_name() {
        let mappings = sample();
        assert_eq!(mappings.field_name("Foo", "bar"), Some("baz"));
        assert_eq!(mappings.remap_class_name("Foo"), "Qux");
        assert_eq!(mappings.remap_class_name("Other"), "Other");
    }

    #[test]
    fn remaps_type_descriptor_class_names_only() {
        let mappings = sample();
        assert_eq!(mappings.remap_type_descriptor("LFoo;").unwrap(), "LQux;");
        assert_eq!(mappings.remap_type_descriptor("[LFoo;").unwrap(), "[LQux;");
        assert_eq!(mappings.remap_type_descriptor("I").unwrap(), "I");
        assert_eq!(mappings.remap_type_descriptor("LOther;").unwrap(), "LOther;");
    }

    #[test]
    fn remaps_method_descriptor() {
        let mappings = sample();
        assert_eq!(
            mappings.remap_method_descriptor("(LFoo;I)LFoo;").unwrap(),
            "(LQux;I)LQux;"
        );
    }
}
