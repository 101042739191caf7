//! The range-map data model: byte-offset spans of renameable
//! identifiers across a source tree, plus the per-file content hashes
//! used to skip unchanged files on incremental extraction.

pub mod codec;

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use indexmap::IndexSet;

use crate::error::{Error, Result};
use crate::parse::FnvIndexMap;

/// A half-open byte interval `[start, end)` in a source file.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FileLocation {
    pub start: u32,
    pub end: u32,
}
impl FileLocation {
    pub fn new(start: u32, end: u32) -> Result<FileLocation> {
        if end < start {
            return Err(Error::Invariant(format!(
                "location end {} before start {}", end, start
            )));
        }
        Ok(FileLocation { start, end })
    }
    #[inline]
    pub fn size(&self) -> u32 {
        self.end - self.start
    }
    #[inline]
    pub fn overlaps(&self, other: &FileLocation) -> bool {
        self.start.max(other.start) < self.end.min(other.end)
    }
}
impl Ord for FileLocation {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.start, self.end).cmp(&(other.start, other.end))
    }
}
impl PartialOrd for FileLocation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl std::fmt::Display for FileLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// A declaring class's internal name paired with a field or method's
/// simple name, as recorded at a specific source location.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct FieldReference {
    pub location: FileLocation,
    pub owner: String,
    pub name: String,
}
impl FieldReference {
    pub fn new(location: FileLocation, owner: String, name: String) -> Result<FieldReference> {
        if location.size() as usize != name.len() {
            return Err(Error::Invariant(format!(
                "field reference location size {} does not match name {:?}",
                location.size(), name
            )));
        }
        Ok(FieldReference { location, owner, name })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct MethodReference {
    pub location: FileLocation,
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}
impl MethodReference {
    pub fn new(
        location: FileLocation,
        owner: String,
        name: String,
        descriptor: String,
    ) -> Result<MethodReference> {
        if location.size() as usize != name.len() {
            return Err(Error::Invariant(format!(
                "method reference location size {} does not match name {:?}",
                location.size(), name
            )));
        }
        Ok(MethodReference { location, owner, name, descriptor })
    }
}

/// Either reference kind, ordered by its `FileLocation`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum MemberReference {
    Field(FieldReference),
    Method(MethodReference),
}
impl MemberReference {
    pub fn location(&self) -> FileLocation {
        match self {
            MemberReference::Field(f) => f.location,
            MemberReference::Method(m) => m.location,
        }
    }
    pub fn owner(&self) -> &str {
        match self {
            MemberReference::Field(f) => &f.owner,
            MemberReference::Method(m) => &m.owner,
        }
    }
    pub fn name(&self) -> &str {
        match self {
            MemberReference::Field(f) => &f.name,
            MemberReference::Method(m) => &m.name,
        }
    }
}
impl Ord for MemberReference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.location().cmp(&other.location())
    }
}
impl PartialOrd for MemberReference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Per-file reference lists plus content hashes, with produce-a-new
/// `update` merge semantics. Immutable once built; clone to mutate.
#[derive(Clone, Debug, Default)]
pub struct RangeMap {
    field_references: FnvIndexMap<String, Vec<FieldReference>>,
    method_references: FnvIndexMap<String, Vec<MethodReference>>,
    file_hashes: FnvIndexMap<String, Vec<u8>>,
    known_files: Option<IndexSet<String>>,
}
impl RangeMap {
    pub fn empty() -> RangeMap {
        RangeMap::default()
    }

    pub fn new(
        field_references: FnvIndexMap<String, Vec<FieldReference>>,
        method_references: FnvIndexMap<String, Vec<MethodReference>>,
        file_hashes: FnvIndexMap<String, Vec<u8>>,
    ) -> Result<RangeMap> {
        let mut map = RangeMap { field_references, method_references, file_hashes, known_files: None };
        map.validate_no_overlaps()?;
        Ok(map)
    }

    fn validate_no_overlaps(&self) -> Result<()> {
        for file in self.known_files_set() {
            let sorted = self.sorted_references(&file);
            for window in sorted.windows(2) {
                if window[0].location().overlaps(&window[1].location()) {
                    return Err(Error::OverlappingReferences {
                        file: file.clone(),
                        first: window[0].location().to_string(),
                        second: window[1].location().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// All references for `file` in insertion order (not necessarily sorted).
    pub fn references(&self, file: &str) -> Vec<MemberReference> {
        let mut result: Vec<MemberReference> = Vec::new();
        if let Some(fields) = self.field_references.get(file) {
            result.extend(fields.iter().cloned().map(MemberReference::Field));
        }
        if let Some(methods) = self.method_references.get(file) {
            result.extend(methods.iter().cloned().map(MemberReference::Method));
        }
        result
    }

    /// A sort-merge of `references(file)` by `FileLocation`.
    pub fn sorted_references(&self, file: &str) -> Vec<MemberReference> {
        let mut result = self.references(file);
        result.sort();
        result
    }

    pub fn hash(&self, file: &str) -> Option<&[u8]> {
        self.file_hashes.get(file).map(|v| v.as_slice())
    }

    pub fn has_hash(&self, file: &str, expected: &[u8]) -> bool {
        self.hash(file).map_or(false, |actual| actual == expected)
    }

    fn known_files_set(&self) -> IndexSet<String> {
        self.field_references.keys()
            .chain(self.method_references.keys())
            .cloned()
            .collect()
    }

    /// The union of files carrying references (not hash-only files), cached.
    pub fn known_files(&mut self) -> &IndexSet<String> {
        if self.known_files.is_none() {
            self.known_files = Some(self.known_files_set());
        }
        self.known_files.as_ref().unwrap()
    }

    /// Produce a new `RangeMap`: for each file present in `other`, replace
    /// that file's reference lists wholesale; for each hash entry in
    /// `other`, insert or overwrite. Entries unique to `self` remain.
    pub fn update(&self, other: &RangeMap) -> RangeMap {
        let mut field_references = self.field_references.clone();
        let mut method_references = self.method_references.clone();
        let mut file_hashes = self.file_hashes.clone();

        for file in other.known_files_set() {
            match other.field_references.get(&file) {
                Some(v) => { field_references.insert(file.clone(), v.clone()); }
                None => { field_references.shift_remove(&file); }
            }
            match other.method_references.get(&file) {
                Some(v) => { method_references.insert(file.clone(), v.clone()); }
                None => { method_references.shift_remove(&file); }
            }
        }
        for (file, hash) in &other.file_hashes {
            file_hashes.insert(file.clone(), hash.clone());
        }
        RangeMap { field_references, method_references, file_hashes, known_files: None }
    }

    pub fn field_references_map(&self) -> &FnvIndexMap<String, Vec<FieldReference>> {
        &self.field_references
    }
    pub fn method_references_map(&self) -> &FnvIndexMap<String, Vec<MethodReference>> {
        &self.method_references
    }
    pub fn file_hashes_map(&self) -> &FnvIndexMap<String, Vec<u8>> {
        &self.file_hashes
    }

    /// A human-readable line-oriented diff of `self` and `other`'s sorted
    /// reference lists, one line per file. Files identical in both maps are
    /// omitted. Intended for test failures and CLI diagnostics, not parsing.
    pub fn debug_diff(&self, other: &RangeMap) -> String {
        let mut lhs = self.clone();
        let mut rhs = other.clone();
        let mut files: IndexSet<String> = lhs.known_files().clone();
        files.extend(rhs.known_files().iter().cloned());
        let mut files: Vec<String> = files.into_iter().collect();
        files.sort();

        let mut report = String::new();
        for file in files {
            let left_text = render_references(&self.sorted_references(&file));
            let right_text = render_references(&other.sorted_references(&file));
            if left_text == right_text {
                continue;
            }
            report.push_str(&format!("--- {}\n", file));
            let changeset = difference::Changeset::new(&left_text, &right_text, "\n");
            report.push_str(&changeset.to_string());
            report.push('\n');
        }
        report
    }
}

fn render_references(refs: &[MemberReference]) -> String {
    refs.iter().map(|r| match r {
        MemberReference::Field(f) => format!("{} field {}/{}", f.location, f.owner, f.name),
        MemberReference::Method(m) => format!("{} method {}/{}{}", m.location, m.owner, m.name, m.descriptor),
    }).collect::<Vec<_>>().join("\n")
}
impl PartialEq for RangeMap {
    fn eq(&self, other: &Self) -> bool {
        if self.file_hashes != other.file_hashes {
            return false;
        }
        let mut lhs = self.clone();
        let mut rhs = other.clone();
        if lhs.known_files() != rhs.known_files() {
            return false;
        }
        lhs.known_files().iter().all(|file| {
            self.sorted_references(file) == other.sorted_references(file)
        })
    }
}
impl Eq for RangeMap {}
impl Hash for RangeMap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut files: Vec<&String> = self.file_hashes.keys().collect();
        files.sort();
        for file in files {
            file.hash(state);
            self.file_hashes[file].hash(state);
        }
        let mut known: Vec<String> = self.known_files_set().into_iter().collect();
        known.sort();
        for file in known {
            file.hash(state);
            let mut hasher = DefaultHasher::new();
            for reference in self.sorted_references(&file) {
                reference.hash(&mut hasher);
            }
            hasher.finish().hash(state);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn field(file_start: u32, owner: &str, name: &str) -> FieldReference {
        FieldReference::new(
            FileLocation::new(file_start, file_start + name.len() as u32).unwrap(),
            owner.to_string(),
            name.to_string(),
        ).unwrap()
    }

    #[test]
    fn update_is_right_biased_per_disjoint_file() {
        let mut a_fields = FnvIndexMap::default();
        a_fields.insert("A.java".to_string(), vec![field(0, "A", "foo")]);
        let a = RangeMap::new(a_fields, FnvIndexMap::default(), FnvIndexMap::default()).unwrap();

        let mut b_fields = FnvIndexMap::default();
        b_fields.insert("B.java".to_string(), vec![field(0, "B", "bar")]);
        let b = RangeMap::new(b_fields, FnvIndexMap::default(), FnvIndexMap::default()).unwrap();

        let merged = a.update(&b);
        assert_eq!(merged.references("A.java"), a.references("A.java"));
        assert_eq!(merged.references("B.java"), b.references("B.java"));
    }

    #[test]
    fn update_replaces_shared_file_wholesale() {
        let mut a_fields = FnvIndexMap::default();
        a_fields.insert("A.java".to_string(), vec![field(0, "A", "foo"), field(10, "A", "baz")]);
        let a = RangeMap::new(a_fields, FnvIndexMap::default(), FnvIndexMap::default()).unwrap();

        let mut b_fields = FnvIndexMap::default();
        b_fields.insert("A.java".to_string(), vec![field(0, "A", "qux")]);
        let b = RangeMap::new(b_fields, FnvIndexMap::default(), FnvIndexMap::default()).unwrap();

        let merged = a.update(&b);
        assert_eq!(merged.references("A.java"), b.references("A.java"));
    }

    #[test]
    fn debug_diff_is_empty_for_equal_maps() {
        let mut fields = FnvIndexMap::default();
        fields.insert("A.java".to_string(), vec![field(0, "A", "foo")]);
        let a = RangeMap::new(fields.clone(), FnvIndexMap::default(), FnvIndexMap::default()).unwrap();
        let b = RangeMap::new(fields, FnvIndexMap::default(), FnvIndexMap::default()).unwrap();
        assert_eq!(a.debug_diff(&b), "");
    }

    #[test]
    fn debug_diff_reports_changed_file() {
        let mut a_fields = FnvIndexMap::default();
        a_fields.insert("A.java".to_string(), vec![field(0, "A", "foo")]);
        let a = RangeMap::new(a_fields, FnvIndexMap::default(), FnvIndexMap::default()).unwrap();

        let mut b_fields = FnvIndexMap::default();
        b_fields.insert("A.java".to_string(), vec![field(0, "A", "bar")]);
        let b = RangeMap::new(b_fields, FnvIndexMap::default(), FnvIndexMap::default()).unwrap();

        let diff = a.debug_diff(&b);
        assert!(diff.contains("A.java"));
    }

    #[test]
    fn overlapping_field_references_are_rejected() {
        let mut fields = FnvIndexMap::default();
        fields.insert("A.java".to_string(), vec![field(0, "A", "foo"), field(1, "A", "ba")]);
        let err = RangeMap::new(fields, FnvIndexMap::default(), FnvIndexMap::default()).unwrap_err();
        assert!(matches!(err, Error::OverlappingReferences { .. }));
    }
}
