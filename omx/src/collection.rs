//! Ordered, name-keyed collections of zonal datasets
//!
//! Matrices and zonal references are managed by the same collection type,
//! parameterized by an [`EntryKind`] that carries the kind's group path,
//! its type predicate and whether entries of different types may coexist.

use hashbrown::HashMap;
use omx_core::format::constants::{MATRICES_PATH, ZONAL_REFERENCES_PATH};
use omx_core::validation::{validate_dataset_name, validate_entry_index};
use omx_core::{LogicalType, OmxError, Result, ZonalDataset};

/// Per-kind rules for a [`NamedCollection`]
#[derive(Debug, Clone, Copy)]
pub struct EntryKind {
    /// Singular label used in messages
    pub label: &'static str,
    /// Group holding the kind's datasets
    pub parent_path: &'static str,
    /// Types an entry of this kind may have
    pub is_valid_type: fn(LogicalType) -> bool,
    /// Whether entries may have different types from one another
    ///
    /// Both built-in kinds allow mixing, as containers written by other
    /// tools do. A custom kind passed to [`NamedCollection::new`] can set
    /// this to `false` so every entry must share the first entry's type.
    pub allow_mixed_types: bool,
}

impl EntryKind {
    /// Numeric square matrices
    pub const MATRIX: EntryKind = EntryKind {
        label: "matrix",
        parent_path: MATRICES_PATH,
        is_valid_type: LogicalType::is_numeric,
        allow_mixed_types: true,
    };

    /// Zone-indexed vectors, numeric or string
    pub const ZONAL_REFERENCE: EntryKind = EntryKind {
        label: "zonal reference",
        parent_path: ZONAL_REFERENCES_PATH,
        is_valid_type: |ty| ty != LogicalType::Unknown,
        allow_mixed_types: true,
    };

    /// Path of the dataset backing the entry `name`
    pub fn dataset_path(&self, name: &str) -> String {
        format!("{}/{name}", self.parent_path)
    }
}

/// Entries of one kind in creation order, indexed by name
#[derive(Debug)]
pub struct NamedCollection<T> {
    kind: EntryKind,
    entries: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T: ZonalDataset> NamedCollection<T> {
    pub fn new(kind: EntryKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    /// Check that an entry with this name and type could be added
    pub fn validate_new(&self, name: &str, data_type: LogicalType) -> Result<()> {
        validate_dataset_name(self.kind.label, name)?;

        if self.exists(name) {
            return Err(OmxError::DuplicateName(format!(
                "a {} named '{name}' already exists",
                self.kind.label
            )));
        }

        if !(self.kind.is_valid_type)(data_type) {
            return Err(OmxError::InvalidDataType(format!(
                "a {} cannot hold {data_type} data",
                self.kind.label
            )));
        }

        if !self.kind.allow_mixed_types {
            if let Some(first) = self.entries.first() {
                if first.data_type() != data_type {
                    return Err(OmxError::InvalidDataType(format!(
                        "every {} must hold {} data, not {data_type}",
                        self.kind.label,
                        first.data_type()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Register a live entry at the end of the creation order
    pub fn add(&mut self, entry: T) -> Result<&mut T> {
        self.validate_new(entry.name(), entry.data_type())?;
        let position = self.entries.len();
        self.index.insert(entry.name().to_owned(), position);
        self.entries.push(entry);
        Ok(&mut self.entries[position])
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.index.get(name).copied().ok_or_else(|| {
            OmxError::NotFound(format!("no {} named '{name}'", self.kind.label))
        })
    }

    /// Remove an entry by name
    ///
    /// `detach` releases the physical dataset. When it fails the collection
    /// is left unchanged.
    pub fn remove<F>(&mut self, name: &str, detach: F) -> Result<T>
    where
        F: FnOnce(&mut T) -> Result<()>,
    {
        let position = self.position(name)?;
        self.remove_position(position, detach)
    }

    /// Remove an entry by creation-order index
    pub fn remove_at<F>(&mut self, index: usize, detach: F) -> Result<T>
    where
        F: FnOnce(&mut T) -> Result<()>,
    {
        validate_entry_index(index, self.entries.len())?;
        self.remove_position(index, detach)
    }

    fn remove_position<F>(&mut self, position: usize, detach: F) -> Result<T>
    where
        F: FnOnce(&mut T) -> Result<()>,
    {
        detach(&mut self.entries[position])?;

        let entry = self.entries.remove(position);
        self.index.remove(entry.name());
        for (i, shifted) in self.entries.iter().enumerate().skip(position) {
            self.index.insert(shifted.name().to_owned(), i);
        }
        Ok(entry)
    }

    pub fn get(&self, name: &str) -> Result<&T> {
        Ok(&self.entries[self.position(name)?])
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut T> {
        let position = self.position(name)?;
        Ok(&mut self.entries[position])
    }

    pub fn get_at(&self, index: usize) -> Result<&T> {
        validate_entry_index(index, self.entries.len())?;
        Ok(&self.entries[index])
    }

    pub fn get_at_mut(&mut self, index: usize) -> Result<&mut T> {
        validate_entry_index(index, self.entries.len())?;
        Ok(&mut self.entries[index])
    }

    /// Names in creation order
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name().to_owned()).collect()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.entries.iter_mut()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omx_core::{CompressionLevel, ErrorKind};

    #[derive(Debug)]
    struct Entry {
        name: String,
        data_type: LogicalType,
        detached: bool,
    }

    impl Entry {
        fn new(name: &str, data_type: LogicalType) -> Self {
            Self {
                name: name.to_owned(),
                data_type,
                detached: false,
            }
        }
    }

    impl ZonalDataset for Entry {
        fn name(&self) -> &str {
            &self.name
        }

        fn data_type(&self) -> LogicalType {
            self.data_type
        }

        fn zones(&self) -> u64 {
            10
        }

        fn compression_level(&self) -> CompressionLevel {
            CompressionLevel::NoCompression
        }
    }

    fn matrices(names: &[&str]) -> NamedCollection<Entry> {
        let mut collection = NamedCollection::new(EntryKind::MATRIX);
        for name in names {
            collection.add(Entry::new(name, LogicalType::Double)).unwrap();
        }
        collection
    }

    #[test]
    fn test_add_and_lookup() {
        let collection = matrices(&["c", "a", "b"]);
        assert_eq!(collection.names(), vec!["c", "a", "b"]);
        assert_eq!(collection.len(), 3);
        assert_eq!(collection.get_at(1).unwrap().name(), "a");
        assert_eq!(collection.get("b").unwrap().data_size(), 80);

        assert_eq!(
            collection.get_at(42).unwrap_err().kind(),
            ErrorKind::IndexOutOfRange
        );
        assert_eq!(
            collection.get("missing").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_name_and_type_rules() {
        let mut collection = matrices(&["m"]);
        let err = collection.add(Entry::new("m", LogicalType::Double)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateName);

        let err = collection.add(Entry::new("", LogicalType::Double)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDataType);

        let err = collection.add(Entry::new("s", LogicalType::String)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDataType);

        let mut references = NamedCollection::new(EntryKind::ZONAL_REFERENCE);
        references.add(Entry::new("labels", LogicalType::String)).unwrap();
        let err = references.add(Entry::new("u", LogicalType::Unknown)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDataType);
    }

    #[test]
    fn test_mixed_type_flag() {
        // Both kinds accept entries of differing types
        let mut collection = matrices(&["d"]);
        collection.add(Entry::new("i", LogicalType::Int32)).unwrap();

        let strict = EntryKind {
            allow_mixed_types: false,
            ..EntryKind::MATRIX
        };
        let mut collection = NamedCollection::new(strict);
        collection.add(Entry::new("d", LogicalType::Double)).unwrap();
        collection.add(Entry::new("d2", LogicalType::Double)).unwrap();
        let err = collection.add(Entry::new("i", LogicalType::Int32)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDataType);
    }

    #[test]
    fn test_remove_keeps_index_consistent() {
        let mut collection = matrices(&["a", "b", "c", "d"]);
        let removed = collection
            .remove("b", |entry| {
                entry.detached = true;
                Ok(())
            })
            .unwrap();
        assert!(removed.detached);
        assert_eq!(collection.names(), vec!["a", "c", "d"]);
        assert_eq!(collection.get("d").unwrap().name(), "d");
        assert_eq!(collection.get_at(2).unwrap().name(), "d");

        let removed = collection.remove_at(0, |_| Ok(())).unwrap();
        assert_eq!(removed.name(), "a");
        assert_eq!(collection.get("c").unwrap().name(), "c");

        assert_eq!(
            collection.remove("b", |_| Ok(())).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_failed_detach_changes_nothing() {
        let mut collection = matrices(&["a", "b"]);
        let err = collection
            .remove("a", |_| Err(OmxError::Resource("unlink failed".into())))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert_eq!(collection.names(), vec!["a", "b"]);
        assert!(collection.exists("a"));
    }
}
