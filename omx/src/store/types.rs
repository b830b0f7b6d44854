//! Engine type descriptors
//!
//! Every dataset and attribute carries a [`StoreType`] describing how its
//! bytes are laid out. The engine itself only moves bytes; interpretation
//! is left to callers.

use serde::{Deserialize, Serialize};

/// Byte order of a scalar type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    Little,
    Big,
}

/// Storage size of a string type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringSize {
    /// Length-prefixed, any length
    Variable,
    /// Exactly this many bytes, null padded
    Fixed(u32),
}

/// Type descriptor for dataset elements and attribute values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum StoreType {
    Integer {
        size: u8,
        signed: bool,
        order: ByteOrder,
    },
    Float {
        size: u8,
        order: ByteOrder,
    },
    String {
        size: StringSize,
    },
}

impl StoreType {
    /// Little-endian integer type
    pub const fn integer(size: u8, signed: bool) -> Self {
        StoreType::Integer {
            size,
            signed,
            order: ByteOrder::Little,
        }
    }

    /// Little-endian floating point type
    pub const fn float(size: u8) -> Self {
        StoreType::Float {
            size,
            order: ByteOrder::Little,
        }
    }

    /// Variable-length string type
    pub const fn variable_string() -> Self {
        StoreType::String {
            size: StringSize::Variable,
        }
    }

    /// Fixed-length string type of `len` bytes
    pub const fn fixed_string(len: u32) -> Self {
        StoreType::String {
            size: StringSize::Fixed(len),
        }
    }

    /// Engine type-equality predicate
    ///
    /// Two descriptors are equal when they describe the same in-file
    /// layout. Fixed strings compare equal only at the same length.
    pub fn equals(&self, other: &StoreType) -> bool {
        self == other
    }

    /// Byte width of one element, `None` for variable-length strings
    pub fn element_size(&self) -> Option<usize> {
        match *self {
            StoreType::Integer { size, .. } | StoreType::Float { size, .. } => Some(size as usize),
            StoreType::String {
                size: StringSize::Fixed(len),
            } => Some(len as usize),
            StoreType::String {
                size: StringSize::Variable,
            } => None,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, StoreType::String { .. })
    }

    /// Check that the engine can lay out elements of this type
    pub(crate) fn is_well_formed(&self) -> bool {
        match *self {
            StoreType::Integer { size, .. } => matches!(size, 1 | 2 | 4 | 8),
            StoreType::Float { size, .. } => matches!(size, 4 | 8),
            StoreType::String { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_predicate() {
        assert!(StoreType::integer(4, true).equals(&StoreType::integer(4, true)));
        assert!(!StoreType::integer(4, true).equals(&StoreType::integer(4, false)));
        assert!(!StoreType::float(8).equals(&StoreType::Float {
            size: 8,
            order: ByteOrder::Big
        }));
        assert!(!StoreType::fixed_string(4).equals(&StoreType::fixed_string(5)));
    }

    #[test]
    fn test_element_size() {
        assert_eq!(StoreType::integer(2, false).element_size(), Some(2));
        assert_eq!(StoreType::float(4).element_size(), Some(4));
        assert_eq!(StoreType::fixed_string(6).element_size(), Some(6));
        assert_eq!(StoreType::variable_string().element_size(), None);
        assert!(!StoreType::integer(3, true).is_well_formed());
    }

    #[test]
    fn test_catalog_encoding() {
        let json = serde_json::to_string(&StoreType::integer(8, false)).unwrap();
        assert_eq!(json, r#"{"class":"integer","size":8,"signed":false,"order":"little"}"#);
        let back: StoreType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StoreType::integer(8, false));
    }
}
