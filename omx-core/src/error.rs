//! Error types for OMX operations

use alloc::string::String;

/// Errors that can occur during OMX operations
///
/// Every variant carries a human readable message describing the failing
/// operation. Failures reported by the storage engine are always translated
/// into one of these kinds before reaching a caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OmxError {
    /// Missing or unsupported version / zone attributes, or a file that is
    /// not a container at all
    #[error("format error: {0}")]
    Format(String),
    /// An entry with the same name already exists
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    /// A named entry or attribute does not exist
    #[error("not found: {0}")]
    NotFound(String),
    /// Type forbidden for this kind, or requested type differs from the stored one
    #[error("invalid data type: {0}")]
    InvalidDataType(String),
    /// Positional lookup outside the collection
    #[error("index out of range: {0}")]
    IndexOutOfRange(String),
    /// Row or element coordinate outside the dataset
    #[error("range error: {0}")]
    Range(String),
    /// Buffer or vector length disagrees with the zone count
    #[error("size mismatch: {0}")]
    SizeMismatch(String),
    /// The storage engine failed to allocate, create, read or write
    #[error("resource error: {0}")]
    Resource(String),
    /// Operation not valid in the container's current lifecycle state
    #[error("state error: {0}")]
    State(String),
}

/// Fieldless classification of an [`OmxError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Format,
    DuplicateName,
    NotFound,
    InvalidDataType,
    IndexOutOfRange,
    Range,
    SizeMismatch,
    Resource,
    State,
}

impl OmxError {
    /// Get the kind of this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            OmxError::Format(_) => ErrorKind::Format,
            OmxError::DuplicateName(_) => ErrorKind::DuplicateName,
            OmxError::NotFound(_) => ErrorKind::NotFound,
            OmxError::InvalidDataType(_) => ErrorKind::InvalidDataType,
            OmxError::IndexOutOfRange(_) => ErrorKind::IndexOutOfRange,
            OmxError::Range(_) => ErrorKind::Range,
            OmxError::SizeMismatch(_) => ErrorKind::SizeMismatch,
            OmxError::Resource(_) => ErrorKind::Resource,
            OmxError::State(_) => ErrorKind::State,
        }
    }

    /// Get the message attached to this error
    pub fn message(&self) -> &str {
        match self {
            OmxError::Format(m)
            | OmxError::DuplicateName(m)
            | OmxError::NotFound(m)
            | OmxError::InvalidDataType(m)
            | OmxError::IndexOutOfRange(m)
            | OmxError::Range(m)
            | OmxError::SizeMismatch(m)
            | OmxError::Resource(m)
            | OmxError::State(m) => m,
        }
    }

    /// Requested type differs from the stored type
    pub fn type_mismatch(what: &str) -> Self {
        OmxError::InvalidDataType(alloc::format!("data type mismatch for {what}"))
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            ErrorKind::Format => "format",
            ErrorKind::DuplicateName => "duplicate name",
            ErrorKind::NotFound => "not found",
            ErrorKind::InvalidDataType => "invalid data type",
            ErrorKind::IndexOutOfRange => "index out of range",
            ErrorKind::Range => "range",
            ErrorKind::SizeMismatch => "size mismatch",
            ErrorKind::Resource => "resource",
            ErrorKind::State => "state",
        };
        write!(f, "{msg}")
    }
}

/// Result type for OMX operations
pub type Result<T> = core::result::Result<T, OmxError>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_kind_and_message() {
        let err = OmxError::DuplicateName("matrix 'm' already exists".to_string());
        assert_eq!(err.kind(), ErrorKind::DuplicateName);
        assert_eq!(err.message(), "matrix 'm' already exists");
        assert_eq!(
            err.to_string(),
            "duplicate name: matrix 'm' already exists"
        );
    }

    #[test]
    fn test_type_mismatch_is_invalid_data_type() {
        let err = OmxError::type_mismatch("attribute 'title'");
        assert_eq!(err.kind(), ErrorKind::InvalidDataType);
    }
}
