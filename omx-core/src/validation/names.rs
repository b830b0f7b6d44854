//! Entry name rules

use alloc::format;

use crate::{OmxError, Result};

/// Check whether `name` can be used for a matrix or zonal reference
///
/// Names must be non-empty and cannot contain the path separator, since
/// every entry is stored as a direct child of its kind's group.
pub fn is_valid_dataset_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && name != "." && name != ".."
}

/// Validate a new entry name, naming the entry kind in the error
pub fn validate_dataset_name(kind: &str, name: &str) -> Result<()> {
    if !is_valid_dataset_name(name) {
        return Err(OmxError::InvalidDataType(format!(
            "the name '{name}' is not a valid {kind} name"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_names() {
        assert!(is_valid_dataset_name("m"));
        assert!(is_valid_dataset_name("AM peak SOV time"));
        assert!(!is_valid_dataset_name(""));
        assert!(!is_valid_dataset_name("a/b"));
        assert!(!is_valid_dataset_name(".."));

        let err = validate_dataset_name("matrix", "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDataType);
        assert!(err.message().contains("matrix"));
    }
}
