//! Logical data types, compression levels and format versions
//!
//! This module contains the closed set of element types an OMX container can
//! hold and the related enums persisted alongside datasets.

use crate::{OmxError, Result};

/// Logical scalar kinds supported by OMX containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum LogicalType {
    /// 8-bit signed integer
    Int8 = 0,
    /// 8-bit unsigned integer
    UInt8 = 1,
    /// 16-bit signed integer
    Int16 = 2,
    /// 16-bit unsigned integer
    UInt16 = 3,
    /// 32-bit signed integer
    Int32 = 4,
    /// 32-bit unsigned integer
    UInt32 = 5,
    /// 64-bit signed integer
    Int64 = 6,
    /// 64-bit unsigned integer
    UInt64 = 7,
    /// 32-bit floating point
    Float = 8,
    /// 64-bit floating point
    Double = 9,
    /// Variable length text
    String = 10,
    /// Anything the type registry cannot map
    Unknown = 11,
}

impl LogicalType {
    /// Every supported (mappable) type, in declaration order
    pub const SUPPORTED: [LogicalType; 11] = [
        LogicalType::Int8,
        LogicalType::UInt8,
        LogicalType::Int16,
        LogicalType::UInt16,
        LogicalType::Int32,
        LogicalType::UInt32,
        LogicalType::Int64,
        LogicalType::UInt64,
        LogicalType::Float,
        LogicalType::Double,
        LogicalType::String,
    ];

    /// Convert from u8 representation
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(LogicalType::Int8),
            1 => Some(LogicalType::UInt8),
            2 => Some(LogicalType::Int16),
            3 => Some(LogicalType::UInt16),
            4 => Some(LogicalType::Int32),
            5 => Some(LogicalType::UInt32),
            6 => Some(LogicalType::Int64),
            7 => Some(LogicalType::UInt64),
            8 => Some(LogicalType::Float),
            9 => Some(LogicalType::Double),
            10 => Some(LogicalType::String),
            11 => Some(LogicalType::Unknown),
            _ => None,
        }
    }

    /// Convert to u8 representation
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Fixed byte width of one element, `None` for strings and unknown types
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            LogicalType::Int8 | LogicalType::UInt8 => Some(1),
            LogicalType::Int16 | LogicalType::UInt16 => Some(2),
            LogicalType::Int32 | LogicalType::UInt32 | LogicalType::Float => Some(4),
            LogicalType::Int64 | LogicalType::UInt64 | LogicalType::Double => Some(8),
            LogicalType::String | LogicalType::Unknown => None,
        }
    }

    /// Byte width used for layout decisions
    ///
    /// Strings report the width of a single character; the actual storage
    /// size of a string value depends on its length. Unknown has no size.
    pub fn size_bytes(self) -> Result<usize> {
        match self {
            LogicalType::String => Ok(1),
            LogicalType::Unknown => Err(OmxError::InvalidDataType(
                "cannot retrieve size of unknown type".into(),
            )),
            other => other
                .fixed_size()
                .ok_or_else(|| OmxError::InvalidDataType("unsized data type".into())),
        }
    }

    /// True for every integer and floating point type
    pub const fn is_numeric(self) -> bool {
        !matches!(self, LogicalType::String | LogicalType::Unknown)
    }
}

impl core::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LogicalType::Int8 => write!(f, "int8"),
            LogicalType::UInt8 => write!(f, "uint8"),
            LogicalType::Int16 => write!(f, "int16"),
            LogicalType::UInt16 => write!(f, "uint16"),
            LogicalType::Int32 => write!(f, "int32"),
            LogicalType::UInt32 => write!(f, "uint32"),
            LogicalType::Int64 => write!(f, "int64"),
            LogicalType::UInt64 => write!(f, "uint64"),
            LogicalType::Float => write!(f, "float"),
            LogicalType::Double => write!(f, "double"),
            LogicalType::String => write!(f, "string"),
            LogicalType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Compression applied to a dataset's chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CompressionLevel {
    #[default]
    NoCompression = 0,
    Level1 = 1,
    Level2 = 2,
    Level3 = 3,
    Level4 = 4,
    Level5 = 5,
    Level6 = 6,
    Level7 = 7,
    Level8 = 8,
    Level9 = 9,
}

impl CompressionLevel {
    /// Convert from the numeric level (0 = no compression)
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CompressionLevel::NoCompression),
            1 => Some(CompressionLevel::Level1),
            2 => Some(CompressionLevel::Level2),
            3 => Some(CompressionLevel::Level3),
            4 => Some(CompressionLevel::Level4),
            5 => Some(CompressionLevel::Level5),
            6 => Some(CompressionLevel::Level6),
            7 => Some(CompressionLevel::Level7),
            8 => Some(CompressionLevel::Level8),
            9 => Some(CompressionLevel::Level9),
            _ => None,
        }
    }

    /// Numeric level, 0 meaning no compression
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    pub const fn is_compressed(self) -> bool {
        !matches!(self, CompressionLevel::NoCompression)
    }
}

impl core::fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CompressionLevel::NoCompression => write!(f, "none"),
            level => write!(f, "level {}", level.to_u8()),
        }
    }
}

/// Container format versions understood by this library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FormatVersion {
    #[default]
    V0_3,
}

impl FormatVersion {
    /// The only version this library reads and writes
    pub const CURRENT: FormatVersion = FormatVersion::V0_3;

    /// Literal value persisted in the version attribute
    pub const fn as_str(self) -> &'static str {
        match self {
            FormatVersion::V0_3 => "0.3",
        }
    }

    /// Parse the persisted version attribute value
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "0.3" => Some(FormatVersion::V0_3),
            _ => None,
        }
    }
}

impl core::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_sizes() {
        assert_eq!(LogicalType::Int8.size_bytes(), Ok(1));
        assert_eq!(LogicalType::UInt16.size_bytes(), Ok(2));
        assert_eq!(LogicalType::Float.size_bytes(), Ok(4));
        assert_eq!(LogicalType::UInt64.size_bytes(), Ok(8));
        assert_eq!(LogicalType::Double.size_bytes(), Ok(8));
        assert_eq!(LogicalType::String.size_bytes(), Ok(1));
        assert_eq!(LogicalType::String.fixed_size(), None);
        assert_eq!(
            LogicalType::Unknown.size_bytes().unwrap_err().kind(),
            ErrorKind::InvalidDataType
        );
    }

    #[test]
    fn test_u8_conversion() {
        for ty in LogicalType::SUPPORTED {
            assert_eq!(LogicalType::from_u8(ty.to_u8()), Some(ty));
        }
        assert_eq!(LogicalType::from_u8(12), None);

        for level in 0..=9 {
            let parsed = CompressionLevel::from_u8(level).unwrap();
            assert_eq!(parsed.to_u8(), level);
        }
        assert_eq!(CompressionLevel::from_u8(10), None);
        assert!(!CompressionLevel::NoCompression.is_compressed());
        assert!(CompressionLevel::Level1.is_compressed());
    }

    #[test]
    fn test_version_string() {
        assert_eq!(FormatVersion::CURRENT.as_str(), "0.3");
        assert_eq!(FormatVersion::parse("0.3"), Some(FormatVersion::V0_3));
        assert_eq!(FormatVersion::parse("0.2"), None);
    }
}
