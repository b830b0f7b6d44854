//! Typed attribute collections
//!
//! The container root, every matrix and every zonal reference own an
//! [`AttributeCollection`]: a set of uniquely named scalar or string
//! values persisted alongside the owner.
//!
//! ```rust,no_run
//! # use omx::OmxFile;
//! # fn example() -> omx::Result<()> {
//! let mut file = OmxFile::new("trips.omx");
//! file.open_with_truncate(25)?;
//! file.attributes_mut()?.set("run", 7i32)?;
//! assert_eq!(file.attributes()?.get::<i32>("run")?, 7);
//! assert_eq!(file.attributes()?.get_as_string("run")?, "7");
//! # Ok(())
//! # }
//! ```

use std::fmt;

use omx_core::{LogicalType, OmxError, Result};

use crate::registry;
use crate::store::{StoreFile, StoreType, StringSize};

/// A typed attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
}

impl AttributeValue {
    /// Logical type of the value
    pub fn data_type(&self) -> LogicalType {
        match self {
            AttributeValue::Int8(_) => LogicalType::Int8,
            AttributeValue::UInt8(_) => LogicalType::UInt8,
            AttributeValue::Int16(_) => LogicalType::Int16,
            AttributeValue::UInt16(_) => LogicalType::UInt16,
            AttributeValue::Int32(_) => LogicalType::Int32,
            AttributeValue::UInt32(_) => LogicalType::UInt32,
            AttributeValue::Int64(_) => LogicalType::Int64,
            AttributeValue::UInt64(_) => LogicalType::UInt64,
            AttributeValue::Float(_) => LogicalType::Float,
            AttributeValue::Double(_) => LogicalType::Double,
            AttributeValue::String(_) => LogicalType::String,
        }
    }

    /// Engine type and bytes for persisting the value
    ///
    /// Strings are stored fixed-size with a null terminator.
    fn encode(&self) -> Result<(StoreType, Vec<u8>)> {
        let bytes = match self {
            AttributeValue::Int8(v) => v.to_le_bytes().to_vec(),
            AttributeValue::UInt8(v) => v.to_le_bytes().to_vec(),
            AttributeValue::Int16(v) => v.to_le_bytes().to_vec(),
            AttributeValue::UInt16(v) => v.to_le_bytes().to_vec(),
            AttributeValue::Int32(v) => v.to_le_bytes().to_vec(),
            AttributeValue::UInt32(v) => v.to_le_bytes().to_vec(),
            AttributeValue::Int64(v) => v.to_le_bytes().to_vec(),
            AttributeValue::UInt64(v) => v.to_le_bytes().to_vec(),
            AttributeValue::Float(v) => v.to_le_bytes().to_vec(),
            AttributeValue::Double(v) => v.to_le_bytes().to_vec(),
            AttributeValue::String(text) => {
                if text.contains('\0') {
                    return Err(OmxError::InvalidDataType(
                        "string attributes cannot contain null characters".into(),
                    ));
                }
                let mut bytes = Vec::with_capacity(text.len() + 1);
                bytes.extend_from_slice(text.as_bytes());
                bytes.push(0);
                let len = u32::try_from(bytes.len())
                    .map_err(|_| OmxError::Resource("string attribute too long".into()))?;
                return Ok((StoreType::fixed_string(len), bytes));
            }
        };
        Ok((registry::store_type(self.data_type())?, bytes))
    }

    fn decode(store: &StoreType, bytes: &[u8]) -> Result<Self> {
        macro_rules! scalar {
            ($variant:ident, $type:ty) => {{
                let raw: [u8; std::mem::size_of::<$type>()] = bytes.try_into().map_err(|_| {
                    OmxError::Format(format!(
                        "{} attribute holds {} bytes",
                        LogicalType::$variant,
                        bytes.len()
                    ))
                })?;
                AttributeValue::$variant(<$type>::from_le_bytes(raw))
            }};
        }

        Ok(match registry::logical_type(store) {
            LogicalType::Int8 => scalar!(Int8, i8),
            LogicalType::UInt8 => scalar!(UInt8, u8),
            LogicalType::Int16 => scalar!(Int16, i16),
            LogicalType::UInt16 => scalar!(UInt16, u16),
            LogicalType::Int32 => scalar!(Int32, i32),
            LogicalType::UInt32 => scalar!(UInt32, u32),
            LogicalType::Int64 => scalar!(Int64, i64),
            LogicalType::UInt64 => scalar!(UInt64, u64),
            LogicalType::Float => scalar!(Float, f32),
            LogicalType::Double => scalar!(Double, f64),
            LogicalType::String => {
                let text = match store {
                    StoreType::String {
                        size: StringSize::Fixed(_),
                    } => bytes.split(|&b| b == 0).next().unwrap_or_default(),
                    _ => bytes,
                };
                let text = std::str::from_utf8(text)
                    .map_err(|_| OmxError::Format("string attribute is not UTF-8".into()))?;
                AttributeValue::String(text.to_owned())
            }
            LogicalType::Unknown => {
                return Err(OmxError::InvalidDataType(format!(
                    "attribute has unsupported type {store:?}"
                )))
            }
        })
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Int8(v) => write!(f, "{v}"),
            AttributeValue::UInt8(v) => write!(f, "{v}"),
            AttributeValue::Int16(v) => write!(f, "{v}"),
            AttributeValue::UInt16(v) => write!(f, "{v}"),
            AttributeValue::Int32(v) => write!(f, "{v}"),
            AttributeValue::UInt32(v) => write!(f, "{v}"),
            AttributeValue::Int64(v) => write!(f, "{v}"),
            AttributeValue::UInt64(v) => write!(f, "{v}"),
            // Fixed notation with six decimals, as C `%f` prints
            AttributeValue::Float(v) => write!(f, "{v:.6}"),
            AttributeValue::Double(v) => write!(f, "{v:.6}"),
            AttributeValue::String(v) => f.write_str(v),
        }
    }
}

/// Rust types that can be stored as attributes
pub trait AttributeType: Sized {
    const DATA_TYPE: LogicalType;

    fn into_value(self) -> AttributeValue;

    /// Extract a value of this type, `None` on a type mismatch
    fn from_value(value: AttributeValue) -> Option<Self>;
}

macro_rules! impl_attribute_type {
    ($type:ty, $variant:ident) => {
        impl AttributeType for $type {
            const DATA_TYPE: LogicalType = LogicalType::$variant;

            fn into_value(self) -> AttributeValue {
                AttributeValue::$variant(self)
            }

            fn from_value(value: AttributeValue) -> Option<Self> {
                match value {
                    AttributeValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }

        impl From<$type> for AttributeValue {
            fn from(value: $type) -> Self {
                AttributeValue::$variant(value)
            }
        }
    };
}

impl_attribute_type!(i8, Int8);
impl_attribute_type!(u8, UInt8);
impl_attribute_type!(i16, Int16);
impl_attribute_type!(u16, UInt16);
impl_attribute_type!(i32, Int32);
impl_attribute_type!(u32, UInt32);
impl_attribute_type!(i64, Int64);
impl_attribute_type!(u64, UInt64);
impl_attribute_type!(f32, Float);
impl_attribute_type!(f64, Double);
impl_attribute_type!(String, String);

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_owned())
    }
}

/// Attributes of one group or dataset
///
/// Holds the owner's file and path rather than the owner itself; the
/// collection is valid only while its owner is open. Once the container is
/// closed every call fails with a state error.
#[derive(Debug, Clone)]
pub struct AttributeCollection {
    file: StoreFile,
    path: String,
}

macro_rules! typed_getters {
    ($($name:ident => $type:ty),* $(,)?) => {
        $(
            #[doc = concat!("Get a `", stringify!($type), "` attribute")]
            pub fn $name(&self, name: &str) -> Result<$type> {
                self.get::<$type>(name)
            }
        )*
    };
}

impl AttributeCollection {
    pub(crate) fn new(file: StoreFile, path: impl Into<String>) -> Self {
        Self {
            file,
            path: path.into(),
        }
    }

    /// Path of the owning group or dataset
    pub fn owner_path(&self) -> &str {
        &self.path
    }

    /// Attribute names in creation order
    pub fn names(&self) -> Result<Vec<String>> {
        self.file.attribute_names(&self.path)
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.names()?.len())
    }

    pub fn has(&self, name: &str) -> Result<bool> {
        self.file.attribute_exists(&self.path, name)
    }

    /// True when `name` exists and holds a value of `data_type`
    pub fn has_type(&self, name: &str, data_type: LogicalType) -> Result<bool> {
        if !self.has(name)? {
            return Ok(false);
        }
        Ok(self.data_type(name)? == data_type)
    }

    pub fn data_type(&self, name: &str) -> Result<LogicalType> {
        let store = self.file.attribute_type(&self.path, name)?;
        Ok(registry::logical_type(&store))
    }

    /// Stored size in bytes of a string attribute, null terminator included
    pub fn string_length(&self, name: &str) -> Result<usize> {
        match self.file.attribute_type(&self.path, name)? {
            StoreType::String {
                size: StringSize::Fixed(len),
            } => Ok(len as usize),
            StoreType::String {
                size: StringSize::Variable,
            } => Ok(self.get_string(name)?.len() + 1),
            other => Err(OmxError::InvalidDataType(format!(
                "attribute '{name}' holds {}, not a string",
                registry::logical_type(&other)
            ))),
        }
    }

    /// Create or replace an attribute
    ///
    /// A replaced attribute, even one of a different type, moves to the
    /// end of the creation order. The replace is a single store update, so
    /// a failure leaves the previous value in place.
    pub fn set<T: AttributeType>(&mut self, name: &str, value: T) -> Result<()> {
        self.set_value(name, value.into_value())
    }

    pub fn set_value(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        let (dtype, bytes) = value.encode()?;
        self.file.write_attribute(&self.path, name, dtype, bytes)
    }

    pub fn set_string(&mut self, name: &str, value: &str) -> Result<()> {
        self.set_value(name, AttributeValue::from(value))
    }

    /// Get an attribute as `T`
    ///
    /// Fails with `InvalidDataType` when the stored type is not `T`.
    pub fn get<T: AttributeType>(&self, name: &str) -> Result<T> {
        let value = self.get_value(name)?;
        let stored = value.data_type();
        T::from_value(value).ok_or_else(|| {
            OmxError::InvalidDataType(format!(
                "attribute '{name}' holds {stored}, requested {}",
                T::DATA_TYPE
            ))
        })
    }

    pub fn get_value(&self, name: &str) -> Result<AttributeValue> {
        let (store, bytes) = self.file.read_attribute(&self.path, name)?;
        AttributeValue::decode(&store, &bytes)
    }

    /// Value formatted as text, whatever its stored type
    pub fn get_as_string(&self, name: &str) -> Result<String> {
        Ok(self.get_value(name)?.to_string())
    }

    typed_getters! {
        get_i8 => i8,
        get_u8 => u8,
        get_i16 => i16,
        get_u16 => u16,
        get_i32 => i32,
        get_u32 => u32,
        get_i64 => i64,
        get_u64 => u64,
        get_f32 => f32,
        get_f64 => f64,
        get_string => String,
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        self.file.delete_attribute(&self.path, name)
    }
}
