//! Mapping between logical types and engine type descriptors

use omx_core::{LogicalType, OmxError, Result};

use crate::store::StoreType;

/// Engine type used to persist values of `data_type`
///
/// Scalars are little-endian; strings map to the variable-length family.
pub fn store_type(data_type: LogicalType) -> Result<StoreType> {
    Ok(match data_type {
        LogicalType::Int8 => StoreType::integer(1, true),
        LogicalType::UInt8 => StoreType::integer(1, false),
        LogicalType::Int16 => StoreType::integer(2, true),
        LogicalType::UInt16 => StoreType::integer(2, false),
        LogicalType::Int32 => StoreType::integer(4, true),
        LogicalType::UInt32 => StoreType::integer(4, false),
        LogicalType::Int64 => StoreType::integer(8, true),
        LogicalType::UInt64 => StoreType::integer(8, false),
        LogicalType::Float => StoreType::float(4),
        LogicalType::Double => StoreType::float(8),
        LogicalType::String => StoreType::variable_string(),
        LogicalType::Unknown => {
            return Err(OmxError::InvalidDataType(
                "the unknown type has no storage representation".into(),
            ))
        }
    })
}

/// Logical type of an engine type, `Unknown` when it has no mapping
pub fn logical_type(store: &StoreType) -> LogicalType {
    if store.is_string() {
        return LogicalType::String;
    }
    LogicalType::SUPPORTED
        .into_iter()
        .filter(|ty| ty.is_numeric())
        .find(|&ty| store_type(ty).is_ok_and(|mapped| mapped.equals(store)))
        .unwrap_or(LogicalType::Unknown)
}
