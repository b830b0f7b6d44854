//! Element type constraints for typed row and reference buffers
//!
//! This module defines the trait that constrains what Rust types can be
//! moved in and out of numeric matrices and zonal references.

use crate::format::LogicalType;

/// Trait for types that can be stored as numeric dataset elements
///
/// All element types must be:
/// - Pod: plain bytes with no invalid bit patterns
/// - PartialEq + Debug: comparable and printable in tests
/// - Send + Sync + 'static: usable from any thread owning the container
///
/// Persisted elements are always little-endian; `write_le` / `read_le`
/// convert between host and storage byte order.
pub trait OmxElement:
    bytemuck::Pod + PartialEq + core::fmt::Debug + Send + Sync + 'static
{
    /// Logical type this Rust type maps to
    const DATA_TYPE: LogicalType;

    /// Encode `values` into `out` in little-endian order
    ///
    /// `out` must be exactly `values.len() * size_of::<Self>()` bytes.
    fn write_le(values: &[Self], out: &mut [u8]);

    /// Decode little-endian `bytes` into `out`
    ///
    /// `bytes` must be exactly `out.len() * size_of::<Self>()` bytes.
    fn read_le(bytes: &[u8], out: &mut [Self]);

    /// Get the size in bytes of this element type
    fn size_bytes() -> usize {
        core::mem::size_of::<Self>()
    }
}

macro_rules! impl_omx_element {
    ($type:ty, $variant:ident) => {
        impl OmxElement for $type {
            const DATA_TYPE: LogicalType = LogicalType::$variant;

            fn write_le(values: &[Self], out: &mut [u8]) {
                const SIZE: usize = core::mem::size_of::<$type>();
                if cfg!(target_endian = "little") {
                    out.copy_from_slice(bytemuck::cast_slice(values));
                } else {
                    for (chunk, value) in out.chunks_exact_mut(SIZE).zip(values) {
                        chunk.copy_from_slice(&value.to_le_bytes());
                    }
                }
            }

            fn read_le(bytes: &[u8], out: &mut [Self]) {
                const SIZE: usize = core::mem::size_of::<$type>();
                for (value, chunk) in out.iter_mut().zip(bytes.chunks_exact(SIZE)) {
                    let mut raw = [0u8; SIZE];
                    raw.copy_from_slice(chunk);
                    *value = <$type>::from_le_bytes(raw);
                }
            }
        }
    };
}

impl_omx_element!(i8, Int8);
impl_omx_element!(u8, UInt8);
impl_omx_element!(i16, Int16);
impl_omx_element!(u16, UInt16);
impl_omx_element!(i32, Int32);
impl_omx_element!(u32, UInt32);
impl_omx_element!(i64, Int64);
impl_omx_element!(u64, UInt64);
impl_omx_element!(f32, Float);
impl_omx_element!(f64, Double);
