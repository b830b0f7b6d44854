//! Zone-indexed reference vectors
//!
//! A zonal reference holds one value per zone: numeric data such as zone
//! areas, or text such as zone labels.

use omx_core::validation::{checked_byte_size, validate_buffer_len};
use omx_core::{CompressionLevel, LogicalType, OmxElement, OmxError, Result, ZonalDataset};
use tracing::debug;

use crate::attributes::AttributeCollection;
use crate::registry;
use crate::store::{Dataspace, DatasetHandle};

/// A vector of `zones` elements of one type
#[derive(Debug)]
pub struct ZonalReference {
    name: String,
    data_type: LogicalType,
    zones: u64,
    compression: CompressionLevel,
    dataset: Option<DatasetHandle>,
    space: Option<Dataspace>,
    attributes: AttributeCollection,
}

impl ZonalReference {
    /// Wrap an open dataset, checking it has the container's length
    pub(crate) fn from_dataset(name: &str, dataset: DatasetHandle, zones: u64) -> Result<Self> {
        let data_type = registry::logical_type(&dataset.dtype());
        if dataset.dims() != [zones] {
            return Err(OmxError::Format(format!(
                "zonal reference '{name}' has shape {:?}, expected [{zones}]",
                dataset.dims()
            )));
        }

        let attributes = AttributeCollection::new(dataset.file().clone(), dataset.path());
        Ok(Self {
            name: name.to_owned(),
            data_type,
            zones,
            compression: dataset.properties().compression,
            dataset: Some(dataset),
            space: None,
            attributes,
        })
    }

    pub fn attributes(&self) -> &AttributeCollection {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeCollection {
        &mut self.attributes
    }

    pub fn is_closed(&self) -> bool {
        self.dataset.is_none()
    }

    fn dataset(&self) -> Result<&DatasetHandle> {
        self.dataset.as_ref().ok_or_else(|| {
            OmxError::State(format!("zonal reference '{}' is closed", self.name))
        })
    }

    fn require_numeric(&self, data_type: LogicalType) -> Result<()> {
        if self.data_type == LogicalType::String {
            return Err(OmxError::InvalidDataType(format!(
                "zonal reference '{}' holds strings; use the string reference methods",
                self.name
            )));
        }
        if data_type != self.data_type {
            return Err(OmxError::InvalidDataType(format!(
                "zonal reference '{}' holds {}, not {data_type}",
                self.name, self.data_type
            )));
        }
        Ok(())
    }

    fn require_string(&self) -> Result<()> {
        if self.data_type != LogicalType::String {
            return Err(OmxError::InvalidDataType(format!(
                "zonal reference '{}' holds {}, not strings",
                self.name, self.data_type
            )));
        }
        Ok(())
    }

    /// Check the buffer and hand out the cached whole-vector selection
    fn select_all(&mut self, buffer_len: usize) -> Result<(&DatasetHandle, &Dataspace)> {
        self.require_numeric(self.data_type)?;
        let expected = checked_byte_size(self.zones, self.data_type.size_bytes()?)?;
        let zones = self.zones;
        let dataset = self.dataset.as_ref().ok_or_else(|| {
            OmxError::State(format!("zonal reference '{}' is closed", self.name))
        })?;
        validate_buffer_len(buffer_len, expected, "reference buffer")?;

        let space = self.space.get_or_insert_with(|| Dataspace::simple(&[zones]));
        Ok((dataset, &*space))
    }

    /// Write the whole vector from `zones` little-endian elements
    pub fn write_reference(&mut self, buffer: &[u8]) -> Result<()> {
        let (dataset, space) = self.select_all(buffer.len())?;
        dataset.write(space, space, buffer)
    }

    /// Read the whole vector into `zones` little-endian elements
    pub fn read_reference(&mut self, buffer: &mut [u8]) -> Result<()> {
        let (dataset, space) = self.select_all(buffer.len())?;
        dataset.read(space, space, buffer)
    }

    pub fn write_reference_typed<T: OmxElement>(&mut self, values: &[T]) -> Result<()> {
        self.require_numeric(T::DATA_TYPE)?;
        let mut buffer = vec![0u8; checked_byte_size(values.len() as u64, T::size_bytes())?];
        T::write_le(values, &mut buffer);
        self.write_reference(&buffer)
    }

    pub fn read_reference_typed<T: OmxElement>(&mut self, out: &mut [T]) -> Result<()> {
        self.require_numeric(T::DATA_TYPE)?;
        let mut buffer = vec![0u8; checked_byte_size(out.len() as u64, T::size_bytes())?];
        self.read_reference(&mut buffer)?;
        T::read_le(&buffer, out);
        Ok(())
    }

    pub fn read_reference_vec<T: OmxElement>(&mut self) -> Result<Vec<T>> {
        let mut out = vec![T::zeroed(); self.zones as usize];
        self.read_reference_typed(&mut out)?;
        Ok(out)
    }

    /// Write one string per zone
    pub fn write_string_reference<S: AsRef<str>>(&mut self, values: &[S]) -> Result<()> {
        self.require_string()?;
        if values.len() as u64 != self.zones {
            return Err(OmxError::SizeMismatch(format!(
                "{} values given for zonal reference '{}' of {} zones",
                values.len(),
                self.name,
                self.zones
            )));
        }
        self.dataset()?.write_strings(values)
    }

    /// Read one string per zone
    pub fn read_string_reference(&self) -> Result<Vec<String>> {
        self.require_string()?;
        self.dataset()?.read_strings()
    }

    /// Zeroed buffer sized for the whole vector
    ///
    /// String references have no fixed-size buffer.
    pub fn create_reference_buffer(&self) -> Result<Vec<u8>> {
        self.require_numeric(self.data_type)?;
        Ok(vec![0; checked_byte_size(self.zones, self.data_type.size_bytes()?)?])
    }

    /// Bind to `dataset` again after a failed release
    pub(crate) fn bind(&mut self, dataset: DatasetHandle) {
        self.space = None;
        self.dataset = Some(dataset);
    }

    /// Release the dataset and the cached selection
    pub fn close(&mut self) -> Result<()> {
        self.space = None;
        if let Some(dataset) = self.dataset.take() {
            let result = dataset.flush();
            debug!(reference = %self.name, "closed zonal reference");
            result?;
        }
        Ok(())
    }
}

impl ZonalDataset for ZonalReference {
    fn name(&self) -> &str {
        &self.name
    }

    fn data_type(&self) -> LogicalType {
        self.data_type
    }

    fn zones(&self) -> u64 {
        self.zones
    }

    fn compression_level(&self) -> CompressionLevel {
        self.compression
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DatasetProperties, OpenMode, StoreFile};
    use omx_core::ErrorKind;

    fn scratch(zones: u64, data_type: LogicalType) -> (tempfile::TempDir, ZonalReference) {
        let dir = tempfile::tempdir().unwrap();
        let file = StoreFile::open(dir.path().join("zonal.omx"), OpenMode::Truncate).unwrap();
        let dataset = file
            .create_dataset(
                "/r",
                DatasetProperties {
                    dtype: registry::store_type(data_type).unwrap(),
                    dims: vec![zones],
                    chunk: vec![zones.max(1)],
                    compression: CompressionLevel::Level2,
                },
            )
            .unwrap();
        (dir, ZonalReference::from_dataset("r", dataset, zones).unwrap())
    }

    #[test]
    fn test_numeric_reference() {
        let (_dir, mut reference) = scratch(5, LogicalType::Float);
        assert_eq!(reference.data_size(), 20);
        assert_eq!(reference.create_reference_buffer().unwrap().len(), 20);

        reference
            .write_reference_typed(&[0.5f32, 1.5, 2.5, 3.5, 4.5])
            .unwrap();
        assert_eq!(
            reference.read_reference_vec::<f32>().unwrap(),
            vec![0.5, 1.5, 2.5, 3.5, 4.5]
        );

        let err = reference.write_reference(&[0u8; 16]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SizeMismatch);
        let err = reference.read_string_reference().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDataType);
        let err = reference.write_reference_typed(&[0f64; 5]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDataType);
    }

    #[test]
    fn test_string_reference() {
        let (_dir, mut reference) = scratch(3, LogicalType::String);
        assert_eq!(reference.data_size(), 0);

        let err = reference.create_reference_buffer().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDataType);
        let err = reference.write_reference(&[0u8; 3]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDataType);

        let err = reference.write_string_reference(&["a", "b"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SizeMismatch);

        reference
            .write_string_reference(&["north", "south", "east"])
            .unwrap();
        assert_eq!(
            reference.read_string_reference().unwrap(),
            vec!["north", "south", "east"]
        );

        reference.close().unwrap();
        let err = reference.read_string_reference().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
    }
}
