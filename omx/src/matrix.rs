//! Square zone-to-zone matrices with row-addressed I/O

use omx_core::validation::{checked_byte_size, validate_buffer_len, validate_row_index};
use omx_core::{CompressionLevel, LogicalType, OmxElement, OmxError, Result, ZonalDataset};
use tracing::debug;

use crate::attributes::AttributeCollection;
use crate::registry;
use crate::store::{Dataspace, DatasetHandle};

/// A `zones` x `zones` matrix of one numeric type
///
/// Rows are the unit of I/O. The row selection handles are created on
/// first use and reused until the matrix is closed.
#[derive(Debug)]
pub struct Matrix {
    name: String,
    data_type: LogicalType,
    zones: u64,
    compression: CompressionLevel,
    dataset: Option<DatasetHandle>,
    memspace: Option<Dataspace>,
    filespace: Option<Dataspace>,
    attributes: AttributeCollection,
}

impl Matrix {
    /// Wrap an open dataset, checking it has the container's shape
    pub(crate) fn from_dataset(name: &str, dataset: DatasetHandle, zones: u64) -> Result<Self> {
        let data_type = registry::logical_type(&dataset.dtype());
        if dataset.dims() != [zones, zones] {
            return Err(OmxError::Format(format!(
                "matrix '{name}' has shape {:?}, expected [{zones}, {zones}]",
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
            memspace: None,
            filespace: None,
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

    fn row_bytes(&self) -> Result<usize> {
        checked_byte_size(self.zones, self.data_type.size_bytes()?)
    }

    fn check_type(&self, data_type: LogicalType) -> Result<()> {
        if data_type != self.data_type {
            return Err(OmxError::InvalidDataType(format!(
                "matrix '{}' holds {}, not {data_type}",
                self.name, self.data_type
            )));
        }
        Ok(())
    }

    /// Select `row` and hand out the cached selection handles
    fn select_row(&mut self, row: u64, buffer_len: usize) -> Result<(&DatasetHandle, &Dataspace, &Dataspace)> {
        let zones = self.zones;
        let row_bytes = self.row_bytes()?;
        let dataset = self
            .dataset
            .as_ref()
            .ok_or_else(|| OmxError::State(format!("matrix '{}' is closed", self.name)))?;

        validate_row_index(row, zones)?;
        validate_buffer_len(buffer_len, row_bytes, "row buffer")?;

        let memspace = self.memspace.get_or_insert_with(|| Dataspace::simple(&[zones]));
        let filespace = self.filespace.get_or_insert_with(|| dataset.space());
        filespace.select_hyperslab(&[row, 0], &[1, zones])?;
        Ok((dataset, &*memspace, &*filespace))
    }

    /// Write one row from a buffer of `zones` little-endian elements
    pub fn write_row(&mut self, row: u64, buffer: &[u8]) -> Result<()> {
        let (dataset, memspace, filespace) = self.select_row(row, buffer.len())?;
        dataset.write(memspace, filespace, buffer)
    }

    /// Write one row, stating the buffer's element type
    pub fn write_row_as(&mut self, row: u64, data_type: LogicalType, buffer: &[u8]) -> Result<()> {
        self.check_type(data_type)?;
        self.write_row(row, buffer)
    }

    /// Write one row of typed values
    pub fn write_row_typed<T: OmxElement>(&mut self, row: u64, values: &[T]) -> Result<()> {
        self.check_type(T::DATA_TYPE)?;
        let mut buffer = vec![0u8; checked_byte_size(values.len() as u64, T::size_bytes())?];
        T::write_le(values, &mut buffer);
        self.write_row(row, &buffer)
    }

    /// Read one row into a buffer of `zones` little-endian elements
    pub fn read_row(&mut self, row: u64, buffer: &mut [u8]) -> Result<()> {
        let (dataset, memspace, filespace) = self.select_row(row, buffer.len())?;
        dataset.read(memspace, filespace, buffer)
    }

    /// Read one row, stating the buffer's element type
    pub fn read_row_as(&mut self, row: u64, data_type: LogicalType, buffer: &mut [u8]) -> Result<()> {
        self.check_type(data_type)?;
        self.read_row(row, buffer)
    }

    /// Read one row into typed values
    pub fn read_row_typed<T: OmxElement>(&mut self, row: u64, out: &mut [T]) -> Result<()> {
        self.check_type(T::DATA_TYPE)?;
        let mut buffer = vec![0u8; checked_byte_size(out.len() as u64, T::size_bytes())?];
        self.read_row(row, &mut buffer)?;
        T::read_le(&buffer, out);
        Ok(())
    }

    pub fn read_row_vec<T: OmxElement>(&mut self, row: u64) -> Result<Vec<T>> {
        let mut out = vec![T::zeroed(); self.zones as usize];
        self.read_row_typed(row, &mut out)?;
        Ok(out)
    }

    /// Zeroed buffer sized for one row
    pub fn create_row_buffer(&self) -> Result<Vec<u8>> {
        Ok(vec![0; self.row_bytes()?])
    }

    /// Zeroed buffer sized for the whole matrix
    pub fn create_full_buffer(&self) -> Result<Vec<u8>> {
        let cells = self
            .zones
            .checked_mul(self.zones)
            .ok_or_else(|| OmxError::Resource("matrix size overflows".into()))?;
        Ok(vec![0; checked_byte_size(cells, self.data_type.size_bytes()?)?])
    }

    /// Bind to `dataset` again after a failed release
    pub(crate) fn bind(&mut self, dataset: DatasetHandle) {
        self.memspace = None;
        self.filespace = None;
        self.dataset = Some(dataset);
    }

    /// Release the dataset and the cached selections
    pub fn close(&mut self) -> Result<()> {
        self.memspace = None;
        self.filespace = None;
        if let Some(dataset) = self.dataset.take() {
            let result = dataset.flush();
            debug!(matrix = %self.name, "closed matrix");
            result?;
        }
        Ok(())
    }
}

impl ZonalDataset for Matrix {
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

    fn scratch(zones: u64, data_type: LogicalType) -> (tempfile::TempDir, Matrix) {
        let dir = tempfile::tempdir().unwrap();
        let file = StoreFile::open(dir.path().join("matrix.omx"), OpenMode::Truncate).unwrap();
        let dataset = file
            .create_dataset(
                "/m",
                DatasetProperties {
                    dtype: registry::store_type(data_type).unwrap(),
                    dims: vec![zones, zones],
                    chunk: vec![3.min(zones).max(1), zones.max(1)],
                    compression: CompressionLevel::NoCompression,
                },
            )
            .unwrap();
        (dir, Matrix::from_dataset("m", dataset, zones).unwrap())
    }

    #[test]
    fn test_typed_rows() {
        let (_dir, mut matrix) = scratch(7, LogicalType::Int32);
        for row in 0..7 {
            let values: Vec<i32> = (0..7).map(|col| row as i32 * 100 - col).collect();
            matrix.write_row_typed(row, &values).unwrap();
        }
        assert_eq!(matrix.read_row_vec::<i32>(3).unwrap(), vec![300, 299, 298, 297, 296, 295, 294]);
        assert_eq!(matrix.data_size(), 28);
    }

    #[test]
    fn test_row_errors() {
        let (_dir, mut matrix) = scratch(4, LogicalType::Double);
        let mut buffer = matrix.create_row_buffer().unwrap();
        assert_eq!(buffer.len(), 32);
        assert_eq!(matrix.create_full_buffer().unwrap().len(), 128);

        let err = matrix.read_row(4, &mut buffer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);

        let err = matrix.write_row(0, &buffer[..31]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SizeMismatch);

        let err = matrix.write_row_as(0, LogicalType::Float, &buffer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDataType);

        let err = matrix.write_row_typed(0, &[1i64; 4]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDataType);

        matrix.write_row_as(0, LogicalType::Double, &buffer).unwrap();
    }

    #[test]
    fn test_closed_matrix() {
        let (_dir, mut matrix) = scratch(2, LogicalType::UInt8);
        matrix.write_row(1, &[1, 2]).unwrap();
        matrix.close().unwrap();
        matrix.close().unwrap();
        assert!(matrix.is_closed());

        let err = matrix.read_row(1, &mut [0, 0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[test]
    fn test_empty_matrix() {
        let (_dir, mut matrix) = scratch(0, LogicalType::Double);
        assert!(matrix.create_row_buffer().unwrap().is_empty());
        let err = matrix.read_row(0, &mut []).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }
}
