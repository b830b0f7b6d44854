//! OMX container files
//!
//! [`OmxFile`] owns the container lifecycle: it creates or validates the
//! version and zone attributes, rebuilds the matrix and zonal reference
//! collections on open and chooses chunk shapes for new datasets.

use std::path::{Path, PathBuf};

use omx_core::format::constants::engine::ROOT_PATH;
use omx_core::format::constants::{
    DEFAULT_MATRIX_TYPE, MATRICES_PATH, VERSION_ATTRIBUTE, ZONAL_REFERENCES_PATH, ZONES_ATTRIBUTE,
};
use omx_core::validation::is_valid_dataset_name;
use omx_core::{CompressionLevel, FormatVersion, LogicalType, OmxError, Result, ZonalDataset};
use tracing::{debug, info, warn};

use crate::attributes::AttributeCollection;
use crate::collection::{EntryKind, NamedCollection};
use crate::config::ContainerConfig;
use crate::matrix::Matrix;
use crate::registry;
use crate::store::{DatasetHandle, DatasetProperties, OpenMode, StoreFile};
use crate::zonal::ZonalReference;

/// Contents of an open container
#[derive(Debug)]
struct OpenContainer {
    store: StoreFile,
    version: FormatVersion,
    zones: u64,
    attributes: AttributeCollection,
    matrices: NamedCollection<Matrix>,
    references: NamedCollection<ZonalReference>,
}

#[derive(Debug)]
enum FileState {
    Unopened,
    Open(Box<OpenContainer>),
    Closed,
}

/// An OMX container: square matrices and zonal references over one zone
/// system, plus root attributes
///
/// A container starts unopened, becomes open through one of the `open*`
/// methods and is closed by [`close`](Self::close) or on drop. A closed
/// container cannot be reopened; construct a new `OmxFile` instead.
#[derive(Debug)]
pub struct OmxFile {
    filename: PathBuf,
    config: ContainerConfig,
    state: FileState,
}

impl OmxFile {
    /// Unopened container for `filename` with the default configuration
    pub fn new<P: AsRef<Path>>(filename: P) -> Self {
        Self::with_config(filename, ContainerConfig::default())
    }

    pub fn with_config<P: AsRef<Path>>(filename: P, config: ContainerConfig) -> Self {
        Self {
            filename: filename.as_ref().to_path_buf(),
            config,
            state: FileState::Unopened,
        }
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    fn require_unopened(&self) -> Result<()> {
        match self.state {
            FileState::Unopened => Ok(()),
            FileState::Open(_) => Err(OmxError::State(format!(
                "'{}' is already open",
                self.filename.display()
            ))),
            FileState::Closed => Err(OmxError::State(format!(
                "'{}' has been closed and cannot be reopened",
                self.filename.display()
            ))),
        }
    }

    fn container(&self) -> Result<&OpenContainer> {
        match &self.state {
            FileState::Open(container) => Ok(&**container),
            _ => Err(self.not_open()),
        }
    }

    fn container_mut(&mut self) -> Result<&mut OpenContainer> {
        let closed = matches!(self.state, FileState::Closed);
        match &mut self.state {
            FileState::Open(container) => Ok(&mut **container),
            _ => Err(not_open(&self.filename, closed)),
        }
    }

    fn not_open(&self) -> OmxError {
        not_open(&self.filename, matches!(self.state, FileState::Closed))
    }

    /// Open an existing container for reading and writing
    pub fn open(&mut self) -> Result<()> {
        self.open_existing(OpenMode::ReadWrite)
    }

    /// Open an existing container for reading only
    pub fn open_read_only(&mut self) -> Result<()> {
        self.open_existing(OpenMode::ReadOnly)
    }

    /// Create a container with `zones` zones, destroying any existing file
    pub fn open_with_truncate(&mut self, zones: u64) -> Result<()> {
        self.require_unopened()?;

        let store = StoreFile::open(&self.filename, OpenMode::Truncate)?;
        let mut attributes = AttributeCollection::new(store.clone(), ROOT_PATH);
        attributes.set_string(VERSION_ATTRIBUTE, FormatVersion::CURRENT.as_str())?;
        attributes.set(ZONES_ATTRIBUTE, zones)?;
        store.create_group(MATRICES_PATH, true)?;
        store.create_group(ZONAL_REFERENCES_PATH, true)?;
        store.flush()?;

        info!(file = %self.filename.display(), zones, "created container");
        self.state = FileState::Open(Box::new(OpenContainer {
            store,
            version: FormatVersion::CURRENT,
            zones,
            attributes,
            matrices: NamedCollection::new(EntryKind::MATRIX),
            references: NamedCollection::new(EntryKind::ZONAL_REFERENCE),
        }));
        Ok(())
    }

    /// Open the container read-write if it exists, else create it with `zones` zones
    pub fn open_with_create(&mut self, zones: u64) -> Result<()> {
        if self.filename.exists() {
            self.open()
        } else {
            self.open_with_truncate(zones)
        }
    }

    fn open_existing(&mut self, mode: OpenMode) -> Result<()> {
        self.require_unopened()?;

        let store = StoreFile::open(&self.filename, mode)?;
        let attributes = AttributeCollection::new(store.clone(), ROOT_PATH);

        if !attributes.has(VERSION_ATTRIBUTE)? {
            return Err(OmxError::Format(format!(
                "'{}' does not specify a version",
                self.filename.display()
            )));
        }
        let version_text = attributes.get::<String>(VERSION_ATTRIBUTE).map_err(|e| {
            OmxError::Format(format!("unreadable version attribute: {e}"))
        })?;
        let version = FormatVersion::parse(&version_text).ok_or_else(|| {
            OmxError::Format(format!("unsupported version '{version_text}'"))
        })?;

        let zones = attributes
            .get::<u64>(ZONES_ATTRIBUTE)
            .map_err(|e| OmxError::Format(format!("unable to read zone information: {e}")))?;

        let matrices = load_entries(&store, EntryKind::MATRIX, zones, Matrix::from_dataset)?;
        let references = load_entries(
            &store,
            EntryKind::ZONAL_REFERENCE,
            zones,
            ZonalReference::from_dataset,
        )?;

        info!(
            file = %self.filename.display(),
            ?mode,
            zones,
            matrices = matrices.len(),
            references = references.len(),
            "opened container"
        );
        self.state = FileState::Open(Box::new(OpenContainer {
            store,
            version,
            zones,
            attributes,
            matrices,
            references,
        }));
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, FileState::Open(_))
    }

    pub fn is_read_only(&self) -> Result<bool> {
        Ok(!self.container()?.store.is_writable())
    }

    pub fn filename(&self) -> Result<&Path> {
        self.container()?;
        Ok(&self.filename)
    }

    pub fn version(&self) -> Result<FormatVersion> {
        Ok(self.container()?.version)
    }

    pub fn zones(&self) -> Result<u64> {
        Ok(self.container()?.zones)
    }

    /// Compression applied when a dataset is added without an explicit level
    pub fn default_compression_level(&self) -> Result<CompressionLevel> {
        self.container()?;
        Ok(self.config.default_compression)
    }

    /// Physical size of the container file in bytes
    pub fn file_size(&self) -> Result<u64> {
        self.container()?.store.file_size()
    }

    /// Root attributes
    pub fn attributes(&self) -> Result<&AttributeCollection> {
        Ok(&self.container()?.attributes)
    }

    pub fn attributes_mut(&mut self) -> Result<&mut AttributeCollection> {
        Ok(&mut self.container_mut()?.attributes)
    }

    /// Whether `name` can name a new matrix
    pub fn is_valid_matrix_name(&self, name: &str) -> bool {
        is_valid_dataset_name(name)
    }

    /// Add a `Double` matrix named `matrix{n}`, `n` being the new matrix count
    pub fn add_matrix_default(&mut self) -> Result<&mut Matrix> {
        let name = format!("matrix{}", self.matrix_count()? + 1);
        self.add_matrix_named(&name)
    }

    /// Add a `Double` matrix
    pub fn add_matrix_named(&mut self, name: &str) -> Result<&mut Matrix> {
        self.add_matrix(name, DEFAULT_MATRIX_TYPE)
    }

    /// Add a matrix using the default compression level
    pub fn add_matrix(&mut self, name: &str, data_type: LogicalType) -> Result<&mut Matrix> {
        let compression = self.config.default_compression;
        self.add_matrix_compressed(name, data_type, compression)
    }

    pub fn add_matrix_compressed(
        &mut self,
        name: &str,
        data_type: LogicalType,
        compression: CompressionLevel,
    ) -> Result<&mut Matrix> {
        let budget = self.config.chunk_budget;
        let container = self.container_mut()?;
        container.matrices.validate_new(name, data_type)?;

        let zones = container.zones;
        let chunk = budget.matrix_chunk(zones, data_type.size_bytes()?, compression);
        let dataset = container.create_dataset(
            &EntryKind::MATRIX,
            name,
            data_type,
            vec![zones, zones],
            chunk.to_vec(),
            compression,
        )?;
        let matrix = Matrix::from_dataset(name, dataset, zones)?;
        container.matrices.add(matrix)
    }

    pub fn remove_matrix(&mut self, name: &str) -> Result<()> {
        let container = self.container_mut()?;
        container.require_writable()?;
        let store = &container.store;
        container
            .matrices
            .remove(name, |matrix| detach(store, &EntryKind::MATRIX, matrix))?;
        Ok(())
    }

    /// Remove the matrix at a creation-order index
    pub fn remove_matrix_at(&mut self, index: usize) -> Result<()> {
        let container = self.container_mut()?;
        container.require_writable()?;
        let store = &container.store;
        container
            .matrices
            .remove_at(index, |matrix| detach(store, &EntryKind::MATRIX, matrix))?;
        Ok(())
    }

    pub fn matrix(&self, name: &str) -> Result<&Matrix> {
        self.container()?.matrices.get(name)
    }

    pub fn matrix_mut(&mut self, name: &str) -> Result<&mut Matrix> {
        self.container_mut()?.matrices.get_mut(name)
    }

    pub fn matrix_at(&self, index: usize) -> Result<&Matrix> {
        self.container()?.matrices.get_at(index)
    }

    pub fn matrix_at_mut(&mut self, index: usize) -> Result<&mut Matrix> {
        self.container_mut()?.matrices.get_at_mut(index)
    }

    /// Matrix names in creation order
    pub fn matrix_names(&self) -> Result<Vec<String>> {
        Ok(self.container()?.matrices.names())
    }

    pub fn matrix_exists(&self, name: &str) -> Result<bool> {
        Ok(self.container()?.matrices.exists(name))
    }

    pub fn matrix_count(&self) -> Result<usize> {
        Ok(self.container()?.matrices.len())
    }

    /// Add a zonal reference using the default compression level
    pub fn add_zonal_reference(&mut self, name: &str, data_type: LogicalType) -> Result<&mut ZonalReference> {
        let compression = self.config.default_compression;
        self.add_zonal_reference_compressed(name, data_type, compression)
    }

    pub fn add_zonal_reference_compressed(
        &mut self,
        name: &str,
        data_type: LogicalType,
        compression: CompressionLevel,
    ) -> Result<&mut ZonalReference> {
        let budget = self.config.chunk_budget;
        let container = self.container_mut()?;
        container.references.validate_new(name, data_type)?;

        let zones = container.zones;
        let chunk = budget.reference_chunk(zones, data_type.size_bytes()?, compression);
        let dataset = container.create_dataset(
            &EntryKind::ZONAL_REFERENCE,
            name,
            data_type,
            vec![zones],
            chunk.to_vec(),
            compression,
        )?;
        let reference = ZonalReference::from_dataset(name, dataset, zones)?;
        container.references.add(reference)
    }

    pub fn remove_zonal_reference(&mut self, name: &str) -> Result<()> {
        let container = self.container_mut()?;
        container.require_writable()?;
        let store = &container.store;
        container.references.remove(name, |reference| {
            detach(store, &EntryKind::ZONAL_REFERENCE, reference)
        })?;
        Ok(())
    }

    pub fn zonal_reference(&self, name: &str) -> Result<&ZonalReference> {
        self.container()?.references.get(name)
    }

    pub fn zonal_reference_mut(&mut self, name: &str) -> Result<&mut ZonalReference> {
        self.container_mut()?.references.get_mut(name)
    }

    pub fn zonal_reference_at(&self, index: usize) -> Result<&ZonalReference> {
        self.container()?.references.get_at(index)
    }

    pub fn zonal_reference_at_mut(&mut self, index: usize) -> Result<&mut ZonalReference> {
        self.container_mut()?.references.get_at_mut(index)
    }

    /// Zonal reference names in creation order
    pub fn zonal_reference_names(&self) -> Result<Vec<String>> {
        Ok(self.container()?.references.names())
    }

    pub fn zonal_reference_exists(&self, name: &str) -> Result<bool> {
        Ok(self.container()?.references.exists(name))
    }

    pub fn zonal_reference_count(&self) -> Result<usize> {
        Ok(self.container()?.references.len())
    }

    /// Write all buffered data and metadata to disk
    pub fn flush(&self) -> Result<()> {
        self.container()?.store.flush()
    }

    /// Release every entry and close the file
    ///
    /// Closing an unopened or already closed container does nothing.
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, FileState::Closed) {
            FileState::Open(container) => {
                debug!(file = %self.filename.display(), "closing container");
                container.close()
            }
            FileState::Unopened => {
                self.state = FileState::Unopened;
                Ok(())
            }
            FileState::Closed => Ok(()),
        }
    }
}

impl Drop for OmxFile {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(file = %self.filename.display(), error = %err, "failed to close container on drop");
        }
    }
}

impl OpenContainer {
    fn require_writable(&self) -> Result<()> {
        if !self.store.is_writable() {
            return Err(OmxError::State("container is open read-only".into()));
        }
        Ok(())
    }

    fn create_dataset(
        &self,
        kind: &EntryKind,
        name: &str,
        data_type: LogicalType,
        dims: Vec<u64>,
        chunk: Vec<u64>,
        compression: CompressionLevel,
    ) -> Result<DatasetHandle> {
        self.require_writable()?;
        self.store.create_dataset(
            &kind.dataset_path(name),
            DatasetProperties {
                dtype: registry::store_type(data_type)?,
                dims,
                chunk,
                compression,
            },
        )
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        let mut first_error = None;
        for matrix in self.matrices.iter_mut() {
            if let Err(err) = matrix.close() {
                first_error.get_or_insert(err);
            }
        }
        for reference in self.references.iter_mut() {
            if let Err(err) = reference.close() {
                first_error.get_or_insert(err);
            }
        }
        self.matrices.clear();
        self.references.clear();

        if let Err(err) = self.store.close() {
            first_error.get_or_insert(err);
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn not_open(filename: &Path, closed: bool) -> OmxError {
    if closed {
        OmxError::State(format!("'{}' has been closed", filename.display()))
    } else {
        OmxError::State(format!("'{}' was not properly opened", filename.display()))
    }
}

/// Unlink an entry's dataset, then release its handles
/// Release an entry's handle, then unlink its dataset
///
/// On failure the entry stays in its collection, bound again to the
/// dataset when the dataset still exists.
fn detach<T: Detachable>(store: &StoreFile, kind: &EntryKind, entry: &mut T) -> Result<()> {
    let path = kind.dataset_path(entry.name());
    if let Err(err) = entry.release().and_then(|()| store.delete(&path)) {
        if let Ok(dataset) = store.open_dataset(&path) {
            entry.reattach(dataset);
        }
        warn!(kind = kind.label, name = entry.name(), error = %err, "failed to remove entry");
        return Err(err);
    }
    debug!(kind = kind.label, name = entry.name(), "removed entry");
    Ok(())
}

/// Entities whose handles can be released on removal
trait Detachable: ZonalDataset {
    fn release(&mut self) -> Result<()>;
    fn reattach(&mut self, dataset: DatasetHandle);
}

impl Detachable for Matrix {
    fn release(&mut self) -> Result<()> {
        self.close()
    }

    fn reattach(&mut self, dataset: DatasetHandle) {
        self.bind(dataset);
    }
}

impl Detachable for ZonalReference {
    fn release(&mut self) -> Result<()> {
        self.close()
    }

    fn reattach(&mut self, dataset: DatasetHandle) {
        self.bind(dataset);
    }
}

/// Rebuild a collection from the datasets under its group
fn load_entries<T: ZonalDataset>(
    store: &StoreFile,
    kind: EntryKind,
    zones: u64,
    wrap: fn(&str, DatasetHandle, u64) -> Result<T>,
) -> Result<NamedCollection<T>> {
    let group = store.open_group(kind.parent_path).map_err(|e| {
        OmxError::Format(format!("missing {} group '{}': {e}", kind.label, kind.parent_path))
    })?;

    let mut collection = NamedCollection::new(kind);
    for name in group.child_names_ordered()? {
        let dataset = store.open_dataset(&kind.dataset_path(&name))?;
        collection.add(wrap(&name, dataset, zones)?)?;
    }
    Ok(collection)
}
