//! Hierarchical typed array store
//!
//! A single-file engine holding groups, N-dimensional chunked datasets and
//! typed attributes. The layout is:
//!
//! ```text
//! [superblock: 64 bytes][chunk blobs ...][catalog (JSON, padded)][chunk blobs ...]
//! ```
//!
//! A rewritten chunk stays in its old extent when the new blob fits and
//! moves otherwise, returning the old extent to the catalog's free list.
//! New blobs take the first free extent large enough before growing the
//! file. The catalog is rewritten in place while it fits its reserved
//! extent; free space at the end of the file is truncated on flush.

mod catalog;
mod chunk;
mod file_io;
mod space;
mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hashbrown::HashMap;
use omx_core::{CompressionLevel, OmxError, Result, Superblock};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use catalog::{AttributeRecord, Catalog, ChunkRecord, DatasetNode, GroupNode, Node};

/// Smallest extent reserved for the catalog
const MIN_CATALOG_EXTENT: u64 = 256;
use chunk::{ChunkCache, ChunkGrid};
use file_io::Backing;

pub use catalog::IterOrder;
pub use space::{Dataspace, Hyperslab};
pub use types::{ByteOrder, StoreType, StringSize};

/// How to open a store file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file, no modification allowed
    ReadOnly,
    /// Existing file, read and write
    ReadWrite,
    /// Create the file, destroying any previous content
    Truncate,
}

/// Creation properties of a dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetProperties {
    pub dtype: StoreType,
    pub dims: Vec<u64>,
    pub chunk: Vec<u64>,
    pub compression: CompressionLevel,
}

impl DatasetProperties {
    fn from_node(node: &DatasetNode) -> Result<Self> {
        let compression = CompressionLevel::from_u8(node.compression).ok_or_else(|| {
            OmxError::Format(format!("unsupported compression level {}", node.compression))
        })?;
        Ok(Self {
            dtype: node.dtype,
            dims: node.dims.clone(),
            chunk: node.chunk.clone(),
            compression,
        })
    }

    fn validate(&self) -> Result<()> {
        if !self.dtype.is_well_formed() {
            return Err(OmxError::InvalidDataType(format!(
                "unsupported element type {:?}",
                self.dtype
            )));
        }
        if self.dims.is_empty() || self.dims.len() != self.chunk.len() {
            return Err(OmxError::Range(format!(
                "chunk rank {} does not match dataset rank {}",
                self.chunk.len(),
                self.dims.len()
            )));
        }
        if self.chunk.contains(&0) {
            return Err(OmxError::Range("chunk dimensions must be at least 1".into()));
        }
        if self.dtype.is_string() && self.dims.len() != 1 {
            return Err(OmxError::InvalidDataType(
                "string datasets must be one-dimensional".into(),
            ));
        }
        Ok(())
    }

    /// Bytes in one decoded chunk
    fn chunk_bytes(&self) -> Result<usize> {
        let element = self.dtype.element_size().unwrap_or(1);
        ChunkGrid::new(&self.dims, &self.chunk)
            .chunk_elements()
            .checked_mul(element as u64)
            .and_then(|bytes| usize::try_from(bytes).ok())
            .ok_or_else(|| OmxError::Resource("chunk size overflows".into()))
    }
}

struct StoreInner {
    path: PathBuf,
    backing: Backing,
    superblock: Superblock,
    catalog: Catalog,
    caches: HashMap<String, ChunkCache>,
    dirty: bool,
    closed: bool,
}

impl StoreInner {
    fn require_writable(&self) -> Result<()> {
        if !self.backing.is_writable() {
            return Err(OmxError::State(format!(
                "'{}' is open read-only",
                self.path.display()
            )));
        }
        Ok(())
    }

    /// Reserve `size` bytes, reusing free space before growing the file
    fn allocate(&mut self, size: u64) -> Result<u64> {
        if let Some(offset) = self.catalog.free.take(size) {
            return Ok(offset);
        }
        let offset = self.superblock.data_end;
        self.superblock.data_end = offset
            .checked_add(size)
            .ok_or_else(|| OmxError::Resource("file offset overflows".into()))?;
        Ok(offset)
    }

    fn release(&mut self, extent: ChunkRecord) {
        self.catalog.free.give(extent);
        self.superblock.data_end = self.catalog.free.trim_tail(self.superblock.data_end);
    }

    /// Write `bytes` as a blob, staying in `existing` when it is large enough
    fn place(&mut self, existing: Option<ChunkRecord>, bytes: &[u8]) -> Result<ChunkRecord> {
        let size = bytes.len() as u64;
        let offset = match existing {
            Some(record) if size <= record.size => {
                self.release(ChunkRecord {
                    offset: record.offset + size,
                    size: record.size - size,
                });
                record.offset
            }
            Some(record) => {
                self.release(record);
                self.allocate(size)?
            }
            None => self.allocate(size)?,
        };
        self.backing.write_at(offset, bytes)?;
        Ok(ChunkRecord { offset, size })
    }

    fn load_chunk(&mut self, path: &str, index: u64, props: &DatasetProperties) -> Result<Vec<u8>> {
        let chunk_bytes = props.chunk_bytes()?;
        let Some(record) = self.catalog.dataset(path)?.chunks.get(&index).copied() else {
            return Ok(vec![0; chunk_bytes]);
        };

        let stored = self.backing.read_at(record.offset, record.size as usize)?;
        let data = chunk::decode(&stored, props.compression)?;
        if data.len() != chunk_bytes {
            return Err(OmxError::Format(format!(
                "chunk {index} of '{path}' holds {} bytes, expected {chunk_bytes}",
                data.len()
            )));
        }
        Ok(data)
    }

    fn store_chunk(&mut self, path: &str, cache: &ChunkCache) -> Result<()> {
        if !cache.dirty {
            return Ok(());
        }

        let node = self.catalog.dataset(path)?;
        let compression = CompressionLevel::from_u8(node.compression).unwrap_or_default();
        let existing = node.chunks.get(&cache.index).copied();

        let stored = chunk::encode(&cache.data, compression)?;
        let record = self.place(existing, &stored)?;
        self.catalog
            .dataset_mut(path)?
            .chunks
            .insert(cache.index, record);
        self.dirty = true;

        trace!(path, chunk = cache.index, bytes = record.size, "stored chunk");
        Ok(())
    }

    /// Take the cached chunk `index` of `path`, loading it when needed
    fn cached_chunk(&mut self, path: &str, index: u64, props: &DatasetProperties) -> Result<ChunkCache> {
        if let Some(cache) = self.caches.remove(path) {
            if cache.index == index {
                return Ok(cache);
            }
            if let Err(err) = self.store_chunk(path, &cache) {
                self.caches.insert(path.to_owned(), cache);
                return Err(err);
            }
        }

        let data = self.load_chunk(path, index, props)?;
        Ok(ChunkCache {
            index,
            data,
            dirty: false,
        })
    }

    fn write_selection(&mut self, path: &str, props: &DatasetProperties, slab: &Hyperslab, bytes: &[u8]) -> Result<()> {
        let element = props.dtype.element_size().unwrap_or(1);
        let grid = ChunkGrid::new(&props.dims, &props.chunk);

        for coords in grid.chunks_for(slab) {
            let index = grid.linear_index(&coords);
            let mut cache = self.cached_chunk(path, index, props)?;
            grid.for_each_run(&coords, slab, element, |at, from, len| {
                cache.data[at..at + len].copy_from_slice(&bytes[from..from + len]);
            });
            cache.dirty = true;
            self.caches.insert(path.to_owned(), cache);
        }
        Ok(())
    }

    fn read_selection(&mut self, path: &str, props: &DatasetProperties, slab: &Hyperslab, out: &mut [u8]) -> Result<()> {
        let element = props.dtype.element_size().unwrap_or(1);
        let grid = ChunkGrid::new(&props.dims, &props.chunk);

        for coords in grid.chunks_for(slab) {
            let index = grid.linear_index(&coords);
            let cache = self.cached_chunk(path, index, props)?;
            grid.for_each_run(&coords, slab, element, |at, to, len| {
                out[to..to + len].copy_from_slice(&cache.data[at..at + len]);
            });
            self.caches.insert(path.to_owned(), cache);
        }
        Ok(())
    }

    fn flush_cache(&mut self, path: &str) -> Result<()> {
        if let Some(mut cache) = self.caches.remove(path) {
            let result = self.store_chunk(path, &cache);
            if result.is_ok() {
                cache.dirty = false;
            }
            self.caches.insert(path.to_owned(), cache);
            result?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.backing.is_writable() {
            return Ok(());
        }

        let paths: Vec<String> = self
            .caches
            .iter()
            .filter(|(_, cache)| cache.dirty)
            .map(|(path, _)| path.clone())
            .collect();
        for path in paths {
            self.flush_cache(&path)?;
        }

        if !self.dirty {
            return Ok(());
        }

        let json = self.write_catalog()?;
        self.backing.write_at(0, &self.superblock.to_bytes())?;
        self.backing.truncate_and_sync(self.superblock.data_end)?;
        self.dirty = false;

        debug!(
            path = %self.path.display(),
            catalog_bytes = json,
            free_bytes = self.catalog.free.total(),
            "flushed store"
        );
        Ok(())
    }

    /// Write the catalog into its extent, moving it when it has outgrown it
    fn write_catalog(&mut self) -> Result<usize> {
        let mut json = self.catalog.to_json()?;
        let region = self.superblock.catalog_region();

        let (offset, capacity) = match region {
            Some((offset, capacity)) if json.len() as u64 <= capacity => (offset, capacity),
            _ => {
                if let Some((offset, size)) = region {
                    self.release(ChunkRecord { offset, size });
                }
                let capacity = (json.len() as u64)
                    .saturating_mul(2)
                    .max(MIN_CATALOG_EXTENT);
                let offset = self.allocate(capacity)?;
                // The free list changed, so serialize again
                json = self.catalog.to_json()?;
                if json.len() as u64 > capacity {
                    return Err(OmxError::Resource(format!(
                        "catalog of {} bytes does not fit its {capacity} byte extent",
                        json.len()
                    )));
                }
                trace!(offset, capacity, "moved catalog");
                (offset, capacity)
            }
        };

        let written = json.len();
        let padded = usize::try_from(capacity)
            .map_err(|_| OmxError::Resource("catalog extent too large".into()))?;
        json.resize(padded, b' ');
        self.backing.write_at(offset, &json)?;
        self.superblock.set_catalog_region(offset, capacity);
        Ok(written)
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(err) = self.flush() {
                warn!(path = %self.path.display(), error = %err, "failed to flush store on drop");
            }
        }
    }
}

/// An open store file
///
/// Cloning yields another handle to the same open file. The file is
/// flushed when the last handle is dropped, unless it was closed first.
#[derive(Clone)]
pub struct StoreFile {
    inner: Arc<Mutex<StoreInner>>,
}

impl std::fmt::Debug for StoreFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("StoreFile")
            .field("path", &inner.path)
            .field("writable", &inner.backing.is_writable())
            .field("closed", &inner.closed)
            .finish()
    }
}

impl StoreFile {
    /// Open or create a store file
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let inner = match mode {
            OpenMode::Truncate => {
                let backing = Backing::create_truncated(&path)?;
                let mut inner = StoreInner {
                    path,
                    backing,
                    superblock: Superblock::new(),
                    catalog: Catalog::default(),
                    caches: HashMap::new(),
                    dirty: true,
                    closed: false,
                };
                inner.flush()?;
                inner
            }
            OpenMode::ReadOnly | OpenMode::ReadWrite => {
                let mut backing = if mode == OpenMode::ReadOnly {
                    Backing::open_read_only(&path)?
                } else {
                    Backing::open_read_write(&path)?
                };

                if backing.len()? < Superblock::SIZE as u64 {
                    return Err(OmxError::Format(format!(
                        "'{}' is too small to be a container",
                        path.display()
                    )));
                }
                let superblock = Superblock::from_bytes(&backing.read_at(0, Superblock::SIZE)?)?;
                let (offset, size) = superblock.catalog_region().ok_or_else(|| {
                    OmxError::Format(format!("'{}' has no catalog", path.display()))
                })?;
                let catalog = Catalog::from_json(&backing.read_at(offset, size as usize)?)?;

                StoreInner {
                    path,
                    backing,
                    superblock,
                    catalog,
                    caches: HashMap::new(),
                    dirty: false,
                    closed: false,
                }
            }
        };

        debug!(path = %inner.path.display(), ?mode, "opened store");
        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>> {
        let inner = self.inner.lock();
        if inner.closed {
            return Err(OmxError::State(format!(
                "'{}' has been closed",
                inner.path.display()
            )));
        }
        Ok(inner)
    }

    fn lock_writable(&self) -> Result<MutexGuard<'_, StoreInner>> {
        let inner = self.lock()?;
        inner.require_writable()?;
        Ok(inner)
    }

    pub fn path(&self) -> PathBuf {
        self.inner.lock().path.clone()
    }

    pub fn is_writable(&self) -> bool {
        self.inner.lock().backing.is_writable()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Create a group under an existing parent
    pub fn create_group(&self, path: &str, track_creation_order: bool) -> Result<GroupHandle> {
        let mut inner = self.lock_writable()?;
        inner.catalog.insert(
            path,
            Node::Group(GroupNode {
                track_creation_order,
                ..GroupNode::default()
            }),
        )?;
        inner.dirty = true;
        debug!(path, track_creation_order, "created group");
        Ok(GroupHandle {
            file: self.clone(),
            path: path.to_owned(),
        })
    }

    pub fn open_group(&self, path: &str) -> Result<GroupHandle> {
        self.lock()?.catalog.group(path)?;
        Ok(GroupHandle {
            file: self.clone(),
            path: path.to_owned(),
        })
    }

    /// Create a chunked dataset under an existing group
    pub fn create_dataset(&self, path: &str, props: DatasetProperties) -> Result<DatasetHandle> {
        props.validate()?;
        let mut inner = self.lock_writable()?;
        inner.catalog.insert(
            path,
            Node::Dataset(DatasetNode {
                dtype: props.dtype,
                dims: props.dims.clone(),
                chunk: props.chunk.clone(),
                compression: props.compression.to_u8(),
                chunks: Default::default(),
                attributes: Default::default(),
            }),
        )?;
        inner.dirty = true;
        debug!(path, dims = ?props.dims, chunk = ?props.chunk, compression = %props.compression, "created dataset");
        drop(inner);

        Ok(DatasetHandle {
            file: self.clone(),
            path: path.to_owned(),
            props,
        })
    }

    pub fn open_dataset(&self, path: &str) -> Result<DatasetHandle> {
        let props = DatasetProperties::from_node(self.lock()?.catalog.dataset(path)?)?;
        Ok(DatasetHandle {
            file: self.clone(),
            path: path.to_owned(),
            props,
        })
    }

    /// Unlink a dataset or group
    pub fn delete(&self, path: &str) -> Result<()> {
        let mut inner = self.lock_writable()?;
        let node = inner.catalog.unlink(path)?;
        for extent in node.extents() {
            inner.release(extent);
        }
        let prefix = format!("{path}/");
        inner
            .caches
            .retain(|cached, _| cached != path && !cached.starts_with(&prefix));
        inner.dirty = true;
        debug!(path, "deleted object");
        Ok(())
    }

    pub fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.lock()?.catalog.node(path).is_ok())
    }

    /// Names of the children of a group
    pub fn child_names(&self, path: &str, order: IterOrder) -> Result<Vec<String>> {
        self.lock()?.catalog.child_names(path, order)
    }

    /// Whether the group at `path` tracks creation order
    pub fn tracks_creation_order(&self, path: &str) -> Result<bool> {
        Ok(self.lock()?.catalog.group(path)?.track_creation_order)
    }

    /// Attribute names of an object, in creation order
    pub fn attribute_names(&self, path: &str) -> Result<Vec<String>> {
        Ok(self.lock()?.catalog.attributes(path)?.names())
    }

    pub fn attribute_exists(&self, path: &str, name: &str) -> Result<bool> {
        Ok(self.lock()?.catalog.attributes(path)?.get(name).is_some())
    }

    /// Type descriptor of an attribute
    pub fn attribute_type(&self, path: &str, name: &str) -> Result<StoreType> {
        let inner = self.lock()?;
        inner
            .catalog
            .attributes(path)?
            .get(name)
            .map(|record| record.dtype)
            .ok_or_else(|| missing_attribute(path, name))
    }

    /// Type descriptor and raw bytes of an attribute
    pub fn read_attribute(&self, path: &str, name: &str) -> Result<(StoreType, Vec<u8>)> {
        let inner = self.lock()?;
        inner
            .catalog
            .attributes(path)?
            .get(name)
            .map(|record| (record.dtype, record.data.clone()))
            .ok_or_else(|| missing_attribute(path, name))
    }

    /// Create or replace an attribute
    ///
    /// Replacing is a single catalog update: the attribute takes a new
    /// creation order as if it had been deleted and created again.
    pub fn write_attribute(&self, path: &str, name: &str, dtype: StoreType, data: Vec<u8>) -> Result<()> {
        if let Some(size) = dtype.element_size() {
            if data.len() != size {
                return Err(OmxError::SizeMismatch(format!(
                    "attribute '{name}' holds {} bytes, its type needs {size}",
                    data.len()
                )));
            }
        }

        let mut inner = self.lock_writable()?;
        let order = inner.catalog.stamp();
        inner
            .catalog
            .attributes_mut(path)?
            .insert(name, AttributeRecord { order, dtype, data });
        inner.dirty = true;
        trace!(path, name, "wrote attribute");
        Ok(())
    }

    pub fn delete_attribute(&self, path: &str, name: &str) -> Result<()> {
        let mut inner = self.lock_writable()?;
        inner
            .catalog
            .attributes_mut(path)?
            .remove(name)
            .ok_or_else(|| missing_attribute(path, name))?;
        inner.dirty = true;
        Ok(())
    }

    /// Write cached chunks and the catalog to disk
    pub fn flush(&self) -> Result<()> {
        self.lock()?.flush()
    }

    /// Flush and close the file; later calls on any handle fail
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Ok(());
        }
        let result = inner.flush();
        inner.closed = true;
        inner.caches.clear();
        debug!(path = %inner.path.display(), "closed store");
        result
    }

    /// Physical size of the file in bytes
    pub fn file_size(&self) -> Result<u64> {
        self.lock()?.backing.len()
    }
}

fn missing_attribute(path: &str, name: &str) -> OmxError {
    OmxError::NotFound(format!("attribute '{name}' does not exist on '{path}'"))
}

/// Handle to a group
#[derive(Debug, Clone)]
pub struct GroupHandle {
    file: StoreFile,
    path: String,
}

impl GroupHandle {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn file(&self) -> &StoreFile {
        &self.file
    }

    pub fn child_names(&self, order: IterOrder) -> Result<Vec<String>> {
        self.file.child_names(&self.path, order)
    }

    /// Child names in creation order when tracked, else in name order
    pub fn child_names_ordered(&self) -> Result<Vec<String>> {
        let order = if self.file.tracks_creation_order(&self.path)? {
            IterOrder::Creation
        } else {
            IterOrder::Name
        };
        self.child_names(order)
    }
}

/// Handle to a dataset
///
/// Dropping the handle writes back its cached chunk.
#[derive(Debug)]
pub struct DatasetHandle {
    file: StoreFile,
    path: String,
    props: DatasetProperties,
}

impl DatasetHandle {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// File the dataset belongs to
    pub fn file(&self) -> &StoreFile {
        &self.file
    }

    pub fn dtype(&self) -> StoreType {
        self.props.dtype
    }

    pub fn dims(&self) -> &[u64] {
        &self.props.dims
    }

    /// Creation properties: type, extent, chunk shape and compression
    pub fn properties(&self) -> &DatasetProperties {
        &self.props
    }

    /// Dataspace covering the whole dataset
    pub fn space(&self) -> Dataspace {
        Dataspace::simple(&self.props.dims)
    }

    fn check_transfer(&self, mem: &Dataspace, file_space: &Dataspace, len: usize) -> Result<Hyperslab> {
        if self.props.dtype.is_string() {
            return Err(OmxError::InvalidDataType(format!(
                "'{}' holds strings; use the string transfer methods",
                self.path
            )));
        }
        if file_space.dims() != self.props.dims.as_slice() {
            return Err(OmxError::Range(format!(
                "file dataspace {:?} does not match the extent {:?} of '{}'",
                file_space.dims(),
                self.props.dims,
                self.path
            )));
        }
        if mem.selected_points() != file_space.selected_points() {
            return Err(OmxError::SizeMismatch(format!(
                "memory selects {} elements, file selects {}",
                mem.selected_points(),
                file_space.selected_points()
            )));
        }

        let element = self.props.dtype.element_size().unwrap_or(1);
        let expected = omx_core::validation::checked_byte_size(mem.selected_points(), element)?;
        omx_core::validation::validate_buffer_len(len, expected, "transfer buffer")?;
        Ok(file_space.selection())
    }

    /// Write the selected region from a buffer laid out as `mem`
    pub fn write(&self, mem: &Dataspace, file_space: &Dataspace, bytes: &[u8]) -> Result<()> {
        let slab = self.check_transfer(mem, file_space, bytes.len())?;
        let mut inner = self.file.lock_writable()?;
        inner.write_selection(&self.path, &self.props, &slab, bytes)
    }

    /// Read the selected region into a buffer laid out as `mem`
    pub fn read(&self, mem: &Dataspace, file_space: &Dataspace, out: &mut [u8]) -> Result<()> {
        let slab = self.check_transfer(mem, file_space, out.len())?;
        let mut inner = self.file.lock()?;
        inner.read_selection(&self.path, &self.props, &slab, out)
    }

    fn string_len(&self) -> Result<usize> {
        if !self.props.dtype.is_string() {
            return Err(OmxError::InvalidDataType(format!(
                "'{}' does not hold strings",
                self.path
            )));
        }
        usize::try_from(self.props.dims[0])
            .map_err(|_| OmxError::Resource("string dataset too large".into()))
    }

    /// Replace the whole contents of a string dataset
    pub fn write_strings<S: AsRef<str>>(&self, values: &[S]) -> Result<()> {
        let expected = self.string_len()?;
        if values.len() != expected {
            return Err(OmxError::SizeMismatch(format!(
                "{} strings given for '{}' of length {expected}",
                values.len(),
                self.path
            )));
        }

        let mut encoded = Vec::new();
        for value in values {
            let bytes = value.as_ref().as_bytes();
            let len = u32::try_from(bytes.len())
                .map_err(|_| OmxError::Resource("string element too long".into()))?;
            encoded.extend_from_slice(&len.to_le_bytes());
            encoded.extend_from_slice(bytes);
        }

        let mut inner = self.file.lock_writable()?;
        let stored = chunk::encode(&encoded, self.props.compression)?;
        let existing = inner.catalog.dataset(&self.path)?.chunks.get(&0).copied();
        let record = inner.place(existing, &stored)?;
        inner.catalog.dataset_mut(&self.path)?.chunks.insert(0, record);
        inner.dirty = true;
        Ok(())
    }

    /// Read the whole contents of a string dataset
    pub fn read_strings(&self) -> Result<Vec<String>> {
        let expected = self.string_len()?;
        let mut inner = self.file.lock()?;
        let Some(record) = inner.catalog.dataset(&self.path)?.chunks.get(&0).copied() else {
            return Ok(vec![String::new(); expected]);
        };
        let stored = inner.backing.read_at(record.offset, record.size as usize)?;
        drop(inner);

        let encoded = chunk::decode(&stored, self.props.compression)?;
        let corrupt = || OmxError::Format(format!("corrupt string data in '{}'", self.path));

        let mut values = Vec::with_capacity(expected);
        let mut rest = encoded.as_slice();
        while !rest.is_empty() {
            let (len, tail) = rest.split_at_checked(4).ok_or_else(corrupt)?;
            let len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
            let (text, tail) = tail.split_at_checked(len).ok_or_else(corrupt)?;
            values.push(String::from_utf8(text.to_vec()).map_err(|_| corrupt())?);
            rest = tail;
        }

        if values.len() != expected {
            return Err(corrupt());
        }
        Ok(values)
    }

    /// Write back this dataset's cached chunk
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.file.lock()?;
        if !inner.backing.is_writable() {
            return Ok(());
        }
        inner.flush_cache(&self.path)
    }
}

impl Drop for DatasetHandle {
    fn drop(&mut self) {
        if self.file.is_closed() {
            return;
        }
        if let Err(err) = self.flush() {
            warn!(path = %self.path, error = %err, "failed to write back chunk on drop");
        }
    }
}
