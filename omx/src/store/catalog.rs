//! Catalog: the serialized tree of groups, datasets and attributes
//!
//! The catalog is kept in memory while a file is open and written as JSON
//! into its own extent on flush. Extents released by rewritten chunks,
//! deleted datasets and relocated catalogs are kept in a free list so later
//! blobs can reuse them.

use std::collections::BTreeMap;

use omx_core::format::constants::engine::ROOT_PATH;
use omx_core::{OmxError, Result};
use serde::{Deserialize, Serialize};

use super::types::StoreType;

/// Location of a stored blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ChunkRecord {
    pub(crate) offset: u64,
    pub(crate) size: u64,
}

impl ChunkRecord {
    fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Released extents, sorted by offset, never adjacent to one another
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct FreeList {
    extents: Vec<ChunkRecord>,
}

impl FreeList {
    /// Carve `size` bytes out of the first extent large enough
    pub(crate) fn take(&mut self, size: u64) -> Option<u64> {
        let at = self.extents.iter().position(|e| e.size >= size)?;
        let extent = &mut self.extents[at];
        let offset = extent.offset;
        extent.offset += size;
        extent.size -= size;
        if extent.size == 0 {
            self.extents.remove(at);
        }
        Some(offset)
    }

    /// Return an extent, merging it with its neighbours
    pub(crate) fn give(&mut self, extent: ChunkRecord) {
        if extent.size == 0 {
            return;
        }
        let at = self.extents.partition_point(|e| e.offset < extent.offset);
        let mut merged = extent;

        let joins_next = self
            .extents
            .get(at)
            .is_some_and(|next| merged.end() == next.offset);
        if joins_next {
            merged.size += self.extents.remove(at).size;
        }

        match at.checked_sub(1).map(|before| &mut self.extents[before]) {
            Some(prev) if prev.end() == merged.offset => prev.size += merged.size,
            _ => self.extents.insert(at, merged),
        }
    }

    /// Drop a trailing extent that ends at `data_end`; returns the new end
    pub(crate) fn trim_tail(&mut self, data_end: u64) -> u64 {
        match self.extents.last() {
            Some(last) if last.end() == data_end => {
                let offset = last.offset;
                self.extents.pop();
                offset
            }
            _ => data_end,
        }
    }

    pub(crate) fn total(&self) -> u64 {
        self.extents.iter().map(|e| e.size).sum()
    }
}

/// One attribute value with its creation order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct AttributeRecord {
    pub(crate) order: u64,
    pub(crate) dtype: StoreType,
    pub(crate) data: Vec<u8>,
}

/// Attributes attached to one group or dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct AttributeTable {
    entries: BTreeMap<String, AttributeRecord>,
}

impl AttributeTable {
    pub(crate) fn get(&self, name: &str) -> Option<&AttributeRecord> {
        self.entries.get(name)
    }

    pub(crate) fn insert(&mut self, name: &str, record: AttributeRecord) {
        self.entries.insert(name.to_owned(), record);
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<AttributeRecord> {
        self.entries.remove(name)
    }

    /// Attribute names in creation order
    pub(crate) fn names(&self) -> Vec<String> {
        let mut named: Vec<(&String, u64)> =
            self.entries.iter().map(|(name, rec)| (name, rec.order)).collect();
        named.sort_by_key(|&(_, order)| order);
        named.into_iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Dataset metadata and chunk index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DatasetNode {
    pub(crate) dtype: StoreType,
    pub(crate) dims: Vec<u64>,
    pub(crate) chunk: Vec<u64>,
    pub(crate) compression: u8,
    #[serde(default)]
    pub(crate) chunks: BTreeMap<u64, ChunkRecord>,
    #[serde(default)]
    pub(crate) attributes: AttributeTable,
}

/// Group with its children
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct GroupNode {
    pub(crate) track_creation_order: bool,
    #[serde(default)]
    pub(crate) children: BTreeMap<String, Child>,
    #[serde(default)]
    pub(crate) attributes: AttributeTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Child {
    pub(crate) order: u64,
    pub(crate) node: Node,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Node {
    Group(GroupNode),
    Dataset(DatasetNode),
}

impl Node {
    /// Every chunk extent stored under this node
    pub(crate) fn extents(&self) -> Vec<ChunkRecord> {
        let mut out = Vec::new();
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            match node {
                Node::Dataset(d) => out.extend(d.chunks.values().copied()),
                Node::Group(g) => pending.extend(g.children.values().map(|c| &c.node)),
            }
        }
        out
    }
}

/// Order in which group children are enumerated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterOrder {
    /// Lexical name order
    Name,
    /// Creation order, available when the group tracks it
    Creation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Catalog {
    pub(crate) root: GroupNode,
    /// Next creation-order stamp, shared by children and attributes
    pub(crate) next_order: u64,
    #[serde(default)]
    pub(crate) free: FreeList,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            root: GroupNode {
                track_creation_order: true,
                ..GroupNode::default()
            },
            next_order: 0,
            free: FreeList::default(),
        }
    }
}

/// Split an absolute path into components
pub(crate) fn components(path: &str) -> Result<Vec<&str>> {
    if !path.starts_with(ROOT_PATH) {
        return Err(OmxError::NotFound(format!("'{path}' is not an absolute path")));
    }
    let parts: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    Ok(parts)
}

/// Split an absolute path into its parent components and final name
pub(crate) fn split_parent(path: &str) -> Result<(Vec<&str>, &str)> {
    let mut parts = components(path)?;
    let name = parts
        .pop()
        .ok_or_else(|| OmxError::Resource("the root group cannot be created or removed".into()))?;
    Ok((parts, name))
}

impl Catalog {
    /// Parse a catalog; trailing padding whitespace is accepted
    pub(crate) fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| OmxError::Format(format!("unreadable catalog: {e}")))
    }

    pub(crate) fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| OmxError::Resource(format!("failed to serialize catalog: {e}")))
    }

    pub(crate) fn stamp(&mut self) -> u64 {
        let order = self.next_order;
        self.next_order += 1;
        order
    }

    pub(crate) fn node(&self, path: &str) -> Result<NodeRef<'_>> {
        let mut group = &self.root;
        let parts = components(path)?;
        let Some((last, parents)) = parts.split_last() else {
            return Ok(NodeRef::Group(group));
        };
        for part in parents {
            group = match group.children.get(*part).map(|c| &c.node) {
                Some(Node::Group(g)) => g,
                _ => return Err(not_found(path)),
            };
        }
        match group.children.get(*last).map(|c| &c.node) {
            Some(Node::Group(g)) => Ok(NodeRef::Group(g)),
            Some(Node::Dataset(d)) => Ok(NodeRef::Dataset(d)),
            None => Err(not_found(path)),
        }
    }

    pub(crate) fn group(&self, path: &str) -> Result<&GroupNode> {
        match self.node(path)? {
            NodeRef::Group(g) => Ok(g),
            NodeRef::Dataset(_) => Err(OmxError::Resource(format!("'{path}' is not a group"))),
        }
    }

    pub(crate) fn group_mut(&mut self, parts: &[&str], path: &str) -> Result<&mut GroupNode> {
        let mut group = &mut self.root;
        for part in parts {
            group = match group.children.get_mut(*part).map(|c| &mut c.node) {
                Some(Node::Group(g)) => g,
                Some(Node::Dataset(_)) => {
                    return Err(OmxError::Resource(format!("'{path}' is not a group")))
                }
                None => return Err(not_found(path)),
            };
        }
        Ok(group)
    }

    pub(crate) fn dataset(&self, path: &str) -> Result<&DatasetNode> {
        match self.node(path)? {
            NodeRef::Dataset(d) => Ok(d),
            NodeRef::Group(_) => Err(OmxError::Resource(format!("'{path}' is not a dataset"))),
        }
    }

    pub(crate) fn dataset_mut(&mut self, path: &str) -> Result<&mut DatasetNode> {
        let (parents, name) = split_parent(path)?;
        let group = self.group_mut(&parents, path)?;
        match group.children.get_mut(name).map(|c| &mut c.node) {
            Some(Node::Dataset(d)) => Ok(d),
            Some(Node::Group(_)) => Err(OmxError::Resource(format!("'{path}' is not a dataset"))),
            None => Err(not_found(path)),
        }
    }

    pub(crate) fn attributes(&self, path: &str) -> Result<&AttributeTable> {
        Ok(match self.node(path)? {
            NodeRef::Group(g) => &g.attributes,
            NodeRef::Dataset(d) => &d.attributes,
        })
    }

    pub(crate) fn attributes_mut(&mut self, path: &str) -> Result<&mut AttributeTable> {
        let parts = components(path)?;
        let Some((last, parents)) = parts.split_last() else {
            return Ok(&mut self.root.attributes);
        };
        let group = self.group_mut(parents, path)?;
        match group.children.get_mut(*last).map(|c| &mut c.node) {
            Some(Node::Group(g)) => Ok(&mut g.attributes),
            Some(Node::Dataset(d)) => Ok(&mut d.attributes),
            None => Err(not_found(path)),
        }
    }

    /// Insert a new child under its parent group
    pub(crate) fn insert(&mut self, path: &str, node: Node) -> Result<()> {
        let order = self.stamp();
        let (parents, name) = split_parent(path)?;
        let group = self.group_mut(&parents, path)?;
        if group.children.contains_key(name) {
            return Err(OmxError::DuplicateName(format!("'{path}' already exists")));
        }
        group.children.insert(name.to_owned(), Child { order, node });
        Ok(())
    }

    /// Unlink a child from its parent group
    pub(crate) fn unlink(&mut self, path: &str) -> Result<Node> {
        let (parents, name) = split_parent(path)?;
        let group = self.group_mut(&parents, path)?;
        group
            .children
            .remove(name)
            .map(|child| child.node)
            .ok_or_else(|| not_found(path))
    }

    /// Child names of a group
    pub(crate) fn child_names(&self, path: &str, order: IterOrder) -> Result<Vec<String>> {
        let group = self.group(path)?;
        match order {
            IterOrder::Name => Ok(group.children.keys().cloned().collect()),
            IterOrder::Creation if group.track_creation_order => {
                let mut named: Vec<(&String, u64)> = group
                    .children
                    .iter()
                    .map(|(name, child)| (name, child.order))
                    .collect();
                named.sort_by_key(|&(_, order)| order);
                Ok(named.into_iter().map(|(name, _)| name.clone()).collect())
            }
            IterOrder::Creation => Err(OmxError::Resource(format!(
                "group '{path}' does not track creation order"
            ))),
        }
    }
}

pub(crate) enum NodeRef<'a> {
    Group(&'a GroupNode),
    Dataset(&'a DatasetNode),
}

fn not_found(path: &str) -> OmxError {
    OmxError::NotFound(format!("no object at '{path}'"))
}
