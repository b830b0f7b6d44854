//! Dataspaces and hyperslab selections

use omx_core::{OmxError, Result};

/// Contiguous rectangular selection: `count[d]` elements from `start[d]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperslab {
    pub start: Vec<u64>,
    pub count: Vec<u64>,
}

impl Hyperslab {
    /// Number of selected elements
    pub fn len(&self) -> u64 {
        self.count.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shape of a dataset or memory buffer, with an optional selection
///
/// With no explicit selection the whole extent is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataspace {
    dims: Vec<u64>,
    selection: Option<Hyperslab>,
}

impl Dataspace {
    /// Simple dataspace of the given extent
    pub fn simple(dims: &[u64]) -> Self {
        Self {
            dims: dims.to_vec(),
            selection: None,
        }
    }

    pub fn dims(&self) -> &[u64] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Select a hyperslab, replacing any previous selection
    pub fn select_hyperslab(&mut self, start: &[u64], count: &[u64]) -> Result<()> {
        if start.len() != self.rank() || count.len() != self.rank() {
            return Err(OmxError::Range(format!(
                "selection rank does not match dataspace rank {}",
                self.rank()
            )));
        }

        for ((&s, &c), &dim) in start.iter().zip(count).zip(&self.dims) {
            let end = s
                .checked_add(c)
                .ok_or_else(|| OmxError::Range("selection end overflows".into()))?;
            if end > dim {
                return Err(OmxError::Range(format!(
                    "selection [{s}, {end}) exceeds dimension of {dim}"
                )));
            }
        }

        self.selection = Some(Hyperslab {
            start: start.to_vec(),
            count: count.to_vec(),
        });
        Ok(())
    }

    /// Select the whole extent
    pub fn select_all(&mut self) {
        self.selection = None;
    }

    /// Current selection, the whole extent when none was made
    pub fn selection(&self) -> Hyperslab {
        match &self.selection {
            Some(slab) => slab.clone(),
            None => Hyperslab {
                start: vec![0; self.rank()],
                count: self.dims.clone(),
            },
        }
    }

    /// Number of selected elements
    pub fn selected_points(&self) -> u64 {
        match &self.selection {
            Some(slab) => slab.len(),
            None => self.dims.iter().product(),
        }
    }
}
