//! # Relation Tables
//!
//! Dense `(L, L, P)` grids of [`TableTag`]s and the matching validity mask.
//! Axis 0 is the subject boundary token, axis 1 the object boundary token and
//! axis 2 the predicate id. Storage is row-major, so iterating the flat buffer
//! visits cells in `(l1, l2, p)` order.

use candle_core::{Device, Tensor};

use crate::error::{GrteError, Result};
use crate::tags::TableTag;

/// A `(len, len, num_predicates)` table of cell tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagTable {
    len: usize,
    num_predicates: usize,
    cells: Vec<TableTag>,
}

impl TagTable {
    /// Create a table with every cell set to [`TableTag::None`].
    pub fn new(len: usize, num_predicates: usize) -> Self {
        Self {
            len,
            num_predicates,
            cells: vec![TableTag::None; len * len * num_predicates],
        }
    }

    /// Build a table from flat class ids in `(l1, l2, p)` order.
    ///
    /// Ids outside the tag set are read as [`TableTag::None`].
    pub fn from_ids(len: usize, num_predicates: usize, ids: &[u32]) -> Result<Self> {
        let expected = len * len * num_predicates;
        if ids.len() != expected {
            return Err(GrteError::ShapeMismatch(format!(
                "expected {expected} cells for ({len}, {len}, {num_predicates}), got {}",
                ids.len()
            )));
        }

        let cells = ids
            .iter()
            .map(|&id| TableTag::from_index(id as usize).unwrap_or_default())
            .collect();

        Ok(Self {
            len,
            num_predicates,
            cells,
        })
    }

    /// Sequence length covered by the two position axes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn num_predicates(&self) -> usize {
        self.num_predicates
    }

    /// Shape as `(len, len, num_predicates)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.len, self.len, self.num_predicates)
    }

    fn offset(&self, l1: usize, l2: usize, predicate: usize) -> Option<usize> {
        if l1 >= self.len || l2 >= self.len || predicate >= self.num_predicates {
            return None;
        }
        Some((l1 * self.len + l2) * self.num_predicates + predicate)
    }

    /// Tag at `(l1, l2, predicate)`, or `None` outside the table.
    pub fn get(&self, l1: usize, l2: usize, predicate: usize) -> Option<TableTag> {
        self.offset(l1, l2, predicate).map(|i| self.cells[i])
    }

    /// Overwrite the tag at `(l1, l2, predicate)`.
    pub fn set(&mut self, l1: usize, l2: usize, predicate: usize, tag: TableTag) -> Result<()> {
        let idx = self.offset(l1, l2, predicate).ok_or_else(|| {
            GrteError::ShapeMismatch(format!(
                "cell ({l1}, {l2}, {predicate}) outside table of shape {:?}",
                self.shape()
            ))
        })?;
        self.cells[idx] = tag;
        Ok(())
    }

    /// Non-`None` cells as `(l1, l2, predicate, tag)`, in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, usize, TableTag)> + '_ {
        let width = self.num_predicates;
        let len = self.len;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, tag)| **tag != TableTag::None)
            .map(move |(i, tag)| {
                let predicate = i % width;
                let pos = i / width;
                (pos / len, pos % len, predicate, *tag)
            })
    }

    /// Number of non-`None` cells.
    pub fn count_tagged(&self) -> usize {
        self.cells.iter().filter(|t| **t != TableTag::None).count()
    }

    /// Flat class ids in `(l1, l2, p)` order.
    pub fn to_ids(&self) -> Vec<u32> {
        self.cells.iter().map(|t| t.index() as u32).collect()
    }

    /// Convert to a `u32` tensor of shape `(len, len, num_predicates)`.
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        Ok(Tensor::from_vec(self.to_ids(), self.shape(), device)?)
    }
}

/// Validity mask over a relation table.
///
/// Zero on the first and last row and column of the position axes, which
/// belong to the `[CLS]`/`[SEP]` sentinels, one everywhere else.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidityMask {
    len: usize,
    num_predicates: usize,
    values: Vec<f32>,
}

impl ValidityMask {
    pub fn new(len: usize, num_predicates: usize) -> Self {
        let mut values = Vec::with_capacity(len * len * num_predicates);
        for l1 in 0..len {
            for l2 in 0..len {
                let v = if Self::is_valid_position(len, l1) && Self::is_valid_position(len, l2) {
                    1.0
                } else {
                    0.0
                };
                values.extend(std::iter::repeat_n(v, num_predicates));
            }
        }

        Self {
            len,
            num_predicates,
            values,
        }
    }

    fn is_valid_position(len: usize, pos: usize) -> bool {
        pos != 0 && pos + 1 < len
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.len, self.len, self.num_predicates)
    }

    /// Mask value at `(l1, l2, predicate)`, or `None` outside the mask.
    pub fn get(&self, l1: usize, l2: usize, predicate: usize) -> Option<f32> {
        if l1 >= self.len || l2 >= self.len || predicate >= self.num_predicates {
            return None;
        }
        Some(self.values[(l1 * self.len + l2) * self.num_predicates + predicate])
    }

    /// Flat values in `(l1, l2, p)` order.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Convert to an `f32` tensor of shape `(len, len, num_predicates)`.
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        Ok(Tensor::from_slice(&self.values, self.shape(), device)?)
    }
}
