use std::fmt;

use ndarray::{Array2, Array3, ArrayView1, ArrayView2, Axis};

use crate::config::DatasetId;

/// Per-residue sequence category produced by the one-hot collapse.
pub type Category = u8;

// ---------------------------------------------------------------------------
// FeatureBlocks – output of the slicing step
// ---------------------------------------------------------------------------

/// The three named sub-tensors carved out of a raw archive.
/// All three share the record and residue axes.
#[derive(Debug, Clone)]
pub struct FeatureBlocks {
    /// Sequence one-hot, `(N, 700, 21)`.
    pub sequence: Array3<f32>,
    /// Profile / PSSM, `(N, 700, 21)`.
    pub profile: Array3<f32>,
    /// Secondary-structure labels, `(N, 700, 8)`.
    pub labels: Array3<f32>,
}

impl FeatureBlocks {
    /// Number of records.
    pub fn len(&self) -> usize {
        self.sequence.len_of(Axis(0))
    }

    /// Whether no record is left.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep only the first `n` records.
    pub fn truncate(self, n: usize) -> Self {
        let n = n.min(self.len());
        let keep = |a: Array3<f32>| a.slice_move(ndarray::s![..n, .., ..]);
        FeatureBlocks {
            sequence: keep(self.sequence),
            profile: keep(self.profile),
            labels: keep(self.labels),
        }
    }

    /// Gather the given records, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        FeatureBlocks {
            sequence: self.sequence.select(Axis(0), indices),
            profile: self.profile.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
        }
    }
}

// ---------------------------------------------------------------------------
// EncodedSet – what downstream training consumes
// ---------------------------------------------------------------------------

/// One (sequence, profile, label) triple with the sequence collapsed to categories.
#[derive(Debug, Clone)]
pub struct EncodedSet {
    /// `(N, 700)` category ids, sentinel `1` on empty positions.
    pub sequence: Array2<Category>,
    /// `(N, 700, 21)`.
    pub profile: Array3<f32>,
    /// `(N, 700, 8)`.
    pub labels: Array3<f32>,
}

impl EncodedSet {
    /// Number of records.
    pub fn len(&self) -> usize {
        self.sequence.nrows()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> (usize, usize) {
        self.sequence.dim()
    }
}

// ---------------------------------------------------------------------------
// SplitIndices
// ---------------------------------------------------------------------------

/// Record indices (into the raw archive) used for each partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

// ---------------------------------------------------------------------------
// LoadedDataset – the public query surface
// ---------------------------------------------------------------------------

/// A fully prepared dataset. For the training role `primary` is the training
/// partition and `validation` is populated; test sets only carry `primary`.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub(crate) id: DatasetId,
    pub(crate) primary: EncodedSet,
    pub(crate) validation: Option<EncodedSet>,
    pub(crate) split: Option<SplitIndices>,
}

impl LoadedDataset {
    pub fn kind(&self) -> DatasetId {
        self.id
    }

    /// Record count of the primary set.
    pub fn len(&self) -> usize {
        self.primary.len()
    }

    /// Whether the primary set is empty.
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    /// Shape of the primary category-encoded array.
    pub fn shape(&self) -> (usize, usize) {
        self.primary.shape()
    }

    /// `(700, 8)` label block of one record, `None` when out of range.
    pub fn labels(&self, index: usize) -> Option<ArrayView2<'_, f32>> {
        (index < self.len()).then(|| self.primary.labels.index_axis(Axis(0), index))
    }

    pub fn profile(&self, index: usize) -> Option<ArrayView2<'_, f32>> {
        (index < self.len()).then(|| self.primary.profile.index_axis(Axis(0), index))
    }

    pub fn sequence(&self, index: usize) -> Option<ArrayView1<'_, Category>> {
        (index < self.len()).then(|| self.primary.sequence.index_axis(Axis(0), index))
    }

    pub fn primary(&self) -> &EncodedSet {
        &self.primary
    }

    pub fn validation(&self) -> Option<&EncodedSet> {
        self.validation.as_ref()
    }

    pub fn split(&self) -> Option<&SplitIndices> {
        self.split.as_ref()
    }

    /// Consume into `(primary, validation)`.
    pub fn into_sets(self) -> (EncodedSet, Option<EncodedSet>) {
        (self.primary, self.validation)
    }
}

impl fmt::Display for LoadedDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (n, l) = self.shape();
        write!(f, "{} [{n} x {l}]", self.id)?;
        if let Some(val) = &self.validation {
            write!(f, ", validation [{} x {}]", val.len(), val.shape().1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn blocks(n: usize) -> FeatureBlocks {
        FeatureBlocks {
            sequence: Array::from_shape_fn((n, 4, 21), |(i, _, _)| i as f32),
            profile: Array::zeros((n, 4, 21)),
            labels: Array::from_shape_fn((n, 4, 8), |(i, _, _)| i as f32),
        }
    }

    #[test]
    fn truncate_keeps_leading_records() {
        let b = blocks(10).truncate(3);
        assert_eq!(b.len(), 3);
        assert_eq!(b.labels.dim(), (3, 4, 8));
        assert_eq!(b.sequence[[2, 0, 0]], 2.0);
        assert_eq!(blocks(2).truncate(5).len(), 2);
    }

    #[test]
    fn select_follows_index_order() {
        let b = blocks(5).select(&[4, 1]);
        assert_eq!(b.len(), 2);
        assert_eq!(b.labels[[0, 0, 0]], 4.0);
        assert_eq!(b.labels[[1, 3, 7]], 1.0);
    }

    #[test]
    fn label_lookup_is_bounds_checked() {
        let set = EncodedSet {
            sequence: Array2::ones((2, 4)),
            profile: Array3::zeros((2, 4, 21)),
            labels: Array3::from_elem((2, 4, 8), 0.5),
        };
        let ds = LoadedDataset {
            id: DatasetId::Cb513,
            primary: set,
            validation: None,
            split: None,
        };
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.shape(), (2, 4));
        assert_eq!(ds.labels(1).unwrap().dim(), (4, 8));
        assert!(ds.labels(2).is_none());
        assert_eq!(ds.to_string(), "CB513 test dataset [2 x 4]");
    }
}
