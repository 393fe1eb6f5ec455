use std::ops::Range;
use std::path::{Path, PathBuf};

use log::{debug, info};
use ndarray::{s, Array3, ArrayD, Axis};

use super::container::{read_archive, RawArchive};
use super::encode::{collapse_onehot, MAX_CHANNELS};
use super::fetch::{ensure_local, Fetcher, HttpFetcher};
use super::model::{EncodedSet, FeatureBlocks, LoadedDataset};
use super::split::split;
use crate::config::{ContainerKind, DatasetId, DatasetRegistry, FeatureLayout, Role, SEQUENCE_LENGTH};
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Load and slice
// ---------------------------------------------------------------------------

/// Read an archive and carve out the sequence, profile and label blocks.
///
/// The raw arrays are owned here and released before returning, so peak memory
/// is one raw archive plus the three blocks.
pub fn load_and_slice(path: &Path, container: ContainerKind, layout: &FeatureLayout) -> Result<FeatureBlocks> {
    let raw = read_archive(path, container)?;
    slice_archive(raw, layout, path)
}

/// Slice already-read arrays. `path` is only used in error messages.
pub fn slice_archive(raw: RawArchive, layout: &FeatureLayout, path: &Path) -> Result<FeatureBlocks> {
    let sequence_width = layout.sequence.len();
    if sequence_width > MAX_CHANNELS {
        return Err(DatasetError::ShapeMismatch {
            path: path.to_path_buf(),
            expected: format!("at most {MAX_CHANNELS} sequence channels"),
            found: vec![sequence_width],
        });
    }
    match raw {
        RawArchive::Dense(data) => {
            let data = as_records(data, layout.feature_width, true, path)?;
            for range in [&layout.sequence, &layout.profile, &layout.labels] {
                check_range(range, layout.feature_width, path)?;
            }
            Ok(FeatureBlocks {
                sequence: take(&data, &layout.sequence),
                profile: take(&data, &layout.profile),
                labels: take(&data, &layout.labels),
            })
        }
        RawArchive::Grouped { features, labels } => {
            let label_width = layout.label_width.unwrap_or(layout.labels.end);
            let features = as_records(features, layout.feature_width, false, path)?;
            let labels = as_records(labels, label_width, false, path)?;
            check_range(&layout.sequence, layout.feature_width, path)?;
            check_range(&layout.profile, layout.feature_width, path)?;
            check_range(&layout.labels, label_width, path)?;

            let (n_features, n_labels) = (features.len_of(Axis(0)), labels.len_of(Axis(0)));
            if n_features != n_labels {
                return Err(DatasetError::ShapeMismatch {
                    path: path.to_path_buf(),
                    expected: format!("labels with {n_features} records"),
                    found: labels.shape().to_vec(),
                });
            }
            Ok(FeatureBlocks {
                sequence: take(&features, &layout.sequence),
                profile: take(&features, &layout.profile),
                labels: take(&labels, &layout.labels),
            })
        }
    }
}

fn take(data: &Array3<f32>, channels: &Range<usize>) -> Array3<f32> {
    data.slice(s![.., .., channels.clone()]).to_owned()
}

fn check_range(range: &Range<usize>, width: usize, path: &Path) -> Result<()> {
    if range.start < range.end && range.end <= width {
        return Ok(());
    }
    Err(DatasetError::ShapeMismatch {
        path: path.to_path_buf(),
        expected: format!("channel range {range:?} inside width {width}"),
        found: vec![width],
    })
}

/// View an array as `(records, 700, width)`.
///
/// With `allow_flat`, rank-1 and rank-2 arrays whose size is a whole number of
/// records are reshaped the way `reshape(-1, 700, width)` would.
fn as_records(data: ArrayD<f32>, width: usize, allow_flat: bool, path: &Path) -> Result<Array3<f32>> {
    let per_record = SEQUENCE_LENGTH * width;
    let shape = data.shape().to_vec();
    let fits = match shape.as_slice() {
        [_, l, w] => *l == SEQUENCE_LENGTH && *w == width,
        [_, flat] => allow_flat && *flat == per_record,
        [total] => allow_flat && total % per_record == 0,
        _ => false,
    };
    let mismatch = || DatasetError::ShapeMismatch {
        path: path.to_path_buf(),
        expected: if allow_flat {
            format!("(N, {SEQUENCE_LENGTH}, {width}) or (N, {per_record})")
        } else {
            format!("(N, {SEQUENCE_LENGTH}, {width})")
        },
        found: shape.clone(),
    };
    if !fits {
        return Err(mismatch());
    }

    let records = data.len() / per_record;
    let data = if data.is_standard_layout() {
        data
    } else {
        data.as_standard_layout().into_owned()
    };
    data.into_shape((records, SEQUENCE_LENGTH, width))
        .map_err(|_| mismatch())
}

// ---------------------------------------------------------------------------
// DatasetLoader
// ---------------------------------------------------------------------------

/// Knobs for the training split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    /// Multiplies the 5278 / 256 base split sizes.
    pub scale: f64,
    /// Fixed shuffle seed; `None` draws from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            scale: 1.0,
            seed: None,
        }
    }
}

/// One loader for every dataset in the registry.
pub struct DatasetLoader<F = HttpFetcher> {
    registry: DatasetRegistry,
    fetcher: F,
}

impl DatasetLoader<HttpFetcher> {
    pub fn new(registry: DatasetRegistry) -> Result<Self> {
        Ok(Self::with_fetcher(registry, HttpFetcher::new()?))
    }
}

impl<F: Fetcher> DatasetLoader<F> {
    pub fn with_fetcher(registry: DatasetRegistry, fetcher: F) -> Self {
        DatasetLoader { registry, fetcher }
    }

    pub fn registry(&self) -> &DatasetRegistry {
        &self.registry
    }

    /// Download and decompress `id` unless it is already on disk.
    pub fn ensure_local(&self, id: DatasetId) -> Result<PathBuf> {
        ensure_local(&self.registry, id, &self.fetcher)
    }

    /// Acquire, load, slice, encode and (for training sets) split `id`.
    pub fn load(&self, id: DatasetId, options: &LoadOptions) -> Result<LoadedDataset> {
        info!("loading {id}...");
        let desc = self.registry.descriptor(id)?;
        if !desc.container.is_supported() {
            return Err(DatasetError::UnsupportedContainer {
                kind: desc.container.to_string(),
            });
        }

        let path = self.ensure_local(id)?;
        if !path.is_file() {
            return Err(DatasetError::ArchiveMissing { id, path });
        }

        let mut blocks = load_and_slice(&path, desc.container, &desc.layout)?;
        debug!(
            "{id}: sequence {:?}, profile {:?}, labels {:?}",
            blocks.sequence.dim(),
            blocks.profile.dim(),
            blocks.labels.dim()
        );
        if let Some(max) = desc.max_records {
            blocks = blocks.truncate(max);
        }

        let dataset = match desc.role {
            Role::Test => LoadedDataset {
                id,
                primary: encode(blocks)?,
                validation: None,
                split: None,
            },
            Role::Training => {
                let indices = split(blocks.len(), options.scale, options.seed)?;
                let train = blocks.select(&indices.train);
                let validation = blocks.select(&indices.validation);
                drop(blocks);
                LoadedDataset {
                    id,
                    primary: encode(train)?,
                    validation: Some(encode(validation)?),
                    split: Some(indices),
                }
            }
        };
        info!("{dataset} loaded");
        Ok(dataset)
    }
}

fn encode(blocks: FeatureBlocks) -> Result<EncodedSet> {
    let FeatureBlocks {
        sequence,
        profile,
        labels,
    } = blocks;
    Ok(EncodedSet {
        sequence: collapse_onehot(sequence.view())?,
        profile,
        labels,
    })
}
