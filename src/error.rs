use std::path::PathBuf;

use thiserror::Error;

use crate::config::DatasetId;

pub type Result<T> = std::result::Result<T, DatasetError>;

/// Everything that can go wrong between the remote archive and the encoded arrays.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Transport failure or non-success HTTP status. Fatal for this call.
    #[error("fetching {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Local filesystem failure while acquiring or reading an archive.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("decompressing {}: {source}", path.display())]
    Decompress {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The decompressed archive is still absent after acquisition returned.
    #[error("{id} archive not found at {} after acquisition", path.display())]
    ArchiveMissing { id: DatasetId, path: PathBuf },

    #[error("{}: expected shape {expected}, found {found:?}", path.display())]
    ShapeMismatch {
        path: PathBuf,
        expected: String,
        found: Vec<usize>,
    },

    #[error("{}: container has no '{group}' dataset", path.display())]
    MissingGroup { path: PathBuf, group: String },

    #[error("reading {}: {source}", path.display())]
    Npy {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },

    #[error("reading {}: {source}", path.display())]
    Npz {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpzError,
    },

    #[cfg(feature = "hdf5")]
    #[error("reading {}: {source}", path.display())]
    Hdf5 {
        path: PathBuf,
        #[source]
        source: hdf5::Error,
    },

    /// Channel indices would not fit the category type.
    #[error("{channels} one-hot channels cannot be collapsed; at most {max} fit a category")]
    TooManyChannels { channels: usize, max: usize },

    /// The container kind is known but this build cannot read it.
    #[error("{kind} containers are not supported by this build")]
    UnsupportedContainer { kind: String },

    #[error("{id} is not present in the dataset registry")]
    UnknownDataset { id: DatasetId },

    #[error("scale factor must be finite and non-negative, got {0}")]
    InvalidScale(f64),

    /// `train_count + val_count` exceeds the number of records.
    #[error("split needs {train} train + {validation} validation records but only {available} exist")]
    SplitTooLarge {
        train: usize,
        validation: usize,
        available: usize,
    },

    #[error("invalid registry {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl DatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DatasetError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the caller may reasonably retry after fixing local state
    /// (permissions, disk space) without touching the remote side.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DatasetError::Io { .. })
    }
}
