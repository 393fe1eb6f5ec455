use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};

/// Fixed residue axis of every archive.
pub const SEQUENCE_LENGTH: usize = 700;

// ---------------------------------------------------------------------------
// DatasetId – which archive
// ---------------------------------------------------------------------------

/// Available datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatasetId {
    /// CullPDB 6133, redundancy-filtered against CB513.
    Cullpdb6133Filtered,
    /// CullPDB 6133, unfiltered.
    Cullpdb6133,
    Cb513,
    Casp10,
    Casp11,
}

impl DatasetId {
    pub const ALL: [DatasetId; 5] = [
        DatasetId::Cullpdb6133Filtered,
        DatasetId::Cullpdb6133,
        DatasetId::Cb513,
        DatasetId::Casp10,
        DatasetId::Casp11,
    ];

    /// Stable kebab-case name, as used in registry JSON and output file names.
    pub fn file_stem(self) -> &'static str {
        match self {
            DatasetId::Cullpdb6133Filtered => "cullpdb6133-filtered",
            DatasetId::Cullpdb6133 => "cullpdb6133",
            DatasetId::Cb513 => "cb513",
            DatasetId::Casp10 => "casp10",
            DatasetId::Casp11 => "casp11",
        }
    }

    /// Only meaningful for the CullPDB training archives.
    pub fn is_filtered(self) -> bool {
        matches!(self, DatasetId::Cullpdb6133Filtered)
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetId::Cullpdb6133Filtered => write!(f, "CullPDB6133 training dataset (filtered)"),
            DatasetId::Cullpdb6133 => write!(f, "CullPDB6133 training dataset (unfiltered)"),
            DatasetId::Cb513 => write!(f, "CB513 test dataset"),
            DatasetId::Casp10 => write!(f, "CASP10 test dataset"),
            DatasetId::Casp11 => write!(f, "CASP11 test dataset"),
        }
    }
}

impl FromStr for DatasetId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cullpdb6133-filtered" | "cullpdb-filtered" | "train" => {
                Ok(DatasetId::Cullpdb6133Filtered)
            }
            "cullpdb6133" | "cullpdb" => Ok(DatasetId::Cullpdb6133),
            "cb513" => Ok(DatasetId::Cb513),
            "casp10" => Ok(DatasetId::Casp10),
            "casp11" => Ok(DatasetId::Casp11),
            other => Err(format!("unknown dataset '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptor pieces
// ---------------------------------------------------------------------------

/// What the loader does with the records after encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Shuffled and cut into train/validation.
    Training,
    /// Kept whole, in file order.
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Single-member gzip.
    #[default]
    Gzip,
    /// Body is already the archive.
    None,
}

/// On-disk container holding the decompressed arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// One dense `.npy` array, reshaped to `(-1, 700, feature_width)`.
    Npy,
    /// `.npz` with named `features` and `labels` arrays.
    Npz,
    /// HDF5 file with named `features` and `labels` datasets.
    Hdf5,
}

impl ContainerKind {
    /// Dense containers carry labels inside the feature tensor.
    pub fn is_grouped(self) -> bool {
        !matches!(self, ContainerKind::Npy)
    }

    /// Whether this build can read the container. HDF5 needs the `hdf5` feature.
    pub fn is_supported(self) -> bool {
        match self {
            ContainerKind::Npy | ContainerKind::Npz => true,
            ContainerKind::Hdf5 => cfg!(feature = "hdf5"),
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Npy => write!(f, "npy"),
            ContainerKind::Npz => write!(f, "npz"),
            ContainerKind::Hdf5 => write!(f, "hdf5"),
        }
    }
}

/// Offsets into the last axis. Ranges are half-open.
///
/// For dense containers all three ranges index the single feature tensor. For
/// grouped containers `sequence` and `profile` index `features` while `labels`
/// indexes the separate `labels` tensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureLayout {
    /// Width of the feature tensor's last axis.
    pub feature_width: usize,
    /// Width of the separate labels tensor, grouped containers only.
    #[serde(default)]
    pub label_width: Option<usize>,
    pub sequence: Range<usize>,
    pub profile: Range<usize>,
    pub labels: Range<usize>,
}

impl FeatureLayout {
    /// CullPDB / CB513: 57 channels per residue.
    pub fn dense() -> Self {
        FeatureLayout {
            feature_width: 57,
            label_width: None,
            sequence: 0..21,
            profile: 35..56,
            labels: 22..30,
        }
    }

    /// CASP10 / CASP11: 42 feature channels plus 8 label channels.
    pub fn grouped() -> Self {
        FeatureLayout {
            feature_width: 42,
            label_width: Some(8),
            sequence: 0..21,
            profile: 21..42,
            labels: 0..8,
        }
    }
}

// ---------------------------------------------------------------------------
// DatasetDescriptor / DatasetRegistry
// ---------------------------------------------------------------------------

/// Everything the loader needs to know about one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub url: String,
    /// Transient download target, removed after decompression.
    pub compressed_file: String,
    /// Persistent archive; its presence marks the dataset as acquired.
    pub archive_file: String,
    #[serde(default)]
    pub compression: Compression,
    pub container: ContainerKind,
    pub role: Role,
    pub layout: FeatureLayout,
    /// Keep only the first `n` records.
    #[serde(default)]
    pub max_records: Option<usize>,
}

/// Immutable table of dataset descriptors plus the local data directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRegistry {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    pub datasets: BTreeMap<DatasetId, DatasetDescriptor>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

const ICML2014_BASE: &str = "https://www.princeton.edu/~jzthree/datasets/ICML2014";
const CASP_BASE: &str = "https://github.com/amckenna41/psp_gcp/raw/master/data";

fn dense(url: String, compressed: &str, role: Role, max_records: Option<usize>) -> DatasetDescriptor {
    DatasetDescriptor {
        url,
        compressed_file: compressed.to_string(),
        archive_file: compressed.trim_end_matches(".gz").to_string(),
        compression: Compression::Gzip,
        container: ContainerKind::Npy,
        role,
        layout: FeatureLayout::dense(),
        max_records,
    }
}

fn casp(name: &str) -> DatasetDescriptor {
    DatasetDescriptor {
        url: format!("{CASP_BASE}/{name}.h5.gz"),
        compressed_file: format!("{name}.h5.gz"),
        archive_file: format!("{name}.h5"),
        compression: Compression::Gzip,
        container: ContainerKind::Hdf5,
        role: Role::Test,
        layout: FeatureLayout::grouped(),
        max_records: None,
    }
}

impl Default for DatasetRegistry {
    fn default() -> Self {
        let mut datasets = BTreeMap::new();
        datasets.insert(
            DatasetId::Cullpdb6133Filtered,
            dense(
                format!("{ICML2014_BASE}/cullpdb+profile_6133_filtered.npy.gz"),
                "cullpdb+profile_6133_filtered.npy.gz",
                Role::Training,
                None,
            ),
        );
        datasets.insert(
            DatasetId::Cullpdb6133,
            dense(
                format!("{ICML2014_BASE}/cullpdb+profile_6133.npy.gz"),
                "cullpdb+profile_6133.npy.gz",
                Role::Training,
                None,
            ),
        );
        datasets.insert(
            DatasetId::Cb513,
            dense(
                format!("{ICML2014_BASE}/cb513+profile_split1.npy.gz"),
                "cb513+profile_split1.npy.gz",
                Role::Test,
                Some(514),
            ),
        );
        datasets.insert(DatasetId::Casp10, casp("casp10"));
        datasets.insert(DatasetId::Casp11, casp("casp11"));

        DatasetRegistry {
            data_dir: default_data_dir(),
            datasets,
        }
    }
}

impl DatasetRegistry {
    /// Load a registry from JSON. Missing `data_dir` falls back to `data/`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
        serde_json::from_str(&text).map_err(|source| DatasetError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn descriptor(&self, id: DatasetId) -> Result<&DatasetDescriptor> {
        self.datasets
            .get(&id)
            .ok_or(DatasetError::UnknownDataset { id })
    }

    pub fn archive_path(&self, id: DatasetId) -> Result<PathBuf> {
        Ok(self.data_dir.join(&self.descriptor(id)?.archive_file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hdf5_support_follows_feature() {
        assert!(ContainerKind::Npy.is_supported());
        assert!(ContainerKind::Npz.is_supported());
        assert_eq!(ContainerKind::Hdf5.is_supported(), cfg!(feature = "hdf5"));
    }

    #[test]
    fn dense_offsets_do_not_overlap() {
        let layout = FeatureLayout::dense();
        let blocks = [&layout.sequence, &layout.profile, &layout.labels];
        for (i, a) in blocks.iter().enumerate() {
            assert!(a.end <= layout.feature_width);
            for b in blocks.iter().skip(i + 1) {
                assert!(a.end <= b.start || b.end <= a.start, "{a:?} overlaps {b:?}");
            }
        }
        assert_eq!(layout.sequence.len(), 21);
        assert_eq!(layout.profile.len(), 21);
        assert_eq!(layout.labels.len(), 8);
    }

    #[test]
    fn grouped_feature_offsets_do_not_overlap() {
        let layout = FeatureLayout::grouped();
        assert_eq!(layout.sequence.end, layout.profile.start);
        assert_eq!(layout.profile.end, layout.feature_width);
        assert_eq!(Some(layout.labels.len()), layout.label_width);
    }

    #[test]
    fn default_registry_covers_every_dataset() {
        let registry = DatasetRegistry::default();
        for id in DatasetId::ALL {
            let desc = registry.descriptor(id).unwrap();
            assert_ne!(desc.compressed_file, desc.archive_file);
        }
        assert_eq!(
            registry.archive_path(DatasetId::Cb513).unwrap(),
            PathBuf::from("data/cb513+profile_split1.npy")
        );
        assert_eq!(registry.descriptor(DatasetId::Cb513).unwrap().max_records, Some(514));
    }

    #[test]
    fn registry_survives_json() {
        let registry = DatasetRegistry::default().with_data_dir("/tmp/psp");
        let text = serde_json::to_string_pretty(&registry).unwrap();
        assert!(text.contains("\"cullpdb6133-filtered\""));
        let parsed: DatasetRegistry = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, registry);
    }

    #[test]
    fn missing_data_dir_defaults() {
        let text = r#"{ "datasets": {} }"#;
        let parsed: DatasetRegistry = serde_json::from_str(text).unwrap();
        assert_eq!(parsed.data_dir, PathBuf::from("data"));
        assert!(matches!(
            parsed.descriptor(DatasetId::Casp10),
            Err(DatasetError::UnknownDataset { id: DatasetId::Casp10 })
        ));
    }

    #[test]
    fn file_stem_matches_serde_name() {
        for id in DatasetId::ALL {
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json.trim_matches('"'), id.file_stem());
            assert_eq!(id.file_stem().parse::<DatasetId>().unwrap(), id);
        }
    }

    #[test]
    fn parses_dataset_names() {
        assert_eq!("CB513".parse::<DatasetId>(), Ok(DatasetId::Cb513));
        assert_eq!("train".parse::<DatasetId>(), Ok(DatasetId::Cullpdb6133Filtered));
        assert!("pdb".parse::<DatasetId>().is_err());
        assert!(DatasetId::Cullpdb6133Filtered.is_filtered());
        assert!(!DatasetId::Cullpdb6133.is_filtered());
    }
}
