use std::fs::File;
use std::path::{Path, PathBuf};

use log::debug;
use ndarray::ArrayD;
use ndarray_npy::{NpzReader, ReadNpyError, ReadNpyExt, ReadNpzError};

use crate::config::ContainerKind;
use crate::error::{DatasetError, Result};

/// Name of the feature tensor inside grouped containers.
pub const FEATURES_GROUP: &str = "features";
/// Name of the label tensor inside grouped containers.
pub const LABELS_GROUP: &str = "labels";

// ---------------------------------------------------------------------------
// RawArchive – decompressed arrays straight off disk
// ---------------------------------------------------------------------------

/// Arrays read from an archive, before any shape checks or slicing.
#[derive(Debug)]
pub enum RawArchive {
    /// One tensor holding features and labels side by side.
    Dense(ArrayD<f32>),
    /// Separate `features` and `labels` tensors.
    Grouped {
        features: ArrayD<f32>,
        labels: ArrayD<f32>,
    },
}

/// Read an archive. Dispatch by container kind.
pub fn read_archive(path: &Path, kind: ContainerKind) -> Result<RawArchive> {
    match kind {
        ContainerKind::Npy => read_dense_npy(path).map(RawArchive::Dense),
        ContainerKind::Npz => read_grouped(&mut NpzContainer::open(path)?),
        ContainerKind::Hdf5 => read_hdf5(path),
    }
}

#[cfg(feature = "hdf5")]
fn read_hdf5(path: &Path) -> Result<RawArchive> {
    read_grouped(&mut Hdf5Container::open(path)?)
}

#[cfg(not(feature = "hdf5"))]
fn read_hdf5(_path: &Path) -> Result<RawArchive> {
    Err(DatasetError::UnsupportedContainer {
        kind: ContainerKind::Hdf5.to_string(),
    })
}

fn read_grouped(container: &mut dyn ArrayContainer) -> Result<RawArchive> {
    debug!("reading '{FEATURES_GROUP}' and '{LABELS_GROUP}' from {}", container.path().display());
    let features = container.read_named(FEATURES_GROUP)?;
    let labels = container.read_named(LABELS_GROUP)?;
    Ok(RawArchive::Grouped { features, labels })
}

// ---------------------------------------------------------------------------
// Dense .npy
// ---------------------------------------------------------------------------

/// Read a dense `.npy` array as `f32`, converting from `f64` when that is
/// what the file stores.
pub fn read_dense_npy(path: &Path) -> Result<ArrayD<f32>> {
    let open = || File::open(path).map_err(|e| DatasetError::io(path, e));
    let npy_err = |source| DatasetError::Npy {
        path: path.to_path_buf(),
        source,
    };

    match ArrayD::<f32>::read_npy(open()?) {
        Ok(array) => Ok(array),
        Err(ReadNpyError::WrongDescriptor(_)) => {
            debug!("{} is not f32, reading as f64", path.display());
            let wide = ArrayD::<f64>::read_npy(open()?).map_err(npy_err)?;
            Ok(wide.mapv(|v| v as f32))
        }
        Err(e) => Err(npy_err(e)),
    }
}

// ---------------------------------------------------------------------------
// Named-group containers
// ---------------------------------------------------------------------------

/// A file exposing several named multi-dimensional arrays.
pub trait ArrayContainer {
    fn path(&self) -> &Path;

    /// Read the array called `name` as `f32`.
    fn read_named(&mut self, name: &str) -> Result<ArrayD<f32>>;
}

/// `.npz` archive as written by `numpy.savez`.
pub struct NpzContainer {
    path: PathBuf,
    reader: NpzReader<File>,
}

impl NpzContainer {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| DatasetError::io(path, e))?;
        let reader = NpzReader::new(file).map_err(|source| DatasetError::Npz {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(NpzContainer {
            path: path.to_path_buf(),
            reader,
        })
    }

    fn npz_err(&self, source: ReadNpzError) -> DatasetError {
        DatasetError::Npz {
            path: self.path.clone(),
            source,
        }
    }

    /// `numpy.savez` stores `name` as `name.npy`; accept either spelling.
    fn entry_name(&mut self, name: &str) -> Result<String> {
        let names = self.reader.names().map_err(|e| self.npz_err(e))?;
        let with_ext = format!("{name}.npy");
        names
            .into_iter()
            .find(|n| n == name || *n == with_ext)
            .ok_or_else(|| DatasetError::MissingGroup {
                path: self.path.clone(),
                group: name.to_string(),
            })
    }
}

impl ArrayContainer for NpzContainer {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read_named(&mut self, name: &str) -> Result<ArrayD<f32>> {
        let entry = self.entry_name(name)?;
        let narrow: std::result::Result<ArrayD<f32>, _> = self.reader.by_name(&entry);
        match narrow {
            Ok(array) => Ok(array),
            Err(ReadNpzError::Npy(ReadNpyError::WrongDescriptor(_))) => {
                let wide: ArrayD<f64> = self.reader.by_name(&entry).map_err(|e| self.npz_err(e))?;
                Ok(wide.mapv(|v| v as f32))
            }
            Err(e) => Err(self.npz_err(e)),
        }
    }
}

/// HDF5 file with top-level datasets.
#[cfg(feature = "hdf5")]
pub struct Hdf5Container {
    path: PathBuf,
    file: hdf5::File,
}

#[cfg(feature = "hdf5")]
impl Hdf5Container {
    pub fn open(path: &Path) -> Result<Self> {
        let file = hdf5::File::open(path).map_err(|source| DatasetError::Hdf5 {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Hdf5Container {
            path: path.to_path_buf(),
            file,
        })
    }
}

#[cfg(feature = "hdf5")]
impl ArrayContainer for Hdf5Container {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read_named(&mut self, name: &str) -> Result<ArrayD<f32>> {
        let h5_err = |source| DatasetError::Hdf5 {
            path: self.path.clone(),
            source,
        };
        if !self.file.link_exists(name) {
            return Err(DatasetError::MissingGroup {
                path: self.path.clone(),
                group: name.to_string(),
            });
        }
        let dataset = self.file.dataset(name).map_err(h5_err)?;
        if dataset.dtype().map_err(h5_err)?.size() == 8 {
            let wide = dataset.read_dyn::<f64>().map_err(h5_err)?;
            Ok(wide.mapv(|v| v as f32))
        } else {
            dataset.read_dyn::<f32>().map_err(h5_err)
        }
    }
}
