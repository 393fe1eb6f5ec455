//! Fetch, slice, encode and split protein secondary-structure datasets
//! (CullPDB 6133, CB513, CASP10, CASP11).
//!
//! ```no_run
//! use psp_data::{DatasetId, DatasetLoader, DatasetRegistry, LoadOptions};
//!
//! # fn main() -> psp_data::Result<()> {
//! let loader = DatasetLoader::new(DatasetRegistry::default())?;
//! let train = loader.load(DatasetId::Cullpdb6133Filtered, &LoadOptions::default())?;
//! println!("{train}: {:?}", train.shape());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod export;

pub use config::{DatasetDescriptor, DatasetId, DatasetRegistry, FeatureLayout, Role};
pub use data::{DatasetLoader, EncodedSet, LoadOptions, LoadedDataset};
pub use error::{DatasetError, Result};
