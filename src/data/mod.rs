/// Data layer: acquisition, loading, slicing, encoding and splitting.
///
/// Architecture:
/// ```text
///   remote .gz
///        │
///        ▼
///   ┌──────────┐
///   │  fetch    │  download if absent → decompress → data/<archive>
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ container  │  .npy (dense) / .npz, .h5 (features + labels)
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  shape check → slice → FeatureBlocks
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐   ┌──────────┐
///   │  split    │ → │  encode   │  one-hot → category ids
///   └──────────┘   └──────────┘
///        │
///        ▼
///   LoadedDataset
/// ```

pub mod container;
pub mod encode;
pub mod fetch;
pub mod loader;
pub mod model;
pub mod split;

pub use encode::{collapse_onehot, EMPTY_POSITION, MAX_CHANNELS};
pub use fetch::{ensure_local, Fetcher, HttpFetcher};
pub use loader::{load_and_slice, DatasetLoader, LoadOptions};
pub use model::{Category, EncodedSet, FeatureBlocks, LoadedDataset, SplitIndices};
pub use split::split;
