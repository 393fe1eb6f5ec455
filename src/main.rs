use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use psp_data::export::{summary_table, write_parquet, write_split_csv};
use psp_data::{DatasetError, DatasetLoader, DatasetRegistry, LoadOptions, LoadedDataset};

/// Environment:
/// * `PSP_DATA_CONFIG` – JSON registry overriding the built-in table
/// * `PSP_DATA_SCALE`  – training split scale factor (default 1.0)
/// * `PSP_DATA_SEED`   – shuffle seed for a reproducible split
/// * `PSP_DATA_EXPORT` – directory to write Parquet / CSV exports into
/// * `RUST_LOG`        – log filter
fn main() -> Result<()> {
    env_logger::init();

    let registry = match env::var_os("PSP_DATA_CONFIG") {
        Some(path) => DatasetRegistry::from_json_file(Path::new(&path))?,
        None => DatasetRegistry::default(),
    };
    let options = LoadOptions {
        scale: parse_var("PSP_DATA_SCALE")?.unwrap_or(1.0),
        seed: parse_var("PSP_DATA_SEED")?,
    };
    let export_dir = env::var_os("PSP_DATA_EXPORT").map(PathBuf::from);

    let ids: Vec<_> = registry.datasets.keys().copied().collect();
    let loader = DatasetLoader::new(registry)?;

    let mut loaded = Vec::with_capacity(ids.len());
    for id in ids {
        let dataset = match loader.load(id, &options) {
            Ok(dataset) => dataset,
            Err(e @ DatasetError::UnsupportedContainer { .. }) => {
                warn!("skipping {id}: {e}");
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("loading {id}")),
        };
        if let Some(dir) = &export_dir {
            export(&dataset, dir)?;
        }
        loaded.push(dataset);
    }

    println!("{}", summary_table(&loaded)?);
    Ok(())
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{name}={raw:?} is not valid")),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading {name}")),
    }
}

fn export(dataset: &LoadedDataset, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let stem = dataset.kind().file_stem();

    let primary = dir.join(format!("{stem}.parquet"));
    write_parquet(dataset.primary(), &primary)?;
    info!("wrote {}", primary.display());

    if let Some(validation) = dataset.validation() {
        let path = dir.join(format!("{stem}_validation.parquet"));
        write_parquet(validation, &path)?;
        info!("wrote {}", path.display());
    }
    if let Some(split) = dataset.split() {
        let path = dir.join(format!("{stem}_split.csv"));
        write_split_csv(split, &path)?;
        info!("wrote {}", path.display());
    }
    Ok(())
}
