//! Writes small synthetic archives in the on-disk formats the loader reads,
//! so everything downstream can be exercised offline.
//!
//! Usage: `generate_sample [DATA_DIR] [TRAIN_RECORDS]` (defaults: `data`, 600).
//! CASP sets are written as `.npz`; point a registry at them with
//! `"container": "npz"`.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array3, ArrayViewMut1, Axis};
use ndarray_npy::{NpzWriter, WriteNpyExt};
use psp_data::config::SEQUENCE_LENGTH;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const RESIDUES: usize = 21;
const STATES: usize = 8;

/// One protein: residues, profile rows and labels up to a random length,
/// zero padding after it.
struct Protein {
    residues: Vec<usize>,
    states: Vec<usize>,
    profile: Vec<[f32; RESIDUES]>,
}

impl Protein {
    fn random(rng: &mut StdRng) -> Self {
        let len = rng.gen_range(50..SEQUENCE_LENGTH);
        let residues: Vec<usize> = (0..len).map(|_| rng.gen_range(0..RESIDUES)).collect();
        let states = (0..len).map(|_| rng.gen_range(0..STATES)).collect();
        let profile = residues
            .iter()
            .map(|&r| {
                let mut row = [0f32; RESIDUES];
                for (c, v) in row.iter_mut().enumerate() {
                    // the observed residue scores highest
                    *v = if c == r { 0.9 } else { 0.3 * rng.gen::<f32>() };
                }
                row
            })
            .collect();
        Protein {
            residues,
            states,
            profile,
        }
    }

    /// CullPDB layout, 57 channels: residues 0..22 (21 = no-seq), states 22..31
    /// (30 = no-seq), termini 31..33, solvent 33..35, profile 35..57.
    fn fill_dense(&self, mut record: ndarray::ArrayViewMut2<'_, f32>) {
        for (j, mut pos) in record.axis_iter_mut(Axis(0)).enumerate() {
            if j < self.residues.len() {
                pos[self.residues[j]] = 1.0;
                pos[22 + self.states[j]] = 1.0;
                write_profile(&mut pos, 35, &self.profile[j]);
            } else {
                pos[21] = 1.0;
                pos[30] = 1.0;
            }
        }
    }

    /// CASP layout: features = residues 0..21 + profile 21..42, labels = 8 states.
    fn fill_grouped(
        &self,
        mut features: ndarray::ArrayViewMut2<'_, f32>,
        mut labels: ndarray::ArrayViewMut2<'_, f32>,
    ) {
        for j in 0..self.residues.len() {
            let mut pos = features.index_axis_mut(Axis(0), j);
            pos[self.residues[j]] = 1.0;
            write_profile(&mut pos, RESIDUES, &self.profile[j]);
            labels[[j, self.states[j]]] = 1.0;
        }
    }
}

fn write_profile(pos: &mut ArrayViewMut1<'_, f32>, offset: usize, row: &[f32; RESIDUES]) {
    for (c, &v) in row.iter().enumerate() {
        pos[offset + c] = v;
    }
}

fn dense_archive(rng: &mut StdRng, n: usize) -> Array3<f32> {
    let mut data = Array3::<f32>::zeros((n, SEQUENCE_LENGTH, 57));
    for record in data.axis_iter_mut(Axis(0)) {
        Protein::random(rng).fill_dense(record);
    }
    data
}

fn write_dense(path: &Path, data: &Array3<f32>) -> Result<()> {
    // Stored flat, the way the published archives are.
    let n = data.len_of(Axis(0));
    let flat = data
        .view()
        .into_shape((n, SEQUENCE_LENGTH * 57))
        .context("flattening archive")?;
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    flat.write_npy(BufWriter::new(file))
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn write_grouped(path: &Path, rng: &mut StdRng, n: usize) -> Result<()> {
    let mut features = Array3::<f32>::zeros((n, SEQUENCE_LENGTH, 2 * RESIDUES));
    let mut labels = Array3::<f32>::zeros((n, SEQUENCE_LENGTH, STATES));
    for (f, l) in features
        .axis_iter_mut(Axis(0))
        .zip(labels.axis_iter_mut(Axis(0)))
    {
        Protein::random(rng).fill_grouped(f, l);
    }

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut npz = NpzWriter::new(file);
    npz.add_array("features", &features).context("writing features")?;
    npz.add_array("labels", &labels).context("writing labels")?;
    npz.finish().context("finishing npz")?;
    Ok(())
}

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let dir = args.next().unwrap_or_else(|| "data".to_string());
    let train_records: usize = match args.next() {
        Some(raw) => raw.parse().with_context(|| format!("'{raw}' is not a record count"))?,
        None => 600,
    };
    let dir = Path::new(&dir);
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut rng = StdRng::seed_from_u64(42);

    let outputs = [
        ("cullpdb+profile_6133_filtered.npy", train_records),
        ("cullpdb+profile_6133.npy", train_records),
        ("cb513+profile_split1.npy", 520),
    ];
    for (name, n) in outputs {
        let path = dir.join(name);
        write_dense(&path, &dense_archive(&mut rng, n))?;
        println!("Wrote {n} records to {}", path.display());
    }

    for name in ["casp10.npz", "casp11.npz"] {
        let path = dir.join(name);
        write_grouped(&path, &mut rng, 100)?;
        println!("Wrote 100 records to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_gives_same_archive() {
        let a = dense_archive(&mut StdRng::seed_from_u64(42), 3);
        let b = dense_archive(&mut StdRng::seed_from_u64(42), 3);
        assert_eq!(a, b);
    }

    #[test]
    fn every_position_has_one_residue_channel() {
        let data = dense_archive(&mut StdRng::seed_from_u64(7), 4);
        for record in data.axis_iter(Axis(0)) {
            for pos in record.axis_iter(Axis(0)) {
                let hot = (0..22).filter(|&c| pos[c] == 1.0).count();
                assert_eq!(hot, 1);
                let states = (22..31).filter(|&c| pos[c] == 1.0).count();
                assert_eq!(states, 1);
            }
        }
    }

    #[test]
    fn protein_length_stays_inside_the_window() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let protein = Protein::random(&mut rng);
            assert!((50..SEQUENCE_LENGTH).contains(&protein.residues.len()));
            assert_eq!(protein.profile.len(), protein.residues.len());
        }
    }
}
