//! Dataset generation: synthetic person records in both representations.
//!
//! The flat and nested datasets are drawn independently, one after the other,
//! from the same generator. They share size and value distributions but not
//! per-id values.

use crate::dataset::{self, DatasetFiles};
use crate::error::DatasetError;
use etl_core::pools::{
    self, CITIES, FIRST_NAMES, HOBBIES, LAST_NAMES, MAX_AGE, MAX_CREATED_YEAR, MAX_SCORE, MIN_AGE,
    MIN_CREATED_YEAR, MIN_SCORE,
};
use etl_core::records::join_hobbies;
use etl_core::{FlatRecord, Metadata, NestedRecord};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use std::fs;
use std::path::{Path, PathBuf};

/// Draws synthetic records.
///
/// A seeded generator gives byte-identical datasets across runs; the default
/// one seeds from OS entropy.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    seed: Option<u64>,
}

impl Generator {
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    pub fn with_seed(seed: Option<u64>) -> Self {
        Self { seed }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Write `n` flat and `n` nested records into `output_dir`.
    ///
    /// Returns `(flat_path, nested_path)`. Existing files of the same name are
    /// overwritten.
    pub fn generate(&self, n: usize, output_dir: &Path) -> Result<(PathBuf, PathBuf), DatasetError> {
        let files = DatasetFiles::in_dir(output_dir);
        self.write(n, &files)?;
        Ok(files.into_paths())
    }

    /// Write `n` records of each representation to the paths `files` owns.
    pub fn write(&self, n: usize, files: &DatasetFiles) -> Result<(), DatasetError> {
        if n == 0 {
            return Err(DatasetError::EmptyDataset);
        }
        if let Some(dir) = files.flat_path().parent() {
            fs::create_dir_all(dir).map_err(|e| DatasetError::io(dir, e))?;
        }

        log::info!("Generating {n} records...");
        let mut rng = self.rng();
        let ages = AgeSampler::new();

        let flat: Vec<FlatRecord> = (1..=n as u64)
            .map(|id| flat_record(&mut rng, &ages, id))
            .collect();
        dataset::write_flat(files.flat_path(), &flat)?;
        drop(flat);

        let nested: Vec<NestedRecord> = (1..=n as u64)
            .map(|id| nested_record(&mut rng, &ages, id))
            .collect();
        dataset::write_nested(files.nested_path(), &nested)?;

        log::info!(
            "Wrote {} and {}",
            files.flat_path().display(),
            files.nested_path().display()
        );
        Ok(())
    }

    /// Draw `n` flat records without touching the filesystem.
    pub fn flat_records(&self, n: usize) -> Vec<FlatRecord> {
        let mut rng = self.rng();
        let ages = AgeSampler::new();
        (1..=n as u64)
            .map(|id| flat_record(&mut rng, &ages, id))
            .collect()
    }

    /// Draw `n` nested records without touching the filesystem.
    pub fn nested_records(&self, n: usize) -> Vec<NestedRecord> {
        let mut rng = self.rng();
        let ages = AgeSampler::new();
        (1..=n as u64)
            .map(|id| nested_record(&mut rng, &ages, id))
            .collect()
    }
}

/// `generate(n, output_dir)` with an entropy-seeded generator.
pub fn generate(n: usize, output_dir: &Path) -> Result<(PathBuf, PathBuf), DatasetError> {
    Generator::default().generate(n, output_dir)
}

/// Three-tier weighted age distribution over `MIN_AGE..=MAX_AGE`.
struct AgeSampler {
    index: WeightedIndex<u32>,
}

impl AgeSampler {
    fn new() -> Self {
        let weights = (MIN_AGE..=MAX_AGE).map(pools::age_weight);
        Self {
            index: WeightedIndex::new(weights).expect("age weights are positive"),
        }
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> u32 {
        MIN_AGE + self.index.sample(rng) as u32
    }
}

struct Person {
    name: String,
    age: u32,
    city: String,
    hobbies: Vec<&'static str>,
}

fn person<R: Rng>(rng: &mut R, ages: &AgeSampler) -> Person {
    let first = FIRST_NAMES.choose(rng).copied().unwrap_or_default();
    let last = LAST_NAMES.choose(rng).copied().unwrap_or_default();
    let age = ages.sample(rng);
    let count = rng.gen_range(1..=pools::max_hobbies(age));
    let hobbies = HOBBIES.choose_multiple(rng, count).copied().collect();
    let city = CITIES.choose(rng).copied().unwrap_or_default();

    Person {
        name: format!("{first} {last}"),
        age,
        city: city.to_string(),
        hobbies,
    }
}

fn flat_record<R: Rng>(rng: &mut R, ages: &AgeSampler, id: u64) -> FlatRecord {
    let p = person(rng, ages);
    FlatRecord {
        id,
        name: p.name,
        age: p.age,
        city: p.city,
        hobbies: join_hobbies(&p.hobbies),
    }
}

fn nested_record<R: Rng>(rng: &mut R, ages: &AgeSampler, id: u64) -> NestedRecord {
    let p = person(rng, ages);
    let metadata = Metadata {
        created_year: rng.gen_range(MIN_CREATED_YEAR..=MAX_CREATED_YEAR),
        active: rng.gen_bool(0.5),
        score: (rng.gen_range(MIN_SCORE..=MAX_SCORE) * 100.0).round() / 100.0,
    };
    NestedRecord {
        id,
        name: p.name,
        age: p.age,
        city: p.city,
        hobbies: p.hobbies.into_iter().map(str::to_string).collect(),
        metadata,
    }
}
