//! Read/write candidate-pair JSON files.
//!
//! A pair file holds precomputed observation records (positions in radians,
//! parallax in mas, proper motions in mas/yr, optional RV in km/s, and the 4×4
//! precision over those) plus the trial-distance grids chosen by whoever wrote
//! the file. Building the records from a catalog happens upstream.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

use crate::domain::{SkyPosition, StarObservation};
use crate::error::EvidenceError;

/// One star as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarRecord {
    pub ra: f64,
    pub dec: f64,
    pub parallax: f64,
    pub pm_ra: f64,
    pub pm_dec: f64,
    #[serde(default)]
    pub rv: Option<f64>,
    /// Row-major precision over `(parallax, pm_ra, pm_dec, rv)`.
    pub precision: [[f64; 4]; 4],
}

impl StarRecord {
    pub fn to_observation(&self) -> Result<StarObservation, EvidenceError> {
        let precision = Matrix4::from_fn(|i, j| self.precision[i][j]);
        StarObservation::new(
            SkyPosition::new(self.ra, self.dec)?,
            self.parallax,
            self.pm_ra,
            self.pm_dec,
            self.rv,
            precision,
        )
    }

    pub fn from_observation(obs: &StarObservation) -> Self {
        let p = obs.precision();
        let mut precision = [[0.0; 4]; 4];
        for (i, row) in precision.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = p[(i, j)];
            }
        }
        Self {
            ra: obs.position().lon(),
            dec: obs.position().lat(),
            parallax: obs.parallax(),
            pm_ra: obs.pm_ra(),
            pm_dec: obs.pm_dec(),
            rv: obs.rv(),
            precision,
        }
    }
}

/// A candidate pair and its trial-distance grids (pc).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRecord {
    pub index: usize,
    pub star1: StarRecord,
    pub star2: StarRecord,
    pub distances1: Vec<f64>,
    pub distances2: Vec<f64>,
    /// Free-form tag (e.g. "comoving" for simulated pairs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairFile {
    pub pairs: Vec<PairRecord>,
}

/// Read a pair file.
pub fn read_pairs_json(path: &Path) -> Result<PairFile, EvidenceError> {
    let file = File::open(path).map_err(|e| {
        EvidenceError::io(format!("Failed to open pairs JSON '{}': {e}", path.display()))
    })?;
    let pairs: PairFile = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| EvidenceError::format(format!("Invalid pairs JSON: {e}")))?;
    Ok(pairs)
}

/// Write a pair file.
pub fn write_pairs_json(path: &Path, pairs: &PairFile) -> Result<(), EvidenceError> {
    let file = File::create(path).map_err(|e| {
        EvidenceError::io(format!("Failed to create pairs JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), pairs)
        .map_err(|e| EvidenceError::format(format!("Failed to write pairs JSON: {e}")))?;
    Ok(())
}
