//! Export per-pair evidence to JSON.
//!
//! One entry per input pair, keyed by the pair's index. Rows rejected for a
//! singular covariance are written as `null` with the reason alongside, so a
//! downstream integrator can skip them without guessing.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EvidenceError;

/// Evidence for one pair across its trial-distance grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairResult {
    pub index: usize,
    pub distances1: Vec<f64>,
    pub distances2: Vec<f64>,
    pub ln_h1: Vec<Option<f64>>,
    pub ln_h2: Vec<Option<f64>>,
    /// Per-row rejection reason (same length as the grids).
    pub row_errors: Vec<Option<String>>,
    /// Set when the whole pair could not be evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PairResult {
    pub fn failed(index: usize, error: &EvidenceError) -> Self {
        Self {
            index,
            distances1: Vec::new(),
            distances2: Vec::new(),
            ln_h1: Vec::new(),
            ln_h2: Vec::new(),
            row_errors: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn n_ok(&self) -> usize {
        self.ln_h1.iter().filter(|v| v.is_some()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsFile {
    pub tool: String,
    pub generated: DateTime<Utc>,
    /// Velocity prior precision (row-major, (km/s)⁻²).
    pub velocity_prior: [[f64; 3]; 3],
    pub results: Vec<PairResult>,
}

/// Write a results file.
pub fn write_results_json(path: &Path, results: &ResultsFile) -> Result<(), EvidenceError> {
    let file = File::create(path).map_err(|e| {
        EvidenceError::io(format!("Failed to create results JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), results)
        .map_err(|e| EvidenceError::format(format!("Failed to write results JSON: {e}")))?;
    Ok(())
}

/// Read a results file.
pub fn read_results_json(path: &Path) -> Result<ResultsFile, EvidenceError> {
    let file = File::open(path).map_err(|e| {
        EvidenceError::io(format!("Failed to open results JSON '{}': {e}", path.display()))
    })?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| EvidenceError::format(format!("Invalid results JSON: {e}")))
}
