//! Prevalence profiling for contribution matrices.

use crate::curate::{CellTypeClass, PrevalenceBounds};
use crate::data::ContributionMatrix;
use crate::error::{CurateError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Prevalence of a single cell type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellTypePrevalence {
    /// Cell-type label.
    pub label: String,
    /// Number of spots with a contribution above zero.
    pub n_present: usize,
    /// `n_present` as a fraction of all spots.
    pub prevalence: f64,
    /// Classification under the profile's bounds.
    pub class: CellTypeClass,
}

/// Profile of prevalence characteristics in a contribution matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrevalenceProfile {
    /// Number of spots.
    pub n_spots: usize,
    /// Number of labelled cell types profiled.
    pub n_cell_types: usize,
    /// Bounds used for classification.
    pub bounds: PrevalenceBounds,
    /// Per cell type, in column order.
    pub cell_types: Vec<CellTypePrevalence>,
    /// Mean prevalence across cell types.
    pub mean_prevalence: f64,
    /// Median prevalence across cell types.
    pub median_prevalence: f64,
    /// Minimum prevalence.
    pub min_prevalence: f64,
    /// Maximum prevalence.
    pub max_prevalence: f64,
    pub n_absent: usize,
    pub n_sparse: usize,
    pub n_variable: usize,
    pub n_ubiquitous: usize,
}

impl PrevalenceProfile {
    fn labels_in(&self, class: CellTypeClass) -> Vec<&str> {
        self.cell_types
            .iter()
            .filter(|c| c.class == class)
            .map(|c| c.label.as_str())
            .collect()
    }

    /// Variable cell types, in column order.
    pub fn variable(&self) -> Vec<&str> {
        self.labels_in(CellTypeClass::Variable)
    }

    /// Ubiquitous cell types, in column order.
    pub fn ubiquitous(&self) -> Vec<&str> {
        self.labels_in(CellTypeClass::Ubiquitous)
    }

    /// Absent cell types, in column order.
    pub fn absent(&self) -> Vec<&str> {
        self.labels_in(CellTypeClass::Absent)
    }

    /// Prevalence of one cell type.
    pub fn prevalence_of(&self, label: &str) -> Option<f64> {
        self.cell_types
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.prevalence)
    }
}

impl std::fmt::Display for PrevalenceProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Prevalence Profile")?;
        writeln!(f, "  Spots:         {}", self.n_spots)?;
        writeln!(f, "  Cell types:    {}", self.n_cell_types)?;
        writeln!(f, "  Mean prevalence:   {:.2}%", self.mean_prevalence * 100.0)?;
        writeln!(f, "  Median prevalence: {:.2}%", self.median_prevalence * 100.0)?;
        writeln!(f, "  Min prevalence:    {:.2}%", self.min_prevalence * 100.0)?;
        writeln!(f, "  Max prevalence:    {:.2}%", self.max_prevalence * 100.0)?;
        writeln!(
            f,
            "  Ubiquitous (>={:.0}%): {}",
            self.bounds.upper * 100.0,
            self.n_ubiquitous
        )?;
        writeln!(f, "  Variable:      {}", self.n_variable)?;
        if self.n_sparse > 0 {
            writeln!(
                f,
                "  Sparse (<={:.0}%): {}",
                self.bounds.lower_exclusive * 100.0,
                self.n_sparse
            )?;
        }
        writeln!(f, "  Absent:        {}", self.n_absent)?;
        writeln!(f)?;
        for c in &self.cell_types {
            writeln!(
                f,
                "  {:<24} {:>6.1}%  ({} spots, {})",
                c.label,
                c.prevalence * 100.0,
                c.n_present,
                c.class.name()
            )?;
        }
        Ok(())
    }
}

/// Prevalence and class of each labelled column, in column order.
///
/// Columns without a label are skipped.
///
/// # Errors
/// `DegenerateInput` when the matrix has no spots, since prevalence is then
/// undefined; `InvalidParameter` for bounds outside [0, 1].
pub fn classify_cell_types(
    matrix: &ContributionMatrix,
    bounds: &PrevalenceBounds,
) -> Result<Vec<CellTypePrevalence>> {
    bounds.validate()?;
    let n_spots = matrix.n_spots();
    if n_spots == 0 {
        return Err(CurateError::DegenerateInput(
            "Cannot compute prevalence on a matrix with zero spots".to_string(),
        ));
    }

    let n_present: Vec<usize> = (0..matrix.n_columns())
        .into_par_iter()
        .map(|col| matrix.column_nnz(col))
        .collect();

    Ok(matrix
        .labels()
        .iter()
        .zip(n_present)
        .filter_map(|(label, n_present)| {
            let label = label.as_ref()?;
            let prevalence = n_present as f64 / n_spots as f64;
            Some(CellTypePrevalence {
                label: label.clone(),
                n_present,
                prevalence,
                class: CellTypeClass::from_prevalence(prevalence, bounds),
            })
        })
        .collect())
}

/// Profile prevalence characteristics of a cleaned contribution matrix.
pub fn profile_prevalence(
    matrix: &ContributionMatrix,
    bounds: &PrevalenceBounds,
) -> Result<PrevalenceProfile> {
    let cell_types = classify_cell_types(matrix, bounds)?;
    let prevalences: Vec<f64> = cell_types.iter().map(|c| c.prevalence).collect();
    let n_cell_types = cell_types.len();

    let mean_prevalence = if n_cell_types > 0 {
        prevalences.iter().sum::<f64>() / n_cell_types as f64
    } else {
        0.0
    };
    let min_prevalence = prevalences.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_prevalence = prevalences.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let count = |class: CellTypeClass| cell_types.iter().filter(|c| c.class == class).count();
    let n_absent = count(CellTypeClass::Absent);
    let n_sparse = count(CellTypeClass::Sparse);
    let n_variable = count(CellTypeClass::Variable);
    let n_ubiquitous = count(CellTypeClass::Ubiquitous);

    Ok(PrevalenceProfile {
        n_spots: matrix.n_spots(),
        n_cell_types,
        bounds: *bounds,
        median_prevalence: median(&prevalences),
        cell_types,
        mean_prevalence,
        min_prevalence: if min_prevalence.is_infinite() { 0.0 } else { min_prevalence },
        max_prevalence: if max_prevalence.is_infinite() { 0.0 } else { max_prevalence },
        n_absent,
        n_sparse,
        n_variable,
        n_ubiquitous,
    })
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}
