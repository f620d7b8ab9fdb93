//! Selection of cell types whose presence varies across spots.

use crate::data::ContributionMatrix;
use crate::error::{CurateError, Result};
use crate::profile::classify_cell_types;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Prevalence at or above which a cell type counts as ubiquitous.
pub const DEFAULT_UBIQUITOUS_PREVALENCE: f64 = 0.8;

/// Open interval of prevalence that qualifies a cell type as variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrevalenceBounds {
    /// Prevalence must be strictly greater than this.
    pub lower_exclusive: f64,
    /// Prevalence must be strictly less than this.
    pub upper: f64,
}

impl Default for PrevalenceBounds {
    fn default() -> Self {
        Self {
            lower_exclusive: 0.0,
            upper: DEFAULT_UBIQUITOUS_PREVALENCE,
        }
    }
}

impl PrevalenceBounds {
    pub fn new(lower_exclusive: f64, upper: f64) -> Self {
        Self {
            lower_exclusive,
            upper,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.lower_exclusive) || !(0.0..=1.0).contains(&self.upper) {
            return Err(CurateError::InvalidParameter(
                "Prevalence bounds must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether `prevalence` lies strictly inside the bounds.
    #[inline]
    pub fn contains(&self, prevalence: f64) -> bool {
        prevalence > self.lower_exclusive && prevalence < self.upper
    }
}

/// How widespread a cell type is across spots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellTypeClass {
    /// Not detected in any spot.
    Absent,
    /// Detected, but in no more than `lower_exclusive` of spots.
    Sparse,
    /// Strictly inside the bounds.
    Variable,
    /// Detected in at least `upper` of spots.
    Ubiquitous,
}

impl CellTypeClass {
    /// Classify a prevalence value (0.0-1.0).
    pub fn from_prevalence(prevalence: f64, bounds: &PrevalenceBounds) -> Self {
        if prevalence <= 0.0 {
            Self::Absent
        } else if prevalence >= bounds.upper {
            Self::Ubiquitous
        } else if prevalence <= bounds.lower_exclusive {
            Self::Sparse
        } else {
            Self::Variable
        }
    }

    /// Get the descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Sparse => "sparse",
            Self::Variable => "variable",
            Self::Ubiquitous => "ubiquitous",
        }
    }
}

/// Labels of the cell types whose prevalence lies strictly inside `bounds`.
///
/// Prevalence is the fraction of spots with a contribution above zero, so the
/// input should already be cleaned. Labels come back in column order.
///
/// # Errors
/// `DegenerateInput` when the matrix has no spots; `InvalidParameter` when a
/// bound lies outside [0, 1].
pub fn select_variable_cell_types(
    cleaned: &ContributionMatrix,
    bounds: &PrevalenceBounds,
) -> Result<Vec<String>> {
    let calls = classify_cell_types(cleaned, bounds)?;
    let variable: Vec<String> = calls
        .into_iter()
        .filter(|c| bounds.contains(c.prevalence))
        .map(|c| c.label)
        .collect();

    debug!(
        n_variable = variable.len(),
        n_columns = cleaned.n_columns(),
        "selected variable cell types"
    );
    Ok(variable)
}
