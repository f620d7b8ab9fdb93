//! Removal of residual and unlabeled columns, and zeroing of minor contributions.

use crate::data::ContributionMatrix;
use crate::error::{CurateError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Contributions strictly below this fraction are treated as noise.
pub const DEFAULT_MINOR_THRESHOLD: f64 = 0.02;

/// Labels of the unexplained-mass column: SPOTlight's `res_ss` and the
/// plain `residual`.
pub const DEFAULT_RESIDUAL_LABELS: &[&str] = &["res_ss", "residual"];

/// The default residual labels as owned strings.
pub fn default_residual_labels() -> Vec<String> {
    DEFAULT_RESIDUAL_LABELS.iter().map(|s| s.to_string()).collect()
}

/// Parameters for [`clean`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanConfig {
    /// Values strictly below this are set to zero (0.0 to 1.0).
    pub minor_threshold: f64,
    /// Columns carrying any of these labels are dropped as residual.
    pub residual_labels: Vec<String>,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            minor_threshold: DEFAULT_MINOR_THRESHOLD,
            residual_labels: default_residual_labels(),
        }
    }
}

impl CleanConfig {
    /// Config with a custom threshold and the default residual labels.
    pub fn new(minor_threshold: f64) -> Self {
        Self {
            minor_threshold,
            ..Self::default()
        }
    }

    /// Replace the residual labels with a single label.
    pub fn with_residual_label(self, label: &str) -> Self {
        self.with_residual_labels(&[label])
    }

    /// Replace the residual labels.
    pub fn with_residual_labels<S: AsRef<str>>(mut self, labels: &[S]) -> Self {
        self.residual_labels = labels.iter().map(|l| l.as_ref().to_string()).collect();
        self
    }

    fn is_residual(&self, label: &str) -> bool {
        self.residual_labels.iter().any(|r| r == label)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.minor_threshold) {
            return Err(CurateError::InvalidParameter(
                "Minor contribution threshold must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// What [`clean_with_stats`] removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanStats {
    /// Number of columns before cleaning.
    pub n_columns_before: usize,
    /// Number of columns after cleaning.
    pub n_columns_after: usize,
    /// Whether a residual column was found and dropped.
    pub residual_dropped: bool,
    /// Number of columns dropped as residual.
    pub n_residual_dropped: usize,
    /// Number of columns dropped for having no label.
    pub n_unlabeled_dropped: usize,
    /// Number of values rewritten to zero, including `-0.0` normalized to `0.0`.
    pub n_values_zeroed: usize,
    /// Proportion of columns retained.
    pub retention_rate: f64,
}

impl std::fmt::Display for CleanStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Clean Result")?;
        writeln!(f, "  Before:    {} columns", self.n_columns_before)?;
        writeln!(f, "  After:     {} columns", self.n_columns_after)?;
        writeln!(
            f,
            "  Residual:  {}",
            if self.residual_dropped {
                format!("{} dropped", self.n_residual_dropped)
            } else {
                "not found".to_string()
            }
        )?;
        writeln!(f, "  Unlabeled: {} dropped", self.n_unlabeled_dropped)?;
        writeln!(f, "  Zeroed:    {} values", self.n_values_zeroed)?;
        writeln!(f, "  Retained:  {:.1}%", self.retention_rate * 100.0)?;
        Ok(())
    }
}

/// Clean a raw contribution matrix.
///
/// Drops every residual column and every column without a label, then zeroes
/// each remaining value strictly below `config.minor_threshold`. A value equal
/// to the threshold is kept. Spot order and the relative order of the kept
/// columns are unchanged. Zeros are written as `+0.0`.
///
/// A matrix left with no columns is returned as is, not as an error.
pub fn clean(matrix: &ContributionMatrix, config: &CleanConfig) -> Result<ContributionMatrix> {
    clean_with_stats(matrix, config).map(|(cleaned, _)| cleaned)
}

/// Clean with statistics about what was removed.
pub fn clean_with_stats(
    matrix: &ContributionMatrix,
    config: &CleanConfig,
) -> Result<(ContributionMatrix, CleanStats)> {
    config.validate()?;

    let mut n_residual_dropped = 0;
    let mut n_unlabeled_dropped = 0;
    let mut keep_indices = Vec::with_capacity(matrix.n_columns());
    for (col, label) in matrix.labels().iter().enumerate() {
        match label {
            None => n_unlabeled_dropped += 1,
            Some(l) if config.is_residual(l) => n_residual_dropped += 1,
            Some(_) => keep_indices.push(col),
        }
    }

    let mut cleaned = matrix.subset_columns(&keep_indices)?;
    let threshold = config.minor_threshold;
    let n_values_zeroed =
        cleaned.map_values_in_place(|v| if v < threshold || v == 0.0 { 0.0 } else { v });

    debug!(
        n_residual_dropped,
        n_unlabeled_dropped,
        n_values_zeroed,
        threshold,
        "cleaned contribution matrix"
    );

    let n_columns_before = matrix.n_columns();
    let n_columns_after = cleaned.n_columns();
    let stats = CleanStats {
        n_columns_before,
        n_columns_after,
        residual_dropped: n_residual_dropped > 0,
        n_residual_dropped,
        n_unlabeled_dropped,
        n_values_zeroed,
        retention_rate: if n_columns_before > 0 {
            n_columns_after as f64 / n_columns_before as f64
        } else {
            0.0
        },
    };

    Ok((cleaned, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn spots(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("spot_{}", i)).collect()
    }

    fn scenario_a() -> ContributionMatrix {
        ContributionMatrix::from_columns(
            spots(4),
            vec![
                ("T1", vec![0.01, 0.5, 0.9, 0.0]),
                ("T2", vec![0.99, 0.5, 0.1, 1.0]),
                ("res_ss", vec![0.0, 0.0, 0.0, 0.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_clean_scenario_a() {
        let cleaned = clean(&scenario_a(), &CleanConfig::default()).unwrap();

        assert_eq!(cleaned.defined_labels(), vec!["T1", "T2"]);
        assert_eq!(cleaned.spot_ids(), scenario_a().spot_ids());
        assert_eq!(cleaned.column_dense(0), vec![0.0, 0.5, 0.9, 0.0]);
        assert_eq!(cleaned.column_dense(1), vec![0.99, 0.5, 0.1, 1.0]);
    }

    #[test]
    fn test_clean_literal_residual_label() {
        let mat = ContributionMatrix::from_columns(
            spots(4),
            vec![
                ("T1", vec![0.01, 0.5, 0.9, 0.0]),
                ("T2", vec![0.99, 0.5, 0.1, 1.0]),
                ("residual", vec![0.0, 0.0, 0.0, 0.0]),
            ],
        )
        .unwrap();

        let (cleaned, stats) = clean_with_stats(&mat, &CleanConfig::default()).unwrap();
        assert_eq!(cleaned.defined_labels(), vec!["T1", "T2"]);
        assert_eq!(cleaned.column_dense(0), vec![0.0, 0.5, 0.9, 0.0]);
        assert_eq!(stats.n_residual_dropped, 1);
    }

    #[test]
    fn test_both_default_residual_labels_dropped() {
        let mat = ContributionMatrix::from_columns(
            spots(1),
            vec![("A", vec![0.6]), ("res_ss", vec![0.3]), ("residual", vec![0.1])],
        )
        .unwrap();

        let (cleaned, stats) = clean_with_stats(&mat, &CleanConfig::default()).unwrap();
        assert_eq!(cleaned.defined_labels(), vec!["A"]);
        assert!(stats.residual_dropped);
        assert_eq!(stats.n_residual_dropped, 2);
    }

    #[test]
    fn test_negative_zero_written_as_zero() {
        let mat = ContributionMatrix::from_columns(vec!["s".to_string()], vec![("A", vec![-0.0])])
            .unwrap();

        let (cleaned, stats) = clean_with_stats(&mat, &CleanConfig::default()).unwrap();
        assert!(cleaned.get(0, 0).is_sign_positive());
        assert_eq!(stats.n_values_zeroed, 1);

        let mut out = Vec::new();
        cleaned.to_writer(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "spot_id\tA\ns\t0\n");
    }

    #[test]
    fn test_negative_zero_kept_at_zero_threshold() {
        let mat = ContributionMatrix::from_columns(spots(2), vec![("A", vec![-0.0, 0.3])])
            .unwrap();

        let cleaned = clean(&mat, &CleanConfig::new(0.0)).unwrap();
        assert!(cleaned.get(0, 0).is_sign_positive());
        assert_eq!(cleaned.get(1, 0), 0.3);
    }

    #[test]
    fn test_threshold_boundary() {
        let just_below = f64::from_bits(DEFAULT_MINOR_THRESHOLD.to_bits() - 1);
        let mat = ContributionMatrix::from_columns(
            spots(2),
            vec![("A", vec![DEFAULT_MINOR_THRESHOLD, just_below])],
        )
        .unwrap();

        let cleaned = clean(&mat, &CleanConfig::default()).unwrap();
        assert_eq!(cleaned.get(0, 0), DEFAULT_MINOR_THRESHOLD);
        assert_eq!(cleaned.get(1, 0), 0.0);
    }

    #[test]
    fn test_idempotent() {
        let config = CleanConfig::new(0.05);
        let once = clean(&scenario_a(), &config).unwrap();
        let twice = clean(&once, &config).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_drops_unlabeled_columns() {
        let data = DMatrix::from_row_slice(2, 4, &[0.1, 0.2, 0.3, 0.4, 0.4, 0.3, 0.2, 0.1]);
        let mat = ContributionMatrix::new(
            data,
            spots(2),
            vec![Some("A".into()), None, Some("res_ss".into()), Some("B".into())],
        )
        .unwrap();

        let (cleaned, stats) = clean_with_stats(&mat, &CleanConfig::default()).unwrap();

        assert_eq!(cleaned.defined_labels(), vec!["A", "B"]);
        assert_eq!(cleaned.column_dense(1), vec![0.4, 0.1]);
        assert!(stats.residual_dropped);
        assert_eq!(stats.n_unlabeled_dropped, 1);
        assert_eq!(stats.n_columns_before, 4);
        assert_eq!(stats.n_columns_after, 2);
        assert!((stats.retention_rate - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_columns_are_subset() {
        let mat = scenario_a();
        let cleaned = clean(&mat, &CleanConfig::default()).unwrap();
        let original = mat.defined_labels();
        for label in cleaned.defined_labels() {
            assert!(original.contains(&label));
        }
        assert!(cleaned.column_index("res_ss").is_none());
    }

    #[test]
    fn test_custom_residual_label() {
        let mat = ContributionMatrix::from_columns(
            spots(1),
            vec![("A", vec![0.7]), ("unassigned", vec![0.3]), ("res_ss", vec![0.0])],
        )
        .unwrap();
        let config = CleanConfig::default().with_residual_label("unassigned");
        let cleaned = clean(&mat, &config).unwrap();

        // Only the configured residual is dropped.
        assert_eq!(cleaned.defined_labels(), vec!["A", "res_ss"]);
    }

    #[test]
    fn test_custom_residual_label_set() {
        let mat = ContributionMatrix::from_columns(
            spots(1),
            vec![("A", vec![0.5]), ("unassigned", vec![0.3]), ("other", vec![0.2])],
        )
        .unwrap();
        let config = CleanConfig::default().with_residual_labels(&["unassigned", "other"]);
        let (cleaned, stats) = clean_with_stats(&mat, &config).unwrap();

        assert_eq!(cleaned.defined_labels(), vec!["A"]);
        assert_eq!(stats.n_residual_dropped, 2);
    }

    #[test]
    fn test_all_columns_dropped() {
        let data = DMatrix::from_row_slice(2, 2, &[0.5, 0.5, 0.5, 0.5]);
        let mat =
            ContributionMatrix::new(data, spots(2), vec![None, Some("res_ss".into())]).unwrap();

        let (cleaned, stats) = clean_with_stats(&mat, &CleanConfig::default()).unwrap();
        assert_eq!(cleaned.n_columns(), 0);
        assert_eq!(cleaned.n_spots(), 2);
        assert_eq!(stats.n_columns_after, 0);
    }

    #[test]
    fn test_zeroed_count() {
        let (_, stats) = clean_with_stats(&scenario_a(), &CleanConfig::default()).unwrap();
        // Only T1's 0.01 crosses from non-zero to zero.
        assert_eq!(stats.n_values_zeroed, 1);
    }

    #[test]
    fn test_invalid_threshold() {
        let mat = scenario_a();
        assert!(clean(&mat, &CleanConfig::new(-0.1)).is_err());
        assert!(clean(&mat, &CleanConfig::new(1.1)).is_err());
        assert!(clean(&mat, &CleanConfig::new(f64::NAN)).is_err());
    }
}
