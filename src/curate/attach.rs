//! Key-aligned merge of curated proportions into spot metadata.

use crate::data::{ContributionMatrix, SpotMetadata, Variable, VariableType};
use crate::error::{CurateError, Result};
use std::collections::HashMap;
use tracing::debug;

/// Add one continuous column per cell type to a copy of `metadata`.
///
/// Rows are matched by spot identifier, never by position. Metadata spots the
/// matrix does not cover receive `Variable::Missing`; the metadata's spot
/// order is kept.
///
/// # Errors
/// - `KeyAlignment` listing every matrix spot absent from `metadata`
/// - `DuplicateId` if a cell-type label already names a metadata column
/// - `InvalidParameter` if a column has no label (attach cleaned matrices only)
pub fn attach(cleaned: &ContributionMatrix, metadata: &SpotMetadata) -> Result<SpotMetadata> {
    let missing: Vec<String> = metadata
        .missing_spots(cleaned.spot_ids())
        .into_iter()
        .map(String::from)
        .collect();
    if !missing.is_empty() {
        return Err(CurateError::KeyAlignment { missing });
    }

    let mut labels = Vec::with_capacity(cleaned.n_columns());
    for (col, label) in cleaned.labels().iter().enumerate() {
        let label = label.as_deref().ok_or_else(|| {
            CurateError::InvalidParameter(format!(
                "Column {} has no cell-type label; clean the matrix before attaching",
                col
            ))
        })?;
        if metadata.has_column(label) {
            return Err(CurateError::DuplicateId(format!(
                "cell type '{}' collides with a metadata column",
                label
            )));
        }
        labels.push(label);
    }

    let row_of: HashMap<&str, usize> = cleaned
        .spot_ids()
        .iter()
        .enumerate()
        .map(|(row, sid)| (sid.as_str(), row))
        .collect();

    let mut merged = metadata.clone();
    for (col, label) in labels.into_iter().enumerate() {
        let values: Vec<Variable> = metadata
            .spot_ids()
            .iter()
            .map(|sid| match row_of.get(sid.as_str()) {
                Some(&row) => Variable::Continuous(cleaned.get(row, col)),
                None => Variable::Missing,
            })
            .collect();
        merged.push_column(label, VariableType::Continuous, values)?;
    }

    debug!(
        n_spots = cleaned.n_spots(),
        n_metadata_spots = metadata.n_spots(),
        n_columns = cleaned.n_columns(),
        "attached cell-type proportions"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn create_metadata() -> SpotMetadata {
        let tsv = "spot_id\tregion\n\
                   S1\tcortex\n\
                   S2\tstriatum\n\
                   S3\tcortex\n";
        SpotMetadata::from_reader(tsv.as_bytes()).unwrap()
    }

    #[test]
    fn test_attach_by_key_not_position() {
        // Matrix rows in a different order from the metadata.
        let mat = ContributionMatrix::from_columns(
            vec!["S3".into(), "S1".into(), "S2".into()],
            vec![("T1", vec![0.3, 0.1, 0.2])],
        )
        .unwrap();

        let merged = attach(&mat, &create_metadata()).unwrap();

        assert_eq!(merged.spot_ids(), &["S1", "S2", "S3"]);
        assert_eq!(merged.column_names(), &["region", "T1"]);
        assert_eq!(merged.get("S1", "T1").unwrap().as_continuous(), Some(0.1));
        assert_eq!(merged.get("S2", "T1").unwrap().as_continuous(), Some(0.2));
        assert_eq!(merged.get("S3", "T1").unwrap().as_continuous(), Some(0.3));
        assert_eq!(merged.column_type("T1"), Some(VariableType::Continuous));
    }

    #[test]
    fn test_unknown_spot_fails() {
        let mat = ContributionMatrix::from_columns(
            vec!["S1".into(), "S9".into(), "S8".into()],
            vec![("T1", vec![0.1, 0.2, 0.3])],
        )
        .unwrap();

        match attach(&mat, &create_metadata()) {
            Err(CurateError::KeyAlignment { missing }) => {
                assert_eq!(missing, vec!["S9", "S8"]);
            }
            other => panic!("expected KeyAlignment, got {:?}", other),
        }
    }

    #[test]
    fn test_subset_of_metadata_fills_missing() {
        let mat = ContributionMatrix::from_columns(
            vec!["S2".into()],
            vec![("T1", vec![0.4]), ("T2", vec![0.6])],
        )
        .unwrap();

        let merged = attach(&mat, &create_metadata()).unwrap();
        assert_eq!(merged.get("S2", "T2").unwrap().as_continuous(), Some(0.6));
        assert!(merged.get("S1", "T1").unwrap().is_missing());
        assert!(merged.get("S3", "T2").unwrap().is_missing());
    }

    #[test]
    fn test_label_collision_fails() {
        let mat = ContributionMatrix::from_columns(
            vec!["S1".into()],
            vec![("region", vec![0.4])],
        )
        .unwrap();
        assert!(matches!(
            attach(&mat, &create_metadata()),
            Err(CurateError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_unlabeled_column_fails() {
        let mat = ContributionMatrix::new(
            DMatrix::from_row_slice(1, 1, &[0.5]),
            vec!["S1".into()],
            vec![None],
        )
        .unwrap();
        assert!(matches!(
            attach(&mat, &create_metadata()),
            Err(CurateError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_input_metadata_untouched() {
        let metadata = create_metadata();
        let mat =
            ContributionMatrix::from_columns(vec!["S1".into()], vec![("T1", vec![0.4])]).unwrap();
        let _ = attach(&mat, &metadata).unwrap();
        assert_eq!(metadata.n_columns(), 1);
    }
}
