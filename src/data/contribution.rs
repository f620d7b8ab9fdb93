//! Dense spot × cell-type contribution matrix produced by a deconvolution model.

use crate::error::{CurateError, Result};
use nalgebra::DMatrix;
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Header used for the spot identifier column when writing TSV.
pub const SPOT_ID_HEADER: &str = "spot_id";

/// Check whether a raw header cell denotes a missing cell-type label.
pub fn is_missing_label(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed == "NA" || trimmed == "na" || trimmed == "NaN"
}

/// Per-spot cell-type contributions.
///
/// Rows are spots, columns are cell types. A column label is `None` when the
/// upstream annotation left it undefined; such columns are tolerated here and
/// removed by [`crate::curate::clean`].
#[derive(Debug, Clone, PartialEq)]
pub struct ContributionMatrix {
    /// Dense values (spots × cell types).
    data: DMatrix<f64>,
    /// Spot identifiers (row names).
    spot_ids: Vec<String>,
    /// Cell-type labels (column names).
    labels: Vec<Option<String>>,
}

impl ContributionMatrix {
    /// Create a new ContributionMatrix from dense values and identifiers.
    ///
    /// Fails when the identifiers do not match the matrix shape, when spot ids
    /// or defined labels repeat, or when any value is not finite.
    pub fn new(
        data: DMatrix<f64>,
        spot_ids: Vec<String>,
        labels: Vec<Option<String>>,
    ) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != spot_ids.len() {
            return Err(CurateError::DimensionMismatch {
                expected: nrows,
                actual: spot_ids.len(),
            });
        }
        if ncols != labels.len() {
            return Err(CurateError::DimensionMismatch {
                expected: ncols,
                actual: labels.len(),
            });
        }

        let mut seen = HashSet::with_capacity(nrows);
        for spot in &spot_ids {
            if !seen.insert(spot.as_str()) {
                return Err(CurateError::DuplicateId(format!("spot '{}'", spot)));
            }
        }
        let mut seen = HashSet::with_capacity(ncols);
        for label in labels.iter().flatten() {
            if !seen.insert(label.as_str()) {
                return Err(CurateError::DuplicateId(format!("cell type '{}'", label)));
            }
        }

        for row in 0..nrows {
            for col in 0..ncols {
                let value = data[(row, col)];
                if !value.is_finite() {
                    return Err(CurateError::InvalidValue {
                        value: value.to_string(),
                        row,
                        col,
                    });
                }
            }
        }

        Ok(Self {
            data,
            spot_ids,
            labels,
        })
    }

    /// Build a matrix from named columns, all labels defined.
    ///
    /// Every column must have one value per spot.
    pub fn from_columns(spot_ids: Vec<String>, columns: Vec<(&str, Vec<f64>)>) -> Result<Self> {
        let nrows = spot_ids.len();
        let ncols = columns.len();
        for (_, values) in &columns {
            if values.len() != nrows {
                return Err(CurateError::DimensionMismatch {
                    expected: nrows,
                    actual: values.len(),
                });
            }
        }
        let data = DMatrix::from_fn(nrows, ncols, |row, col| columns[col].1[row]);
        let labels = columns
            .iter()
            .map(|(label, _)| Some(label.to_string()))
            .collect();
        Self::new(data, spot_ids, labels)
    }

    /// Load a contribution matrix from a TSV file.
    ///
    /// Expected format:
    /// - First row: header; the first cell names the spot column, the rest are
    ///   cell-type labels (empty or `NA` for an undefined label)
    /// - Subsequent rows: spot ID followed by contributions
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Parse a contribution matrix from any TSV source.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(reader);

        let header = rdr.headers()?.clone();
        if header.is_empty() {
            return Err(CurateError::EmptyData("Empty TSV file".to_string()));
        }
        let labels: Vec<Option<String>> = header
            .iter()
            .skip(1)
            .map(|raw| {
                if is_missing_label(raw) {
                    None
                } else {
                    Some(raw.trim().to_string())
                }
            })
            .collect();
        let n_cols = labels.len();

        let mut spot_ids = Vec::new();
        let mut values = Vec::new();
        for (row_idx, record) in rdr.records().enumerate() {
            let record = record?;
            if record.len() != n_cols + 1 {
                return Err(CurateError::DimensionMismatch {
                    expected: n_cols + 1,
                    actual: record.len(),
                });
            }
            spot_ids.push(record[0].trim().to_string());
            for (col_idx, raw) in record.iter().skip(1).enumerate() {
                let value: f64 = raw
                    .trim()
                    .parse()
                    .ok()
                    .filter(|v: &f64| v.is_finite())
                    .ok_or_else(|| CurateError::InvalidValue {
                        value: raw.to_string(),
                        row: row_idx,
                        col: col_idx,
                    })?;
                values.push(value);
            }
        }

        let data = DMatrix::from_row_slice(spot_ids.len(), n_cols, &values);
        Self::new(data, spot_ids, labels)
    }

    /// Write the contribution matrix to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.to_writer(file)
    }

    /// Write the contribution matrix as TSV to any sink.
    ///
    /// Undefined labels are written as `NA`.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);

        let mut header = Vec::with_capacity(self.n_columns() + 1);
        header.push(SPOT_ID_HEADER.to_string());
        header.extend(
            self.labels
                .iter()
                .map(|l| l.clone().unwrap_or_else(|| "NA".to_string())),
        );
        wtr.write_record(&header)?;

        for (row, spot_id) in self.spot_ids.iter().enumerate() {
            let mut record = Vec::with_capacity(self.n_columns() + 1);
            record.push(spot_id.clone());
            record.extend((0..self.n_columns()).map(|col| self.get(row, col).to_string()));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;

        Ok(())
    }

    /// Get the value at (row, col).
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[(row, col)]
    }

    /// Number of spots (rows).
    #[inline]
    pub fn n_spots(&self) -> usize {
        self.data.nrows()
    }

    /// Number of cell-type columns, labelled or not.
    #[inline]
    pub fn n_columns(&self) -> usize {
        self.data.ncols()
    }

    /// Spot identifiers.
    #[inline]
    pub fn spot_ids(&self) -> &[String] {
        &self.spot_ids
    }

    /// Column labels, `None` where undefined.
    #[inline]
    pub fn labels(&self) -> &[Option<String>] {
        &self.labels
    }

    /// Label of a single column.
    #[inline]
    pub fn label(&self, col: usize) -> Option<&str> {
        self.labels.get(col).and_then(|l| l.as_deref())
    }

    /// Defined labels in column order.
    pub fn defined_labels(&self) -> Vec<&str> {
        self.labels.iter().filter_map(|l| l.as_deref()).collect()
    }

    /// Index of the column carrying `label`.
    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.labels
            .iter()
            .position(|l| l.as_deref() == Some(label))
    }

    /// Dense values of one column (cell type).
    pub fn column_dense(&self, col: usize) -> Vec<f64> {
        self.data.column(col).iter().copied().collect()
    }

    /// Number of spots with a strictly positive contribution in `col`.
    pub fn column_nnz(&self, col: usize) -> usize {
        self.data.column(col).iter().filter(|&&v| v > 0.0).count()
    }

    /// Keep only the columns at `indices`, in the given order.
    pub fn subset_columns(&self, indices: &[usize]) -> Result<Self> {
        for &col in indices {
            if col >= self.n_columns() {
                return Err(CurateError::InvalidParameter(format!(
                    "Column index {} out of bounds",
                    col
                )));
            }
        }
        let data = self.data.select_columns(indices);
        let labels = indices.iter().map(|&i| self.labels[i].clone()).collect();
        Self::new(data, self.spot_ids.clone(), labels)
    }

    /// Apply `f` to every value in place, returning how many values changed.
    ///
    /// Changes are counted bitwise, so `-0.0` becoming `0.0` counts.
    pub(crate) fn map_values_in_place<F>(&mut self, f: F) -> usize
    where
        F: Fn(f64) -> f64,
    {
        let mut changed = 0;
        for value in self.data.iter_mut() {
            let updated = f(*value);
            if updated.to_bits() != value.to_bits() {
                changed += 1;
            }
            *value = updated;
        }
        changed
    }
}
