//! Per-spot metadata that curated cell-type proportions are attached to.

use crate::error::{CurateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// A variable value that can be categorical or continuous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Categorical variable with string levels.
    Categorical(String),
    /// Continuous numeric variable.
    Continuous(f64),
    /// Missing value.
    Missing,
}

impl Variable {
    /// Check if this is a missing value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Variable::Missing)
    }

    /// Try to get as categorical string.
    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Variable::Categorical(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as continuous f64.
    pub fn as_continuous(&self) -> Option<f64> {
        match self {
            Variable::Continuous(v) => Some(*v),
            _ => None,
        }
    }

    /// Value as written to a TSV cell.
    fn to_cell(&self) -> String {
        match self {
            Variable::Categorical(s) => s.clone(),
            Variable::Continuous(v) => v.to_string(),
            Variable::Missing => "NA".to_string(),
        }
    }
}

/// Column type, inferred on load or declared when a column is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Categorical,
    Continuous,
}

fn is_missing_cell(raw: &str) -> bool {
    raw.is_empty() || raw == "NA" || raw == "na"
}

/// Spot metadata containing variables for each spot.
#[derive(Debug, Clone)]
pub struct SpotMetadata {
    /// Spot IDs in order.
    spot_ids: Vec<String>,
    /// Column names.
    column_names: Vec<String>,
    /// Data stored as spot_id -> column_name -> Variable.
    data: HashMap<String, HashMap<String, Variable>>,
    /// Type of each column.
    column_types: HashMap<String, VariableType>,
}

impl SpotMetadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self {
            spot_ids: Vec::new(),
            column_names: Vec::new(),
            data: HashMap::new(),
            column_types: HashMap::new(),
        }
    }

    /// Create metadata with the given spots and no columns.
    pub fn from_spot_ids(spot_ids: Vec<String>) -> Result<Self> {
        let mut data = HashMap::with_capacity(spot_ids.len());
        for sid in &spot_ids {
            if data.insert(sid.clone(), HashMap::new()).is_some() {
                return Err(CurateError::DuplicateId(format!("spot '{}'", sid)));
            }
        }
        Ok(Self {
            spot_ids,
            column_names: Vec::new(),
            data,
            column_types: HashMap::new(),
        })
    }

    /// Load metadata from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with column names (first column is spot ID)
    /// - Subsequent rows: spot ID followed by variable values
    ///
    /// Columns are inferred as continuous if all values parse as numbers,
    /// otherwise categorical.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Parse metadata from any TSV source.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let header = rdr.headers()?.clone();
        if header.is_empty() {
            return Err(CurateError::EmptyData("Empty metadata file".to_string()));
        }
        let column_names: Vec<String> = header
            .iter()
            .skip(1)
            .map(|s| s.trim().to_string())
            .collect();
        let mut seen = HashSet::with_capacity(column_names.len());
        for name in &column_names {
            if !seen.insert(name.as_str()) {
                return Err(CurateError::DuplicateId(format!("metadata column '{}'", name)));
            }
        }

        // First pass: collect all values to infer types
        let mut raw_data: Vec<(String, Vec<String>)> = Vec::new();
        for record in rdr.records() {
            let record = record?;
            if record.is_empty() {
                continue;
            }
            let spot_id = record[0].trim().to_string();
            let values: Vec<String> = record.iter().skip(1).map(|s| s.trim().to_string()).collect();
            raw_data.push((spot_id, values));
        }

        if raw_data.is_empty() {
            return Err(CurateError::EmptyData("No spots in metadata".to_string()));
        }

        let mut column_types = HashMap::new();
        for (col_idx, col_name) in column_names.iter().enumerate() {
            let all_numeric = raw_data.iter().all(|(_, values)| {
                values
                    .get(col_idx)
                    .map(|v| is_missing_cell(v) || v.parse::<f64>().is_ok())
                    .unwrap_or(true)
            });
            let var_type = if all_numeric {
                VariableType::Continuous
            } else {
                VariableType::Categorical
            };
            column_types.insert(col_name.clone(), var_type);
        }

        let mut spot_ids = Vec::with_capacity(raw_data.len());
        let mut data = HashMap::with_capacity(raw_data.len());

        for (spot_id, values) in raw_data {
            let mut spot_data = HashMap::new();
            for (col_idx, col_name) in column_names.iter().enumerate() {
                let var = match values.get(col_idx) {
                    None => Variable::Missing,
                    Some(raw) if is_missing_cell(raw) => Variable::Missing,
                    Some(raw) => match column_types.get(col_name) {
                        Some(VariableType::Continuous) => raw
                            .parse::<f64>()
                            .map(Variable::Continuous)
                            .unwrap_or(Variable::Missing),
                        Some(VariableType::Categorical) | None => {
                            Variable::Categorical(raw.clone())
                        }
                    },
                };
                spot_data.insert(col_name.clone(), var);
            }
            if data.insert(spot_id.clone(), spot_data).is_some() {
                return Err(CurateError::DuplicateId(format!("spot '{}'", spot_id)));
            }
            spot_ids.push(spot_id);
        }

        Ok(Self {
            spot_ids,
            column_names,
            data,
            column_types,
        })
    }

    /// Write metadata to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.to_writer(file)
    }

    /// Write metadata as TSV to any sink. Missing values are written as `NA`.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);

        let mut header = Vec::with_capacity(self.n_columns() + 1);
        header.push(crate::data::SPOT_ID_HEADER.to_string());
        header.extend(self.column_names.iter().cloned());
        wtr.write_record(&header)?;

        for sid in &self.spot_ids {
            let mut record = Vec::with_capacity(self.n_columns() + 1);
            record.push(sid.clone());
            for col in &self.column_names {
                let cell = self
                    .get(sid, col)
                    .map(Variable::to_cell)
                    .unwrap_or_else(|| "NA".to_string());
                record.push(cell);
            }
            wtr.write_record(&record)?;
        }
        wtr.flush()?;

        Ok(())
    }

    /// Append a column, one value per spot in spot order.
    pub fn push_column(
        &mut self,
        name: &str,
        var_type: VariableType,
        values: Vec<Variable>,
    ) -> Result<()> {
        if self.has_column(name) {
            return Err(CurateError::DuplicateId(format!("metadata column '{}'", name)));
        }
        if values.len() != self.spot_ids.len() {
            return Err(CurateError::DimensionMismatch {
                expected: self.spot_ids.len(),
                actual: values.len(),
            });
        }

        for (sid, var) in self.spot_ids.iter().zip(values) {
            self.data
                .entry(sid.clone())
                .or_default()
                .insert(name.to_string(), var);
        }
        self.column_names.push(name.to_string());
        self.column_types.insert(name.to_string(), var_type);
        Ok(())
    }

    /// Spot IDs in order.
    pub fn spot_ids(&self) -> &[String] {
        &self.spot_ids
    }

    /// Column names.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Number of spots.
    pub fn n_spots(&self) -> usize {
        self.spot_ids.len()
    }

    /// Number of columns (variables).
    pub fn n_columns(&self) -> usize {
        self.column_names.len()
    }

    /// Get a variable value for a specific spot and column.
    pub fn get(&self, spot_id: &str, column: &str) -> Option<&Variable> {
        self.data.get(spot_id).and_then(|m| m.get(column))
    }

    /// Get the type of a column.
    pub fn column_type(&self, column: &str) -> Option<VariableType> {
        self.column_types.get(column).copied()
    }

    /// Spot IDs from `candidates` that this table does not contain, in input order.
    pub fn missing_spots<'a>(&self, candidates: &'a [String]) -> Vec<&'a str> {
        candidates
            .iter()
            .filter(|sid| !self.has_spot(sid))
            .map(String::as_str)
            .collect()
    }

    /// Check if a spot exists.
    pub fn has_spot(&self, spot_id: &str) -> bool {
        self.data.contains_key(spot_id)
    }

    /// Check if a column exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }
}

impl Default for SpotMetadata {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_tsv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "spot_id\tcluster\tnCount_Spatial\tregion").unwrap();
        writeln!(file, "AAAC-1\t0\t1520\tcortex").unwrap();
        writeln!(file, "AAAG-1\t1\t980\tNA").unwrap();
        writeln!(file, "AACT-1\t0\t2210\thippocampus").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_metadata() {
        let file = create_test_tsv();
        let meta = SpotMetadata::from_tsv(file.path()).unwrap();

        assert_eq!(meta.n_spots(), 3);
        assert_eq!(meta.n_columns(), 3);
        assert_eq!(meta.spot_ids(), &["AAAC-1", "AAAG-1", "AACT-1"]);
        assert_eq!(meta.column_names(), &["cluster", "nCount_Spatial", "region"]);
    }

    #[test]
    fn test_column_type_inference() {
        let file = create_test_tsv();
        let meta = SpotMetadata::from_tsv(file.path()).unwrap();

        assert_eq!(meta.column_type("nCount_Spatial"), Some(VariableType::Continuous));
        assert_eq!(meta.column_type("region"), Some(VariableType::Categorical));
        assert_eq!(
            meta.get("AAAC-1", "nCount_Spatial").unwrap().as_continuous(),
            Some(1520.0)
        );
        assert!(meta.get("AAAG-1", "region").unwrap().is_missing());
    }

    #[test]
    fn test_duplicate_spot_rejected() {
        let tsv = "spot_id\tx\nS1\t1\nS1\t2\n";
        assert!(matches!(
            SpotMetadata::from_reader(tsv.as_bytes()),
            Err(CurateError::DuplicateId(_))
        ));
        assert!(SpotMetadata::from_spot_ids(vec!["a".into(), "a".into()]).is_err());
    }

    #[test]
    fn test_push_column() {
        let mut meta = SpotMetadata::from_spot_ids(vec!["S1".into(), "S2".into()]).unwrap();
        meta.push_column(
            "score",
            VariableType::Continuous,
            vec![Variable::Continuous(0.5), Variable::Missing],
        )
        .unwrap();

        assert_eq!(meta.column_names(), &["score"]);
        assert_eq!(meta.get("S1", "score").unwrap().as_continuous(), Some(0.5));
        assert!(meta.get("S2", "score").unwrap().is_missing());

        let dup = meta.push_column("score", VariableType::Continuous, vec![Variable::Missing; 2]);
        assert!(matches!(dup, Err(CurateError::DuplicateId(_))));

        let short = meta.push_column("other", VariableType::Continuous, vec![Variable::Missing]);
        assert!(matches!(short, Err(CurateError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_missing_spots() {
        let file = create_test_tsv();
        let meta = SpotMetadata::from_tsv(file.path()).unwrap();
        let candidates = vec!["AAAC-1".to_string(), "ZZZZ-1".to_string()];
        assert_eq!(meta.missing_spots(&candidates), vec!["ZZZZ-1"]);
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let tsv = "spot_id\tregion\tregion\nS1\tcortex\tstriatum\n";
        match SpotMetadata::from_reader(tsv.as_bytes()) {
            Err(CurateError::DuplicateId(msg)) => assert!(msg.contains("region")),
            other => panic!("expected DuplicateId, got {:?}", other),
        }
    }

    #[test]
    fn test_header_names_trimmed() {
        let tsv = "spot_id\t region \tregion\nS1\tcortex\tstriatum\n";
        assert!(matches!(
            SpotMetadata::from_reader(tsv.as_bytes()),
            Err(CurateError::DuplicateId(_))
        ));

        let tsv = "spot_id\t cluster \nS1\t3\n";
        let meta = SpotMetadata::from_reader(tsv.as_bytes()).unwrap();
        assert_eq!(meta.column_names(), &["cluster"]);
        assert_eq!(meta.get("S1", "cluster").unwrap().as_continuous(), Some(3.0));
    }

    #[test]
    fn test_tsv_roundtrip() {
        let file = create_test_tsv();
        let meta = SpotMetadata::from_tsv(file.path()).unwrap();

        let out = NamedTempFile::new().unwrap();
        meta.to_tsv(out.path()).unwrap();
        let loaded = SpotMetadata::from_tsv(out.path()).unwrap();

        assert_eq!(loaded.spot_ids(), meta.spot_ids());
        assert_eq!(loaded.column_names(), meta.column_names());
        assert_eq!(
            loaded.get("AACT-1", "region").unwrap().as_categorical(),
            Some("hippocampus")
        );
        assert!(loaded.get("AAAG-1", "region").unwrap().is_missing());
    }
}
