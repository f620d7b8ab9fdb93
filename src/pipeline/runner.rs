//! Curation runner composing clean, profile, select, attach and palette steps.

use crate::curate::{
    attach, clean_with_stats, default_residual_labels, select_variable_cell_types, CleanConfig,
    CleanStats, PrevalenceBounds, DEFAULT_MINOR_THRESHOLD, DEFAULT_UBIQUITOUS_PREVALENCE,
};
use crate::data::{ContributionMatrix, SpotMetadata};
use crate::error::{CurateError, Result};
use crate::palette::Palette;
use crate::profile::{profile_prevalence, PrevalenceProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Seed used when none is configured.
pub const DEFAULT_SEED: u64 = 123;

fn default_name() -> String {
    "unnamed".to_string()
}

fn default_minor_threshold() -> f64 {
    DEFAULT_MINOR_THRESHOLD
}

fn default_upper() -> f64 {
    DEFAULT_UBIQUITOUS_PREVALENCE
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

/// Curation configuration for serialization.
///
/// Every field is optional in YAML and falls back to the reference values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationConfig {
    /// Name of the run.
    #[serde(default = "default_name")]
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Contributions strictly below this are zeroed.
    #[serde(default = "default_minor_threshold")]
    pub minor_threshold: f64,
    /// Labels of columns dropped as residual.
    #[serde(default = "default_residual_labels")]
    pub residual_labels: Vec<String>,
    /// Variable cell types need prevalence strictly above this.
    #[serde(default)]
    pub lower_exclusive: f64,
    /// Variable cell types need prevalence strictly below this.
    #[serde(default = "default_upper")]
    pub upper: f64,
    /// Seed for palette assignment.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Fixed colors per cell type.
    #[serde(default)]
    pub palette: BTreeMap<String, String>,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: None,
            minor_threshold: DEFAULT_MINOR_THRESHOLD,
            residual_labels: default_residual_labels(),
            lower_exclusive: 0.0,
            upper: DEFAULT_UBIQUITOUS_PREVALENCE,
            seed: DEFAULT_SEED,
            palette: BTreeMap::new(),
        }
    }
}

impl CurationConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(CurateError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(CurateError::from)
    }

    /// Cleaning parameters.
    pub fn clean_config(&self) -> CleanConfig {
        CleanConfig::new(self.minor_threshold).with_residual_labels(&self.residual_labels)
    }

    /// Prevalence bounds for variable selection.
    pub fn bounds(&self) -> PrevalenceBounds {
        PrevalenceBounds::new(self.lower_exclusive, self.upper)
    }
}

/// Everything a curation run produces.
#[derive(Debug, Clone)]
pub struct CurationReport {
    /// Name of the run.
    pub name: String,
    /// Cleaned matrix, all cell types.
    pub cleaned: ContributionMatrix,
    /// What cleaning removed.
    pub clean_stats: CleanStats,
    /// Per cell-type prevalence.
    pub prevalence: PrevalenceProfile,
    /// Variable cell types, in column order.
    pub variable: Vec<String>,
    /// Metadata with proportions attached, when metadata was supplied.
    pub attached: Option<SpotMetadata>,
    /// Colors for every cleaned cell type.
    pub palette: Palette,
}

/// Builder for constructing and running curations.
#[derive(Debug, Clone)]
pub struct Curation {
    config: CurationConfig,
}

impl Default for Curation {
    fn default() -> Self {
        Self::new()
    }
}

impl Curation {
    /// Create a curation with reference defaults.
    pub fn new() -> Self {
        Self {
            config: CurationConfig::default(),
        }
    }

    /// Create from a config.
    pub fn from_config(config: &CurationConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Set the run name.
    pub fn name(mut self, name: &str) -> Self {
        self.config.name = name.to_string();
        self
    }

    /// Set the minor-contribution threshold.
    pub fn minor_threshold(mut self, threshold: f64) -> Self {
        self.config.minor_threshold = threshold;
        self
    }

    /// Set the residual column labels.
    pub fn residual_labels(mut self, labels: &[&str]) -> Self {
        self.config.residual_labels = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Set the open prevalence interval for variable cell types.
    pub fn prevalence_bounds(mut self, lower_exclusive: f64, upper: f64) -> Self {
        self.config.lower_exclusive = lower_exclusive;
        self.config.upper = upper;
        self
    }

    /// Set the palette seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Pin a color for one cell type.
    pub fn color(mut self, label: &str, color: &str) -> Self {
        self.config
            .palette
            .insert(label.to_string(), color.to_string());
        self
    }

    /// Export the current configuration.
    pub fn to_config(&self, description: Option<&str>) -> CurationConfig {
        CurationConfig {
            description: description.map(String::from),
            ..self.config.clone()
        }
    }

    /// Run the curation on a raw matrix, attaching to `metadata` if given.
    ///
    /// Nothing is returned unless every step succeeds.
    pub fn run(
        &self,
        raw: &ContributionMatrix,
        metadata: Option<&SpotMetadata>,
    ) -> Result<CurationReport> {
        let config = &self.config;
        let bounds = config.bounds();
        info!(
            name = %config.name,
            n_spots = raw.n_spots(),
            n_columns = raw.n_columns(),
            "running curation"
        );

        let (cleaned, clean_stats) =
            clean_with_stats(raw, &config.clean_config()).map_err(|e| step_error("clean", e))?;
        let prevalence =
            profile_prevalence(&cleaned, &bounds).map_err(|e| step_error("profile", e))?;
        let variable = select_variable_cell_types(&cleaned, &bounds)
            .map_err(|e| step_error("select", e))?;
        let attached = metadata
            .map(|m| attach(&cleaned, m))
            .transpose()
            .map_err(|e| step_error("attach", e))?;
        let palette = Palette::assign(&cleaned.defined_labels(), &config.palette, config.seed)
            .map_err(|e| step_error("palette", e))?;

        info!(
            n_cell_types = cleaned.n_columns(),
            n_variable = variable.len(),
            n_ubiquitous = prevalence.n_ubiquitous,
            n_absent = prevalence.n_absent,
            "curation complete"
        );

        Ok(CurationReport {
            name: config.name.clone(),
            cleaned,
            clean_stats,
            prevalence,
            variable,
            attached,
            palette,
        })
    }
}

fn step_error(step: &str, e: CurateError) -> CurateError {
    CurateError::Pipeline(format!("Step '{}' failed: {}", step, e))
}
