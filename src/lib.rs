//! Spatial Deconvolution Curation Library
//!
//! This library curates the spot × cell-type contribution matrices produced by
//! spatial transcriptomics deconvolution models such as SPOTlight.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (ContributionMatrix, SpotMetadata)
//! - **curate**: Cleaning, variable cell-type selection, key-aligned attach
//! - **profile**: Per cell-type prevalence profiling
//! - **palette**: Seeded cell-type color assignment
//! - **pipeline**: Curation composition and execution
//!
//! # Example
//!
//! ```no_run
//! use spot_deconv_curator::prelude::*;
//!
//! // Load data
//! let raw = ContributionMatrix::from_tsv("decon_mtrx.tsv").unwrap();
//! let metadata = SpotMetadata::from_tsv("spots.tsv").unwrap();
//!
//! // Run the curation
//! let report = Curation::new()
//!     .minor_threshold(0.02)
//!     .prevalence_bounds(0.0, 0.8)
//!     .seed(123)
//!     .run(&raw, Some(&metadata))
//!     .unwrap();
//!
//! println!("{}", report.prevalence);
//! println!("Variable cell types: {:?}", report.variable);
//! ```

pub mod curate;
pub mod data;
pub mod error;
pub mod palette;
pub mod pipeline;
pub mod profile;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::curate::{
        attach, clean, clean_with_stats, select_variable_cell_types, CellTypeClass, CleanConfig,
        CleanStats, PrevalenceBounds,
    };
    pub use crate::data::{ContributionMatrix, SpotMetadata, Variable, VariableType};
    pub use crate::error::{CurateError, Result};
    pub use crate::palette::{Palette, PaletteEntry};
    pub use crate::pipeline::{Curation, CurationConfig, CurationReport};
    pub use crate::profile::{
        classify_cell_types, profile_prevalence, CellTypePrevalence, PrevalenceProfile,
    };
}
