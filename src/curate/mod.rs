//! Curation primitives for deconvolution contribution matrices.

pub mod attach;
pub mod clean;
pub mod variable;

pub use attach::attach;
pub use clean::{
    clean, clean_with_stats, default_residual_labels, CleanConfig, CleanStats,
    DEFAULT_MINOR_THRESHOLD, DEFAULT_RESIDUAL_LABELS,
};
pub use variable::{
    select_variable_cell_types, CellTypeClass, PrevalenceBounds, DEFAULT_UBIQUITOUS_PREVALENCE,
};
