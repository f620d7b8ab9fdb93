//! Data profiling primitives for understanding contribution matrix characteristics.

mod prevalence;

pub use prevalence::{classify_cell_types, profile_prevalence, CellTypePrevalence, PrevalenceProfile};
