//! Curation composition and execution.

mod runner;

pub use runner::{Curation, CurationConfig, CurationReport, DEFAULT_SEED};
