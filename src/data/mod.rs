//! Data structures for deconvolution curation.

mod contribution;
mod metadata;

pub use contribution::{is_missing_label, ContributionMatrix, SPOT_ID_HEADER};
pub use metadata::{SpotMetadata, Variable, VariableType};
