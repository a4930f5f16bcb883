//! Dataset organization
//!
//! - `split`: seeded shuffle and truncated train/val/test boundaries
//! - `organizer`: writes the `<split>/<category>/` tree and summarizes it

pub mod organizer;
pub mod split;

pub use organizer::{
    dataset_summary, DatasetOrganizer, DatasetSummary, OrganizeSummary, SplitInfo, SplitSummary,
    DATASET_EXTENSIONS,
};
pub use split::{assign, split_sizes, SplitAssignment, SplitName};
