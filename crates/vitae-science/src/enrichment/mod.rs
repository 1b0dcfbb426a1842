pub mod merge;
pub mod pipeline;

pub use merge::{FILL_RULES, FillRule, PartialMetadata, has_gaps, merge_fill_only};
pub use pipeline::{EnrichmentReport, enrich};
