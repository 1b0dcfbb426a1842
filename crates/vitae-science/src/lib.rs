//! vitae science: ORCID record source, DOI metadata enrichment and renderers.

pub mod enrichment;
pub mod error;
pub mod formats;
pub mod http;
pub mod identifiers;
pub mod sources;

pub use enrichment::{EnrichmentReport, PartialMetadata, enrich};
pub use error::{Result, ScienceError};
pub use identifiers::Doi;
pub use sources::{MetadataSource, RecordSource};
