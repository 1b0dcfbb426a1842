use async_trait::async_trait;
use vitae_core::{CanonicalRecord, Freshness, OrcidId};

use crate::enrichment::PartialMetadata;
use crate::error::Result;
use crate::identifiers::Doi;

pub mod doi_content;
pub mod orcid;

pub use doi_content::DoiContentSource;
pub use orcid::OrcidApiSource;

/// Secondary metadata for a DOI. Any failure (not found, rate limited,
/// transport) surfaces as an error after the source's own retries.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    fn name(&self) -> &str;

    async fn lookup(&self, doi: &Doi) -> Result<PartialMetadata>;
}

/// Supplies complete canonical records. Fails with `RecordUnavailable`
/// when neither cache nor upstream has the record.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn get_record(&self, id: &OrcidId, freshness: Freshness) -> Result<CanonicalRecord>;
}
