use std::collections::BTreeMap;

use tracing::{debug, info, warn};
use vitae_core::PublicationEntry;

use crate::enrichment::merge::{has_gaps, merge_fill_only};
use crate::identifiers::Doi;
use crate::sources::MetadataSource;

/// Outcome tallies of one enrichment pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub enriched: usize,
    pub skipped_no_doi: usize,
    pub skipped_complete: usize,
    pub skipped_invalid: usize,
    pub failed: usize,
    /// Per-field fill counts.
    pub fields_filled: BTreeMap<&'static str, usize>,
}

impl EnrichmentReport {
    /// Entries that gained at least one field.
    pub fn touched(&self) -> usize {
        self.enriched
    }

    /// Entries whose lookup failed and were left as ORCID supplied them.
    pub fn unenriched(&self) -> usize {
        self.failed
    }
}

/// Fill gaps in `entries` from `source`, one DOI at a time.
///
/// Only empty fields are written, so ORCID values survive and a second pass
/// over the same entries changes nothing. A failed lookup is counted and the
/// pass moves on to the next entry.
pub async fn enrich(entries: &mut [PublicationEntry], source: &dyn MetadataSource) -> EnrichmentReport {
    let mut report = EnrichmentReport::default();

    for entry in entries.iter_mut() {
        let Some(raw_doi) = entry.doi.as_deref() else {
            report.skipped_no_doi += 1;
            continue;
        };
        if !has_gaps(entry) {
            report.skipped_complete += 1;
            continue;
        }
        let doi = match Doi::parse(raw_doi) {
            Ok(doi) => doi,
            Err(e) => {
                debug!(put_code = %entry.source_put_code, error = %e, "not querying invalid DOI");
                report.skipped_invalid += 1;
                continue;
            }
        };

        match source.lookup(&doi).await {
            Ok(meta) => {
                let filled = merge_fill_only(entry, &meta);
                if filled.is_empty() {
                    debug!(doi = %doi, "lookup returned nothing new");
                    continue;
                }
                debug!(doi = %doi, fields = ?filled, "filled gaps");
                report.enriched += 1;
                for field in filled {
                    *report.fields_filled.entry(field).or_default() += 1;
                }
            }
            Err(e) => {
                warn!(doi = %doi, source = source.name(), error = %e, "metadata lookup failed");
                report.failed += 1;
            }
        }
    }

    info!(
        enriched = report.enriched,
        without_doi = report.skipped_no_doi,
        already_complete = report.skipped_complete,
        invalid_doi = report.skipped_invalid,
        failed = report.failed,
        "enrichment finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use vitae_core::{Text, WorkCategory};

    use crate::enrichment::PartialMetadata;
    use crate::error::{Result, ScienceError};

    /// Answers from a fixed table; unknown DOIs fail like an exhausted retry.
    struct TableSource {
        table: HashMap<String, PartialMetadata>,
        calls: Mutex<Vec<String>>,
    }

    impl TableSource {
        fn new(rows: &[(&str, PartialMetadata)]) -> Self {
            Self {
                table: rows
                    .iter()
                    .map(|(doi, meta)| (doi.to_string(), meta.clone()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MetadataSource for TableSource {
        fn name(&self) -> &str {
            "table"
        }

        async fn lookup(&self, doi: &Doi) -> Result<PartialMetadata> {
            self.calls.lock().unwrap().push(doi.normalized.clone());
            self.table
                .get(&doi.normalized)
                .cloned()
                .ok_or_else(|| ScienceError::LookupFailed {
                    doi: doi.normalized.clone(),
                    reason: "HTTP 404".to_string(),
                })
        }
    }

    fn entry(title: &str, doi: Option<&str>) -> PublicationEntry {
        let mut e = PublicationEntry::new(Text::from_raw(title).unwrap(), WorkCategory::JournalArticle, title);
        e.doi = doi.map(str::to_string);
        e
    }

    fn venue_meta(venue: &str) -> PartialMetadata {
        PartialMetadata {
            venue: Some(venue.to_string()),
            volume: Some("7".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn failed_lookup_leaves_entry_and_continues() {
        let source = TableSource::new(&[("10.2/y", venue_meta("Science"))]);
        let mut entries = vec![entry("fails", Some("10.1/x")), entry("works", Some("10.2/y"))];
        let failing_before = entries[0].clone();

        let report = enrich(&mut entries, &source).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.unenriched(), 1);
        assert_eq!(report.enriched, 1);
        assert_eq!(entries[0], failing_before);
        assert_eq!(entries[1].venue.as_deref(), Some("Science"));
        assert_eq!(source.calls(), ["10.1/x", "10.2/y"]);
    }

    #[tokio::test]
    async fn orcid_values_are_never_overwritten() {
        let source = TableSource::new(&[("10.2/y", venue_meta("Registry Venue"))]);
        let mut e = entry("t", Some("10.2/y"));
        e.venue = Some("ORCID Venue".to_string());
        let mut entries = vec![e];

        let report = enrich(&mut entries, &source).await;

        assert_eq!(entries[0].venue.as_deref(), Some("ORCID Venue"));
        assert_eq!(entries[0].volume.as_deref(), Some("7"));
        assert_eq!(report.fields_filled.get("volume"), Some(&1));
        assert!(!report.fields_filled.contains_key("venue"));
    }

    #[tokio::test]
    async fn second_pass_is_a_no_op() {
        let source = TableSource::new(&[("10.2/y", venue_meta("Science"))]);
        let mut entries = vec![entry("a", Some("10.2/y")), entry("b", None)];

        enrich(&mut entries, &source).await;
        let after_first = entries.clone();
        let second = enrich(&mut entries, &source).await;

        assert_eq!(entries, after_first);
        assert_eq!(second.touched(), 0);
    }

    #[tokio::test]
    async fn skips_are_tallied() {
        let source = TableSource::new(&[]);
        let mut complete = entry("complete", Some("10.3/z"));
        complete.venue = Some("v".into());
        complete.volume = Some("1".into());
        complete.issue = Some("1".into());
        complete.pages = Some("1-2".into());
        complete.month = Some(1);
        complete.publisher = Some("p".into());
        complete.abstract_text = Some("a".into());
        complete.authors = vec!["A B".into()];

        let mut entries = vec![entry("no doi", None), entry("bad doi", Some("not-a-doi")), complete];
        let report = enrich(&mut entries, &source).await;

        assert_eq!(report.skipped_no_doi, 1);
        assert_eq!(report.skipped_invalid, 1);
        assert_eq!(report.skipped_complete, 1);
        assert_eq!(report.failed, 0);
        assert!(source.calls().is_empty());
    }
}
