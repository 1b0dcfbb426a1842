use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::accessor::{get, get_array, get_scalar_text, get_str, get_year};
use crate::models::{CanonicalRecord, PublicationEntry, Text, WorkCategory, YearFilter};
use crate::normalize::{normalize_doi, plain_field};

static BIBTEX_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(volume|number|pages|publisher|journal|booktitle)\s*=\s*(?:\{((?:[^{}]|\{[^{}]*\})*)\}|"([^"]*)"|(\d+))"#,
    )
    .expect("valid regex")
});

/// Extract deduplicated, categorized, year-filtered publications in
/// presentation order.
///
/// Work groups are keyed by the put-code of their first submission; groups
/// that share a key are merged. Each key yields at most one entry: the
/// titled submission with the most populated fields, first one winning ties.
pub fn extract_publications(record: &CanonicalRecord, filter: &YearFilter) -> Vec<PublicationEntry> {
    let groups = get_array(record.value(), "activities-summary.works.group");

    let mut keyed: Vec<(String, Vec<&Value>)> = Vec::new();
    let mut index_of: HashMap<String, usize> = HashMap::new();
    for (index, group) in groups.iter().enumerate() {
        let summaries = get_array(group, "work-summary");
        let Some(first) = summaries.first() else {
            debug!(index, "skipping work group without submissions");
            continue;
        };
        let key = get_scalar_text(first, "put-code").unwrap_or_else(|| format!("group-{index}"));
        match index_of.get(&key) {
            Some(&slot) => keyed[slot].1.extend(summaries),
            None => {
                index_of.insert(key.clone(), keyed.len());
                keyed.push((key, summaries.iter().collect()));
            }
        }
    }

    let mut entries: Vec<PublicationEntry> = keyed
        .into_iter()
        .filter_map(|(key, submissions)| {
            let entry = select_representative(&key, &submissions);
            if entry.is_none() {
                warn!(put_code = %key, "dropping work without a usable title");
            }
            entry
        })
        .filter(|entry| filter.contains(entry.year))
        .collect();

    entries.sort_by(PublicationEntry::presentation_order);
    entries
}

fn select_representative(put_code: &str, submissions: &[&Value]) -> Option<PublicationEntry> {
    let mut best: Option<PublicationEntry> = None;
    for submission in submissions {
        let Some(candidate) = parse_work(put_code, submission) else {
            continue;
        };
        let better = best
            .as_ref()
            .is_none_or(|current| candidate.richness() > current.richness());
        if better {
            best = Some(candidate);
        }
    }
    best
}

/// Build an entry from one work submission (summary or full detail).
fn parse_work(put_code: &str, work: &Value) -> Option<PublicationEntry> {
    if !work.is_object() {
        warn!(put_code, "skipping malformed work submission");
        return None;
    }

    let title = Text::from_raw(get_str(work, "title.title.value"))?;
    let raw_type = get_str(work, "type").trim().to_ascii_lowercase().replace('_', "-");
    let mut entry = PublicationEntry::new(title, WorkCategory::from_orcid_type(&raw_type), put_code);
    if !raw_type.is_empty() {
        entry.raw_type = raw_type;
    }

    entry.year = get_year(work, "publication-date.year.value");
    entry.month = u8::try_from(get(work, "publication-date.month.value", 0i64))
        .ok()
        .filter(|m| (1..=12).contains(m));
    entry.url = plain_field(get_str(work, "url.value"));
    entry.venue = plain_field(get_str(work, "journal-title.value"))
        .or_else(|| plain_field(get_str(work, "conference.name")));
    entry.abstract_text = plain_field(get_str(work, "short-description"));
    entry.authors = get_array(work, "contributors.contributor")
        .iter()
        .filter_map(|c| plain_field(get_str(c, "credit-name.value")))
        .collect();

    let (doi, external_ids) = read_external_ids(work);
    entry.doi = doi;
    entry.external_ids = external_ids;

    if get_str(work, "citation.citation-type").eq_ignore_ascii_case("bibtex") {
        apply_citation_fields(&mut entry, get_str(work, "citation.citation-value"));
    }

    Some(entry)
}

/// DOI plus every external id as `type -> value` (first value per type).
/// A DOI marked `self` is preferred over `part-of`/`version-of` ones.
fn read_external_ids(work: &Value) -> (Option<String>, BTreeMap<String, String>) {
    let mut ids = BTreeMap::new();
    let mut first_doi: Option<String> = None;
    let mut self_doi: Option<String> = None;

    for eid in get_array(work, "external-ids.external-id") {
        let id_type = get_str(eid, "external-id-type").trim().to_ascii_lowercase();
        let value = get_str(eid, "external-id-value").trim();
        if id_type.is_empty() || value.is_empty() {
            continue;
        }
        if id_type == "doi" {
            let doi = normalize_doi(value);
            if doi.is_empty() {
                continue;
            }
            if self_doi.is_none() && get_str(eid, "external-id-relationship") == "self" {
                self_doi = Some(doi.clone());
            }
            first_doi.get_or_insert_with(|| doi.clone());
        }
        ids.entry(id_type).or_insert_with(|| value.to_string());
    }

    (self_doi.or(first_doi), ids)
}

/// Fill bibliographic details from an embedded BibTeX citation. Fields the
/// structured record already carries win.
fn apply_citation_fields(entry: &mut PublicationEntry, bibtex: &str) {
    for caps in BIBTEX_FIELD_RE.captures_iter(bibtex) {
        let raw = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map_or("", |m| m.as_str());
        let value = plain_field(&raw.replace(['{', '}'], ""));
        let slot = match caps[1].to_ascii_lowercase().as_str() {
            "volume" => &mut entry.volume,
            "number" => &mut entry.issue,
            "pages" => &mut entry.pages,
            "publisher" => &mut entry.publisher,
            _ => &mut entry.venue,
        };
        if slot.is_none() {
            *slot = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn work(put_code: i64, title: &str, kind: &str, year: Option<&str>) -> Value {
        let mut w = json!({
            "put-code": put_code,
            "title": { "title": { "value": title } },
            "type": kind,
        });
        if let Some(y) = year {
            w["publication-date"] = json!({ "year": { "value": y } });
        }
        w
    }

    fn record(groups: Vec<Vec<Value>>) -> CanonicalRecord {
        let groups: Vec<Value> = groups
            .into_iter()
            .map(|summaries| json!({ "work-summary": summaries }))
            .collect();
        CanonicalRecord::new(json!({
            "activities-summary": { "works": { "group": groups } }
        }))
    }

    #[test]
    fn test_categorizes_raw_types() {
        let rec = record(vec![
            vec![work(1, "Conf", "paper-conference", Some("2020"))],
            vec![work(2, "Data", "dataset", Some("2021"))],
            vec![work(3, "Art", "JOURNAL_ARTICLE", Some("2022"))],
        ]);
        let pubs = extract_publications(&rec, &YearFilter::Unbounded);
        let by_title: HashMap<_, _> = pubs.iter().map(|p| (p.title.plain.as_str(), p.category)).collect();
        assert_eq!(by_title["Conf"], WorkCategory::ConferencePaper);
        assert_eq!(by_title["Data"], WorkCategory::Other);
        assert_eq!(by_title["Art"], WorkCategory::JournalArticle);
    }

    #[test]
    fn test_picks_richest_submission_per_put_code() {
        let sparse = work(42, "Sparse title", "journal-article", Some("2020"));
        let mut rich = work(42, "Rich title", "journal-article", Some("2020"));
        rich["journal-title"] = json!({ "value": "Nature" });
        rich["external-ids"] = json!({ "external-id": [
            { "external-id-type": "doi", "external-id-value": "10.1/ABC", "external-id-relationship": "self" }
        ]});

        let rec = record(vec![vec![sparse, rich]]);
        let pubs = extract_publications(&rec, &YearFilter::Unbounded);
        assert_eq!(pubs.len(), 1);
        assert_eq!(pubs[0].doi.as_deref(), Some("10.1/abc"));
        assert_eq!(pubs[0].venue.as_deref(), Some("Nature"));
        assert_eq!(pubs[0].source_put_code, "42");
    }

    #[test]
    fn test_merges_groups_sharing_a_put_code() {
        let rec = record(vec![
            vec![work(7, "First", "other", Some("2019"))],
            vec![work(7, "Second", "other", Some("2019"))],
        ]);
        let pubs = extract_publications(&rec, &YearFilter::Unbounded);
        assert_eq!(pubs.len(), 1);
        assert_eq!(pubs[0].title.plain, "First");
    }

    #[test]
    fn test_tie_keeps_first_submission() {
        let rec = record(vec![vec![
            work(5, "Alpha", "other", Some("2019")),
            work(5, "Beta", "other", Some("2019")),
        ]]);
        let pubs = extract_publications(&rec, &YearFilter::Unbounded);
        assert_eq!(pubs[0].title.plain, "Alpha");
    }

    #[test]
    fn test_drops_untitled_work() {
        let rec = record(vec![
            vec![work(1, "   ", "other", Some("2020"))],
            vec![json!("not an object")],
            vec![work(2, "Kept", "other", None)],
        ]);
        let pubs = extract_publications(&rec, &YearFilter::Unbounded);
        assert_eq!(pubs.len(), 1);
        assert_eq!(pubs[0].title.plain, "Kept");
    }

    #[test]
    fn test_year_filter_applies() {
        let rec = record(vec![
            vec![work(1, "Old", "other", Some("2023"))],
            vec![work(2, "Current", "other", Some("2024"))],
            vec![work(3, "Undated", "other", None)],
        ]);
        let filter = YearFilter::try_parse("2024").unwrap();
        let pubs = extract_publications(&rec, &filter);
        let titles: Vec<_> = pubs.iter().map(|p| p.title.plain.as_str()).collect();
        assert_eq!(titles, ["Current"]);

        let all = extract_publications(&rec, &YearFilter::Unbounded);
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].title.plain, "Undated");
    }

    #[test]
    fn test_sorted_by_year_then_title() {
        let rec = record(vec![
            vec![work(1, "b paper", "other", Some("2020"))],
            vec![work(2, "A paper", "other", Some("2020"))],
            vec![work(3, "Newest", "other", Some("2024"))],
        ]);
        let pubs = extract_publications(&rec, &YearFilter::Unbounded);
        let titles: Vec<_> = pubs.iter().map(|p| p.title.plain.as_str()).collect();
        assert_eq!(titles, ["Newest", "A paper", "b paper"]);
    }

    #[test]
    fn test_prefers_self_doi_and_keeps_all_ids() {
        let mut w = work(1, "T", "journal-article", Some("2020"));
        w["external-ids"] = json!({ "external-id": [
            { "external-id-type": "doi", "external-id-value": "https://doi.org/10.9/Series", "external-id-relationship": "part-of" },
            { "external-id-type": "doi", "external-id-value": "10.1/Self/", "external-id-relationship": "self" },
            { "external-id-type": "eid", "external-id-value": "2-s2.0-123" }
        ]});
        let pubs = extract_publications(&record(vec![vec![w]]), &YearFilter::Unbounded);
        assert_eq!(pubs[0].doi.as_deref(), Some("10.1/self"));
        assert_eq!(pubs[0].external_ids["eid"], "2-s2.0-123");
        assert_eq!(pubs[0].external_ids["doi"], "https://doi.org/10.9/Series");
    }

    #[test]
    fn test_reads_detail_fields() {
        let mut w = work(9, "Deep <i>things</i> &amp; more", "journal-article", Some("2021"));
        w["publication-date"]["month"] = json!({ "value": "03" });
        w["url"] = json!({ "value": "https://example.org/paper" });
        w["short-description"] = json!("An abstract.");
        w["contributors"] = json!({ "contributor": [
            { "credit-name": { "value": "Ada Lovelace" } },
            { "credit-name": null },
            { "credit-name": { "value": "Charles Babbage" } }
        ]});
        w["citation"] = json!({
            "citation-type": "bibtex",
            "citation-value": "@article{x, journal = {J. Things}, volume = {12}, number = \"3\", pages = {1--9}, publisher = {ACM}}"
        });

        let pubs = extract_publications(&record(vec![vec![w]]), &YearFilter::Unbounded);
        let p = &pubs[0];
        assert_eq!(p.title.plain, "Deep things & more");
        assert_eq!(p.title.markup, r"Deep \textit{things} \& more");
        assert_eq!(p.month, Some(3));
        assert_eq!(p.url.as_deref(), Some("https://example.org/paper"));
        assert_eq!(p.authors, ["Ada Lovelace", "Charles Babbage"]);
        assert_eq!(p.venue.as_deref(), Some("J. Things"));
        assert_eq!(p.volume.as_deref(), Some("12"));
        assert_eq!(p.issue.as_deref(), Some("3"));
        assert_eq!(p.pages.as_deref(), Some("1--9"));
        assert_eq!(p.publisher.as_deref(), Some("ACM"));
        assert_eq!(p.abstract_text.as_deref(), Some("An abstract."));
    }

    #[test]
    fn test_missing_works_yields_empty() {
        let rec = CanonicalRecord::new(json!({ "person": {} }));
        assert!(extract_publications(&rec, &YearFilter::Unbounded).is_empty());
    }
}
