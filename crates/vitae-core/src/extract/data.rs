use serde_json::Value;
use tracing::{debug, warn};

use crate::accessor::{get_array, get_str, get_year};
use crate::models::{CanonicalRecord, DataEntry, DataGroup, DataSection, Text, YearFilter};
use crate::normalize::plain_field;

/// Extract the non-publication subsections in declared order, omitting
/// sections with nothing in them.
///
/// `_year_filter` is accepted for symmetry with [`super::extract_publications`]
/// and not applied; data sections are always listed in full.
pub fn extract_data(record: &CanonicalRecord, _year_filter: &YearFilter) -> Vec<DataGroup> {
    let root = record.value();
    DataSection::ALL
        .iter()
        .filter_map(|&section| {
            let entries = match section {
                DataSection::Biography => extract_biography(root),
                DataSection::Funding => extract_fundings(root),
                DataSection::ExternalIdentifiers => extract_external_identifiers(root),
                _ => extract_affiliations(root, section),
            };
            if entries.is_empty() {
                debug!(section = section.json_key(), "omitting empty section");
                None
            } else {
                Some(DataGroup { section, entries })
            }
        })
        .collect()
}

fn extract_biography(root: &Value) -> Vec<DataEntry> {
    Text::from_raw(get_str(root, "person.biography.content"))
        .map(|text| DataEntry {
            text: Some(text),
            ..Default::default()
        })
        .into_iter()
        .collect()
}

fn extract_external_identifiers(root: &Value) -> Vec<DataEntry> {
    get_array(root, "person.external-identifiers.external-identifier")
        .iter()
        .filter_map(|item| {
            let kind = plain_field(get_str(item, "external-id-type"));
            let value = plain_field(get_str(item, "external-id-value"));
            if kind.is_none() || value.is_none() {
                warn!("skipping external identifier without type or value");
                return None;
            }
            Some(DataEntry {
                kind,
                value,
                url: non_empty(get_str(item, "external-id-url.value")),
                ..Default::default()
            })
        })
        .collect()
}

fn extract_affiliations(root: &Value, section: DataSection) -> Vec<DataEntry> {
    let Some((section_key, summary_key)) = section.affiliation_keys() else {
        return Vec::new();
    };
    let groups = get_array(root, &format!("activities-summary.{section_key}.affiliation-group"));

    let mut entries: Vec<DataEntry> = groups
        .iter()
        .flat_map(|group| get_array(group, "summaries"))
        .filter_map(|wrapper| {
            let summary = wrapper.get(summary_key)?;
            let entry = DataEntry {
                organization: plain_field(get_str(summary, "organization.name")),
                location: location(summary),
                role: plain_field(get_str(summary, "role-title")),
                department: plain_field(get_str(summary, "department-name")),
                url: non_empty(get_str(summary, "url.value")),
                start_year: get_year(summary, "start-date.year.value"),
                end_year: get_year(summary, "end-date.year.value"),
                ..Default::default()
            };
            if entry.is_blank() {
                warn!(section = section.json_key(), "skipping malformed affiliation");
                return None;
            }
            Some(entry)
        })
        .collect();

    sort_by_start_year(&mut entries);
    entries
}

fn extract_fundings(root: &Value) -> Vec<DataEntry> {
    let mut entries: Vec<DataEntry> = get_array(root, "activities-summary.fundings.group")
        .iter()
        .flat_map(|group| get_array(group, "funding-summary"))
        .filter_map(|summary| {
            let entry = DataEntry {
                text: Text::from_raw(get_str(summary, "title.title.value")),
                organization: plain_field(get_str(summary, "organization.name")),
                kind: plain_field(get_str(summary, "type")),
                url: non_empty(get_str(summary, "url.value")),
                start_year: get_year(summary, "start-date.year.value"),
                end_year: get_year(summary, "end-date.year.value"),
                ..Default::default()
            };
            if entry.is_blank() {
                warn!("skipping malformed funding");
                return None;
            }
            Some(entry)
        })
        .collect();

    sort_by_start_year(&mut entries);
    entries
}

/// `city, region, country`, skipping empty parts.
fn location(summary: &Value) -> Option<String> {
    let parts: Vec<String> = ["city", "region", "country"]
        .iter()
        .filter_map(|part| plain_field(get_str(summary, &format!("organization.address.{part}"))))
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

/// Newest first, undated last; stable for equal years.
fn sort_by_start_year(entries: &mut [DataEntry]) {
    entries.sort_by(|a, b| {
        b.start_year
            .is_some()
            .cmp(&a.start_year.is_some())
            .then_with(|| b.start_year.cmp(&a.start_year))
    });
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn affiliation(org: &str, role: &str, start: Option<&str>) -> Value {
        let mut s = json!({
            "organization": {
                "name": org,
                "address": { "city": "Boston", "region": "MA", "country": "US" }
            },
            "role-title": role,
        });
        if let Some(y) = start {
            s["start-date"] = json!({ "year": { "value": y } });
        }
        s
    }

    fn full_record() -> CanonicalRecord {
        CanonicalRecord::new(json!({
            "person": {
                "biography": { "content": "Works on <b>things</b> &amp; stuff." },
                "external-identifiers": { "external-identifier": [
                    { "external-id-type": "Scopus Author ID", "external-id-value": "123",
                      "external-id-url": { "value": "https://scopus.com/123" } },
                    { "external-id-type": "", "external-id-value": "orphan" }
                ]}
            },
            "activities-summary": {
                "employments": { "affiliation-group": [
                    { "summaries": [ { "employment-summary": affiliation("Old U", "Lecturer", Some("2010")) } ] },
                    { "summaries": [ { "employment-summary": affiliation("New U", "Professor", Some("2018")) } ] },
                    { "summaries": [ { "employment-summary": affiliation("Somewhere", "Visitor", None) } ] }
                ]},
                "educations": { "affiliation-group": [] },
                "fundings": { "group": [
                    { "funding-summary": [ {
                        "title": { "title": { "value": "Big Grant" } },
                        "organization": { "name": "NSF" },
                        "type": "grant",
                        "start-date": { "year": { "value": "2020" } },
                        "end-date": { "year": { "value": "2023" } }
                    } ] }
                ]}
            }
        }))
    }

    #[test]
    fn test_sections_in_declared_order_and_empty_omitted() {
        let groups = extract_data(&full_record(), &YearFilter::Unbounded);
        let sections: Vec<_> = groups.iter().map(|g| g.section).collect();
        assert_eq!(
            sections,
            [
                DataSection::Biography,
                DataSection::Employment,
                DataSection::Funding,
                DataSection::ExternalIdentifiers,
            ]
        );
        assert!(groups.iter().all(|g| !g.entries.is_empty()));
    }

    #[test]
    fn test_biography_normalized() {
        let groups = extract_data(&full_record(), &YearFilter::Unbounded);
        let bio = groups[0].entries[0].text.as_ref().unwrap();
        assert_eq!(bio.plain, "Works on things & stuff.");
        assert_eq!(bio.markup, r"Works on \textbf{things} \& stuff.");
    }

    #[test]
    fn test_affiliations_sorted_newest_first() {
        let groups = extract_data(&full_record(), &YearFilter::Unbounded);
        let orgs: Vec<_> = groups[1]
            .entries
            .iter()
            .map(|e| e.organization.as_deref().unwrap())
            .collect();
        assert_eq!(orgs, ["New U", "Old U", "Somewhere"]);
        assert_eq!(groups[1].entries[0].location.as_deref(), Some("Boston, MA, US"));
        assert_eq!(groups[1].entries[0].role.as_deref(), Some("Professor"));
    }

    #[test]
    fn test_funding_fields() {
        let groups = extract_data(&full_record(), &YearFilter::Unbounded);
        let funding = &groups[2].entries[0];
        assert_eq!(funding.text.as_ref().unwrap().plain, "Big Grant");
        assert_eq!(funding.organization.as_deref(), Some("NSF"));
        assert_eq!(funding.kind.as_deref(), Some("grant"));
        assert_eq!(funding.year_span().as_deref(), Some("2020--2023"));
    }

    #[test]
    fn test_identifiers_skip_incomplete() {
        let groups = extract_data(&full_record(), &YearFilter::Unbounded);
        let ids = &groups[3].entries;
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].value.as_deref(), Some("123"));
        assert_eq!(ids[0].url.as_deref(), Some("https://scopus.com/123"));
    }

    #[test]
    fn test_year_filter_is_ignored() {
        let bounded = YearFilter::try_parse("1999").unwrap();
        let filtered = extract_data(&full_record(), &bounded);
        let unfiltered = extract_data(&full_record(), &YearFilter::Unbounded);
        assert_eq!(filtered, unfiltered);
    }

    #[test]
    fn test_empty_record_has_no_sections() {
        let rec = CanonicalRecord::new(json!({}));
        assert!(extract_data(&rec, &YearFilter::Unbounded).is_empty());
    }
}
