//! Output renderers and the field assembly they share.
//!
//! Grouping, author shortening, DOI links and the category→record-type
//! mapping are computed once here, so the three formats carry the same
//! content and only differ in syntax.

pub mod bibtex;
pub mod json;
pub mod latex;

use chrono::{DateTime, Utc};
use vitae_core::{OrcidId, PublicationEntry, WorkCategory};

/// Per-run values every renderer needs.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub orcid: &'a OrcidId,
    pub generated_at: DateTime<Utc>,
    pub author_limit: usize,
}

/// A publication with its derived display fields.
#[derive(Debug, Clone)]
pub struct AssembledEntry<'a> {
    pub entry: &'a PublicationEntry,
    /// `"Lovelace, A., Babbage, C., et al."`
    pub authors_short: Option<String>,
    pub doi_url: Option<String>,
    pub record_type: &'static str,
    pub venue_field: &'static str,
}

/// All entries of one category, in presentation order.
#[derive(Debug, Clone)]
pub struct CategoryGroup<'a> {
    pub category: WorkCategory,
    pub entries: Vec<AssembledEntry<'a>>,
}

/// Group `entries` by category in fixed order. Every category is present,
/// possibly empty; order inside a group is the input order.
pub fn assemble(entries: &[PublicationEntry], author_limit: usize) -> Vec<CategoryGroup<'_>> {
    WorkCategory::ALL
        .iter()
        .map(|&category| CategoryGroup {
            category,
            entries: entries
                .iter()
                .filter(|e| e.category == category)
                .map(|entry| AssembledEntry {
                    entry,
                    authors_short: short_author_list(&entry.authors, author_limit),
                    doi_url: entry.doi.as_deref().map(doi_url),
                    record_type: category.bibtex_type(),
                    venue_field: category.venue_field(),
                })
                .collect(),
        })
        .collect()
}

pub fn total_count(groups: &[CategoryGroup<'_>]) -> usize {
    groups.iter().map(|g| g.entries.len()).sum()
}

pub fn doi_url(doi: &str) -> String {
    format!("https://doi.org/{doi}")
}

/// `"Ada King Lovelace"` → `"Lovelace, A.K."`. Names already written
/// `"Last, First"` keep their surname. Single-word names pass through.
pub fn short_author(name: &str) -> String {
    let name = name.trim();
    let (last, given): (&str, Vec<&str>) = match name.split_once(',') {
        Some((last, rest)) => (last.trim(), rest.split_whitespace().collect()),
        None => {
            let mut parts: Vec<&str> = name.split_whitespace().collect();
            match parts.pop() {
                Some(last) if !parts.is_empty() => (last, parts),
                _ => return name.to_string(),
            }
        }
    };
    let initials: String = given
        .iter()
        .flat_map(|word| word.split('-'))
        .filter_map(|part| part.chars().find(|c| c.is_alphabetic()))
        .map(|c| format!("{c}."))
        .collect();
    if initials.is_empty() {
        last.to_string()
    } else {
        format!("{last}, {initials}")
    }
}

/// First `limit` authors shortened, then `"et al."` when more exist.
pub fn short_author_list(authors: &[String], limit: usize) -> Option<String> {
    if authors.is_empty() {
        return None;
    }
    let mut shown: Vec<String> = authors.iter().take(limit.max(1)).map(|a| short_author(a)).collect();
    if authors.len() > shown.len() {
        shown.push("et al.".to_string());
    }
    Some(shown.join(", "))
}
