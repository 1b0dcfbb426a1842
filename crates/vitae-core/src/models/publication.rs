use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalize::{to_markup_text, to_plain_text};

/// Presentation category of a work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkCategory {
    JournalArticle,
    ConferencePaper,
    Other,
}

impl WorkCategory {
    /// Render order of the publication document.
    pub const ALL: [WorkCategory; 3] = [
        WorkCategory::JournalArticle,
        WorkCategory::ConferencePaper,
        WorkCategory::Other,
    ];

    /// Map a raw ORCID work type. ORCID mixes `journal-article`,
    /// `JOURNAL_ARTICLE` and CSL-style `paper-conference`; all are folded
    /// before lookup. Anything unrecognized is `Other`.
    pub fn from_orcid_type(raw: &str) -> Self {
        let folded = raw.trim().to_ascii_lowercase().replace('_', "-");
        match folded.as_str() {
            "journal-article" | "journal-issue" | "article-journal" => Self::JournalArticle,
            "conference-paper" | "conference-abstract" | "conference-poster"
            | "paper-conference" => Self::ConferencePaper,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::JournalArticle => "journal-article",
            Self::ConferencePaper => "conference-paper",
            Self::Other => "other",
        }
    }

    pub fn heading(self) -> &'static str {
        match self {
            Self::JournalArticle => "Journal Articles",
            Self::ConferencePaper => "Conference Papers",
            Self::Other => "Other Publications",
        }
    }

    pub fn json_key(self) -> &'static str {
        match self {
            Self::JournalArticle => "journal_articles",
            Self::ConferencePaper => "conference_papers",
            Self::Other => "other_publications",
        }
    }

    /// Bibliography record type. Shares the category so headings and
    /// record types can never disagree.
    pub fn bibtex_type(self) -> &'static str {
        match self {
            Self::JournalArticle => "article",
            Self::ConferencePaper => "inproceedings",
            Self::Other => "misc",
        }
    }

    /// Field that carries the venue in a bibliography record of this type.
    pub fn venue_field(self) -> &'static str {
        match self {
            Self::JournalArticle => "journal",
            Self::ConferencePaper => "booktitle",
            Self::Other => "howpublished",
        }
    }
}

impl fmt::Display for WorkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized text pair: plain for JSON/BibTeX, markup for LaTeX.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub plain: String,
    pub markup: String,
}

impl Text {
    /// Normalize `raw`; `None` when nothing readable remains.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let plain = to_plain_text(raw);
        if plain.is_empty() {
            return None;
        }
        Some(Self {
            plain,
            markup: to_markup_text(raw),
        })
    }
}

/// One publication, after deduplication and normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationEntry {
    pub title: Text,
    pub category: WorkCategory,
    /// Folded ORCID work type, e.g. `journal-article`.
    pub raw_type: String,
    pub year: Option<i32>,
    pub month: Option<u8>,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub authors: Vec<String>,
    pub venue: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub publisher: Option<String>,
    pub abstract_text: Option<String>,
    pub external_ids: BTreeMap<String, String>,
    pub source_put_code: String,
}

impl PublicationEntry {
    pub fn new(title: Text, category: WorkCategory, source_put_code: impl Into<String>) -> Self {
        Self {
            title,
            category,
            raw_type: category.as_str().to_string(),
            year: None,
            month: None,
            doi: None,
            url: None,
            authors: Vec::new(),
            venue: None,
            volume: None,
            issue: None,
            pages: None,
            publisher: None,
            abstract_text: None,
            external_ids: BTreeMap::new(),
            source_put_code: source_put_code.into(),
        }
    }

    /// Number of populated descriptive fields. Used to pick the
    /// representative submission of a put-code group.
    pub fn richness(&self) -> usize {
        let optional_text = [
            &self.doi,
            &self.url,
            &self.venue,
            &self.volume,
            &self.issue,
            &self.pages,
            &self.publisher,
            &self.abstract_text,
        ];
        1 + usize::from(self.year.is_some())
            + usize::from(self.month.is_some())
            + optional_text.iter().filter(|f| f.is_some()).count()
            + usize::from(!self.authors.is_empty())
            + usize::from(!self.external_ids.is_empty())
    }

    /// Sort key: year descending with missing years last, then plain title.
    pub fn presentation_order(a: &Self, b: &Self) -> std::cmp::Ordering {
        b.year
            .is_some()
            .cmp(&a.year.is_some())
            .then_with(|| b.year.cmp(&a.year))
            .then_with(|| {
                a.title
                    .plain
                    .to_lowercase()
                    .cmp(&b.title.plain.to_lowercase())
            })
    }
}
