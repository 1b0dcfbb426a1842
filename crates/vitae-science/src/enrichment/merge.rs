use vitae_core::PublicationEntry;

/// Fields a metadata source may offer for one DOI. Everything is optional;
/// the source only reports what it found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialMetadata {
    pub venue: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub month: Option<u8>,
    pub publisher: Option<String>,
    pub abstract_text: Option<String>,
    pub authors: Vec<String>,
}

/// One fill-only rule: a field is written only while it is empty.
pub struct FillRule {
    pub field: &'static str,
    pub is_empty: fn(&PublicationEntry) -> bool,
    /// Copies the value if the entry field is empty and the metadata has one.
    /// Returns whether anything was written.
    pub fill: fn(&mut PublicationEntry, &PartialMetadata) -> bool,
}

macro_rules! fill_if_empty {
    ($field:ident) => {
        FillRule {
            field: stringify!($field),
            is_empty: |entry| entry.$field.is_none(),
            fill: |entry, meta| {
                if entry.$field.is_none() && meta.$field.is_some() {
                    entry.$field = meta.$field.clone();
                    true
                } else {
                    false
                }
            },
        }
    };
}

/// Every field enrichment may touch. ORCID values are never overwritten.
pub const FILL_RULES: &[FillRule] = &[
    fill_if_empty!(venue),
    fill_if_empty!(volume),
    fill_if_empty!(issue),
    fill_if_empty!(pages),
    fill_if_empty!(month),
    fill_if_empty!(publisher),
    fill_if_empty!(abstract_text),
    FillRule {
        field: "authors",
        is_empty: |entry| entry.authors.is_empty(),
        fill: |entry, meta| {
            if entry.authors.is_empty() && !meta.authors.is_empty() {
                entry.authors = meta.authors.clone();
                true
            } else {
                false
            }
        },
    },
];

/// Whether any fillable field is still empty.
pub fn has_gaps(entry: &PublicationEntry) -> bool {
    FILL_RULES.iter().any(|rule| (rule.is_empty)(entry))
}

/// Apply every rule; returns the names of the fields that were filled.
pub fn merge_fill_only(entry: &mut PublicationEntry, meta: &PartialMetadata) -> Vec<&'static str> {
    FILL_RULES
        .iter()
        .filter(|rule| (rule.fill)(entry, meta))
        .map(|rule| rule.field)
        .collect()
}
