use serde::{Deserialize, Serialize};

use super::publication::Text;

/// Non-publication subsection of an ORCID record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSection {
    Biography,
    Employment,
    Education,
    Funding,
    ExternalIdentifiers,
    Distinctions,
    Memberships,
    Service,
}

impl DataSection {
    /// Declared render order.
    pub const ALL: [DataSection; 8] = [
        DataSection::Biography,
        DataSection::Employment,
        DataSection::Education,
        DataSection::Funding,
        DataSection::ExternalIdentifiers,
        DataSection::Distinctions,
        DataSection::Memberships,
        DataSection::Service,
    ];

    pub fn heading(self) -> &'static str {
        match self {
            Self::Biography => "Biography",
            Self::Employment => "Employment",
            Self::Education => "Education",
            Self::Funding => "Selected Projects",
            Self::ExternalIdentifiers => "External Identifiers",
            Self::Distinctions => "Distinctions",
            Self::Memberships => "Memberships",
            Self::Service => "External Service",
        }
    }

    pub fn json_key(self) -> &'static str {
        match self {
            Self::Biography => "biography",
            Self::Employment => "employment",
            Self::Education => "education",
            Self::Funding => "funding",
            Self::ExternalIdentifiers => "external_identifiers",
            Self::Distinctions => "distinctions",
            Self::Memberships => "memberships",
            Self::Service => "service",
        }
    }

    /// `(activities-summary key, summary key)` for affiliation-shaped sections.
    pub fn affiliation_keys(self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Employment => Some(("employments", "employment-summary")),
            Self::Education => Some(("educations", "education-summary")),
            Self::Distinctions => Some(("distinctions", "distinction-summary")),
            Self::Memberships => Some(("memberships", "membership-summary")),
            Self::Service => Some(("services", "service-summary")),
            _ => None,
        }
    }
}

/// One item of a data subsection. Which fields are set depends on the
/// section: affiliations use organization/location/role/department,
/// fundings use `text` as the title plus `kind`, identifiers use `kind`
/// and `value`, the biography uses only `text`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Text>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_year: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_year: Option<i32>,
}

impl DataEntry {
    /// True when no descriptive field survived normalization.
    pub fn is_blank(&self) -> bool {
        self.text.is_none()
            && self.organization.is_none()
            && self.role.is_none()
            && self.department.is_none()
            && self.value.is_none()
    }

    /// `"2019--present"`, `"2015--2019"`, `"2020"` or `None`.
    pub fn year_span(&self) -> Option<String> {
        match (self.start_year, self.end_year) {
            (Some(start), Some(end)) if start == end => Some(start.to_string()),
            (Some(start), Some(end)) => Some(format!("{start}--{end}")),
            (Some(start), None) => Some(format!("{start}--present")),
            (None, Some(end)) => Some(end.to_string()),
            (None, None) => None,
        }
    }
}

/// A non-empty data subsection.
#[derive(Debug, Clone, PartialEq)]
pub struct DataGroup {
    pub section: DataSection,
    pub entries: Vec<DataEntry>,
}
