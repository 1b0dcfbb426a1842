use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, VitaeError};

static ORCID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{4}-\d{4}-\d{3}[0-9X]$").expect("valid regex"));

/// A validated ORCID iD such as `0000-0002-1825-0097`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrcidId(String);

impl OrcidId {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input
            .trim()
            .trim_start_matches("https://orcid.org/")
            .trim_start_matches("http://orcid.org/");
        if ORCID_RE.is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(VitaeError::InvalidOrcidId(input.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn profile_url(&self) -> String {
        format!("https://orcid.org/{}", self.0)
    }
}

impl fmt::Display for OrcidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OrcidId {
    type Err = VitaeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OrcidId {
    type Error = VitaeError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<OrcidId> for String {
    fn from(id: OrcidId) -> Self {
        id.0
    }
}

/// How the record source may use its cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    UseCacheIfPresent,
    ForceRefresh,
}

/// A complete fetched ORCID record. Read-only input to extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord(Value);

impl CanonicalRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for CanonicalRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orcid_parse_valid() {
        let id = OrcidId::parse("0000-0002-1825-0097").unwrap();
        assert_eq!(id.as_str(), "0000-0002-1825-0097");
        assert_eq!(id.profile_url(), "https://orcid.org/0000-0002-1825-0097");

        let with_x: OrcidId = "0000-0001-5109-370X".parse().unwrap();
        assert_eq!(with_x.to_string(), "0000-0001-5109-370X");
    }

    #[test]
    fn test_orcid_parse_strips_profile_url() {
        let id = OrcidId::parse(" https://orcid.org/0000-0002-1825-0097 ").unwrap();
        assert_eq!(id.as_str(), "0000-0002-1825-0097");
    }

    #[test]
    fn test_orcid_parse_rejects_malformed() {
        for bad in ["", "0000-0002-1825", "../../etc/passwd", "0000-0002-1825-009x", "0000000218250097"] {
            assert!(
                matches!(OrcidId::parse(bad), Err(VitaeError::InvalidOrcidId(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_orcid_serde_validates() {
        let ok: OrcidId = serde_json::from_str("\"0000-0002-1825-0097\"").unwrap();
        assert_eq!(ok.as_str(), "0000-0002-1825-0097");
        assert!(serde_json::from_str::<OrcidId>("\"nope\"").is_err());
    }
}
