use std::fmt;

use serde::{Deserialize, Serialize};
use vitae_core::normalize::normalize_doi;

use crate::error::{Result, ScienceError};

/// A DOI that passed validation and is safe to resolve.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Doi {
    pub raw: String,
    pub normalized: String,
    pub url: String,
}

impl Doi {
    /// Normalize (resolver prefix, `doi:` prefix and trailing slash removed,
    /// lower-cased) and require `10.<registrant>/<suffix>`.
    pub fn parse(input: &str) -> Result<Self> {
        let normalized = normalize_doi(input);

        let Some((prefix, suffix)) = normalized.split_once('/') else {
            return Err(ScienceError::InvalidDoi(input.to_string()));
        };
        let registrant_ok = prefix
            .strip_prefix("10.")
            .is_some_and(|r| !r.is_empty() && !r.contains(char::is_whitespace));
        if !registrant_ok || suffix.trim().is_empty() || suffix.contains(char::is_whitespace) {
            return Err(ScienceError::InvalidDoi(input.to_string()));
        }

        let url = format!("https://doi.org/{normalized}");
        Ok(Self {
            raw: input.trim().to_string(),
            normalized,
            url,
        })
    }
}

impl fmt::Display for Doi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_doi() {
        let doi = Doi::parse("10.1145/3368089.3409741").unwrap();
        assert_eq!(doi.normalized, "10.1145/3368089.3409741");
        assert_eq!(doi.url, "https://doi.org/10.1145/3368089.3409741");
    }

    #[test]
    fn resolver_prefixes_are_stripped() {
        for input in [
            "https://doi.org/10.1038/Nature14539",
            "http://dx.doi.org/10.1038/nature14539/",
            "doi:10.1038/NATURE14539",
            "DOI: 10.1038/nature14539",
        ] {
            assert_eq!(Doi::parse(input).unwrap().normalized, "10.1038/nature14539", "{input}");
        }
    }

    #[test]
    fn display_is_normalized_form() {
        assert_eq!(Doi::parse("10.1/ABC").unwrap().to_string(), "10.1/abc");
    }

    #[test]
    fn rejects_non_dois() {
        for input in ["", "not-a-doi", "10.1000", "10.1000/", "11.1000/x", "10./x", "10.1/has space"] {
            assert!(Doi::parse(input).is_err(), "{input} should be rejected");
        }
    }
}
