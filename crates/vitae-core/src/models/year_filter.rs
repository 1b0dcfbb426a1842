use std::fmt;

use tracing::warn;

use crate::error::{Result, VitaeError};

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

/// Inclusive year range applied to publication years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YearFilter {
    #[default]
    Unbounded,
    Range { lo: i32, hi: i32 },
}

impl YearFilter {
    /// Strict parse of `"YYYY"`, `"YYYY-YYYY"` or `"all"`.
    pub fn try_parse(input: &str) -> Result<Self> {
        let s = input.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(Self::Unbounded);
        }

        let invalid = || VitaeError::InvalidYearFilter(input.to_string());
        let (lo, hi) = match s.split_once('-') {
            Some((a, b)) => (parse_year(a).ok_or_else(invalid)?, parse_year(b).ok_or_else(invalid)?),
            None => {
                let y = parse_year(s).ok_or_else(invalid)?;
                (y, y)
            }
        };
        if lo > hi {
            return Err(invalid());
        }
        Ok(Self::Range { lo, hi })
    }

    /// Lenient parse: absent or invalid input means unbounded.
    pub fn parse(input: Option<&str>) -> Self {
        let Some(raw) = input else {
            return Self::Unbounded;
        };
        match Self::try_parse(raw) {
            Ok(filter) => filter,
            Err(e) => {
                warn!(filter = raw, error = %e, "ignoring year filter");
                Self::Unbounded
            }
        }
    }

    /// Whether a publication year passes. Missing years pass only when unbounded.
    pub fn contains(&self, year: Option<i32>) -> bool {
        match (self, year) {
            (Self::Unbounded, _) => true,
            (Self::Range { lo, hi }, Some(y)) => *lo <= y && y <= *hi,
            (Self::Range { .. }, None) => false,
        }
    }

    pub fn is_bounded(&self) -> bool {
        matches!(self, Self::Range { .. })
    }
}

impl fmt::Display for YearFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => f.write_str("all"),
            Self::Range { lo, hi } if lo == hi => write!(f, "{lo}"),
            Self::Range { lo, hi } => write!(f, "{lo}-{hi}"),
        }
    }
}

fn parse_year(s: &str) -> Option<i32> {
    let s = s.trim();
    if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = s.parse().ok()?;
    (MIN_YEAR..=MAX_YEAR).contains(&year).then_some(year)
}
