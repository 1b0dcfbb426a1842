use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::debug;
use vitae_core::accessor::{get, get_array, get_scalar_text, get_str};
use vitae_core::config::EnrichConfig;
use vitae_core::normalize::plain_field;

use crate::enrichment::PartialMetadata;
use crate::error::{Result, ScienceError};
use crate::http::{RateLimitedClient, RetryPolicy};
use crate::identifiers::Doi;
use crate::sources::MetadataSource;

const CSL_JSON: &str = "application/vnd.citationstyles.csl+json";

/// Resolves DOIs through content negotiation at the DOI registry and reads
/// the CSL-JSON it returns.
pub struct DoiContentSource {
    client: RateLimitedClient,
    base_url: String,
}

impl DoiContentSource {
    pub fn new(config: &EnrichConfig) -> Result<Self> {
        let user_agent = match &config.mailto {
            Some(email) => format!("vitae/{} (mailto:{email})", env!("CARGO_PKG_VERSION")),
            None => format!("vitae/{}", env!("CARGO_PKG_VERSION")),
        };
        let client = RateLimitedClient::new(
            Duration::from_millis(config.rate_limit_delay_ms),
            RetryPolicy::new(config.max_retries, Duration::from_millis(config.backoff_ms)),
            Duration::from_secs(config.timeout_secs),
            &user_agent,
        )?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn fetch_csl(&self, doi: &Doi) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, doi.normalized);
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(CSL_JSON));
        self.client.get_json(&url, headers).await
    }
}

#[async_trait]
impl MetadataSource for DoiContentSource {
    fn name(&self) -> &str {
        "doi.org"
    }

    async fn lookup(&self, doi: &Doi) -> Result<PartialMetadata> {
        let csl = self
            .fetch_csl(doi)
            .await
            .map_err(|e| ScienceError::LookupFailed {
                doi: doi.normalized.clone(),
                reason: e.to_string(),
            })?;
        if !csl.is_object() {
            return Err(ScienceError::LookupFailed {
                doi: doi.normalized.clone(),
                reason: "response is not a CSL-JSON object".to_string(),
            });
        }
        let meta = parse_csl(&csl);
        debug!(doi = %doi, ?meta, "CSL metadata");
        Ok(meta)
    }
}

/// Read the fillable fields from a CSL-JSON item. Free text goes through the
/// plain-text normalizer; JATS abstracts lose their tags.
pub fn parse_csl(csl: &Value) -> PartialMetadata {
    let venue = match csl.get("container-title") {
        Some(Value::Array(titles)) => titles
            .iter()
            .filter_map(Value::as_str)
            .find_map(plain_field),
        Some(Value::String(title)) => plain_field(title),
        _ => None,
    };

    let month = u8::try_from(get(csl, "issued.date-parts.0.1", 0i64))
        .ok()
        .filter(|m| (1..=12).contains(m));

    let authors = get_array(csl, "author")
        .iter()
        .filter_map(|author| {
            let given = get_str(author, "given").trim();
            let family = get_str(author, "family").trim();
            let name = match (given.is_empty(), family.is_empty()) {
                (false, false) => format!("{given} {family}"),
                (true, false) => family.to_string(),
                (false, true) => given.to_string(),
                (true, true) => get_str(author, "literal").to_string(),
            };
            plain_field(&name)
        })
        .collect();

    PartialMetadata {
        venue,
        volume: scalar_field(csl, "volume"),
        issue: scalar_field(csl, "issue"),
        pages: scalar_field(csl, "page"),
        month,
        publisher: plain_field(get_str(csl, "publisher")),
        abstract_text: plain_field(get_str(csl, "abstract")),
        authors,
    }
}

fn scalar_field(csl: &Value, key: &str) -> Option<String> {
    get_scalar_text(csl, key).and_then(|s| plain_field(&s))
}
