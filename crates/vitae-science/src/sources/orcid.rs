use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, info, warn};
use vitae_core::accessor::{get_array, get_scalar_text};
use vitae_core::{AppConfig, CanonicalRecord, Freshness, OrcidId, RecordCache, VitaeError};

use crate::error::{Result, ScienceError};
use crate::http::{RateLimitedClient, RetryPolicy};
use crate::sources::RecordSource;

/// ORCID public API record source with an on-disk cache in front of it.
pub struct OrcidApiSource {
    client: RateLimitedClient,
    detail_client: RateLimitedClient,
    base_url: String,
    cache: RecordCache,
    max_concurrent: usize,
    offline: bool,
}

impl OrcidApiSource {
    pub fn new(config: &AppConfig, data_dir: &Path) -> Result<Self> {
        let api = &config.api;
        let user_agent = format!("vitae/{}", env!("CARGO_PKG_VERSION"));
        let retry = RetryPolicy::new(api.max_retries, Duration::from_millis(api.backoff_ms));
        let min_interval = Duration::from_millis(api.rate_limit_delay_ms);

        Ok(Self {
            client: RateLimitedClient::new(
                min_interval,
                retry,
                Duration::from_secs(api.timeout_secs),
                &user_agent,
            )?,
            detail_client: RateLimitedClient::new(
                min_interval,
                retry,
                Duration::from_secs(api.work_detail_timeout_secs),
                &user_agent,
            )?,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            cache: RecordCache::new(config.cache_dir(data_dir), config.cache.ttl_seconds),
            max_concurrent: api.max_concurrent_requests.max(1),
            offline: false,
        })
    }

    /// Never contact the API; serve whatever the cache holds, stale or not.
    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    /// Fetch `{base}/{id}/record` and replace work summaries with full details.
    pub async fn fetch_record(&self, id: &OrcidId) -> Result<CanonicalRecord> {
        let url = format!("{}/{id}/record", self.base_url);
        info!(orcid = %id, "fetching ORCID record");
        let mut record: Value = self.client.get_json(&url, json_headers()).await?;
        if !record.is_object() {
            return Err(ScienceError::Parse(format!("{url}: record is not a JSON object")));
        }
        self.attach_work_details(id, &mut record).await;
        Ok(CanonicalRecord::new(record))
    }

    /// Work summaries omit contributors and citations. Fetch the full work for
    /// the first summary of each group, at most `max_concurrent` at a time;
    /// failures keep the summary.
    async fn attach_work_details(&self, id: &OrcidId, record: &mut Value) {
        let put_codes: Vec<(usize, String)> = get_array(record, "activities-summary.works.group")
            .iter()
            .enumerate()
            .filter_map(|(index, group)| {
                get_scalar_text(group, "work-summary.0.put-code").map(|code| (index, code))
            })
            .collect();
        if put_codes.is_empty() {
            return;
        }

        let total = put_codes.len();
        let details: Vec<(usize, Option<Value>)> = futures::stream::iter(put_codes)
            .map(|(index, put_code)| async move {
                (index, self.fetch_work_detail(id, &put_code).await)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut attached = 0usize;
        for (index, detail) in details {
            let pointer = format!("/activities-summary/works/group/{index}/work-summary/0");
            if let Some(detail) = detail
                && let Some(slot) = record.pointer_mut(&pointer)
            {
                *slot = detail;
                attached += 1;
            }
        }
        info!(orcid = %id, attached, total, "fetched work details");
    }

    async fn fetch_work_detail(&self, id: &OrcidId, put_code: &str) -> Option<Value> {
        let url = format!("{}/{id}/work/{put_code}", self.base_url);
        match self.detail_client.get_json::<Value>(&url, json_headers()).await {
            Ok(detail) if detail.is_object() => Some(detail),
            Ok(_) => {
                warn!(orcid = %id, put_code, "work detail is not an object, keeping summary");
                None
            }
            Err(e) => {
                warn!(orcid = %id, put_code, error = %e, "work detail fetch failed, keeping summary");
                None
            }
        }
    }
}

#[async_trait]
impl RecordSource for OrcidApiSource {
    async fn get_record(&self, id: &OrcidId, freshness: Freshness) -> Result<CanonicalRecord> {
        let cached = if freshness == Freshness::ForceRefresh && !self.offline {
            None
        } else {
            self.cache.load(id, Utc::now())
        };

        if let Some(hit) = cached.as_ref()
            && (hit.fresh || self.offline)
        {
            if hit.fresh {
                debug!(orcid = %id, "using fresh cached record");
            } else {
                warn!(orcid = %id, path = %hit.path.display(), "using stale cached record (fetching disabled)");
            }
            return Ok(hit.record.clone());
        }

        if self.offline {
            return Err(VitaeError::RecordUnavailable(format!(
                "{id}: not cached and fetching is disabled"
            ))
            .into());
        }

        match self.fetch_record(id).await {
            Ok(record) => {
                if let Err(e) = self.cache.store(id, &record, Utc::now()) {
                    warn!(orcid = %id, error = %e, "failed to write record cache");
                }
                Ok(record)
            }
            Err(e) => match cached {
                Some(stale) => {
                    warn!(orcid = %id, error = %e, "refetch failed, falling back to stale cache");
                    Ok(stale.record)
                }
                None => Err(VitaeError::RecordUnavailable(format!("{id}: {e}")).into()),
            },
        }
    }
}

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use mockito::Server;
    use serde_json::json;
    use tempfile::TempDir;

    const ID: &str = "0000-0002-1825-0097";

    fn id() -> OrcidId {
        OrcidId::parse(ID).unwrap()
    }

    fn config(base_url: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.api.base_url = base_url.to_string();
        config.api.max_retries = 0;
        config.api.backoff_ms = 0;
        config.api.rate_limit_delay_ms = 0;
        config.cache.ttl_seconds = 3600;
        config
    }

    fn summary_record() -> Value {
        json!({
            "orcid-identifier": { "path": ID },
            "activities-summary": { "works": { "group": [
                { "work-summary": [ { "put-code": 42, "title": { "title": { "value": "Summary title" } } } ] },
                { "work-summary": [ { "put-code": 43, "title": { "title": { "value": "Other" } } } ] }
            ]}}
        })
    }

    #[tokio::test]
    async fn force_refresh_fetches_details_and_caches() {
        let mut server = Server::new_async().await;
        let _record = server
            .mock("GET", format!("/{ID}/record").as_str())
            .with_status(200)
            .with_body(summary_record().to_string())
            .create_async()
            .await;
        let _detail = server
            .mock("GET", format!("/{ID}/work/42").as_str())
            .with_status(200)
            .with_body(
                json!({
                    "put-code": 42,
                    "title": { "title": { "value": "Summary title" } },
                    "citation": { "citation-type": "bibtex", "citation-value": "@article{x, volume={3}}" }
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _missing = server
            .mock("GET", format!("/{ID}/work/43").as_str())
            .with_status(500)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let source = OrcidApiSource::new(&config(&server.url()), dir.path()).unwrap();
        let record = source.get_record(&id(), Freshness::ForceRefresh).await.unwrap();

        let groups = &record.value()["activities-summary"]["works"]["group"];
        assert_eq!(groups[0]["work-summary"][0]["citation"]["citation-type"], "bibtex");
        assert_eq!(groups[1]["work-summary"][0]["title"]["title"]["value"], "Other");
        assert!(source.cache().find(&id()).is_some());
    }

    #[tokio::test]
    async fn fresh_cache_skips_network() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", format!("/{ID}/record").as_str())
            .expect(0)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let source = OrcidApiSource::new(&config(&server.url()), dir.path()).unwrap();
        let cached = CanonicalRecord::new(json!({ "person": { "cached": true } }));
        source.cache().store(&id(), &cached, Utc::now()).unwrap();

        let record = source.get_record(&id(), Freshness::UseCacheIfPresent).await.unwrap();
        assert_eq!(record, cached);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn stale_cache_is_fallback_when_refetch_fails() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", format!("/{ID}/record").as_str())
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let source = OrcidApiSource::new(&config(&server.url()), dir.path()).unwrap();
        let stale = CanonicalRecord::new(json!({ "person": { "stale": true } }));
        source
            .cache()
            .store(&id(), &stale, Utc::now() - ChronoDuration::hours(5))
            .unwrap();

        let record = source.get_record(&id(), Freshness::UseCacheIfPresent).await.unwrap();
        assert_eq!(record, stale);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn offline_serves_stale_cache() {
        let dir = TempDir::new().unwrap();
        let source = OrcidApiSource::new(&config("https://unused.invalid"), dir.path())
            .unwrap()
            .with_offline(true);
        let stale = CanonicalRecord::new(json!({ "person": {} }));
        source
            .cache()
            .store(&id(), &stale, Utc::now() - ChronoDuration::days(30))
            .unwrap();

        let record = source.get_record(&id(), Freshness::UseCacheIfPresent).await.unwrap();
        assert_eq!(record, stale);
    }

    #[tokio::test]
    async fn offline_without_cache_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let source = OrcidApiSource::new(&config("https://unused.invalid"), dir.path())
            .unwrap()
            .with_offline(true);
        let err = source.get_record(&id(), Freshness::UseCacheIfPresent).await.unwrap_err();
        assert!(matches!(err, ScienceError::Core(VitaeError::RecordUnavailable(_))));
    }

    #[tokio::test]
    async fn upstream_failure_without_cache_is_unavailable() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", format!("/{ID}/record").as_str())
            .with_status(404)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let source = OrcidApiSource::new(&config(&server.url()), dir.path()).unwrap();
        let err = source.get_record(&id(), Freshness::ForceRefresh).await.unwrap_err();
        assert!(matches!(err, ScienceError::Core(VitaeError::RecordUnavailable(_))));
        assert!(source.cache().find(&id()).is_none());
    }
}
