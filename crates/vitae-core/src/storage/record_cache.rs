use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{CanonicalRecord, OrcidId};

const METADATA_KEY: &str = "_cache_metadata";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMetadata {
    cached_at: DateTime<Utc>,
    ttl_seconds: u64,
}

/// A record read back from the cache.
#[derive(Debug, Clone)]
pub struct CachedRecord {
    pub record: CanonicalRecord,
    /// `None` for files written without cache metadata.
    pub cached_at: Option<DateTime<Utc>>,
    pub fresh: bool,
    pub path: PathBuf,
}

/// On-disk cache of fetched ORCID records: `{dir}/{orcid}.json`.
///
/// Each file is the record itself with a `_cache_metadata` object added at
/// the top level. Records placed one directory deeper (`{dir}/<group>/`)
/// are also found.
#[derive(Debug, Clone)]
pub struct RecordCache {
    dir: PathBuf,
    ttl_seconds: u64,
}

impl RecordCache {
    pub fn new(dir: impl Into<PathBuf>, ttl_seconds: u64) -> Self {
        Self {
            dir: dir.into(),
            ttl_seconds,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a fresh write for `id` goes to.
    pub fn path_for(&self, id: &OrcidId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Locate an existing cache file: flat layout first, then one level of
    /// subdirectories in name order.
    pub fn find(&self, id: &OrcidId) -> Option<PathBuf> {
        let flat = self.path_for(id);
        if flat.is_file() {
            return Some(flat);
        }

        let mut subdirs: Vec<PathBuf> = fs::read_dir(&self.dir)
            .ok()?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect();
        subdirs.sort();
        subdirs
            .into_iter()
            .map(|d| d.join(format!("{id}.json")))
            .find(|p| p.is_file())
    }

    /// Read the cached record for `id`, if any. Unreadable or corrupt files
    /// are logged and treated as a miss.
    pub fn load(&self, id: &OrcidId, now: DateTime<Utc>) -> Option<CachedRecord> {
        let path = self.find(id)?;
        match read_entry(&path) {
            Ok((record, metadata)) => {
                let cached_at = metadata.map(|m| m.cached_at);
                let fresh = cached_at.is_some_and(|at| self.is_fresh(at, now));
                debug!(orcid = %id, path = %path.display(), fresh, "cache hit");
                Some(CachedRecord {
                    record,
                    cached_at,
                    fresh,
                    path,
                })
            }
            Err(e) => {
                warn!(orcid = %id, path = %path.display(), error = %e, "ignoring unreadable cache file");
                None
            }
        }
    }

    /// Write `record` with fresh cache metadata, replacing any previous copy.
    pub fn store(&self, id: &OrcidId, record: &CanonicalRecord, now: DateTime<Utc>) -> Result<PathBuf> {
        let path = self.find(id).unwrap_or_else(|| self.path_for(id));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut value = record.value().clone();
        if let Value::Object(map) = &mut value {
            let metadata = CacheMetadata {
                cached_at: now,
                ttl_seconds: self.ttl_seconds,
            };
            map.insert(METADATA_KEY.to_string(), serde_json::to_value(metadata)?);
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&value)?)?;
        fs::rename(&tmp, &path)?;
        debug!(orcid = %id, path = %path.display(), "cached record");
        Ok(path)
    }

    /// A timestamp in the future cannot be trusted and counts as stale.
    fn is_fresh(&self, cached_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(cached_at).num_seconds();
        u64::try_from(age).is_ok_and(|age| age < self.ttl_seconds)
    }
}

fn read_entry(path: &Path) -> Result<(CanonicalRecord, Option<CacheMetadata>)> {
    let contents = fs::read_to_string(path)?;
    let mut value: Value = serde_json::from_str(&contents)?;
    let metadata = value
        .as_object_mut()
        .and_then(|map| map.remove(METADATA_KEY))
        .and_then(|m| serde_json::from_value(m).ok());
    Ok((CanonicalRecord::new(value), metadata))
}
