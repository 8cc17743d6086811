use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const DEFAULT_TTL_MINUTES: i64 = 120;

/// Cheap summary of the working set. Any added record or newer update
/// changes it, which is all cache versioning needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub pull_requests: usize,
    pub reviews: usize,
    pub comments: usize,
    pub latest_update: Option<DateTime<Utc>>,
}

/// Short hex digest of a dataset summary. Deterministic, not meant to be
/// collision resistant against an adversary.
pub fn dataset_version(summary: &DatasetSummary) -> String {
    let latest = summary
        .latest_update
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_default();
    let input = format!(
        "{}|{}|{}|{}",
        summary.pull_requests, summary.reviews, summary.comments, latest
    );

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry<T> {
    pub data: T,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheStatus {
    pub cached: bool,
    pub valid: bool,
    pub generated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub version: Option<String>,
    pub age_minutes: Option<i64>,
    pub expires_in_minutes: Option<i64>,
}

/// One slot for one class of derived artifact. Entries go stale when the
/// TTL passes or the dataset version moves; nothing else evicts them.
#[derive(Debug, Clone)]
pub struct DerivedCache<T> {
    ttl: Duration,
    entry: Option<CacheEntry<T>>,
}

impl<T: Clone> DerivedCache<T> {
    pub fn new(ttl_minutes: i64) -> Self {
        Self {
            ttl: Duration::minutes(ttl_minutes),
            entry: None,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn create(&self, data: T, version: &str) -> CacheEntry<T> {
        self.create_at(data, version, Utc::now())
    }

    pub fn create_at(&self, data: T, version: &str, now: DateTime<Utc>) -> CacheEntry<T> {
        CacheEntry {
            data,
            generated_at: now,
            expires_at: now + self.ttl,
            version: version.to_string(),
        }
    }

    pub fn is_valid(entry: &CacheEntry<T>, current_version: &str) -> bool {
        Self::is_valid_at(entry, current_version, Utc::now())
    }

    pub fn is_valid_at(entry: &CacheEntry<T>, current_version: &str, now: DateTime<Utc>) -> bool {
        now < entry.expires_at && entry.version == current_version
    }

    pub fn entry(&self) -> Option<&CacheEntry<T>> {
        self.entry.as_ref()
    }

    pub fn get(&self, current_version: &str) -> Option<&T> {
        self.get_at(current_version, Utc::now())
    }

    /// The cached data, only if still valid for `current_version`.
    pub fn get_at(&self, current_version: &str, now: DateTime<Utc>) -> Option<&T> {
        self.entry
            .as_ref()
            .filter(|e| Self::is_valid_at(e, current_version, now))
            .map(|e| &e.data)
    }

    pub fn store(&mut self, entry: CacheEntry<T>) {
        tracing::debug!(
            "Caching derived artifact version {} until {}",
            entry.version,
            entry.expires_at
        );
        self.entry = Some(entry);
    }

    pub fn clear(&mut self) {
        if self.entry.take().is_some() {
            tracing::info!("Cleared cached derived artifact");
        }
    }

    pub fn status_at(&self, current_version: &str, now: DateTime<Utc>) -> CacheStatus {
        match &self.entry {
            Some(entry) => CacheStatus {
                cached: true,
                valid: Self::is_valid_at(entry, current_version, now),
                generated_at: Some(entry.generated_at),
                expires_at: Some(entry.expires_at),
                version: Some(entry.version.clone()),
                age_minutes: Some((now - entry.generated_at).num_minutes()),
                expires_in_minutes: Some((entry.expires_at - now).num_minutes().max(0)),
            },
            None => CacheStatus {
                cached: false,
                valid: false,
                generated_at: None,
                expires_at: None,
                version: None,
                age_minutes: None,
                expires_in_minutes: None,
            },
        }
    }
}

impl<T: Clone> Default for DerivedCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_MINUTES)
    }
}
