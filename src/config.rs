use crate::error::{Error, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: Option<String>,
    pub repository: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub max_pull_requests: u32,
    pub concurrency_limit: usize,
    pub refresh_interval_secs: u64,
    pub cache_ttl_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let github_token = env::var("GITHUB_TOKEN").ok().filter(|v| !v.is_empty());

        let repository = env::var("GITHUB_REPOSITORY").ok().filter(|v| !v.is_empty());

        let anthropic_api_key = env::var("ANTHROPIC_API_KEY").ok().filter(|v| !v.is_empty());

        let max_pull_requests = env::var("MAX_PULL_REQUESTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);

        let concurrency_limit = env::var("CONCURRENCY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let refresh_interval_secs = env::var("REFRESH_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);

        let cache_ttl_minutes = env::var("CACHE_TTL_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v: &i64| *v > 0)
            .unwrap_or(120);

        Ok(Self {
            github_token,
            repository,
            anthropic_api_key,
            max_pull_requests,
            concurrency_limit,
            refresh_interval_secs,
            cache_ttl_minutes,
        })
    }

    pub fn require_github_token(&self) -> Result<&str> {
        self.github_token
            .as_deref()
            .ok_or_else(|| Error::Config("GITHUB_TOKEN environment variable not set".to_string()))
    }
}

/// Splits `owner/name` into its two parts.
pub fn parse_repository(repository: &str) -> Result<(String, String)> {
    let mut parts = repository.trim().splitn(2, '/');
    match (parts.next(), parts.next()) {
        (Some(owner), Some(name))
            if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            Ok((owner.to_string(), name.to_string()))
        }
        _ => Err(Error::InvalidRepository(repository.to_string())),
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub max_pull_requests: u32,
    pub concurrency_limit: usize,
    pub refresh_interval_secs: u64,
    pub cache_ttl_minutes: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_pull_requests: 100,
            concurrency_limit: 5,
            refresh_interval_secs: 300,
            cache_ttl_minutes: 120,
        }
    }
}

impl From<&Config> for MonitorConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_pull_requests: config.max_pull_requests,
            concurrency_limit: config.concurrency_limit,
            refresh_interval_secs: config.refresh_interval_secs,
            cache_ttl_minutes: config.cache_ttl_minutes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repository() {
        let (owner, name) = parse_repository("rust-lang/cargo").unwrap();
        assert_eq!(owner, "rust-lang");
        assert_eq!(name, "cargo");
    }

    #[test]
    fn test_parse_repository_rejects_malformed() {
        assert!(matches!(parse_repository("cargo"), Err(Error::InvalidRepository(_))));
        assert!(matches!(parse_repository("/cargo"), Err(Error::InvalidRepository(_))));
        assert!(matches!(parse_repository("a/b/c"), Err(Error::InvalidRepository(_))));
    }
}
