use reqwest::{header, Client, StatusCode};

use crate::error::{Error, Result};
use crate::github::paginator::Paginator;
use crate::github::rate_limiter::RateLimiter;
use crate::models::{GitHubComment, GitHubPullRequest, GitHubReview};

pub struct GitHubClient {
    client: Client,
    rate_limiter: RateLimiter,
    base_url: String,
}

impl GitHubClient {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(token, "https://api.github.com")
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", token))?,
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("prtimeline/0.1"),
        );

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Confirms the repository exists before paging through it.
    pub async fn check_repository(&self, owner: &str, repo: &str) -> Result<()> {
        self.rate_limiter.wait().await;
        let url = format!("{}/repos/{}/{}", self.base_url, owner, repo);

        let response = self.client.get(&url).send().await?;
        self.rate_limiter.update_from_response(&response);

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::RepoNotFound(format!("{}/{}", owner, repo)));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi(format!(
                "Failed to fetch repository {}/{}: {} - {}",
                owner, repo, status, body
            )));
        }

        Ok(())
    }

    pub async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        limit: u32,
    ) -> Result<Vec<GitHubPullRequest>> {
        let url = format!(
            "{}/repos/{}/{}/pulls?state=all&sort=updated&direction=desc",
            self.base_url, owner, repo
        );
        let paginator = Paginator::new(&self.client, &self.rate_limiter);
        tracing::info!("Fetching pull requests for: {}/{}", owner, repo);
        paginator.fetch_limited(&url, 100, limit).await
    }

    pub async fn list_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<GitHubReview>> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/reviews",
            self.base_url, owner, repo, number
        );
        let paginator = Paginator::new(&self.client, &self.rate_limiter);
        tracing::debug!("Fetching reviews for #{}", number);
        paginator.fetch_all(&url, 100).await
    }

    pub async fn list_review_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<GitHubComment>> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/comments",
            self.base_url, owner, repo, number
        );
        let paginator = Paginator::new(&self.client, &self.rate_limiter);
        tracing::debug!("Fetching review comments for #{}", number);
        paginator.fetch_all(&url, 100).await
    }

    pub async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<GitHubComment>> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.base_url, owner, repo, number
        );
        let paginator = Paginator::new(&self.client, &self.rate_limiter);
        tracing::debug!("Fetching issue comments for #{}", number);
        paginator.fetch_all(&url, 100).await
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}
