use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::github::rate_limiter::RateLimiter;

pub struct Paginator<'a> {
    client: &'a Client,
    rate_limiter: &'a RateLimiter,
}

impl<'a> Paginator<'a> {
    pub fn new(client: &'a Client, rate_limiter: &'a RateLimiter) -> Self {
        Self {
            client,
            rate_limiter,
        }
    }

    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        base_url: &str,
        per_page: u32,
    ) -> Result<Vec<T>> {
        self.fetch_pages(base_url, per_page, None).await
    }

    pub async fn fetch_limited<T: DeserializeOwned>(
        &self,
        base_url: &str,
        per_page: u32,
        max_items: u32,
    ) -> Result<Vec<T>> {
        self.fetch_pages(base_url, per_page, Some(max_items as usize))
            .await
    }

    async fn fetch_pages<T: DeserializeOwned>(
        &self,
        base_url: &str,
        per_page: u32,
        max_items: Option<usize>,
    ) -> Result<Vec<T>> {
        let mut all_items = Vec::new();
        let mut page = 1;

        loop {
            self.rate_limiter.wait().await;

            let separator = if base_url.contains('?') { "&" } else { "?" };
            let url = format!("{}{}per_page={}&page={}", base_url, separator, per_page, page);

            tracing::debug!("Fetching: {}", url);
            let response = self.client.get(&url).send().await?;
            self.rate_limiter.update_from_response(&response);

            let response = check_status(response, base_url).await?;
            let has_next = has_next_page(&response);

            let items: Vec<T> = response.json().await?;
            let items_count = items.len();
            all_items.extend(items);

            let reached_limit = max_items.is_some_and(|max| all_items.len() >= max);
            if reached_limit || !has_next || items_count < per_page as usize {
                break;
            }

            page += 1;
        }

        if let Some(max) = max_items {
            all_items.truncate(max);
        }
        Ok(all_items)
    }
}

fn has_next_page(response: &Response) -> bool {
    response
        .headers()
        .get("link")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("rel=\"next\""))
        .unwrap_or(false)
}

async fn check_status(response: Response, url: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        if let Some(seconds) = retry_after {
            return Err(Error::RateLimited(seconds));
        }
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::GitHubApi(format!(
        "Request to {} failed: {} - {}",
        url, status, body
    )))
}
