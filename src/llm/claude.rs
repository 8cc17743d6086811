use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::llm::parser::parse_insights;
use crate::llm::prompts::{SummaryRequest, SYSTEM_PROMPT};
use crate::llm::provider::DiscussionSummarizer;
use crate::models::PrInsights;

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
/// Summaries are a few sentences of JSON.
const MAX_SUMMARY_TOKENS: u32 = 1024;
const MAX_ATTEMPTS: u32 = 3;

pub struct ClaudeProvider {
    client: Client,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl MessagesResponse {
    fn into_text(self) -> Result<String> {
        let text: String = self
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect();

        if text.trim().is_empty() {
            return Err(Error::LLMApi("Claude returned no text".to_string()));
        }
        Ok(text)
    }
}

impl ClaudeProvider {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    async fn send(&self, prompt: &str) -> Result<String> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_SUMMARY_TOKENS,
            system: SYSTEM_PROMPT,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 529 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(Error::RateLimited(retry_after));
        }

        let raw = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&raw)
                .map(|e| e.error.message)
                .unwrap_or(raw);
            return Err(Error::LLMApi(format!("Claude API error ({}): {}", status, message)));
        }

        serde_json::from_str::<MessagesResponse>(&raw)
            .map_err(|e| Error::ParseError(format!("Unexpected Claude response: {}", e)))?
            .into_text()
    }
}

#[async_trait]
impl DiscussionSummarizer for ClaudeProvider {
    async fn summarize(&self, request: SummaryRequest) -> Result<PrInsights> {
        let prompt = request.to_prompt();
        tracing::debug!(
            "Summarizing PR #{} (~{} tokens) with Claude",
            request.pr_number,
            request.estimate_tokens()
        );

        let mut attempt = 1;
        let text = loop {
            match self.send(&prompt).await {
                Ok(text) => break text,
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    let delay = match &e {
                        Error::RateLimited(secs) => Duration::from_secs(*secs),
                        _ => Duration::from_secs(2u64.pow(attempt)),
                    };
                    tracing::warn!(
                        "Claude request for PR #{} failed ({}), retrying in {:?}",
                        request.pr_number,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        parse_insights(&text, request.strategy)
    }

    fn name(&self) -> &str {
        "Claude"
    }
}
