use async_trait::async_trait;
use crate::error::Result;
use crate::llm::prompts::SummaryRequest;
use crate::models::PrInsights;

#[async_trait]
pub trait DiscussionSummarizer: Send + Sync {
    async fn summarize(&self, request: SummaryRequest) -> Result<PrInsights>;
    fn name(&self) -> &str;
}
