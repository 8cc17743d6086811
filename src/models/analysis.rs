use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStrategy {
    CodeOnly,
    Hybrid,
    HumanDiscussion,
}

impl std::fmt::Display for AnalysisStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisStrategy::CodeOnly => write!(f, "code_only"),
            AnalysisStrategy::Hybrid => write!(f, "hybrid"),
            AnalysisStrategy::HumanDiscussion => write!(f, "human_discussion"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscussionAnalysis {
    pub strategy: AnalysisStrategy,
    pub confidence: ConfidenceTier,
    pub human_comments: usize,
    pub bot_comments: usize,
    pub human_reviews: usize,
    pub bot_reviews: usize,
}

impl DiscussionAnalysis {
    pub fn human_total(&self) -> usize {
        self.human_comments + self.human_reviews
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
    Mixed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrInsights {
    pub summary: String,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    pub sentiment: Sentiment,
    #[serde(default = "default_strategy")]
    pub strategy: AnalysisStrategy,
}

fn default_strategy() -> AnalysisStrategy {
    AnalysisStrategy::Hybrid
}

impl PrInsights {
    /// Placeholder for PRs with no human discussion to summarize.
    pub fn code_only() -> Self {
        Self {
            summary: "No human review discussion; changes were reviewed through code and automated checks only."
                .to_string(),
            themes: Vec::new(),
            concerns: Vec::new(),
            sentiment: Sentiment::Neutral,
            strategy: AnalysisStrategy::CodeOnly,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositoryInsights {
    pub pull_requests: BTreeMap<u64, PrInsights>,
    pub failed: Vec<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RepositoryMetrics {
    pub total_pull_requests: usize,
    pub open: usize,
    pub merged: usize,
    pub closed: usize,
    pub avg_time_to_first_review: Option<f64>,
    pub avg_time_to_approval: Option<f64>,
    pub avg_review_cycles: f64,
    pub avg_confidence: f64,
    pub low_quality_timelines: usize,
    pub generated_at: Option<DateTime<Utc>>,
}
