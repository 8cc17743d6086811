pub mod config;
pub mod error;
pub mod models;
pub mod github;
pub mod llm;
pub mod analysis;
pub mod cache;
pub mod store;

pub use config::{Config, MonitorConfig};
pub use error::{Error, Result};
pub use github::GitHubClient;
pub use llm::{ClaudeProvider, DiscussionSummarizer, SummaryRequest};
pub use analysis::{
    validate, AnalysisPipeline, BotPolicy, MonitorEvent, StrategySelector, TimelineReconstructor,
};
pub use cache::DerivedCache;
pub use store::Store;
