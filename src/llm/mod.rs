pub mod provider;
pub mod claude;
pub mod prompts;
pub mod parser;

pub use provider::DiscussionSummarizer;
pub use claude::ClaudeProvider;
pub use prompts::SummaryRequest;
