pub mod classifier;
pub mod strategy;
pub mod timeline;
pub mod validator;
pub mod pipeline;

pub use classifier::{BotPolicy, Classification, RuleKind};
pub use strategy::StrategySelector;
pub use timeline::{Reconstruction, TimelineReconstructor};
pub use validator::validate;
pub use pipeline::{AnalysisPipeline, MonitorEvent};
