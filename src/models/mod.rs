pub mod pull_request;
pub mod github;
pub mod timeline;
pub mod analysis;

pub use pull_request::*;
pub use github::*;
pub use timeline::*;
pub use analysis::*;
