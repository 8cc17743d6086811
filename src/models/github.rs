use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUserRef {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubLabel {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubPullRequest {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub user: Option<GitHubUserRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<GitHubLabel>,
    #[serde(default)]
    pub requested_reviewers: Vec<GitHubUserRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubReview {
    pub id: u64,
    pub user: Option<GitHubUserRef>,
    pub state: String,
    pub submitted_at: Option<DateTime<Utc>>,
    pub body: Option<String>,
}

/// Shape shared by the review-comment and issue-comment endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubComment {
    pub id: u64,
    pub user: Option<GitHubUserRef>,
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub path: Option<String>,
    pub line: Option<u32>,
    pub original_line: Option<u32>,
    pub diff_hunk: Option<String>,
}

/// Offline input: a previously captured snapshot of one repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub pull_requests: Vec<super::PullRequest>,
    #[serde(default)]
    pub reviews: Vec<super::Review>,
    #[serde(default)]
    pub comments: Vec<super::Comment>,
}
