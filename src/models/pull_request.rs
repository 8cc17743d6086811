use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PrStatus {
    Open,
    Merged,
    Closed,
}

impl PrStatus {
    /// Merged and closed are both terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PrStatus::Open)
    }
}

impl std::fmt::Display for PrStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrStatus::Open => write!(f, "open"),
            PrStatus::Merged => write!(f, "merged"),
            PrStatus::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub status: PrStatus,
    #[serde(default)]
    pub approval_count: u32,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub requested_reviewers: Vec<String>,
    #[serde(default)]
    pub pending_reviewers: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Commented,
    Approved,
    ChangesRequested,
}

impl ReviewState {
    /// Maps the host's upper-case review states. Dismissed and pending
    /// reviews have no lifecycle meaning and are dropped.
    pub fn from_api(state: &str) -> Option<Self> {
        match state.to_uppercase().as_str() {
            "APPROVED" => Some(ReviewState::Approved),
            "CHANGES_REQUESTED" => Some(ReviewState::ChangesRequested),
            "COMMENTED" => Some(ReviewState::Commented),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReviewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewState::Commented => write!(f, "commented"),
            ReviewState::Approved => write!(f, "approved"),
            ReviewState::ChangesRequested => write!(f, "changes_requested"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: u64,
    pub pr_number: u64,
    pub author: String,
    pub state: ReviewState,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub body: String,
    /// Only the author's most recent review on a PR counts toward approvals
    /// and pending reviewers. Older ones are kept for the timeline.
    #[serde(default)]
    pub is_latest: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CommentType {
    ReviewInline,
    Issue,
    General,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: u64,
    pub pr_number: u64,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub comment_type: CommentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_hunk: Option<String>,
}

impl From<&Review> for Comment {
    /// Reviews are classified through the comment shape.
    fn from(review: &Review) -> Self {
        Self {
            id: review.id,
            pr_number: review.pr_number,
            author: review.author.clone(),
            body: review.body.clone(),
            created_at: review.submitted_at,
            comment_type: CommentType::General,
            path: None,
            line: None,
            diff_hunk: None,
        }
    }
}

/// Marks the latest review per author and recomputes the PR's approval
/// count and pending reviewers from those latest reviews only.
pub fn apply_latest_reviews(pr: &mut PullRequest, reviews: &mut [Review]) {
    use std::collections::HashMap;

    let mut latest: HashMap<String, usize> = HashMap::new();
    for (idx, review) in reviews.iter().enumerate() {
        if review.pr_number != pr.number {
            continue;
        }
        let key = review.author.to_lowercase();
        match latest.get(&key) {
            Some(&prev)
                if (reviews[prev].submitted_at, reviews[prev].id)
                    > (review.submitted_at, review.id) => {}
            _ => {
                latest.insert(key, idx);
            }
        }
    }

    for (idx, review) in reviews.iter_mut().enumerate() {
        if review.pr_number == pr.number {
            review.is_latest = latest.values().any(|&i| i == idx);
        }
    }

    let mut latest_reviews: Vec<&Review> = latest.values().map(|&i| &reviews[i]).collect();
    latest_reviews.sort_by_key(|r| (r.submitted_at, r.id));

    pr.approval_count = latest_reviews
        .iter()
        .filter(|r| r.state == ReviewState::Approved)
        .count() as u32;

    let mut pending: Vec<String> = pr
        .requested_reviewers
        .iter()
        .filter(|login| !latest.contains_key(&login.to_lowercase()))
        .cloned()
        .collect();
    for review in latest_reviews {
        if review.state == ReviewState::ChangesRequested
            && !pending.iter().any(|p| p.eq_ignore_ascii_case(&review.author))
        {
            pending.push(review.author.clone());
        }
    }
    pr.pending_reviewers = pending;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn review(id: u64, author: &str, state: ReviewState, day: u32) -> Review {
        Review {
            id,
            pr_number: 1,
            author: author.to_string(),
            state,
            submitted_at: ts(day),
            body: String::new(),
            is_latest: false,
        }
    }

    fn pr() -> PullRequest {
        PullRequest {
            number: 1,
            title: "Add feature".to_string(),
            author: "alice".to_string(),
            created_at: ts(1),
            updated_at: ts(5),
            merged_at: None,
            status: PrStatus::Open,
            approval_count: 0,
            labels: vec![],
            requested_reviewers: vec!["bob".to_string(), "carol".to_string()],
            pending_reviewers: vec![],
        }
    }

    #[test]
    fn test_only_latest_review_counts_toward_approval() {
        let mut pr = pr();
        let mut reviews = vec![
            review(1, "bob", ReviewState::Approved, 2),
            review(2, "bob", ReviewState::ChangesRequested, 3),
        ];
        apply_latest_reviews(&mut pr, &mut reviews);

        assert!(!reviews[0].is_latest);
        assert!(reviews[1].is_latest);
        assert_eq!(pr.approval_count, 0);
        assert_eq!(pr.pending_reviewers, vec!["carol".to_string(), "bob".to_string()]);
    }

    #[test]
    fn test_approval_after_changes_requested_clears_pending() {
        let mut pr = pr();
        let mut reviews = vec![
            review(1, "bob", ReviewState::ChangesRequested, 2),
            review(2, "Bob", ReviewState::Approved, 4),
            review(3, "carol", ReviewState::Approved, 3),
        ];
        apply_latest_reviews(&mut pr, &mut reviews);

        assert_eq!(pr.approval_count, 2);
        assert!(pr.pending_reviewers.is_empty());
    }

    #[test]
    fn test_simultaneous_reviews_order_by_id() {
        let mut pr = pr();
        pr.requested_reviewers.clear();
        let mut reviews = vec![
            review(9, "zed", ReviewState::ChangesRequested, 2),
            review(7, "bob", ReviewState::ChangesRequested, 2),
            review(4, "bob", ReviewState::Approved, 2),
            review(3, "amy", ReviewState::ChangesRequested, 2),
        ];
        apply_latest_reviews(&mut pr, &mut reviews);

        assert!(reviews[1].is_latest);
        assert!(!reviews[2].is_latest);
        assert_eq!(
            pr.pending_reviewers,
            vec!["amy".to_string(), "bob".to_string(), "zed".to_string()]
        );
    }

    #[test]
    fn test_review_state_from_api() {
        assert_eq!(ReviewState::from_api("APPROVED"), Some(ReviewState::Approved));
        assert_eq!(
            ReviewState::from_api("changes_requested"),
            Some(ReviewState::ChangesRequested)
        );
        assert_eq!(ReviewState::from_api("DISMISSED"), None);
    }
}
