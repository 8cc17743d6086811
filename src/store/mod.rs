use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::{dataset_version, DatasetSummary};
use crate::error::{Error, Result};
use crate::models::{Comment, PullRequest, Review};

/// One immutable generation of fetched data.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub generation: u64,
    pub fetched_at: Option<DateTime<Utc>>,
    pull_requests: Vec<PullRequest>,
    reviews: Vec<Review>,
    comments: Vec<Comment>,
}

impl Snapshot {
    pub fn pull_requests(&self) -> &[PullRequest] {
        &self.pull_requests
    }

    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn is_empty(&self) -> bool {
        self.pull_requests.is_empty()
    }

    pub fn pull_request(&self, number: u64) -> Result<&PullRequest> {
        if self.is_empty() {
            return Err(Error::NoData);
        }
        self.pull_requests
            .iter()
            .find(|pr| pr.number == number)
            .ok_or(Error::PullRequestNotFound(number))
    }

    pub fn reviews_for(&self, number: u64) -> Vec<Review> {
        self.reviews
            .iter()
            .filter(|r| r.pr_number == number)
            .cloned()
            .collect()
    }

    pub fn comments_for(&self, number: u64) -> Vec<Comment> {
        self.comments
            .iter()
            .filter(|c| c.pr_number == number)
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> DatasetSummary {
        let latest_update = self
            .pull_requests
            .iter()
            .map(|pr| pr.updated_at)
            .chain(self.reviews.iter().map(|r| r.submitted_at))
            .chain(self.comments.iter().map(|c| c.created_at))
            .max();

        DatasetSummary {
            pull_requests: self.pull_requests.len(),
            reviews: self.reviews.len(),
            comments: self.comments.len(),
            latest_update,
        }
    }

    pub fn version(&self) -> String {
        dataset_version(&self.summary())
    }
}

/// Owns the current snapshot. A refresh swaps in a whole new generation;
/// readers holding an older `Arc<Snapshot>` are unaffected.
pub struct Store {
    current: RwLock<Arc<Snapshot>>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    /// Replaces everything with a fresh generation. Records are keyed by
    /// their source id, so a re-fetch that repeats a comment or review keeps
    /// only the last copy. Comment ids are only unique per endpoint, so
    /// comments are keyed by type and id.
    pub fn replace(
        &self,
        pull_requests: Vec<PullRequest>,
        reviews: Vec<Review>,
        comments: Vec<Comment>,
    ) -> Arc<Snapshot> {
        self.replace_at(pull_requests, reviews, comments, Utc::now())
    }

    pub fn replace_at(
        &self,
        pull_requests: Vec<PullRequest>,
        reviews: Vec<Review>,
        comments: Vec<Comment>,
        fetched_at: DateTime<Utc>,
    ) -> Arc<Snapshot> {
        let pull_requests: Vec<PullRequest> = pull_requests
            .into_iter()
            .map(|pr| (pr.number, pr))
            .collect::<BTreeMap<_, _>>()
            .into_values()
            .collect();
        let reviews: Vec<Review> = reviews
            .into_iter()
            .map(|r| (r.id, r))
            .collect::<BTreeMap<_, _>>()
            .into_values()
            .collect();
        let comments: Vec<Comment> = comments
            .into_iter()
            .map(|c| ((c.comment_type, c.id), c))
            .collect::<BTreeMap<_, _>>()
            .into_values()
            .collect();

        let mut current = self.current.write();
        let snapshot = Arc::new(Snapshot {
            generation: current.generation + 1,
            fetched_at: Some(fetched_at),
            pull_requests,
            reviews,
            comments,
        });
        *current = snapshot.clone();

        tracing::info!(
            "Store generation {}: {} pull requests, {} reviews, {} comments",
            snapshot.generation,
            snapshot.pull_requests.len(),
            snapshot.reviews.len(),
            snapshot.comments.len()
        );

        snapshot
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
