use crate::analysis::classifier::BotPolicy;
use crate::models::{AnalysisStrategy, Comment, ConfidenceTier, DiscussionAnalysis, Review};

/// Human comments plus reviews at which a PR has a real discussion.
const DISCUSSION_THRESHOLD: usize = 5;
/// Independent human reviews that make a discussion on their own.
const REVIEW_THRESHOLD: usize = 2;

pub struct StrategySelector {
    policy: BotPolicy,
}

impl StrategySelector {
    pub fn new() -> Self {
        Self {
            policy: BotPolicy::new(),
        }
    }

    pub fn with_policy(policy: BotPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &BotPolicy {
        &self.policy
    }

    pub fn select(&self, comments: &[Comment], reviews: &[Review]) -> DiscussionAnalysis {
        let human_comments = comments.iter().filter(|c| !self.policy.is_bot(c)).count();
        let human_reviews = reviews.iter().filter(|r| !self.policy.is_bot_review(r)).count();

        let (strategy, confidence) = decide(human_comments, human_reviews);

        DiscussionAnalysis {
            strategy,
            confidence,
            human_comments,
            bot_comments: comments.len() - human_comments,
            human_reviews,
            bot_reviews: reviews.len() - human_reviews,
        }
    }

    /// Human-authored comments and reviews, oldest first, in the shape the
    /// summarizer consumes.
    pub fn human_discussion(&self, comments: &[Comment], reviews: &[Review]) -> Vec<Comment> {
        let mut discussion: Vec<Comment> = comments
            .iter()
            .filter(|c| !self.policy.is_bot(c))
            .cloned()
            .chain(
                reviews
                    .iter()
                    .filter(|r| !self.policy.is_bot_review(r))
                    .map(Comment::from),
            )
            .collect();
        discussion.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        discussion
    }
}

impl Default for StrategySelector {
    fn default() -> Self {
        Self::new()
    }
}

fn decide(human_comments: usize, human_reviews: usize) -> (AnalysisStrategy, ConfidenceTier) {
    let human_total = human_comments + human_reviews;

    if human_total == 0 {
        (AnalysisStrategy::CodeOnly, ConfidenceTier::Medium)
    } else if human_total >= DISCUSSION_THRESHOLD || human_reviews >= REVIEW_THRESHOLD {
        (AnalysisStrategy::HumanDiscussion, ConfidenceTier::High)
    } else {
        (AnalysisStrategy::Hybrid, ConfidenceTier::Medium)
    }
}
