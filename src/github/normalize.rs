use crate::models::{
    Comment, CommentType, GitHubComment, GitHubPullRequest, GitHubReview, PrStatus, PullRequest,
    Review, ReviewState,
};

const UNKNOWN_USER: &str = "ghost";

pub fn pull_request(raw: GitHubPullRequest) -> PullRequest {
    let status = if raw.merged_at.is_some() {
        PrStatus::Merged
    } else if raw.state.eq_ignore_ascii_case("closed") {
        PrStatus::Closed
    } else {
        PrStatus::Open
    };

    PullRequest {
        number: raw.number,
        title: raw.title,
        author: login(raw.user.map(|u| u.login)),
        created_at: raw.created_at,
        updated_at: raw.updated_at,
        merged_at: raw.merged_at,
        status,
        approval_count: 0,
        labels: raw.labels.into_iter().map(|l| l.name).collect(),
        requested_reviewers: raw
            .requested_reviewers
            .into_iter()
            .map(|u| u.login)
            .collect(),
        pending_reviewers: Vec::new(),
    }
}

/// Reviews without a submission time are drafts and are skipped, as are
/// states with no lifecycle meaning.
pub fn reviews(pr_number: u64, raw: Vec<GitHubReview>) -> Vec<Review> {
    raw.into_iter()
        .filter_map(|r| {
            let state = ReviewState::from_api(&r.state)?;
            let submitted_at = r.submitted_at?;
            Some(Review {
                id: r.id,
                pr_number,
                author: login(r.user.map(|u| u.login)),
                state,
                submitted_at,
                body: r.body.unwrap_or_default(),
                is_latest: false,
            })
        })
        .collect()
}

pub fn comments(pr_number: u64, raw: Vec<GitHubComment>, comment_type: CommentType) -> Vec<Comment> {
    raw.into_iter()
        .map(|c| Comment {
            id: c.id,
            pr_number,
            author: login(c.user.map(|u| u.login)),
            body: c.body.unwrap_or_default(),
            created_at: c.created_at,
            comment_type,
            path: c.path,
            line: c.line.or(c.original_line),
            diff_hunk: c.diff_hunk,
        })
        .collect()
}

fn login(value: Option<String>) -> String {
    value.unwrap_or_else(|| UNKNOWN_USER.to_string())
}
