use crate::models::{AnalysisStrategy, Comment, CommentType};

pub const SYSTEM_PROMPT: &str = r#"You are an engineering manager reviewing the discussion on a pull request.
Your task is to summarize what reviewers and the author talked about, not the code itself.

You must respond with valid JSON matching this exact schema:
{
    "summary": "two or three sentences describing the review discussion",
    "themes": ["short phrases naming recurring topics, e.g. 'error handling', 'naming'"],
    "concerns": ["unresolved or significant concerns raised by reviewers"],
    "sentiment": "positive|neutral|negative|mixed"
}

Guidelines:
- Only use what is in the discussion; do not speculate about the code
- Keep themes short and reusable across pull requests
- List a concern only if a reviewer actually raised it
- If the discussion is thin, say so in the summary"#;

/// Per-comment character budget inside a prompt.
const MAX_COMMENT_CHARS: usize = 1500;

#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub pr_number: u64,
    pub pr_title: String,
    pub pr_author: String,
    pub strategy: AnalysisStrategy,
    /// Human-classified comments and reviews, oldest first.
    pub discussion: Vec<Comment>,
}

impl SummaryRequest {
    pub fn to_prompt(&self) -> String {
        let mut prompt = format!(
            "Summarize the review discussion on pull request #{} \"{}\" by {} ({} human messages",
            self.pr_number,
            self.pr_title,
            self.pr_author,
            self.discussion.len()
        );
        if self.strategy == AnalysisStrategy::Hybrid {
            prompt.push_str("; the discussion is brief, so keep the summary short");
        }
        prompt.push_str("):\n\n");

        for comment in &self.discussion {
            prompt.push_str(&format!(
                "## {} at {}",
                comment.author,
                comment.created_at.format("%Y-%m-%d %H:%M UTC")
            ));
            if comment.comment_type == CommentType::ReviewInline {
                if let Some(path) = &comment.path {
                    prompt.push_str(&format!(" on {}", path));
                    if let Some(line) = comment.line {
                        prompt.push_str(&format!(":{}", line));
                    }
                }
            }
            prompt.push('\n');

            let body = comment.body.trim();
            if body.chars().count() > MAX_COMMENT_CHARS {
                let truncated: String = body.chars().take(MAX_COMMENT_CHARS).collect();
                prompt.push_str(&truncated);
                prompt.push_str("...\n[truncated]");
            } else {
                prompt.push_str(body);
            }
            prompt.push_str("\n\n");
        }

        prompt.push_str("\nProvide your summary as JSON:\n");
        prompt
    }

    pub fn estimate_tokens(&self) -> usize {
        let char_count: usize = self
            .discussion
            .iter()
            .map(|c| c.author.len() + c.body.len())
            .sum();
        // Rough estimate: ~4 characters per token
        char_count / 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_prompt_includes_inline_location_and_truncates() {
        let request = SummaryRequest {
            pr_number: 12,
            pr_title: "Retry uploads".to_string(),
            pr_author: "alice".to_string(),
            strategy: AnalysisStrategy::Hybrid,
            discussion: vec![Comment {
                id: 1,
                pr_number: 12,
                author: "bob".to_string(),
                body: "x".repeat(MAX_COMMENT_CHARS + 10),
                created_at: Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap(),
                comment_type: CommentType::ReviewInline,
                path: Some("src/upload.rs".to_string()),
                line: Some(40),
                diff_hunk: None,
            }],
        };

        let prompt = request.to_prompt();
        assert!(prompt.contains("#12 \"Retry uploads\" by alice (1 human messages"));
        assert!(prompt.contains("## bob at 2024-01-02 09:30 UTC on src/upload.rs:40"));
        assert!(prompt.contains("[truncated]"));
        assert!(prompt.contains("keep the summary short"));
    }
}
