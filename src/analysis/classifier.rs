use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Comment, Review};

/// Bodies shorter than this (after trimming) carry no reviewable discussion.
const MIN_MEANINGFUL_LENGTH: usize = 10;

static STATUS_GLYPH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:✅|❌|🔄|⚠\x{FE0F}?|🚀|📦|🔧)\s").expect("status glyph pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Case-insensitive exact match on the author login.
    AuthorExact,
    /// Regular expression over the author login.
    AuthorPattern,
    /// Case-insensitive prefix of the trimmed body.
    ContentPattern,
}

#[derive(Debug, Clone)]
pub struct BotRule {
    pub kind: RuleKind,
    pub value: String,
    pub description: String,
    matcher: Option<Regex>,
}

impl BotRule {
    fn matches(&self, author_lower: &str, body_lower: &str) -> bool {
        match self.kind {
            RuleKind::AuthorExact => author_lower == self.value,
            RuleKind::AuthorPattern => self
                .matcher
                .as_ref()
                .map(|re| re.is_match(author_lower))
                .unwrap_or(false),
            RuleKind::ContentPattern => body_lower.starts_with(&self.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchReason {
    Rule { kind: RuleKind, description: String },
    TooShort,
    StatusGlyph,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub is_bot: bool,
    pub reason: Option<MatchReason>,
}

impl Classification {
    fn human() -> Self {
        Self {
            is_bot: false,
            reason: None,
        }
    }

    fn bot(reason: MatchReason) -> Self {
        Self {
            is_bot: true,
            reason: Some(reason),
        }
    }
}

/// Separates human discussion from automated output using a declarative
/// rule table. Adding a bot signature is a call to [`BotPolicy::add_rule`].
pub struct BotPolicy {
    rules: Vec<BotRule>,
}

impl BotPolicy {
    pub fn new() -> Self {
        let mut policy = Self { rules: Vec::new() };

        policy.init_known_accounts();
        policy.init_naming_conventions();
        policy.init_report_prefixes();

        policy
    }

    /// An empty table; only the length and status-glyph heuristics apply.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    fn init_known_accounts(&mut self) {
        let accounts = vec![
            ("dependabot", "Dependabot"),
            ("dependabot[bot]", "Dependabot app"),
            ("renovate", "Renovate"),
            ("renovate[bot]", "Renovate app"),
            ("github-actions", "GitHub Actions"),
            ("github-actions[bot]", "GitHub Actions app"),
            ("codecov", "Codecov"),
            ("codecov[bot]", "Codecov app"),
            ("codecov-commenter", "Codecov commenter"),
            ("sonarcloud[bot]", "SonarCloud"),
            ("netlify[bot]", "Netlify deploy previews"),
            ("vercel[bot]", "Vercel deploy previews"),
            ("coderabbitai", "CodeRabbit"),
            ("coderabbitai[bot]", "CodeRabbit app"),
            ("copilot", "Copilot reviewer"),
            ("snyk-bot", "Snyk"),
            ("mergify[bot]", "Mergify"),
            ("imgbot[bot]", "Imgbot"),
            ("allcontributors[bot]", "All Contributors"),
            ("pre-commit-ci[bot]", "pre-commit.ci"),
        ];

        for (login, description) in accounts {
            self.add_rule(RuleKind::AuthorExact, login, description);
        }
    }

    fn init_naming_conventions(&mut self) {
        let patterns = vec![
            (r"\[bot\]$", "GitHub app suffix"),
            (r"-bot$", "hyphenated bot suffix"),
            (r"bot$", "bot suffix"),
        ];

        for (pattern, description) in patterns {
            self.add_rule(RuleKind::AuthorPattern, pattern, description);
        }
    }

    fn init_report_prefixes(&mut self) {
        let prefixes = vec![
            ("[bot]", "bot-tagged message"),
            ("coverage report", "coverage report"),
            ("## coverage", "coverage report"),
            ("codecov report", "coverage report"),
            ("## [codecov]", "coverage report"),
            ("build status", "build status"),
            ("build succeeded", "build status"),
            ("build failed", "build status"),
            ("ci status", "build status"),
            ("deploy preview", "deployment notice"),
            ("auto-generated", "generated summary"),
            ("this pr was automatically", "generated summary"),
            ("this pull request was automatically", "generated summary"),
            ("## summary by coderabbit", "generated summary"),
            ("<!-- this is an auto-generated comment", "generated summary"),
            ("bumps ", "dependency update"),
            ("updates the requirements on", "dependency update"),
            ("dependabot", "dependency update"),
            ("renovate", "dependency update"),
            ("snyk has created", "security advisory"),
            ("security alert", "security advisory"),
        ];

        for (prefix, description) in prefixes {
            self.add_rule(RuleKind::ContentPattern, prefix, description);
        }
    }

    /// Regular expressions that fail to compile are logged and skipped.
    pub fn add_rule(&mut self, kind: RuleKind, value: &str, description: &str) {
        let value = value.to_lowercase();
        let matcher = match kind {
            RuleKind::AuthorPattern => match Regex::new(&value) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!("Skipping invalid bot pattern {}: {}", value, e);
                    return;
                }
            },
            _ => None,
        };

        self.rules.push(BotRule {
            kind,
            value,
            description: description.to_string(),
            matcher,
        });
    }

    pub fn rules(&self) -> &[BotRule] {
        &self.rules
    }

    pub fn classify(&self, comment: &Comment) -> Classification {
        self.classify_parts(&comment.author, &comment.body)
    }

    pub fn classify_review(&self, review: &Review) -> Classification {
        self.classify(&Comment::from(review))
    }

    pub fn is_bot(&self, comment: &Comment) -> bool {
        self.classify(comment).is_bot
    }

    pub fn is_bot_review(&self, review: &Review) -> bool {
        self.classify_review(review).is_bot
    }

    fn classify_parts(&self, author: &str, body: &str) -> Classification {
        let author_lower = author.trim().to_lowercase();
        let trimmed = body.trim();
        let body_lower = trimmed.to_lowercase();

        // Author rules take precedence over content rules.
        let ordered = [
            RuleKind::AuthorExact,
            RuleKind::AuthorPattern,
            RuleKind::ContentPattern,
        ];
        for kind in ordered {
            if let Some(rule) = self
                .rules
                .iter()
                .filter(|r| r.kind == kind)
                .find(|r| r.matches(&author_lower, &body_lower))
            {
                return Classification::bot(MatchReason::Rule {
                    kind,
                    description: rule.description.clone(),
                });
            }
        }

        if trimmed.chars().count() < MIN_MEANINGFUL_LENGTH {
            return Classification::bot(MatchReason::TooShort);
        }

        if STATUS_GLYPH.is_match(trimmed) {
            return Classification::bot(MatchReason::StatusGlyph);
        }

        Classification::human()
    }
}

impl Default for BotPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommentType, ReviewState};
    use chrono::{TimeZone, Utc};

    fn comment(author: &str, body: &str) -> Comment {
        Comment {
            id: 1,
            pr_number: 1,
            author: author.to_string(),
            body: body.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            comment_type: CommentType::Issue,
            path: None,
            line: None,
            diff_hunk: None,
        }
    }

    #[test]
    fn test_known_account_is_bot_regardless_of_content() {
        let policy = BotPolicy::new();
        let c = comment(
            "Dependabot",
            "I looked at the locking strategy and I think we should revisit it.",
        );
        let result = policy.classify(&c);
        assert!(result.is_bot);
        assert!(matches!(
            result.reason,
            Some(MatchReason::Rule { kind: RuleKind::AuthorExact, .. })
        ));
    }

    #[test]
    fn test_bot_naming_conventions() {
        let policy = BotPolicy::new();
        let body = "A long enough body for a normal comment.";
        assert!(policy.is_bot(&comment("my-ci[bot]", body)));
        assert!(policy.is_bot(&comment("deploy-bot", body)));
        assert!(policy.is_bot(&comment("ReleaseBot", body)));
        assert!(!policy.is_bot(&comment("bottomley", body)));
    }

    #[test]
    fn test_report_prefix_is_bot() {
        let policy = BotPolicy::new();
        let c = comment("alice", "  Coverage report: 92% of lines covered");
        let result = policy.classify(&c);
        assert!(result.is_bot);
        assert!(matches!(
            result.reason,
            Some(MatchReason::Rule { kind: RuleKind::ContentPattern, .. })
        ));
    }

    #[test]
    fn test_codecov_bot_matches_author_and_content() {
        let policy = BotPolicy::new();
        let c = comment("codecov[bot]", "[bot] Coverage report: 92%");
        assert!(policy.is_bot(&c));

        let content_only = comment("someone", "[bot] Coverage report: 92%");
        assert!(policy.is_bot(&content_only));
    }

    #[test]
    fn test_short_body_is_noise() {
        let policy = BotPolicy::new();
        assert_eq!(
            policy.classify(&comment("alice", "LGTM")).reason,
            Some(MatchReason::TooShort)
        );
        assert!(policy.is_bot(&comment("alice", "   ")));
    }

    #[test]
    fn test_status_glyph_is_bot() {
        let policy = BotPolicy::new();
        let c = comment("alice", "✅ All checks passed on the latest commit");
        assert_eq!(policy.classify(&c).reason, Some(MatchReason::StatusGlyph));
        let warning = comment("alice", "⚠️ Lint produced three warnings here");
        assert!(policy.is_bot(&warning));
    }

    #[test]
    fn test_human_discussion() {
        let policy = BotPolicy::new();
        let c = comment(
            "alice",
            "Could we move this check into the validator instead?",
        );
        assert_eq!(policy.classify(&c), Classification::human());
    }

    #[test]
    fn test_review_adapts_to_comment_shape() {
        let policy = BotPolicy::new();
        let review = Review {
            id: 7,
            pr_number: 1,
            author: "bob".to_string(),
            state: ReviewState::Approved,
            submitted_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            body: String::new(),
            is_latest: true,
        };
        assert!(policy.is_bot_review(&review));

        let with_body = Review {
            body: "Looks good, thanks for splitting the migration out.".to_string(),
            ..review
        };
        assert!(!policy.is_bot_review(&with_body));
    }

    #[test]
    fn test_added_rule_takes_effect() {
        let mut policy = BotPolicy::empty();
        let c = comment("alice", "Nightly benchmark results are in below");
        assert!(!policy.is_bot(&c));

        policy.add_rule(RuleKind::ContentPattern, "Nightly benchmark", "benchmark report");
        assert!(policy.is_bot(&c));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let mut policy = BotPolicy::empty();
        policy.add_rule(RuleKind::AuthorPattern, "(unclosed", "broken");
        assert!(policy.rules().is_empty());
    }
}
