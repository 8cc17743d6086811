use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PrCreated,
    FirstReview,
    ChangesRequested,
    ChangesAddressed,
    Approved,
    Merged,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
}

/// Lifecycle milestones in canonical order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    PrRaised,
    FirstReview,
    CommentsFixed,
    Approved,
    Merged,
}

impl StageName {
    pub const CANONICAL: [StageName; 5] = [
        StageName::PrRaised,
        StageName::FirstReview,
        StageName::CommentsFixed,
        StageName::Approved,
        StageName::Merged,
    ];

    /// Stages a duration into `self` may be measured from, highest priority
    /// first. Never contains `self`.
    pub fn anchors(&self) -> &'static [StageName] {
        match self {
            StageName::PrRaised => &[],
            StageName::FirstReview => &[StageName::PrRaised],
            StageName::CommentsFixed => &[StageName::FirstReview, StageName::PrRaised],
            StageName::Approved => &[
                StageName::CommentsFixed,
                StageName::FirstReview,
                StageName::PrRaised,
            ],
            StageName::Merged => &[
                StageName::Approved,
                StageName::CommentsFixed,
                StageName::FirstReview,
                StageName::PrRaised,
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::PrRaised => "pr_raised",
            StageName::FirstReview => "first_review",
            StageName::CommentsFixed => "comments_fixed",
            StageName::Approved => "approved",
            StageName::Merged => "merged",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineStage {
    pub stage: StageName,
    pub timestamp: DateTime<Utc>,
    /// Days since the anchor stage, one decimal place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_from_previous: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// A later approving or commenting review.
    Review,
    /// The PR's last-updated time, used when no such review exists.
    LastUpdated,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewCycle {
    pub cycle_number: u32,
    pub changes_requested_at: DateTime<Utc>,
    pub changes_addressed_at: Option<DateTime<Utc>>,
    pub duration: Option<f64>,
    pub reviewer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_source: Option<ResolutionSource>,
}

impl ReviewCycle {
    pub fn is_resolved(&self) -> bool {
        self.changes_addressed_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for DataQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataQuality::Low => write!(f, "low"),
            DataQuality::Medium => write!(f, "medium"),
            DataQuality::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineValidation {
    pub confidence_score: f64,
    pub data_quality: DataQuality,
    pub is_valid: bool,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StageDurations {
    pub pr_raised_to_first_review: f64,
    pub first_review_to_comments_fixed: f64,
    pub comments_fixed_to_approved: f64,
    pub approved_to_merged: f64,
    pub ongoing_time: f64,
    pub total_review_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Milestone {
    pub timestamp: Option<DateTime<Utc>>,
    pub achieved: bool,
}

impl Milestone {
    pub fn from_timestamp(timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            achieved: timestamp.is_some(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Milestones {
    pub pr_created: Milestone,
    pub first_review: Milestone,
    pub approved: Milestone,
    pub merged: Milestone,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineResult {
    pub pr_number: u64,
    pub pr_title: String,
    pub pr_author: String,
    pub total_duration: f64,
    pub stages: Vec<TimelineStage>,
    pub is_completed: bool,
    pub stage_durations: StageDurations,
    pub milestones: Milestones,
}

impl TimelineResult {
    pub fn stage(&self, name: StageName) -> Option<&TimelineStage> {
        self.stages.iter().find(|s| s.stage == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnhancedTimelineResult {
    #[serde(flatten)]
    pub timeline: TimelineResult,
    pub validation: TimelineValidation,
    pub review_cycles: Vec<ReviewCycle>,
    pub actual_events: Vec<TimelineEvent>,
}

/// Fractional days between two instants, rounded to one decimal place.
pub fn days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let days = (end - start).num_milliseconds() as f64 / 86_400_000.0;
    round_days(days)
}

/// Rounds to one decimal place. Never returns negative zero.
pub fn round_days(days: f64) -> f64 {
    let rounded = (days * 10.0).round() / 10.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_days_between_rounds_to_one_decimal() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 3, 3, 0, 0).unwrap();
        assert_eq!(days_between(start, end), 2.1);
        assert_eq!(days_between(end, start), -2.1);
    }

    #[test]
    fn test_tiny_negative_gap_rounds_to_plain_zero() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let days = days_between(start, end);
        assert_eq!(days, 0.0);
        assert!(days.is_sign_positive());
        assert_eq!(serde_json::to_string(&days).unwrap(), "0.0");
    }

    #[test]
    fn test_anchors_never_include_target() {
        for stage in StageName::CANONICAL {
            assert!(!stage.anchors().contains(&stage));
            assert!(stage.anchors().iter().all(|a| *a < stage));
        }
    }

    #[test]
    fn test_stage_serializes_without_missing_duration() {
        let stage = TimelineStage {
            stage: StageName::PrRaised,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            duration_from_previous: None,
        };
        let json = serde_json::to_value(&stage).unwrap();
        assert_eq!(json["stage"], "pr_raised");
        assert!(json.get("duration_from_previous").is_none());
    }
}
