use crate::models::{DataQuality, ReviewCycle, TimelineEvent, TimelineStage, TimelineValidation};

/// Stage transitions longer than this many days are flagged.
pub const LONG_STAGE_DAYS: f64 = 30.0;
/// Review cycles taking longer than this many days to resolve are flagged.
pub const LONG_CYCLE_DAYS: f64 = 14.0;

/// Each condition the validator checks and what it costs in confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    StageOutOfOrder,
    NegativeDuration,
    LongStage,
    LongReviewCycle,
    UnresolvedReviewCycle,
}

impl ValidationRule {
    pub const ALL: [ValidationRule; 5] = [
        ValidationRule::StageOutOfOrder,
        ValidationRule::NegativeDuration,
        ValidationRule::LongStage,
        ValidationRule::LongReviewCycle,
        ValidationRule::UnresolvedReviewCycle,
    ];

    pub fn penalty(&self) -> f64 {
        match self {
            ValidationRule::StageOutOfOrder => 0.3,
            ValidationRule::NegativeDuration => 0.2,
            ValidationRule::LongStage => 0.1,
            ValidationRule::LongReviewCycle => 0.05,
            ValidationRule::UnresolvedReviewCycle => 0.2,
        }
    }
}

pub const UNRESOLVED_CYCLE_ISSUE: &str = "Changes requested but no clear resolution detected";

struct Findings {
    confidence: f64,
    issues: Vec<String>,
}

impl Findings {
    fn flag(&mut self, rule: ValidationRule, issue: String) {
        self.confidence -= rule.penalty();
        self.issues.push(issue);
    }
}

/// Scores a reconstructed timeline. Pure: identical inputs always give
/// identical output.
pub fn validate(
    stages: &[TimelineStage],
    events: &[TimelineEvent],
    review_cycles: &[ReviewCycle],
    prior_issues: &[String],
    prior_confidence: f64,
) -> TimelineValidation {
    let mut findings = Findings {
        confidence: prior_confidence,
        issues: prior_issues.to_vec(),
    };

    let mut ordered: Vec<&TimelineStage> = stages.iter().collect();
    ordered.sort_by_key(|s| s.stage);

    for pair in ordered.windows(2) {
        let (earlier, later) = (pair[0], pair[1]);
        if later.timestamp < earlier.timestamp {
            findings.flag(
                ValidationRule::StageOutOfOrder,
                format!(
                    "Stage '{}' ({}) occurs before '{}' ({})",
                    later.stage,
                    later.timestamp.to_rfc3339(),
                    earlier.stage,
                    earlier.timestamp.to_rfc3339()
                ),
            );
        }
    }

    for stage in &ordered {
        let Some(duration) = stage.duration_from_previous else {
            continue;
        };
        if duration < 0.0 {
            findings.flag(
                ValidationRule::NegativeDuration,
                format!("Negative duration for stage '{}': {} days", stage.stage, duration),
            );
        } else if duration > LONG_STAGE_DAYS {
            findings.flag(
                ValidationRule::LongStage,
                format!(
                    "Unusually long duration for stage '{}': {} days",
                    stage.stage, duration
                ),
            );
        }
    }

    for cycle in review_cycles {
        if let Some(duration) = cycle.duration {
            if duration > LONG_CYCLE_DAYS {
                findings.flag(
                    ValidationRule::LongReviewCycle,
                    format!(
                        "Review cycle {} took {} days to resolve",
                        cycle.cycle_number, duration
                    ),
                );
            }
        }
    }

    let confidence = round_confidence(findings.confidence.clamp(0.0, 1.0));
    let issue_count = findings.issues.len();

    tracing::trace!(
        stages = stages.len(),
        events = events.len(),
        issues = issue_count,
        confidence,
        "Validated timeline"
    );

    TimelineValidation {
        confidence_score: confidence,
        data_quality: data_quality(confidence, issue_count),
        is_valid: confidence >= 0.5 && issue_count < 5,
        issues: findings.issues,
    }
}

pub fn data_quality(confidence: f64, issue_count: usize) -> DataQuality {
    if confidence >= 0.8 && issue_count == 0 {
        DataQuality::High
    } else if confidence >= 0.6 && issue_count <= 2 {
        DataQuality::Medium
    } else {
        DataQuality::Low
    }
}

fn round_confidence(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StageName;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn stage(name: StageName, day: u32, duration: Option<f64>) -> TimelineStage {
        TimelineStage {
            stage: name,
            timestamp: ts(day),
            duration_from_previous: duration,
        }
    }

    fn cycle(number: u32, duration: Option<f64>) -> ReviewCycle {
        ReviewCycle {
            cycle_number: number,
            changes_requested_at: ts(2),
            changes_addressed_at: duration.map(|_| ts(3)),
            duration,
            reviewer: "bob".to_string(),
            resolution_source: None,
        }
    }

    #[test]
    fn test_clean_timeline_is_high_quality() {
        let stages = vec![
            stage(StageName::PrRaised, 1, None),
            stage(StageName::FirstReview, 2, Some(1.0)),
            stage(StageName::Approved, 3, Some(1.0)),
        ];
        let v = validate(&stages, &[], &[], &[], 1.0);
        assert_eq!(v.confidence_score, 1.0);
        assert_eq!(v.data_quality, DataQuality::High);
        assert!(v.is_valid);
        assert!(v.issues.is_empty());
    }

    #[test]
    fn test_each_penalty_applies_independently() {
        let out_of_order = vec![
            stage(StageName::PrRaised, 5, None),
            stage(StageName::FirstReview, 3, Some(1.0)),
        ];
        let v = validate(&out_of_order, &[], &[], &[], 1.0);
        assert_eq!(v.issues.len(), 1);
        assert_eq!(v.confidence_score, 0.7);

        let negative = vec![
            stage(StageName::PrRaised, 1, None),
            stage(StageName::FirstReview, 2, Some(-1.0)),
        ];
        assert_eq!(validate(&negative, &[], &[], &[], 1.0).confidence_score, 0.8);

        let long = vec![
            stage(StageName::PrRaised, 1, None),
            stage(StageName::FirstReview, 2, Some(31.0)),
        ];
        assert_eq!(validate(&long, &[], &[], &[], 1.0).confidence_score, 0.9);

        let slow_cycle = vec![cycle(1, Some(15.0))];
        let v = validate(&[], &[], &slow_cycle, &[], 1.0);
        assert_eq!(v.confidence_score, 0.95);
        assert_eq!(v.issues, vec!["Review cycle 1 took 15 days to resolve".to_string()]);
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        let stages = vec![
            stage(StageName::PrRaised, 1, None),
            stage(StageName::FirstReview, 2, Some(30.0)),
        ];
        let cycles = vec![cycle(1, Some(14.0)), cycle(2, None)];
        let v = validate(&stages, &[], &cycles, &[], 1.0);
        assert!(v.issues.is_empty());
    }

    #[test]
    fn test_prior_issues_carry_over() {
        let prior = vec![UNRESOLVED_CYCLE_ISSUE.to_string()];
        let v = validate(&[stage(StageName::PrRaised, 1, None)], &[], &[], &prior, 0.8);
        assert_eq!(v.issues, prior);
        assert_eq!(v.confidence_score, 0.8);
        assert_eq!(v.data_quality, DataQuality::Medium);
        assert!(v.is_valid);
    }

    #[test]
    fn test_five_issues_invalidate_despite_confidence() {
        let cycles: Vec<ReviewCycle> = (1..=5).map(|n| cycle(n, Some(15.0))).collect();
        let v = validate(&[], &[], &cycles, &[], 1.0);
        assert_eq!(v.issues.len(), 5);
        assert_eq!(v.confidence_score, 0.75);
        assert_eq!(v.data_quality, DataQuality::Low);
        assert!(!v.is_valid);
    }

    #[test]
    fn test_four_issues_stay_valid() {
        let cycles: Vec<ReviewCycle> = (1..=4).map(|n| cycle(n, Some(15.0))).collect();
        let v = validate(&[], &[], &cycles, &[], 1.0);
        assert_eq!(v.issues.len(), 4);
        assert_eq!(v.confidence_score, 0.8);
        assert!(v.is_valid);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let stages = vec![
            stage(StageName::PrRaised, 9, None),
            stage(StageName::FirstReview, 8, Some(-1.0)),
            stage(StageName::CommentsFixed, 7, Some(-1.0)),
            stage(StageName::Approved, 6, Some(-1.0)),
        ];
        let v = validate(&stages, &[], &[], &[], 1.0);
        assert_eq!(v.confidence_score, 0.0);
        assert_eq!(v.data_quality, DataQuality::Low);
        assert!(!v.is_valid);
        assert_eq!(v.issues.len(), 6);
    }

    #[test]
    fn test_stage_order_uses_canonical_order_not_input_order() {
        let stages = vec![
            stage(StageName::FirstReview, 2, Some(1.0)),
            stage(StageName::PrRaised, 1, None),
        ];
        assert!(validate(&stages, &[], &[], &[], 1.0).issues.is_empty());
    }

    #[test]
    fn test_data_quality_tiers() {
        assert_eq!(data_quality(0.8, 0), DataQuality::High);
        assert_eq!(data_quality(0.9, 1), DataQuality::Medium);
        assert_eq!(data_quality(0.6, 2), DataQuality::Medium);
        assert_eq!(data_quality(0.6, 3), DataQuality::Low);
        assert_eq!(data_quality(0.55, 0), DataQuality::Low);
    }

    #[test]
    fn test_penalty_table() {
        let total: f64 = ValidationRule::ALL.iter().map(|r| r.penalty()).sum();
        assert!((total - 0.85).abs() < 1e-9);
    }
}
