use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use prtimeline::analysis::classifier::{MatchReason, RuleKind};
use prtimeline::analysis::validator::UNRESOLVED_CYCLE_ISSUE;
use prtimeline::cache::{dataset_version, DatasetSummary};
use prtimeline::models::{
    Comment, CommentType, DataQuality, PrStatus, PullRequest, ResolutionSource, Review,
    ReviewState, SnapshotFile, StageName,
};
use prtimeline::{AnalysisPipeline, BotPolicy, DerivedCache, MonitorConfig, TimelineReconstructor};

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
}

fn pull_request(status: PrStatus, updated: DateTime<Utc>, merged: Option<DateTime<Utc>>) -> PullRequest {
    PullRequest {
        number: 42,
        title: "Add retry to uploader".to_string(),
        author: "alice".to_string(),
        created_at: day(1),
        updated_at: updated,
        merged_at: merged,
        status,
        approval_count: 0,
        labels: vec![],
        requested_reviewers: vec![],
        pending_reviewers: vec![],
    }
}

fn review(id: u64, state: ReviewState, at: DateTime<Utc>) -> Review {
    Review {
        id,
        pr_number: 42,
        author: "bob".to_string(),
        state,
        submitted_at: at,
        body: "Looks reasonable to me overall.".to_string(),
        is_latest: false,
    }
}

fn comment(author: &str, body: &str) -> Comment {
    Comment {
        id: 1,
        pr_number: 42,
        author: author.to_string(),
        body: body.to_string(),
        created_at: day(2),
        comment_type: CommentType::Issue,
        path: None,
        line: None,
        diff_hunk: None,
    }
}

fn stage_names(stages: &[prtimeline::models::TimelineStage]) -> Vec<StageName> {
    stages.iter().map(|s| s.stage).collect()
}

#[test]
fn single_approval_on_open_pr() {
    let pr = pull_request(PrStatus::Open, day(3), None);
    let reviews = vec![review(1, ReviewState::Approved, day(3))];

    let result = TimelineReconstructor::new().enhanced_at(&pr, &reviews, &[], day(10));
    let timeline = &result.timeline;

    assert_eq!(
        stage_names(&timeline.stages),
        vec![StageName::PrRaised, StageName::FirstReview, StageName::Approved]
    );
    assert_eq!(timeline.stage_durations.pr_raised_to_first_review, 2.0);
    assert!(!timeline.is_completed);
    assert_eq!(timeline.total_duration, 9.0);
    assert_eq!(timeline.stage_durations.ongoing_time, 7.0);
    assert!(!timeline.milestones.merged.achieved);
    assert_eq!(result.validation.data_quality, DataQuality::High);
}

#[test]
fn changes_requested_then_fixed_and_merged() {
    let pr = pull_request(PrStatus::Merged, day(7), Some(day(7)));
    let reviews = vec![
        review(1, ReviewState::ChangesRequested, day(2)),
        review(2, ReviewState::Commented, day(5)),
        review(3, ReviewState::Approved, day(6)),
    ];

    let result = TimelineReconstructor::new().enhanced_at(&pr, &reviews, &[], day(20));

    assert_eq!(result.review_cycles.len(), 1);
    let cycle = &result.review_cycles[0];
    assert_eq!(cycle.duration, Some(3.0));
    assert_eq!(cycle.resolution_source, Some(ResolutionSource::Review));

    let timeline = &result.timeline;
    assert_eq!(timeline.stage(StageName::CommentsFixed).unwrap().timestamp, day(5));
    assert_eq!(timeline.stage(StageName::Approved).unwrap().timestamp, day(6));
    assert_eq!(timeline.stage(StageName::Merged).unwrap().timestamp, day(7));
    assert_eq!(timeline.stage_durations.approved_to_merged, 1.0);
    assert_eq!(timeline.total_duration, 6.0);
    assert!(timeline.is_completed);
    assert!(timeline.milestones.merged.achieved);
    assert!(result.validation.is_valid);
}

#[test]
fn unresolved_cycle_on_open_pr_is_flagged() {
    let pr = pull_request(PrStatus::Open, day(2), None);
    let reviews = vec![review(1, ReviewState::ChangesRequested, day(2))];

    let result = TimelineReconstructor::new().enhanced_at(&pr, &reviews, &[], day(4));

    assert!(result
        .validation
        .issues
        .iter()
        .any(|i| i == UNRESOLVED_CYCLE_ISSUE));
    assert!(result.validation.data_quality <= DataQuality::Medium);
    assert!(result.timeline.stage(StageName::CommentsFixed).is_none());
    assert!(!result.review_cycles[0].is_resolved());
}

#[test]
fn last_updated_fallback_resolves_cycle() {
    let pr = pull_request(PrStatus::Open, day(4), None);
    let reviews = vec![review(1, ReviewState::ChangesRequested, day(2))];

    let result = TimelineReconstructor::new().enhanced_at(&pr, &reviews, &[], day(5));

    let cycle = &result.review_cycles[0];
    assert_eq!(cycle.changes_addressed_at, Some(day(4)));
    assert_eq!(cycle.resolution_source, Some(ResolutionSource::LastUpdated));
    assert_eq!(result.timeline.stage(StageName::CommentsFixed).unwrap().timestamp, day(4));
}

#[test]
fn coverage_bot_matches_author_and_content_rules() {
    let c = comment("codecov[bot]", "[bot] Coverage report: 92%");

    let policy = BotPolicy::new();
    let classification = policy.classify(&c);
    assert!(classification.is_bot);
    assert!(matches!(
        classification.reason,
        Some(MatchReason::Rule {
            kind: RuleKind::AuthorExact,
            ..
        })
    ));

    let mut content_only = BotPolicy::empty();
    content_only.add_rule(RuleKind::ContentPattern, "[bot]", "bot-tagged message");
    let classification = content_only.classify(&c);
    assert!(classification.is_bot);
    assert!(matches!(
        classification.reason,
        Some(MatchReason::Rule {
            kind: RuleKind::ContentPattern,
            ..
        })
    ));
}

#[test]
fn insights_cache_round_trip() {
    let summary = DatasetSummary {
        pull_requests: 3,
        reviews: 5,
        comments: 8,
        latest_update: Some(day(6)),
    };
    let version = dataset_version(&summary);

    let cache: DerivedCache<Vec<u64>> = DerivedCache::default();
    let entry = cache.create_at(vec![1, 2, 3], &version, day(6));
    assert!(DerivedCache::is_valid_at(&entry, &version, day(6)));
    assert!(!DerivedCache::is_valid_at(&entry, &version, day(6) + Duration::hours(2)));

    let changed = dataset_version(&DatasetSummary {
        comments: 9,
        ..summary
    });
    assert_ne!(changed, version);
    assert!(!DerivedCache::is_valid_at(&entry, &changed, day(6)));
}

#[tokio::test]
async fn pipeline_serves_timelines_from_loaded_snapshot() {
    let pipeline = AnalysisPipeline::new(MonitorConfig::default());
    let mut events = pipeline.subscribe();

    pipeline.load_snapshot(SnapshotFile {
        pull_requests: vec![pull_request(PrStatus::Merged, day(7), Some(day(7)))],
        reviews: vec![
            review(1, ReviewState::ChangesRequested, day(2)),
            review(2, ReviewState::Commented, day(5)),
            review(3, ReviewState::Approved, day(6)),
        ],
        comments: vec![comment("codecov[bot]", "[bot] Coverage report: 92%")],
    });
    assert!(events.recv().await.is_ok());

    let enhanced = pipeline.enhanced_timeline_at(42, day(20)).unwrap();
    assert_eq!(enhanced.review_cycles.len(), 1);

    let analysis = pipeline.discussion_analysis(42).unwrap();
    assert_eq!(analysis.bot_comments, 1);
    assert_eq!(analysis.human_reviews, 3);

    // Human discussion with no summarizer configured.
    assert!(pipeline.insights_at(day(20)).await.is_err());
}

fn arb_state() -> impl Strategy<Value = ReviewState> {
    prop_oneof![
        Just(ReviewState::Commented),
        Just(ReviewState::Approved),
        Just(ReviewState::ChangesRequested),
    ]
}

fn arb_reviews() -> impl Strategy<Value = Vec<Review>> {
    // Offsets in hours from creation; negative ones are reviews that predate
    // the PR and must surface as ordering issues.
    prop::collection::vec((arb_state(), -48i64..24 * 60), 0..8).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (state, hours))| review(i as u64 + 1, state, day(1) + Duration::hours(hours)))
            .collect()
    })
}

fn arb_pull_request() -> impl Strategy<Value = PullRequest> {
    (0u8..3, 0i64..24 * 90, 0i64..24 * 90).prop_map(|(status, updated, merged)| match status {
        0 => pull_request(PrStatus::Open, day(1) + Duration::hours(updated), None),
        1 => pull_request(PrStatus::Closed, day(1) + Duration::hours(updated), None),
        _ => {
            let merged_at = day(1) + Duration::hours(merged);
            pull_request(PrStatus::Merged, merged_at, Some(merged_at))
        }
    })
}

const ALLOWLIST: [&str; 4] = ["dependabot[bot]", "renovate", "github-actions", "Codecov"];

proptest! {
    #[test]
    fn classification_is_deterministic(author in "[a-zA-Z0-9_\\-\\[\\]]{1,20}", body in ".{0,60}") {
        let policy = BotPolicy::new();
        let c = comment(&author, &body);
        prop_assert_eq!(policy.classify(&c), policy.classify(&c));
    }

    #[test]
    fn allowlisted_authors_are_always_bots(idx in 0usize..ALLOWLIST.len(), body in ".{0,200}") {
        let policy = BotPolicy::new();
        prop_assert!(policy.is_bot(&comment(ALLOWLIST[idx], &body)));
    }

    #[test]
    fn no_reviews_means_single_stage(closed in any::<bool>(), days in 0i64..400) {
        let status = if closed { PrStatus::Closed } else { PrStatus::Open };
        let pr = pull_request(status, day(1), None);
        let now = day(1) + Duration::days(days);

        let result = TimelineReconstructor::new().enhanced_at(&pr, &[], &[], now);
        prop_assert_eq!(stage_names(&result.timeline.stages), vec![StageName::PrRaised]);
        prop_assert_eq!(result.timeline.is_completed, status != PrStatus::Open);
    }

    #[test]
    fn reconstruction_is_idempotent(pr in arb_pull_request(), reviews in arb_reviews()) {
        let reconstructor = TimelineReconstructor::new();
        let first = reconstructor.enhanced_at(&pr, &reviews, &[], day(30));
        let second = reconstructor.enhanced_at(&pr, &reviews, &[], day(30));

        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn out_of_order_stages_are_reported(pr in arb_pull_request(), reviews in arb_reviews()) {
        let result = TimelineReconstructor::new().enhanced_at(&pr, &reviews, &[], day(30));

        let mut stages = result.timeline.stages.clone();
        stages.sort_by_key(|s| s.stage);
        let inverted = stages
            .windows(2)
            .filter(|pair| pair[1].timestamp < pair[0].timestamp)
            .count();
        let reported = result
            .validation
            .issues
            .iter()
            .filter(|i| i.contains("occurs before"))
            .count();

        prop_assert_eq!(inverted, reported);
        prop_assert!(result.validation.confidence_score >= 0.0);
        prop_assert!(result.validation.confidence_score <= 1.0);
    }
}
