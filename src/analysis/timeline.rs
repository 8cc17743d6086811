use chrono::{DateTime, Utc};

use crate::analysis::validator::{self, ValidationRule, UNRESOLVED_CYCLE_ISSUE};
use crate::models::timeline::{days_between, round_days};
use crate::models::{
    Comment, EnhancedTimelineResult, EventKind, Milestone, Milestones, PrStatus, PullRequest,
    ResolutionSource, Review, ReviewCycle, ReviewState, StageDurations, StageName,
    TimelineEvent, TimelineResult, TimelineStage,
};

/// Everything one reconstruction pass derives for a PR. Never mutated after
/// creation; a new pass replaces it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    pub pr_number: u64,
    pub pr_title: String,
    pub pr_author: String,
    pub events: Vec<TimelineEvent>,
    pub stages: Vec<TimelineStage>,
    pub stage_durations: StageDurations,
    pub review_cycles: Vec<ReviewCycle>,
    pub milestones: Milestones,
    pub total_duration: f64,
    pub is_completed: bool,
    /// Issues found while reconstructing, handed to the validator.
    pub issues: Vec<String>,
    pub confidence: f64,
}

impl Reconstruction {
    pub fn stage(&self, name: StageName) -> Option<&TimelineStage> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn to_result(&self) -> TimelineResult {
        TimelineResult {
            pr_number: self.pr_number,
            pr_title: self.pr_title.clone(),
            pr_author: self.pr_author.clone(),
            total_duration: self.total_duration,
            stages: self.stages.clone(),
            is_completed: self.is_completed,
            stage_durations: self.stage_durations.clone(),
            milestones: self.milestones.clone(),
        }
    }

    pub fn into_enhanced(self) -> EnhancedTimelineResult {
        let validation = validator::validate(
            &self.stages,
            &self.events,
            &self.review_cycles,
            &self.issues,
            self.confidence,
        );
        EnhancedTimelineResult {
            timeline: self.to_result(),
            validation,
            review_cycles: self.review_cycles,
            actual_events: self.events,
        }
    }
}

/// Stages in the order they were reached, with anchored durations.
struct StageTable {
    stages: Vec<TimelineStage>,
}

impl StageTable {
    fn new() -> Self {
        Self { stages: Vec::new() }
    }

    fn get(&self, name: StageName) -> Option<&TimelineStage> {
        self.stages.iter().find(|s| s.stage == name)
    }

    fn timestamp(&self, name: StageName) -> Option<DateTime<Utc>> {
        self.get(name).map(|s| s.timestamp)
    }

    /// First present stage in `name`'s anchor priority list.
    fn anchor(&self, name: StageName) -> Option<&TimelineStage> {
        name.anchors().iter().find_map(|a| self.get(*a))
    }

    /// Appends the stage, or moves it if it is already present.
    fn place(&mut self, name: StageName, timestamp: DateTime<Utc>) {
        let duration = self
            .anchor(name)
            .map(|anchor| days_between(anchor.timestamp, timestamp));

        match self.stages.iter_mut().find(|s| s.stage == name) {
            Some(existing) => {
                existing.timestamp = timestamp;
                existing.duration_from_previous = duration;
            }
            None => self.stages.push(TimelineStage {
                stage: name,
                timestamp,
                duration_from_previous: duration,
            }),
        }
    }

    fn between(&self, from: StageName, to: StageName) -> f64 {
        match (self.timestamp(from), self.timestamp(to)) {
            (Some(start), Some(end)) => days_between(start, end),
            _ => 0.0,
        }
    }
}

/// Turns a PR and its unfiltered reviews into an ordered lifecycle. Bot
/// reviews are real state changes here, so nothing is classified away.
pub struct TimelineReconstructor;

impl TimelineReconstructor {
    pub fn new() -> Self {
        Self
    }

    pub fn reconstruct(
        &self,
        pr: &PullRequest,
        reviews: &[Review],
        comments: &[Comment],
    ) -> Reconstruction {
        self.reconstruct_at(pr, reviews, comments, Utc::now())
    }

    pub fn reconstruct_at(
        &self,
        pr: &PullRequest,
        reviews: &[Review],
        comments: &[Comment],
        now: DateTime<Utc>,
    ) -> Reconstruction {
        tracing::debug!(
            "Reconstructing PR #{} from {} reviews and {} comments",
            pr.number,
            reviews.len(),
            comments.len()
        );

        let mut events = vec![TimelineEvent {
            kind: EventKind::PrCreated,
            timestamp: pr.created_at,
            actor: pr.author.clone(),
        }];
        let mut stages = StageTable::new();
        stages.place(StageName::PrRaised, pr.created_at);

        let mut sorted: Vec<&Review> = reviews.iter().collect();
        sorted.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut review_cycles: Vec<ReviewCycle> = Vec::new();
        let mut last_approval: Option<DateTime<Utc>> = None;

        for (idx, review) in sorted.iter().enumerate() {
            if idx == 0 {
                events.push(TimelineEvent {
                    kind: EventKind::FirstReview,
                    timestamp: review.submitted_at,
                    actor: review.author.clone(),
                });
                stages.place(StageName::FirstReview, review.submitted_at);
            }

            match review.state {
                ReviewState::ChangesRequested => {
                    events.push(TimelineEvent {
                        kind: EventKind::ChangesRequested,
                        timestamp: review.submitted_at,
                        actor: review.author.clone(),
                    });

                    let (cycle, addressed_by) = open_cycle(
                        review_cycles.len() as u32 + 1,
                        review,
                        &sorted[idx + 1..],
                        pr,
                    );
                    if let (Some(addressed_at), Some(actor)) =
                        (cycle.changes_addressed_at, addressed_by)
                    {
                        events.push(TimelineEvent {
                            kind: EventKind::ChangesAddressed,
                            timestamp: addressed_at,
                            actor,
                        });
                    }
                    review_cycles.push(cycle);
                }
                ReviewState::Approved => {
                    last_approval = Some(review.submitted_at);
                    events.push(TimelineEvent {
                        kind: EventKind::Approved,
                        timestamp: review.submitted_at,
                        actor: review.author.clone(),
                    });
                }
                ReviewState::Commented => {}
            }
        }

        let mut issues = Vec::new();
        let mut confidence = 1.0;

        if let Some(last_cycle) = review_cycles.last() {
            match last_cycle.changes_addressed_at {
                Some(fixed_at) => stages.place(StageName::CommentsFixed, fixed_at),
                None => {
                    tracing::debug!(
                        "PR #{}: review cycle {} unresolved",
                        pr.number,
                        last_cycle.cycle_number
                    );
                    issues.push(UNRESOLVED_CYCLE_ISSUE.to_string());
                    confidence -= ValidationRule::UnresolvedReviewCycle.penalty();
                }
            }
        }

        if let Some(approved_at) = last_approval {
            stages.place(StageName::Approved, approved_at);
        }

        if let Some(merged_at) = pr.merged_at {
            stages.place(StageName::Merged, merged_at);
            events.push(TimelineEvent {
                kind: EventKind::Merged,
                timestamp: merged_at,
                actor: pr.author.clone(),
            });
        }

        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let end = pr.merged_at.unwrap_or(now);
        let total_duration = days_between(pr.created_at, end);

        let ongoing_time = match (pr.status, stages.stages.last()) {
            (PrStatus::Open, Some(last)) => days_between(last.timestamp, now),
            _ => 0.0,
        };

        let pr_raised_to_first_review = stages.between(StageName::PrRaised, StageName::FirstReview);
        let first_review_to_comments_fixed =
            stages.between(StageName::FirstReview, StageName::CommentsFixed);
        let comments_fixed_to_approved = stages.between(StageName::CommentsFixed, StageName::Approved);
        let approved_to_merged = stages.between(StageName::Approved, StageName::Merged);

        let stage_durations = StageDurations {
            pr_raised_to_first_review,
            first_review_to_comments_fixed,
            comments_fixed_to_approved,
            approved_to_merged,
            ongoing_time,
            total_review_time: round_days(
                pr_raised_to_first_review
                    + first_review_to_comments_fixed
                    + comments_fixed_to_approved
                    + approved_to_merged,
            ),
        };

        let milestones = Milestones {
            pr_created: Milestone::from_timestamp(Some(pr.created_at)),
            first_review: Milestone::from_timestamp(stages.timestamp(StageName::FirstReview)),
            approved: Milestone::from_timestamp(stages.timestamp(StageName::Approved)),
            merged: Milestone {
                timestamp: pr.merged_at,
                achieved: pr.status == PrStatus::Merged,
            },
        };

        Reconstruction {
            pr_number: pr.number,
            pr_title: pr.title.clone(),
            pr_author: pr.author.clone(),
            events,
            stages: stages.stages,
            stage_durations,
            review_cycles,
            milestones,
            total_duration,
            is_completed: pr.status.is_terminal(),
            issues,
            confidence,
        }
    }

    pub fn enhanced_at(
        &self,
        pr: &PullRequest,
        reviews: &[Review],
        comments: &[Comment],
        now: DateTime<Utc>,
    ) -> EnhancedTimelineResult {
        self.reconstruct_at(pr, reviews, comments, now).into_enhanced()
    }
}

impl Default for TimelineReconstructor {
    fn default() -> Self {
        Self::new()
    }
}

fn resolves(review: &Review) -> bool {
    matches!(review.state, ReviewState::Approved | ReviewState::Commented)
}

/// Opens a review cycle for `request` and looks for its resolution among
/// the reviews that follow it. Falls back once to the PR's last update,
/// and only when that is strictly after the request. Also returns who
/// addressed the changes, when anyone did.
fn open_cycle(
    cycle_number: u32,
    request: &Review,
    following: &[&Review],
    pr: &PullRequest,
) -> (ReviewCycle, Option<String>) {
    let resolution = following
        .iter()
        .find(|r| resolves(r))
        .map(|r| (r.submitted_at, ResolutionSource::Review, r.author.clone()))
        .or_else(|| {
            (pr.updated_at > request.submitted_at).then(|| {
                (pr.updated_at, ResolutionSource::LastUpdated, pr.author.clone())
            })
        });

    let cycle = ReviewCycle {
        cycle_number,
        changes_requested_at: request.submitted_at,
        changes_addressed_at: resolution.as_ref().map(|(at, _, _)| *at),
        duration: resolution
            .as_ref()
            .map(|(at, _, _)| days_between(request.submitted_at, *at)),
        reviewer: request.author.clone(),
        resolution_source: resolution.as_ref().map(|(_, source, _)| *source),
    };

    (cycle, resolution.map(|(_, _, actor)| actor))
}
