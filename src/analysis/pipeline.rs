use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use parking_lot::Mutex;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::analysis::strategy::StrategySelector;
use crate::analysis::timeline::TimelineReconstructor;
use crate::cache::{CacheStatus, DerivedCache};
use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::github::{normalize, GitHubClient};
use crate::llm::{DiscussionSummarizer, SummaryRequest};
use crate::models::timeline::{days_between, round_days};
use crate::models::{
    apply_latest_reviews, AnalysisStrategy, Comment, CommentType, DataQuality,
    DiscussionAnalysis, EnhancedTimelineResult, PrInsights, PrStatus, PullRequest,
    RepositoryInsights, RepositoryMetrics, Review, SnapshotFile, StageName, TimelineResult,
};
use crate::store::{Snapshot, Store};

/// Notifications for listeners that want to know when data changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    SnapshotRefreshed { generation: u64, pull_requests: usize },
    InsightsRefreshed { version: String },
}

struct PullRequestData {
    pull_request: PullRequest,
    reviews: Vec<Review>,
    comments: Vec<Comment>,
}

pub struct AnalysisPipeline {
    github: Option<Arc<GitHubClient>>,
    repository: Option<(String, String)>,
    summarizer: Option<Arc<dyn DiscussionSummarizer>>,
    store: Store,
    selector: StrategySelector,
    reconstructor: TimelineReconstructor,
    insights: Mutex<DerivedCache<RepositoryInsights>>,
    /// Held by whoever is generating insights. Cache readers never take it.
    generating: tokio::sync::Mutex<()>,
    events: broadcast::Sender<MonitorEvent>,
    config: MonitorConfig,
}

impl AnalysisPipeline {
    pub fn new(config: MonitorConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            github: None,
            repository: None,
            summarizer: None,
            store: Store::new(),
            selector: StrategySelector::new(),
            reconstructor: TimelineReconstructor::new(),
            insights: Mutex::new(DerivedCache::new(config.cache_ttl_minutes)),
            generating: tokio::sync::Mutex::new(()),
            events,
            config,
        }
    }

    pub fn with_github(mut self, github: GitHubClient, owner: &str, repo: &str) -> Self {
        self.github = Some(Arc::new(github));
        self.repository = Some((owner.to_string(), repo.to_string()));
        self
    }

    pub fn with_summarizer(mut self, summarizer: impl DiscussionSummarizer + 'static) -> Self {
        self.summarizer = Some(Arc::new(summarizer));
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.snapshot()
    }

    fn notify(&self, event: MonitorEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Loads records captured elsewhere, e.g. from a JSON file.
    pub fn load_snapshot(&self, snapshot: SnapshotFile) -> Arc<Snapshot> {
        let SnapshotFile {
            mut pull_requests,
            mut reviews,
            comments,
        } = snapshot;

        for pr in pull_requests.iter_mut() {
            apply_latest_reviews(pr, &mut reviews);
        }

        self.publish(pull_requests, reviews, comments)
    }

    fn publish(
        &self,
        pull_requests: Vec<PullRequest>,
        reviews: Vec<Review>,
        comments: Vec<Comment>,
    ) -> Arc<Snapshot> {
        let snapshot = self.store.replace(pull_requests, reviews, comments);
        self.notify(MonitorEvent::SnapshotRefreshed {
            generation: snapshot.generation,
            pull_requests: snapshot.pull_requests().len(),
        });
        snapshot
    }

    /// Fetches the repository's pull requests with their reviews and
    /// comments and swaps them in as a new generation. On failure the
    /// previous generation stays current.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>> {
        let (github, (owner, repo)) = match (&self.github, &self.repository) {
            (Some(github), Some(repository)) => (github.clone(), repository.clone()),
            _ => {
                return Err(Error::Config(
                    "No GitHub client configured for refresh".to_string(),
                ))
            }
        };

        github.check_repository(&owner, &repo).await?;

        let raw_prs = github
            .list_pull_requests(&owner, &repo, self.config.max_pull_requests)
            .await?;
        tracing::info!("Found {} pull requests in {}/{}", raw_prs.len(), owner, repo);

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_limit.max(1)));

        let pb = ProgressBar::new(raw_prs.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pull requests")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let mut fetches = Vec::new();
        for raw in raw_prs {
            let github = github.clone();
            let sem = semaphore.clone();
            let owner = owner.clone();
            let repo = repo.clone();
            let pb = pb.clone();

            fetches.push(async move {
                let _permit = sem
                    .acquire()
                    .await
                    .map_err(|e| Error::GitHubApi(format!("Fetch cancelled: {}", e)))?;

                let pull_request = normalize::pull_request(raw);
                let number = pull_request.number;

                let (reviews, inline, issue) = tokio::try_join!(
                    github.list_reviews(&owner, &repo, number),
                    github.list_review_comments(&owner, &repo, number),
                    github.list_issue_comments(&owner, &repo, number),
                )?;

                let mut comments = normalize::comments(number, inline, CommentType::ReviewInline);
                comments.extend(normalize::comments(number, issue, CommentType::Issue));

                pb.inc(1);
                Ok::<_, Error>(PullRequestData {
                    pull_request,
                    reviews: normalize::reviews(number, reviews),
                    comments,
                })
            });
        }

        let results = join_all(fetches).await;
        pb.finish_with_message("Fetched all pull requests");
        tracing::debug!(
            "GitHub quota after refresh: {} requests",
            github.rate_limiter().remaining()
        );

        let mut pull_requests = Vec::new();
        let mut reviews = Vec::new();
        let mut comments = Vec::new();
        for result in results {
            let mut data = result?;
            apply_latest_reviews(&mut data.pull_request, &mut data.reviews);
            pull_requests.push(data.pull_request);
            reviews.extend(data.reviews);
            comments.extend(data.comments);
        }

        Ok(self.publish(pull_requests, reviews, comments))
    }

    /// Re-fetches on a fixed interval. A failed refresh is logged and the
    /// loop carries on with the data it already has.
    pub fn spawn_refresh_loop(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = refresh_ticker(period);
            loop {
                ticker.tick().await;
                match self.refresh().await {
                    Ok(snapshot) => {
                        tracing::debug!("Background refresh produced generation {}", snapshot.generation)
                    }
                    Err(e) => tracing::warn!("Background refresh failed: {}", e),
                }
            }
        })
    }

    pub fn timeline(&self, number: u64) -> Result<TimelineResult> {
        self.timeline_at(number, Utc::now())
    }

    pub fn timeline_at(&self, number: u64, now: DateTime<Utc>) -> Result<TimelineResult> {
        Ok(self.enhanced_timeline_at(number, now)?.timeline)
    }

    pub fn enhanced_timeline(&self, number: u64) -> Result<EnhancedTimelineResult> {
        self.enhanced_timeline_at(number, Utc::now())
    }

    pub fn enhanced_timeline_at(
        &self,
        number: u64,
        now: DateTime<Utc>,
    ) -> Result<EnhancedTimelineResult> {
        let snapshot = self.store.snapshot();
        let pr = snapshot.pull_request(number)?;
        let enhanced = self.reconstructor.enhanced_at(
            pr,
            &snapshot.reviews_for(number),
            &snapshot.comments_for(number),
            now,
        );

        if !enhanced.validation.is_valid {
            tracing::warn!(
                "Timeline for PR #{} is unreliable (confidence {:.2}): {}",
                number,
                enhanced.validation.confidence_score,
                enhanced.validation.issues.join("; ")
            );
        }

        Ok(enhanced)
    }

    /// Enhanced timelines for every PR in the current generation, newest
    /// number first.
    pub fn all_timelines_at(&self, now: DateTime<Utc>) -> Result<Vec<EnhancedTimelineResult>> {
        let snapshot = self.store.snapshot();
        if snapshot.is_empty() {
            return Err(Error::NoData);
        }

        let mut timelines: Vec<_> = snapshot
            .pull_requests()
            .iter()
            .map(|pr| {
                self.reconstructor.enhanced_at(
                    pr,
                    &snapshot.reviews_for(pr.number),
                    &snapshot.comments_for(pr.number),
                    now,
                )
            })
            .collect();
        timelines.sort_by(|a, b| b.timeline.pr_number.cmp(&a.timeline.pr_number));
        Ok(timelines)
    }

    pub fn discussion_analysis(&self, number: u64) -> Result<DiscussionAnalysis> {
        let snapshot = self.store.snapshot();
        snapshot.pull_request(number)?;
        Ok(self
            .selector
            .select(&snapshot.comments_for(number), &snapshot.reviews_for(number)))
    }

    pub fn repository_metrics(&self) -> Result<RepositoryMetrics> {
        self.repository_metrics_at(Utc::now())
    }

    pub fn repository_metrics_at(&self, now: DateTime<Utc>) -> Result<RepositoryMetrics> {
        let snapshot = self.store.snapshot();
        let timelines = self.all_timelines_at(now)?;

        let count_status = |status: PrStatus| {
            snapshot
                .pull_requests()
                .iter()
                .filter(|pr| pr.status == status)
                .count()
        };

        let first_review_times: Vec<f64> = timelines
            .iter()
            .filter(|t| t.timeline.stage(StageName::FirstReview).is_some())
            .map(|t| t.timeline.stage_durations.pr_raised_to_first_review)
            .collect();

        let approval_times: Vec<f64> = timelines
            .iter()
            .filter_map(|t| {
                let created = t.timeline.stage(StageName::PrRaised)?.timestamp;
                let approved = t.timeline.stage(StageName::Approved)?.timestamp;
                Some(days_between(created, approved))
            })
            .collect();

        let total = timelines.len();
        let cycles: usize = timelines.iter().map(|t| t.review_cycles.len()).sum();
        let confidence: f64 = timelines
            .iter()
            .map(|t| t.validation.confidence_score)
            .sum();

        Ok(RepositoryMetrics {
            total_pull_requests: total,
            open: count_status(PrStatus::Open),
            merged: count_status(PrStatus::Merged),
            closed: count_status(PrStatus::Closed),
            avg_time_to_first_review: average(&first_review_times),
            avg_time_to_approval: average(&approval_times),
            avg_review_cycles: round_days(cycles as f64 / total as f64),
            avg_confidence: (confidence / total as f64 * 100.0).round() / 100.0,
            low_quality_timelines: timelines
                .iter()
                .filter(|t| t.validation.data_quality == DataQuality::Low)
                .count(),
            generated_at: Some(now),
        })
    }

    pub async fn insights(&self) -> Result<RepositoryInsights> {
        self.insights_at(Utc::now()).await
    }

    /// Discussion summaries for every PR, served from the cache while the
    /// dataset version and TTL allow.
    ///
    /// Concurrent callers wait for a single generation; status and clear
    /// never wait on the summarizer.
    pub async fn insights_at(&self, now: DateTime<Utc>) -> Result<RepositoryInsights> {
        let snapshot = self.store.snapshot();
        if snapshot.is_empty() {
            return Err(Error::NoData);
        }
        let version = snapshot.version();

        if let Some(cached) = self.cached_insights(&version, now) {
            return Ok(cached);
        }

        let _generating = self.generating.lock().await;
        if let Some(cached) = self.cached_insights(&version, now) {
            return Ok(cached);
        }

        tracing::info!("Generating insights for dataset version {}", version);
        let insights = self.generate_insights(&snapshot).await?;
        {
            let mut cache = self.insights.lock();
            let entry = cache.create_at(insights.clone(), &version, now);
            cache.store(entry);
        }

        self.notify(MonitorEvent::InsightsRefreshed { version });
        Ok(insights)
    }

    fn cached_insights(&self, version: &str, now: DateTime<Utc>) -> Option<RepositoryInsights> {
        let cached = self.insights.lock().get_at(version, now).cloned();
        if cached.is_some() {
            tracing::debug!("Serving cached insights version {}", version);
        }
        cached
    }

    pub fn clear_insights(&self) {
        self.insights.lock().clear();
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.config.refresh_interval_secs.max(1))
    }

    pub fn insights_status(&self) -> CacheStatus {
        self.insights_status_at(Utc::now())
    }

    pub fn insights_status_at(&self, now: DateTime<Utc>) -> CacheStatus {
        let version = self.store.snapshot().version();
        self.insights.lock().status_at(&version, now)
    }

    async fn generate_insights(&self, snapshot: &Snapshot) -> Result<RepositoryInsights> {
        let mut pull_requests = BTreeMap::new();
        let mut requests = Vec::new();

        for pr in snapshot.pull_requests() {
            let comments = snapshot.comments_for(pr.number);
            let reviews = snapshot.reviews_for(pr.number);
            let analysis = self.selector.select(&comments, &reviews);

            if analysis.strategy == AnalysisStrategy::CodeOnly {
                pull_requests.insert(pr.number, PrInsights::code_only());
                continue;
            }

            requests.push(SummaryRequest {
                pr_number: pr.number,
                pr_title: pr.title.clone(),
                pr_author: pr.author.clone(),
                strategy: analysis.strategy,
                discussion: self.selector.human_discussion(&comments, &reviews),
            });
        }

        if requests.is_empty() {
            return Ok(RepositoryInsights {
                pull_requests,
                failed: Vec::new(),
            });
        }

        let summarizer = self.summarizer.clone().ok_or_else(|| {
            Error::Config("ANTHROPIC_API_KEY environment variable not set".to_string())
        })?;
        tracing::info!(
            "Summarizing {} pull requests with {}",
            requests.len(),
            summarizer.name()
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_limit.max(1)));
        let summaries = requests.into_iter().map(|request| {
            let summarizer = summarizer.clone();
            let sem = semaphore.clone();
            async move {
                let number = request.pr_number;
                let _permit = sem.acquire().await.ok();
                (number, summarizer.summarize(request).await)
            }
        });

        let mut failed = Vec::new();
        for (number, result) in join_all(summaries).await {
            match result {
                Ok(insights) => {
                    pull_requests.insert(number, insights);
                }
                Err(e) => {
                    tracing::warn!("Summary failed for PR #{}: {}", number, e);
                    failed.push(number);
                }
            }
        }

        Ok(RepositoryInsights {
            pull_requests,
            failed,
        })
    }
}

/// First tick lands one full period after start, since startup already
/// loaded data. Ticks missed during a slow refresh are not replayed.
fn refresh_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(round_days(values.iter().sum::<f64>() / values.len() as f64))
}
