use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use prtimeline::config::parse_repository;
use prtimeline::models::{
    EnhancedTimelineResult, RepositoryInsights, RepositoryMetrics, SnapshotFile,
};
use prtimeline::{
    AnalysisPipeline, ClaudeProvider, Config, GitHubClient, MonitorConfig, MonitorEvent,
};

#[derive(Parser, Debug)]
#[command(name = "prtimeline")]
#[command(version = "0.1.0")]
#[command(about = "Reconstruct and validate pull request review timelines")]
struct Args {
    /// Repository to analyze (owner/name); falls back to GITHUB_REPOSITORY
    #[arg(short, long)]
    repo: Option<String>,

    /// Single pull request number (all pull requests when omitted)
    #[arg(short, long)]
    pr: Option<u64>,

    /// Read pull requests, reviews and comments from a JSON snapshot instead of GitHub
    #[arg(short, long)]
    input: Option<String>,

    /// Output format (json, text, markdown)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<String>,

    /// Include repository-wide review metrics
    #[arg(long)]
    metrics: bool,

    /// Include discussion summaries (requires ANTHROPIC_API_KEY)
    #[arg(long)]
    insights: bool,

    /// Keep running and re-report after every background refresh
    #[arg(long)]
    watch: bool,
}

#[derive(Serialize)]
struct Report {
    timelines: Vec<EnhancedTimelineResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<RepositoryMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    insights: Option<RepositoryInsights>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("prtimeline=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = Config::from_env()?;

    let mut pipeline = AnalysisPipeline::new(MonitorConfig::from(&config));
    if let Some(ref key) = config.anthropic_api_key {
        pipeline = pipeline.with_summarizer(ClaudeProvider::new(key.clone(), None)?);
    }

    if let Some(ref path) = args.input {
        let raw = std::fs::read_to_string(path)?;
        let snapshot: SnapshotFile = serde_json::from_str(&raw)?;
        tracing::info!("Loaded snapshot from {}", path);
        pipeline.load_snapshot(snapshot);
    } else {
        let repository = args
            .repo
            .clone()
            .or_else(|| config.repository.clone())
            .ok_or_else(|| anyhow::anyhow!("Pass --repo owner/name or set GITHUB_REPOSITORY"))?;
        let (owner, repo) = parse_repository(&repository)?;
        let github = GitHubClient::new(config.require_github_token()?)?;

        pipeline = pipeline.with_github(github, &owner, &repo);
        tracing::info!("Fetching review history for {}/{}", owner, repo);
        pipeline.refresh().await?;
    }

    let pipeline = Arc::new(pipeline);
    output_report(&build_report(&pipeline, &args).await?, &args)?;

    if args.watch {
        if args.input.is_some() {
            anyhow::bail!("--watch needs a live repository, not --input");
        }
        watch(pipeline, &args).await?;
    }

    Ok(())
}

async fn watch(pipeline: Arc<AnalysisPipeline>, args: &Args) -> anyhow::Result<()> {
    let mut events = pipeline.subscribe();
    let interval = pipeline.refresh_interval();
    let handle = pipeline.clone().spawn_refresh_loop(interval);
    tracing::info!("Watching for changes every {}s", interval.as_secs());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(MonitorEvent::SnapshotRefreshed { generation, .. }) => {
                    tracing::debug!("Reporting generation {}", generation);
                    output_report(&build_report(&pipeline, args).await?, args)?;
                }
                Ok(MonitorEvent::InsightsRefreshed { version }) => {
                    tracing::debug!("Insights refreshed for version {}", version);
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Missed {} monitor events", missed);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.abort();
    Ok(())
}

async fn build_report(pipeline: &AnalysisPipeline, args: &Args) -> anyhow::Result<Report> {
    let timelines = match args.pr {
        Some(number) => vec![pipeline.enhanced_timeline(number)?],
        None => pipeline.all_timelines_at(chrono::Utc::now())?,
    };

    let metrics = if args.metrics {
        Some(pipeline.repository_metrics()?)
    } else {
        None
    };

    let insights = if args.insights {
        Some(pipeline.insights().await?)
    } else {
        None
    };

    Ok(Report {
        timelines,
        metrics,
        insights,
    })
}

fn output_report(report: &Report, args: &Args) -> anyhow::Result<()> {
    let output = match args.format.as_str() {
        "json" => serde_json::to_string_pretty(report)?,
        "markdown" => format_markdown(report),
        _ => format_text(report),
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output)?;
        tracing::info!("Output written to: {}", path);
    } else {
        println!("{}", output);
    }

    Ok(())
}

fn format_text(report: &Report) -> String {
    let mut output = String::new();

    for entry in &report.timelines {
        let timeline = &entry.timeline;
        output.push_str(&format!(
            "\n=== PR #{}: {} ({}) ===\n\n",
            timeline.pr_number, timeline.pr_title, timeline.pr_author
        ));

        output.push_str(&format!(
            "Total duration: {:.1} days{}\n",
            timeline.total_duration,
            if timeline.is_completed { "" } else { " (ongoing)" }
        ));
        output.push_str(&format!(
            "Confidence: {:.0}% ({} quality){}\n\n",
            entry.validation.confidence_score * 100.0,
            entry.validation.data_quality,
            if entry.validation.is_valid { "" } else { " - unreliable" }
        ));

        output.push_str("Stages:\n");
        for stage in &timeline.stages {
            match stage.duration_from_previous {
                Some(days) => output.push_str(&format!(
                    "  {:<16} {}  (+{:.1}d)\n",
                    stage.stage.as_str(),
                    stage.timestamp.format("%Y-%m-%d %H:%M UTC"),
                    days
                )),
                None => output.push_str(&format!(
                    "  {:<16} {}\n",
                    stage.stage.as_str(),
                    stage.timestamp.format("%Y-%m-%d %H:%M UTC")
                )),
            }
        }

        if !entry.review_cycles.is_empty() {
            output.push_str("\nReview cycles:\n");
            for cycle in &entry.review_cycles {
                let resolution = match cycle.duration {
                    Some(days) => format!("resolved after {:.1}d", days),
                    None => "unresolved".to_string(),
                };
                output.push_str(&format!(
                    "  #{} requested by {}: {}\n",
                    cycle.cycle_number, cycle.reviewer, resolution
                ));
            }
        }

        if !entry.validation.issues.is_empty() {
            output.push_str("\nIssues:\n");
            for issue in &entry.validation.issues {
                output.push_str(&format!("  ! {}\n", issue));
            }
        }
    }

    if let Some(ref metrics) = report.metrics {
        output.push_str("\n=== Repository Metrics ===\n\n");
        output.push_str(&format!(
            "Pull requests: {} ({} open, {} merged, {} closed)\n",
            metrics.total_pull_requests, metrics.open, metrics.merged, metrics.closed
        ));
        output.push_str(&format!(
            "Avg time to first review: {}\n",
            format_days(metrics.avg_time_to_first_review)
        ));
        output.push_str(&format!(
            "Avg time to approval: {}\n",
            format_days(metrics.avg_time_to_approval)
        ));
        output.push_str(&format!(
            "Avg review cycles: {:.1}\n",
            metrics.avg_review_cycles
        ));
        output.push_str(&format!(
            "Avg confidence: {:.0}% ({} low quality)\n",
            metrics.avg_confidence * 100.0,
            metrics.low_quality_timelines
        ));
    }

    if let Some(ref insights) = report.insights {
        output.push_str("\n=== Discussion Insights ===\n");
        for (number, pr) in &insights.pull_requests {
            output.push_str(&format!("\nPR #{} [{}]: {}\n", number, pr.strategy, pr.summary));
            if !pr.themes.is_empty() {
                output.push_str(&format!("  Themes: {}\n", pr.themes.join(", ")));
            }
            for concern in &pr.concerns {
                output.push_str(&format!("  - {}\n", concern));
            }
        }
        if !insights.failed.is_empty() {
            output.push_str(&format!(
                "\nNo summary for: {}\n",
                join_numbers(&insights.failed)
            ));
        }
    }

    output
}

fn format_markdown(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# Review Timelines\n");

    for entry in &report.timelines {
        let timeline = &entry.timeline;
        output.push_str(&format!(
            "\n## #{} {}\n\n",
            timeline.pr_number, timeline.pr_title
        ));
        output.push_str(&format!(
            "**Author:** {} | **Duration:** {:.1} days | **Confidence:** {:.0}% ({})\n\n",
            timeline.pr_author,
            timeline.total_duration,
            entry.validation.confidence_score * 100.0,
            entry.validation.data_quality
        ));

        output.push_str("| Stage | Timestamp | Since Previous |\n");
        output.push_str("|-------|-----------|----------------|\n");
        for stage in &timeline.stages {
            output.push_str(&format!(
                "| {} | {} | {} |\n",
                stage.stage.as_str(),
                stage.timestamp.format("%Y-%m-%d %H:%M UTC"),
                format_days(stage.duration_from_previous)
            ));
        }

        if !entry.validation.issues.is_empty() {
            output.push_str("\n**Issues**\n\n");
            for issue in &entry.validation.issues {
                output.push_str(&format!("- {}\n", issue));
            }
        }
    }

    if let Some(ref metrics) = report.metrics {
        output.push_str("\n## Repository Metrics\n\n");
        output.push_str("| Metric | Value |\n|--------|-------|\n");
        output.push_str(&format!(
            "| Pull Requests | {} |\n",
            metrics.total_pull_requests
        ));
        output.push_str(&format!(
            "| Open / Merged / Closed | {} / {} / {} |\n",
            metrics.open, metrics.merged, metrics.closed
        ));
        output.push_str(&format!(
            "| Avg Time to First Review | {} |\n",
            format_days(metrics.avg_time_to_first_review)
        ));
        output.push_str(&format!(
            "| Avg Time to Approval | {} |\n",
            format_days(metrics.avg_time_to_approval)
        ));
        output.push_str(&format!(
            "| Avg Review Cycles | {:.1} |\n",
            metrics.avg_review_cycles
        ));
        output.push_str(&format!(
            "| Avg Confidence | {:.0}% |\n",
            metrics.avg_confidence * 100.0
        ));
    }

    if let Some(ref insights) = report.insights {
        output.push_str("\n## Discussion Insights\n");
        for (number, pr) in &insights.pull_requests {
            output.push_str(&format!("\n### #{} ({})\n\n{}\n", number, pr.strategy, pr.summary));
            for concern in &pr.concerns {
                output.push_str(&format!("- {}\n", concern));
            }
        }
        if !insights.failed.is_empty() {
            output.push_str(&format!(
                "\n*No summary for {}*\n",
                join_numbers(&insights.failed)
            ));
        }
    }

    output
}

fn format_days(days: Option<f64>) -> String {
    days.map(|d| format!("{:.1}d", d))
        .unwrap_or_else(|| "n/a".to_string())
}

fn join_numbers(numbers: &[u64]) -> String {
    numbers
        .iter()
        .map(|n| format!("#{}", n))
        .collect::<Vec<_>>()
        .join(", ")
}
