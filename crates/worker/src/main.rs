//! `flowcontent-worker` -- submit or adopt generation jobs and follow them
//! to completion.
//!
//! Starts a [`JobTracker`] against the remote generation service, hands it
//! one job from the command line, and logs every job event until all
//! tracked jobs are terminal or the process receives Ctrl-C.
//!
//! # Environment variables
//!
//! | Variable                  | Default                     | Description                   |
//! |---------------------------|-----------------------------|-------------------------------|
//! | `GENERATION_API_URL`      | `http://localhost:4000/api` | Remote service base URL       |
//! | `POLL_INTERVAL_MS`        | `3000`                      | Status poll interval          |
//! | `POLL_REQUEST_TIMEOUT_MS` | `10000`                     | Per-request timeout, `0` off  |
//! | `DEGRADED_AFTER_FAILURES` | `5`                         | Failures before degraded      |
//! | `JOB_RETENTION_SECS`      | --                          | Purge finished jobs after     |
//! | `RETENTION_SWEEP_SECS`    | `60`                        | Retention sweep interval      |
//! | `LOG_FORMAT`              | `text`                      | `json` for structured output  |

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flowcontent_client::requests::{
    ArticleDraftRequest, GenerateVideoRequest, DEFAULT_FPS, DEFAULT_FRAMES,
    DEFAULT_MOTION_BUCKET_ID,
};
use flowcontent_client::{ClientConfig, GenerationApi, GenerationService, SubmitRequest};
use flowcontent_core::error::SubmissionError;
use flowcontent_core::job::{JobKind, JobRecord, JobStatus};
use flowcontent_events::JobEvent;
use flowcontent_tracker::{JobTracker, TrackerConfig};

/// Follow content generation jobs until they finish.
#[derive(Parser)]
#[command(name = "flowcontent-worker", version, about = "Track content generation jobs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate an article: an existing draft by id, or a new one from --title/--topic
    SubmitArticle {
        /// Id of an existing article draft
        #[arg(long, conflicts_with_all = ["title", "topic"])]
        article_id: Option<String>,
        #[arg(long, requires = "topic")]
        title: Option<String>,
        #[arg(long, requires = "title")]
        topic: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        category: String,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long, default_value = "")]
        author: String,
    },

    /// Synthesize a short video from a still image
    SubmitVideo {
        #[arg(long)]
        image_url: String,
        #[arg(long, default_value_t = DEFAULT_MOTION_BUCKET_ID)]
        motion_bucket_id: u16,
        #[arg(long, default_value_t = DEFAULT_FPS)]
        fps: u16,
        #[arg(long, default_value_t = DEFAULT_FRAMES)]
        frames: u16,
        /// Article the video belongs to
        #[arg(long)]
        article_id: Option<String>,
        #[arg(long)]
        domain_id: Option<String>,
    },

    /// Follow a job that was started elsewhere
    Track {
        /// article, video or audio
        #[arg(long)]
        kind: JobKind,
        #[arg(long)]
        job_id: String,
        #[arg(long)]
        related_entity_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let client_config = ClientConfig::from_env();
    let tracker_config = TrackerConfig::from_env();

    tracing::info!(
        api_url = %client_config.api_url,
        poll_interval_ms = tracker_config.poll_interval.as_millis() as u64,
        "Starting flowcontent-worker",
    );

    let api = GenerationApi::new(&client_config);
    match api.video_health().await {
        Ok(health) => tracing::info!(health = %health, "Video service reachable"),
        Err(e) => tracing::warn!(error = %e, "Video service health check failed"),
    }

    let service: Arc<dyn GenerationService> = Arc::new(api);
    let tracker =
        JobTracker::start(service, tracker_config).context("invalid tracker configuration")?;
    let mut events = tracker.subscribe();

    let outcome = match start_job(&tracker, cli.command).await {
        Ok(job) => {
            tracing::info!(job_id = %job.id, kind = %job.kind, "Following job");
            follow(&tracker, &mut events).await
        }
        Err(e) => Err(anyhow::Error::new(e).context("could not start job")),
    };

    tracker.stop().await;
    outcome
}

/// Install the global subscriber. `LOG_FORMAT=json` emits JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "flowcontent_worker=info,flowcontent_tracker=info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn start_job(tracker: &JobTracker, command: Command) -> Result<JobRecord, SubmissionError> {
    match command {
        Command::SubmitArticle {
            article_id: Some(article_id),
            ..
        } => tracker.submit(&SubmitRequest::article(article_id)).await,
        Command::SubmitArticle {
            article_id: None,
            title,
            topic,
            description,
            category,
            tags,
            author,
        } => {
            let topic = topic.unwrap_or_default();
            let draft = ArticleDraftRequest {
                title: title.unwrap_or_default(),
                original_topic: topic.clone(),
                topic,
                description,
                category,
                domain: "dashboard".to_string(),
                tags,
                author,
            };
            tracker.submit(&SubmitRequest::article_draft(&draft)?).await
        }
        Command::SubmitVideo {
            image_url,
            motion_bucket_id,
            fps,
            frames,
            article_id,
            domain_id,
        } => {
            let request = GenerateVideoRequest {
                motion_bucket_id,
                fps,
                frames,
                article_id,
                domain_id,
                ..GenerateVideoRequest::new(image_url)
            };
            tracker.submit(&SubmitRequest::video(&request)?).await
        }
        Command::Track {
            kind,
            job_id,
            related_entity_id,
        } => tracker.track(job_id, kind, related_entity_id).await,
    }
}

/// Log events until no job is active. Fails if any job failed.
async fn follow(
    tracker: &JobTracker,
    events: &mut broadcast::Receiver<JobEvent>,
) -> anyhow::Result<()> {
    let mut failed = 0usize;

    while !tracker.list_active().await.is_empty() {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping tracker");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => failed += log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event stream lagged, recounting failures");
                    failed = failed.max(failed_jobs(&tracker.list().await));
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    // Events published alongside the last terminal transition.
    while let Ok(event) = events.try_recv() {
        failed += log_event(&event);
    }
    failed = failed.max(failed_jobs(&tracker.list().await));

    if failed > 0 {
        anyhow::bail!("{failed} job(s) failed");
    }
    Ok(())
}

/// Log one event. Returns 1 for a job failure, 0 otherwise.
fn log_event(event: &JobEvent) -> usize {
    match event {
        JobEvent::JobUpdated { job } => tracing::info!(
            job_id = %job.id,
            status = %job.status,
            progress = job.progress,
            "Job progress",
        ),
        JobEvent::JobSucceeded { job } => tracing::info!(
            job_id = %job.id,
            output_url = job.output_url.as_deref(),
            "Job succeeded",
        ),
        JobEvent::JobFailed { job } => tracing::error!(
            job_id = %job.id,
            error = job.last_error.as_deref(),
            "Job failed",
        ),
        other => tracing::info!(
            event_type = other.event_type(),
            job_id = %other.job_id(),
            "Job event",
        ),
    }

    if let Ok(json) = serde_json::to_string(event) {
        tracing::debug!(event = %json, "Job event payload");
    }
    usize::from(matches!(event, JobEvent::JobFailed { .. }))
}

/// Tracked jobs that ended in failure.
fn failed_jobs(jobs: &[JobRecord]) -> usize {
    jobs.iter()
        .filter(|job| job.status == JobStatus::Error)
        .count()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use flowcontent_core::types::JobId;

    use super::*;

    fn job(id: &str, status: JobStatus) -> JobRecord {
        JobRecord {
            status,
            ..JobRecord::pending(JobId::new(id), JobKind::Video, None, Utc::now())
        }
    }

    #[test]
    fn only_errored_jobs_count_as_failed() {
        let jobs = vec![
            job("J1", JobStatus::Error),
            job("J2", JobStatus::Completed),
            job("J3", JobStatus::Generating),
            job("J4", JobStatus::Error),
        ];
        assert_eq!(failed_jobs(&jobs), 2);
        assert_eq!(failed_jobs(&[]), 0);
    }

    #[test]
    fn failure_events_are_counted() {
        let failed = job("J1", JobStatus::Error);
        let done = job("J2", JobStatus::Completed);
        assert_eq!(log_event(&JobEvent::JobFailed { job: failed }), 1);
        assert_eq!(log_event(&JobEvent::JobSucceeded { job: done }), 0);
    }
}
