//! The generation service seam.
//!
//! [`GenerationService`] is the only thing the job tracker knows about the
//! remote backend: one call to start a job and one call to ask for its
//! status. [`GenerationApi`] implements it over HTTP; tests substitute an
//! in-memory fake.

use async_trait::async_trait;
use serde::Serialize;
use validator::Validate;

use flowcontent_core::error::{PollError, SubmissionError};
use flowcontent_core::job::{JobKind, StatusReport, Submission};
use flowcontent_core::types::JobId;

use crate::api::{ClientError, GenerationApi};
use crate::requests::{ArticleDraftRequest, GenerateVideoRequest};

/// A user action to start one generation job.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub kind: JobKind,
    /// Domain object the job produces, when it already exists.
    pub related_entity_id: Option<String>,
    /// Kind-specific request body, opaque to the tracker.
    pub payload: serde_json::Value,
}

impl SubmitRequest {
    pub fn new(kind: JobKind, payload: serde_json::Value) -> Self {
        Self {
            kind,
            related_entity_id: None,
            payload,
        }
    }

    pub fn with_related_entity(mut self, id: impl Into<String>) -> Self {
        self.related_entity_id = Some(id.into());
        self
    }

    /// Start generation for an existing article draft.
    pub fn article(article_id: impl Into<String>) -> Self {
        Self::new(JobKind::Article, serde_json::Value::Null).with_related_entity(article_id)
    }

    /// Create a new draft, then start generating it.
    pub fn article_draft(draft: &ArticleDraftRequest) -> Result<Self, SubmissionError> {
        Ok(Self::new(JobKind::Article, to_payload(draft)?))
    }

    /// Synthesize a video from an image.
    pub fn video(request: &GenerateVideoRequest) -> Result<Self, SubmissionError> {
        let mut submit = Self::new(JobKind::Video, to_payload(request)?);
        submit.related_entity_id = request.article_id.clone();
        Ok(submit)
    }
}

fn to_payload<T: Serialize>(value: &T) -> Result<serde_json::Value, SubmissionError> {
    serde_json::to_value(value).map_err(|e| SubmissionError::Invalid(e.to_string()))
}

/// Remote generation backend as seen by the job tracker.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Create a job. The job starts `pending` at progress 0.
    async fn submit(&self, request: &SubmitRequest) -> Result<Submission, SubmissionError>;

    /// Current status of a job.
    async fn status(&self, kind: JobKind, job_id: &JobId) -> Result<StatusReport, PollError>;
}

impl From<ClientError> for SubmissionError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Request(e) => SubmissionError::Transport(e.to_string()),
            ClientError::ApiError { status, body } => SubmissionError::Api { status, body },
        }
    }
}

impl From<ClientError> for PollError {
    fn from(e: ClientError) -> Self {
        if e.is_not_found() {
            PollError::NotFound
        } else {
            PollError::Transient(e.to_string())
        }
    }
}

/// Decode and validate a kind-specific payload.
fn parse_payload<T>(payload: &serde_json::Value) -> Result<T, SubmissionError>
where
    T: serde::de::DeserializeOwned + Validate,
{
    let parsed: T = serde_json::from_value(payload.clone())
        .map_err(|e| SubmissionError::Invalid(e.to_string()))?;
    parsed
        .validate()
        .map_err(|e| SubmissionError::Invalid(e.to_string()))?;
    Ok(parsed)
}

impl GenerationApi {
    async fn submit_article(&self, request: &SubmitRequest) -> Result<Submission, SubmissionError> {
        let article_id = match &request.related_entity_id {
            Some(id) => id.clone(),
            None => {
                let draft: ArticleDraftRequest = parse_payload(&request.payload)?;
                let article_id = self.create_article_draft(&draft).await?.into_article_id()?;
                tracing::info!(article_id = %article_id, "Article draft created");
                article_id
            }
        };

        self.process_article(&article_id)
            .await?
            .into_submission(Some(article_id))
    }

    async fn submit_video(&self, request: &SubmitRequest) -> Result<Submission, SubmissionError> {
        let mut video: GenerateVideoRequest = parse_payload(&request.payload)?;
        if video.article_id.is_none() {
            video.article_id = request.related_entity_id.clone();
        }
        let related = request
            .related_entity_id
            .clone()
            .or_else(|| video.article_id.clone());

        self.generate_video(&video).await?.into_submission(related)
    }
}

#[async_trait]
impl GenerationService for GenerationApi {
    async fn submit(&self, request: &SubmitRequest) -> Result<Submission, SubmissionError> {
        match request.kind {
            JobKind::Article => self.submit_article(request).await,
            JobKind::Video => self.submit_video(request).await,
            JobKind::Audio => Err(SubmissionError::UnsupportedKind(JobKind::Audio)),
        }
    }

    async fn status(&self, kind: JobKind, job_id: &JobId) -> Result<StatusReport, PollError> {
        match kind {
            JobKind::Video => self.video_status(job_id.as_str()).await?.into_report(),
            JobKind::Article | JobKind::Audio => self
                .dashboard_job_status(job_id.as_str())
                .await?
                .into_report(),
        }
    }
}
