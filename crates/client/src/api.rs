//! REST API client for the generation backend.
//!
//! Wraps the dashboard article endpoints and the SVD video endpoints
//! using [`reqwest`].

use crate::config::ClientConfig;
use crate::requests::{ArticleDraftRequest, GenerateVideoRequest};
use crate::wire::{GenerationJobResponse, JobStatusResponse, VideoJobResponse};

const VIDEOS_BASE: &str = "/videos-svd";
const DASHBOARD_BASE: &str = "/dashboard";

/// HTTP client for one generation backend.
pub struct GenerationApi {
    client: reqwest::Client,
    api_url: String,
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Generation API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl ClientError {
    /// Whether the backend answered 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }
}

impl GenerationApi {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Create an article draft (`POST /dashboard/generate-article`).
    pub async fn create_article_draft(
        &self,
        draft: &ArticleDraftRequest,
    ) -> Result<GenerationJobResponse, ClientError> {
        let response = self
            .client
            .post(self.url(&format!("{DASHBOARD_BASE}/generate-article")))
            .json(draft)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Start AI generation for an existing draft
    /// (`POST /dashboard/process-article/{articleId}`).
    pub async fn process_article(
        &self,
        article_id: &str,
    ) -> Result<GenerationJobResponse, ClientError> {
        let response = self
            .client
            .post(self.url(&format!("{DASHBOARD_BASE}/process-article/{article_id}")))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Status of a dashboard job (`GET /dashboard/jobs/{jobId}`).
    pub async fn dashboard_job_status(
        &self,
        job_id: &str,
    ) -> Result<JobStatusResponse, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("{DASHBOARD_BASE}/jobs/{job_id}")))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Queue an image-to-video synthesis (`POST /videos-svd/generate`).
    pub async fn generate_video(
        &self,
        request: &GenerateVideoRequest,
    ) -> Result<VideoJobResponse, ClientError> {
        let response = self
            .client
            .post(self.url(&format!("{VIDEOS_BASE}/generate")))
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Status of a video job (`GET /videos-svd/status/{jobId}`).
    pub async fn video_status(&self, job_id: &str) -> Result<VideoJobResponse, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("{VIDEOS_BASE}/status/{job_id}")))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Health of the video service (`GET /videos-svd/health`).
    pub async fn video_health(&self) -> Result<serde_json::Value, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("{VIDEOS_BASE}/health")))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ClientError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
