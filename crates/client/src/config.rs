/// Default base URL of the generation backend in local development.
pub const DEFAULT_API_URL: &str = "http://localhost:4000/api";

/// Connection settings for the remote generation service.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base HTTP URL including the `/api` prefix.
    pub api_url: String,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default                     |
    /// |----------------------|-----------------------------|
    /// | `GENERATION_API_URL` | `http://localhost:4000/api` |
    pub fn from_env() -> Self {
        let api_url = std::env::var("GENERATION_API_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Self::new(api_url)
    }

    /// Build a config for an explicit base URL. A trailing `/` is dropped.
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { api_url }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}
