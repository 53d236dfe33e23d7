use std::time::Duration;

/// Default scheduler tick interval.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
/// Default per-request timeout for status polls.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
/// Default number of consecutive transient failures before a degraded event.
pub const DEFAULT_DEGRADED_AFTER_FAILURES: u32 = 5;
/// Default interval of the retention sweeper.
pub const DEFAULT_RETENTION_SWEEP_SECS: u64 = 60;

/// Tuning for the job tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Time between scheduler ticks.
    pub poll_interval: Duration,
    /// Upper bound on a single status request. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Consecutive transient poll failures that trigger a degraded event.
    pub degraded_after_failures: u32,
    /// Terminal jobs older than this are purged. `None` keeps them until
    /// they are cancelled.
    pub retention: Option<Duration>,
    /// How often the retention sweeper runs.
    pub retention_sweep_interval: Duration,
}

/// Rejected configuration values.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("degraded threshold must be at least one failure")]
    ZeroDegradedThreshold,

    #[error("retention sweep interval must be greater than zero")]
    ZeroSweepInterval,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            request_timeout: Some(Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)),
            degraded_after_failures: DEFAULT_DEGRADED_AFTER_FAILURES,
            retention: None,
            retention_sweep_interval: Duration::from_secs(DEFAULT_RETENTION_SWEEP_SECS),
        }
    }
}

impl TrackerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `POLL_INTERVAL_MS`        | `3000`  |
    /// | `POLL_REQUEST_TIMEOUT_MS` | `10000` (`0` disables) |
    /// | `DEGRADED_AFTER_FAILURES` | `5`     |
    /// | `JOB_RETENTION_SECS`      | unset   |
    /// | `RETENTION_SWEEP_SECS`    | `60`    |
    ///
    /// Unparsable values are logged and replaced by the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let poll_interval = parse_u64(&lookup, "POLL_INTERVAL_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);

        let request_timeout = match parse_u64(&lookup, "POLL_REQUEST_TIMEOUT_MS") {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.request_timeout,
        };

        let degraded_after_failures = parse_u32(&lookup, "DEGRADED_AFTER_FAILURES")
            .unwrap_or(defaults.degraded_after_failures);

        let retention = parse_u64(&lookup, "JOB_RETENTION_SECS").map(Duration::from_secs);

        let retention_sweep_interval = parse_u64(&lookup, "RETENTION_SWEEP_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.retention_sweep_interval);

        Self {
            poll_interval,
            request_timeout,
            degraded_after_failures,
            retention,
            retention_sweep_interval,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.degraded_after_failures == 0 {
            return Err(ConfigError::ZeroDegradedThreshold);
        }
        if self.retention.is_some() && self.retention_sweep_interval.is_zero() {
            return Err(ConfigError::ZeroSweepInterval);
        }
        Ok(())
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}

fn parse_u32(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u32> {
    let value = parse_u64(lookup, key)?;
    match u32::try_from(value) {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value, "Ignoring out-of-range configuration value");
            None
        }
    }
}
