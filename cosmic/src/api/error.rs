use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Error envelope returned by the control plane
    #[error("CloudStack API error {code} (CSExceptionErrorCode: {cs_code}): {message}")]
    ApiError {
        code: i64,
        cs_code: i64,
        message: String,
    },

    #[error("API returned HTTP {status}: {message}")]
    HttpError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Timeout while waiting for async job {job_id} to finish ({seconds} seconds)")]
    AsyncTimeout { job_id: String, seconds: u64 },

    #[error("Operation cancelled while waiting for async job {0}")]
    Cancelled(String),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),
}

impl ApiError {
    /// The control plane reports a missing entity as a malformed id
    pub fn is_entity_gone(&self, id: &str) -> bool {
        self.to_string().contains(&format!(
            "Invalid parameter id value={} due to incorrect long value format, \
             or entity does not exist",
            id
        ))
    }

    pub fn is_async_timeout(&self) -> bool {
        matches!(self, ApiError::AsyncTimeout { .. })
    }
}
