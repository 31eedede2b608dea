use std::{future::Future, time::Duration};

use tokio::time::sleep;
use tracing::warn;

use super::error::HttpError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, the first call included
    pub max_attempts: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 500,
            max_delay_ms: 8000,
        }
    }
}

impl RetryConfig {
    /// A single attempt, for calls that are not safe to repeat
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    #[error("Exhausted all {attempts} attempts: {error}")]
    ExhaustedRetries { error: HttpError, attempts: usize },
    #[error("Non-retriable error: {0}")]
    NonRetriable(HttpError),
}

impl RetryError {
    pub fn http_error(&self) -> &HttpError {
        match self {
            Self::ExhaustedRetries { error, .. } => error,
            Self::NonRetriable(error) => error,
        }
    }

    pub fn into_http_error(self) -> HttpError {
        match self {
            Self::ExhaustedRetries { error, .. } => error,
            Self::NonRetriable(error) => error,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.http_error().status_code()
    }
}

/// Server errors and transport failures are retried, everything else is final.
pub fn is_retriable_error(err: &HttpError) -> bool {
    match err {
        HttpError::Http { status, .. } => (500..600).contains(status),
        HttpError::Network(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.is_request()
                || e.status().is_some_and(|s| s.is_server_error())
        }
        HttpError::Timeout => true,
        HttpError::ParseError(_) => false,
    }
}

/// Run `f` until it succeeds, fails with a non-retriable error, or
/// `max_attempts` is used up. Delays double up to `max_delay_ms`.
pub async fn with_retry<F, Fut, T>(f: F, config: &RetryConfig) -> Result<T, RetryError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, HttpError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    let mut delay = config.initial_delay_ms;

    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if !is_retriable_error(&err) => return Err(RetryError::NonRetriable(err)),
            Err(err) if attempt >= max_attempts => {
                return Err(RetryError::ExhaustedRetries {
                    error: err,
                    attempts: attempt,
                })
            }
            Err(err) => {
                warn!(
                    "Request failed (attempt {}/{}), retrying in {}ms: {}",
                    attempt, max_attempts, delay, err
                );
                sleep(Duration::from_millis(delay)).await;
                delay = (delay * 2).min(config.max_delay_ms);
            }
        }
    }
}
