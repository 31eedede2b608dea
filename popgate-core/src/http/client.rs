use std::time::Duration;

use reqwest::{header::HeaderMap, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::{
    error::HttpError,
    retry::{with_retry, RetryConfig, RetryError},
};

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    default_timeout: Duration,
    retry_config: RetryConfig,
}

#[derive(Default)]
pub struct HttpClientBuilder {
    timeout: Option<Duration>,
    retry_config: Option<RetryConfig>,
    headers: Option<HeaderMap>,
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = Some(retry_config);
        self
    }

    pub fn with_default_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn build(self) -> anyhow::Result<HttpClient> {
        let mut client_builder = reqwest::Client::builder();

        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }
        if let Some(headers) = self.headers {
            client_builder = client_builder.default_headers(headers);
        }

        Ok(HttpClient {
            client: client_builder.build()?,
            default_timeout: self.timeout.unwrap_or(Duration::from_secs(10)),
            retry_config: self.retry_config.unwrap_or_default(),
        })
    }
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Turn a non-2xx response into an [`HttpError::Http`], using the
    /// body's `message` or `errors` field when there is one.
    async fn error_from_response(response: Response) -> HttpError {
        let status = response.status();
        let message = match response.text().await {
            Ok(body) => match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(json) => json
                    .get("message")
                    .or_else(|| json.get("errors"))
                    .map(|m| match m.as_str() {
                        Some(s) => s.to_string(),
                        None => m.to_string(),
                    })
                    .unwrap_or(body),
                Err(_) if !body.is_empty() && body.len() < 500 => body,
                Err(_) => status.to_string(),
            },
            Err(_) => status.to_string(),
        };
        HttpError::from_status(status, message)
    }

    /// POST a JSON body with extra headers and decode the JSON response
    pub async fn post_json_with_headers<T, R>(
        &self,
        url: &str,
        headers: &HeaderMap,
        body: &T,
    ) -> Result<R, RetryError>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        debug!("POST request to {}", url);
        with_retry(
            || async {
                let response = self
                    .client
                    .post(url)
                    .timeout(self.default_timeout)
                    .headers(headers.clone())
                    .json(body)
                    .send()
                    .await?;

                if !response.status().is_success() {
                    return Err(Self::error_from_response(response).await);
                }

                response
                    .json::<R>()
                    .await
                    .map_err(|e| HttpError::ParseError(e.to_string()))
            },
            &self.retry_config,
        )
        .await
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }
}
