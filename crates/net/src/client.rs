//! HTTP client with connection pooling

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use kiln_config::NetworkConfig;
use kiln_errors::{Error, FetchError};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Network client configuration
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300), // source archives can be large
            connect_timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            user_agent: format!("kiln/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&NetworkConfig> for NetConfig {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout),
            connect_timeout: Duration::from_secs(config.connect_timeout),
            user_agent: config.user_agent.clone(),
            ..Self::default()
        }
    }
}

/// HTTP client wrapper
///
/// A single attempt per call; retrying is the caller's policy.
#[derive(Clone, Debug)]
pub struct NetClient {
    client: Client,
}

impl NetClient {
    /// Create a new network client
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to initialize.
    pub fn new(config: &NetConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Create with default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created with default settings.
    pub fn with_defaults() -> Result<Self, Error> {
        Self::new(&NetConfig::default())
    }

    /// GET `url` and collect the whole body
    ///
    /// # Errors
    ///
    /// Connection failures, timeouts, server errors and rate limiting are
    /// `FetchUnavailable`. Other non-success statuses mean the locator is
    /// wrong and are reported as `InvalidSource`.
    pub async fn get_bytes(&self, url: &str) -> Result<Bytes, Error> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| unavailable(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("HTTP {status}");
            return Err(if is_transient(status) {
                FetchError::FetchUnavailable {
                    uri: url.to_string(),
                    message,
                }
            } else {
                FetchError::InvalidSource {
                    uri: url.to_string(),
                    message,
                }
            }
            .into());
        }

        let capacity = response
            .content_length()
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(0);
        let mut body = BytesMut::with_capacity(capacity);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| unavailable(url, &e))?;
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(url, bytes = body.len(), "downloaded");
        Ok(body.freeze())
    }
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn unavailable(url: &str, error: &reqwest::Error) -> Error {
    let message = if error.is_timeout() {
        "timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    };
    FetchError::FetchUnavailable {
        uri: url.to_string(),
        message,
    }
    .into()
}
