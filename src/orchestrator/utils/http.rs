//! Minimal HTTP GET client for backend artifacts.
//!
//! Backends may take a long time to answer while they compile, so the client never
//! applies a request timeout and keeps idle connections open indefinitely. There
//! is no retry here; retry policy belongs to the caller.

use crate::orchestrator::error::{RequestError, Result};
use reqwest::StatusCode;

/// Shared GET client. Cloning is cheap and shares the connection pool.
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Creates a fetcher without request or idle timeouts.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(None)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self { client }
    }

    /// Fetches `url` and returns the full body as text.
    ///
    /// Resolves only when the status is exactly 200. Any other status becomes a
    /// [`RequestError::Backend`] carrying the body as diagnostic text.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        log::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| RequestError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| RequestError::Transport {
                url: url.to_string(),
                source,
            })?;

        if status == StatusCode::OK {
            Ok(body)
        } else {
            Err(RequestError::Backend {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            })
        }
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}
