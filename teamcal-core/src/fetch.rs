//! ICS feed retrieval.

use async_trait::async_trait;

use crate::error::{TeamcalError, TeamcalResult};

/// Retrieves raw ICS text for a feed URL. No retries at this layer;
/// retry-on-transient-failure belongs to the caller.
#[async_trait]
pub trait FetchIcs: Send + Sync {
    async fn fetch(&self, url: &str) -> TeamcalResult<String>;
}

/// HTTP(S) fetcher backed by a shared reqwest client.
#[derive(Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FetchIcs for HttpFetcher {
    async fn fetch(&self, url: &str) -> TeamcalResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TeamcalError::Transport {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TeamcalError::Transport {
                status: Some(status.as_u16()),
                message: format!("feed returned HTTP {}", status.as_u16()),
            });
        }

        response.text().await.map_err(|e| TeamcalError::Transport {
            status: None,
            message: e.to_string(),
        })
    }
}
