//! HTTP poll source.

use crate::error::{QueueCallError, Result};
use crate::poll::{PollSource, QueueStatus, RosterEntry};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Fetches status and roster JSON from two URLs with one pooled client.
pub struct HttpPollSource {
    http: reqwest::Client,
    status_url: String,
    roster_url: String,
}

impl HttpPollSource {
    pub fn new(status_url: String, roster_url: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueueCallError::Poll {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            status_url,
            roster_url,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| QueueCallError::Poll {
                message: format!("GET {}: {}", url, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueueCallError::Poll {
                message: format!("GET {}: HTTP {}", url, status),
            });
        }

        let bytes = response.bytes().await.map_err(|e| QueueCallError::Poll {
            message: format!("GET {}: {}", url, e),
        })?;

        serde_json::from_slice(&bytes).map_err(|e| QueueCallError::Poll {
            message: format!("Invalid JSON from {}: {}", url, e),
        })
    }
}

#[async_trait::async_trait]
impl PollSource for HttpPollSource {
    async fn fetch_status(&self) -> Result<QueueStatus> {
        self.get_json(&self.status_url).await
    }

    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>> {
        let roster: Vec<RosterEntry> = self.get_json(&self.roster_url).await?;
        tracing::debug!(entries = roster.len(), "roster fetched");
        Ok(roster)
    }

    fn endpoint(&self) -> String {
        self.status_url.clone()
    }
}
