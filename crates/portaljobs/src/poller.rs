//! Client side of the status contract: query until the job is terminal.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::PollError;
use crate::job::JobStatus;
use crate::status::{StatusFamily, StatusResponse};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, family: StatusFamily, job_id: &str) -> Result<StatusResponse, PollError>;
}

/// Queries `GET {base}/jobs/{family}/status?jobId=` on a running server.
pub struct HttpStatusSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpStatusSource {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self, family: StatusFamily, job_id: &str) -> Result<StatusResponse, PollError> {
        let url = format!("{}/jobs/{}/status", self.base_url, family.name());
        let response = self
            .client
            .get(&url)
            .query(&[("jobId", job_id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
            };
            return Err(PollError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

/// Fixed-interval poller. No backoff; `max_polls` of `None` polls forever.
#[derive(Debug, Clone)]
pub struct StatusPoller {
    pub interval: Duration,
    pub max_polls: Option<u32>,
}

impl Default for StatusPoller {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_polls: None,
        }
    }
}

impl StatusPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_polls: None,
        }
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    /// Polls until `completed` (returned) or `failed` (`PollError::JobFailed`).
    /// `on_tick` sees the progress and message of every response.
    pub async fn poll<S, F>(
        &self,
        source: &S,
        family: StatusFamily,
        job_id: &str,
        mut on_tick: F,
    ) -> Result<StatusResponse, PollError>
    where
        S: StatusSource + ?Sized,
        F: FnMut(u8, &str),
    {
        let mut polls = 0u32;
        loop {
            let response = source.fetch(family, job_id).await?;
            polls += 1;
            on_tick(response.progress, &response.message);

            match response.status {
                JobStatus::Completed => return Ok(response),
                JobStatus::Failed => {
                    let error = response
                        .error
                        .unwrap_or_else(|| "Unknown error".to_string());
                    return Err(PollError::JobFailed(error));
                }
                JobStatus::Starting | JobStatus::Processing => {}
            }

            if self.max_polls.is_some_and(|max| polls >= max) {
                return Err(PollError::Exhausted(polls));
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
