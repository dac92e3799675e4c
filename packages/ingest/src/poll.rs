//! Polling source for a live JSON event endpoint.
//!
//! Fetches batches of raw reports on a fixed interval, carrying a `since`
//! cursor so each poll only returns reports newer than the last one seen.
//! Transient fetch failures are retried with exponential backoff and never
//! take the stage down.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quakewatch_event_models::Event;
use tokio::sync::mpsc;

use crate::{EventSource, RawEvent, SourceCredentials, SourceError};

/// Maximum retry attempts per poll before waiting for the next interval.
const MAX_RETRIES: u32 = 5;

/// Base delay for exponential backoff: 2s, 4s, 8s, 16s, 32s.
const BACKOFF_BASE_SECS: u64 = 2;

/// Configuration for [`HttpPollSource`].
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Endpoint returning a JSON array of raw events.
    pub endpoint: String,
    /// Terms the endpoint should track, sent as a `track` query parameter.
    pub track: Vec<String>,
    /// Delay between polls.
    pub interval: Duration,
}

/// Event source polling an authenticated JSON endpoint.
pub struct HttpPollSource {
    client: reqwest::Client,
    config: PollConfig,
    credentials: SourceCredentials,
}

impl HttpPollSource {
    /// Builds the source with its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the client cannot be constructed.
    pub fn new(config: PollConfig, credentials: SourceCredentials) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    /// Fetches one page of events newer than `since`, retrying transient
    /// failures with exponential backoff.
    async fn fetch_page(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawEvent>, SourceError> {
        let track = self.config.track.join(",");
        let mut last_error: Option<SourceError> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_secs(BACKOFF_BASE_SECS.pow(attempt));
                log::warn!(
                    "Poll attempt {attempt}/{MAX_RETRIES} failed, retrying in {}s",
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .get(&self.config.endpoint)
                .bearer_auth(&self.credentials.bearer_token)
                .query(&[("track", track.as_str())]);
            if let Some(since) = since {
                request = request.query(&[("since", since.to_rfc3339())]);
            }

            match request.send().await {
                Ok(response) => match response.error_for_status() {
                    Ok(response) => match response.json::<Vec<RawEvent>>().await {
                        Ok(events) => return Ok(events),
                        Err(e) => last_error = Some(e.into()),
                    },
                    Err(e) => last_error = Some(e.into()),
                },
                Err(e) => last_error = Some(e.into()),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SourceError::Io(std::io::Error::other("poll retries exhausted"))
        }))
    }
}

#[async_trait]
impl EventSource for HttpPollSource {
    async fn stream(&self, tx: mpsc::Sender<Event>) -> Result<(), SourceError> {
        let mut since: Option<DateTime<Utc>> = None;

        loop {
            match self.fetch_page(since).await {
                Ok(raw_events) => {
                    if let Some(newest) = raw_events.iter().map(|e| e.created_at).max() {
                        since = Some(since.map_or(newest, |s| s.max(newest)));
                    }
                    log::debug!("Poll returned {} events", raw_events.len());

                    for raw in raw_events {
                        if tx.send(raw.into_event()).await.is_err() {
                            // Receiver gone: the pipeline is shutting down.
                            return Ok(());
                        }
                    }
                }
                Err(e) => {
                    // Transient by policy: keep the stage alive and poll
                    // again on the next interval.
                    log::error!("Poll failed after retries: {e}");
                }
            }

            tokio::time::sleep(self.config.interval).await;
        }
    }
}
