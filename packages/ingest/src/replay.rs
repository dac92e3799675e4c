//! Replay source for NDJSON event files.
//!
//! Each line of the file is one [`RawEvent`](crate::RawEvent) in JSON.
//! Malformed lines are skipped with a warning so a partially corrupt
//! capture still replays. Used by demos and the pipeline's integration
//! tests.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use quakewatch_event_models::Event;
use tokio::sync::mpsc;

use crate::{EventSource, RawEvent, SourceError};

/// Event source replaying a captured NDJSON file.
pub struct ReplaySource {
    path: PathBuf,
    pace: Option<Duration>,
}

impl ReplaySource {
    /// Creates a replay source over the given file.
    ///
    /// `pace` inserts a delay between events to simulate a live stream;
    /// `None` replays as fast as the channel accepts.
    #[must_use]
    pub const fn new(path: PathBuf, pace: Option<Duration>) -> Self {
        Self { path, pace }
    }
}

#[async_trait]
impl EventSource for ReplaySource {
    async fn stream(&self, tx: mpsc::Sender<Event>) -> Result<(), SourceError> {
        let contents = tokio::fs::read_to_string(&self.path).await?;

        let mut sent = 0usize;
        for (number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let raw: RawEvent = match serde_json::from_str(line) {
                Ok(raw) => raw,
                Err(e) => {
                    log::warn!(
                        "Skipping malformed replay line {} in {}: {e}",
                        number + 1,
                        self.path.display()
                    );
                    continue;
                }
            };

            if tx.send(raw.into_event()).await.is_err() {
                return Ok(());
            }
            sent += 1;

            if let Some(pace) = self.pace {
                tokio::time::sleep(pace).await;
            }
        }

        log::info!("Replayed {sent} events from {}", self.path.display());
        Ok(())
    }
}
