#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Event report ingestion.
//!
//! The ingest stage of the pipeline is a pass-through: an [`EventSource`]
//! pushes every report it obtains into the raw hand-off channel, and the
//! filter stage takes it from there. Two sources ship here:
//! [`poll::HttpPollSource`] for a live JSON endpoint, and
//! [`replay::ReplaySource`] for NDJSON files in demos and tests.

pub mod poll;
pub mod replay;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quakewatch_event_models::Event;
use serde::Deserialize;
use tokio::sync::mpsc;

/// Error raised by an event source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Credentials for an authenticated event endpoint.
///
/// Always constructed explicitly and handed to the source at build time;
/// nothing reads tokens from process-wide state.
#[derive(Clone)]
pub struct SourceCredentials {
    /// Bearer token presented on every poll request.
    pub bearer_token: String,
}

impl std::fmt::Debug for SourceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCredentials")
            .field("bearer_token", &"<redacted>")
            .finish()
    }
}

/// A stream of raw event reports.
///
/// `stream` runs until the source is exhausted or the receiving side of
/// the channel closes; a closed channel is the pipeline's shutdown signal
/// and is not an error.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Pushes events into `tx` as they arrive.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] only for failures that make the source
    /// unusable (an unreadable replay file); transient fetch errors are
    /// logged and retried internally.
    async fn stream(&self, tx: mpsc::Sender<Event>) -> Result<(), SourceError>;
}

/// Wire/replay representation of one event report.
///
/// The position comes from exact `coordinates` when present, otherwise
/// from the first corner of the report's place bounding box; reports with
/// neither yield an event without a coordinate.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Source-assigned identifier, if any.
    pub id: Option<String>,
    /// Report text.
    pub text: String,
    /// Report author display name.
    pub author: String,
    /// Post time.
    pub created_at: DateTime<Utc>,
    /// Exact `(lon, lat)` position.
    pub coordinates: Option<[f64; 2]>,
    /// Place bounding box corners, `(lon, lat)` each.
    pub bounding_box: Option<Vec<[f64; 2]>>,
    /// Human-readable place name.
    pub place: Option<String>,
}

impl RawEvent {
    /// Converts the wire representation into an [`Event`], synthesizing an
    /// id when the source did not provide one.
    #[must_use]
    pub fn into_event(self) -> Event {
        let id = self
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let coordinate = self
            .coordinates
            .or_else(|| self.bounding_box.as_ref().and_then(|b| b.first().copied()));

        let mut event = Event::new(id, self.text, self.author, self.created_at);
        if let Some([lon, lat]) = coordinate {
            event = event.with_coordinate(lon, lat);
        }
        if let Some(place) = self.place {
            event = event.with_place(place);
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_coordinates_win_over_bounding_box() {
        let raw: RawEvent = serde_json::from_str(
            r#"{
                "id": "42",
                "text": "scossa adesso",
                "author": "anna",
                "createdAt": "2024-08-24T03:36:00Z",
                "coordinates": [13.17, 42.24],
                "boundingBox": [[12.0, 41.0], [14.0, 41.0], [14.0, 43.0], [12.0, 43.0]],
                "place": "Accumoli"
            }"#,
        )
        .unwrap();

        let event = raw.into_event();
        assert_eq!(event.id, "42");
        assert_eq!(event.coordinate, Some(geo::Point::new(13.17, 42.24)));
        assert_eq!(event.place.as_deref(), Some("Accumoli"));
    }

    #[test]
    fn bounding_box_first_corner_is_the_fallback_position() {
        let raw: RawEvent = serde_json::from_str(
            r#"{
                "text": "trema tutto",
                "author": "marco",
                "createdAt": "2024-08-24T03:36:00Z",
                "boundingBox": [[12.0, 41.0], [14.0, 41.0], [14.0, 43.0], [12.0, 43.0]]
            }"#,
        )
        .unwrap();

        let event = raw.into_event();
        assert_eq!(event.coordinate, Some(geo::Point::new(12.0, 41.0)));
    }

    #[test]
    fn missing_position_yields_an_ungeotagged_event() {
        let raw: RawEvent = serde_json::from_str(
            r#"{
                "text": "sisma?",
                "author": "p",
                "createdAt": "2024-08-24T03:36:00Z"
            }"#,
        )
        .unwrap();

        let event = raw.into_event();
        assert!(event.coordinate.is_none());
        assert!(!event.id.is_empty(), "an id should be synthesized");
    }

    #[test]
    fn credentials_debug_never_prints_the_token() {
        let creds = SourceCredentials {
            bearer_token: "super-secret".to_string(),
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
