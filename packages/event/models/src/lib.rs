#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Event report entity and relevance label types.
//!
//! An [`Event`] is one geotagged, time-stamped report drained from the
//! ingestion stream (originally a social-media post). Events are immutable
//! once created: the ingest stage builds them, the filter and analyze stages
//! only read them.

use chrono::{DateTime, Utc};
use geo::Point;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Binary relevance label assigned by the text classifier.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Relevance {
    /// The report describes an earthquake happening now.
    Relevant,
    /// The report is off-topic (metaphor, politics, old news).
    Irrelevant,
}

impl Relevance {
    /// Returns `true` for [`Relevance::Relevant`].
    #[must_use]
    pub const fn is_relevant(self) -> bool {
        matches!(self, Self::Relevant)
    }
}

/// One geotagged, time-stamped event report.
///
/// The coordinate is `(longitude, latitude)` in WGS84. Reports without any
/// usable position carry `None` and are excluded from spatial clustering but
/// still count toward temporal detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Stable identifier from the upstream source, or a synthetic one.
    pub id: String,
    /// Report position, if the source provided one.
    pub coordinate: Option<Point<f64>>,
    /// Full report text.
    pub text: String,
    /// Display name of the report author.
    pub author: String,
    /// When the report was posted.
    pub timestamp: DateTime<Utc>,
    /// Human-readable place name attached to the report, if any.
    pub place: Option<String>,
}

impl Event {
    /// Creates an event without a position or place name.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        author: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            coordinate: None,
            text: text.into(),
            author: author.into(),
            timestamp,
            place: None,
        }
    }

    /// Returns a copy of this event with the given coordinate.
    #[must_use]
    pub fn with_coordinate(mut self, lon: f64, lat: f64) -> Self {
        self.coordinate = Some(Point::new(lon, lat));
        self
    }

    /// Returns a copy of this event with the given place name.
    #[must_use]
    pub fn with_place(mut self, place: impl Into<String>) -> Self {
        self.place = Some(place.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn relevance_label_roundtrip() {
        assert_eq!(Relevance::Relevant.to_string(), "RELEVANT");
        assert_eq!(
            Relevance::from_str("IRRELEVANT").unwrap(),
            Relevance::Irrelevant
        );
        assert!(Relevance::Relevant.is_relevant());
        assert!(!Relevance::Irrelevant.is_relevant());
    }

    #[test]
    fn event_builders_set_optional_fields() {
        let event = Event::new("1", "scossa fortissima", "anna", Utc::now())
            .with_coordinate(13.17, 42.24)
            .with_place("L'Aquila, Abruzzo");

        assert_eq!(event.coordinate, Some(Point::new(13.17, 42.24)));
        assert_eq!(event.place.as_deref(), Some("L'Aquila, Abruzzo"));
    }
}
