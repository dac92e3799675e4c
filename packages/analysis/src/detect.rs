//! Sliding-time-window detection over event timestamps.
//!
//! The analyze stage feeds every micro-batch's timestamps into a
//! [`DetectionWindow`]; the window retains only timestamps within
//! `duration` of the most recent one, and a detection is active while at
//! least `threshold` timestamps remain.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

/// Error raised on a caller-sequencing bug in window maintenance.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    /// Eviction was attempted on an empty window.
    #[error("window eviction attempted on an empty window")]
    EmptyWindow,
}

/// Detection state derived from the retained window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionState {
    /// Not enough corroborating events.
    Normal,
    /// The event rate threshold is currently met.
    Detected,
}

/// Sliding window over observed event timestamps.
///
/// Timestamps are expected in ascending order across calls; the window
/// itself stays sorted under that contract, and after every observation
/// each retained timestamp `t` satisfies `t >= most_recent - duration`.
#[derive(Debug, Clone)]
pub struct DetectionWindow {
    threshold: usize,
    duration: Duration,
    timestamps: VecDeque<DateTime<Utc>>,
    most_recent: Option<DateTime<Utc>>,
}

impl DetectionWindow {
    /// Creates an empty window in the `Normal` state.
    #[must_use]
    pub const fn new(threshold: usize, duration: Duration) -> Self {
        Self {
            threshold,
            duration,
            timestamps: VecDeque::new(),
            most_recent: None,
        }
    }

    /// Observes a time-ordered batch of timestamps and evicts everything
    /// older than `most_recent - duration`.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::EmptyWindow`] when eviction runs against an
    /// empty window, which only happens if `observe` is called with an
    /// empty batch before any timestamp was ever observed.
    pub fn observe(&mut self, timestamps: &[DateTime<Utc>]) -> Result<(), DetectError> {
        if let Some(last) = timestamps.last() {
            self.most_recent = Some(*last);
        }
        self.timestamps.extend(timestamps.iter().copied());

        let most_recent = self.most_recent.ok_or(DetectError::EmptyWindow)?;
        let cutoff = most_recent - self.duration;
        while let Some(front) = self.timestamps.front() {
            if *front < cutoff {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Whether enough corroborating events remain in the window.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.timestamps.len() >= self.threshold
    }

    /// Current detection state.
    #[must_use]
    pub fn state(&self) -> DetectionState {
        if self.is_active() {
            DetectionState::Detected
        } else {
            DetectionState::Normal
        }
    }

    /// Number of retained timestamps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// The retained timestamps, oldest first.
    #[must_use]
    pub fn timestamps(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.timestamps.iter()
    }
}
