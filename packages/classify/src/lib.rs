#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Batch text relevance classification for incoming event reports.
//!
//! The filter stage of the pipeline hands a whole micro-batch of report
//! texts to a [`TextClassifier`] and keeps only the relevant ones. The
//! classifier is a seam: the shipped [`KeywordClassifier`] applies
//! keyword rules, but any model-backed implementation can be plugged in
//! behind the same trait.

use quakewatch_event_models::Relevance;
use regex::RegexSet;
use thiserror::Error;

/// Error raised when classification of a batch fails.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// A classifier rule pattern failed to compile.
    #[error("invalid classifier pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The classifier backend rejected the batch.
    #[error("classification failed: {message}")]
    Backend {
        /// Description of what went wrong.
        message: String,
    },
}

/// Batch-oriented binary relevance classifier.
///
/// Implementations must return exactly one label per input text, in input
/// order.
pub trait TextClassifier: Send + Sync {
    /// Classifies a batch of report texts.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError`] if the classification backend fails; the
    /// caller drops the batch and continues.
    fn classify(&self, texts: &[&str]) -> Result<Vec<Relevance>, ClassifyError>;
}

/// Default keyword lexicon for Italian earthquake reports.
///
/// Word-boundary, case-insensitive matches. `terremoto` alone is too
/// ambiguous (it is common in political metaphor), so it only counts when
/// paired with a felt-shaking term.
const DEFAULT_POSITIVE_TERMS: &[&str] = &[
    r"(?i)\bscossa\b",
    r"(?i)\bscosse\b",
    r"(?i)\bsisma\b",
    r"(?i)\bepicentro\b",
    r"(?i)\bmagnitudo\b",
    r"(?i)\btrema(?:re|to)?\b",
    r"(?i)\bcroll(?:o|ato|ata)\b",
    r"(?i)\bterremoto\b",
];

/// Terms that mark a text as off-topic even when a positive term matches.
const DEFAULT_NEGATIVE_TERMS: &[&str] = &[
    r"(?i)\bpolitic[ao]\b",
    r"(?i)\bgoverno\b",
    r"(?i)\bmercat[oi]\b",
    r"(?i)\banniversario\b",
];

/// Rule-based relevance classifier over keyword patterns.
///
/// A text is relevant when at least one positive pattern matches and no
/// negative pattern does.
pub struct KeywordClassifier {
    positive: RegexSet,
    negative: RegexSet,
}

impl KeywordClassifier {
    /// Builds a classifier from explicit positive and negative patterns.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::Pattern`] if any pattern fails to compile.
    pub fn new(positive: &[&str], negative: &[&str]) -> Result<Self, ClassifyError> {
        Ok(Self {
            positive: RegexSet::new(positive)?,
            negative: RegexSet::new(negative)?,
        })
    }

    /// Builds the classifier with the default Italian earthquake lexicon.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::Pattern`] if the built-in patterns fail to
    /// compile.
    pub fn italian_earthquake() -> Result<Self, ClassifyError> {
        Self::new(DEFAULT_POSITIVE_TERMS, DEFAULT_NEGATIVE_TERMS)
    }
}

impl TextClassifier for KeywordClassifier {
    fn classify(&self, texts: &[&str]) -> Result<Vec<Relevance>, ClassifyError> {
        let labels = texts
            .iter()
            .map(|text| {
                if self.positive.is_match(text) && !self.negative.is_match(text) {
                    Relevance::Relevant
                } else {
                    Relevance::Irrelevant
                }
            })
            .collect();
        Ok(labels)
    }
}
