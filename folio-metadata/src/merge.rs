//! Reduction of scored candidates into one canonical record.
//!
//! The fold used by [`MergeStrategy::MergeAll`] and
//! [`MergeStrategy::MergeBest`] starts from a copy of the first input and
//! folds each later record into it:
//!
//! | field                                   | rule                                  |
//! |-----------------------------------------|---------------------------------------|
//! | `authors`, `languages`, `tags`          | union, first-seen order, no repeats   |
//! | `description`                           | longest candidate                     |
//! | `cover_url`                             | first non-empty                       |
//! | `identifiers`                           | key union, later values overwrite     |
//! | `series`, `publisher`, `published_date` | first non-empty                       |
//! | `series_index`                          | travels with the adopted `series`     |
//! | `rating`                                | maximum present value                 |
//!
//! Everything else (`source_id`, `external_id`, `title`, `url`) comes from
//! the base record.

use serde::{Deserialize, Serialize};

use crate::config::MergeConfig;
use crate::error::MetadataError;
use crate::types::{MetadataRecord, ScoredMetadataRecord};

/// Policy for reducing multiple candidates to one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Positionally first record, regardless of score.
    FirstWins,
    /// Positionally last record, regardless of score.
    LastWins,
    /// Fold every record into the first.
    MergeAll,
    /// Fold only records scoring at least `ratio × best score`.
    #[default]
    MergeBest,
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstWins => write!(f, "first_wins"),
            Self::LastWins => write!(f, "last_wins"),
            Self::MergeAll => write!(f, "merge_all"),
            Self::MergeBest => write!(f, "merge_best"),
        }
    }
}

/// Merges scored records according to a strategy fixed at construction.
#[derive(Debug, Clone)]
pub struct Merger {
    strategy: MergeStrategy,
    score_threshold_ratio: f64,
}

impl Default for Merger {
    fn default() -> Self {
        Self::from_config(&MergeConfig::default())
    }
}

impl Merger {
    /// Create a merger with the default threshold ratio (0.8).
    pub fn new(strategy: MergeStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Create a merger from configuration.
    pub fn from_config(config: &MergeConfig) -> Self {
        Self {
            strategy: config.strategy,
            score_threshold_ratio: config.score_threshold_ratio,
        }
    }

    /// Override the `MergeBest` threshold ratio.
    pub fn with_threshold_ratio(mut self, ratio: f64) -> Self {
        self.score_threshold_ratio = ratio;
        self
    }

    pub fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    /// Reduce `records` to one canonical record.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::EmptyMerge`] if `records` is empty.
    pub fn merge(&self, records: &[ScoredMetadataRecord]) -> Result<MetadataRecord, MetadataError> {
        let (first, rest) = records.split_first().ok_or(MetadataError::EmptyMerge)?;

        let merged = match self.strategy {
            MergeStrategy::FirstWins => first.record.clone(),
            MergeStrategy::LastWins => records
                .last()
                .map_or_else(|| first.record.clone(), |last| last.record.clone()),
            MergeStrategy::MergeAll => fold(&first.record, rest.iter()),
            MergeStrategy::MergeBest => {
                let best = records
                    .iter()
                    .map(|r| r.score)
                    .fold(f64::NEG_INFINITY, f64::max);
                let cutoff = self.score_threshold_ratio * best;
                let kept = rest.iter().filter(|r| r.score >= cutoff);
                fold(&first.record, kept)
            }
        };

        tracing::debug!(
            strategy = %self.strategy,
            inputs = records.len(),
            source = %merged.source_id,
            "merged metadata records"
        );
        Ok(merged)
    }
}

fn fold<'a, I>(base: &MetadataRecord, others: I) -> MetadataRecord
where
    I: Iterator<Item = &'a ScoredMetadataRecord>,
{
    let mut merged = base.clone();
    for other in others {
        merge_into(&mut merged, &other.record);
    }
    merged
}

fn merge_into(target: &mut MetadataRecord, other: &MetadataRecord) {
    union_into(&mut target.authors, &other.authors);
    union_into(&mut target.languages, &other.languages);
    union_into(&mut target.tags, &other.tags);

    if let Some(candidate) = non_empty(&other.description) {
        let current = target.description.as_deref().map_or(0, |d| d.chars().count());
        if candidate.chars().count() > current {
            target.description = Some(candidate.to_owned());
        }
    }

    fill_if_empty(&mut target.cover_url, &other.cover_url);

    for (key, value) in &other.identifiers {
        target.identifiers.insert(key.clone(), value.clone());
    }

    merge_series(target, other);
    fill_if_empty(&mut target.publisher, &other.publisher);
    fill_if_empty(&mut target.published_date, &other.published_date);

    target.rating = match (target.rating, other.rating) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
}

/// `series_index` belongs to the record that supplied `series`.
fn merge_series(target: &mut MetadataRecord, other: &MetadataRecord) {
    match (non_empty(&target.series), non_empty(&other.series)) {
        (None, Some(series)) => {
            target.series = Some(series.to_owned());
            target.series_index = other.series_index;
        }
        (Some(current), Some(series)) if current == series && target.series_index.is_none() => {
            target.series_index = other.series_index;
        }
        _ => {}
    }
}

fn union_into(target: &mut Vec<String>, other: &[String]) {
    let mut seen: Vec<String> = Vec::with_capacity(target.len() + other.len());
    for item in target.iter().chain(other) {
        if !seen.contains(item) {
            seen.push(item.clone());
        }
    }
    *target = seen;
}

fn fill_if_empty(target: &mut Option<String>, other: &Option<String>) {
    if non_empty(target).is_none() {
        if let Some(value) = non_empty(other) {
            *target = Some(value.to_owned());
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}
