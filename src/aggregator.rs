//! Per-phoneme error statistics.
//!
//! Phoneme lists are turned into `PhonemeDelta`s here and handed to the store,
//! which applies each row increment atomically. Duplicate phonemes in one
//! list count once per occurrence.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::{AssessmentKey, AssessmentState, Level, PhonemeDelta, PhonemeProgressSummary, UserId};
use crate::error::StoreError;
use crate::store::ProgressStore;

/// Below this many errors per finished item the suggestion is `Hard`.
const HARD_MAX_ERRORS_PER_ITEM: f64 = 0.5;
/// Below this many errors per finished item the suggestion is `Medium`.
const MEDIUM_MAX_ERRORS_PER_ITEM: f64 = 1.5;

#[derive(Clone)]
pub struct PhonemeProgressAggregator {
    store: Arc<dyn ProgressStore>,
}

impl PhonemeProgressAggregator {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    /// Count every listed phoneme as one failed attempt and commit the
    /// increments together with `state`. Either both land or neither does.
    #[instrument(level = "debug", skip(self, phonemes, state), fields(%user, %language, n = phonemes.len()))]
    pub async fn record(
        &self,
        user: &UserId,
        language: &str,
        phonemes: &[String],
        state: &AssessmentState,
    ) -> Result<(), StoreError> {
        let deltas = error_deltas(phonemes);
        self.store
            .commit_outcome(&AssessmentKey::new(user, language), state, &deltas)
            .await?;
        debug!(target: "phoneme", %user, %language, rows = deltas.len(), "Phoneme errors recorded");
        Ok(())
    }

    /// Summaries ordered worst first (error rate desc, then phoneme).
    pub async fn summaries(&self, user: &UserId, language: &str) -> Result<Vec<PhonemeProgressSummary>, StoreError> {
        let mut rows = self
            .store
            .phoneme_summaries(&AssessmentKey::new(user, language))
            .await?;
        rows.sort_by(|a, b| {
            b.error_rate()
                .total_cmp(&a.error_rate())
                .then_with(|| a.phoneme.cmp(&b.phoneme))
        });
        Ok(rows)
    }
}

fn occurrences(phonemes: &[String]) -> BTreeMap<&str, u32> {
    let mut counts = BTreeMap::new();
    for p in phonemes.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        *counts.entry(p).or_insert(0) += 1;
    }
    counts
}

/// One attempt and one error per occurrence.
pub fn error_deltas(phonemes: &[String]) -> Vec<PhonemeDelta> {
    occurrences(phonemes)
        .into_iter()
        .map(|(p, n)| PhonemeDelta { phoneme: p.to_string(), attempts: n, errors: n })
        .collect()
}

/// Error occurrences in a list, blanks ignored.
pub fn error_total(phonemes: &[String]) -> u64 {
    occurrences(phonemes).values().map(|&n| u64::from(n)).sum()
}

/// Attempts from `attempted`, errors from `errors`; attempts never drop below errors.
pub fn attempt_deltas(attempted: &[String], errors: &[String]) -> Vec<PhonemeDelta> {
    let mut rows: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
    for (p, n) in occurrences(attempted) {
        rows.entry(p).or_default().0 += n;
    }
    for (p, n) in occurrences(errors) {
        rows.entry(p).or_default().1 += n;
    }
    rows.into_iter()
        .map(|(p, (attempts, errors))| PhonemeDelta {
            phoneme: p.to_string(),
            attempts: attempts.max(errors),
            errors,
        })
        .collect()
}

/// Level suggested after the diagnostic test, from error density per finished item.
/// `error_total` must count assessment errors only.
pub fn suggest_level(error_total: u64, completed_count: u32) -> Level {
    if completed_count == 0 {
        return Level::Easy;
    }
    let per_item = error_total as f64 / f64::from(completed_count);
    if per_item < HARD_MAX_ERRORS_PER_ITEM {
        Level::Hard
    } else if per_item < MEDIUM_MAX_ERRORS_PER_ITEM {
        Level::Medium
    } else {
        Level::Easy
    }
}
