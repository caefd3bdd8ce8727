//! Practice sessions outside the diagnostic test. Each scored attempt is logged
//! and feeds the same per-phoneme counters. A phoneme gets a row only once it
//! is flagged as an error; clean attempts raise rows that already exist.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::aggregator::attempt_deltas;
use crate::domain::{AssessmentKey, PracticeSession, UserId};
use crate::error::StoreError;
use crate::protocol::PracticeIn;
use crate::store::ProgressStore;

pub struct PracticeService {
    store: Arc<dyn ProgressStore>,
}

impl PracticeService {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    #[instrument(level = "info", skip(self, input), fields(%user, language = %input.language, word = %input.target_word))]
    pub async fn record(&self, user: &UserId, input: PracticeIn) -> Result<PracticeSession, StoreError> {
        let deltas = attempt_deltas(&input.attempted_phonemes, &input.error_phonemes);
        let attempts: u32 = deltas.iter().map(|d| d.attempts).sum();
        let errors: u32 = deltas.iter().map(|d| d.errors).sum();
        let error_rate = if attempts == 0 { 0.0 } else { f64::from(errors) / f64::from(attempts) };

        let session = PracticeSession {
            id: Uuid::new_v4().to_string(),
            language: input.language,
            target_word: input.target_word,
            difficulty: input.difficulty,
            error_rate,
            full_log: input.full_log,
            created_at: Utc::now(),
        };
        let key = AssessmentKey::new(user, &session.language);
        self.store.commit_practice(&key, &session, &deltas).await?;
        info!(target: "practice", %user, language = %session.language, id = %session.id, error_rate, "Practice session recorded");
        Ok(session)
    }

    /// Newest first.
    pub async fn list(&self, user: &UserId, language: &str) -> Result<Vec<PracticeSession>, StoreError> {
        let mut sessions = self.store.practice_sessions(&AssessmentKey::new(user, language)).await?;
        sessions.reverse();
        Ok(sessions)
    }
}
