//! Persistence seam for assessment state, phoneme summaries, settings and practice sessions.
//!
//! `InMemoryStore` keeps everything behind one `RwLock`, so each commit method
//! applies all of its writes or none of them.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::instrument;

use crate::domain::{
    AssessmentKey, AssessmentState, PhonemeDelta, PhonemeProgressSummary, PracticeSession,
    UserSetting,
};
use crate::error::StoreError;

/// Storage for everything keyed by (user, language).
///
/// Callers serialize read-modify-write per key inside one process only
/// (`AssessmentService` holds a per-key mutex). A store shared by several
/// processes must make `commit_outcome` and `commit_practice` conditional
/// itself, through a transaction or a compare-and-swap on the state row.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn load_state(&self, key: &AssessmentKey) -> Result<Option<AssessmentState>, StoreError>;

    /// Upsert the state row alone (first read, prompt resample).
    async fn save_state(&self, key: &AssessmentKey, state: &AssessmentState) -> Result<(), StoreError>;

    /// Upsert the state row and apply phoneme increments as one unit.
    /// A missing row is created at zero only for a delta carrying errors.
    async fn commit_outcome(
        &self,
        key: &AssessmentKey,
        state: &AssessmentState,
        deltas: &[PhonemeDelta],
    ) -> Result<(), StoreError>;

    async fn phoneme_summaries(&self, key: &AssessmentKey) -> Result<Vec<PhonemeProgressSummary>, StoreError>;

    async fn load_setting(&self, key: &AssessmentKey) -> Result<Option<UserSetting>, StoreError>;

    async fn save_setting(&self, key: &AssessmentKey, setting: &UserSetting) -> Result<(), StoreError>;

    /// Append a session and apply its phoneme increments as one unit.
    /// Same row-creation rule as `commit_outcome`.
    async fn commit_practice(
        &self,
        key: &AssessmentKey,
        session: &PracticeSession,
        deltas: &[PhonemeDelta],
    ) -> Result<(), StoreError>;

    /// Sessions for the key in insertion order.
    async fn practice_sessions(&self, key: &AssessmentKey) -> Result<Vec<PracticeSession>, StoreError>;
}

#[derive(Default)]
struct Tables {
    states: HashMap<AssessmentKey, AssessmentState>,
    phonemes: HashMap<AssessmentKey, BTreeMap<String, PhonemeProgressSummary>>,
    settings: HashMap<AssessmentKey, UserSetting>,
    sessions: HashMap<AssessmentKey, Vec<PracticeSession>>,
}

impl Tables {
    /// Checks every counter first so a failure leaves all rows untouched.
    fn apply_deltas(&mut self, key: &AssessmentKey, deltas: &[PhonemeDelta]) -> Result<(), StoreError> {
        if deltas.is_empty() {
            return Ok(());
        }
        let rows = self.phonemes.get(key);
        for d in deltas {
            let Some(row) = rows.and_then(|r| r.get(&d.phoneme)) else {
                continue;
            };
            let fits = row.total_attempts.checked_add(u64::from(d.attempts)).is_some()
                && row.error_count.checked_add(u64::from(d.errors)).is_some();
            if !fits {
                return Err(StoreError::Commit(format!("counter overflow for phoneme '{}'", d.phoneme)));
            }
        }

        let rows = self.phonemes.entry(key.clone()).or_default();
        for d in deltas {
            match rows.get_mut(&d.phoneme) {
                Some(row) => row.apply(d),
                None if d.errors > 0 => {
                    let mut row = PhonemeProgressSummary::new(&d.phoneme);
                    row.apply(d);
                    rows.insert(d.phoneme.clone(), row);
                }
                None => {}
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn phoneme_summary(&self, key: &AssessmentKey, phoneme: &str) -> Option<PhonemeProgressSummary> {
        let t = self.tables.read().await;
        t.phonemes.get(key).and_then(|rows| rows.get(phoneme)).cloned()
    }
}

#[async_trait]
impl ProgressStore for InMemoryStore {
    async fn load_state(&self, key: &AssessmentKey) -> Result<Option<AssessmentState>, StoreError> {
        Ok(self.tables.read().await.states.get(key).cloned())
    }

    async fn save_state(&self, key: &AssessmentKey, state: &AssessmentState) -> Result<(), StoreError> {
        self.tables.write().await.states.insert(key.clone(), state.clone());
        Ok(())
    }

    #[instrument(level = "debug", skip(self, state, deltas), fields(user = %key.user, language = %key.language, deltas = deltas.len()))]
    async fn commit_outcome(
        &self,
        key: &AssessmentKey,
        state: &AssessmentState,
        deltas: &[PhonemeDelta],
    ) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        t.apply_deltas(key, deltas)?;
        t.states.insert(key.clone(), state.clone());
        Ok(())
    }

    async fn phoneme_summaries(&self, key: &AssessmentKey) -> Result<Vec<PhonemeProgressSummary>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.phonemes
            .get(key)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn load_setting(&self, key: &AssessmentKey) -> Result<Option<UserSetting>, StoreError> {
        Ok(self.tables.read().await.settings.get(key).cloned())
    }

    async fn save_setting(&self, key: &AssessmentKey, setting: &UserSetting) -> Result<(), StoreError> {
        self.tables.write().await.settings.insert(key.clone(), setting.clone());
        Ok(())
    }

    async fn commit_practice(
        &self,
        key: &AssessmentKey,
        session: &PracticeSession,
        deltas: &[PhonemeDelta],
    ) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        t.apply_deltas(key, deltas)?;
        t.sessions.entry(key.clone()).or_default().push(session.clone());
        Ok(())
    }

    async fn practice_sessions(&self, key: &AssessmentKey) -> Result<Vec<PracticeSession>, StoreError> {
        Ok(self.tables.read().await.sessions.get(key).cloned().unwrap_or_default())
    }
}
