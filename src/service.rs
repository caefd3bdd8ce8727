//! Assessment façade: get-or-create status, outcome submission, derived reads.
//!
//! Every read-modify-write for one (user, language) runs under a per-key async
//! mutex, so concurrent submissions never observe the same count. Other keys
//! proceed in parallel. A key's mutex is dropped from the map once its last
//! holder releases it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, instrument, warn};

use crate::aggregator::{suggest_level, PhonemeProgressAggregator};
use crate::domain::{AssessmentKey, AssessmentState, Level, OutcomeEvent, PhonemeProgressSummary, UserId};
use crate::error::{AssessmentError, StoreError};
use crate::ladder::DifficultyLadder;
use crate::machine::AssessmentStateMachine;
use crate::protocol::{to_view, AssessmentView};
use crate::store::ProgressStore;
use crate::util::trunc_for_log;

type KeyLocks = DashMap<AssessmentKey, Arc<Mutex<()>>>;

/// Holds one key's mutex; on drop, removes the map entry if nobody else
/// holds or waits on it.
struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: AssessmentKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // Release first so the map's Arc is the only one left when idle.
        self.guard.take();
        self.locks.remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct AssessmentService {
    store: Arc<dyn ProgressStore>,
    ladder: DifficultyLadder,
    aggregator: PhonemeProgressAggregator,
    locks: KeyLocks,
}

impl AssessmentService {
    pub fn new(store: Arc<dyn ProgressStore>, ladder: DifficultyLadder) -> Self {
        Self {
            aggregator: PhonemeProgressAggregator::new(store.clone()),
            store,
            ladder,
            locks: DashMap::new(),
        }
    }

    async fn lock_key(&self, key: &AssessmentKey) -> KeyGuard<'_> {
        // Clone the Arc out so the shard guard is released before awaiting.
        let lock = self.locks.entry(key.clone()).or_default().clone();
        let guard = lock.lock_owned().await;
        KeyGuard { locks: &self.locks, key: key.clone(), guard: Some(guard) }
    }

    fn view(&self, state: &AssessmentState) -> AssessmentView {
        let tier = if state.is_completed { None } else { self.ladder.tier_for(state.completed_count) };
        to_view(state, tier, self.ladder.test_length())
    }

    /// Load the record, creating it (with a T1 prompt) on first interaction.
    /// Caller must hold the key lock.
    async fn load_or_create(&self, key: &AssessmentKey) -> Result<AssessmentState, StoreError> {
        let machine = AssessmentStateMachine::new(&self.ladder);
        match self.store.load_state(key).await? {
            Some(mut state) => {
                if machine.ensure_prompt(&mut state) {
                    self.store.save_state(key, &state).await?;
                }
                Ok(state)
            }
            None => {
                let state = machine.start(&key.language);
                self.store.save_state(key, &state).await?;
                info!(target: "assessment", user = %key.user, language = %key.language, prompt = %state.current_prompt, "Assessment started");
                Ok(state)
            }
        }
    }

    /// Idempotent apart from the first call, which creates the record.
    #[instrument(level = "info", skip(self), fields(%user, %language))]
    pub async fn get_status(&self, user: &UserId, language: &str) -> Result<AssessmentView, AssessmentError> {
        let key = AssessmentKey::new(user, language);
        let _guard = self.lock_key(&key).await;
        let state = self.load_or_create(&key).await?;
        Ok(self.view(&state))
    }

    #[instrument(
        level = "info",
        skip(self, event),
        fields(%user, %language, outcome = ?event.outcome, log = %trunc_for_log(event.raw_log.as_deref().unwrap_or(""), 48))
    )]
    pub async fn submit_outcome(
        &self,
        user: &UserId,
        language: &str,
        event: &OutcomeEvent,
    ) -> Result<AssessmentView, AssessmentError> {
        let key = AssessmentKey::new(user, language);
        let _guard = self.lock_key(&key).await;

        let current = self.load_or_create(&key).await?;
        let machine = AssessmentStateMachine::new(&self.ladder);
        let transition = match machine.apply(&current, event) {
            Ok(t) => t,
            Err(e) => {
                warn!(target: "assessment", %user, %language, error = %e, "Outcome rejected");
                return Err(e);
            }
        };

        if transition.recorded_errors.is_empty() {
            self.store.save_state(&key, &transition.state).await?;
        } else {
            self.aggregator
                .record(user, language, &transition.recorded_errors, &transition.state)
                .await?;
        }

        info!(
            target: "assessment",
            %user,
            %language,
            count = transition.state.completed_count,
            finished = transition.state.is_completed,
            "Outcome committed"
        );
        Ok(self.view(&transition.state))
    }

    pub async fn phoneme_summaries(
        &self,
        user: &UserId,
        language: &str,
    ) -> Result<Vec<PhonemeProgressSummary>, StoreError> {
        self.aggregator.summaries(user, language).await
    }

    /// `None` until the test for this language is finished. Only errors
    /// flagged during the test count; practice sessions leave it unchanged.
    pub async fn suggested_level(&self, user: &UserId, language: &str) -> Result<Option<Level>, StoreError> {
        let key = AssessmentKey::new(user, language);
        Ok(self
            .store
            .load_state(&key)
            .await?
            .filter(|state| state.is_completed)
            .map(|state| suggest_level(state.assessment_error_count, state.completed_count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssessmentTuning;
    use crate::domain::{Outcome, Tier};
    use crate::ladder::{tests::FixedPicker, RandomPicker, WordPicker};
    use crate::practice::PracticeService;
    use crate::protocol::PracticeIn;
    use crate::store::{tests::FlakyStore, InMemoryStore};
    use crate::wordbank::WordBank;
    use std::sync::atomic::Ordering;

    fn service_with(store: Arc<dyn ProgressStore>, picker: Arc<dyn WordPicker>) -> AssessmentService {
        let ladder = DifficultyLadder::new(Arc::new(WordBank::from_config(None)), AssessmentTuning::default(), picker);
        AssessmentService::new(store, ladder)
    }

    fn completed(errors: &[&str]) -> OutcomeEvent {
        OutcomeEvent::new(Outcome::Completed).with_errors(errors.iter().copied())
    }

    #[tokio::test]
    async fn new_user_scenario() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service_with(store.clone(), Arc::new(RandomPicker::seeded(3)));
        let user = UserId::new("alice");
        let bank = WordBank::from_config(None);

        let v = svc.get_status(&user, "en").await.unwrap();
        assert_eq!(v.completed_count, 0);
        assert!(!v.is_completed);
        assert!(bank.contains("en", Tier::T1, &v.current_prompt));

        let v = svc.submit_outcome(&user, "en", &completed(&["ɹ"])).await.unwrap();
        assert_eq!(v.completed_count, 1);
        assert!(bank.contains("en", Tier::T1, &v.current_prompt));

        let row = store
            .phoneme_summary(&AssessmentKey::new(&user, "en"), "ɹ")
            .await
            .unwrap();
        assert_eq!((row.total_attempts, row.error_count), (1, 1));
    }

    #[tokio::test]
    async fn get_status_is_stable_after_creation() {
        let svc = service_with(Arc::new(InMemoryStore::new()), Arc::new(RandomPicker::seeded(9)));
        let user = UserId::new("bob");
        let a = svc.get_status(&user, "zh").await.unwrap();
        let b = svc.get_status(&user, "zh").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn twenty_completions_finish_and_twenty_first_is_rejected() {
        let svc = service_with(Arc::new(InMemoryStore::new()), Arc::new(RandomPicker::seeded(1)));
        let user = UserId::new("carol");
        for i in 1..=20 {
            let v = svc.submit_outcome(&user, "en", &completed(&[])).await.unwrap();
            assert_eq!(v.completed_count, i);
            assert_eq!(v.is_completed, i == 20);
        }
        let err = svc.submit_outcome(&user, "en", &completed(&[])).await.unwrap_err();
        assert!(matches!(err, AssessmentError::AlreadyFinished { .. }));

        let v = svc.get_status(&user, "en").await.unwrap();
        assert_eq!(v.completed_count, 20);
        assert!(v.is_completed);
        assert_eq!(v.current_tier, None);
    }

    #[tokio::test]
    async fn skipped_counts_but_leaves_stats_alone() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service_with(store.clone(), Arc::new(FixedPicker(0)));
        let user = UserId::new("dan");
        let ev = OutcomeEvent::new(Outcome::Skipped).with_errors(["θ"]);

        let v = svc.submit_outcome(&user, "en", &ev).await.unwrap();
        assert_eq!(v.completed_count, 1);
        assert!(svc.phoneme_summaries(&user, "en").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_phonemes_increment_twice() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service_with(store.clone(), Arc::new(FixedPicker(0)));
        let user = UserId::new("eve");
        svc.submit_outcome(&user, "en", &completed(&["θ", "θ"])).await.unwrap();

        let rows = svc.phoneme_summaries(&user, "en").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].total_attempts, rows[0].error_count), (2, 2));
    }

    #[tokio::test]
    async fn try_another_keeps_counters() {
        let svc = service_with(Arc::new(InMemoryStore::new()), Arc::new(RandomPicker::seeded(5)));
        let user = UserId::new("fay");
        for _ in 0..6 {
            svc.submit_outcome(&user, "en", &completed(&[])).await.unwrap();
        }
        let bank = WordBank::from_config(None);
        for _ in 0..10 {
            let v = svc
                .submit_outcome(&user, "en", &OutcomeEvent::new(Outcome::TryAnother))
                .await
                .unwrap();
            assert_eq!(v.completed_count, 6);
            assert!(!v.is_completed);
            assert!(bank.contains("en", Tier::T2, &v.current_prompt));
        }
    }

    #[tokio::test]
    async fn languages_are_independent() {
        let svc = service_with(Arc::new(InMemoryStore::new()), Arc::new(FixedPicker(0)));
        let user = UserId::new("gus");
        svc.submit_outcome(&user, "en", &completed(&[])).await.unwrap();
        let zh = svc.get_status(&user, "zh").await.unwrap();
        assert_eq!(zh.completed_count, 0);
        let other = svc.get_status(&UserId::new("hal"), "en").await.unwrap();
        assert_eq!(other.completed_count, 0);
    }

    #[tokio::test]
    async fn unknown_language_degrades_to_sentinel_prompt() {
        let svc = service_with(Arc::new(InMemoryStore::new()), Arc::new(FixedPicker(0)));
        let v = svc.get_status(&UserId::new("ivy"), "tlh").await.unwrap();
        assert_eq!(v.current_prompt, crate::ladder::NO_DATA_PROMPT);
        let v = svc.submit_outcome(&UserId::new("ivy"), "tlh", &completed(&[])).await.unwrap();
        assert_eq!(v.completed_count, 1);
    }

    #[tokio::test]
    async fn failed_commit_leaves_no_partial_update() {
        let store = Arc::new(FlakyStore::default());
        let svc = service_with(store.clone(), Arc::new(FixedPicker(0)));
        let user = UserId::new("jo");
        svc.get_status(&user, "en").await.unwrap();

        store.failing.store(true, Ordering::SeqCst);
        let err = svc.submit_outcome(&user, "en", &completed(&["θ"])).await.unwrap_err();
        assert!(matches!(err, AssessmentError::Storage(_)));

        store.failing.store(false, Ordering::SeqCst);
        assert_eq!(svc.get_status(&user, "en").await.unwrap().completed_count, 0);
        assert!(svc.phoneme_summaries(&user, "en").await.unwrap().is_empty());

        let v = svc.submit_outcome(&user, "en", &completed(&["θ"])).await.unwrap();
        assert_eq!(v.completed_count, 1);
        assert_eq!(svc.phoneme_summaries(&user, "en").await.unwrap()[0].error_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_never_lose_updates() {
        let store = Arc::new(InMemoryStore::new());
        let svc = Arc::new(service_with(store.clone(), Arc::new(RandomPicker::seeded(11))));
        let user = UserId::new("kim");

        let mut handles = Vec::new();
        for _ in 0..12 {
            let svc = svc.clone();
            let user = user.clone();
            handles.push(tokio::spawn(async move {
                svc.submit_outcome(&user, "en", &completed(&["s"])).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        let v = svc.get_status(&user, "en").await.unwrap();
        assert_eq!(v.completed_count, 12);
        assert_eq!(svc.phoneme_summaries(&user, "en").await.unwrap()[0].error_count, 12);
        assert!(svc.locks.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_saturate_at_test_length() {
        let svc = Arc::new(service_with(Arc::new(InMemoryStore::new()), Arc::new(RandomPicker::seeded(13))));
        let user = UserId::new("lee");

        let mut handles = Vec::new();
        for _ in 0..27 {
            let svc = svc.clone();
            let user = user.clone();
            handles.push(tokio::spawn(async move {
                svc.submit_outcome(&user, "en", &completed(&[])).await
            }));
        }
        let mut accepted = 0;
        let mut rejected = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(AssessmentError::AlreadyFinished { .. }) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((accepted, rejected), (20, 7));
        let v = svc.get_status(&user, "en").await.unwrap();
        assert_eq!(v.completed_count, 20);
        assert!(v.is_completed);
        assert!(svc.locks.is_empty());
    }

    #[tokio::test]
    async fn suggestion_appears_only_after_finish() {
        let svc = service_with(Arc::new(InMemoryStore::new()), Arc::new(FixedPicker(0)));
        let user = UserId::new("max");
        assert_eq!(svc.suggested_level(&user, "en").await.unwrap(), None);
        for _ in 0..19 {
            svc.submit_outcome(&user, "en", &completed(&["θ"])).await.unwrap();
        }
        assert_eq!(svc.suggested_level(&user, "en").await.unwrap(), None);
        svc.submit_outcome(&user, "en", &completed(&[])).await.unwrap();
        // 19 errors over 20 items
        assert_eq!(svc.suggested_level(&user, "en").await.unwrap(), Some(Level::Medium));
    }

    #[tokio::test]
    async fn key_locks_are_released_after_use() {
        let svc = service_with(Arc::new(InMemoryStore::new()), Arc::new(FixedPicker(0)));
        for name in ["nat", "oli", "pam"] {
            let user = UserId::new(name);
            svc.get_status(&user, "en").await.unwrap();
            svc.submit_outcome(&user, "zh", &completed(&["x"])).await.unwrap();
        }
        assert!(svc.locks.is_empty());

        svc.submit_outcome(&UserId::new("nat"), "en", &OutcomeEvent::new(Outcome::TryAnother))
            .await
            .unwrap();
        assert!(svc.locks.is_empty());
    }

    #[tokio::test]
    async fn key_lock_entry_is_kept_while_shared() {
        let svc = service_with(Arc::new(InMemoryStore::new()), Arc::new(FixedPicker(0)));
        let key = AssessmentKey::new(&UserId::new("quin"), "en");

        let first = svc.lock_key(&key).await;
        let lock = svc.locks.get(&key).map(|l| Arc::clone(l.value())).unwrap();
        drop(first);
        // An outside holder keeps the entry alive.
        assert!(svc.locks.contains_key(&key));
        drop(lock);

        let second = svc.lock_key(&key).await;
        drop(second);
        assert!(svc.locks.is_empty());
    }

    #[tokio::test]
    async fn practice_after_finish_keeps_suggestion() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service_with(store.clone(), Arc::new(FixedPicker(0)));
        let practice = PracticeService::new(store.clone());
        let user = UserId::new("rae");

        for _ in 0..20 {
            svc.submit_outcome(&user, "en", &completed(&[])).await.unwrap();
        }
        let before = svc.suggested_level(&user, "en").await.unwrap();
        assert_eq!(before, Some(Level::Hard));

        let input = PracticeIn {
            language: "en".into(),
            target_word: "think".into(),
            difficulty: Level::Hard,
            attempted_phonemes: vec!["θ".into(); 40],
            error_phonemes: vec!["θ".into(); 40],
            full_log: String::new(),
        };
        practice.record(&user, input).await.unwrap();

        assert_eq!(svc.suggested_level(&user, "en").await.unwrap(), before);
        assert_eq!(svc.phoneme_summaries(&user, "en").await.unwrap()[0].error_count, 40);
    }
}
