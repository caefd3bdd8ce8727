//! Assessment state machine: IN_PROGRESS -> FINISHED.
//!
//! Transitions are pure: they take the current state and an outcome event and
//! return the next state plus the error phonemes to hand to the aggregator.
//! Loading, locking and persisting belong to `AssessmentService`.

use tracing::{debug, info};

use crate::aggregator::error_total;
use crate::domain::{AssessmentState, Outcome, OutcomeEvent, Tier};
use crate::error::AssessmentError;
use crate::ladder::DifficultyLadder;

/// Result of applying one outcome event.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: AssessmentState,
    /// Phonemes to record against the statistics. Empty unless the outcome
    /// was `completed` with flagged phonemes.
    pub recorded_errors: Vec<String>,
}

pub struct AssessmentStateMachine<'a> {
    ladder: &'a DifficultyLadder,
}

impl<'a> AssessmentStateMachine<'a> {
    pub fn new(ladder: &'a DifficultyLadder) -> Self {
        Self { ladder }
    }

    /// New record at count 0 with a T1 prompt already in place.
    pub fn start(&self, language: &str) -> AssessmentState {
        let mut state = AssessmentState::fresh(language);
        state.current_prompt = self.ladder.next_prompt(language, Tier::T1);
        state
    }

    /// Fills in a prompt for an in-progress record that has none yet.
    /// Returns true when the state changed.
    pub fn ensure_prompt(&self, state: &mut AssessmentState) -> bool {
        if state.is_completed || !state.current_prompt.is_empty() {
            return false;
        }
        match self.ladder.tier_for(state.completed_count) {
            Some(tier) => {
                state.current_prompt = self.ladder.next_prompt(&state.language, tier);
                true
            }
            None => false,
        }
    }

    pub fn apply(&self, current: &AssessmentState, event: &OutcomeEvent) -> Result<Transition, AssessmentError> {
        if current.is_completed {
            return Err(AssessmentError::AlreadyFinished { language: current.language.clone() });
        }
        match event.outcome {
            Outcome::TryAnother => Ok(self.resample(current)),
            Outcome::Completed | Outcome::Skipped => Ok(self.advance(current, event)),
        }
    }

    /// Same tier, fresh draw; counters untouched.
    fn resample(&self, current: &AssessmentState) -> Transition {
        let mut state = current.clone();
        if let Some(tier) = self.ladder.tier_for(state.completed_count) {
            state.current_prompt = self.ladder.next_prompt(&state.language, tier);
        }
        debug!(target: "assessment", language = %state.language, count = state.completed_count, prompt = %state.current_prompt, "Prompt resampled");
        Transition { state, recorded_errors: Vec::new() }
    }

    fn advance(&self, current: &AssessmentState, event: &OutcomeEvent) -> Transition {
        let mut state = current.clone();
        let errors = event.error_phonemes.clone().unwrap_or_default();

        state.last_raw_log = event.raw_log.clone().unwrap_or_default();
        let recorded_errors = match event.outcome {
            Outcome::Completed => errors.clone(),
            _ => Vec::new(),
        };
        state.assessment_error_count += error_total(&recorded_errors);
        state.last_error_phonemes = errors;
        state.completed_count += 1;

        match self.ladder.tier_for(state.completed_count) {
            Some(tier) => {
                state.current_prompt = self.ladder.next_prompt(&state.language, tier);
            }
            None => {
                state.is_completed = true;
                info!(target: "assessment", language = %state.language, count = state.completed_count, "Assessment finished");
            }
        }

        debug!(
            target: "assessment",
            language = %state.language,
            outcome = ?event.outcome,
            count = state.completed_count,
            errors = recorded_errors.len(),
            "Outcome applied"
        );
        Transition { state, recorded_errors }
    }
}
