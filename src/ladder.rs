//! Difficulty ladder: completed-item count -> tier, and prompt selection per tier.
//!
//! Selection goes through a `WordPicker` so tests can force deterministic prompts.
//! There is no memory of previous picks; repeats are possible.

use std::sync::{Arc, Mutex};

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tracing::{debug, instrument, warn};

use crate::config::AssessmentTuning;
use crate::domain::Tier;
use crate::wordbank::WordBank;

/// Prompt returned when a (language, tier) has no candidate words.
pub const NO_DATA_PROMPT: &str = "[no data]";

/// Source of randomness for prompt selection.
pub trait WordPicker: Send + Sync {
    fn pick<'a>(&self, words: &'a [String]) -> Option<&'a String>;
}

/// Uniform random pick backed by a seedable RNG.
pub struct RandomPicker {
    rng: Mutex<StdRng>,
}

impl RandomPicker {
    pub fn from_entropy() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }

    #[cfg(test)]
    pub fn seeded(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl WordPicker for RandomPicker {
    fn pick<'a>(&self, words: &'a [String]) -> Option<&'a String> {
        // A poisoned lock only means another picker call panicked; the RNG is still usable.
        let mut rng = match self.rng.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        words.choose(&mut *rng)
    }
}

#[derive(Clone)]
pub struct DifficultyLadder {
    bank: Arc<WordBank>,
    tuning: AssessmentTuning,
    picker: Arc<dyn WordPicker>,
}

impl DifficultyLadder {
    pub fn new(bank: Arc<WordBank>, tuning: AssessmentTuning, picker: Arc<dyn WordPicker>) -> Self {
        Self { bank, tuning, picker }
    }

    pub fn test_length(&self) -> u32 {
        self.tuning.test_length
    }

    #[cfg(test)]
    pub fn bank(&self) -> &WordBank {
        &self.bank
    }

    /// Tier for a completed-item count; `None` once the test is finished.
    pub fn tier_for(&self, completed_count: u32) -> Option<Tier> {
        tier_for_bounds(&self.tuning, completed_count)
    }

    /// Random word for (language, tier), or `NO_DATA_PROMPT` when the tier is empty.
    #[instrument(level = "debug", skip(self), fields(tier = tier.key()))]
    pub fn next_prompt(&self, language: &str, tier: Tier) -> String {
        let words = self.bank.words(language, tier);
        match self.picker.pick(words) {
            Some(word) => {
                debug!(target: "assessment", %language, tier = tier.key(), %word, "Prompt selected");
                word.clone()
            }
            None => {
                warn!(target: "word_bank", %language, tier = tier.key(), "No candidate words for tier; serving sentinel prompt");
                NO_DATA_PROMPT.to_string()
            }
        }
    }
}

/// Half-open ranges `[0,b1) -> T1 .. [b3,b4) -> T4`; `>= test_length` has no tier.
pub fn tier_for_bounds(tuning: &AssessmentTuning, completed_count: u32) -> Option<Tier> {
    if completed_count >= tuning.test_length {
        return None;
    }
    Tier::ALL
        .into_iter()
        .zip(tuning.tier_bounds)
        .find(|(_, bound)| completed_count < *bound)
        .map(|(tier, _)| tier)
        .or(Some(Tier::T4))
}
