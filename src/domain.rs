//! Domain models: difficulty tiers, outcome events, assessment state,
//! per-phoneme progress rows, user settings and practice sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trusted user identifier handed over by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }
}

impl std::fmt::Display for UserId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

/// Storage key for everything owned by one user in one language.
/// Languages are opaque keys; no whitelist is applied here.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssessmentKey {
  pub user: UserId,
  pub language: String,
}

impl AssessmentKey {
  pub fn new(user: &UserId, language: &str) -> Self {
    Self { user: user.clone(), language: language.to_string() }
  }
}

/// One of the four difficulty bands walked during the diagnostic test.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
  T1,
  T2,
  T3,
  T4,
}

impl Tier {
  pub const ALL: [Tier; 4] = [Tier::T1, Tier::T2, Tier::T3, Tier::T4];

  /// Key used in word-bank tables ("t1".."t4").
  pub fn key(self) -> &'static str {
    match self {
      Tier::T1 => "t1",
      Tier::T2 => "t2",
      Tier::T3 => "t3",
      Tier::T4 => "t4",
    }
  }

  pub fn from_key(key: &str) -> Option<Self> {
    Tier::ALL.into_iter().find(|t| t.key().eq_ignore_ascii_case(key.trim()))
  }
}

/// What the client reports for the currently displayed prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
  Completed,
  Skipped,
  TryAnother,
}

/// Client-submitted result for the current prompt. The ASR score arrives
/// already computed; only the flagged phonemes and the raw log are kept.
#[derive(Clone, Debug, Deserialize)]
pub struct OutcomeEvent {
  pub outcome: Outcome,
  #[serde(default)] pub error_phonemes: Option<Vec<String>>,
  #[serde(default)] pub raw_log: Option<String>,
}

#[cfg(test)]
impl OutcomeEvent {
  pub fn new(outcome: Outcome) -> Self {
    Self { outcome, error_phonemes: None, raw_log: None }
  }

  pub fn with_errors<I, S>(mut self, phonemes: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.error_phonemes = Some(phonemes.into_iter().map(Into::into).collect());
    self
  }

  pub fn with_log(mut self, log: impl Into<String>) -> Self {
    self.raw_log = Some(log.into());
    self
  }
}

/// Diagnostic-test progress for one (user, language).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentState {
  pub language: String,
  /// Empty until the first status read.
  pub current_prompt: String,
  pub last_error_phonemes: Vec<String>,
  /// Opaque diagnostic text, stored verbatim.
  pub last_raw_log: String,
  pub completed_count: u32,
  /// Phoneme errors flagged on `completed` items of this test only.
  /// Practice sessions never touch it.
  #[serde(default)]
  pub assessment_error_count: u64,
  /// Terminal. Implies `completed_count >= test_length`.
  pub is_completed: bool,
}

impl AssessmentState {
  pub fn fresh(language: &str) -> Self {
    Self { language: language.to_string(), ..Self::default() }
  }
}

/// Running error counters for one (user, language, phoneme).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhonemeProgressSummary {
  pub phoneme: String,
  pub total_attempts: u64,
  pub error_count: u64,
}

impl PhonemeProgressSummary {
  pub fn new(phoneme: &str) -> Self {
    Self { phoneme: phoneme.to_string(), total_attempts: 0, error_count: 0 }
  }

  pub fn error_rate(&self) -> f64 {
    if self.total_attempts == 0 { 0.0 } else { self.error_count as f64 / self.total_attempts as f64 }
  }

  pub fn apply(&mut self, delta: &PhonemeDelta) {
    self.total_attempts += u64::from(delta.attempts);
    self.error_count += u64::from(delta.errors);
  }
}

/// Pending increment for one phoneme row. `errors <= attempts` always.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhonemeDelta {
  pub phoneme: String,
  pub attempts: u32,
  pub errors: u32,
}

/// Practice difficulty level. Default is the easiest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
  #[default]
  Easy,
  Medium,
  Hard,
}

/// Per-language practice preference. The suggested level is derived on read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSetting {
  pub language: String,
  pub cur_lvl: Level,
}

/// One scored practice attempt outside the diagnostic test.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PracticeSession {
  pub id: String,
  pub language: String,
  pub target_word: String,
  pub difficulty: Level,
  pub error_rate: f64,
  pub full_log: String,
  pub created_at: DateTime<Utc>,
}
