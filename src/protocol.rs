//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AssessmentState, Level, PhonemeProgressSummary, PracticeSession, Tier};

/// Status of the diagnostic test for one language; returned by both GET and POST.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AssessmentView {
    pub language: String,
    pub completed_count: u32,
    pub test_length: u32,
    pub is_completed: bool,
    pub current_tier: Option<Tier>,
    pub current_prompt: String,
    pub last_error_phonemes: Vec<String>,
    pub last_raw_log: String,
}

pub fn to_view(s: &AssessmentState, tier: Option<Tier>, test_length: u32) -> AssessmentView {
    AssessmentView {
        language: s.language.clone(),
        completed_count: s.completed_count,
        test_length,
        is_completed: s.is_completed,
        current_tier: tier,
        current_prompt: s.current_prompt.clone(),
        last_error_phonemes: s.last_error_phonemes.clone(),
        last_raw_log: s.last_raw_log.clone(),
    }
}

#[derive(Debug, Serialize)]
pub struct PhonemeSummaryOut {
    pub phoneme: String,
    pub total_attempts: u64,
    pub error_count: u64,
    pub error_rate: f64,
}

impl From<PhonemeProgressSummary> for PhonemeSummaryOut {
    fn from(s: PhonemeProgressSummary) -> Self {
        let error_rate = s.error_rate();
        Self { phoneme: s.phoneme, total_attempts: s.total_attempts, error_count: s.error_count, error_rate }
    }
}

#[derive(Debug, Serialize)]
pub struct PhonemeListOut {
    pub language: String,
    pub phonemes: Vec<PhonemeSummaryOut>,
}

//
// Settings
//

#[derive(Debug, Deserialize)]
pub struct SettingsIn {
    pub cur_lvl: Level,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct SettingsOut {
    pub language: String,
    pub cur_lvl: Level,
    pub sug_lvl: Option<Level>,
}

//
// Practice sessions
//

#[derive(Debug, Deserialize)]
pub struct PracticeIn {
    pub language: String,
    pub target_word: String,
    #[serde(default)]
    pub difficulty: Level,
    #[serde(default)]
    pub attempted_phonemes: Vec<String>,
    #[serde(default)]
    pub error_phonemes: Vec<String>,
    #[serde(default)]
    pub full_log: String,
}

#[derive(Debug, Serialize)]
pub struct PracticeOut {
    pub id: String,
    pub language: String,
    pub target_word: String,
    pub difficulty: Level,
    pub error_rate: f64,
    pub full_log: String,
    pub created_at: DateTime<Utc>,
}

impl From<PracticeSession> for PracticeOut {
    fn from(s: PracticeSession) -> Self {
        Self {
            id: s.id,
            language: s.language,
            target_word: s.target_word,
            difficulty: s.difficulty,
            error_rate: s.error_rate,
            full_log: s.full_log,
            created_at: s.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
