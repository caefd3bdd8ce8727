//! Loading service configuration (assessment tuning + optional word bank) from TOML.
//!
//! See `AppConfig` and `AssessmentTuning` for the expected schema.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use tracing::{error, info};

/// Default number of items in the diagnostic test.
pub const DEFAULT_TEST_LENGTH: u32 = 20;
/// Default exclusive upper bounds of tiers T1..T4.
pub const DEFAULT_TIER_BOUNDS: [u32; 4] = [5, 10, 15, 20];

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub assessment: AssessmentTuning,
  /// language -> tier key ("t1".."t4") -> candidate words.
  #[serde(default)]
  pub word_bank: HashMap<String, BTreeMap<String, Vec<String>>>,
}

/// Test length and tier boundaries. Defaults give 20 items in four bands of five.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AssessmentTuning {
  pub test_length: u32,
  pub tier_bounds: [u32; 4],
}

impl Default for AssessmentTuning {
  fn default() -> Self {
    Self { test_length: DEFAULT_TEST_LENGTH, tier_bounds: DEFAULT_TIER_BOUNDS }
  }
}

impl AssessmentTuning {
  /// Bounds must be strictly ascending, non-zero, and end at the test length.
  pub fn validate(&self) -> Result<(), String> {
    if self.test_length == 0 {
      return Err("test_length must be positive".into());
    }
    if self.tier_bounds[0] == 0 {
      return Err("first tier bound must be positive".into());
    }
    if self.tier_bounds.windows(2).any(|w| w[0] >= w[1]) {
      return Err(format!("tier_bounds must be strictly ascending, got {:?}", self.tier_bounds));
    }
    if self.tier_bounds[3] != self.test_length {
      return Err(format!(
        "last tier bound ({}) must equal test_length ({})",
        self.tier_bounds[3], self.test_length
      ));
    }
    Ok(())
  }

  /// Returns self when valid; otherwise logs and falls back to defaults.
  pub fn or_default_if_invalid(self) -> Self {
    match self.validate() {
      Ok(()) => self,
      Err(reason) => {
        error!(target: "pronounce_backend", %reason, "Invalid assessment tuning; using defaults");
        Self::default()
      }
    }
  }
}

pub fn parse_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str::<AppConfig>(s)
}

/// Attempt to load `AppConfig` from ASSESSMENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("ASSESSMENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "pronounce_backend", %path, languages = cfg.word_bank.len(), "Loaded assessment config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "pronounce_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "pronounce_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
