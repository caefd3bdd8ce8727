//! Application state: word bank, ladder, store, and the services built on them.
//!
//! This module owns:
//!   - the immutable word bank (seeds + optional TOML)
//!   - the assessment tuning (test length, tier bounds)
//!   - the progress store shared by all services
//!   - the assessment, settings and practice services

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{load_config_from_env, AppConfig};
use crate::ladder::{DifficultyLadder, RandomPicker, WordPicker};
use crate::practice::PracticeService;
use crate::service::AssessmentService;
use crate::settings::SettingsService;
use crate::store::{InMemoryStore, ProgressStore};
use crate::wordbank::WordBank;

pub struct AppState {
    pub assessment: Arc<AssessmentService>,
    pub settings: Arc<SettingsService>,
    pub practice: Arc<PracticeService>,
}

impl AppState {
    /// Build state from env: load config, build the word bank, wire services.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_config_from_env();
        Self::from_parts(cfg.as_ref(), Arc::new(InMemoryStore::new()), Arc::new(RandomPicker::from_entropy()))
    }

    pub fn from_parts(
        cfg: Option<&AppConfig>,
        store: Arc<dyn ProgressStore>,
        picker: Arc<dyn WordPicker>,
    ) -> Self {
        let tuning = cfg
            .map(|c| c.assessment.clone())
            .unwrap_or_default()
            .or_default_if_invalid();
        let bank = Arc::new(WordBank::from_config(cfg));
        info!(target: "pronounce_backend", test_length = tuning.test_length, tier_bounds = ?tuning.tier_bounds, "Assessment tuning");

        let ladder = DifficultyLadder::new(bank, tuning, picker);
        let assessment = Arc::new(AssessmentService::new(store.clone(), ladder));
        let settings = Arc::new(SettingsService::new(store.clone(), assessment.clone()));
        let practice = Arc::new(PracticeService::new(store));

        Self { assessment, settings, practice }
    }
}
