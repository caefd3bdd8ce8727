//! Per-language practice settings. The suggested level is never stored; it is
//! derived from the finished assessment each time settings are read.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::domain::{AssessmentKey, Level, UserId, UserSetting};
use crate::error::StoreError;
use crate::protocol::SettingsOut;
use crate::service::AssessmentService;
use crate::store::ProgressStore;

pub struct SettingsService {
    store: Arc<dyn ProgressStore>,
    assessment: Arc<AssessmentService>,
}

impl SettingsService {
    pub fn new(store: Arc<dyn ProgressStore>, assessment: Arc<AssessmentService>) -> Self {
        Self { store, assessment }
    }

    /// `None` when the user never saved settings for this language.
    #[instrument(level = "info", skip(self), fields(%user, %language))]
    pub async fn get(&self, user: &UserId, language: &str) -> Result<Option<SettingsOut>, StoreError> {
        let key = AssessmentKey::new(user, language);
        let Some(setting) = self.store.load_setting(&key).await? else {
            return Ok(None);
        };
        let sug_lvl = self.assessment.suggested_level(user, language).await?;
        Ok(Some(SettingsOut { language: setting.language, cur_lvl: setting.cur_lvl, sug_lvl }))
    }

    #[instrument(level = "info", skip(self), fields(%user, %language, ?cur_lvl))]
    pub async fn update(&self, user: &UserId, language: &str, cur_lvl: Level) -> Result<SettingsOut, StoreError> {
        let key = AssessmentKey::new(user, language);
        let setting = UserSetting { language: language.to_string(), cur_lvl };
        self.store.save_setting(&key, &setting).await?;
        info!(target: "settings", %user, %language, ?cur_lvl, "Settings saved");
        let sug_lvl = self.assessment.suggested_level(user, language).await?;
        Ok(SettingsOut { language: setting.language, cur_lvl, sug_lvl })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssessmentTuning;
    use crate::domain::{Outcome, OutcomeEvent};
    use crate::ladder::{tests::FixedPicker, DifficultyLadder};
    use crate::store::InMemoryStore;
    use crate::wordbank::WordBank;

    fn services() -> (Arc<AssessmentService>, SettingsService) {
        let store: Arc<dyn ProgressStore> = Arc::new(InMemoryStore::new());
        let ladder = DifficultyLadder::new(
            Arc::new(WordBank::from_config(None)),
            AssessmentTuning::default(),
            Arc::new(FixedPicker(0)),
        );
        let assessment = Arc::new(AssessmentService::new(store.clone(), ladder));
        (assessment.clone(), SettingsService::new(store, assessment))
    }

    #[tokio::test]
    async fn missing_settings_read_as_none() {
        let (_, settings) = services();
        assert!(settings.get(&UserId::new("u"), "en").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_is_an_upsert() {
        let (_, settings) = services();
        let user = UserId::new("u");
        settings.update(&user, "en", Level::Easy).await.unwrap();
        let out = settings.update(&user, "en", Level::Hard).await.unwrap();
        assert_eq!(out.cur_lvl, Level::Hard);
        assert_eq!(out.sug_lvl, None);
        assert_eq!(settings.get(&user, "en").await.unwrap(), Some(out));
    }

    #[tokio::test]
    async fn suggestion_follows_finished_assessment() {
        let (assessment, settings) = services();
        let user = UserId::new("u");
        settings.update(&user, "en", Level::Easy).await.unwrap();
        for _ in 0..20 {
            assessment
                .submit_outcome(&user, "en", &OutcomeEvent::new(Outcome::Completed))
                .await
                .unwrap();
        }
        let out = settings.get(&user, "en").await.unwrap().unwrap();
        assert_eq!(out.cur_lvl, Level::Easy);
        assert_eq!(out.sug_lvl, Some(Level::Hard));
    }
}
