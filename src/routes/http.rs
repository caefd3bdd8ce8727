//! HTTP endpoint handlers. These are thin wrappers that forward to the services.
//! Each handler is instrumented and logs the caller and basic result info.

use std::sync::Arc;
use axum::{
  async_trait,
  extract::{FromRequestParts, Path, State},
  http::request::Parts,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::domain::{OutcomeEvent, UserId};
use crate::error::{ApiError, ApiResult};
use crate::protocol::*;
use crate::state::AppState;
use crate::util::non_blank;

/// Header carrying the identity already verified upstream.
pub const USER_HEADER: &str = "x-user-id";

/// Authenticated caller, trusted as-is.
#[derive(Debug)]
pub struct CurrentUser(pub UserId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .headers
      .get(USER_HEADER)
      .and_then(|v| v.to_str().ok())
      .and_then(non_blank)
      .map(|id| CurrentUser(UserId::new(id)))
      .ok_or(ApiError::Unauthenticated)
  }
}

fn language_param(language: &str) -> ApiResult<&str> {
  non_blank(language).ok_or_else(|| ApiError::BadRequest("language must not be blank".into()))
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state), fields(user = %user.0))]
pub async fn http_get_assessment(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(language): Path<String>,
) -> ApiResult<Json<AssessmentView>> {
  let language = language_param(&language)?;
  let view = state.assessment.get_status(&user.0, language).await?;
  info!(target: "assessment", user = %user.0, %language, count = view.completed_count, "HTTP status served");
  Ok(Json(view))
}

#[instrument(level = "info", skip(state, body), fields(user = %user.0, outcome = ?body.outcome))]
pub async fn http_post_outcome(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(language): Path<String>,
  Json(body): Json<OutcomeEvent>,
) -> ApiResult<Json<AssessmentView>> {
  let language = language_param(&language)?;
  let view = state.assessment.submit_outcome(&user.0, language, &body).await?;
  Ok(Json(view))
}

#[instrument(level = "info", skip(state), fields(user = %user.0))]
pub async fn http_get_phonemes(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(language): Path<String>,
) -> ApiResult<Json<PhonemeListOut>> {
  let language = language_param(&language)?;
  let rows = state.assessment.phoneme_summaries(&user.0, language).await?;
  Ok(Json(PhonemeListOut {
    language: language.to_string(),
    phonemes: rows.into_iter().map(PhonemeSummaryOut::from).collect(),
  }))
}

#[instrument(level = "info", skip(state), fields(user = %user.0))]
pub async fn http_get_settings(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(language): Path<String>,
) -> ApiResult<Json<SettingsOut>> {
  let language = language_param(&language)?;
  state
    .settings
    .get(&user.0, language)
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("no settings for language '{language}'")))
}

#[instrument(level = "info", skip(state, body), fields(user = %user.0))]
pub async fn http_put_settings(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(language): Path<String>,
  Json(body): Json<SettingsIn>,
) -> ApiResult<Json<SettingsOut>> {
  let language = language_param(&language)?;
  let out = state.settings.update(&user.0, language, body.cur_lvl).await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(user = %user.0, word = %body.target_word))]
pub async fn http_post_practice(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Json(mut body): Json<PracticeIn>,
) -> ApiResult<Json<PracticeOut>> {
  body.language = language_param(&body.language)?.to_string();
  if non_blank(&body.target_word).is_none() {
    return Err(ApiError::BadRequest("target_word must not be blank".into()));
  }
  let session = state.practice.record(&user.0, body).await?;
  Ok(Json(PracticeOut::from(session)))
}

#[instrument(level = "info", skip(state), fields(user = %user.0))]
pub async fn http_get_practice(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(language): Path<String>,
) -> ApiResult<Json<Vec<PracticeOut>>> {
  let language = language_param(&language)?;
  let sessions = state.practice.list(&user.0, language).await?;
  Ok(Json(sessions.into_iter().map(PracticeOut::from).collect()))
}
