pub mod challenge;
pub mod pedometer;
pub mod settings;

use std::sync::Arc;

use crate::db::AppState;
use crate::error::ChallengeError;
use crate::feedback::load_feedback_settings;
use crate::service::ChallengeService;

/// Build a service for one command, with the feedback settings as currently stored
pub(crate) async fn challenge_service(state: &AppState) -> Result<ChallengeService, ChallengeError> {
  let feedback = load_feedback_settings(&state.db).await?;
  Ok(ChallengeService::new(
    Arc::new(state.store.clone()),
    state.planner.clone(),
    state.user_id.clone(),
    feedback,
  ))
}
