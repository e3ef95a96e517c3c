//! Tauri commands for app settings

use std::sync::Arc;
use tauri::State;

use crate::db::AppState;
use crate::error::ChallengeError;
use crate::feedback::{load_feedback_settings, save_feedback_settings, FeedbackSettings};

#[tauri::command]
pub async fn get_feedback_settings(
  state: State<'_, Arc<AppState>>,
) -> Result<FeedbackSettings, ChallengeError> {
  load_feedback_settings(&state.db).await
}

/// Mute or unmute sound cues
#[tauri::command]
pub async fn set_feedback_muted(
  state: State<'_, Arc<AppState>>,
  muted: bool,
) -> Result<FeedbackSettings, ChallengeError> {
  let settings = FeedbackSettings { muted };
  save_feedback_settings(&state.db, &settings).await?;
  Ok(settings)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::commands::challenge::create_challenge;
  use crate::models::ChallengeLevel;
  use crate::planner::Planner;
  use crate::test_utils::*;
  use serial_test::serial;
  use tauri::Manager;

  #[tokio::test]
  #[serial]
  async fn test_feedback_settings_default_unmuted() {
    let pool = setup_test_db().await;
    let state = Arc::new(AppState::new(pool.clone(), "local", Planner::default()));
    let app = tauri::test::mock_app();
    app.manage(state);

    let settings = get_feedback_settings(app.state()).await.unwrap();
    assert!(!settings.muted);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_muting_silences_challenge_cues() {
    let pool = setup_test_db().await;
    let state = Arc::new(AppState::new(pool.clone(), "local", Planner::default()));
    let app = tauri::test::mock_app();
    app.manage(state);

    let settings = set_feedback_muted(app.state(), true).await.unwrap();
    assert!(settings.muted);
    assert!(get_feedback_settings(app.state()).await.unwrap().muted);

    let snapshot = create_challenge(app.state(), "Quiet".to_string(), ChallengeLevel::Beginner)
      .await
      .unwrap();
    assert_eq!(snapshot.cue, None);

    teardown_test_db(pool).await;
  }
}
