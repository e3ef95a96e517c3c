//! Tauri commands for the 30-day challenge

use std::sync::Arc;
use tauri::State;

use super::challenge_service;
use crate::db::AppState;
use crate::error::ChallengeError;
use crate::models::{ChallengeLevel, ChallengeTask};
use crate::service::{ChallengeSnapshot, Preconfirmed};

/// Current challenge, status and progress
#[tauri::command]
pub async fn get_challenge(
  state: State<'_, Arc<AppState>>,
) -> Result<ChallengeSnapshot, ChallengeError> {
  challenge_service(&state).await?.snapshot().await
}

#[tauri::command]
pub async fn create_challenge(
  state: State<'_, Arc<AppState>>,
  goal: String,
  level: ChallengeLevel,
) -> Result<ChallengeSnapshot, ChallengeError> {
  challenge_service(&state).await?.create(&goal, level).await
}

/// Save notes and checked instructions for a day
#[tauri::command]
pub async fn save_day_log(
  state: State<'_, Arc<AppState>>,
  day: u32,
  notes: String,
  checked_indices: Vec<usize>,
) -> Result<ChallengeSnapshot, ChallengeError> {
  challenge_service(&state)
    .await?
    .save_day_log(day, notes, checked_indices)
    .await
}

#[tauri::command]
pub async fn set_day_complete(
  state: State<'_, Arc<AppState>>,
  day: u32,
  complete: bool,
) -> Result<ChallengeSnapshot, ChallengeError> {
  challenge_service(&state).await?.set_day_complete(day, complete).await
}

#[tauri::command]
pub async fn update_challenge_task(
  state: State<'_, Arc<AppState>>,
  task: ChallengeTask,
) -> Result<ChallengeSnapshot, ChallengeError> {
  challenge_service(&state).await?.update_task(task).await
}

/// Ask the planner to rework the plan from a free-text instruction
#[tauri::command]
pub async fn remix_challenge(
  state: State<'_, Arc<AppState>>,
  instruction: String,
) -> Result<ChallengeSnapshot, ChallengeError> {
  challenge_service(&state).await?.remix(&instruction).await
}

/// `confirmed` carries the answer from the frontend's confirmation dialog
#[tauri::command]
pub async fn restart_challenge(
  state: State<'_, Arc<AppState>>,
  confirmed: bool,
  regenerate: Option<bool>,
) -> Result<ChallengeSnapshot, ChallengeError> {
  challenge_service(&state)
    .await?
    .restart(&Preconfirmed(confirmed), regenerate.unwrap_or(false))
    .await
}

#[tauri::command]
pub async fn delete_challenge(
  state: State<'_, Arc<AppState>>,
  confirmed: bool,
) -> Result<ChallengeSnapshot, ChallengeError> {
  challenge_service(&state)
    .await?
    .delete(&Preconfirmed(confirmed))
    .await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::challenge::ChallengeStatus;
  use crate::planner::Planner;
  use crate::test_utils::*;
  use chrono::{Duration, Utc};
  use serial_test::serial;
  use tauri::Manager;

  const USER: &str = "local";

  #[tokio::test]
  #[serial]
  async fn test_get_challenge_without_one() {
    let pool = setup_test_db().await;
    let state = Arc::new(AppState::new(pool.clone(), USER, Planner::default()));
    let app = tauri::test::mock_app();
    app.manage(state);

    let snapshot = get_challenge(app.state()).await.unwrap();
    assert_eq!(snapshot.status, ChallengeStatus::NoChallenge);
    assert!(snapshot.progress.is_none());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_get_challenge_reports_current_day() {
    let pool = setup_test_db().await;
    seed_test_challenge(&pool, USER, Utc::now() - Duration::hours(36)).await;
    let state = Arc::new(AppState::new(pool.clone(), USER, Planner::default()));
    let app = tauri::test::mock_app();
    app.manage(state);

    let snapshot = get_challenge(app.state()).await.unwrap();
    assert_eq!(
      snapshot.status,
      ChallengeStatus::Active {
        current_day: 2,
        window_elapsed: false
      }
    );

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_create_and_log_day() {
    let pool = setup_test_db().await;
    let state = Arc::new(AppState::new(pool.clone(), USER, Planner::default()));
    let app = tauri::test::mock_app();
    app.manage(state);

    create_challenge(app.state(), "Move every day".to_string(), ChallengeLevel::Beginner)
      .await
      .expect("Should create challenge");

    let snapshot = save_day_log(app.state(), 2, "easy jog".to_string(), vec![0, 1, 2])
      .await
      .unwrap();
    let challenge = snapshot.challenge.unwrap();
    assert!(challenge.is_day_complete(2));
    assert_eq!(challenge.log(2).notes, "easy jog");

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_set_day_complete_and_update_task() {
    let pool = setup_test_db().await;
    seed_test_challenge(&pool, USER, Utc::now()).await;
    let state = Arc::new(AppState::new(pool.clone(), USER, Planner::default()));
    let app = tauri::test::mock_app();
    app.manage(state);

    set_day_complete(app.state(), 3, true).await.unwrap();

    let mut task = mock_plan()[2].clone();
    task.description = "Gentle mobility".to_string();
    let snapshot = update_challenge_task(app.state(), task).await.unwrap();
    let challenge = snapshot.challenge.unwrap();
    assert_eq!(challenge.task(3).unwrap().description, "Gentle mobility");
    assert!(challenge.is_day_complete(3));

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_overlapping_commands_keep_every_completion() {
    let pool = setup_test_db().await;
    seed_test_challenge(&pool, USER, Utc::now()).await;
    let state = Arc::new(AppState::new(pool.clone(), USER, Planner::default()));
    let app = tauri::test::mock_app();
    app.manage(state);

    let (first, second, third) = tokio::join!(
      set_day_complete(app.state(), 1, true),
      set_day_complete(app.state(), 7, true),
      save_day_log(app.state(), 2, "intervals".to_string(), vec![0, 1, 2]),
    );
    first.unwrap();
    second.unwrap();
    third.unwrap();

    let challenge = get_challenge(app.state()).await.unwrap().challenge.unwrap();
    let days: Vec<u32> = challenge.completed_days.into_iter().collect();
    assert_eq!(days, vec![1, 2, 7]);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_remix_with_failing_generator_keeps_plan() {
    let pool = setup_test_db().await;
    seed_test_challenge(&pool, USER, Utc::now()).await;
    let planner = Planner::new(Some(Arc::new(MockGenerator::failing())));
    let state = Arc::new(AppState::new(pool.clone(), USER, planner));
    let app = tauri::test::mock_app();
    app.manage(state);

    let snapshot = remix_challenge(app.state(), "more yoga".to_string()).await.unwrap();
    assert_eq!(snapshot.challenge.unwrap().plan, mock_plan());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_restart_and_delete_need_confirmation() {
    let pool = setup_test_db().await;
    seed_test_challenge(&pool, USER, Utc::now() - Duration::days(10)).await;
    let state = Arc::new(AppState::new(pool.clone(), USER, Planner::default()));
    let app = tauri::test::mock_app();
    app.manage(state);

    let result = restart_challenge(app.state(), false, None).await;
    assert!(matches!(result, Err(ChallengeError::Cancelled)));

    let snapshot = restart_challenge(app.state(), true, None).await.unwrap();
    assert_eq!(
      snapshot.status,
      ChallengeStatus::Active {
        current_day: 1,
        window_elapsed: false
      }
    );

    let result = delete_challenge(app.state(), false).await;
    assert!(matches!(result, Err(ChallengeError::Cancelled)));

    let snapshot = delete_challenge(app.state(), true).await.unwrap();
    assert_eq!(snapshot.status, ChallengeStatus::NoChallenge);

    teardown_test_db(pool).await;
  }
}
