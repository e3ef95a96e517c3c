//! Tauri commands for the step counter
//!
//! The frontend subscribes with `start_step_counter`, streams motion readings
//! through `record_motion_samples` and receives running totals as
//! `step-count` events until it calls `stop_step_counter`.

use std::sync::Arc;
use tauri::{AppHandle, Emitter, Runtime, State};
use tracing::{info, warn};

use crate::db::AppState;
use crate::pedometer::{
  save_step_session, today_steps, MotionSample, PedometerError, StepDetector, StepSession,
  StepSubscription,
};

pub const STEP_COUNT_EVENT: &str = "step-count";

#[tauri::command]
pub async fn start_step_counter<R: Runtime>(
  app: AppHandle<R>,
  state: State<'_, Arc<AppState>>,
) -> Result<(), PedometerError> {
  let mut running = state.pedometer.lock().await;
  if running.is_some() {
    return Err(PedometerError::AlreadyRunning);
  }

  let subscription = StepSubscription::start(StepDetector::default(), move |total| {
    if let Err(e) = app.emit(STEP_COUNT_EVENT, total) {
      warn!("Failed to emit step count: {}", e);
    }
  });
  *running = Some(subscription);
  Ok(())
}

#[tauri::command]
pub async fn record_motion_samples(
  state: State<'_, Arc<AppState>>,
  samples: Vec<MotionSample>,
) -> Result<(), PedometerError> {
  let running = state.pedometer.lock().await;
  let subscription = running.as_ref().ok_or(PedometerError::NotRunning)?;
  for sample in samples {
    subscription.feed(sample)?;
  }
  Ok(())
}

/// Stop counting and store the session
#[tauri::command]
pub async fn stop_step_counter(
  state: State<'_, Arc<AppState>>,
) -> Result<StepSession, PedometerError> {
  let subscription = state
    .pedometer
    .lock()
    .await
    .take()
    .ok_or(PedometerError::NotRunning)?;

  let session = subscription.stop().await;
  save_step_session(&state.db, &session).await?;
  info!("Recorded {} steps", session.steps);
  Ok(session)
}

#[tauri::command]
pub async fn get_today_steps(state: State<'_, Arc<AppState>>) -> Result<i64, PedometerError> {
  today_steps(&state.db).await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::planner::Planner;
  use crate::test_utils::*;
  use serial_test::serial;
  use tauri::Manager;

  fn peak(timestamp_ms: i64) -> MotionSample {
    MotionSample {
      x: 0.0,
      y: 0.0,
      z: 15.0,
      timestamp_ms,
    }
  }

  #[tokio::test]
  #[serial]
  async fn test_step_counter_lifecycle() {
    let pool = setup_test_db().await;
    let state = Arc::new(AppState::new(pool.clone(), "local", Planner::default()));
    let app = tauri::test::mock_app();
    app.manage(state);

    start_step_counter(app.handle().clone(), app.state()).await.unwrap();
    let result = start_step_counter(app.handle().clone(), app.state()).await;
    assert!(matches!(result, Err(PedometerError::AlreadyRunning)));

    let samples: Vec<MotionSample> = (0..5).map(|i| peak(i * 500)).collect();
    record_motion_samples(app.state(), samples).await.unwrap();

    let session = stop_step_counter(app.state()).await.unwrap();
    assert_eq!(session.steps, 5);
    assert_eq!(get_today_steps(app.state()).await.unwrap(), 5);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_commands_need_running_counter() {
    let pool = setup_test_db().await;
    let state = Arc::new(AppState::new(pool.clone(), "local", Planner::default()));
    let app = tauri::test::mock_app();
    app.manage(state);

    let result = record_motion_samples(app.state(), vec![peak(0)]).await;
    assert!(matches!(result, Err(PedometerError::NotRunning)));
    let result = stop_step_counter(app.state()).await;
    assert!(matches!(result, Err(PedometerError::NotRunning)));

    teardown_test_db(pool).await;
  }
}
