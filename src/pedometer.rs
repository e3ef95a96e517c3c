//! Step counting from accelerometer samples
//!
//! The frontend forwards device motion readings; a step is counted when the
//! acceleration magnitude crosses a threshold and enough time has passed since
//! the previous step. Counting runs behind a `StepSubscription` whose owner
//! starts and stops it explicitly.

use chrono::{DateTime, Local, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Acceleration magnitude (m/s², gravity included) that counts as a peak
pub const STEP_THRESHOLD: f64 = 12.0;
/// Minimum gap between two steps
pub const STEP_DEBOUNCE_MS: i64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum PedometerError {
  #[error("Step counter is not running")]
  NotRunning,

  #[error("Step counter is already running")]
  AlreadyRunning,

  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),
}

impl Serialize for PedometerError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
  pub x: f64,
  pub y: f64,
  pub z: f64,
  pub timestamp_ms: i64,
}

impl MotionSample {
  pub fn magnitude(&self) -> f64 {
    (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
  }
}

/// ---------------------------------------------------------------------------
/// Peak Detection
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StepDetector {
  threshold: f64,
  debounce_ms: i64,
  last_step_ms: Option<i64>,
  steps: u64,
}

impl Default for StepDetector {
  fn default() -> Self {
    Self::new(STEP_THRESHOLD, STEP_DEBOUNCE_MS)
  }
}

impl StepDetector {
  pub fn new(threshold: f64, debounce_ms: i64) -> Self {
    Self {
      threshold,
      debounce_ms,
      last_step_ms: None,
      steps: 0,
    }
  }

  /// Returns true when `sample` registers a new step
  pub fn process(&mut self, sample: MotionSample) -> bool {
    if sample.magnitude() <= self.threshold {
      return false;
    }
    let debounced = self
      .last_step_ms
      .is_some_and(|last| sample.timestamp_ms - last < self.debounce_ms);
    if debounced {
      return false;
    }

    self.last_step_ms = Some(sample.timestamp_ms);
    self.steps += 1;
    true
  }

  pub fn steps(&self) -> u64 {
    self.steps
  }
}

/// ---------------------------------------------------------------------------
/// Subscription
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSession {
  pub started_at: DateTime<Utc>,
  pub ended_at: DateTime<Utc>,
  pub steps: u64,
}

/// Handle to a running step counter. Dropping it also stops the counter.
pub struct StepSubscription {
  samples: mpsc::UnboundedSender<MotionSample>,
  stop: oneshot::Sender<()>,
  task: JoinHandle<u64>,
  started_at: DateTime<Utc>,
}

impl StepSubscription {
  /// Spawn a counter; `on_step` receives the running total after each step
  pub fn start<F>(mut detector: StepDetector, on_step: F) -> Self
  where
    F: Fn(u64) + Send + 'static,
  {
    let (samples, mut rx) = mpsc::unbounded_channel::<MotionSample>();
    let (stop, mut stop_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
      loop {
        tokio::select! {
          _ = &mut stop_rx => break,
          sample = rx.recv() => match sample {
            Some(sample) => {
              if detector.process(sample) {
                on_step(detector.steps());
              }
            }
            None => break,
          },
        }
      }

      // Samples fed before the stop request still count
      while let Ok(sample) = rx.try_recv() {
        if detector.process(sample) {
          on_step(detector.steps());
        }
      }
      detector.steps()
    });

    debug!("Step counter started");
    Self {
      samples,
      stop,
      task,
      started_at: Utc::now(),
    }
  }

  pub fn feed(&self, sample: MotionSample) -> Result<(), PedometerError> {
    self
      .samples
      .send(sample)
      .map_err(|_| PedometerError::NotRunning)
  }

  /// Stop counting and wait for the final total
  pub async fn stop(self) -> StepSession {
    // The task may already be gone if the channel closed
    let _ = self.stop.send(());
    let steps = match self.task.await {
      Ok(steps) => steps,
      Err(e) => {
        warn!("Step counter task failed: {}", e);
        0
      }
    };

    debug!("Step counter stopped at {} steps", steps);
    StepSession {
      started_at: self.started_at,
      ended_at: Utc::now(),
      steps,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Database Operations
/// ---------------------------------------------------------------------------

/// Fixed-width UTC timestamps so that text comparison follows time order
fn sortable_timestamp(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub async fn save_step_session(pool: &SqlitePool, session: &StepSession) -> Result<(), PedometerError> {
  sqlx::query("INSERT INTO step_sessions (started_at, ended_at, steps) VALUES (?1, ?2, ?3)")
    .bind(sortable_timestamp(session.started_at))
    .bind(sortable_timestamp(session.ended_at))
    .bind(session.steps as i64)
    .execute(pool)
    .await?;
  Ok(())
}

/// Steps recorded in sessions that started since `since`
pub async fn steps_since(pool: &SqlitePool, since: DateTime<Utc>) -> Result<i64, PedometerError> {
  let total: i64 =
    sqlx::query_scalar("SELECT COALESCE(SUM(steps), 0) FROM step_sessions WHERE started_at >= ?1")
      .bind(sortable_timestamp(since))
      .fetch_one(pool)
      .await?;
  Ok(total)
}

/// Start of the local calendar day containing `now`
fn local_midnight(now: DateTime<Local>) -> DateTime<Utc> {
  now
    .date_naive()
    .and_time(NaiveTime::MIN)
    .and_local_timezone(Local)
    .earliest()
    // Midnight skipped by a DST change; count from the UTC day instead
    .map(|dt| dt.with_timezone(&Utc))
    .unwrap_or_else(|| now.date_naive().and_time(NaiveTime::MIN).and_utc())
}

/// Steps since local midnight
pub async fn today_steps(pool: &SqlitePool) -> Result<i64, PedometerError> {
  steps_since(pool, local_midnight(Local::now())).await
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
