//! Test utilities and helpers for integration and unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Mock data factories
//! - Collaborator doubles for the planner and the store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::ChallengeError;
use crate::models::{ChallengeLevel, ChallengeLog, ChallengeState, ChallengeTask};
use crate::planner::{fallback_plan, DraftTask, PlanGenerator};
use crate::store::ChallengeStore;

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// Insert a challenge for `user_id` that started at `start_date`
pub async fn seed_test_challenge(
  pool: &SqlitePool,
  user_id: &str,
  start_date: DateTime<Utc>,
) -> ChallengeState {
  let state = mock_state(start_date);

  sqlx::query(
    r#"
    INSERT INTO challenges (
      user_id, goal, level, start_date, plan_json,
      completed_days_json, logs_json, updated_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, '[]', '{}', ?6)
    "#,
  )
  .bind(user_id)
  .bind(&state.goal)
  .bind(state.level.map(|l| l.as_str()))
  .bind(state.start_date.to_rfc3339())
  .bind(serde_json::to_string(&state.plan).expect("Failed to encode plan"))
  .bind(Utc::now().to_rfc3339())
  .execute(pool)
  .await
  .expect("Failed to seed challenge");

  state
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// The static plan, which every test can rely on
pub fn mock_plan() -> Vec<ChallengeTask> {
  fallback_plan()
}

/// A fresh beginner challenge started at `start_date`
pub fn mock_state(start_date: DateTime<Utc>) -> ChallengeState {
  ChallengeState::new(
    "Build a daily habit".to_string(),
    Some(ChallengeLevel::Beginner),
    mock_plan(),
    start_date,
  )
}

/// Generator output with `count` days; every seventh day is a rest day
pub fn mock_drafts(count: usize) -> Vec<DraftTask> {
  (1..=count)
    .map(|i| {
      let rest = i % 7 == 0;
      DraftTask {
        day: Some(i as i64),
        title: Some(format!("Generated day {}", i)),
        description: Some(format!("Description for day {}", i)),
        task_type: Some(if rest { "Rest" } else { "Workout" }.to_string()),
        instructions: Some(if rest {
          Vec::new()
        } else {
          vec!["Warm up".to_string(), "Main set".to_string(), "Cool down".to_string()]
        }),
      }
    })
    .collect()
}

/// ---------------------------------------------------------------------------
/// Collaborator Doubles
/// ---------------------------------------------------------------------------

/// Plan generator that returns canned drafts or always fails
pub struct MockGenerator {
  drafts: Option<Vec<DraftTask>>,
}

impl MockGenerator {
  pub fn ok(drafts: Vec<DraftTask>) -> Self {
    Self {
      drafts: Some(drafts),
    }
  }

  pub fn failing() -> Self {
    Self { drafts: None }
  }

  fn reply(&self) -> Result<Vec<DraftTask>, ChallengeError> {
    self
      .drafts
      .clone()
      .ok_or_else(|| ChallengeError::Generation("Mock generator unavailable".to_string()))
  }
}

#[async_trait]
impl PlanGenerator for MockGenerator {
  async fn generate_plan(
    &self,
    _goal: &str,
    _level: ChallengeLevel,
  ) -> Result<Vec<DraftTask>, ChallengeError> {
    self.reply()
  }

  async fn modify_plan(
    &self,
    _current: &[ChallengeTask],
    _instruction: &str,
  ) -> Result<Vec<DraftTask>, ChallengeError> {
    self.reply()
  }
}

/// Store whose reads succeed and whose writes fail.
/// `failing_marks` only fails the mark calls and passes other writes through.
pub struct FailingStore<S> {
  inner: S,
  fail_all_writes: bool,
}

impl<S: ChallengeStore> FailingStore<S> {
  pub fn wrapping(inner: S) -> Self {
    Self {
      inner,
      fail_all_writes: true,
    }
  }

  pub fn failing_marks(inner: S) -> Self {
    Self {
      inner,
      fail_all_writes: false,
    }
  }

  fn check_write(&self) -> Result<(), ChallengeError> {
    if self.fail_all_writes {
      Err(write_failure())
    } else {
      Ok(())
    }
  }
}

fn write_failure() -> ChallengeError {
  ChallengeError::Persistence("Simulated write failure".to_string())
}

#[async_trait]
impl<S: ChallengeStore> ChallengeStore for FailingStore<S> {
  async fn fetch_challenge(&self, user_id: &str) -> Result<Option<ChallengeState>, ChallengeError> {
    self.inner.fetch_challenge(user_id).await
  }

  async fn create_challenge(
    &self,
    user_id: &str,
    plan: Vec<ChallengeTask>,
    goal: &str,
    level: ChallengeLevel,
  ) -> Result<ChallengeState, ChallengeError> {
    self.check_write()?;
    self.inner.create_challenge(user_id, plan, goal, level).await
  }

  async fn replace_plan(
    &self,
    user_id: &str,
    plan: Vec<ChallengeTask>,
  ) -> Result<ChallengeState, ChallengeError> {
    self.check_write()?;
    self.inner.replace_plan(user_id, plan).await
  }

  async fn set_day_log(
    &self,
    user_id: &str,
    day: u32,
    log: ChallengeLog,
  ) -> Result<ChallengeState, ChallengeError> {
    self.check_write()?;
    self.inner.set_day_log(user_id, day, log).await
  }

  async fn save_day_log(
    &self,
    user_id: &str,
    day: u32,
    log: ChallengeLog,
  ) -> Result<ChallengeState, ChallengeError> {
    self.check_write()?;
    self.inner.save_day_log(user_id, day, log).await
  }

  async fn mark_day_complete(&self, _user_id: &str, _day: u32) -> Result<ChallengeState, ChallengeError> {
    Err(write_failure())
  }

  async fn mark_day_incomplete(&self, _user_id: &str, _day: u32) -> Result<ChallengeState, ChallengeError> {
    Err(write_failure())
  }

  async fn delete_challenge(&self, user_id: &str) -> Result<(), ChallengeError> {
    self.check_write()?;
    self.inner.delete_challenge(user_id).await
  }

  async fn restart_challenge(
    &self,
    user_id: &str,
    plan: Option<Vec<ChallengeTask>>,
  ) -> Result<ChallengeState, ChallengeError> {
    self.check_write()?;
    self.inner.restart_challenge(user_id, plan).await
  }
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::SqliteChallengeStore;
  use chrono::Duration;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('challenges', 'app_settings', 'step_sessions')",
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert_eq!(tables.len(), 3, "Expected 3 tables, got {}", tables.len());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_seeded_challenge_is_readable() {
    let pool = setup_test_db().await;
    let start = Utc::now() - Duration::days(3);
    let seeded = seed_test_challenge(&pool, "seeded", start).await;

    let store = SqliteChallengeStore::new(pool.clone());
    let fetched = store.fetch_challenge("seeded").await.unwrap().unwrap();
    assert_eq!(fetched.plan, seeded.plan);
    assert_eq!(fetched.goal, seeded.goal);

    teardown_test_db(pool).await;
  }

  #[test]
  fn test_mock_drafts_shape() {
    let drafts = mock_drafts(14);
    assert_eq!(drafts.len(), 14);
    assert_eq!(drafts[0].title.as_deref(), Some("Generated day 1"));
    assert_eq!(drafts[6].task_type.as_deref(), Some("Rest"));
    assert!(drafts[6].instructions.as_ref().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_failing_store_reads_through() {
    let pool = setup_test_db().await;
    seed_test_challenge(&pool, "u", Utc::now()).await;

    let store = FailingStore::wrapping(SqliteChallengeStore::new(pool.clone()));
    assert!(store.fetch_challenge("u").await.unwrap().is_some());
    assert!(matches!(
      store.mark_day_complete("u", 1).await,
      Err(ChallengeError::Persistence(_))
    ));

    teardown_test_db(pool).await;
  }
}
