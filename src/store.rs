//! Challenge persistence
//!
//! The challenge aggregate is read and written as one document per user.
//! `SqliteChallengeStore` keeps it in the `challenges` table with the plan,
//! completed days and logs serialized as JSON columns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ChallengeError;
use crate::models::{ChallengeLevel, ChallengeLog, ChallengeState, ChallengeTask};

// ---------------------------------------------------------------------------
/// Persistence Collaborator
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ChallengeStore: Send + Sync {
    async fn fetch_challenge(&self, user_id: &str) -> Result<Option<ChallengeState>, ChallengeError>;

    async fn create_challenge(
        &self,
        user_id: &str,
        plan: Vec<ChallengeTask>,
        goal: &str,
        level: ChallengeLevel,
    ) -> Result<ChallengeState, ChallengeError>;

    async fn replace_plan(
        &self,
        user_id: &str,
        plan: Vec<ChallengeTask>,
    ) -> Result<ChallengeState, ChallengeError>;

    async fn set_day_log(
        &self,
        user_id: &str,
        day: u32,
        log: ChallengeLog,
    ) -> Result<ChallengeState, ChallengeError>;

    /// Store `log` for `day` and apply the completion policy in the same write
    async fn save_day_log(
        &self,
        user_id: &str,
        day: u32,
        log: ChallengeLog,
    ) -> Result<ChallengeState, ChallengeError>;

    async fn mark_day_complete(&self, user_id: &str, day: u32) -> Result<ChallengeState, ChallengeError>;

    async fn mark_day_incomplete(&self, user_id: &str, day: u32) -> Result<ChallengeState, ChallengeError>;

    async fn delete_challenge(&self, user_id: &str) -> Result<(), ChallengeError>;

    /// Reset start date, completions and logs; swap in `plan` when given
    async fn restart_challenge(
        &self,
        user_id: &str,
        plan: Option<Vec<ChallengeTask>>,
    ) -> Result<ChallengeState, ChallengeError>;
}

// ---------------------------------------------------------------------------
/// SQLite Store
// ---------------------------------------------------------------------------

/// Clones share one write lock, so every read-modify-write cycle on the
/// challenge document runs alone.
#[derive(Clone)]
pub struct SqliteChallengeStore {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl SqliteChallengeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load(&self, user_id: &str) -> Result<Option<ChallengeState>, ChallengeError> {
        let row = sqlx::query(
            r#"
            SELECT goal, level, start_date, plan_json, completed_days_json, logs_json
            FROM challenges
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let start_date: String = row.get("start_date");
        let start_date = DateTime::parse_from_rfc3339(&start_date)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ChallengeError::Persistence(format!("Bad start date: {}", e)))?;
        let level: Option<String> = row.get("level");
        let plan_json: String = row.get("plan_json");
        let completed_json: String = row.get("completed_days_json");
        let logs_json: String = row.get("logs_json");

        let plan: Vec<ChallengeTask> = serde_json::from_str(&plan_json)?;
        let completed_days: BTreeSet<u32> = serde_json::from_str(&completed_json)?;
        let logs: BTreeMap<u32, ChallengeLog> = serde_json::from_str(&logs_json)?;

        Ok(Some(ChallengeState {
            start_date,
            completed_days,
            goal: row.get("goal"),
            level: level.and_then(|l| l.parse().ok()),
            plan,
            logs,
        }))
    }

    /// Load the active challenge or fail
    async fn load_active(&self, user_id: &str) -> Result<ChallengeState, ChallengeError> {
        self.load(user_id)
            .await?
            .filter(ChallengeState::is_active)
            .ok_or(ChallengeError::NoActiveChallenge)
    }

    async fn save(&self, user_id: &str, state: &ChallengeState) -> Result<(), ChallengeError> {
        let plan_json = serde_json::to_string(&state.plan)?;
        let completed_json = serde_json::to_string(&state.completed_days)?;
        let logs_json = serde_json::to_string(&state.logs)?;

        sqlx::query(
            r#"
            INSERT INTO challenges (
                user_id, goal, level, start_date, plan_json,
                completed_days_json, logs_json, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(user_id) DO UPDATE SET
                goal = excluded.goal,
                level = excluded.level,
                start_date = excluded.start_date,
                plan_json = excluded.plan_json,
                completed_days_json = excluded.completed_days_json,
                logs_json = excluded.logs_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(&state.goal)
        .bind(state.level.map(|l| l.as_str()))
        .bind(state.start_date.to_rfc3339())
        .bind(&plan_json)
        .bind(&completed_json)
        .bind(&logs_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!("Saved challenge for {} ({} days)", user_id, state.plan.len());
        Ok(())
    }

    /// Load, apply `f`, persist, return the stored result
    async fn update<F>(&self, user_id: &str, f: F) -> Result<ChallengeState, ChallengeError>
    where
        F: FnOnce(&mut ChallengeState) -> Result<(), ChallengeError> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut state = self.load_active(user_id).await?;
        f(&mut state)?;
        self.save(user_id, &state).await?;
        Ok(state)
    }
}

#[async_trait]
impl ChallengeStore for SqliteChallengeStore {
    async fn fetch_challenge(&self, user_id: &str) -> Result<Option<ChallengeState>, ChallengeError> {
        self.load(user_id).await
    }

    async fn create_challenge(
        &self,
        user_id: &str,
        plan: Vec<ChallengeTask>,
        goal: &str,
        level: ChallengeLevel,
    ) -> Result<ChallengeState, ChallengeError> {
        let state = ChallengeState::new(goal.to_string(), Some(level), plan, Utc::now());
        let _guard = self.write_lock.lock().await;
        self.save(user_id, &state).await?;
        Ok(state)
    }

    async fn replace_plan(
        &self,
        user_id: &str,
        plan: Vec<ChallengeTask>,
    ) -> Result<ChallengeState, ChallengeError> {
        self.update(user_id, move |state| {
            state.replace_plan(plan);
            Ok(())
        })
        .await
    }

    async fn set_day_log(
        &self,
        user_id: &str,
        day: u32,
        log: ChallengeLog,
    ) -> Result<ChallengeState, ChallengeError> {
        self.update(user_id, move |state| state.put_log(day, log)).await
    }

    async fn save_day_log(
        &self,
        user_id: &str,
        day: u32,
        log: ChallengeLog,
    ) -> Result<ChallengeState, ChallengeError> {
        self.update(user_id, move |state| state.apply_log(day, log).map(|_| ()))
            .await
    }

    async fn mark_day_complete(&self, user_id: &str, day: u32) -> Result<ChallengeState, ChallengeError> {
        self.update(user_id, |state| state.mark_day(day, true).map(|_| ()))
            .await
    }

    async fn mark_day_incomplete(&self, user_id: &str, day: u32) -> Result<ChallengeState, ChallengeError> {
        self.update(user_id, |state| state.mark_day(day, false).map(|_| ()))
            .await
    }

    async fn delete_challenge(&self, user_id: &str) -> Result<(), ChallengeError> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("DELETE FROM challenges WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn restart_challenge(
        &self,
        user_id: &str,
        plan: Option<Vec<ChallengeTask>>,
    ) -> Result<ChallengeState, ChallengeError> {
        self.update(user_id, move |state| {
            state.restart(Utc::now(), plan);
            Ok(())
        })
        .await
    }
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
