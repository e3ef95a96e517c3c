//! Challenge service
//!
//! Sequences user actions against the persistence and plan-generation
//! collaborators. Every action awaits its store calls in order and returns the
//! state the store handed back; when a call fails the error is returned and
//! the caller keeps whatever state it already had.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::challenge::{ChallengeStatus, ProgressSummary};
use crate::error::ChallengeError;
use crate::feedback::{FeedbackCue, FeedbackEvent, FeedbackSettings};
use crate::models::{ChallengeLevel, ChallengeLog, ChallengeState, ChallengeTask, TaskType};
use crate::planner::Planner;
use crate::store::ChallengeStore;

/// ---------------------------------------------------------------------------
/// Confirmation Capability
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmRequest {
  DeleteChallenge,
  RestartChallenge,
}

/// Asks the user before an irreversible lifecycle action
#[async_trait]
pub trait Confirm: Send + Sync {
  async fn confirm(&self, request: ConfirmRequest) -> bool;
}

/// Answer already collected by the frontend's own dialog
pub struct Preconfirmed(pub bool);

#[async_trait]
impl Confirm for Preconfirmed {
  async fn confirm(&self, _request: ConfirmRequest) -> bool {
    self.0
  }
}

/// ---------------------------------------------------------------------------
/// Snapshot returned to the frontend
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ChallengeSnapshot {
  pub status: ChallengeStatus,
  pub challenge: Option<ChallengeState>,
  pub progress: Option<ProgressSummary>,
  /// Sound the frontend should play for the action, if any
  pub cue: Option<FeedbackCue>,
}

impl ChallengeSnapshot {
  pub fn of(state: Option<ChallengeState>, cue: Option<FeedbackCue>) -> Self {
    let now = Utc::now();
    let state = state.filter(ChallengeState::is_active);
    Self {
      status: ChallengeStatus::of(state.as_ref(), now),
      progress: state.as_ref().map(|s| ProgressSummary::compute(s, now)),
      challenge: state,
      cue,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Service
/// ---------------------------------------------------------------------------

pub struct ChallengeService {
  store: Arc<dyn ChallengeStore>,
  planner: Planner,
  user_id: String,
  feedback: FeedbackSettings,
}

impl ChallengeService {
  pub fn new(
    store: Arc<dyn ChallengeStore>,
    planner: Planner,
    user_id: impl Into<String>,
    feedback: FeedbackSettings,
  ) -> Self {
    Self {
      store,
      planner,
      user_id: user_id.into(),
      feedback,
    }
  }

  async fn active(&self) -> Result<ChallengeState, ChallengeError> {
    self
      .store
      .fetch_challenge(&self.user_id)
      .await?
      .filter(ChallengeState::is_active)
      .ok_or(ChallengeError::NoActiveChallenge)
  }

  pub async fn snapshot(&self) -> Result<ChallengeSnapshot, ChallengeError> {
    let state = self.store.fetch_challenge(&self.user_id).await?;
    Ok(ChallengeSnapshot::of(state, None))
  }

  /// NoChallenge -> Active
  pub async fn create(
    &self,
    goal: &str,
    level: ChallengeLevel,
  ) -> Result<ChallengeSnapshot, ChallengeError> {
    let goal = goal.trim();
    if goal.is_empty() {
      return Err(ChallengeError::Validation("Goal must not be empty".to_string()));
    }

    let existing = self.store.fetch_challenge(&self.user_id).await?;
    if existing.as_ref().is_some_and(ChallengeState::is_active) {
      return Err(ChallengeError::Validation(
        "A challenge is already active; delete or restart it first".to_string(),
      ));
    }

    let plan = self.planner.generate(goal, level).await;
    let state = self
      .store
      .create_challenge(&self.user_id, plan, goal, level)
      .await?;

    info!("Started {} challenge for {}: {}", level, self.user_id, goal);
    Ok(ChallengeSnapshot::of(
      Some(state),
      self.feedback.cue(FeedbackEvent::ChallengeCreated),
    ))
  }

  /// Save notes and checklist for a day, then apply the completion policy
  pub async fn save_day_log(
    &self,
    day: u32,
    notes: String,
    checked_indices: Vec<usize>,
  ) -> Result<ChallengeSnapshot, ChallengeError> {
    let state = self.active().await?;
    state.task(day)?;

    let log = ChallengeLog::new(notes, checked_indices);
    let checked_before = state.log(day).checked_indices.len();

    // Log and completion land in one store write
    let updated = self.store.save_day_log(&self.user_id, day, log).await?;

    let completed = updated.is_day_complete(day) && !state.is_day_complete(day);
    let newly_checked = updated.log(day).checked_indices.len() > checked_before;
    let cue = if completed {
      self.feedback.cue(FeedbackEvent::DayCompleted)
    } else if newly_checked {
      self.feedback.cue(FeedbackEvent::TaskChecked)
    } else {
      None
    };
    Ok(ChallengeSnapshot::of(Some(updated), cue))
  }

  /// Manual completion toggle, for any day type
  pub async fn set_day_complete(
    &self,
    day: u32,
    complete: bool,
  ) -> Result<ChallengeSnapshot, ChallengeError> {
    let state = self.active().await?;
    state.task(day)?;
    let was_complete = state.is_day_complete(day);

    let updated = if complete {
      self.store.mark_day_complete(&self.user_id, day).await?
    } else {
      self.store.mark_day_incomplete(&self.user_id, day).await?
    };

    let cue = if complete && !was_complete {
      self.feedback.cue(FeedbackEvent::DayCompleted)
    } else {
      None
    };
    Ok(ChallengeSnapshot::of(Some(updated), cue))
  }

  /// Replace one day's task; other days, completions and logs are kept
  pub async fn update_task(&self, mut task: ChallengeTask) -> Result<ChallengeSnapshot, ChallengeError> {
    task.title = task.title.trim().to_string();
    if task.title.is_empty() {
      return Err(ChallengeError::Validation("Task title must not be empty".to_string()));
    }
    if task.task_type == TaskType::Rest {
      task.instructions.clear();
    }
    task.instructions.retain(|s| !s.trim().is_empty());

    let mut state = self.active().await?;
    state.replace_task(task)?;

    let updated = self.store.replace_plan(&self.user_id, state.plan).await?;
    Ok(ChallengeSnapshot::of(Some(updated), None))
  }

  /// Rework the whole plan from a free-text instruction.
  ///
  /// Completions and logs stay attached to their day numbers.
  pub async fn remix(&self, instruction: &str) -> Result<ChallengeSnapshot, ChallengeError> {
    let instruction = instruction.trim();
    if instruction.is_empty() {
      return Err(ChallengeError::Validation("Instruction must not be empty".to_string()));
    }

    let state = self.active().await?;
    let plan = self.planner.modify(&state.plan, instruction).await;
    if plan == state.plan {
      return Ok(ChallengeSnapshot::of(Some(state), None));
    }

    let carried_over = state.clone().replace_plan(plan.clone());
    if carried_over > 0 {
      warn!(
        "Remixed plan keeps progress for {} day(s) whose content changed",
        carried_over
      );
    }

    let updated = self.store.replace_plan(&self.user_id, plan).await?;
    Ok(ChallengeSnapshot::of(Some(updated), None))
  }

  /// Active -> Active from day 1, optionally with a freshly generated plan
  pub async fn restart(
    &self,
    confirm: &dyn Confirm,
    regenerate: bool,
  ) -> Result<ChallengeSnapshot, ChallengeError> {
    let state = self.active().await?;
    let goal = state.goal.as_deref().map(str::trim).unwrap_or_default();
    if regenerate && goal.is_empty() {
      return Err(ChallengeError::Validation(
        "Cannot regenerate a plan without a goal".to_string(),
      ));
    }
    if !confirm.confirm(ConfirmRequest::RestartChallenge).await {
      return Err(ChallengeError::Cancelled);
    }

    let plan = if regenerate {
      let level = state.level.unwrap_or(ChallengeLevel::Beginner);
      Some(self.planner.generate(goal, level).await)
    } else {
      None
    };

    let updated = self.store.restart_challenge(&self.user_id, plan).await?;
    info!("Restarted challenge for {}", self.user_id);
    Ok(ChallengeSnapshot::of(
      Some(updated),
      self.feedback.cue(FeedbackEvent::ChallengeRestarted),
    ))
  }

  /// Active -> NoChallenge
  pub async fn delete(&self, confirm: &dyn Confirm) -> Result<ChallengeSnapshot, ChallengeError> {
    self.active().await?;
    if !confirm.confirm(ConfirmRequest::DeleteChallenge).await {
      return Err(ChallengeError::Cancelled);
    }

    self.store.delete_challenge(&self.user_id).await?;
    info!("Deleted challenge for {}", self.user_id);
    Ok(ChallengeSnapshot::of(None, None))
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
