//! Feedback cue settings
//!
//! Sound playback happens in the frontend. The backend only decides which
//! cue an action deserves, using settings that are loaded per request and
//! handed to whoever needs them.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::ChallengeError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSettings {
  pub muted: bool,
}

/// Things the user did that may deserve a sound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackEvent {
  TaskChecked,
  DayCompleted,
  ChallengeCreated,
  ChallengeRestarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCue {
  Tick,
  Success,
  Fanfare,
}

impl FeedbackSettings {
  pub fn cue(&self, event: FeedbackEvent) -> Option<FeedbackCue> {
    if self.muted {
      return None;
    }
    Some(match event {
      FeedbackEvent::TaskChecked => FeedbackCue::Tick,
      FeedbackEvent::DayCompleted => FeedbackCue::Success,
      FeedbackEvent::ChallengeCreated | FeedbackEvent::ChallengeRestarted => FeedbackCue::Fanfare,
    })
  }
}

/// ---------------------------------------------------------------------------
/// Database Operations
/// ---------------------------------------------------------------------------

pub async fn load_feedback_settings(pool: &SqlitePool) -> Result<FeedbackSettings, ChallengeError> {
  let muted: Option<bool> = sqlx::query_scalar("SELECT muted FROM app_settings WHERE id = 1")
    .fetch_optional(pool)
    .await?;

  Ok(FeedbackSettings {
    muted: muted.unwrap_or(false),
  })
}

pub async fn save_feedback_settings(
  pool: &SqlitePool,
  settings: &FeedbackSettings,
) -> Result<(), ChallengeError> {
  sqlx::query(
    r#"
    INSERT INTO app_settings (id, muted, updated_at)
    VALUES (1, ?1, CURRENT_TIMESTAMP)
    ON CONFLICT(id) DO UPDATE SET
      muted = excluded.muted,
      updated_at = excluded.updated_at
    "#,
  )
  .bind(settings.muted)
  .execute(pool)
  .await?;

  Ok(())
}
