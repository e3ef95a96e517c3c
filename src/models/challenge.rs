use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Number of scheduled days in every challenge plan
pub const CHALLENGE_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
  Workout,
  Rest,
  #[serde(rename = "Active Recovery")]
  ActiveRecovery,
}

impl TaskType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Workout => "Workout",
      Self::Rest => "Rest",
      Self::ActiveRecovery => "Active Recovery",
    }
  }
}

impl std::fmt::Display for TaskType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for TaskType {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
    match normalized.as_str() {
      "workout" => Ok(Self::Workout),
      "rest" => Ok(Self::Rest),
      "active recovery" => Ok(Self::ActiveRecovery),
      _ => Err(format!("Unknown task type: {}", s)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeLevel {
  Beginner,
  Intermediate,
  Advanced,
}

impl ChallengeLevel {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Beginner => "beginner",
      Self::Intermediate => "intermediate",
      Self::Advanced => "advanced",
    }
  }
}

impl std::fmt::Display for ChallengeLevel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for ChallengeLevel {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "beginner" => Ok(Self::Beginner),
      "intermediate" => Ok(Self::Intermediate),
      "advanced" => Ok(Self::Advanced),
      _ => Err(format!("Unknown challenge level: {}", s)),
    }
  }
}

/// One scheduled day of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeTask {
  pub day: u32,
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(rename = "type")]
  pub task_type: TaskType,
  #[serde(default)]
  pub instructions: Vec<String>,
}

impl ChallengeTask {
  /// Days whose completion follows their checklist
  pub fn has_checklist(&self) -> bool {
    self.task_type != TaskType::Rest && !self.instructions.is_empty()
  }
}

/// User-entered record for a single day
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeLog {
  #[serde(default)]
  pub notes: String,
  #[serde(default)]
  pub checked_indices: BTreeSet<usize>,
}

impl ChallengeLog {
  pub fn new(notes: impl Into<String>, checked: impl IntoIterator<Item = usize>) -> Self {
    Self {
      notes: notes.into(),
      checked_indices: checked.into_iter().collect(),
    }
  }

  /// Drop indices that don't point into a checklist of `len` items
  pub fn retain_within(&mut self, len: usize) {
    self.checked_indices.retain(|&i| i < len);
  }
}

/// The whole challenge aggregate for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeState {
  pub start_date: DateTime<Utc>,
  #[serde(default)]
  pub completed_days: BTreeSet<u32>,
  pub goal: Option<String>,
  pub level: Option<ChallengeLevel>,
  #[serde(default)]
  pub plan: Vec<ChallengeTask>,
  #[serde(default)]
  pub logs: BTreeMap<u32, ChallengeLog>,
}
