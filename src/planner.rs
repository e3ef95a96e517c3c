//! Challenge plan generation
//!
//! Wraps the AI collaborator so that callers always get a usable plan:
//! generator output is schema-checked before it is accepted, and any failure
//! falls back to a static 30-day plan (or, when modifying, the current plan).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::challenge::renumber;
use crate::error::ChallengeError;
use crate::models::{ChallengeLevel, ChallengeTask, TaskType, CHALLENGE_DAYS};

/// ---------------------------------------------------------------------------
/// Generator Collaborator
/// ---------------------------------------------------------------------------

/// A task as returned by the generator, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DraftTask {
  #[serde(default)]
  pub day: Option<i64>,
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(rename = "type", default)]
  pub task_type: Option<String>,
  #[serde(default)]
  pub instructions: Option<Vec<String>>,
}

impl From<&ChallengeTask> for DraftTask {
  fn from(task: &ChallengeTask) -> Self {
    Self {
      day: Some(task.day as i64),
      title: Some(task.title.clone()),
      description: Some(task.description.clone()),
      task_type: Some(task.task_type.to_string()),
      instructions: Some(task.instructions.clone()),
    }
  }
}

#[async_trait]
pub trait PlanGenerator: Send + Sync {
  async fn generate_plan(
    &self,
    goal: &str,
    level: ChallengeLevel,
  ) -> Result<Vec<DraftTask>, ChallengeError>;

  async fn modify_plan(
    &self,
    current: &[ChallengeTask],
    instruction: &str,
  ) -> Result<Vec<DraftTask>, ChallengeError>;
}

/// ---------------------------------------------------------------------------
/// Validation
/// ---------------------------------------------------------------------------

/// Accept a generated plan only if it has exactly 30 well-formed days.
/// Day numbers are reassigned from position.
pub fn validate_plan(drafts: Vec<DraftTask>) -> Result<Vec<ChallengeTask>, ChallengeError> {
  if drafts.len() != CHALLENGE_DAYS as usize {
    return Err(ChallengeError::Generation(format!(
      "Expected {} days, got {}",
      CHALLENGE_DAYS,
      drafts.len()
    )));
  }

  let mut plan = Vec::with_capacity(drafts.len());
  for (i, draft) in drafts.into_iter().enumerate() {
    let position = i as i64 + 1;
    if draft.day != Some(position) {
      debug!("Renumbering generated day {:?} to {}", draft.day, position);
    }

    let title = draft
      .title
      .map(|t| t.trim().to_string())
      .filter(|t| !t.is_empty())
      .ok_or_else(|| ChallengeError::Generation(format!("Day {} has no title", position)))?;

    let task_type: TaskType = draft
      .task_type
      .as_deref()
      .ok_or_else(|| ChallengeError::Generation(format!("Day {} has no type", position)))?
      .parse()
      .map_err(ChallengeError::Generation)?;

    let instructions = if task_type == TaskType::Rest {
      Vec::new()
    } else {
      draft
        .instructions
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
    };

    plan.push(ChallengeTask {
      day: 0,
      title,
      description: draft.description.unwrap_or_default().trim().to_string(),
      task_type,
      instructions,
    });
  }

  Ok(renumber(plan))
}

/// ---------------------------------------------------------------------------
/// Static Fallback Plan
/// ---------------------------------------------------------------------------

struct Template {
  title: &'static str,
  description: &'static str,
  task_type: TaskType,
  instructions: &'static [&'static str],
}

static WEEKLY_CYCLE: [Template; 7] = [
  Template {
    title: "Full Body Foundations",
    description: "A short full body session to build the habit.",
    task_type: TaskType::Workout,
    instructions: &[
      "5 minute brisk warm-up",
      "3 x 10 bodyweight squats",
      "3 x 8 push-ups (knees if needed)",
      "3 x 30 second plank",
    ],
  },
  Template {
    title: "Cardio Intervals",
    description: "Alternate fast and easy efforts to lift your heart rate.",
    task_type: TaskType::Workout,
    instructions: &[
      "5 minute easy warm-up",
      "8 rounds: 30 seconds fast, 60 seconds easy",
      "5 minute cool-down walk",
    ],
  },
  Template {
    title: "Mobility Flow",
    description: "Loosen hips, hamstrings and shoulders.",
    task_type: TaskType::ActiveRecovery,
    instructions: &[
      "10 minute easy walk",
      "5 minutes of hip and hamstring stretches",
      "5 minutes of shoulder circles and cat-cow",
    ],
  },
  Template {
    title: "Lower Body Strength",
    description: "Legs and glutes with bodyweight moves.",
    task_type: TaskType::Workout,
    instructions: &[
      "5 minute warm-up",
      "3 x 12 lunges per leg",
      "3 x 15 glute bridges",
      "3 x 20 calf raises",
    ],
  },
  Template {
    title: "Upper Body & Core",
    description: "Pushing strength and a stable midsection.",
    task_type: TaskType::Workout,
    instructions: &[
      "5 minute warm-up",
      "3 x 10 push-ups",
      "3 x 12 chair dips",
      "3 x 20 bicycle crunches",
    ],
  },
  Template {
    title: "Easy Walk & Stretch",
    description: "Keep moving without adding fatigue.",
    task_type: TaskType::ActiveRecovery,
    instructions: &["20 minute easy walk", "10 minute full body stretch"],
  },
  Template {
    title: "Rest & Reflect",
    description: "Take the day off and note how your body feels.",
    task_type: TaskType::Rest,
    instructions: &[],
  },
];

static FINALE: Template = Template {
  title: "Zen30 Finale",
  description: "Celebrate the month with your favourite session.",
  task_type: TaskType::Workout,
  instructions: &[
    "5 minute warm-up",
    "Repeat your favourite workout from this month",
    "Write down three wins from the challenge",
  ],
};

/// Generic 30-day plan used whenever generation is unavailable or invalid
pub fn fallback_plan() -> Vec<ChallengeTask> {
  (1..=CHALLENGE_DAYS)
    .map(|day| {
      let template = if day == CHALLENGE_DAYS {
        &FINALE
      } else {
        &WEEKLY_CYCLE[((day - 1) % 7) as usize]
      };
      ChallengeTask {
        day,
        title: template.title.to_string(),
        description: template.description.to_string(),
        task_type: template.task_type,
        instructions: template.instructions.iter().map(|s| s.to_string()).collect(),
      }
    })
    .collect()
}

/// ---------------------------------------------------------------------------
/// Planner
/// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct Planner {
  generator: Option<Arc<dyn PlanGenerator>>,
}

impl Planner {
  pub fn new(generator: Option<Arc<dyn PlanGenerator>>) -> Self {
    Self { generator }
  }

  /// New plan for `goal`; never fails
  pub async fn generate(&self, goal: &str, level: ChallengeLevel) -> Vec<ChallengeTask> {
    let Some(generator) = &self.generator else {
      info!("No plan generator configured, using fallback plan");
      return fallback_plan();
    };

    match generator.generate_plan(goal, level).await.and_then(validate_plan) {
      Ok(plan) => {
        info!("Generated {}-day plan for level {}", plan.len(), level);
        plan
      }
      Err(e) => {
        warn!("Plan generation failed, using fallback plan: {}", e);
        fallback_plan()
      }
    }
  }

  /// Apply a free-text change to `current`; keeps `current` on failure
  pub async fn modify(&self, current: &[ChallengeTask], instruction: &str) -> Vec<ChallengeTask> {
    let Some(generator) = &self.generator else {
      warn!("No plan generator configured, keeping current plan");
      return current.to_vec();
    };

    match generator
      .modify_plan(current, instruction)
      .await
      .and_then(validate_plan)
    {
      Ok(plan) => plan,
      Err(e) => {
        warn!("Plan modification failed, keeping current plan: {}", e);
        current.to_vec()
      }
    }
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
