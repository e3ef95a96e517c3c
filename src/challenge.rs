//! Challenge Progress Engine
//!
//! Pure state transitions and aggregation for a 30-day challenge:
//! - current day resolved from elapsed wall-clock time since the start date
//! - per-day and overall completion percentages
//! - completion policy driven by the day's checklist
//! - plan mutation (single-task edit, full replacement) and lifecycle resets
//!
//! Nothing here touches storage; the service sequences these against the
//! persistence collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::ChallengeError;
use crate::models::{
    ChallengeLevel, ChallengeLog, ChallengeState, ChallengeTask, TaskType, CHALLENGE_DAYS,
};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

// ---------------------------------------------------------------------------
/// Current-Day Resolver
// ---------------------------------------------------------------------------

/// 1-based day of the challenge, clamped to `[1, 30]`.
///
/// Uses the absolute distance to the start date, so a start date in the
/// future maps to an early day instead of failing.
pub fn current_day(start_date: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let elapsed_ms = (now - start_date).num_milliseconds().unsigned_abs() as f64;
    let days = (elapsed_ms / MILLIS_PER_DAY).ceil();
    days.clamp(1.0, CHALLENGE_DAYS as f64) as u32
}

// ---------------------------------------------------------------------------
/// Completion Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionChange {
    /// Checklist became full, day should be marked complete
    Completed,
    /// Checklist dropped below full on a completed day
    Reopened,
    Unchanged,
}

/// Decide how saving `log` affects the completion of `task`.
///
/// Rest days and days without instructions are never toggled here; their
/// completion is manual only. A manually completed day with a partial
/// checklist is reopened like an auto-completed one.
pub fn completion_change(
    task: &ChallengeTask,
    log: &ChallengeLog,
    was_complete: bool,
) -> CompletionChange {
    if !task.has_checklist() {
        return CompletionChange::Unchanged;
    }

    let total = task.instructions.len();
    let checked = checked_count(task, log);

    if checked == total && !was_complete {
        CompletionChange::Completed
    } else if checked < total && was_complete {
        CompletionChange::Reopened
    } else {
        CompletionChange::Unchanged
    }
}

/// Rounded percentage that only reads 100 once `done == total`
fn percent_of(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let percent = ((done as f64 / total as f64) * 100.0).round() as u32;
    if done < total {
        percent.min(99)
    } else {
        percent
    }
}

fn checked_count(task: &ChallengeTask, log: &ChallengeLog) -> usize {
    let total = task.instructions.len();
    log.checked_indices.iter().filter(|&&i| i < total).count()
}

// ---------------------------------------------------------------------------
/// Progress Aggregation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayProgress {
    pub day: u32,
    pub task_type: TaskType,
    pub checked: usize,
    pub total: usize,
    pub percent: u32,
    pub completed: bool,
}

impl DayProgress {
    pub fn compute(task: &ChallengeTask, completed: bool, log: Option<&ChallengeLog>) -> Self {
        let total = if task.has_checklist() {
            task.instructions.len()
        } else {
            0
        };
        let checked = match log {
            Some(log) if total > 0 => checked_count(task, log),
            _ => 0,
        };

        // Manual completion overrides a partial checklist
        let percent = if completed {
            100
        } else {
            percent_of(checked, total)
        };

        Self {
            day: task.day,
            task_type: task.task_type,
            checked,
            total,
            percent,
            completed,
        }
    }

    /// Units this day contributes to the overall percentage
    fn units(&self) -> (usize, usize) {
        if self.total == 0 {
            (usize::from(self.completed), 1)
        } else {
            (self.checked, self.total)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub current_day: u32,
    pub days: Vec<DayProgress>,
    pub completed_units: usize,
    pub total_units: usize,
    pub overall_percent: u32,
    pub days_done: usize,
    pub days_left: u32,
}

impl ProgressSummary {
    pub fn compute(state: &ChallengeState, now: DateTime<Utc>) -> Self {
        let days: Vec<DayProgress> = state
            .plan
            .iter()
            .map(|task| {
                DayProgress::compute(
                    task,
                    state.completed_days.contains(&task.day),
                    state.logs.get(&task.day),
                )
            })
            .collect();

        let (completed_units, total_units) = days
            .iter()
            .map(DayProgress::units)
            .fold((0, 0), |(done, total), (d, t)| (done + d, total + t));

        let overall_percent = percent_of(completed_units, total_units);

        let days_done = state.completed_days.len();

        Self {
            current_day: current_day(state.start_date, now),
            days,
            completed_units,
            total_units,
            overall_percent,
            days_done,
            days_left: CHALLENGE_DAYS.saturating_sub(days_done as u32),
        }
    }
}

// ---------------------------------------------------------------------------
/// Lifecycle Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChallengeStatus {
    NoChallenge,
    Active {
        current_day: u32,
        /// Day 30 has been reached; the plan stays up until deleted or restarted
        window_elapsed: bool,
    },
}

impl ChallengeStatus {
    pub fn of(state: Option<&ChallengeState>, now: DateTime<Utc>) -> Self {
        match state {
            Some(state) if state.is_active() => {
                let day = current_day(state.start_date, now);
                ChallengeStatus::Active {
                    current_day: day,
                    window_elapsed: day >= CHALLENGE_DAYS,
                }
            }
            _ => ChallengeStatus::NoChallenge,
        }
    }
}

// ---------------------------------------------------------------------------
/// State Transitions
// ---------------------------------------------------------------------------

/// Force day numbers to follow plan order (day := index + 1)
pub fn renumber(plan: Vec<ChallengeTask>) -> Vec<ChallengeTask> {
    plan.into_iter()
        .enumerate()
        .map(|(i, mut task)| {
            task.day = i as u32 + 1;
            task
        })
        .collect()
}

impl ChallengeState {
    /// Fresh challenge starting `now` with no completions or logs
    pub fn new(
        goal: String,
        level: Option<ChallengeLevel>,
        plan: Vec<ChallengeTask>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            start_date: now,
            completed_days: BTreeSet::new(),
            goal: Some(goal),
            level,
            plan: renumber(plan),
            logs: Default::default(),
        }
    }

    /// An empty plan means there is no challenge running
    pub fn is_active(&self) -> bool {
        !self.plan.is_empty()
    }

    pub fn task(&self, day: u32) -> Result<&ChallengeTask, ChallengeError> {
        if !self.is_active() {
            return Err(ChallengeError::NoActiveChallenge);
        }
        self.plan
            .iter()
            .find(|t| t.day == day)
            .ok_or_else(|| ChallengeError::Validation(format!("Day {} is not in the plan", day)))
    }

    /// Log for `day`, empty when nothing has been recorded yet
    pub fn log(&self, day: u32) -> ChallengeLog {
        self.logs.get(&day).cloned().unwrap_or_default()
    }

    pub fn is_day_complete(&self, day: u32) -> bool {
        self.completed_days.contains(&day)
    }

    /// How saving `log` for `day` should change the day's completion
    pub fn completion_change_for(
        &self,
        day: u32,
        log: &ChallengeLog,
    ) -> Result<CompletionChange, ChallengeError> {
        let task = self.task(day)?;
        Ok(completion_change(task, log, self.is_day_complete(day)))
    }

    /// Store a log for `day`, dropping checked indices outside its checklist
    pub fn put_log(&mut self, day: u32, mut log: ChallengeLog) -> Result<(), ChallengeError> {
        let task = self.task(day)?;
        let len = if task.task_type == TaskType::Rest {
            0
        } else {
            task.instructions.len()
        };
        log.retain_within(len);
        self.logs.insert(day, log);
        Ok(())
    }

    /// Store a log for `day` and apply the completion policy to it
    pub fn apply_log(
        &mut self,
        day: u32,
        log: ChallengeLog,
    ) -> Result<CompletionChange, ChallengeError> {
        self.put_log(day, log)?;
        let change = self.completion_change_for(day, &self.log(day))?;
        if change != CompletionChange::Unchanged {
            self.mark_day(day, change == CompletionChange::Completed)?;
        }
        Ok(change)
    }

    /// Mark or unmark a day. Returns whether anything changed.
    pub fn mark_day(&mut self, day: u32, complete: bool) -> Result<bool, ChallengeError> {
        self.task(day)?;
        let changed = if complete {
            self.completed_days.insert(day)
        } else {
            self.completed_days.remove(&day)
        };
        Ok(changed)
    }

    /// Replace the task with the same day number; completions and logs stay
    pub fn replace_task(&mut self, task: ChallengeTask) -> Result<(), ChallengeError> {
        if !self.is_active() {
            return Err(ChallengeError::NoActiveChallenge);
        }
        let slot = self
            .plan
            .iter_mut()
            .find(|t| t.day == task.day)
            .ok_or_else(|| {
                ChallengeError::Validation(format!("Day {} is not in the plan", task.day))
            })?;
        *slot = task;

        // Keep the log invariant if the checklist got shorter
        if let Some(log) = self.logs.get_mut(&slot.day) {
            let len = if slot.task_type == TaskType::Rest {
                0
            } else {
                slot.instructions.len()
            };
            log.retain_within(len);
        }
        Ok(())
    }

    /// Swap in a whole new plan, keeping completions and logs by day number.
    ///
    /// Returns the number of days whose retained progress now sits next to
    /// different task content.
    pub fn replace_plan(&mut self, plan: Vec<ChallengeTask>) -> usize {
        let plan = renumber(plan);
        let carried_over = plan
            .iter()
            .filter(|new| {
                let before = self.plan.iter().find(|old| old.day == new.day);
                let has_progress =
                    self.completed_days.contains(&new.day) || self.logs.contains_key(&new.day);
                has_progress && before != Some(*new)
            })
            .count();

        self.plan = plan;
        for (day, log) in self.logs.iter_mut() {
            let len = self
                .plan
                .iter()
                .find(|t| t.day == *day)
                .filter(|t| t.task_type != TaskType::Rest)
                .map(|t| t.instructions.len())
                .unwrap_or(0);
            log.retain_within(len);
        }
        carried_over
    }

    /// Start over from `now`, optionally with a new plan
    pub fn restart(&mut self, now: DateTime<Utc>, plan: Option<Vec<ChallengeTask>>) {
        self.start_date = now;
        self.completed_days.clear();
        self.logs.clear();
        if let Some(plan) = plan {
            self.plan = renumber(plan);
        }
    }
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
