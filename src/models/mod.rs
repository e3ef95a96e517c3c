pub mod challenge;

pub use challenge::{
  ChallengeLevel, ChallengeLog, ChallengeState, ChallengeTask, TaskType, CHALLENGE_DAYS,
};
