use serde::Serialize;

/// ---------------------------------------------------------------------------
/// Challenge Errors
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ChallengeError {
  /// Storage unreachable, rejected the write, or holds a corrupt document
  #[error("Persistence failure: {0}")]
  Persistence(String),

  #[error("Plan generation failed: {0}")]
  Generation(String),

  #[error("Validation failed: {0}")]
  Validation(String),

  #[error("No active challenge")]
  NoActiveChallenge,

  #[error("Action cancelled")]
  Cancelled,
}

impl From<sqlx::Error> for ChallengeError {
  fn from(e: sqlx::Error) -> Self {
    ChallengeError::Persistence(e.to_string())
  }
}

impl From<serde_json::Error> for ChallengeError {
  fn from(e: serde_json::Error) -> Self {
    ChallengeError::Persistence(format!("Corrupt challenge document: {}", e))
  }
}

impl Serialize for ChallengeError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_serializes_as_display_string() {
    let err = ChallengeError::Validation("goal must not be empty".to_string());
    let json = serde_json::to_string(&err).unwrap();
    assert_eq!(json, "\"Validation failed: goal must not be empty\"");
  }

  #[test]
  fn test_json_error_maps_to_persistence() {
    let parse = serde_json::from_str::<Vec<u32>>("not json").unwrap_err();
    let err: ChallengeError = parse.into();
    assert!(matches!(err, ChallengeError::Persistence(_)));
  }
}
