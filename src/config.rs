use std::env;

const DEFAULT_USER_ID: &str = "local";
const DEFAULT_DB_FILE: &str = "zen30.db";

/// Runtime settings read once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
  /// Owner of the challenge document. Sign-in lives outside this app,
  /// so a configured id stands in for the authenticated user.
  pub user_id: String,
  /// File name of the SQLite database inside the app data directory
  pub database_file: String,
}

impl AppConfig {
  pub fn from_env() -> Self {
    Self {
      user_id: non_empty_var("ZEN30_USER_ID").unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
      database_file: non_empty_var("ZEN30_DB_FILE").unwrap_or_else(|| DEFAULT_DB_FILE.to_string()),
    }
  }
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      user_id: DEFAULT_USER_ID.to_string(),
      database_file: DEFAULT_DB_FILE.to_string(),
    }
  }
}

pub(crate) fn non_empty_var(key: &str) -> Option<String> {
  env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
