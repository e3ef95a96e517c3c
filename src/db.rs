use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::fs;
use std::path::PathBuf;
use tauri::Manager;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::AppConfig;
use crate::pedometer::StepSubscription;
use crate::planner::Planner;
use crate::store::SqliteChallengeStore;

pub type DbPool = SqlitePool;

/// Application state shared by every command
pub struct AppState {
  pub db: DbPool,
  /// Shared by every command so challenge writes go through one lock
  pub store: SqliteChallengeStore,
  /// Owner of the challenge document
  pub user_id: String,
  pub planner: Planner,
  /// Running step counter, if any
  pub pedometer: Mutex<Option<StepSubscription>>,
}

impl AppState {
  pub fn new(db: DbPool, user_id: impl Into<String>, planner: Planner) -> Self {
    Self {
      store: SqliteChallengeStore::new(db.clone()),
      db,
      user_id: user_id.into(),
      planner,
      pedometer: Mutex::new(None),
    }
  }
}

/// Get the path to the database file inside the app data directory
fn get_db_path<R: tauri::Runtime>(
  app: &tauri::AppHandle<R>,
  config: &AppConfig,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
  let data_dir = app
    .path()
    .app_data_dir()
    .map_err(|e| format!("Failed to get app data dir: {}", e))?;

  fs::create_dir_all(&data_dir)?;

  Ok(data_dir.join(&config.database_file))
}

/// Initialize the database connection pool and run migrations
pub async fn initialize_db<R: tauri::Runtime>(
  app: &tauri::AppHandle<R>,
  config: &AppConfig,
) -> Result<DbPool, Box<dyn std::error::Error>> {
  let db_path = get_db_path(app, config)?;
  let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

  info!("Initializing database at: {}", db_path.display());

  let pool = SqlitePoolOptions::new()
    .max_connections(5)
    .connect(&db_url)
    .await?;

  sqlx::migrate!("./migrations").run(&pool).await?;

  info!("Database initialized successfully");

  Ok(pool)
}
