mod challenge;
mod commands;
mod config;
mod db;
mod error;
mod feedback;
mod llm;
mod models;
mod pedometer;
mod planner;
mod service;
mod store;

#[cfg(test)]
mod test_utils;

use config::AppConfig;
use db::AppState;
use llm::ClaudeClient;
use planner::{PlanGenerator, Planner};
use std::sync::Arc;
use tauri::Manager;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Use the Claude planner when an API key is configured, the static plan otherwise
fn build_planner() -> Planner {
  match ClaudeClient::from_env() {
    Ok(client) => {
      info!("Plan generation enabled");
      Planner::new(Some(Arc::new(client) as Arc<dyn PlanGenerator>))
    }
    Err(e) => {
      warn!("Plan generation disabled, using the built-in plan: {}", e);
      Planner::default()
    }
  }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "zen30_lib=info".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = AppConfig::from_env();

  tauri::Builder::default()
    .plugin(tauri_plugin_opener::init())
    .setup(move |app| {
      let app_handle = app.handle().clone();
      tauri::async_runtime::block_on(async move {
        match db::initialize_db(&app_handle, &config).await {
          Ok(pool) => {
            let state = Arc::new(AppState::new(pool, config.user_id.clone(), build_planner()));
            app_handle.manage(state);
            info!("Database ready for user {}", config.user_id);
          }
          Err(e) => {
            error!("Failed to initialize database: {}", e);
          }
        }
      });
      Ok(())
    })
    .invoke_handler(tauri::generate_handler![
      // Challenge commands
      commands::challenge::get_challenge,
      commands::challenge::create_challenge,
      commands::challenge::save_day_log,
      commands::challenge::set_day_complete,
      commands::challenge::update_challenge_task,
      commands::challenge::remix_challenge,
      commands::challenge::restart_challenge,
      commands::challenge::delete_challenge,
      // Settings commands
      commands::settings::get_feedback_settings,
      commands::settings::set_feedback_muted,
      // Pedometer commands
      commands::pedometer::start_step_counter,
      commands::pedometer::record_motion_samples,
      commands::pedometer::stop_step_counter,
      commands::pedometer::get_today_steps,
    ])
    .run(tauri::generate_context!())
    .expect("error while running tauri application");
}
