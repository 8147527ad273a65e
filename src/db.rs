use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::fs;
use std::path::PathBuf;

use crate::llm::ClaudeClient;
use crate::whoop::WhoopClient;

pub type DbPool = SqlitePool;

/// Shared state for the HTTP handlers
pub struct AppState {
  pub db: DbPool,
  pub whoop: WhoopClient,
  pub routine: Vec<String>,
}

impl AppState {
  /// The Claude client is built per request so a key added to the environment
  /// after startup is picked up without a restart
  pub fn claude(&self) -> Result<ClaudeClient, crate::llm::LlmError> {
    ClaudeClient::from_env()
  }
}

/// Database file location, overridable for deployments that mount a volume
fn db_path() -> PathBuf {
  std::env::var("DATABASE_PATH")
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from("morning-brief.db"))
}

/// Initialize the database connection pool and run migrations
pub async fn initialize_db() -> Result<DbPool, Box<dyn std::error::Error>> {
  let path = db_path();
  if let Some(parent) = path.parent() {
    if !parent.as_os_str().is_empty() {
      fs::create_dir_all(parent)?;
    }
  }

  let db_url = format!("sqlite://{}?mode=rwc", path.display());
  tracing::info!(path = %path.display(), "initializing database");

  let pool = SqlitePoolOptions::new()
    .max_connections(5)
    .connect(&db_url)
    .await?;

  sqlx::migrate!("./migrations").run(&pool).await?;

  Ok(pool)
}

/// Comma-separated MORNING_ROUTINE env var, empty when unset
pub fn routine_from_env() -> Vec<String> {
  std::env::var("MORNING_ROUTINE")
    .map(|raw| {
      raw
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn test_routine_from_env_splits_and_trims() {
    temp_env::with_var("MORNING_ROUTINE", Some("Stretch, Hydrate ,,Protein"), || {
      assert_eq!(routine_from_env(), vec!["Stretch", "Hydrate", "Protein"]);
    });
  }

  #[test]
  #[serial]
  fn test_routine_from_env_defaults_empty() {
    temp_env::with_var_unset("MORNING_ROUTINE", || {
      assert!(routine_from_env().is_empty());
    });
  }
}
