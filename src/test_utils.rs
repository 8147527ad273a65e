//! Test utilities and helpers for integration and unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Whoop record factories
//! - Credential seeding

use chrono::{Duration, TimeZone, Utc};
use sqlx::SqlitePool;

use crate::whoop::{
  CycleRecord, CycleScore, RecoveryRecord, RecoveryScore, TokenStore, WhoopTokens,
};

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// Store a Whoop credential expiring the given number of minutes from now
/// (negative for an already-expired token). Access token is "access",
/// refresh token is "refresh".
pub async fn seed_tokens(pool: &SqlitePool, minutes_until_expiry: i64) {
  let tokens = WhoopTokens {
    access_token: "access".to_string(),
    refresh_token: "refresh".to_string(),
    expires_at: Utc::now() + Duration::minutes(minutes_until_expiry),
  };

  TokenStore::new(pool.clone())
    .save(&tokens)
    .await
    .expect("Failed to seed tokens");
}

/// ---------------------------------------------------------------------------
/// Whoop Record Factories
/// ---------------------------------------------------------------------------

/// Create a recovery record for a cycle. A None recovery score still produces
/// a scored record shell so tests can exercise partial data.
pub fn recovery_record(
  cycle_id: i64,
  recovery_score: Option<f64>,
  hrv: Option<f64>,
) -> RecoveryRecord {
  RecoveryRecord {
    cycle_id,
    score: Some(RecoveryScore {
      recovery_score,
      hrv_rmssd_milli: hrv,
      resting_heart_rate: Some(50),
      spo2_percentage: None,
    }),
  }
}

/// Create a cycle record starting `days_ago` days before a fixed reference
/// date, so calendar ordering in tests is deterministic
pub fn cycle_record(id: i64, days_ago: i64, completed: bool, strain: Option<f64>) -> CycleRecord {
  let start = Utc.with_ymd_and_hms(2024, 6, 30, 4, 0, 0).unwrap() - Duration::days(days_ago);

  CycleRecord {
    id,
    start,
    end: completed.then(|| start + Duration::hours(23)),
    score: Some(CycleScore { strain }),
  }
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('whoop_auth', 'oauth_state', 'sessions')",
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert_eq!(tables.len(), 3);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_seed_tokens_round_trips() {
    let pool = setup_test_db().await;
    seed_tokens(&pool, 60).await;

    let tokens = TokenStore::new(pool.clone()).load().await.unwrap().unwrap();
    assert_eq!(tokens.access_token, "access");
    assert!(!tokens.needs_refresh());

    teardown_test_db(pool).await;
  }

  #[test]
  fn test_cycle_factory_orders_by_days_ago() {
    let newer = cycle_record(2, 0, true, None);
    let older = cycle_record(1, 3, true, None);

    assert!(newer.start > older.start);
    assert!(newer.end.is_some());
    assert!(cycle_record(3, 0, false, None).end.is_none());
  }
}
