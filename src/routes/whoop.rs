//! Raw Whoop data endpoints backing the dashboard widgets

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::db::AppState;
use crate::error::ApiError;
use crate::whoop::{
  latest_completed_cycle, CycleRecord, RecoveryRecord, SleepRecord, WorkoutRecord,
};

/// Sport names matching any of these count as strength work
const STRENGTH_KEYWORDS: [&str; 7] = [
  "weight",
  "strength",
  "power",
  "functional",
  "crossfit",
  "resistance",
  "lift",
];

/// GET /api/recovery
pub async fn recovery(
  State(state): State<Arc<AppState>>,
) -> Result<Json<Option<RecoveryRecord>>, ApiError> {
  let records = state.whoop.fetch_recoveries(1).await?;
  Ok(Json(records.into_iter().next()))
}

/// GET /api/sleep
pub async fn sleep(
  State(state): State<Arc<AppState>>,
) -> Result<Json<Option<SleepRecord>>, ApiError> {
  let records = state.whoop.fetch_sleep(1).await?;
  Ok(Json(records.into_iter().next()))
}

/// GET /api/workout
pub async fn workout(
  State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<WorkoutRecord>>, ApiError> {
  let records = state.whoop.fetch_workouts(5).await?;
  Ok(Json(records))
}

/// GET /api/cycle
pub async fn cycle(
  State(state): State<Arc<AppState>>,
) -> Result<Json<Option<CycleRecord>>, ApiError> {
  let records = state.whoop.fetch_cycles(2).await?;
  Ok(Json(latest_completed_cycle(&records).cloned()))
}

/// One chart row: the cycle with its recovery score joined on
#[derive(Debug, Serialize)]
pub struct WeeklyDay {
  #[serde(flatten)]
  pub cycle: CycleRecord,
  pub recovery_score: Option<f64>,
}

fn merge_weekly(cycles: Vec<CycleRecord>, recoveries: &[RecoveryRecord]) -> Vec<WeeklyDay> {
  cycles
    .into_iter()
    .map(|cycle| {
      let recovery_score = recoveries
        .iter()
        .find(|r| r.cycle_id == cycle.id)
        .and_then(|r| r.score.as_ref())
        .and_then(|s| s.recovery_score);
      WeeklyDay {
        cycle,
        recovery_score,
      }
    })
    .collect()
}

/// GET /api/weekly
pub async fn weekly(State(state): State<Arc<AppState>>) -> Result<Json<Vec<WeeklyDay>>, ApiError> {
  let (cycles, recoveries) = tokio::try_join!(
    state.whoop.fetch_cycles(7),
    state.whoop.fetch_recoveries(7),
  )?;
  Ok(Json(merge_weekly(cycles, &recoveries)))
}

/// GET /api/ready
///
/// True once Whoop has processed today's recovery score. Any failure reads as
/// "not ready yet" so pollers never see an error.
pub async fn ready(State(state): State<Arc<AppState>>) -> Json<Value> {
  let ready = match state.whoop.fetch_recoveries(1).await {
    Ok(records) => records
      .first()
      .and_then(|r| r.score.as_ref())
      .and_then(|s| s.recovery_score)
      .map_or(false, |score| score > 0.0),
    Err(_) => false,
  };
  Json(json!({ "ready": ready }))
}

fn is_strength(workout: &WorkoutRecord) -> bool {
  let sport = workout
    .sport_name
    .as_deref()
    .unwrap_or_default()
    .to_lowercase();
  STRENGTH_KEYWORDS.iter().any(|k| sport.contains(k))
}

/// GET /api/strength
///
/// Keyword-filtered strength sessions; when nothing matches, the most recent
/// few workouts stand in so the panel is never empty.
pub async fn strength(
  State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<WorkoutRecord>>, ApiError> {
  let all = state.whoop.fetch_workouts(20).await?;

  let matched: Vec<WorkoutRecord> = all.iter().filter(|w| is_strength(w)).cloned().collect();
  if matched.is_empty() {
    Ok(Json(all.into_iter().take(6).collect()))
  } else {
    Ok(Json(matched))
  }
}

fn rounded_mean(values: &[f64]) -> Option<i64> {
  if values.is_empty() {
    return None;
  }
  Some((values.iter().sum::<f64>() / values.len() as f64).round() as i64)
}

fn stats_payload(recoveries: &[RecoveryRecord]) -> Value {
  let hrv_values: Vec<f64> = recoveries
    .iter()
    .filter_map(|r| r.score.as_ref())
    .filter_map(|s| s.hrv_rmssd_milli)
    .map(|v| v.round())
    .collect();
  let recovery_values: Vec<f64> = recoveries
    .iter()
    .filter_map(|r| r.score.as_ref())
    .filter_map(|s| s.recovery_score)
    .collect();

  json!({
    "avgHRV": rounded_mean(&hrv_values),
    "avgRecovery": rounded_mean(&recovery_values),
    "dataPoints": recoveries.len(),
  })
}

/// GET /api/stats
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
  let recoveries = state.whoop.fetch_recoveries(30).await?;
  Ok(Json(stats_payload(&recoveries)))
}
