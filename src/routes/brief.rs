//! Morning brief endpoints: the plain-text summary and the streamed Claude
//! suggestion
//!
//! /api/brief is consumed by an iOS Shortcut, so it answers in plain text and
//! never lets a Claude hiccup break the response. /api/ai-suggest checks its
//! preconditions (API key, Whoop credential, data fetch) before opening the
//! SSE stream; once streaming, failures travel inside the stream.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Local;
use futures_util::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;

use crate::brief::{compose_coaching_prompt, compose_prompt_context, compose_short_brief, TodaySnapshot};
use crate::db::AppState;
use crate::error::ApiError;
use crate::relay::relay;
use crate::trends::analyze;
use crate::whoop::{latest_completed_cycle, RecoveryRecord, WhoopError};

const SUGGEST_MAX_TOKENS: u32 = 400;
const COACHING_LINE_MAX_TOKENS: u32 = 100;

/// 30-day HRV baseline for the vs-average annotation on the brief
fn avg_hrv(recoveries: &[RecoveryRecord]) -> Option<i64> {
  let values: Vec<f64> = recoveries
    .iter()
    .filter_map(|r| r.score.as_ref())
    .filter_map(|s| s.hrv_rmssd_milli)
    .map(|v| v.round())
    .collect();
  if values.is_empty() {
    return None;
  }
  Some((values.iter().sum::<f64>() / values.len() as f64).round() as i64)
}

async fn build_brief_text(state: &AppState) -> Result<String, ApiError> {
  let whoop = &state.whoop;
  let (recoveries, sleeps, cycles) = tokio::try_join!(
    whoop.fetch_recoveries(30),
    whoop.fetch_sleep(1),
    whoop.fetch_cycles(2),
  )?;

  let today = TodaySnapshot::from_records(
    recoveries.first(),
    sleeps.first(),
    latest_completed_cycle(&cycles),
  );

  let mut text = compose_short_brief(Local::now().date_naive(), &today, avg_hrv(&recoveries));

  // The coaching line is a bonus; Claude being down or unconfigured must not
  // cost the reader their numbers
  match state.claude() {
    Ok(claude) => {
      match claude
        .complete(&compose_coaching_prompt(&text), COACHING_LINE_MAX_TOKENS)
        .await
      {
        Ok(line) => {
          text.push('\n');
          text.push_str(line.trim());
        }
        Err(e) => tracing::warn!(error = %e, "coaching line unavailable"),
      }
    }
    Err(e) => tracing::debug!(error = %e, "coaching line skipped"),
  }

  Ok(text)
}

/// GET /api/brief
pub async fn brief(State(state): State<Arc<AppState>>) -> Response {
  match build_brief_text(&state).await {
    Ok(text) => text.into_response(),
    Err(ApiError::Whoop(WhoopError::NotAuthenticated)) => (
      StatusCode::UNAUTHORIZED,
      WhoopError::NotAuthenticated.to_string(),
    )
      .into_response(),
    Err(e) => {
      tracing::error!(error = %e, "brief failed");
      (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
    }
  }
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestBody {
  #[serde(default)]
  routine: Vec<String>,
}

/// POST /api/ai-suggest
pub async fn ai_suggest(
  State(state): State<Arc<AppState>>,
  body: Option<Json<SuggestBody>>,
) -> Result<Response, ApiError> {
  // Fail fast before committing to an SSE response
  let claude = state.claude()?;

  let whoop = &state.whoop;
  let (recoveries, sleeps, cycles) = tokio::try_join!(
    whoop.fetch_recoveries(60),
    whoop.fetch_sleep(1),
    whoop.fetch_cycles(60),
  )?;

  let today = TodaySnapshot::from_records(
    recoveries.first(),
    sleeps.first(),
    latest_completed_cycle(&cycles),
  );
  let summary = analyze(&recoveries, &cycles);

  let Json(body) = body.unwrap_or_default();
  let routine = if body.routine.is_empty() {
    state.routine.clone()
  } else {
    body.routine
  };

  let prompt = compose_prompt_context(&today, summary.as_ref(), &routine);
  let upstream = claude.complete_stream(prompt, SUGGEST_MAX_TOKENS);

  let stream = relay(upstream)
    .map(|unit| Ok::<_, Infallible>(Event::default().data(unit.sse_data())));

  Ok(
    Sse::new(stream)
      .keep_alive(KeepAlive::default())
      .into_response(),
  )
}
