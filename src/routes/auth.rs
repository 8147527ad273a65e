//! Whoop OAuth flow
//!
//! The callback never renders an error page: both user-denied grants and
//! state mismatches bounce back to the frontend with ?auth=error so the UI
//! can show its own message.

use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::Json;
use rand::RngCore;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::db::AppState;
use crate::error::ApiError;
use crate::whoop::{build_auth_url, exchange_code_for_tokens, WhoopConfig};

/// GET /auth/whoop
pub async fn start(State(state): State<Arc<AppState>>) -> Result<Redirect, ApiError> {
  let config = WhoopConfig::from_env()?;

  let mut bytes = [0u8; 16];
  rand::thread_rng().fill_bytes(&mut bytes);
  let csrf = hex::encode(bytes);

  // Single pending flow at a time; starting a new one invalidates the old
  sqlx::query("DELETE FROM oauth_state")
    .execute(&state.db)
    .await?;
  sqlx::query("INSERT INTO oauth_state (state) VALUES (?1)")
    .bind(&csrf)
    .execute(&state.db)
    .await?;

  let url = build_auth_url(&config, &csrf)?;
  Ok(Redirect::to(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
  code: Option<String>,
  state: Option<String>,
  error: Option<String>,
  error_description: Option<String>,
}

/// GET /auth/callback
pub async fn callback(
  State(state): State<Arc<AppState>>,
  Query(query): Query<CallbackQuery>,
) -> Redirect {
  match complete_flow(&state, query).await {
    Ok(()) => Redirect::to("/?auth=success"),
    Err(e) => {
      tracing::warn!(error = %e, "oauth callback failed");
      Redirect::to("/?auth=error")
    }
  }
}

async fn complete_flow(state: &AppState, query: CallbackQuery) -> Result<(), ApiError> {
  if let Some(error) = query.error {
    let description = query.error_description.unwrap_or_default();
    return Err(ApiError::BadRequest(format!(
      "OAuth denied: {} {}",
      error, description
    )));
  }
  let code = query
    .code
    .ok_or_else(|| ApiError::BadRequest("missing authorization code".to_string()))?;
  let csrf = query
    .state
    .ok_or_else(|| ApiError::BadRequest("missing state".to_string()))?;

  let stored: Option<(String,)> =
    sqlx::query_as("SELECT state FROM oauth_state WHERE state = ?1")
      .bind(&csrf)
      .fetch_optional(&state.db)
      .await?;
  if stored.is_none() {
    return Err(ApiError::BadRequest("OAuth state mismatch".to_string()));
  }
  sqlx::query("DELETE FROM oauth_state")
    .execute(&state.db)
    .await?;

  let config = WhoopConfig::from_env()?;
  let tokens = exchange_code_for_tokens(&config, &code).await?;
  state.whoop.store().save(&tokens).await?;

  tracing::info!("whoop connected");
  Ok(())
}

/// GET /auth/status
pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
  let authenticated = state.whoop.store().load().await?.is_some();
  Ok(Json(json!({ "authenticated": authenticated })))
}

/// GET /auth/logout
pub async fn logout(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
  state.whoop.store().clear().await?;
  Ok(Json(json!({ "ok": true })))
}
