//! Manually logged basketball sessions (games and practices)

use axum::extract::{Path, State};
use axum::Json;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::db::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Session {
  pub id: i64,
  pub date: String,
  #[serde(rename = "type")]
  #[sqlx(rename = "type")]
  pub session_type: String,
  pub duration_minutes: Option<i64>,
  pub notes: Option<String>,
  pub created_at: NaiveDateTime,
}

/// GET /api/sessions
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Session>>, ApiError> {
  let rows: Vec<Session> =
    sqlx::query_as("SELECT * FROM sessions ORDER BY date DESC LIMIT 50")
      .fetch_all(&state.db)
      .await?;
  Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct NewSession {
  pub date: Option<String>,
  #[serde(rename = "type")]
  pub session_type: Option<String>,
  pub duration_minutes: Option<i64>,
  pub notes: Option<String>,
}

/// POST /api/sessions
pub async fn create(
  State(state): State<Arc<AppState>>,
  Json(body): Json<NewSession>,
) -> Result<Json<Value>, ApiError> {
  let (Some(date), Some(session_type)) = (body.date, body.session_type) else {
    return Err(ApiError::BadRequest("date and type are required".to_string()));
  };

  let result = sqlx::query(
    "INSERT INTO sessions (date, type, duration_minutes, notes) VALUES (?1, ?2, ?3, ?4)",
  )
  .bind(&date)
  .bind(&session_type)
  .bind(body.duration_minutes)
  .bind(&body.notes)
  .execute(&state.db)
  .await?;

  Ok(Json(json!({ "id": result.last_insert_rowid() })))
}

/// DELETE /api/sessions/:id
pub async fn remove(
  State(state): State<Arc<AppState>>,
  Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
  sqlx::query("DELETE FROM sessions WHERE id = ?1")
    .bind(id)
    .execute(&state.db)
    .await?;
  Ok(Json(json!({ "ok": true })))
}
