//! HTTP surface: OAuth flow, Whoop data endpoints, briefs, and session log
//!
//! Everything under /api and /auth is JSON except /api/brief (plain text) and
//! /api/ai-suggest (SSE). Unmatched paths fall through to the static frontend.

mod auth;
mod brief;
mod sessions;
mod whoop;

use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::db::AppState;

pub fn router(state: Arc<AppState>) -> Router {
  let frontend = ServeDir::new("public").fallback(ServeFile::new("public/index.html"));

  Router::new()
    .route("/auth/whoop", get(auth::start))
    .route("/auth/callback", get(auth::callback))
    .route("/auth/status", get(auth::status))
    .route("/auth/logout", get(auth::logout))
    .route("/api/recovery", get(whoop::recovery))
    .route("/api/sleep", get(whoop::sleep))
    .route("/api/workout", get(whoop::workout))
    .route("/api/cycle", get(whoop::cycle))
    .route("/api/weekly", get(whoop::weekly))
    .route("/api/ready", get(whoop::ready))
    .route("/api/strength", get(whoop::strength))
    .route("/api/stats", get(whoop::stats))
    .route("/api/brief", get(brief::brief))
    .route("/api/ai-suggest", post(brief::ai_suggest))
    .route("/api/sessions", get(sessions::list).post(sessions::create))
    .route("/api/sessions/:id", delete(sessions::remove))
    .fallback_service(frontend)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
