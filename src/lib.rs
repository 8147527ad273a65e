//! Personal Whoop dashboard server: trend analysis, morning briefs, and a
//! streamed Claude coaching suggestion

pub mod brief;
pub mod db;
pub mod error;
pub mod llm;
pub mod relay;
pub mod routes;
pub mod trends;
pub mod whoop;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use db::AppState;
use whoop::{TokenStore, WhoopClient, WhoopConfig};

/// Build the application state and run the HTTP server until shutdown
pub async fn serve() -> Result<(), Box<dyn std::error::Error>> {
  let pool = db::initialize_db().await?;
  let config = WhoopConfig::from_env()?;

  let state = Arc::new(AppState {
    db: pool.clone(),
    whoop: WhoopClient::new(config, TokenStore::new(pool)),
    routine: db::routine_from_env(),
  });

  let app = routes::router(state);

  let port: u16 = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse().ok())
    .unwrap_or(3000);
  let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
  tracing::info!(port, "listening");

  axum::serve(listener, app).await?;
  Ok(())
}
