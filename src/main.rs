use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
  dotenvy::dotenv().ok();

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("morning_brief=info,tower_http=info")),
    )
    .init();

  if let Err(e) = morning_brief::serve().await {
    tracing::error!(error = %e, "server failed to start");
    std::process::exit(1);
  }
}
