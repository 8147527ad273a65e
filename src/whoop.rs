//! Whoop API integration: OAuth, token refresh, and record fetching
//!
//! This module handles the Whoop developer API. Tokens are stored in SQLite
//! and refreshed transparently before they expire; every fetch goes through
//! the stored credential.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;

use crate::db::DbPool;

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

const WHOOP_AUTH_URL: &str = "https://api.prod.whoop.com/oauth/oauth2/auth";
const WHOOP_TOKEN_URL: &str = "https://api.prod.whoop.com/oauth/oauth2/token";
const WHOOP_API_BASE: &str = "https://api.prod.whoop.com/developer";
const OAUTH_SCOPES: &str =
  "offline read:recovery read:cycles read:sleep read:workout read:body_measurement read:profile";
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

/// ---------------------------------------------------------------------------
/// OAuth Data Structures
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WhoopConfig {
  pub client_id: String,
  pub client_secret: String,
  pub redirect_uri: String,
}

impl WhoopConfig {
  pub fn from_env() -> Result<Self, WhoopError> {
    Ok(Self {
      client_id: env::var("WHOOP_CLIENT_ID")
        .map_err(|_| WhoopError::MissingConfig("WHOOP_CLIENT_ID".into()))?,
      client_secret: env::var("WHOOP_CLIENT_SECRET")
        .map_err(|_| WhoopError::MissingConfig("WHOOP_CLIENT_SECRET".into()))?,
      redirect_uri: default_redirect_uri(),
    })
  }
}

/// Redirect URI derived from APP_URL, falling back to localhost on PORT
fn default_redirect_uri() -> String {
  if let Ok(base) = env::var("APP_URL") {
    return format!("{}/auth/callback", base.trim_end_matches('/'));
  }
  let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
  format!("http://localhost:{}/auth/callback", port)
}

/// Response from the Whoop token endpoint
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_in: i64, // seconds
  pub token_type: Option<String>,
}

/// Stored token state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhoopTokens {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_at: DateTime<Utc>,
}

impl WhoopTokens {
  pub fn from_response(resp: TokenResponse) -> Self {
    let expires_at = Utc::now() + Duration::seconds(resp.expires_in);
    Self {
      access_token: resp.access_token,
      refresh_token: resp.refresh_token,
      expires_at,
    }
  }

  pub fn needs_refresh(&self) -> bool {
    let buffer = Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES);
    Utc::now() + buffer >= self.expires_at
  }
}

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WhoopError {
  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  #[error("Not authenticated. Connect Whoop first.")]
  NotAuthenticated,

  #[error("HTTP request failed: {0}")]
  Request(String),

  #[error("OAuth error: {0}")]
  OAuth(String),

  #[error("Whoop API {path} failed: {status} {body}")]
  Api {
    path: String,
    status: u16,
    body: String,
  },

  #[error("Database error: {0}")]
  Database(String),
}

impl From<reqwest::Error> for WhoopError {
  fn from(e: reqwest::Error) -> Self {
    WhoopError::Request(e.to_string())
  }
}

impl From<sqlx::Error> for WhoopError {
  fn from(e: sqlx::Error) -> Self {
    WhoopError::Database(e.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Whoop Record Types
/// ---------------------------------------------------------------------------

/// Paged collection wrapper used by every Whoop list endpoint
#[derive(Debug, Deserialize)]
pub struct PaginatedResponse<T> {
  #[serde(default = "Vec::new")]
  pub records: Vec<T>,
  #[allow(dead_code)]
  pub next_token: Option<String>,
}

/// One recovery per physiological cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryRecord {
  pub cycle_id: i64,
  pub score: Option<RecoveryScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryScore {
  pub recovery_score: Option<f64>,
  pub hrv_rmssd_milli: Option<f64>,
  pub resting_heart_rate: Option<i64>,
  pub spo2_percentage: Option<f64>,
}

/// One cycle per ~24h physiological day; `end == None` means still in progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleRecord {
  pub id: i64,
  pub start: DateTime<Utc>,
  pub end: Option<DateTime<Utc>>,
  pub score: Option<CycleScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleScore {
  pub strain: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepRecord {
  pub score: Option<SleepScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepScore {
  pub sleep_performance_percentage: Option<f64>,
  pub sleep_needed: Option<SleepNeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepNeed {
  pub baseline_milli: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutRecord {
  pub id: Option<serde_json::Value>,
  pub sport_name: Option<String>,
  pub start: Option<DateTime<Utc>>,
  pub end: Option<DateTime<Utc>>,
  pub score: Option<WorkoutScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutScore {
  pub strain: Option<f64>,
  pub kilojoule: Option<f64>,
  pub average_heart_rate: Option<i64>,
}

/// The most recent completed cycle is "yesterday" for brief purposes.
/// An in-progress cycle is never treated as a completed day; it is only the
/// fallback when no completed cycle exists in the window.
pub fn latest_completed_cycle(records: &[CycleRecord]) -> Option<&CycleRecord> {
  records
    .iter()
    .find(|c| c.end.is_some())
    .or_else(|| records.first())
}

/// ---------------------------------------------------------------------------
/// OAuth URL Generation
/// ---------------------------------------------------------------------------

pub fn build_auth_url(config: &WhoopConfig, state: &str) -> Result<String, WhoopError> {
  let mut url = url::Url::parse(WHOOP_AUTH_URL).map_err(|e| WhoopError::OAuth(e.to_string()))?;

  url
    .query_pairs_mut()
    .append_pair("client_id", &config.client_id)
    .append_pair("redirect_uri", &config.redirect_uri)
    .append_pair("response_type", "code")
    .append_pair("scope", OAUTH_SCOPES)
    .append_pair("state", state);

  Ok(url.to_string())
}

/// ---------------------------------------------------------------------------
/// Token Exchange (Authorization Code -> Tokens)
/// ---------------------------------------------------------------------------

pub async fn exchange_code_for_tokens(
  config: &WhoopConfig,
  code: &str,
) -> Result<WhoopTokens, WhoopError> {
  let client = Client::new();

  let response = client
    .post(WHOOP_TOKEN_URL)
    .form(&[
      ("grant_type", "authorization_code"),
      ("code", code),
      ("redirect_uri", config.redirect_uri.as_str()),
      ("client_id", config.client_id.as_str()),
      ("client_secret", config.client_secret.as_str()),
    ])
    .send()
    .await?;

  if !response.status().is_success() {
    let error_text = response.text().await.unwrap_or_default();
    return Err(WhoopError::OAuth(format!(
      "Token exchange failed: {}",
      error_text
    )));
  }

  let token_response: TokenResponse = response.json().await?;
  Ok(WhoopTokens::from_response(token_response))
}

/// ---------------------------------------------------------------------------
/// Token Store (injected credential collaborator)
/// ---------------------------------------------------------------------------

/// SQLite-backed store for the single Whoop credential (row id = 1)
#[derive(Clone)]
pub struct TokenStore {
  db: DbPool,
}

impl TokenStore {
  pub fn new(db: DbPool) -> Self {
    Self { db }
  }

  pub async fn load(&self) -> Result<Option<WhoopTokens>, WhoopError> {
    let row: Option<(String, String, DateTime<Utc>)> = sqlx::query_as(
      "SELECT access_token, refresh_token, expires_at FROM whoop_auth WHERE id = 1",
    )
    .fetch_optional(&self.db)
    .await?;

    Ok(row.map(|(access, refresh, expires)| WhoopTokens {
      access_token: access,
      refresh_token: refresh,
      expires_at: expires,
    }))
  }

  pub async fn save(&self, tokens: &WhoopTokens) -> Result<(), WhoopError> {
    sqlx::query(
      r#"
      INSERT INTO whoop_auth (id, access_token, refresh_token, expires_at)
      VALUES (1, ?1, ?2, ?3)
      ON CONFLICT(id) DO UPDATE SET
        access_token = excluded.access_token,
        refresh_token = excluded.refresh_token,
        expires_at = excluded.expires_at,
        updated_at = CURRENT_TIMESTAMP
      "#,
    )
    .bind(&tokens.access_token)
    .bind(&tokens.refresh_token)
    .bind(tokens.expires_at)
    .execute(&self.db)
    .await?;

    Ok(())
  }

  pub async fn clear(&self) -> Result<(), WhoopError> {
    sqlx::query("DELETE FROM whoop_auth WHERE id = 1")
      .execute(&self.db)
      .await?;
    Ok(())
  }
}

/// ---------------------------------------------------------------------------
/// Whoop Client
/// ---------------------------------------------------------------------------

/// API client carrying the HTTP client, OAuth config, and credential store
#[derive(Clone)]
pub struct WhoopClient {
  http: Client,
  config: WhoopConfig,
  store: TokenStore,
  api_base: String,
  token_url: String,
}

impl WhoopClient {
  pub fn new(config: WhoopConfig, store: TokenStore) -> Self {
    Self {
      http: Client::new(),
      config,
      store,
      api_base: WHOOP_API_BASE.to_string(),
      token_url: WHOOP_TOKEN_URL.to_string(),
    }
  }

  #[cfg(test)]
  pub fn with_endpoints(mut self, api_base: &str, token_url: &str) -> Self {
    self.api_base = api_base.to_string();
    self.token_url = token_url.to_string();
    self
  }

  pub fn store(&self) -> &TokenStore {
    &self.store
  }

  /// Return a usable access token, refreshing through the token endpoint when
  /// within the expiry buffer. A failed refresh means the stored credential is
  /// dead, so it surfaces as NotAuthenticated rather than an upstream error.
  pub async fn valid_access_token(&self) -> Result<String, WhoopError> {
    let tokens = self
      .store
      .load()
      .await?
      .ok_or(WhoopError::NotAuthenticated)?;

    if !tokens.needs_refresh() {
      return Ok(tokens.access_token);
    }

    let response = self
      .http
      .post(&self.token_url)
      .form(&[
        ("grant_type", "refresh_token"),
        ("refresh_token", tokens.refresh_token.as_str()),
        ("client_id", self.config.client_id.as_str()),
        ("client_secret", self.config.client_secret.as_str()),
      ])
      .send()
      .await?;

    if !response.status().is_success() {
      return Err(WhoopError::NotAuthenticated);
    }

    let refreshed = WhoopTokens::from_response(response.json::<TokenResponse>().await?);
    self.store.save(&refreshed).await?;

    Ok(refreshed.access_token)
  }

  async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, WhoopError> {
    let token = self.valid_access_token().await?;

    let response = self
      .http
      .get(format!("{}{}", self.api_base, path))
      .bearer_auth(token)
      .send()
      .await?;

    if response.status() == reqwest::StatusCode::UNAUTHORIZED {
      return Err(WhoopError::NotAuthenticated);
    }

    if !response.status().is_success() {
      let status = response.status().as_u16();
      let body = response.text().await.unwrap_or_default();
      return Err(WhoopError::Api {
        path: path.to_string(),
        status,
        body,
      });
    }

    Ok(response.json().await?)
  }

  pub async fn fetch_recoveries(&self, limit: u32) -> Result<Vec<RecoveryRecord>, WhoopError> {
    let page: PaginatedResponse<RecoveryRecord> =
      self.get(&format!("/v2/recovery?limit={}", limit)).await?;
    Ok(page.records)
  }

  pub async fn fetch_cycles(&self, limit: u32) -> Result<Vec<CycleRecord>, WhoopError> {
    let page: PaginatedResponse<CycleRecord> =
      self.get(&format!("/v1/cycle?limit={}", limit)).await?;
    Ok(page.records)
  }

  pub async fn fetch_sleep(&self, limit: u32) -> Result<Vec<SleepRecord>, WhoopError> {
    let page: PaginatedResponse<SleepRecord> = self
      .get(&format!("/v2/activity/sleep?limit={}", limit))
      .await?;
    Ok(page.records)
  }

  pub async fn fetch_workouts(&self, limit: u32) -> Result<Vec<WorkoutRecord>, WhoopError> {
    let page: PaginatedResponse<WorkoutRecord> = self
      .get(&format!("/v2/activity/workout?limit={}", limit))
      .await?;
    Ok(page.records)
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
