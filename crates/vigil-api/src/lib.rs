//! JSON REST API for Vigil.
//!
//! Exposes an axum [`Router`] backed by any [`vigil_core::store::SubjectStore`].
//! TLS and transport concerns are the caller's responsibility; identity is
//! the caller-supplied device id, resolved lazily into a subject record.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = vigil_api::api_router(AppState::new(store));
//! ```

pub mod account;
pub mod error;
pub mod squad;
pub mod users;
pub mod watching;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Json,
  Router,
  routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::json;
use vigil_core::store::SubjectStore;
use vigil_engine::{
  profile::ProfileService, recorder::CheckInRecorder, registry::WatchRegistry,
  scheduler::SweepSchedule,
};

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` merged with
/// `VIGIL_`-prefixed environment variables. Every field has a development
/// default so the server starts with no config file at all.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "defaults::host")]
  pub host:                     String,
  #[serde(default = "defaults::port")]
  pub port:                     u16,
  #[serde(default = "defaults::store_path")]
  pub store_path:               PathBuf,
  #[serde(default = "defaults::sweep_interval_secs")]
  pub sweep_interval_secs:      u64,
  #[serde(default = "defaults::sweep_startup_delay_secs")]
  pub sweep_startup_delay_secs: u64,
  /// From-address for alert emails.
  #[serde(default = "defaults::alert_from")]
  pub alert_from:               String,
  /// When absent, alerts are logged instead of delivered.
  #[serde(default)]
  pub resend_api_key:           Option<String>,
}

mod defaults {
  use std::path::PathBuf;

  pub fn host() -> String { "127.0.0.1".to_string() }
  pub fn port() -> u16 { 5001 }
  pub fn store_path() -> PathBuf { PathBuf::from("vigil.db") }
  pub fn sweep_interval_secs() -> u64 { 60 * 60 }
  pub fn sweep_startup_delay_secs() -> u64 { 5 }
  pub fn alert_from() -> String {
    "Vigil Alerts <alerts@vigil.invalid>".to_string()
  }
}

impl ServerConfig {
  pub fn schedule(&self) -> SweepSchedule {
    SweepSchedule {
      period:        Duration::from_secs(self.sweep_interval_secs.max(1)),
      startup_delay: Duration::from_secs(self.sweep_startup_delay_secs),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub profile:  ProfileService<S>,
  pub recorder: CheckInRecorder<S>,
  pub registry: WatchRegistry<S>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      profile:  self.profile.clone(),
      recorder: self.recorder.clone(),
      registry: self.registry.clone(),
    }
  }
}

impl<S: SubjectStore> AppState<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      profile:  ProfileService::new(Arc::clone(&store)),
      recorder: CheckInRecorder::new(Arc::clone(&store)),
      registry: WatchRegistry::new(Arc::clone(&store)),
      store,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: SubjectStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    // Users
    .route("/api/users/me", post(users::me::<S>))
    .route("/api/users/update-name", post(users::update_name::<S>))
    .route("/api/users/checkin-frequency", post(users::set_frequency::<S>))
    .route("/api/users/generate-code", post(users::generate_code::<S>))
    .route("/api/users/checkin", post(users::check_in::<S>))
    .route("/api/users/checkin/status", post(users::check_in_status::<S>))
    // Squad
    .route("/api/squad/add-member", post(squad::add_member::<S>))
    .route("/api/squad/members", post(squad::list_members::<S>))
    .route("/api/squad/members/{id}/remove", post(squad::remove_member::<S>))
    // Watching
    .route("/api/watching/add", post(watching::add::<S>))
    .route("/api/watching/list", get(watching::list::<S>))
    .route("/api/watching/{id}", delete(watching::remove::<S>))
    // Account
    .route("/api/account/delete", post(account::delete::<S>))
    .with_state(state)
}

/// `GET /health`
async fn health() -> Json<serde_json::Value> {
  Json(json!({
    "status": "ok",
    "version": env!("CARGO_PKG_VERSION"),
  }))
}

// ─── Integration tests ────────────────────────────────────────────────────────
