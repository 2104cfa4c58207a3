//! Handlers for `/api/users` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/users/me` | Resolves (lazily creating) the subject |
//! | `POST` | `/api/users/update-name` | |
//! | `POST` | `/api/users/checkin-frequency` | Cadence in days, [1, 30] |
//! | `POST` | `/api/users/generate-code` | Idempotent per subject |
//! | `POST` | `/api/users/checkin` | |
//! | `POST` | `/api/users/checkin/status` | |
//!
//! Every body carries `device_id`; the subject record is created lazily on
//! first contact, which is the documented identity-resolution policy.

use axum::{Json, extract::State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use vigil_core::{
  store::SubjectStore,
  subject::{Subject, SubjectId},
};
use vigil_engine::recorder::CheckInStatus;

use crate::{AppState, error::ApiError};

// ─── Me ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DeviceBody {
  pub device_id: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
  #[serde(flatten)]
  pub subject: Subject,
  pub is_new:  bool,
}

/// `POST /api/users/me`
pub async fn me<S: SubjectStore + 'static>(
  State(state): State<AppState<S>>,
  Json(body): Json<DeviceBody>,
) -> Result<Json<MeResponse>, ApiError> {
  let id = SubjectId::parse(&body.device_id)?;
  let (subject, is_new) = state.profile.resolve(&id, Utc::now()).await?;
  Ok(Json(MeResponse { subject, is_new }))
}

// ─── Display name ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateNameBody {
  pub device_id:    String,
  pub display_name: String,
}

/// `POST /api/users/update-name`
pub async fn update_name<S: SubjectStore + 'static>(
  State(state): State<AppState<S>>,
  Json(body): Json<UpdateNameBody>,
) -> Result<Json<Subject>, ApiError> {
  let id = SubjectId::parse(&body.device_id)?;
  let now = Utc::now();
  state.profile.resolve(&id, now).await?;
  let subject = state
    .profile
    .update_display_name(&id, &body.display_name, now)
    .await?;
  Ok(Json(subject))
}

// ─── Cadence ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FrequencyBody {
  pub device_id: String,
  /// Days between check-ins.
  pub frequency: i64,
}

/// `POST /api/users/checkin-frequency`
pub async fn set_frequency<S: SubjectStore + 'static>(
  State(state): State<AppState<S>>,
  Json(body): Json<FrequencyBody>,
) -> Result<Json<Subject>, ApiError> {
  let id = SubjectId::parse(&body.device_id)?;
  let now = Utc::now();
  state.profile.resolve(&id, now).await?;
  let subject = state.profile.set_cadence(&id, body.frequency, now).await?;
  Ok(Json(subject))
}

// ─── Share code ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CodeResponse {
  pub code: String,
}

/// `POST /api/users/generate-code`
pub async fn generate_code<S: SubjectStore + 'static>(
  State(state): State<AppState<S>>,
  Json(body): Json<DeviceBody>,
) -> Result<Json<CodeResponse>, ApiError> {
  let id = SubjectId::parse(&body.device_id)?;
  let now = Utc::now();
  state.profile.resolve(&id, now).await?;
  let code = state.profile.generate_code(&id, now).await?;
  Ok(Json(CodeResponse { code }))
}

// ─── Check-ins ───────────────────────────────────────────────────────────────

/// `POST /api/users/checkin`
pub async fn check_in<S: SubjectStore + 'static>(
  State(state): State<AppState<S>>,
  Json(body): Json<DeviceBody>,
) -> Result<Json<Subject>, ApiError> {
  let id = SubjectId::parse(&body.device_id)?;
  let now = Utc::now();
  state.profile.resolve(&id, now).await?;
  let subject = state.recorder.record(&id, now).await?;
  Ok(Json(subject))
}

/// `POST /api/users/checkin/status`
pub async fn check_in_status<S: SubjectStore + 'static>(
  State(state): State<AppState<S>>,
  Json(body): Json<DeviceBody>,
) -> Result<Json<CheckInStatus>, ApiError> {
  let id = SubjectId::parse(&body.device_id)?;
  let now = Utc::now();
  state.profile.resolve(&id, now).await?;
  let status = state.recorder.status(&id, now).await?;
  Ok(Json(status))
}
