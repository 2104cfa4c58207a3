//! Handlers for `/api/watching` endpoints.
//!
//! Watchers are identified by device id alone; starting a watch does not
//! create a subject record for the watcher.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use vigil_core::{
  store::SubjectStore,
  subject::SubjectId,
  watch::{WatchRelationship, WatchView},
};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct AddWatchBody {
  pub device_id: String,
  /// The target's share code.
  pub code:      String,
  /// Optional custom display name for the target.
  pub name:      Option<String>,
}

/// `POST /api/watching/add`
pub async fn add<S: SubjectStore + 'static>(
  State(state): State<AppState<S>>,
  Json(body): Json<AddWatchBody>,
) -> Result<impl IntoResponse, ApiError> {
  let watcher = SubjectId::parse(&body.device_id)?;
  let watch: WatchRelationship = state
    .registry
    .add_watch(&watcher, &body.code, body.name, Utc::now())
    .await?;
  Ok((StatusCode::CREATED, Json(watch)))
}

#[derive(Debug, Deserialize)]
pub struct WatcherParams {
  pub device_id: String,
}

/// `GET /api/watching/list?device_id=<id>`
pub async fn list<S: SubjectStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<WatcherParams>,
) -> Result<Json<Vec<WatchView>>, ApiError> {
  let watcher = SubjectId::parse(&params.device_id)?;
  let views = state.registry.list_watching(&watcher, Utc::now()).await?;
  Ok(Json(views))
}

/// `DELETE /api/watching/{id}?device_id=<id>`
pub async fn remove<S: SubjectStore + 'static>(
  State(state): State<AppState<S>>,
  Path(watch_id): Path<Uuid>,
  Query(params): Query<WatcherParams>,
) -> Result<StatusCode, ApiError> {
  let watcher = SubjectId::parse(&params.device_id)?;
  state.registry.remove_watch(watch_id, &watcher).await?;
  Ok(StatusCode::NO_CONTENT)
}
