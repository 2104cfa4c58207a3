//! Handlers for `/api/squad` endpoints.
//!
//! The squad is the list of emails alerted when its owner goes overdue.
//! Capped at five members with case-insensitive unique emails; both
//! constraints are enforced transactionally by the store.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use vigil_core::{
  store::SubjectStore,
  subject::{SquadMember, SubjectId, normalize_email},
};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct AddMemberBody {
  pub device_id: String,
  pub email:     String,
}

/// `POST /api/squad/add-member`
pub async fn add_member<S: SubjectStore + 'static>(
  State(state): State<AppState<S>>,
  Json(body): Json<AddMemberBody>,
) -> Result<impl IntoResponse, ApiError> {
  let id = SubjectId::parse(&body.device_id)?;
  let email = normalize_email(&body.email)?;
  let now = Utc::now();
  state.profile.resolve(&id, now).await?;
  let member = state
    .store
    .add_squad_member(&id, &email, now)
    .await
    .map_err(Into::<vigil_core::Error>::into)?;
  tracing::info!(subject = %id, email = %member.email, "squad member added");
  Ok((StatusCode::CREATED, Json(member)))
}

#[derive(Debug, Deserialize)]
pub struct MembersBody {
  pub device_id: String,
}

/// `POST /api/squad/members`
pub async fn list_members<S: SubjectStore + 'static>(
  State(state): State<AppState<S>>,
  Json(body): Json<MembersBody>,
) -> Result<Json<Vec<SquadMember>>, ApiError> {
  let id = SubjectId::parse(&body.device_id)?;
  let (subject, _) = state.profile.resolve(&id, Utc::now()).await?;
  Ok(Json(subject.squad))
}

/// `POST /api/squad/members/{id}/remove`
pub async fn remove_member<S: SubjectStore + 'static>(
  State(state): State<AppState<S>>,
  Path(member_id): Path<Uuid>,
  Json(body): Json<MembersBody>,
) -> Result<StatusCode, ApiError> {
  let id = SubjectId::parse(&body.device_id)?;
  state
    .store
    .remove_squad_member(&id, member_id)
    .await
    .map_err(Into::<vigil_core::Error>::into)?;
  tracing::info!(subject = %id, %member_id, "squad member removed");
  Ok(StatusCode::NO_CONTENT)
}
