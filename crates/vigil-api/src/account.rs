//! Account deletion.

use axum::{Json, extract::State};
use serde::Deserialize;
use vigil_core::{store::{DeletionSummary, SubjectStore}, subject::SubjectId};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct DeleteBody {
  pub device_id: String,
}

/// `POST /api/account/delete` — removes the subject and cascades to watch
/// relationships (both directions), check-in events, and alert ledger rows.
pub async fn delete<S: SubjectStore + 'static>(
  State(state): State<AppState<S>>,
  Json(body): Json<DeleteBody>,
) -> Result<Json<DeletionSummary>, ApiError> {
  let id = SubjectId::parse(&body.device_id)?;
  let summary = state.registry.delete_account(&id).await?;
  Ok(Json(summary))
}
