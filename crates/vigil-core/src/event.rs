//! Append-only check-in audit trail. Never read by the core logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::subject::SubjectId;

/// One row per successful check-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInEvent {
  pub event_id:        Uuid,
  pub subject_id:      SubjectId,
  pub checked_in_at:   DateTime<Utc>,
  /// Streak after this check-in was applied.
  pub streak:          u32,
  /// Lifetime total after this check-in was applied.
  pub total_check_ins: u64,
}
