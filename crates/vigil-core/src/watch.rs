//! Watch relationships — one subject keeping an eye on another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{policy::WatchStatus, subject::SubjectId};

/// One (watcher, target) pair. Unique per pair; its creation and deletion
/// atomically adjust the target's `watchers_count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchRelationship {
  pub watch_id:    Uuid,
  pub watcher_id:  SubjectId,
  pub target_id:   SubjectId,
  /// The share code the watcher used; kept for display.
  pub target_code: String,
  /// The watcher's own name for the target.
  pub label:       String,
  pub added_at:    DateTime<Utc>,
}

/// Input to [`crate::store::SubjectStore::add_watch`]. `watch_id` and
/// `added_at` are assigned by the caller so the registry controls identity.
#[derive(Debug, Clone)]
pub struct NewWatch {
  pub watcher_id:  SubjectId,
  pub target_id:   SubjectId,
  pub target_code: String,
  pub label:       String,
}

/// The computed read model for one entry in a watcher's list — never stored,
/// always derived at query time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchView {
  pub watch_id:              Uuid,
  pub code:                  String,
  pub label:                 String,
  pub added_at:              DateTime<Utc>,
  pub status:                WatchStatus,
  pub last_check_in:         Option<DateTime<Utc>>,
  /// When the target's current missed period began; `None` while alive or
  /// when the target has never checked in.
  pub missed_since:          Option<DateTime<Utc>>,
  pub time_since_check_in_ms: Option<i64>,
  pub cadence_days:          u8,
  pub target:                WatchTargetSnapshot,
}

/// The slice of the target's record a watcher is allowed to see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchTargetSnapshot {
  pub subject_id:      SubjectId,
  pub display_name:    String,
  pub streak:          u32,
  pub total_check_ins: u64,
}
