//! The `SubjectStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g. `vigil-store-sqlite`).
//! Higher layers (`vigil-engine`, `vigil-api`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  alert::AlertLedgerEntry,
  event::CheckInEvent,
  subject::{Subject, SubjectId, SquadMember},
  watch::{NewWatch, WatchRelationship},
};

// ─── Write inputs ────────────────────────────────────────────────────────────

/// The atomic unit written by a check-in: the subject's new liveness fields
/// plus one appended audit row. Both writes succeed or neither does.
#[derive(Debug, Clone, Copy)]
pub struct CheckInUpdate {
  pub checked_in_at:   DateTime<Utc>,
  pub streak:          u32,
  pub total_check_ins: u64,
}

/// Per-collection row counts removed by an account deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionSummary {
  pub subject_deleted:    bool,
  pub watches_as_watcher: usize,
  pub watches_as_target:  usize,
  pub check_in_events:    usize,
  pub alerts:             usize,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Vigil storage backend.
///
/// Multi-field mutations of a single subject (check-in application, watcher
/// count adjustment, account deletion) are atomic: all fields change together
/// or none do. Within a transaction, all reads complete before any write.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait SubjectStore: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  // ── Subjects ──────────────────────────────────────────────────────────

  /// Get-or-create a subject. Creation is the lazy identity-resolution
  /// policy: the record is made on first authenticated request. The `bool`
  /// is true when the subject was just created.
  fn resolve_subject(
    &self,
    id: &SubjectId,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<(Subject, bool), Self::Error>> + Send;

  /// Retrieve a subject by id. Returns `None` if not found.
  fn get_subject(
    &self,
    id: &SubjectId,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send;

  /// Retrieve a subject by share code. Returns `None` if no subject owns
  /// the code.
  fn get_subject_by_code(
    &self,
    code: &str,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send;

  /// Replace the display name. Fails if the subject does not exist.
  fn update_display_name(
    &self,
    id: &SubjectId,
    name: &str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send;

  /// Replace the check-in cadence. The value is validated by the caller.
  fn set_cadence(
    &self,
    id: &SubjectId,
    cadence_days: u8,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send;

  /// Assign a share code. Fails if the subject does not exist or the code
  /// is already taken by any subject (codes are globally unique).
  fn assign_code(
    &self,
    id: &SubjectId,
    code: &str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  // ── Squad ─────────────────────────────────────────────────────────────

  /// Append a squad member. Enforces the size cap and per-subject email
  /// uniqueness inside one transaction. The email is already normalised.
  fn add_squad_member(
    &self,
    id: &SubjectId,
    email: &str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<SquadMember, Self::Error>> + Send;

  /// Remove a squad member by id.
  fn remove_squad_member(
    &self,
    id: &SubjectId,
    member_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  // ── Check-ins ─────────────────────────────────────────────────────────

  /// Apply a check-in: update the subject's liveness fields and append one
  /// [`CheckInEvent`], atomically. Returns the appended event.
  fn apply_check_in(
    &self,
    id: &SubjectId,
    update: CheckInUpdate,
  ) -> impl Future<Output = Result<CheckInEvent, Self::Error>> + Send;

  // ── Sweep support ─────────────────────────────────────────────────────

  /// All subjects with a non-empty squad, squad included. The sweep's
  /// input set; subjects nobody would be notified about are not returned.
  fn subjects_with_squad(
    &self,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send;

  /// Whether the alert ledger already holds `key`.
  fn alert_exists(
    &self,
    key: &str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

  /// Commit a sweep tick's ledger entries in one batch with create-if-absent
  /// semantics: entries whose key already exists are skipped, never
  /// overwritten. Returns the number actually inserted.
  fn insert_alerts(
    &self,
    entries: &[AlertLedgerEntry],
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send;

  // ── Watch relationships ───────────────────────────────────────────────

  /// Create a watch relationship and increment the target's watcher count,
  /// in one transaction (reads before writes). Fails on a duplicate
  /// (watcher, target) pair.
  fn add_watch(
    &self,
    watch: NewWatch,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<WatchRelationship, Self::Error>> + Send;

  /// Delete a watch relationship and decrement the target's watcher count
  /// (floored at zero), in one transaction. Fails if missing or if
  /// `requester` is not the relationship's watcher.
  fn remove_watch(
    &self,
    watch_id: Uuid,
    requester: &SubjectId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  /// All relationships where `watcher` is the watcher.
  fn watches_by_watcher(
    &self,
    watcher: &SubjectId,
  ) -> impl Future<Output = Result<Vec<WatchRelationship>, Self::Error>> + Send;

  // ── Account deletion ──────────────────────────────────────────────────

  /// Delete a subject and everything that references it: watches where it
  /// is the watcher (with the paired floored decrement on each target),
  /// watches where it is the target, check-in events, ledger entries, and
  /// the squad. One transaction.
  fn delete_account(
    &self,
    id: &SubjectId,
  ) -> impl Future<Output = Result<DeletionSummary, Self::Error>> + Send;
}
