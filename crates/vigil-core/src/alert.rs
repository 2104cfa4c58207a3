//! The missed-check-in alert ledger.
//!
//! A ledger entry is the durable proof that one overdue episode has already
//! been handled. The key is deterministic from (subject, exact last-check-in
//! instant): a later check-in moves the baseline and therefore produces a new
//! key, so a fresh lapse alerts again. At most one entry per key ever exists;
//! this is the sole idempotency guard against a sweep re-firing.

use chrono::{DateTime, TimeDelta, Utc};

use crate::subject::SubjectId;

/// Deterministic ledger key for one overdue episode.
pub fn alert_key(subject_id: &SubjectId, last_check_in: DateTime<Utc>) -> String {
  format!("{}_{}", subject_id, last_check_in.timestamp_millis())
}

/// One row of the alert ledger. Created only by the sweep; never updated;
/// deleted only by the account-deletion cascade.
#[derive(Debug, Clone)]
pub struct AlertLedgerEntry {
  pub alert_key:     String,
  pub subject_id:    SubjectId,
  /// Display-name snapshot at detection time.
  pub display_name:  String,
  /// The baseline this alert corresponds to.
  pub last_check_in: DateTime<Utc>,
  /// Squad emails the dispatcher was asked to notify.
  pub notified:      Vec<String>,
  /// How far past the grace window the subject was at detection.
  pub overdue_by:    TimeDelta,
  /// Cadence at detection time.
  pub cadence_days:  u8,
  pub created_at:    DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::subject::SubjectId;

  #[test]
  fn key_is_deterministic_and_episode_scoped() {
    let id = SubjectId::parse("device-42").unwrap();
    let t1 = DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
      .unwrap()
      .with_timezone(&Utc);
    let t2 = t1 + TimeDelta::days(1);

    assert_eq!(alert_key(&id, t1), alert_key(&id, t1));
    assert_ne!(alert_key(&id, t1), alert_key(&id, t2));

    let other = SubjectId::parse("device-43").unwrap();
    assert_ne!(alert_key(&id, t1), alert_key(&other, t1));
  }
}
