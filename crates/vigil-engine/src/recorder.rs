//! Check-in recording and status queries.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use vigil_core::{
  Error, Result,
  policy,
  store::{CheckInUpdate, SubjectStore},
  subject::{Subject, SubjectId},
};

/// Advisory view of whether a check-in is due. `record` never gates on it;
/// a subject may check in early at will.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInStatus {
  pub can_check_in_now:  bool,
  /// Milliseconds until the next cadence boundary; zero when due.
  pub time_remaining_ms: i64,
  pub cadence_days:      u8,
  pub last_check_in:     Option<DateTime<Utc>>,
  pub streak:            u32,
  pub total_check_ins:   u64,
}

pub struct CheckInRecorder<S> {
  store: Arc<S>,
}

impl<S> Clone for CheckInRecorder<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: SubjectStore> CheckInRecorder<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Record a check-in at `now` and return the updated subject.
  ///
  /// The streak grows while check-ins land within double the cadence (the
  /// same threshold the sweep uses for overdue detection) and resets to 1
  /// otherwise; the lifetime total always increments. Subject update and
  /// audit-trail append happen atomically in the store.
  pub async fn record(
    &self,
    id: &SubjectId,
    now: DateTime<Utc>,
  ) -> Result<Subject> {
    let subject = self
      .store
      .get_subject(id)
      .await
      .map_err(Into::into)?
      .ok_or_else(|| Error::SubjectNotFound(id.clone()))?;

    let streak = policy::next_streak(
      now,
      subject.last_check_in,
      subject.cadence_days,
      subject.streak,
    );
    let total_check_ins = subject.total_check_ins + 1;

    let event = self
      .store
      .apply_check_in(
        id,
        CheckInUpdate { checked_in_at: now, streak, total_check_ins },
      )
      .await
      .map_err(Into::into)?;

    tracing::info!(
      subject = %id,
      event = %event.event_id,
      streak,
      total_check_ins,
      "check-in recorded"
    );

    Ok(Subject {
      last_check_in: Some(now),
      streak,
      total_check_ins,
      updated_at: now,
      ..subject
    })
  }

  pub async fn status(
    &self,
    id: &SubjectId,
    now: DateTime<Utc>,
  ) -> Result<CheckInStatus> {
    let subject = self
      .store
      .get_subject(id)
      .await
      .map_err(Into::into)?
      .ok_or_else(|| Error::SubjectNotFound(id.clone()))?;

    let interval = policy::interval_for(subject.cadence_days);
    let (can_check_in_now, remaining) = match subject.last_check_in {
      Some(last) if now - last < interval => (false, interval - (now - last)),
      _ => (true, TimeDelta::zero()),
    };

    Ok(CheckInStatus {
      can_check_in_now,
      time_remaining_ms: remaining.num_milliseconds().max(0),
      cadence_days: subject.cadence_days,
      last_check_in: subject.last_check_in,
      streak: subject.streak,
      total_check_ins: subject.total_check_ins,
    })
  }
}
