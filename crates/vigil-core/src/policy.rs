//! Interval policy and liveness evaluation.
//!
//! The single source of truth for all timing math in the system. The sweep,
//! the check-in recorder, and every status query derive their thresholds from
//! [`interval_for`] so only one definition of "a day" can ever exist.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const MIN_CADENCE_DAYS: u8 = 1;
pub const MAX_CADENCE_DAYS: u8 = 30;

// ─── Interval policy ─────────────────────────────────────────────────────────

/// Reject a cadence outside [1, 30] days before it reaches any state.
pub fn validate_cadence(days: i64) -> Result<u8> {
  if days < i64::from(MIN_CADENCE_DAYS) || days > i64::from(MAX_CADENCE_DAYS) {
    return Err(Error::InvalidCadence(days));
  }
  Ok(days as u8)
}

/// The concrete duration of one check-in cadence.
pub fn interval_for(cadence_days: u8) -> TimeDelta {
  TimeDelta::days(i64::from(cadence_days))
}

/// The grace window: a subject is not overdue until twice the cadence has
/// elapsed. Tolerates a slightly late check-in without alerting the squad.
/// Not configurable per subject; only the base cadence is.
pub fn grace_for(interval: TimeDelta) -> TimeDelta { interval * 2 }

// ─── Liveness evaluation ─────────────────────────────────────────────────────

/// The result of evaluating one subject at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
  OnTime,
  Overdue {
    /// How far past the grace window the subject is. `None` when the
    /// subject has never checked in: there is no baseline to measure from.
    overdue_by: Option<TimeDelta>,
  },
}

impl Liveness {
  pub fn is_overdue(&self) -> bool { matches!(self, Self::Overdue { .. }) }
}

/// Classify a subject as on-time or overdue.
///
/// The boundary is inclusive: `elapsed == grace` is still on time.
pub fn evaluate(
  now:           DateTime<Utc>,
  last_check_in: Option<DateTime<Utc>>,
  cadence_days:  u8,
) -> Liveness {
  let Some(last) = last_check_in else {
    return Liveness::Overdue { overdue_by: None };
  };
  let elapsed = now - last;
  let grace = grace_for(interval_for(cadence_days));
  if elapsed <= grace {
    Liveness::OnTime
  } else {
    Liveness::Overdue { overdue_by: Some(elapsed - grace) }
  }
}

/// The streak a check-in at `now` produces.
///
/// Uses the same 2× threshold as [`evaluate`], so "still within streak" and
/// "not yet overdue" can never drift apart.
pub fn next_streak(
  now:            DateTime<Utc>,
  last_check_in:  Option<DateTime<Utc>>,
  cadence_days:   u8,
  current_streak: u32,
) -> u32 {
  match last_check_in {
    Some(last) if now - last <= grace_for(interval_for(cadence_days)) => {
      current_streak + 1
    }
    _ => 1,
  }
}

// ─── Severity ────────────────────────────────────────────────────────────────

/// Message-content classification for an alert. Informational only; never
/// affects whether the alert fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Standard,
  Elevated,
  Critical,
}

/// Severity is a function of the overdue-by amount (time past the grace
/// window), not of elapsed time since the last check-in.
pub fn severity_for(overdue_by: TimeDelta) -> Severity {
  if overdue_by > TimeDelta::hours(48) {
    Severity::Critical
  } else if overdue_by > TimeDelta::hours(24) {
    Severity::Elevated
  } else {
    Severity::Standard
  }
}

// ─── Display status ──────────────────────────────────────────────────────────

/// Status shown to watchers. Display uses the elapsed-since metric against a
/// single interval, stricter than the alerting threshold: a target reads as
/// `missed` as soon as one cadence lapses, while the squad is only alerted
/// past the 2× grace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchStatus {
  Alive,
  Missed,
}

pub fn display_status(
  now:           DateTime<Utc>,
  last_check_in: Option<DateTime<Utc>>,
  cadence_days:  u8,
) -> WatchStatus {
  match last_check_in {
    Some(last) if now - last <= interval_for(cadence_days) => {
      WatchStatus::Alive
    }
    _ => WatchStatus::Missed,
  }
}

// ─── Formatting ──────────────────────────────────────────────────────────────

/// Human-readable rendering of a duration in its largest whole unit,
/// e.g. "3 days", "1 hour", "45 minutes".
pub fn format_duration(d: TimeDelta) -> String {
  fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
      format!("{n} {unit}")
    } else {
      format!("{n} {unit}s")
    }
  }

  if d.num_days() > 0 {
    plural(d.num_days(), "day")
  } else if d.num_hours() > 0 {
    plural(d.num_hours(), "hour")
  } else if d.num_minutes() > 0 {
    plural(d.num_minutes(), "minute")
  } else {
    plural(d.num_seconds().max(0), "second")
  }
}
