//! The missed-check-in sweep.
//!
//! Runs over every subject with a squad, classifies each against the liveness
//! policy, and turns newly-overdue subjects into exactly one notification
//! batch each. The alert ledger, keyed by (subject, last-check-in instant),
//! is what makes the sweep safe to re-run on every tick.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use vigil_core::{
  Result,
  alert::{AlertLedgerEntry, alert_key},
  policy::{self, Liveness, format_duration},
  store::SubjectStore,
};

use crate::{
  dispatch::{AlertDispatcher, DispatchOutcome},
  transport::{AlertContext, AlertTransport},
};

/// What one sweep tick saw and did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
  /// Subjects with a squad, i.e. the sweep's whole input set.
  pub subjects:        usize,
  /// Of those, subjects that have checked in at least once.
  pub with_baseline:   usize,
  /// Newly-overdue subjects (past grace, not yet in the ledger).
  pub overdue:         usize,
  /// Ledger entries actually inserted by this tick's batch.
  pub alerts_recorded: usize,
  pub sent:            usize,
  pub failed:          usize,
  pub elapsed_ms:      u128,
}

pub struct MissedCheckInSweep<S, T> {
  store:      Arc<S>,
  dispatcher: AlertDispatcher<T>,
}

impl<S, T> MissedCheckInSweep<S, T>
where
  S: SubjectStore,
  T: AlertTransport,
{
  pub fn new(store: Arc<S>, transport: Arc<T>) -> Self {
    Self { store, dispatcher: AlertDispatcher::new(transport) }
  }

  /// Run one full sweep at `now`.
  ///
  /// Dispatch tasks are spawned as subjects are classified and the ledger
  /// batch is committed while they are in flight; neither side waits on the
  /// other. The summary is only reported once every send has resolved.
  ///
  /// A store failure while checking one subject's ledger key skips that
  /// subject for this tick; the next tick re-evaluates it, which is safe
  /// because the ledger makes re-evaluation idempotent.
  pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepSummary> {
    let started = std::time::Instant::now();
    let subjects = self
      .store
      .subjects_with_squad()
      .await
      .map_err(Into::into)?;

    let mut summary = SweepSummary::default();
    let mut entries: Vec<AlertLedgerEntry> = Vec::new();
    let mut batches: JoinSet<DispatchOutcome> = JoinSet::new();

    for subject in subjects {
      summary.subjects += 1;

      // Never checked in: no baseline to measure an episode against.
      let Some(last) = subject.last_check_in else { continue };
      summary.with_baseline += 1;

      let Liveness::Overdue { overdue_by: Some(overdue_by) } =
        policy::evaluate(now, Some(last), subject.cadence_days)
      else {
        continue;
      };

      let key = alert_key(&subject.subject_id, last);
      match self.store.alert_exists(&key).await {
        Ok(true) => continue,
        Ok(false) => {}
        Err(error) => {
          tracing::warn!(
            subject = %subject.subject_id,
            %error,
            "ledger check failed; skipping subject this tick"
          );
          continue;
        }
      }

      summary.overdue += 1;
      tracing::info!(
        subject = %subject.subject_id,
        name = %subject.display_name,
        overdue_for = %format_duration(overdue_by),
        "missed check-in detected"
      );

      let recipients: Vec<String> =
        subject.squad.iter().map(|m| m.email.clone()).collect();

      let alert = AlertContext {
        subject_id:   subject.subject_id.clone(),
        display_name: subject.display_name.clone(),
        streak:       subject.streak,
        cadence_days: subject.cadence_days,
        overdue_by,
        severity:     policy::severity_for(overdue_by),
      };

      let dispatcher = self.dispatcher.clone();
      let batch_recipients = recipients.clone();
      batches.spawn(async move { dispatcher.dispatch(alert, batch_recipients).await });

      entries.push(AlertLedgerEntry {
        alert_key:     key,
        subject_id:    subject.subject_id,
        display_name:  subject.display_name,
        last_check_in: last,
        notified:      recipients,
        overdue_by,
        cadence_days:  subject.cadence_days,
        created_at:    now,
      });
    }

    // Commit the whole tick's ledger in one batch while sends are in flight.
    // A failed commit is logged, never fatal: worst case the next tick
    // re-notifies, which beats crash-looping the scheduler.
    if !entries.is_empty() {
      match self.store.insert_alerts(&entries).await {
        Ok(inserted) => summary.alerts_recorded = inserted,
        Err(error) => {
          tracing::error!(%error, "failed to commit alert ledger batch");
        }
      }
    }

    while let Some(result) = batches.join_next().await {
      if let Ok(outcome) = result {
        summary.sent += outcome.sent;
        summary.failed += outcome.failed;
      }
    }

    summary.elapsed_ms = started.elapsed().as_millis();
    tracing::info!(
      subjects = summary.subjects,
      with_baseline = summary.with_baseline,
      overdue = summary.overdue,
      alerts_recorded = summary.alerts_recorded,
      sent = summary.sent,
      failed = summary.failed,
      elapsed_ms = summary.elapsed_ms,
      "sweep complete"
    );
    Ok(summary)
  }
}
