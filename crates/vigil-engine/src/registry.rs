//! The watch registry: who is keeping an eye on whom.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use vigil_core::{
  Error, Result,
  policy::{self, WatchStatus},
  store::{DeletionSummary, SubjectStore},
  subject::{SubjectId, normalize_code},
  watch::{NewWatch, WatchRelationship, WatchTargetSnapshot, WatchView},
};

pub struct WatchRegistry<S> {
  store: Arc<S>,
}

impl<S> Clone for WatchRegistry<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: SubjectStore> WatchRegistry<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Start watching the subject who owns `code`. The relationship row and
  /// the target's watcher count move together in one store transaction.
  pub async fn add_watch(
    &self,
    watcher: &SubjectId,
    code: &str,
    label: Option<String>,
    now: DateTime<Utc>,
  ) -> Result<WatchRelationship> {
    let code = normalize_code(code)?;
    let target = self
      .store
      .get_subject_by_code(&code)
      .await
      .map_err(Into::into)?
      .ok_or_else(|| Error::CodeNotFound(code.clone()))?;

    let label = label
      .map(|l| l.trim().to_string())
      .filter(|l| !l.is_empty())
      .unwrap_or_else(|| target.display_name.clone());

    let watch = self
      .store
      .add_watch(
        NewWatch {
          watcher_id: watcher.clone(),
          target_id: target.subject_id,
          target_code: code,
          label,
        },
        now,
      )
      .await
      .map_err(Into::into)?;

    tracing::info!(watcher = %watcher, target = %watch.target_id, "watch added");
    Ok(watch)
  }

  /// Stop watching. Only the relationship's watcher may remove it.
  pub async fn remove_watch(
    &self,
    watch_id: Uuid,
    requester: &SubjectId,
  ) -> Result<()> {
    self
      .store
      .remove_watch(watch_id, requester)
      .await
      .map_err(Into::into)?;
    tracing::info!(%watch_id, watcher = %requester, "watch removed");
    Ok(())
  }

  /// Everyone `watcher` is watching, with liveness computed at `now`.
  ///
  /// Display status uses the elapsed-since metric against one interval; it
  /// goes `missed` before the squad is alerted.
  pub async fn list_watching(
    &self,
    watcher: &SubjectId,
    now: DateTime<Utc>,
  ) -> Result<Vec<WatchView>> {
    let watches = self
      .store
      .watches_by_watcher(watcher)
      .await
      .map_err(Into::into)?;

    let mut views = Vec::with_capacity(watches.len());
    for watch in watches {
      // A dangling row (target deleted mid-listing) is skipped, not an error.
      let Some(target) =
        self.store.get_subject(&watch.target_id).await.map_err(Into::into)?
      else {
        continue;
      };

      let status =
        policy::display_status(now, target.last_check_in, target.cadence_days);
      let missed_since = match (status, target.last_check_in) {
        (WatchStatus::Missed, Some(last)) => Some(last),
        _ => None,
      };

      views.push(WatchView {
        watch_id: watch.watch_id,
        code: watch.target_code,
        label: watch.label,
        added_at: watch.added_at,
        status,
        last_check_in: target.last_check_in,
        missed_since,
        time_since_check_in_ms: target
          .last_check_in
          .map(|last| (now - last).num_milliseconds()),
        cadence_days: target.cadence_days,
        target: WatchTargetSnapshot {
          subject_id: target.subject_id,
          display_name: target.display_name,
          streak: target.streak,
          total_check_ins: target.total_check_ins,
        },
      });
    }
    Ok(views)
  }

  /// Delete an account and everything referencing it; see
  /// [`SubjectStore::delete_account`] for the cascade.
  pub async fn delete_account(&self, id: &SubjectId) -> Result<DeletionSummary> {
    let summary = self.store.delete_account(id).await.map_err(Into::into)?;
    tracing::info!(
      subject = %id,
      watches_as_watcher = summary.watches_as_watcher,
      watches_as_target = summary.watches_as_target,
      check_in_events = summary.check_in_events,
      alerts = summary.alerts,
      "account deleted"
    );
    Ok(summary)
  }
}
