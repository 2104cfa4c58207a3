//! Engine tests against an in-memory SQLite store and a recording transport.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex},
  time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use vigil_core::{
  Error,
  alert::alert_key,
  policy::{Severity, WatchStatus},
  store::{CheckInUpdate, SubjectStore},
  subject::SubjectId,
};
use vigil_store_sqlite::SqliteStore;

use crate::{
  profile::ProfileService,
  recorder::CheckInRecorder,
  registry::WatchRegistry,
  scheduler::{self, SweepSchedule},
  sweep::MissedCheckInSweep,
  transport::{AlertContext, AlertTransport, TransportError},
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MockTransport {
  delivered: Mutex<Vec<(String, AlertContext)>>,
  failing:   Mutex<HashSet<String>>,
}

impl MockTransport {
  fn fail_for(&self, email: &str) {
    self.failing.lock().unwrap().insert(email.to_string());
  }

  fn delivered(&self) -> Vec<(String, AlertContext)> {
    self.delivered.lock().unwrap().clone()
  }
}

impl AlertTransport for MockTransport {
  async fn send(
    &self,
    recipient: &str,
    alert: &AlertContext,
  ) -> Result<(), TransportError> {
    if self.failing.lock().unwrap().contains(recipient) {
      return Err(TransportError::Rejected { status: 500 });
    }
    self
      .delivered
      .lock()
      .unwrap()
      .push((recipient.to_string(), alert.clone()));
    Ok(())
  }
}

fn sid(s: &str) -> SubjectId {
  SubjectId::parse(s).expect("valid subject id")
}

fn t0() -> DateTime<Utc> {
  DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
    .unwrap()
    .with_timezone(&Utc)
}

struct Harness {
  store:     Arc<SqliteStore>,
  transport: Arc<MockTransport>,
  sweep:     Arc<MissedCheckInSweep<SqliteStore, MockTransport>>,
}

async fn harness() -> Harness {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let transport = Arc::new(MockTransport::default());
  let sweep = Arc::new(MissedCheckInSweep::new(
    Arc::clone(&store),
    Arc::clone(&transport),
  ));
  Harness { store, transport, sweep }
}

/// Create a subject with a squad whose last check-in was at `last`.
async fn monitored_subject(
  store: &SqliteStore,
  id: &str,
  squad: &[&str],
  last: Option<DateTime<Utc>>,
) -> SubjectId {
  let id = sid(id);
  store.resolve_subject(&id, t0() - TimeDelta::days(30)).await.unwrap();
  for email in squad {
    store
      .add_squad_member(&id, email, t0() - TimeDelta::days(30))
      .await
      .unwrap();
  }
  if let Some(at) = last {
    store
      .apply_check_in(
        &id,
        CheckInUpdate { checked_in_at: at, streak: 1, total_check_ins: 1 },
      )
      .await
      .unwrap();
  }
  id
}

// ─── Sweep ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sweep_alerts_exactly_once_per_episode() {
  let h = harness().await;
  let now = t0();
  monitored_subject(
    &h.store,
    "device-1",
    &["a@example.com", "b@example.com"],
    Some(now - TimeDelta::days(3)),
  )
  .await;

  let first = h.sweep.run_once(now).await.unwrap();
  assert_eq!(first.subjects, 1);
  assert_eq!(first.with_baseline, 1);
  assert_eq!(first.overdue, 1);
  assert_eq!(first.alerts_recorded, 1);
  assert_eq!(first.sent, 2);
  assert_eq!(first.failed, 0);

  // Repeated ticks with no intervening check-in: the ledger holds.
  for tick in 1..4 {
    let again = h
      .sweep
      .run_once(now + TimeDelta::hours(tick))
      .await
      .unwrap();
    assert_eq!(again.overdue, 0, "tick {tick} re-alerted");
    assert_eq!(again.alerts_recorded, 0);
    assert_eq!(again.sent, 0);
  }

  assert_eq!(h.transport.delivered().len(), 2);
}

#[tokio::test]
async fn sweep_alert_context_carries_overdue_by_not_elapsed() {
  let h = harness().await;
  let now = t0();
  // Cadence 1 day, last check-in 3 days ago: 72h elapsed, grace 48h, so
  // overdue by exactly 1 day -- which keeps severity at standard.
  monitored_subject(
    &h.store,
    "device-1",
    &["a@example.com"],
    Some(now - TimeDelta::days(3)),
  )
  .await;

  h.sweep.run_once(now).await.unwrap();

  let delivered = h.transport.delivered();
  assert_eq!(delivered.len(), 1);
  let (_, alert) = &delivered[0];
  assert_eq!(alert.overdue_by, TimeDelta::days(1));
  assert_eq!(alert.severity, Severity::Standard);
}

#[tokio::test]
async fn sweep_tolerates_partial_notification_failure() {
  let h = harness().await;
  let now = t0();
  monitored_subject(
    &h.store,
    "device-1",
    &["a@example.com", "b@example.com", "c@example.com"],
    Some(now - TimeDelta::days(5)),
  )
  .await;
  h.transport.fail_for("b@example.com");

  let summary = h.sweep.run_once(now).await.unwrap();
  assert_eq!(summary.sent, 2);
  assert_eq!(summary.failed, 1);
  assert_eq!(summary.alerts_recorded, 1);

  let mut reached: Vec<String> =
    h.transport.delivered().into_iter().map(|(r, _)| r).collect();
  reached.sort();
  assert_eq!(reached, ["a@example.com", "c@example.com"]);
}

#[tokio::test]
async fn sweep_skips_subjects_without_baseline() {
  let h = harness().await;
  monitored_subject(&h.store, "device-1", &["a@example.com"], None).await;

  let summary = h.sweep.run_once(t0()).await.unwrap();
  assert_eq!(summary.subjects, 1);
  assert_eq!(summary.with_baseline, 0);
  assert_eq!(summary.overdue, 0);
  assert!(h.transport.delivered().is_empty());
}

#[tokio::test]
async fn sweep_leaves_on_time_subjects_alone() {
  let h = harness().await;
  let now = t0();
  monitored_subject(
    &h.store,
    "device-1",
    &["a@example.com"],
    Some(now - TimeDelta::hours(30)),
  )
  .await;

  // 30h elapsed on a 1-day cadence is within the 48h grace.
  let summary = h.sweep.run_once(now).await.unwrap();
  assert_eq!(summary.overdue, 0);
  assert!(h.transport.delivered().is_empty());
}

#[tokio::test]
async fn sweep_never_loads_squadless_subjects() {
  let h = harness().await;
  let id = sid("loner");
  h.store.resolve_subject(&id, t0()).await.unwrap();
  h.store
    .apply_check_in(
      &id,
      CheckInUpdate {
        checked_in_at:   t0() - TimeDelta::days(10),
        streak:          1,
        total_check_ins: 1,
      },
    )
    .await
    .unwrap();

  let summary = h.sweep.run_once(t0()).await.unwrap();
  assert_eq!(summary.subjects, 0);
}

#[tokio::test]
async fn recovery_then_second_lapse_is_a_fresh_episode() {
  let h = harness().await;
  let recorder = CheckInRecorder::new(Arc::clone(&h.store));
  let now = t0();
  let id = monitored_subject(
    &h.store,
    "device-1",
    &["a@example.com"],
    Some(now - TimeDelta::days(3)),
  )
  .await;

  let first = h.sweep.run_once(now).await.unwrap();
  assert_eq!(first.alerts_recorded, 1);

  // The subject recovers.
  recorder.record(&id, now).await.unwrap();
  let calm = h.sweep.run_once(now + TimeDelta::hours(1)).await.unwrap();
  assert_eq!(calm.overdue, 0);

  // ...and lapses again: the new baseline produces a new key and a second
  // notification batch.
  let later = now + TimeDelta::days(4);
  let second = h.sweep.run_once(later).await.unwrap();
  assert_eq!(second.overdue, 1);
  assert_eq!(second.alerts_recorded, 1);
  assert_eq!(h.transport.delivered().len(), 2);

  assert!(
    h.store
      .alert_exists(&alert_key(&id, now - TimeDelta::days(3)))
      .await
      .unwrap()
  );
  assert!(h.store.alert_exists(&alert_key(&id, now)).await.unwrap());
}

// ─── Recorder ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn streak_grows_on_time_and_resets_late() {
  let h = harness().await;
  let recorder = CheckInRecorder::new(Arc::clone(&h.store));
  let id = sid("device-1");
  h.store.resolve_subject(&id, t0()).await.unwrap();

  let s1 = recorder.record(&id, t0()).await.unwrap();
  assert_eq!((s1.streak, s1.total_check_ins), (1, 1));

  let s2 = recorder.record(&id, t0() + TimeDelta::days(1)).await.unwrap();
  assert_eq!((s2.streak, s2.total_check_ins), (2, 2));

  // Exactly at the 2x window edge: still counts.
  let s3 = recorder.record(&id, t0() + TimeDelta::days(3)).await.unwrap();
  assert_eq!((s3.streak, s3.total_check_ins), (3, 3));

  // Past the window: streak resets, total keeps counting.
  let s4 = recorder
    .record(&id, t0() + TimeDelta::days(6))
    .await
    .unwrap();
  assert_eq!((s4.streak, s4.total_check_ins), (1, 4));

  // The store agrees with the returned view.
  let stored = h.store.get_subject(&id).await.unwrap().unwrap();
  assert_eq!((stored.streak, stored.total_check_ins), (1, 4));
}

#[tokio::test]
async fn record_unknown_subject_is_not_found() {
  let h = harness().await;
  let recorder = CheckInRecorder::new(Arc::clone(&h.store));
  let err = recorder.record(&sid("ghost"), t0()).await.unwrap_err();
  assert!(matches!(err, Error::SubjectNotFound(_)));
}

#[tokio::test]
async fn status_reports_time_until_next_cadence() {
  let h = harness().await;
  let recorder = CheckInRecorder::new(Arc::clone(&h.store));
  let id = sid("device-1");
  h.store.resolve_subject(&id, t0()).await.unwrap();

  let fresh = recorder.status(&id, t0()).await.unwrap();
  assert!(fresh.can_check_in_now);
  assert_eq!(fresh.time_remaining_ms, 0);

  recorder.record(&id, t0()).await.unwrap();

  let waiting = recorder.status(&id, t0() + TimeDelta::hours(1)).await.unwrap();
  assert!(!waiting.can_check_in_now);
  assert_eq!(
    waiting.time_remaining_ms,
    TimeDelta::hours(23).num_milliseconds()
  );

  let due = recorder.status(&id, t0() + TimeDelta::days(1)).await.unwrap();
  assert!(due.can_check_in_now);
  assert_eq!(due.time_remaining_ms, 0);
  assert_eq!(due.streak, 1);
  assert_eq!(due.total_check_ins, 1);
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn watch_lifecycle_through_share_code() {
  let h = harness().await;
  let profile = ProfileService::new(Arc::clone(&h.store));
  let registry = WatchRegistry::new(Arc::clone(&h.store));
  let recorder = CheckInRecorder::new(Arc::clone(&h.store));

  let target = sid("target");
  let watcher = sid("watcher");
  h.store.resolve_subject(&target, t0()).await.unwrap();
  recorder.record(&target, t0()).await.unwrap();

  let code = profile.generate_code(&target, t0()).await.unwrap();
  // Re-requesting returns the same code.
  assert_eq!(profile.generate_code(&target, t0()).await.unwrap(), code);

  let watch = registry
    .add_watch(&watcher, &code.to_lowercase(), Some("Mum".to_string()), t0())
    .await
    .unwrap();
  assert_eq!(watch.target_id, target);
  assert_eq!(watch.label, "Mum");

  let err = registry
    .add_watch(&watcher, &code, None, t0())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AlreadyWatching { .. }));

  // Fresh check-in: alive. Past one cadence: shown missed, even though the
  // squad would not yet be alerted.
  let alive = registry
    .list_watching(&watcher, t0() + TimeDelta::hours(2))
    .await
    .unwrap();
  assert_eq!(alive.len(), 1);
  assert_eq!(alive[0].status, WatchStatus::Alive);
  assert_eq!(alive[0].target.display_name, "User");

  let missed = registry
    .list_watching(&watcher, t0() + TimeDelta::hours(36))
    .await
    .unwrap();
  assert_eq!(missed[0].status, WatchStatus::Missed);
  assert_eq!(missed[0].missed_since, Some(t0()));

  let err = registry
    .remove_watch(watch.watch_id, &sid("intruder"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotWatchOwner(_)));

  registry.remove_watch(watch.watch_id, &watcher).await.unwrap();
  assert_eq!(
    h.store.get_subject(&target).await.unwrap().unwrap().watchers_count,
    0
  );
}

#[tokio::test]
async fn add_watch_with_unknown_code_is_not_found() {
  let h = harness().await;
  let registry = WatchRegistry::new(Arc::clone(&h.store));
  let err = registry
    .add_watch(&sid("watcher"), "ZZZZZZ", None, t0())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::CodeNotFound(_)));
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn scheduler_runs_startup_sweep_then_shuts_down() {
  let h = harness().await;
  let last = t0() - TimeDelta::days(3);
  let id =
    monitored_subject(&h.store, "device-1", &["a@example.com"], Some(last))
      .await;

  let schedule = SweepSchedule {
    period:        Duration::from_secs(3600),
    startup_delay: Duration::from_secs(5),
  };
  let (tx, rx) = watch::channel(false);
  let handle = tokio::spawn(scheduler::run(Arc::clone(&h.sweep), schedule, rx));

  // Paused time auto-advances past the startup delay while we wait; the
  // sweep itself runs on real store threads, so poll for its ledger write.
  tokio::time::sleep(Duration::from_secs(6)).await;
  let key = alert_key(&id, last);
  for _ in 0..200 {
    if h.store.alert_exists(&key).await.unwrap() {
      break;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
  }
  assert!(h.store.alert_exists(&key).await.unwrap());

  tx.send(true).unwrap();
  handle.await.unwrap();
}
