//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;
use vigil_core::{
  Error as CoreError,
  alert::{AlertLedgerEntry, alert_key},
  store::{CheckInUpdate, SubjectStore},
  subject::SubjectId,
  watch::NewWatch,
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn sid(s: &str) -> SubjectId {
  SubjectId::parse(s).expect("valid subject id")
}

fn t0() -> DateTime<Utc> {
  DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
    .unwrap()
    .with_timezone(&Utc)
}

fn new_watch(watcher: &str, target: &str) -> NewWatch {
  NewWatch {
    watcher_id:  sid(watcher),
    target_id:   sid(target),
    target_code: "AB2CD3".to_string(),
    label:       "Friend".to_string(),
  }
}

// ─── Subjects ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn resolve_creates_then_returns_existing() {
  let s = store().await;
  let id = sid("device-1");

  let (subject, created) = s.resolve_subject(&id, t0()).await.unwrap();
  assert!(created);
  assert_eq!(subject.subject_id, id);
  assert_eq!(subject.display_name, "User");
  assert_eq!(subject.cadence_days, 1);
  assert_eq!(subject.streak, 0);
  assert_eq!(subject.total_check_ins, 0);
  assert!(subject.last_check_in.is_none());
  assert!(subject.squad.is_empty());

  let (again, created) = s.resolve_subject(&id, t0()).await.unwrap();
  assert!(!created);
  assert_eq!(again.subject_id, id);
}

#[tokio::test]
async fn get_subject_missing_returns_none() {
  let s = store().await;
  assert!(s.get_subject(&sid("nobody")).await.unwrap().is_none());
}

#[tokio::test]
async fn update_display_name_roundtrip() {
  let s = store().await;
  let id = sid("device-1");
  s.resolve_subject(&id, t0()).await.unwrap();

  let subject = s.update_display_name(&id, "Ada", t0()).await.unwrap();
  assert_eq!(subject.display_name, "Ada");

  let err = s
    .update_display_name(&sid("nobody"), "X", t0())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::SubjectNotFound(_))));
}

#[tokio::test]
async fn set_cadence_roundtrip() {
  let s = store().await;
  let id = sid("device-1");
  s.resolve_subject(&id, t0()).await.unwrap();

  let subject = s.set_cadence(&id, 7, t0()).await.unwrap();
  assert_eq!(subject.cadence_days, 7);
}

// ─── Share codes ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn assign_code_and_lookup() {
  let s = store().await;
  let id = sid("device-1");
  s.resolve_subject(&id, t0()).await.unwrap();

  s.assign_code(&id, "AB2CD3", t0()).await.unwrap();

  let found = s.get_subject_by_code("AB2CD3").await.unwrap().unwrap();
  assert_eq!(found.subject_id, id);
  assert_eq!(found.code.as_deref(), Some("AB2CD3"));

  assert!(s.get_subject_by_code("ZZZZZZ").await.unwrap().is_none());
}

#[tokio::test]
async fn assign_code_rejects_taken_code() {
  let s = store().await;
  let a = sid("device-a");
  let b = sid("device-b");
  s.resolve_subject(&a, t0()).await.unwrap();
  s.resolve_subject(&b, t0()).await.unwrap();

  s.assign_code(&a, "AB2CD3", t0()).await.unwrap();
  let err = s.assign_code(&b, "AB2CD3", t0()).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::CodeTaken(_))));
}

// ─── Squad ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn squad_members_are_insertion_ordered() {
  let s = store().await;
  let id = sid("device-1");
  s.resolve_subject(&id, t0()).await.unwrap();

  s.add_squad_member(&id, "a@example.com", t0()).await.unwrap();
  s.add_squad_member(&id, "b@example.com", t0() + TimeDelta::seconds(1))
    .await
    .unwrap();

  let subject = s.get_subject(&id).await.unwrap().unwrap();
  let emails: Vec<_> = subject.squad.iter().map(|m| m.email.as_str()).collect();
  assert_eq!(emails, ["a@example.com", "b@example.com"]);
}

#[tokio::test]
async fn squad_rejects_duplicate_email() {
  let s = store().await;
  let id = sid("device-1");
  s.resolve_subject(&id, t0()).await.unwrap();

  s.add_squad_member(&id, "a@example.com", t0()).await.unwrap();
  let err = s
    .add_squad_member(&id, "a@example.com", t0())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DuplicateSquadEmail(_))));
}

#[tokio::test]
async fn squad_enforces_size_cap() {
  let s = store().await;
  let id = sid("device-1");
  s.resolve_subject(&id, t0()).await.unwrap();

  for i in 0..5 {
    s.add_squad_member(&id, &format!("m{i}@example.com"), t0())
      .await
      .unwrap();
  }
  let err = s
    .add_squad_member(&id, "sixth@example.com", t0())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::SquadFull { limit: 5 })));
}

#[tokio::test]
async fn remove_squad_member_by_id() {
  let s = store().await;
  let id = sid("device-1");
  s.resolve_subject(&id, t0()).await.unwrap();

  let member = s.add_squad_member(&id, "a@example.com", t0()).await.unwrap();
  s.remove_squad_member(&id, member.member_id).await.unwrap();

  let subject = s.get_subject(&id).await.unwrap().unwrap();
  assert!(subject.squad.is_empty());

  let err = s.remove_squad_member(&id, Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::SquadMemberNotFound(_))));
}

// ─── Check-ins ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn apply_check_in_updates_subject() {
  let s = store().await;
  let id = sid("device-1");
  s.resolve_subject(&id, t0()).await.unwrap();

  let at = t0() + TimeDelta::hours(1);
  let event = s
    .apply_check_in(
      &id,
      CheckInUpdate { checked_in_at: at, streak: 1, total_check_ins: 1 },
    )
    .await
    .unwrap();
  assert_eq!(event.subject_id, id);
  assert_eq!(event.checked_in_at, at);
  assert_eq!((event.streak, event.total_check_ins), (1, 1));

  let subject = s.get_subject(&id).await.unwrap().unwrap();
  assert_eq!(subject.last_check_in, Some(at));
  assert_eq!(subject.streak, 1);
  assert_eq!(subject.total_check_ins, 1);
}

#[tokio::test]
async fn apply_check_in_unknown_subject_errors() {
  let s = store().await;
  let err = s
    .apply_check_in(
      &sid("nobody"),
      CheckInUpdate { checked_in_at: t0(), streak: 1, total_check_ins: 1 },
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::SubjectNotFound(_))));
}

// ─── Sweep support ───────────────────────────────────────────────────────────

#[tokio::test]
async fn subjects_with_squad_filters_squadless() {
  let s = store().await;
  let with = sid("with-squad");
  let without = sid("no-squad");
  s.resolve_subject(&with, t0()).await.unwrap();
  s.resolve_subject(&without, t0()).await.unwrap();
  s.add_squad_member(&with, "a@example.com", t0()).await.unwrap();

  let subjects = s.subjects_with_squad().await.unwrap();
  assert_eq!(subjects.len(), 1);
  assert_eq!(subjects[0].subject_id, with);
  assert_eq!(subjects[0].squad.len(), 1);
}

fn ledger_entry(id: &SubjectId, last: DateTime<Utc>) -> AlertLedgerEntry {
  AlertLedgerEntry {
    alert_key:     alert_key(id, last),
    subject_id:    id.clone(),
    display_name:  "User".to_string(),
    last_check_in: last,
    notified:      vec!["a@example.com".to_string()],
    overdue_by:    TimeDelta::days(1),
    cadence_days:  1,
    created_at:    last + TimeDelta::days(3),
  }
}

#[tokio::test]
async fn insert_alerts_is_create_if_absent() {
  let s = store().await;
  let id = sid("device-1");
  let entry = ledger_entry(&id, t0());

  assert!(!s.alert_exists(&entry.alert_key).await.unwrap());

  let inserted = s.insert_alerts(&[entry.clone()]).await.unwrap();
  assert_eq!(inserted, 1);
  assert!(s.alert_exists(&entry.alert_key).await.unwrap());

  // Same key again: ignored, never overwritten.
  let inserted = s.insert_alerts(&[entry.clone()]).await.unwrap();
  assert_eq!(inserted, 0);

  // A different episode inserts alongside.
  let later = ledger_entry(&id, t0() + TimeDelta::days(5));
  let inserted = s.insert_alerts(&[entry, later]).await.unwrap();
  assert_eq!(inserted, 1);
}

// ─── Watch relationships ─────────────────────────────────────────────────────

#[tokio::test]
async fn add_watch_increments_watchers_count() {
  let s = store().await;
  let target = sid("target");
  s.resolve_subject(&target, t0()).await.unwrap();

  s.add_watch(new_watch("watcher-1", "target"), t0()).await.unwrap();
  s.add_watch(new_watch("watcher-2", "target"), t0()).await.unwrap();

  let subject = s.get_subject(&target).await.unwrap().unwrap();
  assert_eq!(subject.watchers_count, 2);
}

#[tokio::test]
async fn add_watch_rejects_duplicate_pair() {
  let s = store().await;
  s.resolve_subject(&sid("target"), t0()).await.unwrap();

  s.add_watch(new_watch("watcher-1", "target"), t0()).await.unwrap();
  let err = s
    .add_watch(new_watch("watcher-1", "target"), t0())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::AlreadyWatching { .. })));

  let subject = s.get_subject(&sid("target")).await.unwrap().unwrap();
  assert_eq!(subject.watchers_count, 1, "failed add must not mutate");
}

#[tokio::test]
async fn add_watch_unknown_target_errors() {
  let s = store().await;
  let err = s
    .add_watch(new_watch("watcher-1", "ghost"), t0())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::SubjectNotFound(_))));
}

#[tokio::test]
async fn remove_watch_decrements_and_checks_ownership() {
  let s = store().await;
  let target = sid("target");
  s.resolve_subject(&target, t0()).await.unwrap();

  let watch = s.add_watch(new_watch("watcher-1", "target"), t0()).await.unwrap();

  let err = s
    .remove_watch(watch.watch_id, &sid("intruder"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::NotWatchOwner(_))));

  s.remove_watch(watch.watch_id, &sid("watcher-1")).await.unwrap();
  let subject = s.get_subject(&target).await.unwrap().unwrap();
  assert_eq!(subject.watchers_count, 0);

  let err = s
    .remove_watch(watch.watch_id, &sid("watcher-1"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::WatchNotFound(_))));
}

#[tokio::test]
async fn watchers_count_matches_live_rows_over_any_sequence() {
  let s = store().await;
  let target = sid("target");
  s.resolve_subject(&target, t0()).await.unwrap();

  let w1 = s.add_watch(new_watch("watcher-1", "target"), t0()).await.unwrap();
  let w2 = s.add_watch(new_watch("watcher-2", "target"), t0()).await.unwrap();
  let w3 = s.add_watch(new_watch("watcher-3", "target"), t0()).await.unwrap();

  s.remove_watch(w2.watch_id, &sid("watcher-2")).await.unwrap();
  assert_eq!(
    s.get_subject(&target).await.unwrap().unwrap().watchers_count,
    2
  );

  s.remove_watch(w1.watch_id, &sid("watcher-1")).await.unwrap();
  s.remove_watch(w3.watch_id, &sid("watcher-3")).await.unwrap();
  assert_eq!(
    s.get_subject(&target).await.unwrap().unwrap().watchers_count,
    0
  );

  // Failed removals mutate nothing.
  assert!(s.remove_watch(w1.watch_id, &sid("watcher-1")).await.is_err());
  assert_eq!(
    s.get_subject(&target).await.unwrap().unwrap().watchers_count,
    0
  );
}

#[tokio::test]
async fn watches_by_watcher_lists_only_own() {
  let s = store().await;
  s.resolve_subject(&sid("t1"), t0()).await.unwrap();
  s.resolve_subject(&sid("t2"), t0()).await.unwrap();

  s.add_watch(new_watch("w", "t1"), t0()).await.unwrap();
  s.add_watch(new_watch("w", "t2"), t0() + TimeDelta::seconds(1))
    .await
    .unwrap();
  s.add_watch(new_watch("other", "t1"), t0()).await.unwrap();

  let watches = s.watches_by_watcher(&sid("w")).await.unwrap();
  assert_eq!(watches.len(), 2);
  assert!(watches.iter().all(|w| w.watcher_id == sid("w")));
}

// ─── Account deletion ────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_account_cascades_and_decrements_targets() {
  let s = store().await;
  let doomed = sid("doomed");
  let friend = sid("friend");
  s.resolve_subject(&doomed, t0()).await.unwrap();
  s.resolve_subject(&friend, t0()).await.unwrap();

  // doomed checks in, has a squad, watches friend, and is watched by friend.
  s.apply_check_in(
    &doomed,
    CheckInUpdate { checked_in_at: t0(), streak: 1, total_check_ins: 1 },
  )
  .await
  .unwrap();
  s.add_squad_member(&doomed, "a@example.com", t0()).await.unwrap();
  s.add_watch(new_watch("doomed", "friend"), t0()).await.unwrap();
  s.add_watch(new_watch("friend", "doomed"), t0()).await.unwrap();
  s.insert_alerts(&[ledger_entry(&doomed, t0())]).await.unwrap();

  let summary = s.delete_account(&doomed).await.unwrap();
  assert!(summary.subject_deleted);
  assert_eq!(summary.watches_as_watcher, 1);
  assert_eq!(summary.watches_as_target, 1);
  assert_eq!(summary.check_in_events, 1);
  assert_eq!(summary.alerts, 1);

  assert!(s.get_subject(&doomed).await.unwrap().is_none());

  // friend lost their watcher and the counter followed.
  let friend_row = s.get_subject(&friend).await.unwrap().unwrap();
  assert_eq!(friend_row.watchers_count, 0);
  assert!(s.watches_by_watcher(&friend).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_account_of_unknown_subject_is_empty_summary() {
  let s = store().await;
  let summary = s.delete_account(&sid("ghost")).await.unwrap();
  assert!(!summary.subject_deleted);
  assert_eq!(summary.watches_as_watcher, 0);
}
