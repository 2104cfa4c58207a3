//! [`SqliteStore`] — the SQLite implementation of [`SubjectStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use vigil_core::{
  Error as CoreError,
  alert::AlertLedgerEntry,
  event::CheckInEvent,
  store::{CheckInUpdate, DeletionSummary, SubjectStore},
  subject::{MAX_SQUAD_MEMBERS, Subject, SubjectId, SquadMember},
  watch::{NewWatch, WatchRelationship},
};

use crate::{
  Error, Result,
  encode::{
    RawSquadMember, RawSubject, RawWatch, encode_alert, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

/// Outcome of a domain operation evaluated inside a database closure; kept
/// separate from the transport-level result so a rollback can carry a typed
/// domain error out without boxing.
type Domain<T> = std::result::Result<T, CoreError>;

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn query_subject_row(
  conn: &rusqlite::Connection,
  id:   &str,
) -> rusqlite::Result<Option<RawSubject>> {
  conn
    .query_row(
      "SELECT subject_id, display_name, code, cadence_days, last_check_in,
              streak, total_check_ins, watchers_count, created_at, updated_at
       FROM subjects WHERE subject_id = ?1",
      rusqlite::params![id],
      |row| {
        Ok(RawSubject {
          subject_id:      row.get(0)?,
          display_name:    row.get(1)?,
          code:            row.get(2)?,
          cadence_days:    row.get(3)?,
          last_check_in:   row.get(4)?,
          streak:          row.get(5)?,
          total_check_ins: row.get(6)?,
          watchers_count:  row.get(7)?,
          created_at:      row.get(8)?,
          updated_at:      row.get(9)?,
        })
      },
    )
    .optional()
}

fn query_squad_rows(
  conn: &rusqlite::Connection,
  id:   &str,
) -> rusqlite::Result<Vec<RawSquadMember>> {
  let mut stmt = conn.prepare(
    "SELECT member_id, email, added_at FROM squad_members
     WHERE subject_id = ?1 ORDER BY added_at, rowid",
  )?;
  stmt
    .query_map(rusqlite::params![id], |row| {
      Ok(RawSquadMember {
        member_id: row.get(0)?,
        email:     row.get(1)?,
        added_at:  row.get(2)?,
      })
    })?
    .collect()
}

fn decode_squad(raws: Vec<RawSquadMember>) -> Result<Vec<SquadMember>> {
  raws.into_iter().map(RawSquadMember::into_member).collect()
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Vigil subject store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Load one subject with its squad assembled.
  async fn fetch_subject(&self, id_str: String) -> Result<Option<Subject>> {
    let pair = self
      .conn
      .call(move |conn| {
        let Some(raw) = query_subject_row(conn, &id_str)? else {
          return Ok(None);
        };
        let squad = query_squad_rows(conn, &id_str)?;
        Ok(Some((raw, squad)))
      })
      .await?;

    match pair {
      Some((raw, squad)) => Ok(Some(raw.into_subject(decode_squad(squad)?)?)),
      None => Ok(None),
    }
  }

  /// Load a subject that is expected to exist after a successful write.
  async fn fetch_existing(&self, id: &SubjectId) -> Result<Subject> {
    self
      .fetch_subject(id.as_str().to_string())
      .await?
      .ok_or_else(|| Error::Core(CoreError::SubjectNotFound(id.clone())))
  }
}

// ─── SubjectStore impl ───────────────────────────────────────────────────────

impl SubjectStore for SqliteStore {
  type Error = Error;

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn resolve_subject(
    &self,
    id:  &SubjectId,
    now: DateTime<Utc>,
  ) -> Result<(Subject, bool)> {
    let id_str  = id.as_str().to_string();
    let now_str = encode_dt(now);

    let (raw, squad, created) = self
      .conn
      .call(move |conn| {
        if let Some(raw) = query_subject_row(conn, &id_str)? {
          let squad = query_squad_rows(conn, &id_str)?;
          return Ok((raw, squad, false));
        }

        conn.execute(
          "INSERT INTO subjects (subject_id, display_name, cadence_days,
             streak, total_check_ins, watchers_count, created_at, updated_at)
           VALUES (?1, 'User', 1, 0, 0, 0, ?2, ?2)",
          rusqlite::params![id_str, now_str],
        )?;

        let raw = RawSubject {
          subject_id:      id_str,
          display_name:    "User".to_string(),
          code:            None,
          cadence_days:    1,
          last_check_in:   None,
          streak:          0,
          total_check_ins: 0,
          watchers_count:  0,
          created_at:      now_str.clone(),
          updated_at:      now_str,
        };
        Ok((raw, Vec::new(), true))
      })
      .await?;

    Ok((raw.into_subject(decode_squad(squad)?)?, created))
  }

  async fn get_subject(&self, id: &SubjectId) -> Result<Option<Subject>> {
    self.fetch_subject(id.as_str().to_string()).await
  }

  async fn get_subject_by_code(&self, code: &str) -> Result<Option<Subject>> {
    let code_str = code.to_string();
    let id: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT subject_id FROM subjects WHERE code = ?1",
              rusqlite::params![code_str],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    match id {
      Some(id_str) => self.fetch_subject(id_str).await,
      None => Ok(None),
    }
  }

  async fn update_display_name(
    &self,
    id:   &SubjectId,
    name: &str,
    now:  DateTime<Utc>,
  ) -> Result<Subject> {
    let id_str   = id.as_str().to_string();
    let name_str = name.to_string();
    let now_str  = encode_dt(now);

    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE subjects SET display_name = ?1, updated_at = ?2
           WHERE subject_id = ?3",
          rusqlite::params![name_str, now_str, id_str],
        )?)
      })
      .await?;

    if affected == 0 {
      return Err(Error::Core(CoreError::SubjectNotFound(id.clone())));
    }
    self.fetch_existing(id).await
  }

  async fn set_cadence(
    &self,
    id:           &SubjectId,
    cadence_days: u8,
    now:          DateTime<Utc>,
  ) -> Result<Subject> {
    let id_str  = id.as_str().to_string();
    let days    = i64::from(cadence_days);
    let now_str = encode_dt(now);

    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE subjects SET cadence_days = ?1, updated_at = ?2
           WHERE subject_id = ?3",
          rusqlite::params![days, now_str, id_str],
        )?)
      })
      .await?;

    if affected == 0 {
      return Err(Error::Core(CoreError::SubjectNotFound(id.clone())));
    }
    self.fetch_existing(id).await
  }

  async fn assign_code(
    &self,
    id:   &SubjectId,
    code: &str,
    now:  DateTime<Utc>,
  ) -> Result<()> {
    let sid      = id.clone();
    let id_str   = id.as_str().to_string();
    let code_str = code.to_string();
    let now_str  = encode_dt(now);

    let outcome: Domain<()> = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "UPDATE subjects SET code = ?1, updated_at = ?2 WHERE subject_id = ?3",
          rusqlite::params![code_str, now_str, id_str],
        ) {
          Ok(0) => Ok(Err(CoreError::SubjectNotFound(sid))),
          Ok(_) => Ok(Ok(())),
          Err(rusqlite::Error::SqliteFailure(f, _))
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
          {
            Ok(Err(CoreError::CodeTaken(code_str)))
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    outcome.map_err(Error::Core)
  }

  // ── Squad ─────────────────────────────────────────────────────────────────

  async fn add_squad_member(
    &self,
    id:    &SubjectId,
    email: &str,
    now:   DateTime<Utc>,
  ) -> Result<SquadMember> {
    let member_id = Uuid::new_v4();

    let sid       = id.clone();
    let id_str    = id.as_str().to_string();
    let email_str = email.to_string();
    let mid_str   = encode_uuid(member_id);
    let now_str   = encode_dt(now);

    let outcome: Domain<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let exists: bool = tx
          .query_row(
            "SELECT 1 FROM subjects WHERE subject_id = ?1",
            rusqlite::params![id_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(Err(CoreError::SubjectNotFound(sid)));
        }

        let count: i64 = tx.query_row(
          "SELECT COUNT(*) FROM squad_members WHERE subject_id = ?1",
          rusqlite::params![id_str],
          |row| row.get(0),
        )?;
        if count as usize >= MAX_SQUAD_MEMBERS {
          return Ok(Err(CoreError::SquadFull { limit: MAX_SQUAD_MEMBERS }));
        }

        let duplicate: bool = tx
          .query_row(
            "SELECT 1 FROM squad_members WHERE subject_id = ?1 AND email = ?2",
            rusqlite::params![id_str, email_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if duplicate {
          return Ok(Err(CoreError::DuplicateSquadEmail(email_str)));
        }

        tx.execute(
          "INSERT INTO squad_members (member_id, subject_id, email, added_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![mid_str, id_str, email_str, now_str],
        )?;
        tx.execute(
          "UPDATE subjects SET updated_at = ?1 WHERE subject_id = ?2",
          rusqlite::params![now_str, id_str],
        )?;

        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    outcome.map_err(Error::Core)?;
    Ok(SquadMember {
      member_id,
      email: email.to_string(),
      added_at: now,
    })
  }

  async fn remove_squad_member(
    &self,
    id:        &SubjectId,
    member_id: Uuid,
  ) -> Result<()> {
    let id_str  = id.as_str().to_string();
    let mid_str = encode_uuid(member_id);

    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM squad_members WHERE member_id = ?1 AND subject_id = ?2",
          rusqlite::params![mid_str, id_str],
        )?)
      })
      .await?;

    if affected == 0 {
      return Err(Error::Core(CoreError::SquadMemberNotFound(member_id)));
    }
    Ok(())
  }

  // ── Check-ins ─────────────────────────────────────────────────────────────

  async fn apply_check_in(
    &self,
    id:     &SubjectId,
    update: CheckInUpdate,
  ) -> Result<CheckInEvent> {
    let event_id = Uuid::new_v4();

    let sid     = id.clone();
    let id_str  = id.as_str().to_string();
    let eid_str = encode_uuid(event_id);
    let at_str  = encode_dt(update.checked_in_at);
    let streak  = i64::from(update.streak);
    let total   = update.total_check_ins as i64;

    let outcome: Domain<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let affected = tx.execute(
          "UPDATE subjects
           SET last_check_in = ?1, streak = ?2, total_check_ins = ?3,
               updated_at = ?1
           WHERE subject_id = ?4",
          rusqlite::params![at_str, streak, total, id_str],
        )?;
        if affected == 0 {
          return Ok(Err(CoreError::SubjectNotFound(sid)));
        }

        tx.execute(
          "INSERT INTO check_in_events
             (event_id, subject_id, checked_in_at, streak, total_check_ins)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![eid_str, id_str, at_str, streak, total],
        )?;

        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    outcome.map_err(Error::Core)?;
    Ok(CheckInEvent {
      event_id,
      subject_id:      id.clone(),
      checked_in_at:   update.checked_in_at,
      streak:          update.streak,
      total_check_ins: update.total_check_ins,
    })
  }

  // ── Sweep support ─────────────────────────────────────────────────────────

  async fn subjects_with_squad(&self) -> Result<Vec<Subject>> {
    let pairs: Vec<(RawSubject, Vec<RawSquadMember>)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT subject_id, display_name, code, cadence_days, last_check_in,
                  streak, total_check_ins, watchers_count, created_at, updated_at
           FROM subjects s
           WHERE EXISTS (SELECT 1 FROM squad_members m
                         WHERE m.subject_id = s.subject_id)",
        )?;
        let raws = stmt
          .query_map([], |row| {
            Ok(RawSubject {
              subject_id:      row.get(0)?,
              display_name:    row.get(1)?,
              code:            row.get(2)?,
              cadence_days:    row.get(3)?,
              last_check_in:   row.get(4)?,
              streak:          row.get(5)?,
              total_check_ins: row.get(6)?,
              watchers_count:  row.get(7)?,
              created_at:      row.get(8)?,
              updated_at:      row.get(9)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(raws.len());
        for raw in raws {
          let squad = query_squad_rows(conn, &raw.subject_id)?;
          out.push((raw, squad));
        }
        Ok(out)
      })
      .await?;

    pairs
      .into_iter()
      .map(|(raw, squad)| raw.into_subject(decode_squad(squad)?))
      .collect()
  }

  async fn alert_exists(&self, key: &str) -> Result<bool> {
    let key_str = key.to_string();
    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM missed_check_in_alerts WHERE alert_key = ?1",
              rusqlite::params![key_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }

  async fn insert_alerts(&self, entries: &[AlertLedgerEntry]) -> Result<usize> {
    let encoded = entries
      .iter()
      .map(encode_alert)
      .collect::<Result<Vec<_>>>()?;

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0usize;
        for a in &encoded {
          inserted += tx.execute(
            "INSERT OR IGNORE INTO missed_check_in_alerts
               (alert_key, subject_id, display_name, last_check_in,
                notified, overdue_ms, cadence_days, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
              a.alert_key,
              a.subject_id,
              a.display_name,
              a.last_check_in,
              a.notified,
              a.overdue_ms,
              a.cadence_days,
              a.created_at,
            ],
          )?;
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;

    Ok(inserted)
  }

  // ── Watch relationships ───────────────────────────────────────────────────

  async fn add_watch(
    &self,
    watch: NewWatch,
    now:   DateTime<Utc>,
  ) -> Result<WatchRelationship> {
    let watch_id = Uuid::new_v4();

    let watcher     = watch.watcher_id.clone();
    let target      = watch.target_id.clone();
    let watcher_str = watch.watcher_id.as_str().to_string();
    let target_str  = watch.target_id.as_str().to_string();
    let code_str    = watch.target_code.clone();
    let label_str   = watch.label.clone();
    let wid_str     = encode_uuid(watch_id);
    let now_str     = encode_dt(now);

    let outcome: Domain<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Reads first, then writes: pair uniqueness and the current count.
        let duplicate: bool = tx
          .query_row(
            "SELECT 1 FROM watches WHERE watcher_id = ?1 AND target_id = ?2",
            rusqlite::params![watcher_str, target_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if duplicate {
          return Ok(Err(CoreError::AlreadyWatching { watcher, target }));
        }

        let count: Option<i64> = tx
          .query_row(
            "SELECT watchers_count FROM subjects WHERE subject_id = ?1",
            rusqlite::params![target_str],
            |row| row.get(0),
          )
          .optional()?;
        let Some(count) = count else {
          return Ok(Err(CoreError::SubjectNotFound(target)));
        };

        tx.execute(
          "INSERT INTO watches
             (watch_id, watcher_id, target_id, target_code, label, added_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            wid_str, watcher_str, target_str, code_str, label_str, now_str
          ],
        )?;
        tx.execute(
          "UPDATE subjects SET watchers_count = ?1, updated_at = ?2
           WHERE subject_id = ?3",
          rusqlite::params![count.max(0) + 1, now_str, target_str],
        )?;

        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    outcome.map_err(Error::Core)?;
    Ok(WatchRelationship {
      watch_id,
      watcher_id:  watch.watcher_id,
      target_id:   watch.target_id,
      target_code: watch.target_code,
      label:       watch.label,
      added_at:    now,
    })
  }

  async fn remove_watch(
    &self,
    watch_id:  Uuid,
    requester: &SubjectId,
  ) -> Result<()> {
    let wid_str       = encode_uuid(watch_id);
    let requester_str = requester.as_str().to_string();
    let now_str       = encode_dt(Utc::now());

    let outcome: Domain<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let row: Option<(String, String)> = tx
          .query_row(
            "SELECT watcher_id, target_id FROM watches WHERE watch_id = ?1",
            rusqlite::params![wid_str],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;
        let Some((watcher_str, target_str)) = row else {
          return Ok(Err(CoreError::WatchNotFound(watch_id)));
        };
        if watcher_str != requester_str {
          return Ok(Err(CoreError::NotWatchOwner(watch_id)));
        }

        tx.execute(
          "DELETE FROM watches WHERE watch_id = ?1",
          rusqlite::params![wid_str],
        )?;
        // Floored decrement: drift must never push the count negative.
        tx.execute(
          "UPDATE subjects
           SET watchers_count = MAX(watchers_count - 1, 0), updated_at = ?1
           WHERE subject_id = ?2",
          rusqlite::params![now_str, target_str],
        )?;

        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    outcome.map_err(Error::Core)
  }

  async fn watches_by_watcher(
    &self,
    watcher: &SubjectId,
  ) -> Result<Vec<WatchRelationship>> {
    let watcher_str = watcher.as_str().to_string();

    let raws: Vec<RawWatch> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT watch_id, watcher_id, target_id, target_code, label, added_at
           FROM watches WHERE watcher_id = ?1 ORDER BY added_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![watcher_str], |row| {
            Ok(RawWatch {
              watch_id:    row.get(0)?,
              watcher_id:  row.get(1)?,
              target_id:   row.get(2)?,
              target_code: row.get(3)?,
              label:       row.get(4)?,
              added_at:    row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawWatch::into_watch).collect()
  }

  // ── Account deletion ──────────────────────────────────────────────────────

  async fn delete_account(&self, id: &SubjectId) -> Result<DeletionSummary> {
    let id_str  = id.as_str().to_string();
    let now_str = encode_dt(Utc::now());

    let summary = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Watches held by the deleted account: each target gets the paired
        // floored decrement before the rows go.
        let targets: Vec<String> = {
          let mut stmt = tx.prepare(
            "SELECT target_id FROM watches WHERE watcher_id = ?1",
          )?;
          stmt
            .query_map(rusqlite::params![id_str], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        for target in &targets {
          tx.execute(
            "UPDATE subjects
             SET watchers_count = MAX(watchers_count - 1, 0), updated_at = ?1
             WHERE subject_id = ?2",
            rusqlite::params![now_str, target],
          )?;
        }
        let watches_as_watcher = tx.execute(
          "DELETE FROM watches WHERE watcher_id = ?1",
          rusqlite::params![id_str],
        )?;

        // Watches targeting the deleted account need no decrement: the
        // counter disappears with the subject row.
        let watches_as_target = tx.execute(
          "DELETE FROM watches WHERE target_id = ?1",
          rusqlite::params![id_str],
        )?;

        let check_in_events = tx.execute(
          "DELETE FROM check_in_events WHERE subject_id = ?1",
          rusqlite::params![id_str],
        )?;
        let alerts = tx.execute(
          "DELETE FROM missed_check_in_alerts WHERE subject_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.execute(
          "DELETE FROM squad_members WHERE subject_id = ?1",
          rusqlite::params![id_str],
        )?;
        let subject_deleted = tx.execute(
          "DELETE FROM subjects WHERE subject_id = ?1",
          rusqlite::params![id_str],
        )? > 0;

        tx.commit()?;
        Ok(DeletionSummary {
          subject_deleted,
          watches_as_watcher,
          watches_as_target,
          check_in_events,
          alerts,
        })
      })
      .await?;

    Ok(summary)
  }
}
