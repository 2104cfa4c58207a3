//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. The alert ledger's notified
//! list is stored as a compact JSON array. UUIDs are stored as hyphenated
//! lowercase strings. Subject identifiers are already opaque strings.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use vigil_core::{
  alert::AlertLedgerEntry,
  subject::{Subject, SubjectId, SquadMember},
  watch::WatchRelationship,
};

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Subject ids were validated on the way in; storage round-trips them as-is.
pub fn decode_subject_id(s: &str) -> Result<SubjectId> {
  SubjectId::parse(s).map_err(Error::Core)
}

pub fn encode_emails(emails: &[String]) -> Result<String> {
  Ok(serde_json::to_string(emails)?)
}

pub fn decode_cadence(v: i64) -> Result<u8> {
  u8::try_from(v)
    .map_err(|_| Error::DateParse(format!("cadence out of range: {v}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id:      String,
  pub display_name:    String,
  pub code:            Option<String>,
  pub cadence_days:    i64,
  pub last_check_in:   Option<String>,
  pub streak:          i64,
  pub total_check_ins: i64,
  pub watchers_count:  i64,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawSubject {
  pub fn into_subject(self, squad: Vec<SquadMember>) -> Result<Subject> {
    Ok(Subject {
      subject_id:      decode_subject_id(&self.subject_id)?,
      display_name:    self.display_name,
      code:            self.code,
      cadence_days:    decode_cadence(self.cadence_days)?,
      last_check_in:   self.last_check_in.as_deref().map(decode_dt).transpose()?,
      streak:          self.streak.max(0) as u32,
      total_check_ins: self.total_check_ins.max(0) as u64,
      watchers_count:  self.watchers_count.max(0) as u32,
      squad,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `squad_members` row.
pub struct RawSquadMember {
  pub member_id: String,
  pub email:     String,
  pub added_at:  String,
}

impl RawSquadMember {
  pub fn into_member(self) -> Result<SquadMember> {
    Ok(SquadMember {
      member_id: decode_uuid(&self.member_id)?,
      email:     self.email,
      added_at:  decode_dt(&self.added_at)?,
    })
  }
}

/// Raw strings read directly from a `watches` row.
pub struct RawWatch {
  pub watch_id:    String,
  pub watcher_id:  String,
  pub target_id:   String,
  pub target_code: String,
  pub label:       String,
  pub added_at:    String,
}

impl RawWatch {
  pub fn into_watch(self) -> Result<WatchRelationship> {
    Ok(WatchRelationship {
      watch_id:    decode_uuid(&self.watch_id)?,
      watcher_id:  decode_subject_id(&self.watcher_id)?,
      target_id:   decode_subject_id(&self.target_id)?,
      target_code: self.target_code,
      label:       self.label,
      added_at:    decode_dt(&self.added_at)?,
    })
  }
}

/// Column values for one alert ledger row, pre-encoded so the insert closure
/// owns plain strings.
pub struct EncodedAlert {
  pub alert_key:     String,
  pub subject_id:    String,
  pub display_name:  String,
  pub last_check_in: String,
  pub notified:      String,
  pub overdue_ms:    i64,
  pub cadence_days:  i64,
  pub created_at:    String,
}

pub fn encode_alert(entry: &AlertLedgerEntry) -> Result<EncodedAlert> {
  Ok(EncodedAlert {
    alert_key:     entry.alert_key.clone(),
    subject_id:    entry.subject_id.as_str().to_string(),
    display_name:  entry.display_name.clone(),
    last_check_in: encode_dt(entry.last_check_in),
    notified:      encode_emails(&entry.notified)?,
    overdue_ms:    entry.overdue_by.num_milliseconds(),
    cadence_days:  i64::from(entry.cadence_days),
    created_at:    encode_dt(entry.created_at),
  })
}
