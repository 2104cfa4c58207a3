//! Subject — the monitored person and their squad of trusted contacts.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Maximum number of squad members per subject.
pub const MAX_SQUAD_MEMBERS: usize = 5;

/// Alphabet for share codes. Excludes easily-confused glyphs (I, O, 0, 1).
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a share code.
pub const CODE_LEN: usize = 6;

// ─── SubjectId ───────────────────────────────────────────────────────────────

/// Stable opaque identifier for a subject (device-bound).
///
/// Validated once at the boundary; everywhere else the inner string is
/// trusted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
  /// Parse and validate a raw identifier: non-empty, at most 128 bytes,
  /// ASCII graphic characters only.
  pub fn parse(raw: &str) -> Result<Self> {
    let raw = raw.trim();
    if raw.is_empty()
      || raw.len() > 128
      || !raw.bytes().all(|b| b.is_ascii_graphic())
    {
      return Err(Error::InvalidSubjectId(raw.to_string()));
    }
    Ok(Self(raw.to_string()))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for SubjectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── SquadMember ─────────────────────────────────────────────────────────────

/// A trusted contact who is emailed when the subject misses a check-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SquadMember {
  pub member_id: Uuid,
  /// Lowercased at the boundary; uniqueness per subject is case-insensitive.
  pub email:     String,
  pub added_at:  DateTime<Utc>,
}

/// Normalise and validate a squad-member email address.
///
/// Deliberately loose: one `@`, a non-empty local part, and a dot in the
/// domain. Anything stricter belongs to the mail transport.
pub fn normalize_email(raw: &str) -> Result<String> {
  let email = raw.trim().to_lowercase();
  let mut parts = email.split('@');
  let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
    (Some(l), Some(d), None) => (l, d),
    _ => return Err(Error::InvalidEmail(raw.to_string())),
  };
  if local.is_empty()
    || domain.len() < 3
    || !domain.contains('.')
    || domain.starts_with('.')
    || domain.ends_with('.')
    || email.chars().any(char::is_whitespace)
  {
    return Err(Error::InvalidEmail(raw.to_string()));
  }
  Ok(email)
}

/// Normalise a share code as entered by a watcher: trimmed, uppercased,
/// exactly [`CODE_LEN`] characters.
pub fn normalize_code(raw: &str) -> Result<String> {
  let code = raw.trim().to_uppercase();
  if code.len() != CODE_LEN {
    return Err(Error::InvalidCode(raw.to_string()));
  }
  Ok(code)
}

// ─── Subject ─────────────────────────────────────────────────────────────────

/// The durable record of one monitored person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id:      SubjectId,
  pub display_name:    String,
  /// Six-character share code others use to start watching this subject.
  /// Assigned on demand, globally unique.
  pub code:            Option<String>,
  /// How often the subject has promised to check in, in days. Bounded
  /// [1, 30] by [`crate::policy::validate_cadence`].
  pub cadence_days:    u8,
  /// `None` means the subject has never checked in.
  pub last_check_in:   Option<DateTime<Utc>>,
  /// Consecutive on-time check-ins.
  pub streak:          u32,
  /// Lifetime counter; never reset.
  pub total_check_ins: u64,
  /// Denormalised count of live watch relationships targeting this subject.
  pub watchers_count:  u32,
  /// Insertion-ordered; at most [`MAX_SQUAD_MEMBERS`], unique emails.
  pub squad:           Vec<SquadMember>,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

impl Subject {
  /// The record created on first identity resolution.
  pub fn new(subject_id: SubjectId, now: DateTime<Utc>) -> Self {
    Self {
      subject_id,
      display_name: "User".to_string(),
      code: None,
      cadence_days: 1,
      last_check_in: None,
      streak: 0,
      total_check_ins: 0,
      watchers_count: 0,
      squad: Vec::new(),
      created_at: now,
      updated_at: now,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn subject_id_accepts_device_style_ids() {
    assert!(SubjectId::parse("device-1234-abcd").is_ok());
    assert!(SubjectId::parse("  padded  ").is_ok());
  }

  #[test]
  fn subject_id_rejects_empty_and_whitespace() {
    assert!(SubjectId::parse("").is_err());
    assert!(SubjectId::parse("   ").is_err());
    assert!(SubjectId::parse("has space").is_err());
    assert!(SubjectId::parse("tab\there").is_err());
  }

  #[test]
  fn subject_id_rejects_overlong() {
    let long = "x".repeat(129);
    assert!(SubjectId::parse(&long).is_err());
    assert!(SubjectId::parse(&"x".repeat(128)).is_ok());
  }

  #[test]
  fn email_is_lowercased_and_trimmed() {
    assert_eq!(
      normalize_email(" Ada@Example.COM ").unwrap(),
      "ada@example.com"
    );
  }

  #[test]
  fn email_rejects_malformed() {
    for bad in ["", "no-at-sign", "@example.com", "a@b", "a@.com", "a@b@c.com"] {
      assert!(normalize_email(bad).is_err(), "accepted {bad:?}");
    }
  }

  #[test]
  fn code_is_uppercased() {
    assert_eq!(normalize_code("ab2cd3").unwrap(), "AB2CD3");
    assert!(normalize_code("short").is_err());
    assert!(normalize_code("toolong7").is_err());
  }
}
