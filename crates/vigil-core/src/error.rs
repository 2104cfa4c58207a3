//! Error types for `vigil-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::subject::SubjectId;

/// Coarse classification of an [`Error`], used by the HTTP layer to pick a
/// status code without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  InvalidArgument,
  NotFound,
  Conflict,
  Forbidden,
  Storage,
}

#[derive(Debug, Error)]
pub enum Error {
  // ── Invalid argument ──────────────────────────────────────────────────
  #[error("invalid subject id: {0:?}")]
  InvalidSubjectId(String),

  #[error("cadence must be between 1 and 30 days, got {0}")]
  InvalidCadence(i64),

  #[error("invalid email address: {0:?}")]
  InvalidEmail(String),

  #[error("share code must be 6 characters: {0:?}")]
  InvalidCode(String),

  #[error("display name must not be empty")]
  EmptyDisplayName,

  // ── Not found ─────────────────────────────────────────────────────────
  #[error("subject not found: {0}")]
  SubjectNotFound(SubjectId),

  #[error("no subject with share code {0:?}")]
  CodeNotFound(String),

  #[error("watch relationship not found: {0}")]
  WatchNotFound(Uuid),

  #[error("squad member not found: {0}")]
  SquadMemberNotFound(Uuid),

  // ── Conflict ──────────────────────────────────────────────────────────
  #[error("squad is full (maximum {limit} members)")]
  SquadFull { limit: usize },

  #[error("{0:?} is already in the squad")]
  DuplicateSquadEmail(String),

  #[error("{watcher} is already watching {target}")]
  AlreadyWatching {
    watcher: SubjectId,
    target:  SubjectId,
  },

  #[error("share code {0:?} is already taken")]
  CodeTaken(String),

  // ── Forbidden ─────────────────────────────────────────────────────────
  #[error("watch relationship {0} belongs to a different watcher")]
  NotWatchOwner(Uuid),

  // ── Storage ───────────────────────────────────────────────────────────
  #[error("storage error: {0}")]
  Storage(String),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::InvalidSubjectId(_)
      | Self::InvalidCadence(_)
      | Self::InvalidEmail(_)
      | Self::InvalidCode(_)
      | Self::EmptyDisplayName => ErrorKind::InvalidArgument,

      Self::SubjectNotFound(_)
      | Self::CodeNotFound(_)
      | Self::WatchNotFound(_)
      | Self::SquadMemberNotFound(_) => ErrorKind::NotFound,

      Self::SquadFull { .. }
      | Self::DuplicateSquadEmail(_)
      | Self::AlreadyWatching { .. }
      | Self::CodeTaken(_) => ErrorKind::Conflict,

      Self::NotWatchOwner(_) => ErrorKind::Forbidden,

      Self::Storage(_) => ErrorKind::Storage,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
