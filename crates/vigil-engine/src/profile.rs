//! Subject profile management: identity resolution, display name, cadence,
//! and share codes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore as _};
use vigil_core::{
  Error, Result,
  policy::validate_cadence,
  store::SubjectStore,
  subject::{CODE_ALPHABET, CODE_LEN, Subject, SubjectId},
};

/// Attempts at a unique share code before giving up.
const CODE_ATTEMPTS: usize = 10;

fn random_code() -> String {
  let mut bytes = [0u8; CODE_LEN];
  OsRng.fill_bytes(&mut bytes);
  bytes
    .iter()
    .map(|b| CODE_ALPHABET[usize::from(*b) % CODE_ALPHABET.len()] as char)
    .collect()
}

pub struct ProfileService<S> {
  store: Arc<S>,
}

impl<S> Clone for ProfileService<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: SubjectStore> ProfileService<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Get-or-create the subject for an identifier. Lazy creation on first
  /// authenticated request is the identity-resolution policy; nothing else
  /// in the system ever creates a subject implicitly.
  pub async fn resolve(
    &self,
    id: &SubjectId,
    now: DateTime<Utc>,
  ) -> Result<(Subject, bool)> {
    let (subject, created) =
      self.store.resolve_subject(id, now).await.map_err(Into::into)?;
    if created {
      tracing::info!(subject = %id, "new subject created");
    }
    Ok((subject, created))
  }

  pub async fn update_display_name(
    &self,
    id: &SubjectId,
    name: &str,
    now: DateTime<Utc>,
  ) -> Result<Subject> {
    let name = name.trim();
    if name.is_empty() {
      return Err(Error::EmptyDisplayName);
    }
    self
      .store
      .update_display_name(id, name, now)
      .await
      .map_err(Into::into)
  }

  pub async fn set_cadence(
    &self,
    id: &SubjectId,
    days: i64,
    now: DateTime<Utc>,
  ) -> Result<Subject> {
    let cadence = validate_cadence(days)?;
    self
      .store
      .set_cadence(id, cadence, now)
      .await
      .map_err(Into::into)
  }

  /// Return the subject's share code, minting one on first use. Codes are
  /// globally unique; collisions are retried a bounded number of times.
  pub async fn generate_code(
    &self,
    id: &SubjectId,
    now: DateTime<Utc>,
  ) -> Result<String> {
    let subject = self
      .store
      .get_subject(id)
      .await
      .map_err(Into::into)?
      .ok_or_else(|| Error::SubjectNotFound(id.clone()))?;
    if let Some(code) = subject.code {
      return Ok(code);
    }

    let mut last_attempt = String::new();
    for _ in 0..CODE_ATTEMPTS {
      let code = random_code();
      match self.store.assign_code(id, &code, now).await.map_err(Into::into) {
        Ok(()) => {
          tracing::info!(subject = %id, code = %code, "share code assigned");
          return Ok(code);
        }
        Err(Error::CodeTaken(_)) => {
          last_attempt = code;
          continue;
        }
        Err(other) => return Err(other),
      }
    }
    Err(Error::CodeTaken(last_attempt))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn random_codes_use_the_alphabet() {
    for _ in 0..50 {
      let code = random_code();
      assert_eq!(code.len(), CODE_LEN);
      assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)), "{code}");
    }
  }
}
