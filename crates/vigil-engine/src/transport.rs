//! The outbound notification boundary.
//!
//! The engine decides *whether* and *to whom* to send; everything about the
//! message itself — formatting, markup, delivery — belongs to the transport.

use std::future::Future;

use chrono::TimeDelta;
use thiserror::Error;
use vigil_core::{
  policy::Severity,
  subject::SubjectId,
};

/// Everything a transport may want to say about one overdue episode.
#[derive(Debug, Clone)]
pub struct AlertContext {
  pub subject_id:   SubjectId,
  pub display_name: String,
  /// Streak before the lapse; a long streak makes a miss more unusual.
  pub streak:       u32,
  pub cadence_days: u8,
  /// Time past the grace window, not elapsed time since the check-in.
  pub overdue_by:   TimeDelta,
  pub severity:     Severity,
}

#[derive(Debug, Error)]
pub enum TransportError {
  #[error("transport request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("transport rejected message: status {status}")]
  Rejected { status: u16 },
}

/// One-message-at-a-time delivery. Implementations report success or failure
/// per recipient and never retry on their own.
pub trait AlertTransport: Send + Sync + 'static {
  fn send(
    &self,
    recipient: &str,
    alert: &AlertContext,
  ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

// ─── Log transport ───────────────────────────────────────────────────────────

/// Transport that only logs. Used when no delivery credentials are
/// configured, and as the quiet default in development.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

impl AlertTransport for LogTransport {
  async fn send(
    &self,
    recipient: &str,
    alert: &AlertContext,
  ) -> Result<(), TransportError> {
    tracing::info!(
      recipient,
      subject = %alert.subject_id,
      severity = ?alert.severity,
      overdue_for = %vigil_core::policy::format_duration(alert.overdue_by),
      "missed check-in alert (log transport, not delivered)"
    );
    Ok(())
  }
}
