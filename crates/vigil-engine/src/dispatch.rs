//! Fan-out of one alert to every squad member.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::transport::{AlertContext, AlertTransport};

/// Aggregate result of one notification batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
  pub sent:   usize,
  pub failed: usize,
}

impl DispatchOutcome {
  pub fn absorb(&mut self, other: DispatchOutcome) {
    self.sent += other.sent;
    self.failed += other.failed;
  }
}

/// Sends one message per recipient, each as its own task: a failure for one
/// recipient never blocks or fails the others. No automatic retries.
pub struct AlertDispatcher<T> {
  transport: Arc<T>,
}

impl<T> Clone for AlertDispatcher<T> {
  fn clone(&self) -> Self {
    Self { transport: Arc::clone(&self.transport) }
  }
}

impl<T: AlertTransport> AlertDispatcher<T> {
  pub fn new(transport: Arc<T>) -> Self { Self { transport } }

  pub async fn dispatch(
    &self,
    alert: AlertContext,
    recipients: Vec<String>,
  ) -> DispatchOutcome {
    let mut sends = JoinSet::new();
    for recipient in recipients {
      let transport = Arc::clone(&self.transport);
      let alert = alert.clone();
      sends.spawn(async move {
        match transport.send(&recipient, &alert).await {
          Ok(()) => true,
          Err(error) => {
            tracing::warn!(
              recipient = %recipient,
              subject = %alert.subject_id,
              %error,
              "alert delivery failed"
            );
            false
          }
        }
      });
    }

    let mut outcome = DispatchOutcome::default();
    while let Some(result) = sends.join_next().await {
      match result {
        Ok(true) => outcome.sent += 1,
        _ => outcome.failed += 1,
      }
    }
    outcome
  }
}
