//! Recurring sweep scheduling.
//!
//! One task, one sweep at a time: each sweep is awaited before the next tick
//! is taken, so sweeps never overlap. A sweep in flight at shutdown is
//! cancelled at its next await point, accepting that some notifications go
//! unsent.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{
  sync::watch,
  time::{self, MissedTickBehavior},
};
use vigil_core::store::SubjectStore;

use crate::{sweep::MissedCheckInSweep, transport::AlertTransport};

#[derive(Debug, Clone, Copy)]
pub struct SweepSchedule {
  /// Fixed period between sweeps.
  pub period:        Duration,
  /// Delay before the one startup sweep.
  pub startup_delay: Duration,
}

impl Default for SweepSchedule {
  fn default() -> Self {
    Self {
      period:        Duration::from_secs(60 * 60),
      startup_delay: Duration::from_secs(5),
    }
  }
}

/// Drive the sweep until `shutdown` fires: once shortly after startup, then
/// at the fixed period.
pub async fn run<S, T>(
  sweep: Arc<MissedCheckInSweep<S, T>>,
  schedule: SweepSchedule,
  mut shutdown: watch::Receiver<bool>,
) where
  S: SubjectStore,
  T: AlertTransport,
{
  tokio::select! {
    () = time::sleep(schedule.startup_delay) => {}
    _ = shutdown.changed() => return,
  }
  tracing::info!("running startup sweep");
  if !run_guarded(&sweep, &mut shutdown).await {
    return;
  }

  let mut ticker =
    time::interval_at(time::Instant::now() + schedule.period, schedule.period);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  loop {
    tokio::select! {
      _ = ticker.tick() => {
        if !run_guarded(&sweep, &mut shutdown).await {
          return;
        }
      }
      _ = shutdown.changed() => {
        tracing::info!("sweep scheduler stopping");
        return;
      }
    }
  }
}

/// Run one sweep, racing it against shutdown. Returns false when shutdown
/// won and the scheduler should stop.
async fn run_guarded<S, T>(
  sweep: &MissedCheckInSweep<S, T>,
  shutdown: &mut watch::Receiver<bool>,
) -> bool
where
  S: SubjectStore,
  T: AlertTransport,
{
  tokio::select! {
    result = sweep.run_once(Utc::now()) => {
      if let Err(error) = result {
        tracing::error!(%error, "sweep failed; will retry on next tick");
      }
      true
    }
    _ = shutdown.changed() => {
      tracing::info!("sweep cancelled by shutdown; some notifications may be unsent");
      false
    }
  }
}
