// kart_server/src/services/reaper.rs

//! Background sweep that expires unpaid online orders past their reservation
//! deadline and returns stock still held by cancelled orders.

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::Result;
use crate::services::orders;
use crate::state::AppState;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
  pub expired: usize,
  pub released: usize,
  pub failed: usize,
}

/// One pass over expired pending orders, then over stranded reservations.
#[instrument(name = "reaper::sweep", skip(state))]
pub async fn sweep(state: &AppState) -> Result<SweepReport> {
  let mut report = SweepReport::default();
  let now = state.clock.now();
  let batch = state.config.reaper_batch_size;

  for order in state.stores.orders.expired_pending(now, batch).await? {
    match orders::expire(state, order.id).await {
      Ok(true) => report.expired += 1,
      Ok(false) => debug!(order_id = %order.id, "Order moved before it could be expired."),
      Err(e) => {
        report.failed += 1;
        warn!(order_id = %order.id, error = %e, "Failed to expire order.");
      }
    }
  }

  // Orders cancelled while a release was failing still hold stock.
  for order in state.stores.orders.stranded_reservations(batch).await? {
    match orders::release_reservation(state, &order).await {
      Ok(true) => report.released += 1,
      Ok(false) => {}
      Err(e) => {
        report.failed += 1;
        warn!(order_id = %order.id, error = %e, "Failed to release stranded reservation.");
      }
    }
  }

  if report != SweepReport::default() {
    info!(
      expired = report.expired,
      released = report.released,
      failed = report.failed,
      "Reservation sweep finished."
    );
  }
  Ok(report)
}

/// Handle to the running reaper task.
pub struct ReaperHandle {
  shutdown: Option<oneshot::Sender<()>>,
  task: JoinHandle<()>,
}

impl ReaperHandle {
  /// Signals the task and waits for the current sweep to finish.
  pub async fn stop(mut self) {
    if let Some(tx) = self.shutdown.take() {
      let _ = tx.send(());
    }
    if let Err(e) = self.task.await {
      error!(error = %e, "Reaper task ended abnormally.");
    }
  }
}

pub fn spawn(state: AppState) -> ReaperHandle {
  let (tx, mut rx) = oneshot::channel::<()>();
  let period = state.config.reaper_interval;

  let task = tokio::spawn(async move {
    info!(interval_secs = period.as_secs(), "Reservation reaper started.");
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
      tokio::select! {
        _ = &mut rx => break,
        _ = ticker.tick() => {
          if let Err(e) = sweep(&state).await {
            error!(error = %e, "Reservation sweep failed.");
          }
        }
      }
    }
    info!("Reservation reaper stopped.");
  });

  ReaperHandle {
    shutdown: Some(tx),
    task,
  }
}
