//! Periodic reconciliation of the pending-ack registry against provider
//! receipt status.
//!
//! One batch is in flight at a time: the next tick is scheduled only after
//! every check of the current snapshot has settled, however long individual
//! calls take.

use crate::acks::events::AckEvents;
use crate::acks::registry::AckRegistry;
use crate::client::PushGateway;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// Handle to the background poll task.
///
/// Stopping is cooperative: the flag is checked before every batch, so a
/// stopped task finishes its current sleep or batch before exiting.
pub struct PollHandle {
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Spawn the poll cycle over `registry`, reporting acknowledgments to
/// `events`, with `interval` between batch completions.
pub(crate) fn spawn(
    gateway: Arc<dyn PushGateway>,
    registry: Arc<AckRegistry>,
    events: Arc<AckEvents>,
    interval: Duration,
) -> PollHandle {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    let task = tokio::spawn(async move {
        while flag.load(Ordering::SeqCst) {
            run_batch(gateway.as_ref(), &registry, &events).await;
            tokio::time::sleep(interval).await;
        }
        tracing::debug!(message = "Poll cycle stopped");
    });
    PollHandle { running, task }
}

/// One reconciliation pass: check every entry of a registry snapshot and
/// remove + report the ones the provider says are acknowledged.
///
/// A failed check leaves its entry untouched and does not disturb the other
/// checks; the next batch retries it. Entries whose check returns `false`
/// stay pending.
pub async fn run_batch(gateway: &dyn PushGateway, registry: &AckRegistry, events: &AckEvents) {
    let snapshot = registry.snapshot();
    if snapshot.is_empty() {
        return;
    }
    tracing::debug!(pending = snapshot.len(), message = "Checking receipts");

    let mut checks: FuturesUnordered<_> = snapshot
        .into_iter()
        .map(|(key, record)| async move {
            let outcome = gateway.check_receipt(&record.receipt).await;
            (key, record, outcome)
        })
        .collect();

    while let Some((key, record, outcome)) = checks.next().await {
        match outcome {
            Ok(true) => {
                // Whoever removes the entry reports it; an explicit
                // acknowledge/recover call may have won the race.
                if let Some(removed) = registry.remove(&key) {
                    tracing::info!(
                        alert = %removed.alert,
                        receipt = %removed.receipt,
                        message = "Operator acknowledged emergency message"
                    );
                    events.emit(&removed.alert, removed.recipient);
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    alert = %record.alert,
                    receipt = %record.receipt,
                    error = %e,
                    message = "Receipt check failed, retrying next cycle"
                );
            }
        }
    }
}
