//! Façade used by the issuing system.
//!
//! Composes the provider gateway, the pending-ack registry, the poll cycle,
//! and the acknowledgment event fan-out. Raising, acknowledging, and
//! recovering never return an error to the caller: provider failures are
//! logged and the registry is left in a state the next poll cycle can
//! reconcile.

use crate::Recipient;
use crate::acks::events::AckEvents;
use crate::acks::poll::{self, PollHandle};
use crate::acks::registry::{AckKey, AckRegistry, PendingAck};
use crate::client::{PushGateway, PushoverClient};
use crate::config::RelayConfig;
use crate::error::PushError;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Duration;

const TITLE_ERROR: &str = "ERROR";
const TITLE_ACKNOWLEDGED: &str = "ACKNOWLEDGED";
const TITLE_RECOVERED: &str = "RECOVERED";

/// Renders message bodies.
///
/// Implementations are pure functions of their arguments; the relay never
/// inspects the rendered text.
pub trait MessageComposer: Send + Sync {
    /// Body of the emergency message raised for `alert`.
    fn error_body(&self, alert: &str, detail: &str) -> String;
    /// Body of the normal message sent when `actor` acknowledges `alert`.
    fn ack_body(&self, alert: &str, actor: &str) -> String;
    /// Body of the normal message sent when `alert` recovers on its own.
    fn recover_body(&self, alert: &str) -> String;
}

/// Relay backend tracking one pending acknowledgment per (alert, recipient).
pub struct AlertBackend {
    gateway: Arc<dyn PushGateway>,
    registry: Arc<AckRegistry>,
    events: Arc<AckEvents>,
    composer: Box<dyn MessageComposer>,
    poll: PollHandle,
}

impl AlertBackend {
    /// Build the backend and start its poll cycle.
    pub fn start(
        gateway: Arc<dyn PushGateway>,
        composer: impl MessageComposer + 'static,
        poll_interval: Duration,
    ) -> Self {
        let registry = Arc::new(AckRegistry::new());
        let events = Arc::new(AckEvents::new());
        let poll = poll::spawn(
            gateway.clone(),
            registry.clone(),
            events.clone(),
            poll_interval,
        );
        Self {
            gateway,
            registry,
            events,
            composer: Box::new(composer),
            poll,
        }
    }

    /// Wire a backend to the real provider described by `config`.
    pub fn from_config(
        config: &RelayConfig,
        composer: impl MessageComposer + 'static,
    ) -> Result<Self, PushError> {
        let client = PushoverClient::new(config)?;
        Ok(Self::start(
            Arc::new(client),
            composer,
            config.poll_interval(),
        ))
    }

    /// Page the recipient about a failing condition.
    ///
    /// The provider keeps re-delivering the message until it is acknowledged,
    /// cancelled, or expires; the resulting receipt is tracked until then. A
    /// re-raise for an already-pending key supersedes the earlier page and
    /// cancels its receipt so the provider does not keep two emergencies
    /// alive for one condition.
    ///
    /// Send failures are logged and otherwise swallowed: the alert is simply
    /// not tracked, and the issuer is expected to raise again while the
    /// condition persists.
    #[tracing::instrument(skip(self, recipient, detail), fields(alert = %alert))]
    pub async fn raise_error(&self, recipient: &Recipient, alert: &str, detail: &str) {
        let body = self.composer.error_body(alert, detail);
        match self
            .gateway
            .send_emergency(&recipient.user_key, TITLE_ERROR, &body)
            .await
        {
            Ok(receipt) => {
                let key = AckKey::new(alert, recipient);
                let displaced = self.registry.insert(
                    key,
                    PendingAck {
                        receipt,
                        recipient: recipient.clone(),
                        alert: alert.to_string(),
                    },
                );
                if let Some(old) = displaced {
                    if let Err(e) = self.gateway.cancel_emergency(&old.receipt).await {
                        tracing::warn!(
                            alert = %alert,
                            receipt = %old.receipt,
                            error = %e,
                            message = "Failed to cancel superseded emergency message"
                        );
                    }
                }
            }
            Err(e) => {
                tracing::error!(
                    alert = %alert,
                    error = %e,
                    message = "Failed to send emergency message"
                );
            }
        }
    }

    /// Resolve a pending emergency because `actor` acknowledged it out of
    /// band.
    ///
    /// Cancels provider-side re-delivery if an entry is pending, and always
    /// sends a normal "acknowledged" message naming the actor, whether or not
    /// anything was pending. Does not emit on the ack event channel.
    #[tracing::instrument(skip(self, recipient), fields(alert = %alert, actor = %actor))]
    pub async fn acknowledge(&self, recipient: &Recipient, alert: &str, actor: &str) {
        self.cancel_pending(recipient, alert).await;

        let body = self.composer.ack_body(alert, actor);
        if let Err(e) = self
            .gateway
            .send(&recipient.user_key, TITLE_ACKNOWLEDGED, &body)
            .await
        {
            tracing::error!(
                alert = %alert,
                error = %e,
                message = "Failed to send acknowledged message"
            );
        }
    }

    /// Resolve a pending emergency because the underlying condition
    /// recovered before anyone acknowledged it.
    ///
    /// Same cancellation behaviour as [`acknowledge`](Self::acknowledge); the
    /// normal message sent is a "recovered" notice with no actor.
    #[tracing::instrument(skip(self, recipient), fields(alert = %alert))]
    pub async fn recover(&self, recipient: &Recipient, alert: &str) {
        self.cancel_pending(recipient, alert).await;

        let body = self.composer.recover_body(alert);
        if let Err(e) = self
            .gateway
            .send(&recipient.user_key, TITLE_RECOVERED, &body)
            .await
        {
            tracing::error!(
                alert = %alert,
                error = %e,
                message = "Failed to send recovered message"
            );
        }
    }

    /// Stream of recipients whose acknowledgment of `alert` was discovered by
    /// the poll cycle. Explicit [`acknowledge`](Self::acknowledge) and
    /// [`recover`](Self::recover) calls do not emit here.
    pub fn subscribe(&self, alert: &str) -> broadcast::Receiver<Recipient> {
        self.events.subscribe(alert)
    }

    /// Number of emergencies still awaiting acknowledgment.
    pub fn pending_count(&self) -> usize {
        self.registry.len()
    }

    /// Stop the poll cycle. Pending entries stay in the registry but are no
    /// longer reconciled; dropping the backend has the same effect.
    pub fn shutdown(&self) {
        self.poll.stop();
    }

    /// Cancel provider-side re-delivery for a pending entry, if any.
    ///
    /// The entry is removed only once the provider confirmed the
    /// cancellation, and only while it still holds the same receipt, so a
    /// failed or raced cancel leaves cleanup to the poll cycle.
    async fn cancel_pending(&self, recipient: &Recipient, alert: &str) {
        let key = AckKey::new(alert, recipient);
        let Some(pending) = self.registry.get(&key) else {
            return;
        };
        match self.gateway.cancel_emergency(&pending.receipt).await {
            Ok(()) => {
                self.registry.remove_receipt(&key, &pending.receipt);
            }
            Err(e) => {
                tracing::warn!(
                    alert = %alert,
                    receipt = %pending.receipt,
                    error = %e,
                    message = "Failed to cancel emergency message, leaving entry to the poll cycle"
                );
            }
        }
    }
}
