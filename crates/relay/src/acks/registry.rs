//! Registry of outstanding emergency notifications awaiting acknowledgment.

use crate::Recipient;
use crate::client::Receipt;
use dashmap::DashMap;

/// Identity of a pending acknowledgment. At most one entry per key exists in
/// the registry at any time.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AckKey {
    alert: String,
    user_key: String,
}

impl AckKey {
    pub fn new(alert: &str, recipient: &Recipient) -> Self {
        Self {
            alert: alert.to_string(),
            user_key: recipient.user_key.clone(),
        }
    }

    pub fn alert(&self) -> &str {
        &self.alert
    }
}

/// One outstanding emergency notification.
#[derive(Clone, Debug)]
pub struct PendingAck {
    pub receipt: Receipt,
    pub recipient: Recipient,
    pub alert: String,
}

/// In-memory map of pending acknowledgments.
///
/// Poll batches never iterate the live map: they operate on a
/// [`snapshot`](AckRegistry::snapshot) and mutate the registry only through
/// keyed removal, so entries inserted mid-batch are picked up by the next
/// batch instead of the running one.
#[derive(Default)]
pub struct AckRegistry {
    entries: DashMap<AckKey, PendingAck>,
}

impl AckRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert a record, displacing any previous one under the same key.
    ///
    /// Returns the displaced record so the caller can cancel its receipt.
    pub fn insert(&self, key: AckKey, record: PendingAck) -> Option<PendingAck> {
        self.entries.insert(key, record)
    }

    pub fn get(&self, key: &AckKey) -> Option<PendingAck> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Remove by key; `None` if absent.
    ///
    /// Exactly one caller observes `Some` for a given entry, which makes the
    /// return value the token for exactly-once acknowledgment delivery.
    pub fn remove(&self, key: &AckKey) -> Option<PendingAck> {
        self.entries.remove(key).map(|(_, record)| record)
    }

    /// Remove the entry under `key` only while it still holds `receipt`, so a
    /// slow cancellation cannot delete a record that was re-raised meanwhile.
    pub fn remove_receipt(&self, key: &AckKey, receipt: &Receipt) -> Option<PendingAck> {
        self.entries
            .remove_if(key, |_, record| &record.receipt == receipt)
            .map(|(_, record)| record)
    }

    /// Materialized view of the registry at call time. No ordering guarantee.
    pub fn snapshot(&self) -> Vec<(AckKey, PendingAck)> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
