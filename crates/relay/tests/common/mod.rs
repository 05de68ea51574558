//! Shared test doubles for the backend and poll cycle tests.
#![allow(dead_code)]

use async_trait::async_trait;
use pushover_relay::backend::MessageComposer;
use pushover_relay::client::{PushGateway, Receipt};
use pushover_relay::error::PushError;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::{Duration, Instant};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub user: String,
    pub title: String,
    pub body: String,
}

/// Scriptable in-memory provider. Receipts are handed out as `R1`, `R2`, …
/// in send order; checks report acknowledged only for receipts marked via
/// [`mark_acked`](Self::mark_acked).
#[derive(Default)]
pub struct MockGateway {
    sent: Mutex<Vec<SentMessage>>,
    emergencies: Mutex<Vec<SentMessage>>,
    cancelled: Mutex<Vec<Receipt>>,
    acked: Mutex<HashSet<Receipt>>,
    failing_checks: Mutex<HashSet<Receipt>>,
    fail_cancel: AtomicBool,
    fail_emergency: AtomicBool,
    check_delay: Mutex<Duration>,
    check_starts: Mutex<Vec<Instant>>,
    next_receipt: AtomicUsize,
}

impl MockGateway {
    pub fn mark_acked(&self, receipt: Receipt) {
        self.acked.lock().unwrap().insert(receipt);
    }

    pub fn fail_checks_for(&self, receipt: Receipt) {
        self.failing_checks.lock().unwrap().insert(receipt);
    }

    pub fn set_fail_cancel(&self, fail: bool) {
        self.fail_cancel.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_emergency(&self, fail: bool) {
        self.fail_emergency.store(fail, Ordering::SeqCst);
    }

    pub fn set_check_delay(&self, delay: Duration) {
        *self.check_delay.lock().unwrap() = delay;
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn emergencies(&self) -> Vec<SentMessage> {
        self.emergencies.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<Receipt> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn check_starts(&self) -> Vec<Instant> {
        self.check_starts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushGateway for MockGateway {
    async fn send(&self, user: &str, title: &str, body: &str) -> Result<(), PushError> {
        self.sent.lock().unwrap().push(SentMessage {
            user: user.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }

    async fn send_emergency(
        &self,
        user: &str,
        title: &str,
        body: &str,
    ) -> Result<Receipt, PushError> {
        if self.fail_emergency.load(Ordering::SeqCst) {
            return Err(PushError::Rejected(vec![
                "application token is invalid".to_string(),
            ]));
        }
        self.emergencies.lock().unwrap().push(SentMessage {
            user: user.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        });
        let id = self.next_receipt.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Receipt::new(format!("R{id}")))
    }

    async fn cancel_emergency(&self, receipt: &Receipt) -> Result<(), PushError> {
        if self.fail_cancel.load(Ordering::SeqCst) {
            return Err(PushError::Rejected(vec![
                "receipt not found or expired".to_string(),
            ]));
        }
        self.cancelled.lock().unwrap().push(receipt.clone());
        Ok(())
    }

    async fn check_receipt(&self, receipt: &Receipt) -> Result<bool, PushError> {
        self.check_starts.lock().unwrap().push(Instant::now());
        let delay = *self.check_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing_checks.lock().unwrap().contains(receipt) {
            return Err(PushError::Network("connection reset by peer".to_string()));
        }
        Ok(self.acked.lock().unwrap().contains(receipt))
    }
}

pub struct TestComposer;

impl MessageComposer for TestComposer {
    fn error_body(&self, alert: &str, detail: &str) -> String {
        format!("{alert} failed: {detail}")
    }

    fn ack_body(&self, alert: &str, actor: &str) -> String {
        format!("{alert} acknowledged by {actor}")
    }

    fn recover_body(&self, alert: &str) -> String {
        format!("{alert} recovered")
    }
}
