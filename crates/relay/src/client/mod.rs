//! Provider API client.
//!
//! A thin wrapper over the kept-alive [`transport`] speaking the provider's
//! dialect: form-encoded requests, JSON responses with a `status` field that
//! is `1` on success and an `errors` list otherwise. Emergency messages come
//! back with a receipt that can later be polled or cancelled.

mod transport;

use crate::config::RelayConfig;
use crate::error::PushError;
use async_trait::async_trait;
use hyper::Method;
use serde::Deserialize;
use self::transport::Transport;
use std::fmt;
use url::Url;
use url::form_urlencoded;

/// Receipt handed back by the provider when an emergency message is accepted.
///
/// An opaque bearer token; required to poll acknowledgment status or cancel
/// further re-delivery.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Receipt(String);

impl Receipt {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The provider operations the acknowledgment tracker consumes.
///
/// Every call is a single network exchange; there is no retry below this
/// interface.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Send a normal-priority message.
    async fn send(&self, user: &str, title: &str, body: &str) -> Result<(), PushError>;

    /// Send an emergency message the provider re-delivers until acknowledged
    /// or expired.
    async fn send_emergency(
        &self,
        user: &str,
        title: &str,
        body: &str,
    ) -> Result<Receipt, PushError>;

    /// Stop re-delivery of a previously sent emergency message.
    async fn cancel_emergency(&self, receipt: &Receipt) -> Result<(), PushError>;

    /// Ask the provider whether the operator has acknowledged the message.
    async fn check_receipt(&self, receipt: &Receipt) -> Result<bool, PushError>;
}

/// Response envelope shared by all provider endpoints.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: i32,
    #[serde(default)]
    receipt: Option<String>,
    #[serde(default)]
    acknowledged: Option<i32>,
    #[serde(default)]
    errors: Vec<String>,
}

const PRIORITY_NORMAL: i32 = 0;
const PRIORITY_EMERGENCY: i32 = 2;

/// Client for the Pushover REST API.
pub struct PushoverClient {
    transport: Transport,
    token: String,
    emergency_retry_secs: u32,
    emergency_expire_secs: u32,
}

impl PushoverClient {
    pub fn new(config: &RelayConfig) -> Result<Self, PushError> {
        let api_url =
            Url::parse(&config.api_url).map_err(|e| PushError::InvalidEndpoint(e.to_string()))?;
        Ok(Self {
            transport: Transport::new(&api_url, config.request_timeout())?,
            token: config.token.clone(),
            emergency_retry_secs: config.emergency_retry_secs,
            emergency_expire_secs: config.emergency_expire_secs,
        })
    }

    fn message_form(&self, user: &str, title: &str, body: &str, priority: i32) -> String {
        let mut form = form_urlencoded::Serializer::new(String::new());
        form.append_pair("token", &self.token)
            .append_pair("user", user)
            .append_pair("title", title)
            .append_pair("message", body)
            .append_pair("priority", &priority.to_string());
        if priority == PRIORITY_EMERGENCY {
            form.append_pair("retry", &self.emergency_retry_secs.to_string())
                .append_pair("expire", &self.emergency_expire_secs.to_string());
        }
        form.finish()
    }

    fn token_form(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("token", &self.token)
            .finish()
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        form_body: Option<String>,
    ) -> Result<ApiResponse, PushError> {
        let (status, body) = self.transport.round_trip(method, path, form_body).await?;
        let response: ApiResponse = serde_json::from_slice(&body).map_err(|e| {
            if status.is_success() {
                PushError::Json(e.to_string())
            } else {
                PushError::Network(format!("HTTP {status} with unparseable body"))
            }
        })?;
        if response.status == 1 {
            Ok(response)
        } else {
            Err(PushError::Rejected(response.errors))
        }
    }
}

#[async_trait]
impl PushGateway for PushoverClient {
    #[tracing::instrument(level = "debug", skip(self, body), fields(title = %title))]
    async fn send(&self, user: &str, title: &str, body: &str) -> Result<(), PushError> {
        let form = self.message_form(user, title, body, PRIORITY_NORMAL);
        self.call(Method::POST, "messages.json", Some(form)).await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, body), fields(title = %title))]
    async fn send_emergency(
        &self,
        user: &str,
        title: &str,
        body: &str,
    ) -> Result<Receipt, PushError> {
        let form = self.message_form(user, title, body, PRIORITY_EMERGENCY);
        let response = self.call(Method::POST, "messages.json", Some(form)).await?;
        response
            .receipt
            .map(Receipt::new)
            .ok_or_else(|| PushError::Json("receipt missing from response".to_string()))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn cancel_emergency(&self, receipt: &Receipt) -> Result<(), PushError> {
        let path = format!("receipts/{receipt}/cancel.json");
        self.call(Method::POST, &path, Some(self.token_form()))
            .await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn check_receipt(&self, receipt: &Receipt) -> Result<bool, PushError> {
        let path = format!("receipts/{receipt}.json?{}", self.token_form());
        let response = self.call(Method::GET, &path, None).await?;
        Ok(response.acknowledged == Some(1))
    }
}
