//! A library for relaying monitoring alerts through the Pushover API.
//!
//! An issuing system raises failing conditions through
//! [`backend::AlertBackend`]; each one is delivered as an emergency message
//! that the provider keeps re-delivering until the operator acknowledges it,
//! the issuer cancels it, or it expires. The provider never pushes the
//! acknowledgment back, so a background poll cycle reconciles the registry of
//! outstanding receipts against the provider's receipt endpoint and fans
//! observed acknowledgments out through per-alert broadcast topics.

pub mod acks;
pub mod backend;
pub mod client;
pub mod config;
pub mod error;

/// The identity a message is addressed to.
///
/// The relay treats the contents as opaque; `user_key` is whatever the
/// provider expects in its `user` field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    pub user_key: String,
}

impl Recipient {
    pub fn new(user_key: impl Into<String>) -> Self {
        Self {
            user_key: user_key.into(),
        }
    }
}
