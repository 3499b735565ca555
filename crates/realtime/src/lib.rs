use std::sync::Arc;

use async_trait::async_trait;
use shared::protocol::Envelope;
use thiserror::Error;

pub mod auth;
pub mod memory;

pub use auth::{AuthToken, StaticTokenProvider, TokenProvider};
pub use memory::MemoryRealtime;

/// Callback a channel invokes once per delivered message.
pub type MessageHandler = Box<dyn Fn(Envelope) + Send + Sync>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("channel {channel} is closed")]
    ChannelClosed { channel: String },
    #[error("authorization failed: {message}")]
    Unauthorized { message: String },
}

/// An already-authorized handle to the pub/sub transport.
///
/// Token negotiation happens where the connection is constructed (see
/// [`TokenProvider`]); consumers only ever see working channels and are
/// handed the connection explicitly instead of reaching for a global one.
pub trait Connection: Send + Sync {
    fn channel(&self, name: &str) -> Arc<dyn Channel>;
}

/// One named pub/sub channel.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Publishes and resolves once the transport has accepted the message.
    async fn publish(&self, envelope: Envelope) -> Result<(), TransportError>;

    /// Registers `handler` for messages published from now on.
    fn subscribe(&self, handler: MessageHandler) -> Subscription;

    /// The most recently retained message, if the channel has history.
    async fn history_last(&self) -> Result<Option<Envelope>, TransportError>;
}

/// Transport-side hook backing [`Subscription::unsubscribe`].
pub trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self);
}

/// Live subscription handle.
///
/// `unsubscribe` is idempotent, and once it returns the handler will not
/// run again: a delivery already in flight is waited out, not raced. It
/// must not be called from inside the handler itself.
pub struct Subscription {
    inner: Arc<dyn Unsubscribe>,
}

impl Subscription {
    pub fn new(inner: Arc<dyn Unsubscribe>) -> Self {
        Self { inner }
    }

    pub fn unsubscribe(&self) {
        self.inner.unsubscribe();
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
