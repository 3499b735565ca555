use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
};

use async_trait::async_trait;
use shared::protocol::Envelope;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    AuthToken, Channel, Connection, MessageHandler, Subscription, TokenProvider, TransportError,
    Unsubscribe,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process pub/sub broker.
///
/// Every channel dispatches on its own task in publish order and retains
/// its most recent message, which is what rewind-mode subscribers fetch
/// through [`Channel::history_last`]. Channels are shared by name across
/// every handle cloned from this connection.
pub struct MemoryRealtime {
    channels: Mutex<HashMap<String, Arc<MemoryChannel>>>,
}

impl std::fmt::Debug for MemoryRealtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRealtime").finish_non_exhaustive()
    }
}

impl MemoryRealtime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            channels: Mutex::new(HashMap::new()),
        })
    }

    /// Connects through the external auth step. The broker itself accepts
    /// any minted token; real transports validate it.
    pub async fn connect(provider: &dyn TokenProvider) -> Result<Arc<Self>, TransportError> {
        let AuthToken { token } = provider.request_token().await?;
        debug!(token_len = token.len(), "memory transport authorized");
        Ok(Self::new())
    }
}

impl Connection for MemoryRealtime {
    fn channel(&self, name: &str) -> Arc<dyn Channel> {
        let mut channels = lock(&self.channels);
        let channel = channels
            .entry(name.to_string())
            .or_insert_with(|| MemoryChannel::spawn(name.to_string()));
        Arc::clone(channel) as Arc<dyn Channel>
    }
}

struct MemoryChannel {
    name: String,
    state: Mutex<ChannelState>,
    queue: mpsc::UnboundedSender<Envelope>,
}

#[derive(Default)]
struct ChannelState {
    retained: Option<Envelope>,
    subscribers: Vec<Arc<SubscriberSlot>>,
}

struct SubscriberSlot {
    closed: AtomicBool,
    handler: Mutex<MessageHandler>,
}

impl MemoryChannel {
    fn spawn(name: String) -> Arc<Self> {
        let (queue, mut inbox) = mpsc::unbounded_channel::<Envelope>();
        let channel = Arc::new(Self {
            name,
            state: Mutex::new(ChannelState::default()),
            queue,
        });

        // The dispatch task holds only a weak handle, so dropping the last
        // channel reference also drops the queue and ends the task.
        let weak: Weak<MemoryChannel> = Arc::downgrade(&channel);
        tokio::spawn(async move {
            while let Some(envelope) = inbox.recv().await {
                let Some(channel) = weak.upgrade() else { break };
                channel.dispatch(&envelope);
            }
        });

        channel
    }

    fn dispatch(&self, envelope: &Envelope) {
        let subscribers = {
            let mut state = lock(&self.state);
            state
                .subscribers
                .retain(|slot| !slot.closed.load(Ordering::Acquire));
            state.subscribers.clone()
        };
        for slot in subscribers {
            slot.deliver(envelope);
        }
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, envelope: Envelope) -> Result<(), TransportError> {
        {
            let mut state = lock(&self.state);
            state.retained = Some(envelope.clone());
        }
        self.queue
            .send(envelope)
            .map_err(|_| TransportError::ChannelClosed {
                channel: self.name.clone(),
            })
    }

    fn subscribe(&self, handler: MessageHandler) -> Subscription {
        let slot = Arc::new(SubscriberSlot {
            closed: AtomicBool::new(false),
            handler: Mutex::new(handler),
        });
        lock(&self.state).subscribers.push(Arc::clone(&slot));
        Subscription::new(slot)
    }

    async fn history_last(&self) -> Result<Option<Envelope>, TransportError> {
        Ok(lock(&self.state).retained.clone())
    }
}

impl SubscriberSlot {
    fn deliver(&self, envelope: &Envelope) {
        // The handler lock is what lets unsubscribe wait out a delivery
        // already in flight instead of racing it.
        let handler = lock(&self.handler);
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        (*handler)(envelope.clone());
    }
}

impl Unsubscribe for SubscriberSlot {
    fn unsubscribe(&self) {
        self.closed.store(true, Ordering::Release);
        drop(lock(&self.handler));
    }
}
