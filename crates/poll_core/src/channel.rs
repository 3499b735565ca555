use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use realtime::{Channel, Subscription, TransportError};
use shared::protocol::Envelope;
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Gate {
    /// Rewind attempt still pending; live traffic parks here.
    Buffering(Vec<Envelope>),
    Direct,
}

/// Wraps a pub/sub channel with the two open modes a poll client needs:
/// plain live delivery, or a rewind that replays the single most recent
/// retained message before going live.
pub struct CatchUpChannel {
    channel: Arc<dyn Channel>,
}

impl CatchUpChannel {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }

    /// Live mode: `on_message` sees messages published from now on.
    pub fn open_live(&self, on_message: impl Fn(Envelope) + Send + Sync + 'static) -> Subscription {
        self.channel.subscribe(Box::new(on_message))
    }

    /// Rewind mode: fetches the channel's latest retained message, hands
    /// it to `on_rewind` exactly once, then delivers live traffic to
    /// `on_message`. Live messages that race the history fetch are
    /// buffered and drained in arrival order after the rewind resolves,
    /// so `on_rewind` always runs before the first live delivery. A
    /// channel with no history skips `on_rewind` entirely; the attempt is
    /// made once, with no retry.
    pub async fn open_with_rewind(
        &self,
        on_rewind: impl FnOnce(Envelope) + Send,
        on_message: impl Fn(Envelope) + Send + Sync + 'static,
    ) -> Result<Subscription, TransportError> {
        let gate = Arc::new(Mutex::new(Gate::Buffering(Vec::new())));
        let on_message = Arc::new(on_message);

        let subscription = {
            let gate = Arc::clone(&gate);
            let on_message = Arc::clone(&on_message);
            self.channel.subscribe(Box::new(move |envelope| {
                // The gate stays locked while a message is handed on, so
                // drained backlog and direct deliveries cannot interleave
                // out of arrival order.
                let mut gate = lock(&gate);
                match &mut *gate {
                    Gate::Buffering(pending) => pending.push(envelope),
                    Gate::Direct => (*on_message)(envelope),
                }
            }))
        };

        let history = match self.channel.history_last().await {
            Ok(history) => history,
            Err(error) => {
                subscription.unsubscribe();
                return Err(error);
            }
        };

        let mut gate = lock(&gate);
        if let Some(envelope) = history {
            debug!(channel = self.channel.name(), "rewound to retained message");
            on_rewind(envelope);
        }
        if let Gate::Buffering(pending) = std::mem::replace(&mut *gate, Gate::Direct) {
            for envelope in pending {
                (*on_message)(envelope);
            }
        }
        drop(gate);

        Ok(subscription)
    }
}

#[cfg(test)]
#[path = "tests/channel_tests.rs"]
mod tests;
