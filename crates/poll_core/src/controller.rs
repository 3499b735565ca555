use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use realtime::{Channel, Connection, Subscription, TransportError};
use shared::{
    domain::{Question, SmsEvent, Tally},
    protocol::{self, Envelope, SmsPayload},
};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{channel::CatchUpChannel, sms, tally};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Channel pair one poll runs on.
#[derive(Debug, Clone)]
pub struct ChannelNames {
    pub votes: String,
    pub status: String,
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self {
            votes: protocol::VOTE_CHANNEL.to_string(),
            status: protocol::STATUS_CHANNEL.to_string(),
        }
    }
}

/// Updates emitted to renderers over a broadcast channel.
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// A vote matched an option and was folded into the tally.
    VoteAccepted { event: SmsEvent, tally: Tally },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Syncing,
    Live,
}

/// Aggregates one poll for one mounted view.
///
/// On mount the controller rewinds the status channel to the latest
/// retained snapshot (a single attempt; no snapshot means starting from
/// zero), then goes live on the vote channel. Every accepted vote updates
/// the held tally and republishes a snapshot so the next late joiner can
/// resume without replaying history.
///
/// Two clients that process votes near-simultaneously can each publish a
/// snapshot missing the other's vote, and the status channel keeps
/// whichever lands last. That lost-update window is the price of running
/// without a coordinator, and it surfaces only as a transient undercount
/// for late joiners until the next vote republishes a fresher snapshot.
///
/// Call [`PollController::unmount`] when done; it releases the channel
/// subscriptions and the worker task that otherwise keep the controller
/// alive.
pub struct PollController {
    question: Question,
    status_channel: Arc<dyn Channel>,
    state: Mutex<ControllerState>,
    events: broadcast::Sender<PollEvent>,
}

struct ControllerState {
    phase: Phase,
    tally: Tally,
    detached: bool,
    subscriptions: Vec<Subscription>,
    worker: Option<JoinHandle<()>>,
}

impl PollController {
    pub async fn mount(
        connection: &dyn Connection,
        question: Question,
        names: ChannelNames,
    ) -> Result<Arc<Self>, TransportError> {
        let status_channel = connection.channel(&names.status);
        let vote_channel = connection.channel(&names.votes);
        let (events, _) = broadcast::channel(64);

        let controller = Arc::new(Self {
            state: Mutex::new(ControllerState {
                phase: Phase::Syncing,
                tally: Tally::zero_for(&question),
                detached: false,
                subscriptions: Vec::new(),
                worker: None,
            }),
            question,
            status_channel: Arc::clone(&status_channel),
            events,
        });

        let status_sub = {
            let on_rewind = {
                let controller = Arc::clone(&controller);
                move |envelope: Envelope| controller.adopt_snapshot(&envelope)
            };
            let on_live = {
                let controller = Arc::clone(&controller);
                move |envelope: Envelope| controller.on_status_message(&envelope)
            };
            CatchUpChannel::new(status_channel)
                .open_with_rewind(on_rewind, on_live)
                .await?
        };

        // Live votes flow through an ordered queue into a single worker
        // task: the tally has one writer and events apply in arrival
        // order.
        let (vote_tx, mut vote_rx) = mpsc::unbounded_channel::<Envelope>();
        let vote_sub = CatchUpChannel::new(vote_channel).open_live(move |envelope| {
            let _ = vote_tx.send(envelope);
        });
        let worker = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move {
                while let Some(envelope) = vote_rx.recv().await {
                    controller.handle_vote(envelope).await;
                }
            }
        });

        let starting = {
            let mut state = lock(&controller.state);
            state.subscriptions.push(status_sub);
            state.subscriptions.push(vote_sub);
            state.worker = Some(worker);
            state.phase = Phase::Live;
            state.tally.clone()
        };
        info!(total = starting.total(), "poll synced and live");

        Ok(controller)
    }

    fn adopt_snapshot(&self, envelope: &Envelope) {
        let Some(snapshot) = protocol::decode_vote_summary(envelope) else {
            warn!(name = %envelope.name, "ignoring unreadable status history message");
            return;
        };
        let adopted = snapshot.reconciled_to(&self.question);
        let mut state = lock(&self.state);
        if state.detached {
            return;
        }
        debug!(total = adopted.total(), "resuming from retained snapshot");
        state.tally = adopted;
    }

    fn on_status_message(&self, _envelope: &Envelope) {
        // Snapshots other clients republish while we are live. Adopting
        // them here would overwrite votes this client already counted, so
        // they are only consumed through the rewind at mount time.
    }

    async fn handle_vote(&self, envelope: Envelope) {
        let payload: SmsPayload = match envelope.decode() {
            Ok(payload) => payload,
            Err(error) => {
                debug!(%error, "ignoring undecodable vote message");
                return;
            }
        };
        let event = sms::parse_sms(&payload);

        let updated = {
            let mut state = lock(&self.state);
            if state.detached {
                return;
            }
            let next = tally::apply(&state.tally, &event);
            if next == state.tally {
                debug!(text = %event.raw_text, "vote matched no option; tally unchanged");
                return;
            }
            state.tally = next.clone();
            let _ = self.events.send(PollEvent::VoteAccepted {
                event: event.clone(),
                tally: next.clone(),
            });
            next
        };

        debug!(
            from = %sms::format_sender(&event.sender),
            key = %event.normalized,
            total = updated.total(),
            "vote accepted"
        );

        // Republish for future late joiners. The local update above stands
        // even when this fails; the next accepted vote carries it forward.
        match protocol::vote_summary(&updated) {
            Ok(snapshot) => {
                if let Err(error) = self.status_channel.publish(snapshot).await {
                    warn!(%error, "failed to republish tally snapshot");
                }
            }
            Err(error) => warn!(%error, "failed to encode tally snapshot"),
        }
    }

    /// Current tally. A frozen copy: further votes never mutate a value
    /// already handed out.
    pub fn tally(&self) -> Tally {
        lock(&self.state).tally.clone()
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    pub fn is_live(&self) -> bool {
        lock(&self.state).phase == Phase::Live
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PollEvent> {
        self.events.subscribe()
    }

    /// Tears the view down: unsubscribes both channels and stops the vote
    /// worker. Idempotent. Once this returns no tally update or event
    /// emission can happen; a snapshot publish already in flight may still
    /// land on the transport, but its outcome is discarded.
    pub fn unmount(&self) {
        let (subscriptions, worker) = {
            let mut state = lock(&self.state);
            if state.detached {
                return;
            }
            state.detached = true;
            (
                std::mem::take(&mut state.subscriptions),
                state.worker.take(),
            )
        };
        for subscription in &subscriptions {
            subscription.unsubscribe();
        }
        if let Some(worker) = worker {
            worker.abort();
        }
        info!("poll view unmounted");
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
