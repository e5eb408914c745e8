//! Scheduler inputs and the cross-task posting handle.

use std::fmt;
use std::sync::Arc;

use sector_protocol::{Inbound, PlayerId};
use tokio::sync::{mpsc, watch};
use tracing::trace;

/// A named internal event (login, logout, info request, ...).
pub trait SpecialEvent: Send + fmt::Debug + 'static {
    /// Dispatch key into the special-handler table.
    fn name(&self) -> &'static str;
}

/// An immediate scheduler input.
#[derive(Debug)]
pub enum Event<S> {
    /// A decoded packet from a player's connection.
    Packet { player: PlayerId, inbound: Inbound },
    /// An internal event.
    Special(S),
}

/// Creates the immediate queue: a cloneable posting handle and the
/// receiving end the scheduler consumes.
pub fn channel<S>() -> (SchedulerHandle<S>, EventReceiver<S>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    (
        SchedulerHandle {
            tx,
            shutdown: Arc::new(shutdown_tx),
        },
        EventReceiver {
            rx,
            shutdown: shutdown_rx,
        },
    )
}

/// Posts events into the scheduler from any task.
///
/// Posting never blocks. Once shutdown is requested, posts are discarded.
pub struct SchedulerHandle<S> {
    tx: mpsc::UnboundedSender<Event<S>>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl<S> Clone for SchedulerHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

impl<S> fmt::Debug for SchedulerHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

impl<S: fmt::Debug> SchedulerHandle<S> {
    /// Queues an event. Returns `false` if it was discarded.
    pub fn post(&self, event: Event<S>) -> bool {
        if self.is_shutting_down() {
            trace!(?event, "discarding event posted after shutdown");
            return false;
        }
        self.tx.send(event).is_ok()
    }

    /// Queues a packet from `player`.
    pub fn post_packet(&self, player: PlayerId, inbound: Inbound) -> bool {
        self.post(Event::Packet { player, inbound })
    }

    /// Queues a special event.
    pub fn post_special(&self, special: S) -> bool {
        self.post(Event::Special(special))
    }
}

impl<S> SchedulerHandle<S> {
    /// Sets the shutdown flag. The scheduler drains what is queued and exits.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Receiving end of the immediate queue plus the shutdown flag.
pub struct EventReceiver<S> {
    pub(crate) rx: mpsc::UnboundedReceiver<Event<S>>,
    pub(crate) shutdown: watch::Receiver<bool>,
}
