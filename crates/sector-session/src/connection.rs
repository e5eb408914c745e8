//! The world's view of one client connection.
//!
//! A [`ConnectionHandle`] is what the session table stores and what the
//! world loop posts outbound packets to. The connection's own tasks hold
//! the matching [`Outbox`]: the writer drains `packets`, the reader
//! watches `closed` so a takeover can unblock it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sector_protocol::{PlayerId, ServerPacket};
use sector_transport::ConnectionId;
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Shared handle to a live connection.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    player: PlayerId,
    outbound: mpsc::UnboundedSender<ServerPacket>,
    active: AtomicBool,
    close: watch::Sender<bool>,
}

/// Receiving side of a [`ConnectionHandle`], owned by the connection tasks.
#[derive(Debug)]
pub struct Outbox {
    /// Packets queued by the world loop, in posting order.
    pub packets: mpsc::UnboundedReceiver<ServerPacket>,
    /// Flips to `true` when the connection is forced closed.
    pub closed: watch::Receiver<bool>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, player: PlayerId) -> (Arc<Self>, Outbox) {
        let (outbound, packets) = mpsc::unbounded_channel();
        let (close, closed) = watch::channel(false);
        let handle = Arc::new(Self {
            id,
            player,
            outbound,
            active: AtomicBool::new(true),
            close,
        });
        (handle, Outbox { packets, closed })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Queues a packet for delivery. Never blocks.
    ///
    /// Returns `false` if the connection is inactive; a failed queue
    /// marks it inactive.
    pub fn send(&self, packet: ServerPacket) -> bool {
        if !self.is_active() {
            return false;
        }
        if self.outbound.send(packet).is_err() {
            self.mark_inactive();
            return false;
        }
        true
    }

    /// Marks the connection dead without signalling its tasks.
    pub fn mark_inactive(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Marks the connection dead and tells its reader to stop.
    pub fn force_close(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            debug!(conn_id = %self.id, player = %self.player, "forcing connection closed");
        }
        self.close.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_reaches_outbox_in_order() {
        let (handle, mut outbox) = ConnectionHandle::new(ConnectionId::new(1), PlayerId(0));
        assert!(handle.send(ServerPacket::Pong));
        assert!(handle.send(ServerPacket::Game));
        assert_eq!(outbox.packets.try_recv().unwrap(), ServerPacket::Pong);
        assert_eq!(outbox.packets.try_recv().unwrap(), ServerPacket::Game);
    }

    #[test]
    fn test_force_close_signals_reader_and_stops_sends() {
        let (handle, outbox) = ConnectionHandle::new(ConnectionId::new(2), PlayerId(0));
        handle.force_close();
        assert!(!handle.is_active());
        assert!(*outbox.closed.borrow());
        assert!(!handle.send(ServerPacket::Pong));
    }

    #[test]
    fn test_dropped_outbox_marks_inactive() {
        let (handle, outbox) = ConnectionHandle::new(ConnectionId::new(3), PlayerId(0));
        drop(outbox);
        assert!(!handle.send(ServerPacket::Pong));
        assert!(!handle.is_active());
    }
}
