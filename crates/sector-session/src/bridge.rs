//! The session table: which connection currently owns each player.
//!
//! # Takeover
//!
//! A player slot has at most one owner. [`SessionBridge::acquire`] always
//! wins: any previous owner is force-closed first. [`SessionBridge::release`]
//! only clears the slot when the caller is still the owner, so a superseded
//! connection winding down cannot evict its successor.
//!
//! # World notification
//!
//! The bridge does not touch world state. It reports every ownership change
//! to a [`SessionListener`] while still holding the table lock, so the
//! listener sees changes in the same order the table applied them. The
//! server's listener turns them into world-loop events, which re-index the
//! player's mob and broadcast visibility.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sector_protocol::{PlayerId, ServerPacket};
use tracing::{debug, info};

use crate::ConnectionHandle;

/// An ownership change reported by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    /// A connection became the owner of the player.
    Acquired(PlayerId),
    /// The current owner released the player; nobody owns it now.
    Released(PlayerId),
}

impl SessionChange {
    pub fn player(self) -> PlayerId {
        match self {
            Self::Acquired(p) | Self::Released(p) => p,
        }
    }
}

/// Receives ownership changes. Called with the table lock held, so
/// implementations must not call back into the bridge.
pub trait SessionListener: Send + Sync + 'static {
    fn on_change(&self, change: SessionChange);
}

impl<F> SessionListener for F
where
    F: Fn(SessionChange) + Send + Sync + 'static,
{
    fn on_change(&self, change: SessionChange) {
        self(change)
    }
}

/// Thread-safe table of session owners.
pub struct SessionBridge {
    owners: Mutex<HashMap<PlayerId, Arc<ConnectionHandle>>>,
    listener: Box<dyn SessionListener>,
}

impl std::fmt::Debug for SessionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBridge")
            .field("sessions", &self.len())
            .finish()
    }
}

impl Default for SessionBridge {
    fn default() -> Self {
        Self::new(|_: SessionChange| {})
    }
}

impl SessionBridge {
    pub fn new(listener: impl SessionListener) -> Self {
        Self {
            owners: Mutex::new(HashMap::new()),
            listener: Box::new(listener),
        }
    }

    // A panic while holding the lock leaves the map itself consistent.
    fn table(&self) -> MutexGuard<'_, HashMap<PlayerId, Arc<ConnectionHandle>>> {
        self.owners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs `conn` as the owner of its player, force-closing any
    /// previous owner. Returns the superseded handle, if any.
    pub fn acquire(&self, conn: Arc<ConnectionHandle>) -> Option<Arc<ConnectionHandle>> {
        let player = conn.player();
        let conn_id = conn.id();
        let mut table = self.table();
        let previous = table.insert(player, conn);
        if let Some(old) = &previous {
            info!(%player, old = %old.id(), new = %conn_id, "session taken over");
            old.force_close();
        } else {
            info!(%player, %conn_id, "session acquired");
        }
        self.listener.on_change(SessionChange::Acquired(player));
        previous
    }

    /// Removes `conn` as owner of its player if it still is the owner.
    ///
    /// Returns `false` (and changes nothing) when a later connection has
    /// already taken over.
    pub fn release(&self, conn: &ConnectionHandle) -> bool {
        let player = conn.player();
        let mut table = self.table();
        match table.get(&player) {
            Some(current) if current.id() == conn.id() => {
                table.remove(&player);
                conn.mark_inactive();
                info!(%player, conn_id = %conn.id(), "session released");
                self.listener.on_change(SessionChange::Released(player));
                true
            }
            _ => {
                debug!(%player, conn_id = %conn.id(), "stale release ignored");
                false
            }
        }
    }

    /// Current owner of `player`.
    pub fn owner(&self, player: PlayerId) -> Option<Arc<ConnectionHandle>> {
        self.table().get(&player).cloned()
    }

    /// Whether `player` has a live owner.
    pub fn is_connected(&self, player: PlayerId) -> bool {
        self.table().get(&player).is_some_and(|c| c.is_active())
    }

    /// Queues `packet` for `player`'s current connection.
    ///
    /// Best effort: returns `false` when nobody owns the player or the
    /// owner has gone inactive.
    pub fn post_packet(&self, player: PlayerId, packet: ServerPacket) -> bool {
        let Some(conn) = self.owner(player) else {
            return false;
        };
        conn.send(packet)
    }

    /// Players with a live owner, in ascending order.
    pub fn active_players(&self) -> Vec<PlayerId> {
        let mut players: Vec<_> = self
            .table()
            .iter()
            .filter(|(_, c)| c.is_active())
            .map(|(p, _)| *p)
            .collect();
        players.sort_unstable();
        players
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Force-closes every owned connection. Used at shutdown; the
    /// connections release themselves as their tasks exit.
    pub fn close_all(&self) {
        for conn in self.table().values() {
            conn.force_close();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use sector_transport::ConnectionId;

    use super::*;

    fn recording() -> (SessionBridge, Arc<StdMutex<Vec<SessionChange>>>) {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let bridge = SessionBridge::new(move |c: SessionChange| sink.lock().unwrap().push(c));
        (bridge, log)
    }

    #[test]
    fn test_acquire_then_release() {
        let (bridge, log) = recording();
        let (conn, _outbox) = ConnectionHandle::new(ConnectionId::new(1), PlayerId(4));
        assert!(bridge.acquire(Arc::clone(&conn)).is_none());
        assert!(bridge.is_connected(PlayerId(4)));
        assert_eq!(bridge.active_players(), vec![PlayerId(4)]);

        assert!(bridge.release(&conn));
        assert!(!bridge.is_connected(PlayerId(4)));
        assert!(bridge.is_empty());
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                SessionChange::Acquired(PlayerId(4)),
                SessionChange::Released(PlayerId(4))
            ]
        );
    }

    #[test]
    fn test_takeover_closes_previous_owner() {
        let (bridge, _) = recording();
        let (a, a_box) = ConnectionHandle::new(ConnectionId::new(1), PlayerId(7));
        let (b, _b_box) = ConnectionHandle::new(ConnectionId::new(2), PlayerId(7));

        bridge.acquire(Arc::clone(&a));
        let old = bridge.acquire(Arc::clone(&b)).unwrap();
        assert_eq!(old.id(), a.id());
        assert!(!a.is_active());
        assert!(*a_box.closed.borrow());
        assert_eq!(bridge.owner(PlayerId(7)).unwrap().id(), b.id());
    }

    #[test]
    fn test_stale_release_is_noop() {
        let (bridge, log) = recording();
        let (a, _a_box) = ConnectionHandle::new(ConnectionId::new(1), PlayerId(7));
        let (b, _b_box) = ConnectionHandle::new(ConnectionId::new(2), PlayerId(7));
        bridge.acquire(Arc::clone(&a));
        bridge.acquire(Arc::clone(&b));

        assert!(!bridge.release(&a));
        assert_eq!(bridge.owner(PlayerId(7)).unwrap().id(), b.id());
        assert!(b.is_active());
        assert!(
            !log.lock()
                .unwrap()
                .contains(&SessionChange::Released(PlayerId(7)))
        );
    }

    #[test]
    fn test_post_packet_goes_to_current_owner() {
        let bridge = SessionBridge::default();
        let (a, mut a_box) = ConnectionHandle::new(ConnectionId::new(1), PlayerId(1));
        let (b, mut b_box) = ConnectionHandle::new(ConnectionId::new(2), PlayerId(1));
        assert!(!bridge.post_packet(PlayerId(1), ServerPacket::Pong));

        bridge.acquire(a);
        bridge.acquire(b);
        assert!(bridge.post_packet(PlayerId(1), ServerPacket::Game));
        assert!(a_box.packets.try_recv().is_err());
        assert_eq!(b_box.packets.try_recv().unwrap(), ServerPacket::Game);
    }

    #[test]
    fn test_close_all_signals_every_owner() {
        let bridge = SessionBridge::default();
        let mut boxes = Vec::new();
        for p in 0..3u8 {
            let (c, outbox) = ConnectionHandle::new(ConnectionId::new(u64::from(p)), PlayerId(p));
            bridge.acquire(c);
            boxes.push(outbox);
        }
        bridge.close_all();
        assert!(boxes.iter().all(|b| *b.closed.borrow()));
        assert!(bridge.active_players().is_empty());
    }
}
