//! Packet correlation registry.
//!
//! Maps `(player, correlation id, packet kind)` to whoever is waiting for
//! that exact reply. Each registration carries a serial so a deadline
//! event can tell whether the registration it was armed for is still the
//! one in the table.

use std::collections::HashMap;
use std::fmt;

use sector_protocol::{CorrelationId, PacketKind, PlayerId};
use tokio::time::Instant;

use crate::SchedulerError;

/// What a correlated reply must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    pub player: PlayerId,
    pub correlation: CorrelationId,
    pub kind: PacketKind,
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.player, self.correlation, self.kind)
    }
}

struct Pending<W> {
    serial: u64,
    deadline: Instant,
    waiter: W,
}

/// Outstanding reply reservations. At most one per key.
pub struct CorrelationRegistry<W> {
    pending: HashMap<CorrelationKey, Pending<W>>,
    next_serial: u64,
}

impl<W> Default for CorrelationRegistry<W> {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
            next_serial: 1,
        }
    }
}

impl<W> CorrelationRegistry<W> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `key` for `waiter` until `deadline`.
    ///
    /// Returns the registration serial. A key that is already reserved is
    /// rejected and `waiter` is dropped.
    pub fn register(
        &mut self,
        key: CorrelationKey,
        deadline: Instant,
        waiter: W,
    ) -> Result<u64, SchedulerError> {
        if self.pending.contains_key(&key) {
            return Err(SchedulerError::DuplicateCorrelation(key));
        }
        let serial = self.next_serial;
        self.next_serial += 1;
        self.pending.insert(
            key,
            Pending {
                serial,
                deadline,
                waiter,
            },
        );
        Ok(serial)
    }

    /// Removes and returns the waiter for a matching reply.
    pub fn take_match(&mut self, key: &CorrelationKey) -> Option<W> {
        self.pending.remove(key).map(|p| p.waiter)
    }

    /// Removes and returns the waiter if registration `serial` is still
    /// outstanding. A reply that already arrived makes this a no-op.
    pub fn expire(&mut self, key: &CorrelationKey, serial: u64) -> Option<W> {
        match self.pending.get(key) {
            Some(p) if p.serial == serial => self.pending.remove(key).map(|p| p.waiter),
            _ => None,
        }
    }

    /// Deadline of an outstanding registration.
    pub fn deadline(&self, key: &CorrelationKey) -> Option<Instant> {
        self.pending.get(key).map(|p| p.deadline)
    }

    pub fn is_pending(&self, key: &CorrelationKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
