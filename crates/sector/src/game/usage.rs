//! Using items, and the door teleport shared by movement and spells.

use std::time::Duration;

use sector_protocol::{Direction, EntityId, PlayerId};
use sector_scheduler::{Continuation, Handled, Resume, Step};
use sector_world::{Entity, ItemKind, Position};
use tracing::{debug, info, warn};

use super::Game;

/// Pause between the ring countdown messages.
pub const RING_TICK: Duration = Duration::from_secs(1);

impl Game {
    /// Dispatches a `USEI` on a reachable item by its kind.
    pub(crate) fn use_item(&mut self, player: PlayerId, item: EntityId) -> Handled<Game> {
        let Some(kind) = self.world.item(item).map(|i| i.kind.clone()) else {
            return Handled::Done;
        };
        match kind {
            ItemKind::Sign { text } => {
                self.show_text(player, format!("The sign reads: {text}"));
                Handled::Done
            }
            ItemKind::TeleportRing { binding: None } => {
                self.show_text(
                    player,
                    "Ring not bound to any location. Use proper binding spell.",
                );
                Handled::Done
            }
            ItemKind::TeleportRing { binding: Some(_) } => {
                Handled::spawn(RingTeleport::new(player, item))
            }
            ItemKind::Plain | ItemKind::Door { .. } | ItemKind::Herb { .. } => {
                debug!(%player, %item, "item has no use");
                Handled::Done
            }
        }
    }

    /// Moves `mob` next to another door of `group`.
    ///
    /// The destination is the last door of the group (by id) that is not
    /// adjacent to the mob, so stepping into one door of a pair lands the
    /// mob at the other. The mob is placed on the first free side of that
    /// door, trying north, south, west and east in turn.
    pub(crate) fn door_teleport(&mut self, mob: EntityId, group: u32) {
        let Some(from) = self.world.mob(mob).and_then(|m| m.position()) else {
            return;
        };
        let Some(door) = self
            .world
            .doors(group)
            .into_iter()
            .rev()
            .map(|(_, pos)| pos)
            .find(|pos| (pos.x - from.x).abs() + (pos.y - from.y).abs() != 1)
        else {
            warn!(group, "door has no counterpart");
            return;
        };

        let Some((direction, to)) = Direction::ALL
            .into_iter()
            .map(|d| (d, door.step(d)))
            .find(|&(_, pos)| self.is_free(pos))
        else {
            debug!(group, x = door.x, y = door.y, "every side of the door is blocked");
            return;
        };

        if self.world.move_mob(mob, to).is_err() {
            return;
        }
        match self.world.mob(mob).and_then(|m| m.player_id()) {
            Some(player) => {
                if let Some(m) = self.world.mob_mut(mob) {
                    m.direction = direction;
                }
                self.send_position(player);
                self.broadcast_mobs(to, Some(player));
            }
            None => self.broadcast_mobs(to, None),
        }
        self.broadcast_mobs(from, None);
    }

    /// In bounds and not blocked by terrain or a blocking item.
    fn is_free(&mut self, pos: Position) -> bool {
        if !self.world.terrain().in_bounds(pos) || self.world.terrain().blocks(pos) {
            return false;
        }
        let items = self.world.items_at(pos);
        !items
            .into_iter()
            .any(|id| self.world.item(id).is_some_and(|i| i.blocking))
    }
}

/// Three second countdown, then a jump to the ring's bound location.
#[derive(Debug)]
pub(crate) struct RingTeleport {
    player: PlayerId,
    ring: EntityId,
    remaining: u8,
}

impl RingTeleport {
    pub(crate) fn new(player: PlayerId, ring: EntityId) -> Self {
        Self {
            player,
            ring,
            remaining: 3,
        }
    }

    fn teleport(&self, game: &mut Game) {
        let player = self.player;
        // The ring may have been rebound or destroyed during the countdown.
        let Some(dest) = game.world.item(self.ring).and_then(|i| match i.kind {
            ItemKind::TeleportRing { binding } => binding,
            _ => None,
        }) else {
            return;
        };

        if !game.world.terrain().in_bounds(dest) || game.world.terrain().blocks(dest) {
            game.show_text(player, "You detected flawed binding");
            if let Some(ring) = game.world.item_mut(self.ring) {
                ring.name = "Teleport Ring (Flawed)".to_string();
            }
            return;
        }

        let Ok(from) = game.position_of(player) else {
            return;
        };
        game.broadcast_mobs(from, Some(player));
        if game.world.move_mob(player.entity_id(), dest).is_err() {
            return;
        }
        game.send_position(player);
        game.broadcast_mobs(dest, Some(player));
        game.show_text(player, "You feel dizzy, but it seems the ring worked.");
        info!(%player, x = dest.x, y = dest.y, "teleported by ring");
    }
}

impl Continuation<Game> for RingTeleport {
    fn resume(&mut self, game: &mut Game, input: Resume) -> Step {
        if !matches!(input, Resume::Start | Resume::Woke) {
            return Step::Complete;
        }
        if self.remaining == 0 {
            self.teleport(game);
            return Step::Complete;
        }
        game.show_text(self.player, format!("Teleporting in {}...", self.remaining));
        self.remaining -= 1;
        Step::sleep(RING_TICK)
    }

    fn label(&self) -> &'static str {
        "ring_teleport"
    }
}
