//! The select interaction: ask the client to pick something and wait for
//! the correlated `THIS` reply.
//!
//! [`Select`] is not a continuation itself. Spells that need a target embed
//! it: [`Select::begin`] yields the suspension, [`Select::finish`] turns the
//! resume input into a validated [`Target`]. Every way out of a select
//! clears the player's `selecting` flag.

use sector_protocol::{
    ClientPacket, CorrelationId, EQUIPMENT_SLOTS, EntityId, INVENTORY_SLOTS, PacketKind, PlayerId,
    ServerPacket,
};
use sector_scheduler::{Resume, Step};
use sector_world::{Entity, Position, Slot};
use tracing::debug;

use super::Game;

/// Where a reachable item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reach {
    /// On the ground under the player.
    Ground(Position),
    /// In one of the player's own slots.
    Slot(Slot),
}

/// What the player picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Item { id: EntityId, reach: Reach },
    Mob(EntityId),
    /// The cell the player stands on.
    Ground(Position),
    EmptySlot(Slot),
}

impl Game {
    /// Whether `player` can touch `item`: same cell, inventory or
    /// equipment.
    pub fn reach_item(&self, player: PlayerId, item: EntityId) -> Option<Reach> {
        let item_ref = self.world.item(item)?;
        let mob = self.world.player(player)?;
        if let Some(pos) = item_ref.position() {
            return (mob.position() == Some(pos)).then_some(Reach::Ground(pos));
        }
        mob.player_state()?.slot_of(item).map(Reach::Slot)
    }
}

#[derive(Debug)]
pub(crate) struct Select {
    player: PlayerId,
    correlation: CorrelationId,
}

impl Select {
    /// Sends `SLCT` and returns the suspension to wait on.
    ///
    /// `None` when the player may not select right now; they have been
    /// told why.
    pub(crate) fn begin(game: &mut Game, player: PlayerId) -> Option<(Self, Step)> {
        let state = game.world.player(player)?.player_state()?;
        if state.selecting {
            game.show_text(player, "Too busy to select another thing.");
            return None;
        }
        if state.holding.is_some() {
            game.show_text(
                player,
                "Can't select when holding an item. Let it go! Let it go!",
            );
            return None;
        }

        let correlation = game.next_correlation();
        if let Some(state) = game.world.player_mut(player)?.player_state_mut() {
            state.selecting = true;
        }
        game.send(player, ServerPacket::Select { correlation });
        debug!(%player, %correlation, "select requested");
        let step = Step::await_packet(
            player,
            correlation,
            PacketKind::This,
            game.settings.select_timeout,
        );
        Some((Self { player, correlation }, step))
    }

    /// Resolves the reply (or its absence) into a target.
    pub(crate) fn finish(self, game: &mut Game, input: Resume) -> Option<Target> {
        let player = self.player;
        if let Some(state) = game
            .world
            .player_mut(player)
            .and_then(|m| m.player_state_mut())
        {
            state.selecting = false;
        }

        let (target_kind, target) = match input {
            Resume::Reply(inbound) => match inbound.packet {
                ClientPacket::This {
                    target_kind,
                    target,
                } => (target_kind, target),
                other => {
                    debug!(%player, kind = %other.kind(), "unexpected select reply");
                    return None;
                }
            },
            Resume::TimedOut => {
                debug!(%player, correlation = %self.correlation, "select timed out");
                game.show_text(player, "Not interested in selecting? Got it! Aborting select.");
                return None;
            }
            Resume::Start | Resume::Woke => return None,
        };

        match target_kind {
            0 => {
                let id = EntityId(target);
                match game.reach_item(player, id) {
                    Some(reach) => Some(Target::Item { id, reach }),
                    None => {
                        game.show_text(player, "Can't reach this item.");
                        None
                    }
                }
            }
            1 => {
                let id = EntityId(target);
                if game.world.mob(id).is_some() {
                    Some(Target::Mob(id))
                } else {
                    game.show_text(player, "Missed the mob.");
                    None
                }
            }
            2 => game.position_of(player).ok().map(Target::Ground),
            3 => {
                let state = game.world.player(player)?.player_state()?;
                let slot = usize::try_from(target).ok().and_then(|i| {
                    if i < INVENTORY_SLOTS {
                        Some((Slot::Inventory(i), state.inventory[i]))
                    } else if i < INVENTORY_SLOTS + EQUIPMENT_SLOTS {
                        let e = i - INVENTORY_SLOTS;
                        Some((Slot::Equipment(e), state.equipment[e]))
                    } else {
                        None
                    }
                });
                match slot {
                    Some((slot, content)) if content.is_none() => Some(Target::EmptySlot(slot)),
                    Some(_) => {
                        game.show_text(player, "Slot is not empty.");
                        None
                    }
                    None => {
                        game.show_text(player, "What did you select???");
                        None
                    }
                }
            }
            _ => None,
        }
    }
}
