//! `CAST`: spell lookup, mana cost and the spells themselves.

use std::fmt::Write as _;
use std::time::Duration;

use sector_protocol::{AnimTarget, ClientPacket, EntityId, PlayerId, ServerPacket};
use sector_scheduler::{Continuation, Handled, HandlerError, Resume, Step};
use sector_world::{Entity, ItemKind, Position};
use tracing::{debug, info};

use super::select::Select;
use super::{BROADCAST_RADIUS, Game, Target};

/// Mana per non-zero byte of the spell code.
pub const MANA_PER_POWER: u16 = 5;
/// Pause between ritual steps.
pub const RITUAL_TICK: Duration = Duration::from_secs(1);
/// Animation code played on the caster of a fire arrow.
pub const FIRE_ARROW_ANIM: u8 = 1;

/// Spells known to the lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spell {
    FireArrow,
    ForceRam,
    BindRing,
}

const SPELLS: [([u8; 8], Spell); 3] = [
    ([0x4a, 0x5a, 0, 0, 0, 0, 0, 0], Spell::FireArrow),
    ([0x51, 0x51, 0x51, 0, 0, 0, 0, 0], Spell::ForceRam),
    ([0x76, 0x77, 0x78, 0x79, 0, 0, 0, 0], Spell::BindRing),
];

impl Spell {
    pub fn lookup(code: &[u8; 8]) -> Option<Self> {
        SPELLS
            .iter()
            .find(|(c, _)| c == code)
            .map(|&(_, spell)| spell)
    }
}

/// Number of non-zero bytes in a spell code.
pub fn spell_power(code: &[u8; 8]) -> u8 {
    // At most 8, always fits.
    code.iter().filter(|&&b| b != 0).count() as u8
}

fn hex(code: &[u8]) -> String {
    code.iter().fold(String::new(), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

pub(crate) fn handle_cast(
    game: &mut Game,
    player: PlayerId,
    packet: ClientPacket,
) -> Result<Handled<Game>, HandlerError> {
    let ClientPacket::Cast { spell } = packet else {
        return Err(HandlerError::Rejected(format!(
            "{player}: cast handler got {}",
            packet.kind()
        )));
    };
    let power = spell_power(&spell);
    let cost = u16::from(power) * MANA_PER_POWER;

    if game.avatar(player)?.mana < cost {
        game.show_text(player, "Not enough mana.");
        return Ok(Handled::Done);
    }
    game.avatar_mut(player)?.mana -= cost;
    game.send_stats(player, false);

    // Full power codes belong to the block-cipher spell system, which this
    // server does not carry.
    if power == 8 {
        game.show_text(player, "The spell failed miserably.");
        return Ok(Handled::Done);
    }

    let Some(known) = Spell::lookup(&spell) else {
        debug!(%player, code = %hex(&spell), "unknown spell");
        game.show_text(
            player,
            format!("The spell failed miserably. ({})", hex(&spell)),
        );
        return Ok(Handled::Done);
    };
    info!(%player, spell = ?known, "cast");

    Ok(match known {
        Spell::FireArrow => {
            fire_arrow(game, player)?;
            Handled::Done
        }
        Spell::ForceRam => Handled::spawn(ForceRam::new(player)),
        Spell::BindRing => Handled::spawn(BindRing::new(player)),
    })
}

fn fire_arrow(game: &mut Game, player: PlayerId) -> Result<(), HandlerError> {
    game.show_text(player, "FIRE ARROW");
    let pos = game.position_of(player)?;
    for p in game.active_players_near(pos, BROADCAST_RADIUS) {
        game.send(
            p,
            ServerPacket::Anim {
                target: AnimTarget::Mob,
                id: player.entity_id(),
                anim: FIRE_ARROW_ANIM,
            },
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Force ram
// ---------------------------------------------------------------------------

/// Pushes a mob standing on the caster's cell one tile in the caster's
/// facing direction.
#[derive(Debug)]
pub(crate) struct ForceRam {
    player: PlayerId,
    select: Option<Select>,
}

impl ForceRam {
    pub(crate) fn new(player: PlayerId) -> Self {
        Self {
            player,
            select: None,
        }
    }

    fn ram(&self, game: &mut Game, target: EntityId) {
        let player = self.player;
        let Ok(caster_pos) = game.position_of(player) else {
            return;
        };
        let Some((target_pos, target_player)) = game
            .world
            .mob(target)
            .and_then(|m| m.position().map(|p| (p, m.player_id())))
        else {
            game.show_text(player, "Missed the mob.");
            return;
        };
        if target_pos != caster_pos {
            game.show_text(player, "The target is too far away.");
            return;
        }
        let Ok(facing) = game.avatar(player).map(|m| m.direction) else {
            return;
        };

        let to = target_pos.step(facing);
        if !game.world.terrain().in_bounds(to) || game.world.terrain().blocks(to) {
            game.show_text(player, "Can't push the target.");
            return;
        }
        for id in game.world.items_at(to) {
            let Some(item) = game.world.item(id) else {
                continue;
            };
            if item.blocking {
                game.show_text(player, "Can't push the target.");
                return;
            }
            if let ItemKind::Door { group } = item.kind {
                game.show_text(player, "A block of force hits the target and pushes it away!");
                game.door_teleport(target, group);
                if let Some(p) = target_player {
                    game.show_text(p, "You've been shoved away by a wall of force");
                }
                return;
            }
        }

        if game.world.move_mob(target, to).is_err() {
            return;
        }
        if let Some(p) = target_player {
            game.send_position(p);
            game.show_text(p, "You've been shoved away by a wall of force");
        }
        game.broadcast_mobs(to, None);
        game.broadcast_mobs(caster_pos, None);
        game.show_text(player, "A block of force hits the target and pushes it away!");
    }
}

impl Continuation<Game> for ForceRam {
    fn resume(&mut self, game: &mut Game, input: Resume) -> Step {
        match self.select.take() {
            None => {
                game.show_text(self.player, "Select who you want to ram:");
                match Select::begin(game, self.player) {
                    Some((select, step)) => {
                        self.select = Some(select);
                        step
                    }
                    None => Step::Complete,
                }
            }
            Some(select) => {
                match select.finish(game, input) {
                    Some(Target::Mob(id)) => self.ram(game, id),
                    Some(_) => game.show_text(self.player, "You can only shove away mobs."),
                    None => {}
                }
                Step::Complete
            }
        }
    }

    fn label(&self) -> &'static str {
        "force_ram"
    }
}

// ---------------------------------------------------------------------------
// Bind teleport ring
// ---------------------------------------------------------------------------

const RITUAL: [&str; 4] = [
    "Verifying location of planets...",
    "Measuring disturbance of force...",
    "Calming local aether fields...",
    "Probing nearby dimensions...",
];

#[derive(Debug)]
enum BindPhase {
    Begin,
    Selecting(Select),
    /// Ritual underway; `done` steps have been announced.
    Ritual {
        ring: EntityId,
        origin: Position,
        done: usize,
    },
}

/// Binds a teleport ring to the caster's position. The caster must stand
/// still for the whole ritual.
#[derive(Debug)]
pub(crate) struct BindRing {
    player: PlayerId,
    phase: BindPhase,
}

impl BindRing {
    pub(crate) fn new(player: PlayerId) -> Self {
        Self {
            player,
            phase: BindPhase::Begin,
        }
    }

    fn start_ritual(&mut self, game: &mut Game, target: Option<Target>) -> Step {
        let player = self.player;
        let Some(target) = target else {
            return Step::Complete;
        };
        let Target::Item { id, .. } = target else {
            game.show_text(player, "Aborting teleport ring bind.");
            return Step::Complete;
        };
        let Some(ring) = game
            .world
            .item_mut(id)
            .filter(|i| matches!(i.kind, ItemKind::TeleportRing { .. }))
        else {
            game.show_text(player, "Not a teleport ring, aborting spell.");
            return Step::Complete;
        };
        ring.bind_ring(None);

        let Ok(origin) = game.position_of(player) else {
            return Step::Complete;
        };
        game.show_text(player, "Starting location binding ritual...");
        self.phase = BindPhase::Ritual {
            ring: id,
            origin,
            done: 0,
        };
        Step::sleep(RITUAL_TICK)
    }

    fn finish_ritual(&self, game: &mut Game, ring: EntityId, origin: Position) {
        let player = self.player;
        if game.position_of(player).ok() != Some(origin) {
            game.show_text(player, "Ritual failed! Don't move next time.");
            return;
        }
        let Some(item) = game.world.item_mut(ring) else {
            return;
        };
        item.bind_ring(Some(origin));
        info!(%player, %ring, x = origin.x, y = origin.y, "ring bound");
        game.show_text(player, "Teleport ring bound to new location!");
        game.send_inventory(player);
        game.send_ground(player);
    }
}

impl Continuation<Game> for BindRing {
    fn resume(&mut self, game: &mut Game, input: Resume) -> Step {
        match std::mem::replace(&mut self.phase, BindPhase::Begin) {
            BindPhase::Begin => {
                game.show_text(
                    self.player,
                    "Select teleport ring you want to bind to this location",
                );
                match Select::begin(game, self.player) {
                    Some((select, step)) => {
                        self.phase = BindPhase::Selecting(select);
                        step
                    }
                    None => Step::Complete,
                }
            }
            BindPhase::Selecting(select) => {
                let target = select.finish(game, input);
                self.start_ritual(game, target)
            }
            BindPhase::Ritual { ring, origin, done } => {
                if let Some(text) = RITUAL.get(done) {
                    game.show_text(self.player, *text);
                    self.phase = BindPhase::Ritual {
                        ring,
                        origin,
                        done: done + 1,
                    };
                    return Step::sleep(RITUAL_TICK);
                }
                self.finish_ritual(game, ring, origin);
                Step::Complete
            }
        }
    }

    fn label(&self) -> &'static str {
        "bind_ring"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spell_power_counts_non_zero_bytes() {
        assert_eq!(spell_power(&[0; 8]), 0);
        assert_eq!(spell_power(&[0x4a, 0x5a, 0, 0, 0, 0, 0, 0]), 2);
        assert_eq!(spell_power(&[0, 1, 0, 1, 0, 1, 0, 1]), 4);
        assert_eq!(spell_power(&[0xff; 8]), 8);
    }

    #[test]
    fn test_lookup_needs_exact_padding() {
        assert_eq!(
            Spell::lookup(&[0x51, 0x51, 0x51, 0, 0, 0, 0, 0]),
            Some(Spell::ForceRam)
        );
        assert_eq!(Spell::lookup(&[0x51, 0x51, 0x51, 0, 0, 0, 0, 1]), None);
        assert_eq!(Spell::lookup(&[0; 8]), None);
    }

    #[test]
    fn test_hex_is_lowercase_and_padded() {
        assert_eq!(hex(&[0x0a, 0xff, 0]), "0aff00");
    }
}
