//! Handlers for client packets that need the world.

use sector_protocol::{
    ClientPacket, Direction, EQUIPMENT_SLOTS, EntityId, INVENTORY_SLOTS, PlayerId,
};
use sector_scheduler::{Handled, HandlerError};
use sector_world::{Entity, ItemKind, Slot};
use tracing::{debug, info, trace};

use super::{Game, Reach};

type Outcome = Result<Handled<Game>, HandlerError>;

/// Chat text longer than this is cut.
pub const MAX_SAY_LEN: usize = 256;
/// Hearing distances: verbatim, lowercased, garbled.
pub const HEAR_CLOSE: i32 = 7;
pub const HEAR_NEARBY: i32 = 12;
pub const HEAR_AWAY: i32 = 18;

/// Turns a relative `MOVE` step (forward, backward, strafe left, strafe
/// right) into a compass direction given the current facing.
pub fn step_direction(facing: Direction, step: u8) -> Option<Direction> {
    use Direction::{East, North, South, West};
    let row = match facing {
        North => [North, South, West, East],
        South => [South, North, East, West],
        West => [West, East, South, North],
        East => [East, West, North, South],
    };
    row.get(usize::from(step)).copied()
}

fn unexpected(player: PlayerId, packet: &ClientPacket) -> Outcome {
    Err(HandlerError::Rejected(format!(
        "{player}: handler got {}",
        packet.kind()
    )))
}

// -- Movement ---------------------------------------------------------------

pub(crate) fn handle_move(game: &mut Game, player: PlayerId, packet: ClientPacket) -> Outcome {
    let ClientPacket::Move { step } = packet else {
        return unexpected(player, &packet);
    };
    let mob = game.avatar(player)?;
    let Some(direction) = step_direction(mob.direction, step) else {
        debug!(%player, step, "invalid move step");
        return Ok(Handled::Done);
    };
    let from = game.position_of(player)?;
    let to = from.step(direction);

    if !game.world.terrain().in_bounds(to) {
        game.show_text(player, "Can't go there.");
        return Ok(Handled::Done);
    }

    for id in game.world.items_at(to) {
        let Some(item) = game.world.item(id) else {
            continue;
        };
        if item.blocking {
            game.show_text(player, "Way is blocked.");
            return Ok(Handled::Done);
        }
        if let ItemKind::Door { group } = item.kind {
            game.door_teleport(player.entity_id(), group);
            return Ok(Handled::Done);
        }
    }

    if game.world.terrain().blocks(to) {
        trace!(%player, x = to.x, y = to.y, "blocked by terrain");
        return Ok(Handled::Done);
    }

    game.world
        .move_mob(player.entity_id(), to)
        .map_err(|e| HandlerError::Other(Box::new(e)))?;
    game.send_position(player);
    game.broadcast_mobs(from, Some(player));
    game.broadcast_mobs(to, Some(player));
    Ok(Handled::Done)
}

pub(crate) fn handle_turn(game: &mut Game, player: PlayerId, packet: ClientPacket) -> Outcome {
    let ClientPacket::Turn { direction } = packet else {
        return unexpected(player, &packet);
    };
    let Some(direction) = Direction::from_wire(direction) else {
        debug!(%player, direction, "invalid direction");
        return Ok(Handled::Done);
    };
    game.avatar_mut(player)?.direction = direction;
    game.send_position(player);
    Ok(Handled::Done)
}

// -- Chat -------------------------------------------------------------------

/// Keeps printable ASCII only and cuts to [`MAX_SAY_LEN`].
pub fn sanitize_chat(raw: &[u8]) -> String {
    raw.iter()
        .copied()
        .filter(|b| (0x20..=0x7e).contains(b))
        .take(MAX_SAY_LEN)
        .map(char::from)
        .collect()
}

/// Replaces roughly half the characters with dots.
fn garble(text: &str) -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    text.chars()
        .map(|c| if rng.random_bool(0.5) { '.' } else { c })
        .collect()
}

pub(crate) fn handle_say(game: &mut Game, player: PlayerId, packet: ClientPacket) -> Outcome {
    let ClientPacket::Say { text } = packet else {
        return unexpected(player, &packet);
    };
    let text = sanitize_chat(&text);
    let speaker = game.avatar(player)?.name.clone();
    let center = game.position_of(player)?;

    let close = format!("\x13{speaker} says: \x17{text}");
    let nearby = format!("\x13{speaker} says: \x17{}", text.to_lowercase());
    let away = format!("\x13{speaker} says: \x17{}", garble(&text));

    let close_sq = i64::from(HEAR_CLOSE * HEAR_CLOSE);
    let nearby_sq = i64::from(HEAR_NEARBY * HEAR_NEARBY);

    for listener in game.active_players_near(center, HEAR_AWAY) {
        // The speaker's own client already shows the line.
        if listener == player {
            continue;
        }
        let Ok(pos) = game.position_of(listener) else {
            continue;
        };
        let d = pos.distance_sq(center);
        let msg = if d <= close_sq {
            &close
        } else if d <= nearby_sq {
            &nearby
        } else {
            &away
        };
        game.show_text(listener, msg.clone());
    }
    info!(%player, name = %speaker, %text, "says");
    Ok(Handled::Done)
}

// -- Items ------------------------------------------------------------------

pub(crate) fn handle_hold(game: &mut Game, player: PlayerId, packet: ClientPacket) -> Outcome {
    let ClientPacket::Hold { item } = packet else {
        return unexpected(player, &packet);
    };
    if item.is_none() {
        debug!(%player, "tried to hold the empty item");
        return Ok(Handled::Done);
    }
    let Some(reach) = game.reach_item(player, item) else {
        game.show_text(player, "Out of reach.");
        return Ok(Handled::Done);
    };
    if !game.world.item(item).is_some_and(|i| i.movable) {
        game.show_text(player, "Unable to take this item.");
        return Ok(Handled::Done);
    }
    let holding = game
        .avatar(player)?
        .player_state()
        .map_or(EntityId::NONE, |s| s.holding);
    if holding.is_some() {
        game.show_text(player, "Your hands are full.");
        return Ok(Handled::Done);
    }

    match reach {
        Reach::Ground(pos) => {
            game.world.pick_up_item(item);
            game.send_ground(player);
            game.broadcast_ground(pos, Some(player));
        }
        Reach::Slot(slot) => {
            if let Some(state) = game.avatar_mut(player)?.player_state_mut() {
                match slot {
                    Slot::Inventory(i) => state.inventory[i] = EntityId::NONE,
                    Slot::Equipment(i) => state.equipment[i] = EntityId::NONE,
                }
            }
            game.send_inventory(player);
        }
    }

    if let Some(state) = game.avatar_mut(player)?.player_state_mut() {
        state.holding = item;
    }
    game.send_holding(player);
    Ok(Handled::Done)
}

pub(crate) fn handle_drop(game: &mut Game, player: PlayerId, packet: ClientPacket) -> Outcome {
    let ClientPacket::Drop { slot } = packet else {
        return unexpected(player, &packet);
    };
    let pos = game.position_of(player)?;
    let Some(state) = game.avatar_mut(player)?.player_state_mut() else {
        return Ok(Handled::Done);
    };
    let held = state.holding;
    if held.is_none() {
        return Ok(Handled::Done);
    }

    let slot = usize::from(slot);
    if slot < INVENTORY_SLOTS {
        state.holding = std::mem::replace(&mut state.inventory[slot], held);
        game.send_inventory(player);
    } else if slot < INVENTORY_SLOTS + EQUIPMENT_SLOTS {
        let e = slot - INVENTORY_SLOTS;
        state.holding = std::mem::replace(&mut state.equipment[e], held);
        game.send_inventory(player);
    } else {
        state.holding = EntityId::NONE;
        game.world.drop_item(held, pos);
        game.send_ground(player);
        game.broadcast_ground(pos, Some(player));
    }
    game.send_holding(player);
    Ok(Handled::Done)
}

pub(crate) fn handle_use(game: &mut Game, player: PlayerId, packet: ClientPacket) -> Outcome {
    let ClientPacket::Use { item } = packet else {
        return unexpected(player, &packet);
    };
    if item.is_none() {
        debug!(%player, "tried to use the empty item");
        return Ok(Handled::Done);
    }
    if game.reach_item(player, item).is_none() {
        game.show_text(player, "Out of reach.");
        return Ok(Handled::Done);
    }
    Ok(game.use_item(player, item))
}

/// A `THIS` nobody is waiting for: late, duplicated or forged.
pub(crate) fn handle_stray_this(
    _game: &mut Game,
    player: PlayerId,
    packet: ClientPacket,
) -> Outcome {
    debug!(%player, ?packet, "ignoring uncorrelated selection reply");
    Ok(Handled::Done)
}
