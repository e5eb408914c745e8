//! Handlers for internal events.

use rand::Rng;
use sector_protocol::PlayerId;
use sector_scheduler::{Continuation, Handled, HandlerError, Resume, Step};
use sector_session::CharacterProfile;
use sector_world::{Item, ItemKind, Mob, SpawnItem};
use tokio::time::Instant;
use tracing::{debug, info, trace};

use super::{Game, Special};

/// Range of the spawner's herb roll. `Item::new` folds the roll onto the herb looks.
pub const HERB_KINDS: u8 = 14;

type Outcome = Result<Handled<Game>, HandlerError>;

pub(crate) fn handle_special(game: &mut Game, special: Special) -> Outcome {
    match special {
        Special::BasicInfoRequest(player) => basic_info(game, player),
        Special::SessionAcquired(player) => {
            if let Some(pos) = game.world.index_mob(player.entity_id()) {
                debug!(%player, x = pos.x, y = pos.y, "avatar back in the world");
                game.broadcast_mobs(pos, Some(player));
            }
            Ok(Handled::Done)
        }
        Special::SessionReleased(player) => {
            // An open select keeps its flag until its own reply or deadline.
            if let Some(pos) = game.world.unindex_mob(player.entity_id()) {
                debug!(%player, x = pos.x, y = pos.y, "avatar left the world");
                game.broadcast_mobs(pos, None);
            }
            Ok(Handled::Done)
        }
        Special::CreatePlayer(profile) => create_player(game, profile),
        Special::Spawners => Ok(Handled::spawn(SpawnerLoop)),
    }
}

fn basic_info(game: &mut Game, player: PlayerId) -> Outcome {
    let mob = game.avatar(player)?;
    let name = mob.name.clone();
    let holding = mob.player_state().is_some_and(|s| s.holding.is_some());

    game.send_stats(player, true);
    game.send_inventory(player);
    game.send_position(player);
    if holding {
        game.send_holding(player);
    }
    game.show_text(player, format!("Welcome {name} to \x12Arcane Sector\x0f!"));
    Ok(Handled::Done)
}

fn create_player(game: &mut Game, profile: CharacterProfile) -> Outcome {
    let player = profile.player;
    if game.world.player(player).is_some() {
        trace!(%player, "character already in the world");
        return Ok(Handled::Done);
    }
    let start = game.settings.start;
    let mob = Mob::player(
        player,
        profile.name.clone(),
        profile.portrait,
        start,
        game.settings.start_direction,
    );
    game.world
        .add_player(player, mob)
        .map_err(|e| HandlerError::Other(Box::new(e)))?;
    info!(%player, name = %profile.name, "character created");

    // The connection may already be gone; keep the avatar out of sight then.
    if game.sessions.is_connected(player) {
        game.broadcast_mobs(start, Some(player));
    } else {
        game.world.unindex_mob(player.entity_id());
    }
    Ok(Handled::Done)
}

/// Runs a spawner pass, sleeps, repeats. Lives as long as the loop.
#[derive(Debug)]
pub(crate) struct SpawnerLoop;

impl SpawnerLoop {
    fn pass(game: &mut Game, now: Instant) {
        let ready: Vec<_> = game
            .world
            .spawners_mut()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_ready(now))
            .map(|(i, s)| (i, s.spec.clone()))
            .collect();

        for (index, spec) in ready {
            let pos = spec.position();
            if !game.world.items_at(pos).is_empty() {
                continue;
            }
            if let Some(spawner) = game.world.spawners_mut().get_mut(index) {
                spawner.last = Some(now);
            }
            let item = match spec.item {
                SpawnItem::Herb => Item::new(ItemKind::Herb {
                    index: rand::rng().random_range(0..HERB_KINDS),
                }),
                SpawnItem::TeleportRing => Item::new(ItemKind::TeleportRing { binding: None }),
            };
            let id = game.world.spawn_item(item, pos);
            debug!(%id, x = pos.x, y = pos.y, "spawned item");
            game.broadcast_ground(pos, None);
        }
    }
}

impl Continuation<Game> for SpawnerLoop {
    fn resume(&mut self, game: &mut Game, _input: Resume) -> Step {
        Self::pass(game, Instant::now());
        Step::sleep(game.settings.spawner_interval)
    }

    fn label(&self) -> &'static str {
        "spawners"
    }
}
