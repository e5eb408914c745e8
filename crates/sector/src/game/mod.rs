//! The game: world state plus the handler tables the world loop drives.
//!
//! [`Game`] is owned by the scheduler task. Connection tasks never touch it;
//! they post packets and [`Special`] events, and the game answers through
//! the [`SessionBridge`].

mod outbound;
mod packets;
mod select;
mod specials;
mod spells;
mod usage;

use std::sync::Arc;
use std::time::Duration;

use sector_protocol::{CorrelationId, Direction, PacketKind, PlayerId};
use sector_scheduler::{HandlerError, Handlers, SpecialEvent, WorldLogic};
use sector_session::{CharacterProfile, SessionBridge, SessionChange};
use sector_world::{Entity, Mob, Position, World};

use crate::config::ServerConfig;

pub use select::{Reach, Target};

/// Chebyshev radius of the ground and mob views sent to a player.
pub const VIEW_RADIUS: i32 = 5;
/// Players within this distance see mob and ground changes.
pub const BROADCAST_RADIUS: i32 = 8;

/// Gameplay settings taken from the server config.
#[derive(Debug, Clone)]
pub struct GameSettings {
    pub select_timeout: Duration,
    pub spawner_interval: Duration,
    pub start: Position,
    pub start_direction: Direction,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for GameSettings {
    fn from(cfg: &ServerConfig) -> Self {
        Self {
            select_timeout: cfg.select_timeout(),
            spawner_interval: cfg.spawner_interval(),
            start: cfg.start_position.position(),
            start_direction: cfg.start_position.direction,
        }
    }
}

/// Internal events posted to the world loop.
#[derive(Debug, Clone)]
pub enum Special {
    /// Send a freshly connected player everything about themselves.
    BasicInfoRequest(PlayerId),
    /// A connection became the owner of the player.
    SessionAcquired(PlayerId),
    /// The owning connection went away.
    SessionReleased(PlayerId),
    /// Put a newly created character into the world.
    CreatePlayer(CharacterProfile),
    /// Start the spawner pass loop. Posted once at boot.
    Spawners,
}

impl SpecialEvent for Special {
    fn name(&self) -> &'static str {
        match self {
            Self::BasicInfoRequest(_) => "basic_info_request",
            Self::SessionAcquired(_) => "session_acquired",
            Self::SessionReleased(_) => "session_released",
            Self::CreatePlayer(_) => "create_player",
            Self::Spawners => "spawners",
        }
    }
}

impl From<SessionChange> for Special {
    fn from(change: SessionChange) -> Self {
        match change {
            SessionChange::Acquired(p) => Self::SessionAcquired(p),
            SessionChange::Released(p) => Self::SessionReleased(p),
        }
    }
}

/// World state and the services handlers need.
pub struct Game {
    world: World,
    sessions: Arc<SessionBridge>,
    settings: GameSettings,
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("sessions", &self.sessions)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Game {
    pub fn new(world: World, sessions: Arc<SessionBridge>, settings: GameSettings) -> Self {
        Self {
            world,
            sessions,
            settings,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn sessions(&self) -> &Arc<SessionBridge> {
        &self.sessions
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    /// The player's avatar, or [`HandlerError::NoCharacter`].
    pub(crate) fn avatar(&self, player: PlayerId) -> Result<&Mob, HandlerError> {
        self.world
            .player(player)
            .ok_or(HandlerError::NoCharacter(player))
    }

    pub(crate) fn avatar_mut(&mut self, player: PlayerId) -> Result<&mut Mob, HandlerError> {
        self.world
            .player_mut(player)
            .ok_or(HandlerError::NoCharacter(player))
    }

    /// Current position of the player's avatar.
    pub(crate) fn position_of(&self, player: PlayerId) -> Result<Position, HandlerError> {
        self.avatar(player)?
            .position()
            .ok_or_else(|| HandlerError::Rejected(format!("{player} is not placed")))
    }

    /// A fresh correlation id for a server-initiated request.
    pub(crate) fn next_correlation(&self) -> CorrelationId {
        CorrelationId(self.world.registry().ids().next_raw())
    }
}

impl WorldLogic for Game {
    type Special = Special;

    fn handlers() -> Handlers<Self> {
        Handlers::new()
            .on_packet(PacketKind::Move, packets::handle_move)
            .on_packet(PacketKind::Turn, packets::handle_turn)
            .on_packet(PacketKind::Say, packets::handle_say)
            .on_packet(PacketKind::Hold, packets::handle_hold)
            .on_packet(PacketKind::Drop, packets::handle_drop)
            .on_packet(PacketKind::Use, packets::handle_use)
            .on_packet(PacketKind::Cast, spells::handle_cast)
            .on_packet(PacketKind::This, packets::handle_stray_this)
            .on_special("basic_info_request", specials::handle_special)
            .on_special("session_acquired", specials::handle_special)
            .on_special("session_released", specials::handle_special)
            .on_special("create_player", specials::handle_special)
            .on_special("spawners", specials::handle_special)
    }
}
