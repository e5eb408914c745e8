//! # Arcane Sector
//!
//! Server for a small multiplayer grid world.
//!
//! One task owns the world and runs the event loop from
//! [`sector_scheduler`]. Every connection runs a reader and a writer task.
//! The reader posts decoded packets into the loop. The writer drains the
//! packets the loop queued for that player. Nothing else touches world
//! state.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sector::prelude::*;
//!
//! # async fn start() -> Result<(), SectorError> {
//! let config = ServerConfig::default();
//! let auth = config.authenticator()?;
//! let server = SectorServer::builder().config(config).build(auth).await?;
//! server.run().await
//! # }
//! ```

pub mod config;
mod error;
pub mod game;
mod handler;
mod server;

pub use config::{ServerConfig, StartPosition};
pub use error::SectorError;
pub use game::{Game, GameSettings, Special};
pub use server::{SectorServer, SectorServerBuilder, ShutdownHandle};

/// Convenient re-exports for running a server or driving the game in tests.
pub mod prelude {
    pub use crate::config::{ServerConfig, StartPosition};
    pub use crate::error::SectorError;
    pub use crate::game::{Game, GameSettings, Special};
    pub use crate::server::{SectorServer, SectorServerBuilder, ShutdownHandle};

    pub use sector_protocol::{
        BinaryCodec, ClientPacket, Codec, CorrelationId, Direction, EntityId, PlayerId,
        ServerPacket,
    };
    pub use sector_scheduler::{Scheduler, SchedulerConfig, SchedulerHandle};
    pub use sector_session::{Authenticator, PasswordAuthenticator, SessionBridge, SessionError};
    pub use sector_world::{Item, ItemKind, MapFile, Mob, Position, Terrain, Tile, World};
}
