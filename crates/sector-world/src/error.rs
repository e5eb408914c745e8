//! Error types for the world layer.

use sector_protocol::{EntityId, PlayerId};

/// Errors that can occur while loading or mutating the world.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The map file could not be read.
    #[error("failed to read map file: {0}")]
    Io(#[from] std::io::Error),

    /// The map file is not valid JSON for a map.
    #[error("failed to parse map file: {0}")]
    Parse(#[from] serde_json::Error),

    /// The map parsed but is inconsistent.
    #[error("invalid map: {0}")]
    InvalidMap(String),

    /// A player avatar already exists for this slot.
    #[error("player {0} already has a character")]
    DuplicatePlayer(PlayerId),

    /// No live entity with this id.
    #[error("entity {0} not found")]
    NotFound(EntityId),
}
