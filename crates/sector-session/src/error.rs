//! Error types for the session layer.

use sector_protocol::PlayerId;

/// Errors that can occur while admitting a player.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The password did not match the configured digest.
    #[error("authentication failed for player {0}")]
    AuthFailed(PlayerId),

    /// No password is configured for this player slot.
    #[error("no password configured for player {0}")]
    UnknownPlayer(PlayerId),

    /// A configured digest is not a SHA-256 hex string.
    #[error("invalid password digest for player {player}: {reason}")]
    InvalidDigest { player: PlayerId, reason: String },
}
