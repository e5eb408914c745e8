//! Unified error type for the server.

use sector_protocol::ProtocolError;
use sector_scheduler::SchedulerError;
use sector_session::SessionError;
use sector_transport::TransportError;
use sector_world::WorldError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum SectorError {
    /// Connection, send or receive failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The peer broke the wire rules.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Authentication or password table problem.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Map loading or world bookkeeping.
    #[error(transparent)]
    World(#[from] WorldError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Reading the config file.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing the config file.
    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),

    /// The handshake did not complete in time.
    #[error("handshake timed out")]
    HandshakeTimeout,
}

impl SectorError {
    /// Peer-caused endings that need no operator attention.
    pub fn is_expected(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_expected(),
            Self::Session(_) | Self::HandshakeTimeout => true,
            _ => false,
        }
    }
}
