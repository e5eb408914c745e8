//! Error types for the scheduler layer.

use sector_protocol::PlayerId;

use crate::CorrelationKey;

/// Errors raised by the scheduler's own bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A reply reservation already exists for this key.
    #[error("correlation {0} is already registered")]
    DuplicateCorrelation(CorrelationKey),
}

/// Failure reported by a handler or continuation step.
///
/// The scheduler logs it and moves on to the next event.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A packet arrived for a player with no character.
    #[error("player {0} has no character")]
    NoCharacter(PlayerId),

    /// The handler rejected the event.
    #[error("{0}")]
    Rejected(String),

    /// Any other failure.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
