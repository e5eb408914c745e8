use std::io;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] io::Error),

    /// The peer declared a payload larger than the configured limit.
    #[error("declared frame payload too large ({size} vs limit {limit})")]
    FrameTooLarge {
        /// Payload size announced in the frame header.
        size: u32,
        /// Largest payload this transport accepts.
        limit: u32,
    },

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Returns `true` for errors that just mean "the peer went away".
    ///
    /// These are part of normal operation and are logged quietly. Anything
    /// else is surfaced to the operator log.
    pub fn is_expected(&self) -> bool {
        match self {
            Self::ConnectionClosed(_) | Self::Shutdown => true,
            Self::SendFailed(e) | Self::ReceiveFailed(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
            ),
            Self::AcceptFailed(_) | Self::FrameTooLarge { .. } => false,
        }
    }

    /// Returns `true` if the peer broke the framing rules.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::FrameTooLarge { .. })
    }
}
