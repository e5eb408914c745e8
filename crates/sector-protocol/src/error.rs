//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the peer (or our own encoder) broke the
//! wire rules. For an inbound frame that is fatal to the connection only.

use crate::PacketKind;

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is shorter than the fixed 16-byte header.
    #[error("frame too short for header ({0} bytes)")]
    ShortFrame(usize),

    /// The header's size field disagrees with the bytes that followed it.
    #[error("declared payload size {declared} but frame carries {actual}")]
    SizeMismatch {
        /// Size from the header.
        declared: u32,
        /// Payload bytes actually present.
        actual: usize,
    },

    /// Declared payload is over the limit.
    #[error("declared packet size too large ({size} vs limit {limit})")]
    PayloadTooLarge {
        /// Size from the header.
        size: u32,
        /// Configured cap.
        limit: u32,
    },

    /// The 4-byte tag is not in the packet table.
    #[error("declared packet tag is not known ({})", String::from_utf8_lossy(.0))]
    UnknownTag([u8; 4]),

    /// A known tag arrived from the wrong side (e.g. a client sending `POSI`).
    #[error("packet {0} is not accepted from this peer")]
    WrongDirection(PacketKind),

    /// A fixed-size payload had the wrong length.
    #[error("malformed {kind} payload: expected {expected} bytes, got {actual}")]
    BadLength {
        /// Packet being decoded.
        kind: PacketKind,
        /// Required payload length.
        expected: usize,
        /// Length actually received.
        actual: usize,
    },

    /// A string field does not fit its length prefix.
    #[error("encode failed: {0}")]
    Encode(String),

    /// The message is invalid at the protocol level.
    ///
    /// For logical errors that pass decoding but violate protocol rules,
    /// e.g. `ENTR` arriving after the handshake.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
