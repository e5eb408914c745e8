//! Transport layer for the Arcane Sector server.
//!
//! Provides the [`Transport`] and [`Connection`] traits plus the framed TCP
//! transport the game client speaks. A connection hands out whole frames:
//! a fixed 16-byte header whose first four bytes are the little-endian
//! payload size, followed by that many payload bytes. What the rest of the
//! header means is the protocol crate's business.
//!
//! # Feature Flags
//!
//! - `websocket`: WebSocket listener via `tokio-tungstenite`, one frame per
//!   binary message

#![allow(async_fn_in_trait)]

mod error;
mod tcp;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use tcp::{TcpConnection, TcpTransport};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Size of the fixed frame header.
pub const FRAME_HEADER_LEN: usize = 16;

/// Default cap on a client-declared payload size (1 MiB).
pub const DEFAULT_MAX_PAYLOAD: u32 = 1024 * 1024;

/// Counter for generating unique connection IDs across all transports.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Reads the declared payload size out of a frame header.
pub fn declared_payload_len(header: &[u8; FRAME_HEADER_LEN]) -> u32 {
    u32::from_le_bytes([header[0], header[1], header[2], header[3]])
}

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-wide connection id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// A single connection that exchanges whole frames.
///
/// `send` and `recv` may be called concurrently from different tasks: the
/// reader task blocks in `recv` while the writer task drains the outbound
/// queue through `send`. Their futures are `Send` so a generic connection
/// can be driven from a spawned task.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one complete frame (header and payload) to the peer.
    fn send(&self, frame: &[u8]) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next complete frame from the peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed between
    /// frames.
    fn recv(&self) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the connection. Safe to call more than once.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
