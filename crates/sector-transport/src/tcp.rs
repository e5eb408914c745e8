//! Framed TCP transport: the game client's native wire.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::{
    declared_payload_len, Connection, ConnectionId, Transport, TransportError,
    DEFAULT_MAX_PAYLOAD, FRAME_HEADER_LEN,
};

/// A TCP [`Transport`] producing length-prefixed frame connections.
pub struct TcpTransport {
    listener: TcpListener,
    max_payload: u32,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self {
            listener,
            max_payload: DEFAULT_MAX_PAYLOAD,
        })
    }

    /// Overrides the largest payload a client may declare.
    pub fn with_max_payload(mut self, max_payload: u32) -> Self {
        self.max_payload = max_payload;
        self
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        // Small frames, latency matters more than throughput.
        let _ = stream.set_nodelay(true);

        let id = ConnectionId::next();
        tracing::debug!(%id, %addr, "accepted TCP connection");

        let (read_half, write_half) = stream.into_split();
        Ok(TcpConnection {
            id,
            peer: addr,
            reader: Mutex::new(BufReader::new(read_half)),
            writer: Mutex::new(write_half),
            max_payload: self.max_payload,
        })
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A single framed TCP connection.
///
/// The read and write halves are locked independently so the reader task
/// never blocks the writer task.
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
    max_payload: u32,
}

impl TcpConnection {
    /// Returns the remote address of the peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, frame: &[u8]) -> Result<(), Self::Error> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(frame)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut reader = self.reader.lock().await;
        let mut header = [0u8; FRAME_HEADER_LEN];

        // A clean close is only possible on a frame boundary.
        let first = reader
            .read(&mut header[..1])
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if first == 0 {
            return Ok(None);
        }
        reader
            .read_exact(&mut header[1..])
            .await
            .map_err(TransportError::ReceiveFailed)?;

        let size = declared_payload_len(&header);
        if size > self.max_payload {
            return Err(TransportError::FrameTooLarge {
                size,
                limit: self.max_payload,
            });
        }

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + size as usize);
        frame.extend_from_slice(&header);
        frame.resize(FRAME_HEADER_LEN + size as usize, 0);
        reader
            .read_exact(&mut frame[FRAME_HEADER_LEN..])
            .await
            .map_err(TransportError::ReceiveFailed)?;

        tracing::trace!(id = %self.id, size, "frame received");
        Ok(Some(frame))
    }

    async fn close(&self) -> Result<(), Self::Error> {
        match self.writer.lock().await.shutdown().await {
            Ok(()) => Ok(()),
            // Already gone: closing twice is not an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(TransportError::SendFailed(e)),
        }
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
