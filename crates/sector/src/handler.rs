//! Per-connection handler: handshake, character creation and packet routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `ENTR` → check the password for the requested slot
//!   2. Acquire the player slot (any older connection is kicked)
//!   3. `NOPC` / `MYPC` if the slot has no character yet
//!   4. Send `GAME`, start the writer task, ask the world for the full view
//!   5. Loop: receive frames → answer `PING`, post everything else

use std::sync::Arc;
use std::time::Duration;

use sector_protocol::{
    BinaryCodec, ClientPacket, Codec, Inbound, PlayerId, ProtocolError,
    ServerPacket,
};
use sector_scheduler::SchedulerHandle;
use sector_session::{
    Authenticator, CharacterRoster, ConnectionHandle, SessionBridge,
};
use sector_transport::{Connection, TransportError};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::SectorError;
use crate::game::Special;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A: Authenticator> {
    pub(crate) auth: A,
    pub(crate) codec: BinaryCodec,
    pub(crate) sessions: Arc<SessionBridge>,
    pub(crate) roster: Arc<CharacterRoster>,
    pub(crate) scheduler: SchedulerHandle<Special>,
    pub(crate) handshake_timeout: Duration,
    pub(crate) idle_timeout: Duration,
}

/// Releases the player slot when the handler exits, even on panic.
///
/// The bridge lock is a plain mutex, so unlike an async lock this can run
/// directly in `drop`.
struct SessionGuard {
    sessions: Arc<SessionBridge>,
    handle: Arc<ConnectionHandle>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.handle.mark_inactive();
        self.sessions.release(&self.handle);
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C, A>(
    conn: C,
    state: Arc<ServerState<A>>,
) -> Result<(), SectorError>
where
    C: Connection<Error = TransportError>,
    A: Authenticator,
{
    let conn = Arc::new(conn);
    let result = serve(&conn, &state).await;
    if let Err(e) = conn.close().await {
        debug!(conn_id = %conn.id(), error = %e, "close failed");
    }
    result
}

async fn serve<C, A>(conn: &Arc<C>, state: &Arc<ServerState<A>>) -> Result<(), SectorError>
where
    C: Connection<Error = TransportError>,
    A: Authenticator,
{
    let conn_id = conn.id();
    debug!(%conn_id, "handling new connection");

    // --- Step 1: ENTR ---
    let player = tokio::time::timeout(state.handshake_timeout, perform_handshake(&**conn, state))
        .await
        .map_err(|_| SectorError::HandshakeTimeout)??;
    info!(%conn_id, %player, "player authenticated");

    // --- Step 2: take the slot ---
    let (handle, outbox) = ConnectionHandle::new(conn_id, player);
    state.sessions.acquire(Arc::clone(&handle));
    let _guard = SessionGuard {
        sessions: Arc::clone(&state.sessions),
        handle: Arc::clone(&handle),
    };

    // --- Step 3: character ---
    if !state.roster.exists(player) {
        send_direct(&**conn, &state.codec, &ServerPacket::NoCharacter).await?;
        let mut closed = outbox.closed.clone();
        let (name, portrait) = tokio::select! {
            _ = closed.changed() => {
                info!(%player, %conn_id, "superseded before character creation");
                return Ok(());
            }
            character = tokio::time::timeout(
                state.handshake_timeout,
                await_character(&**conn, state),
            ) => character.map_err(|_| SectorError::HandshakeTimeout)??,
        };
        let creation = state.roster.create(player, name, portrait);
        debug!(%player, new = creation.is_new(), "character ready");
        // Posted even when another connection won the race: placement is
        // idempotent and this keeps it ahead of our info request.
        state
            .scheduler
            .post_special(Special::CreatePlayer(creation.profile().clone()));
    }

    // --- Step 4: enter the game ---
    send_direct(&**conn, &state.codec, &ServerPacket::Game).await?;
    let writer = tokio::spawn(write_loop(
        Arc::clone(conn),
        Arc::clone(&handle),
        outbox.packets,
        state.codec,
    ));
    state.scheduler.post_special(Special::BasicInfoRequest(player));

    // --- Step 5: packet loop ---
    let result = read_loop(&**conn, state, &handle, outbox.closed).await;

    handle.mark_inactive();
    writer.abort();
    result
}

/// Receives `ENTR` and checks the password. Returns the player slot.
async fn perform_handshake<C, A>(conn: &C, state: &ServerState<A>) -> Result<PlayerId, SectorError>
where
    C: Connection<Error = TransportError>,
    A: Authenticator,
{
    let inbound = recv_packet(conn, &state.codec).await?;
    let (password, player) = match inbound.packet {
        ClientPacket::Enter { password, player } => (password, player),
        other => {
            return Err(ProtocolError::InvalidMessage(format!(
                "first packet must be ENTR, got {}",
                other.kind()
            ))
            .into());
        }
    };
    // A failed check closes the connection without a reply.
    state.auth.authenticate(player, &password).await?;
    Ok(player)
}

/// Waits for `MYPC` after `NOPC`.
async fn await_character<C, A>(conn: &C, state: &ServerState<A>) -> Result<(String, u8), SectorError>
where
    C: Connection<Error = TransportError>,
    A: Authenticator,
{
    let inbound = recv_packet(conn, &state.codec).await?;
    match inbound.packet {
        ClientPacket::MyCharacter { name, portrait } => Ok((name, portrait)),
        other => Err(ProtocolError::InvalidMessage(format!(
            "expected MYPC, got {}",
            other.kind()
        ))
        .into()),
    }
}

async fn read_loop<C, A>(
    conn: &C,
    state: &ServerState<A>,
    handle: &ConnectionHandle,
    mut closed: watch::Receiver<bool>,
) -> Result<(), SectorError>
where
    C: Connection<Error = TransportError>,
    A: Authenticator,
{
    let player = handle.player();
    loop {
        let frame = tokio::select! {
            _ = closed.changed() => {
                info!(%player, conn_id = %handle.id(), "connection superseded or closed by server");
                return Ok(());
            }
            received = tokio::time::timeout(state.idle_timeout, conn.recv()) => match received {
                Ok(Ok(Some(frame))) => frame,
                Ok(Ok(None)) => {
                    info!(%player, "connection closed cleanly");
                    return Ok(());
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    info!(%player, "connection timed out");
                    return Ok(());
                }
            },
        };

        let inbound = state.codec.decode(&frame)?;
        match inbound.packet {
            ClientPacket::Enter { .. } | ClientPacket::MyCharacter { .. } => {
                return Err(ProtocolError::InvalidMessage(format!(
                    "{} after initialisation",
                    inbound.packet.kind()
                ))
                .into());
            }
            ClientPacket::Goodbye => {
                info!(%player, "client said goodbye");
                return Ok(());
            }
            ClientPacket::Ping => {
                handle.send(ServerPacket::Pong);
            }
            _ => {
                if !state.scheduler.post_packet(player, inbound) {
                    debug!(%player, "world loop is shutting down, dropping packet");
                }
            }
        }
    }
}

/// Drains the outbound queue onto the wire, in order.
async fn write_loop<C>(
    conn: Arc<C>,
    handle: Arc<ConnectionHandle>,
    mut packets: mpsc::UnboundedReceiver<ServerPacket>,
    codec: BinaryCodec,
) where
    C: Connection<Error = TransportError>,
{
    while let Some(packet) = packets.recv().await {
        let frame = match codec.encode(&packet) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(player = %handle.player(), error = %e, kind = %packet.kind(), "dropping unencodable packet");
                continue;
            }
        };
        if let Err(e) = conn.send(&frame).await {
            debug!(player = %handle.player(), error = %e, "send failed, closing");
            // Unblocks the reader too.
            handle.force_close();
            break;
        }
    }
}

async fn recv_packet<C>(conn: &C, codec: &BinaryCodec) -> Result<Inbound, SectorError>
where
    C: Connection<Error = TransportError>,
{
    match conn.recv().await? {
        Some(frame) => Ok(codec.decode(&frame)?),
        None => Err(TransportError::ConnectionClosed("closed during handshake".into()).into()),
    }
}

async fn send_direct<C>(conn: &C, codec: &BinaryCodec, packet: &ServerPacket) -> Result<(), SectorError>
where
    C: Connection<Error = TransportError>,
{
    let frame = codec.encode(packet)?;
    conn.send(&frame).await?;
    Ok(())
}
