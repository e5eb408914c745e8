//! `SectorServer` builder and server loop.
//!
//! This is the entry point for running an Arcane Sector server. It ties
//! together all the layers: transport → protocol → session → world loop.

use std::net::SocketAddr;
use std::sync::Arc;

use sector_protocol::BinaryCodec;
use sector_scheduler::{Scheduler, SchedulerHandle};
use sector_session::{
    Authenticator, CharacterRoster, PasswordAuthenticator, SessionBridge, SessionChange,
};
use sector_transport::{TcpConnection, TcpTransport, Transport};
use sector_world::{DEFAULT_HEIGHT, DEFAULT_WIDTH, IdAllocator, MapFile, Terrain, Tile, World};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::SectorError;
use crate::config::ServerConfig;
use crate::game::{Game, GameSettings, Special};
use crate::handler::{ServerState, handle_connection};

/// Builder for configuring and starting a server.
///
/// # Example
///
/// ```rust,ignore
/// use sector::prelude::*;
///
/// let config = ServerConfig::load("sector.json")?;
/// let auth = config.authenticator()?;
/// let server = SectorServer::builder().config(config).build(auth).await?;
/// server.run().await
/// ```
#[derive(Debug, Default)]
pub struct SectorServerBuilder {
    config: ServerConfig,
}

impl SectorServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the TCP address to bind to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Loads the world, binds the listeners and starts the world loop.
    pub async fn build<A: Authenticator>(self, auth: A) -> Result<SectorServer<A>, SectorError> {
        let config = self.config.validated();

        let ids = Arc::new(IdAllocator::default());
        let world = match &config.map {
            Some(path) => {
                let map = MapFile::load(path)?;
                tracing::info!(path = %path.display(), items = map.items.len(), spawners = map.spawners.len(), "map loaded");
                World::from_map(&map, ids)?
            }
            None => {
                tracing::info!("no map configured, using open grassland");
                World::new(
                    Terrain::filled(DEFAULT_WIDTH, DEFAULT_HEIGHT, Tile::Grassland),
                    ids,
                )
            }
        };

        let transport = TcpTransport::bind(&config.bind)
            .await?
            .with_max_payload(config.max_frame_size);

        #[cfg(feature = "websocket")]
        let websocket = match &config.websocket_bind {
            Some(addr) => Some(
                sector_transport::WebSocketTransport::bind(addr)
                    .await?
                    .with_max_payload(config.max_frame_size),
            ),
            None => None,
        };
        #[cfg(not(feature = "websocket"))]
        if config.websocket_bind.is_some() {
            tracing::warn!("websocket_bind is set but the websocket feature is disabled");
        }

        let (scheduler, events) = sector_scheduler::channel::<Special>();
        let notify = scheduler.clone();
        let sessions = Arc::new(SessionBridge::new(move |change: SessionChange| {
            notify.post_special(Special::from(change));
        }));

        let game = Game::new(world, Arc::clone(&sessions), GameSettings::from(&config));
        let world_task = tokio::spawn(Scheduler::new(game, events, config.scheduler()).run());
        scheduler.post_special(Special::Spawners);

        let state = Arc::new(ServerState {
            auth,
            codec: BinaryCodec::with_max_payload(config.max_frame_size),
            sessions,
            roster: Arc::new(CharacterRoster::new()),
            scheduler: scheduler.clone(),
            handshake_timeout: config.handshake_timeout(),
            idle_timeout: config.idle_timeout(),
        });

        let (shutdown, _) = watch::channel(false);
        Ok(SectorServer {
            transport,
            #[cfg(feature = "websocket")]
            websocket,
            state,
            scheduler,
            world_task,
            shutdown: Arc::new(shutdown),
        })
    }
}

/// Stops a running server from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Asks the server to stop. Idempotent.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// A built server, bound and with its world loop running.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct SectorServer<A: Authenticator> {
    transport: TcpTransport,
    #[cfg(feature = "websocket")]
    websocket: Option<sector_transport::WebSocketTransport>,
    state: Arc<ServerState<A>>,
    scheduler: SchedulerHandle<Special>,
    world_task: JoinHandle<Game>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl SectorServer<PasswordAuthenticator> {
    /// Creates a new builder.
    ///
    /// Lives on the concrete type so `SectorServer::builder()` needs no
    /// annotation; [`SectorServerBuilder::build`] picks the real
    /// authenticator.
    pub fn builder() -> SectorServerBuilder {
        SectorServerBuilder::new()
    }
}

impl<A: Authenticator> SectorServer<A> {
    /// Returns the local TCP address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns the WebSocket listener address, if one is configured.
    #[cfg(feature = "websocket")]
    pub fn websocket_addr(&self) -> Option<std::io::Result<SocketAddr>> {
        self.websocket.as_ref().map(|ws| ws.local_addr())
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown),
        }
    }

    /// Runs the accept loop until shutdown is requested, then closes
    /// every session and waits for the world loop to drain.
    pub async fn run(self) -> Result<(), SectorError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Arcane Sector server running");

        #[cfg(feature = "websocket")]
        let ws_task = self.websocket.map(|ws| {
            let state = Arc::clone(&self.state);
            tokio::spawn(accept_loop(
                ws,
                self.shutdown.subscribe(),
                move |conn: sector_transport::WebSocketConnection| {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            log_connection_end(&e);
                        }
                    });
                },
            ))
        });

        let state = Arc::clone(&self.state);
        accept_loop(
            self.transport,
            self.shutdown.subscribe(),
            move |conn: TcpConnection| {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(conn, state).await {
                        log_connection_end(&e);
                    }
                });
            },
        )
        .await;

        #[cfg(feature = "websocket")]
        if let Some(task) = ws_task {
            let _ = task.await;
        }

        tracing::info!("shutting down");
        self.state.sessions.close_all();
        self.scheduler.shutdown();
        match self.world_task.await {
            Ok(game) => {
                tracing::info!(mobs = game.world().registry().mob_count(), "world loop stopped");
            }
            Err(e) => tracing::error!(error = %e, "world loop task failed"),
        }
        Ok(())
    }
}

/// Accepts until the shutdown flag flips, handing each connection to
/// `spawn`.
async fn accept_loop<T, F>(mut transport: T, mut shutdown: watch::Receiver<bool>, spawn: F)
where
    T: Transport,
    F: Fn(T::Connection),
{
    loop {
        if *shutdown.borrow_and_update() {
            break;
        }
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            accepted = transport.accept() => match accepted {
                Ok(conn) => spawn(conn),
                Err(e) => tracing::error!(error = %e, "accept failed"),
            },
        }
    }
}

fn log_connection_end(e: &SectorError) {
    if e.is_expected() {
        tracing::debug!(error = %e, "connection ended");
    } else {
        tracing::warn!(error = %e, "connection ended with error");
    }
}
