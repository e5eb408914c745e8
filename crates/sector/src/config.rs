//! Server configuration: a JSON file with defaults for every field.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sector_protocol::{Direction, PlayerId};
use sector_scheduler::SchedulerConfig;
use sector_session::{PasswordAuthenticator, SessionError};
use sector_world::Position;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::SectorError;

/// Where new characters appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartPosition {
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
}

impl StartPosition {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

impl Default for StartPosition {
    fn default() -> Self {
        Self {
            x: 185,
            y: 428,
            direction: Direction::West,
        }
    }
}

/// Everything the server reads at startup.
///
/// Every field has a default, so `{}` is a valid config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP listen address.
    pub bind: String,
    /// Optional WebSocket listen address (needs the `websocket` feature).
    pub websocket_bind: Option<String>,
    /// Hex SHA-256 password digest per player slot. The index is the
    /// slot; an empty string leaves the slot locked.
    pub password_hashes: Vec<String>,
    /// JSON map file. Without one the world is plain grassland.
    pub map: Option<PathBuf>,
    /// Drop a connection that sends nothing for this long.
    pub idle_timeout_secs: u64,
    /// Time allowed for `ENTR` (and `MYPC`) after connecting.
    pub handshake_timeout_secs: u64,
    /// Largest accepted client payload.
    pub max_frame_size: u32,
    /// How long a select interaction waits for `THIS`.
    pub select_timeout_secs: u64,
    /// Pause between spawner passes.
    pub spawner_interval_secs: u64,
    /// A world-loop dispatch slower than this is logged.
    pub slow_dispatch_warn_ms: u64,
    pub start_position: StartPosition,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:1337".to_string(),
            websocket_bind: None,
            password_hashes: Vec::new(),
            map: None,
            idle_timeout_secs: 120,
            handshake_timeout_secs: 30,
            max_frame_size: sector_transport::DEFAULT_MAX_PAYLOAD,
            select_timeout_secs: 60,
            spawner_interval_secs: 30,
            slow_dispatch_warn_ms: 50,
            start_position: StartPosition::default(),
        }
    }
}

impl ServerConfig {
    /// Most player slots the `ENTR` byte can address.
    pub const MAX_PLAYERS: usize = 256;
    /// Upper bound for `max_frame_size`.
    pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

    /// Reads a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SectorError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Fixes out-of-range values.
    ///
    /// - Zero timeouts and intervals become 1 second.
    /// - `max_frame_size` clamped to `1..=MAX_FRAME_SIZE`.
    /// - `password_hashes` truncated to [`Self::MAX_PLAYERS`].
    pub fn validated(mut self) -> Self {
        for (name, value) in [
            ("idle_timeout_secs", &mut self.idle_timeout_secs),
            ("handshake_timeout_secs", &mut self.handshake_timeout_secs),
            ("select_timeout_secs", &mut self.select_timeout_secs),
            ("spawner_interval_secs", &mut self.spawner_interval_secs),
        ] {
            if *value == 0 {
                warn!(setting = name, "zero interval, using 1 second");
                *value = 1;
            }
        }
        if self.max_frame_size == 0 || self.max_frame_size > Self::MAX_FRAME_SIZE {
            let clamped = self.max_frame_size.clamp(1, Self::MAX_FRAME_SIZE);
            warn!(
                requested = self.max_frame_size,
                clamped, "max_frame_size out of range, clamping"
            );
            self.max_frame_size = clamped;
        }
        if self.password_hashes.len() > Self::MAX_PLAYERS {
            warn!(
                configured = self.password_hashes.len(),
                max = Self::MAX_PLAYERS,
                "too many password hashes, ignoring the rest"
            );
            self.password_hashes.truncate(Self::MAX_PLAYERS);
        }
        self
    }

    /// Password table for the `ENTR` check.
    pub fn authenticator(&self) -> Result<PasswordAuthenticator, SessionError> {
        PasswordAuthenticator::from_digests(
            self.password_hashes
                .iter()
                .enumerate()
                .filter(|(_, digest)| !digest.is_empty())
                .filter_map(|(slot, digest)| {
                    u8::try_from(slot).ok().map(|s| (PlayerId(s), digest.as_str()))
                }),
        )
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn select_timeout(&self) -> Duration {
        Duration::from_secs(self.select_timeout_secs)
    }

    pub fn spawner_interval(&self) -> Duration {
        Duration::from_secs(self.spawner_interval_secs)
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            slow_dispatch_warn: Duration::from_millis(self.slow_dispatch_warn_ms),
            ..SchedulerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use sector_session::{Authenticator, sha256_hex};

    use super::*;

    #[test]
    fn test_empty_object_gives_defaults() {
        let cfg: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, ServerConfig::default());
        assert_eq!(cfg.bind, "127.0.0.1:1337");
        assert_eq!(cfg.select_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.start_position.position(), Position::new(185, 428));
        assert_eq!(cfg.start_position.direction, Direction::West);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"bind": "0.0.0.0:4000", "select_timeout_secs": 5,
                "start_position": {{"x": 1, "y": 2, "direction": "north"}}}}"#
        )
        .unwrap();
        let cfg = ServerConfig::load(file.path()).unwrap();
        assert_eq!(cfg.bind, "0.0.0.0:4000");
        assert_eq!(cfg.select_timeout_secs, 5);
        assert_eq!(cfg.start_position.direction, Direction::North);
        assert_eq!(cfg.idle_timeout_secs, 120);
    }

    #[test]
    fn test_load_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            ServerConfig::load(file.path()),
            Err(SectorError::Config(_))
        ));
        assert!(matches!(
            ServerConfig::load("/definitely/not/here.json"),
            Err(SectorError::Io(_))
        ));
    }

    #[test]
    fn test_validated_clamps() {
        let cfg = ServerConfig {
            idle_timeout_secs: 0,
            select_timeout_secs: 0,
            max_frame_size: u32::MAX,
            password_hashes: vec![String::new(); 300],
            ..ServerConfig::default()
        }
        .validated();
        assert_eq!(cfg.idle_timeout_secs, 1);
        assert_eq!(cfg.select_timeout_secs, 1);
        assert_eq!(cfg.max_frame_size, ServerConfig::MAX_FRAME_SIZE);
        assert_eq!(cfg.password_hashes.len(), ServerConfig::MAX_PLAYERS);
    }

    #[tokio::test]
    async fn test_authenticator_skips_empty_slots() {
        let cfg = ServerConfig {
            password_hashes: vec![String::new(), sha256_hex(b"secret")],
            ..ServerConfig::default()
        };
        let auth = cfg.authenticator().unwrap();
        assert_eq!(auth.len(), 1);
        assert!(auth.authenticate(PlayerId(1), b"secret").await.is_ok());
        assert!(auth.authenticate(PlayerId(0), b"").await.is_err());
    }
}
