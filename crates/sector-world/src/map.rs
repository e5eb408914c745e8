//! JSON map files.
//!
//! ```json
//! {
//!   "width": 512, "height": 768,
//!   "fill": "grassland",
//!   "terrain": null,
//!   "items": [{"x": 186, "y": 428, "kind": {"type": "sign", "text": "Hi"}}],
//!   "spawners": [{"x": 190, "y": 430, "item": "herb", "cooldown_secs": 60}]
//! }
//! ```
//!
//! `terrain`, when present, is the full row-major tile code array and wins
//! over `fill`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::terrain::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::{ItemKind, Position, Terrain, Tile, WorldError};

/// A map file as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapFile {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Tile used for every cell when `terrain` is absent.
    #[serde(default = "default_fill")]
    pub fill: Tile,
    #[serde(default)]
    pub terrain: Option<Vec<u8>>,
    #[serde(default)]
    pub items: Vec<MapItem>,
    #[serde(default)]
    pub spawners: Vec<SpawnerSpec>,
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

fn default_fill() -> Tile {
    Tile::Grassland
}

impl Default for MapFile {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fill: Tile::Grassland,
            terrain: None,
            items: Vec::new(),
            spawners: Vec::new(),
        }
    }
}

/// A pre-placed item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapItem {
    pub x: i32,
    pub y: i32,
    pub kind: ItemKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub gfx_id: Option<String>,
    #[serde(default)]
    pub blocking: bool,
    #[serde(default)]
    pub movable: Option<bool>,
}

/// What a spawner produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnItem {
    Herb,
    TeleportRing,
}

/// A cell that periodically receives a fresh item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnerSpec {
    pub x: i32,
    pub y: i32,
    pub item: SpawnItem,
    #[serde(default)]
    pub cooldown_secs: u64,
}

impl SpawnerSpec {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl MapFile {
    /// Reads and parses a map file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WorldError> {
        let raw = std::fs::read_to_string(path)?;
        let map: MapFile = serde_json::from_str(&raw)?;
        Ok(map)
    }

    /// Builds the terrain grid.
    pub fn terrain(&self) -> Result<Terrain, WorldError> {
        if self.width == 0 || self.height == 0 {
            return Err(WorldError::InvalidMap("empty grid".into()));
        }
        match &self.terrain {
            Some(tiles) => Terrain::from_tiles(self.width, self.height, tiles.clone()),
            None => Ok(Terrain::filled(self.width, self.height, self.fill)),
        }
    }
}
