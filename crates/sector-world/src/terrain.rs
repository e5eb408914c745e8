//! Terrain grid.

use serde::{Deserialize, Serialize};

use crate::{Position, WorldError};

/// Default grid width.
pub const DEFAULT_WIDTH: u32 = 512;
/// Default grid height.
pub const DEFAULT_HEIGHT: u32 = 768;

/// Tile codes as stored in map files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tile {
    Nothing = 0,
    Grassland = 1,
    Water = 2,
    Mountain = 3,
    Sand = 4,
    Forest = 5,
    RockyRoad = 6,
    DirtRoad = 7,
    StoneWall = 8,
    WoodFloor = 9,
}

impl Tile {
    /// Decodes a raw tile byte. Unknown codes read as [`Tile::Nothing`].
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Grassland,
            2 => Self::Water,
            3 => Self::Mountain,
            4 => Self::Sand,
            5 => Self::Forest,
            6 => Self::RockyRoad,
            7 => Self::DirtRoad,
            8 => Self::StoneWall,
            9 => Self::WoodFloor,
            _ => Self::Nothing,
        }
    }

    /// Mobs cannot stand on blocking tiles.
    pub fn is_blocking(self) -> bool {
        matches!(
            self,
            Self::Nothing | Self::Water | Self::Mountain | Self::StoneWall
        )
    }
}

/// Fixed W×H grid of tile codes, row-major.
#[derive(Debug, Clone)]
pub struct Terrain {
    width: u32,
    height: u32,
    tiles: Vec<u8>,
}

impl Terrain {
    /// A grid filled with one tile.
    pub fn filled(width: u32, height: u32, tile: Tile) -> Self {
        Self {
            width,
            height,
            tiles: vec![tile as u8; width as usize * height as usize],
        }
    }

    /// Wraps raw tile bytes. Fails if the length doesn't match.
    pub fn from_tiles(width: u32, height: u32, tiles: Vec<u8>) -> Result<Self, WorldError> {
        let expected = width as usize * height as usize;
        if tiles.len() != expected {
            return Err(WorldError::InvalidMap(format!(
                "terrain has {} tiles, expected {width}x{height} = {expected}",
                tiles.len()
            )));
        }
        Ok(Self {
            width,
            height,
            tiles,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && (pos.x as u32) < self.width
            && (pos.y as u32) < self.height
    }

    /// Tile at `pos`, or `None` off the grid.
    pub fn tile(&self, pos: Position) -> Option<Tile> {
        if !self.in_bounds(pos) {
            return None;
        }
        let idx = pos.x as usize + pos.y as usize * self.width as usize;
        self.tiles.get(idx).copied().map(Tile::from_code)
    }

    /// `true` when `pos` is off the grid or on a blocking tile.
    pub fn blocks(&self, pos: Position) -> bool {
        self.tile(pos).is_none_or(Tile::is_blocking)
    }

    /// Overwrites one tile. No-op off the grid.
    pub fn set(&mut self, pos: Position, tile: Tile) {
        if self.in_bounds(pos) {
            let idx = pos.x as usize + pos.y as usize * self.width as usize;
            self.tiles[idx] = tile as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_set() {
        let blocking: Vec<u8> = (0..10u8)
            .filter(|c| Tile::from_code(*c).is_blocking())
            .collect();
        assert_eq!(blocking, vec![0, 2, 3, 8]);
    }

    #[test]
    fn test_off_grid_blocks() {
        let t = Terrain::filled(4, 4, Tile::Grassland);
        assert!(t.blocks(Position::new(-1, 0)));
        assert!(t.blocks(Position::new(0, 4)));
        assert!(!t.blocks(Position::new(3, 3)));
    }

    #[test]
    fn test_from_tiles_checks_length() {
        assert!(Terrain::from_tiles(2, 2, vec![1; 3]).is_err());
        let mut t = Terrain::from_tiles(2, 2, vec![1; 4]).unwrap();
        t.set(Position::new(1, 1), Tile::Water);
        assert_eq!(t.tile(Position::new(1, 1)), Some(Tile::Water));
        assert!(t.blocks(Position::new(1, 1)));
    }
}
