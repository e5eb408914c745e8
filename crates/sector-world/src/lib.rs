//! World state for the Arcane Sector server.
//!
//! Everything here is owned by the scheduler task and mutated only from it,
//! except the [`IdAllocator`], which is shared with connection tasks.
//!
//! # Key types
//!
//! - [`World`]: terrain, entity tables and spatial index kept in step
//! - [`EntityRegistry`]: identity → item/mob tables with tombstoning
//! - [`SpatialIndex`]: per-cell item and mob lists
//! - [`Terrain`] / [`Tile`]: the fixed tile grid
//! - [`MapFile`]: JSON map loading

mod entity;
mod error;
mod ids;
mod map;
mod registry;
mod spatial;
mod terrain;
mod world;

pub use entity::{
    CellLayer, Entity, Item, ItemKind, Mob, MobKind, PlayerState, Position, Slot,
};
pub use error::WorldError;
pub use ids::{FIRST_ID, IdAllocator};
pub use map::{MapFile, MapItem, SpawnItem, SpawnerSpec};
pub use registry::EntityRegistry;
pub use spatial::SpatialIndex;
pub use terrain::{DEFAULT_HEIGHT, DEFAULT_WIDTH, Terrain, Tile};
pub use world::{Spawner, World};
