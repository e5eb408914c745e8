//! The world: terrain, entity tables and the spatial index kept in step.

use std::sync::Arc;

use sector_protocol::{EntityId, PlayerId};
use tokio::time::Instant;
use tracing::debug;

use crate::{
    CellLayer, Entity, EntityRegistry, IdAllocator, Item, ItemKind, MapFile,
    Mob, Position, SpatialIndex, SpawnerSpec, Terrain, WorldError,
};

/// A spawner plus when it last fired.
#[derive(Debug, Clone)]
pub struct Spawner {
    pub spec: SpawnerSpec,
    pub last: Option<Instant>,
}

impl Spawner {
    /// Whether the cooldown has elapsed at `now`.
    pub fn is_ready(&self, now: Instant) -> bool {
        self.last
            .is_none_or(|last| now >= last + self.spec.cooldown())
    }
}

/// All world state. Owned by the scheduler task; never shared.
#[derive(Debug)]
pub struct World {
    terrain: Terrain,
    spatial: SpatialIndex,
    registry: EntityRegistry,
    spawners: Vec<Spawner>,
}

impl World {
    /// An empty world over `terrain`.
    pub fn new(terrain: Terrain, ids: Arc<IdAllocator>) -> Self {
        Self {
            terrain,
            spatial: SpatialIndex::new(),
            registry: EntityRegistry::new(ids),
            spawners: Vec::new(),
        }
    }

    /// Builds a world from a parsed map: registers and places every item.
    pub fn from_map(map: &MapFile, ids: Arc<IdAllocator>) -> Result<Self, WorldError> {
        let mut world = Self::new(map.terrain()?, ids);
        for spec in &map.items {
            let mut item = Item::new(spec.kind.clone()).blocking(spec.blocking);
            if let Some(name) = &spec.name {
                item = item.with_name(name.clone());
            }
            if let Some(gfx) = &spec.gfx_id {
                item = item.with_gfx(gfx.clone());
            }
            if let Some(movable) = spec.movable {
                item = item.movable(movable);
            }
            world.spawn_item(item, Position::new(spec.x, spec.y));
        }
        world.spawners = map
            .spawners
            .iter()
            .map(|spec| Spawner {
                spec: spec.clone(),
                last: None,
            })
            .collect();
        debug!(
            items = map.items.len(),
            spawners = map.spawners.len(),
            "world loaded from map"
        );
        Ok(world)
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    pub fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    pub fn spawners_mut(&mut self) -> &mut [Spawner] {
        &mut self.spawners
    }

    pub fn item(&self, id: EntityId) -> Option<&Item> {
        self.registry.item(id)
    }

    pub fn item_mut(&mut self, id: EntityId) -> Option<&mut Item> {
        self.registry.item_mut(id)
    }

    pub fn mob(&self, id: EntityId) -> Option<&Mob> {
        self.registry.mob(id)
    }

    pub fn mob_mut(&mut self, id: EntityId) -> Option<&mut Mob> {
        self.registry.mob_mut(id)
    }

    /// A player's avatar, if the character exists.
    pub fn player(&self, player: PlayerId) -> Option<&Mob> {
        self.registry.mob(player.entity_id())
    }

    pub fn player_mut(&mut self, player: PlayerId) -> Option<&mut Mob> {
        self.registry.mob_mut(player.entity_id())
    }

    // -- Items --------------------------------------------------------------

    /// Registers `item` and puts it on the ground at `pos`.
    pub fn spawn_item(&mut self, item: Item, pos: Position) -> EntityId {
        let id = self.registry.register_item(item);
        self.drop_item(id, pos);
        id
    }

    /// Registers `item` without placing it (inventory content).
    pub fn create_item(&mut self, item: Item) -> EntityId {
        self.registry.register_item(item)
    }

    /// Puts a live item on the ground at `pos`.
    pub fn drop_item(&mut self, id: EntityId, pos: Position) {
        if let Some(item) = self.registry.item_mut(id) {
            item.position = Some(pos);
            self.spatial.insert(CellLayer::Items, id, Some(pos));
        }
    }

    /// Takes an item off the ground. Its position becomes unset.
    pub fn pick_up_item(&mut self, id: EntityId) {
        if let Some(item) = self.registry.item_mut(id) {
            let pos = item.position.take();
            self.spatial.remove(CellLayer::Items, id, pos);
        }
    }

    /// Destroys an item in place. The cell entry is dropped lazily.
    pub fn destroy_item(&mut self, id: EntityId) -> bool {
        self.registry.destroy_item(id).is_some()
    }

    /// Live items on one cell.
    pub fn items_at(&mut self, pos: Position) -> Vec<EntityId> {
        let registry = &self.registry;
        self.spatial
            .at(CellLayer::Items, pos, |id| registry.is_live_item(id))
    }

    /// Every live door of `group`, with its position.
    pub fn doors(&self, group: u32) -> Vec<(EntityId, Position)> {
        let mut doors: Vec<_> = self
            .registry
            .items()
            .filter(|i| i.kind == ItemKind::Door { group })
            .filter_map(|i| i.position().map(|p| (i.id(), p)))
            .collect();
        doors.sort_by_key(|(id, _)| *id);
        doors
    }

    // -- Mobs ---------------------------------------------------------------

    /// Registers a creature and places it if it has a position.
    pub fn spawn_mob(&mut self, mob: Mob) -> EntityId {
        let pos = mob.position();
        let id = self.registry.register_mob(mob);
        self.spatial.insert(CellLayer::Mobs, id, pos);
        id
    }

    /// Installs a player's avatar and places it.
    pub fn add_player(&mut self, player: PlayerId, mob: Mob) -> Result<EntityId, WorldError> {
        let pos = mob.position();
        let id = self.registry.insert_player(player, mob)?;
        self.spatial.insert(CellLayer::Mobs, id, pos);
        Ok(id)
    }

    /// Inserts a mob into the index at its current position.
    ///
    /// Returns the position, or `None` when the mob is unknown or unplaced.
    pub fn index_mob(&mut self, id: EntityId) -> Option<Position> {
        let pos = self.registry.mob(id)?.position()?;
        self.spatial.insert(CellLayer::Mobs, id, Some(pos));
        Some(pos)
    }

    /// Removes a mob from the index but keeps its position.
    pub fn unindex_mob(&mut self, id: EntityId) -> Option<Position> {
        let pos = self.registry.mob(id)?.position()?;
        self.spatial.remove(CellLayer::Mobs, id, Some(pos));
        Some(pos)
    }

    /// Moves a mob: remove from the old cell, update, reinsert.
    pub fn move_mob(&mut self, id: EntityId, to: Position) -> Result<Position, WorldError> {
        let mob = self.registry.mob_mut(id).ok_or(WorldError::NotFound(id))?;
        let from = mob.position.replace(to);
        self.spatial.relocate(CellLayer::Mobs, id, from, Some(to));
        Ok(from.unwrap_or(to))
    }

    /// Live mobs within `radius` of `center`.
    pub fn mobs_near(
        &self,
        center: Position,
        radius: i32,
        exclude: Option<EntityId>,
    ) -> Vec<EntityId> {
        self.entities_near(CellLayer::Mobs, center, radius, exclude)
    }

    /// Live entities of one layer within `radius` of `center`.
    pub fn entities_near(
        &self,
        layer: CellLayer,
        center: Position,
        radius: i32,
        exclude: Option<EntityId>,
    ) -> Vec<EntityId> {
        self.spatial
            .near(layer, center, radius, exclude)
            .into_iter()
            .filter(|&id| match layer {
                CellLayer::Items => self.registry.is_live_item(id),
                CellLayer::Mobs => self.registry.is_live_mob(id),
            })
            .collect()
    }
}
