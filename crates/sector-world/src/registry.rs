//! Identity → entity tables.

use std::collections::HashMap;
use std::sync::Arc;

use sector_protocol::{EntityId, PlayerId};

use crate::{Entity, IdAllocator, Item, Mob, WorldError};

/// Owns every item and mob, keyed by the identity assigned at registration.
///
/// Destroying an item rebinds its identity to the sentinel but keeps the
/// entry, so stale references resolve to "does not exist" instead of
/// dangling.
#[derive(Debug)]
pub struct EntityRegistry {
    ids: Arc<IdAllocator>,
    items: HashMap<EntityId, Item>,
    mobs: HashMap<EntityId, Mob>,
}

impl EntityRegistry {
    pub fn new(ids: Arc<IdAllocator>) -> Self {
        Self {
            ids,
            items: HashMap::new(),
            mobs: HashMap::new(),
        }
    }

    /// The shared allocator.
    pub fn ids(&self) -> &Arc<IdAllocator> {
        &self.ids
    }

    /// Assigns a fresh identity and stores the item.
    pub fn register_item(&mut self, mut item: Item) -> EntityId {
        let id = self.ids.next_entity();
        item.id = id;
        self.items.insert(id, item);
        id
    }

    /// Assigns a fresh identity and stores the mob.
    pub fn register_mob(&mut self, mut mob: Mob) -> EntityId {
        let id = self.ids.next_entity();
        mob.id = id;
        self.mobs.insert(id, mob);
        id
    }

    /// Stores a player's avatar under the player's slot id.
    pub fn insert_player(&mut self, player: PlayerId, mut mob: Mob) -> Result<EntityId, WorldError> {
        let id = player.entity_id();
        if self.mobs.contains_key(&id) {
            return Err(WorldError::DuplicatePlayer(player));
        }
        mob.id = id;
        self.mobs.insert(id, mob);
        Ok(id)
    }

    /// A live item.
    pub fn item(&self, id: EntityId) -> Option<&Item> {
        self.items.get(&id).filter(|i| i.id().is_some())
    }

    pub fn item_mut(&mut self, id: EntityId) -> Option<&mut Item> {
        self.items.get_mut(&id).filter(|i| i.id().is_some())
    }

    /// A live mob.
    pub fn mob(&self, id: EntityId) -> Option<&Mob> {
        self.mobs.get(&id).filter(|m| m.id().is_some())
    }

    pub fn mob_mut(&mut self, id: EntityId) -> Option<&mut Mob> {
        self.mobs.get_mut(&id).filter(|m| m.id().is_some())
    }

    pub fn is_live_item(&self, id: EntityId) -> bool {
        self.item(id).is_some()
    }

    pub fn is_live_mob(&self, id: EntityId) -> bool {
        self.mob(id).is_some()
    }

    /// Tombstones an item. Returns its last position.
    pub fn destroy_item(&mut self, id: EntityId) -> Option<Option<crate::Position>> {
        let item = self.item_mut(id)?;
        item.id = EntityId::NONE;
        Some(item.position.take())
    }

    /// Live items, in no particular order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values().filter(|i| i.id().is_some())
    }

    pub fn mob_count(&self) -> usize {
        self.mobs.len()
    }
}
