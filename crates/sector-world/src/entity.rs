//! Items, mobs and the capability they share.

use serde::{Deserialize, Serialize};

use sector_protocol::{
    Direction, EQUIPMENT_SLOTS, EntityId, INVENTORY_SLOTS, ItemView, MobView,
    PlayerId,
};

/// Integer grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// One tile in `direction`.
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.vector();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Squared Euclidean distance.
    pub fn distance_sq(self, other: Position) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        dx * dx + dy * dy
    }

    /// Wire coordinates. Grid positions are never negative or above u16.
    pub fn to_wire(self) -> (u16, u16) {
        (
            u16::try_from(self.x).unwrap_or(0),
            u16::try_from(self.y).unwrap_or(0),
        )
    }
}

/// Which per-cell list an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellLayer {
    Items,
    Mobs,
}

/// Identity plus optional placement, shared by items and mobs.
pub trait Entity {
    /// The entity's identity; [`EntityId::NONE`] once destroyed.
    fn id(&self) -> EntityId;

    /// Grid position, `None` while held or stored.
    fn position(&self) -> Option<Position>;

    /// The spatial layer the entity is indexed in.
    fn layer(&self) -> CellLayer;
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Behaviour attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    /// Nothing special happens on use.
    Plain,
    /// Using it shows the text.
    Sign { text: String },
    /// Stepping on it moves the mob next to another door of the group.
    Door { group: u32 },
    /// Teleports the user to the bound location.
    TeleportRing {
        #[serde(default)]
        binding: Option<Position>,
    },
    /// A collectible herb.
    Herb { index: u8 },
}

/// An item in the world.
#[derive(Debug, Clone)]
pub struct Item {
    pub(crate) id: EntityId,
    pub kind: ItemKind,
    pub movable: bool,
    pub blocking: bool,
    pub gfx_id: String,
    pub name: String,
    pub(crate) position: Option<Position>,
}

const HERB_NAMES: [&str; 14] = [
    "Rele",
    "Drond",
    "Bell Rose",
    "Lady's Oaplow",
    "Magic Mushroom",
    "Skull Vine",
    "Fria",
    "Blue Frog Fruit",
    "Spoglow Mint",
    "Treaffond",
    "Blue Weasel Button",
    "Black Skull",
    "Moon Ephess",
    "Crown Berry",
];

impl Item {
    /// An unregistered item with the kind's default look.
    pub fn new(kind: ItemKind) -> Self {
        // Only two herb looks exist: any rolled index lands on one of them.
        let kind = match kind {
            ItemKind::Herb { index } => ItemKind::Herb {
                index: if index % 2 == 0 { 6 } else { 8 },
            },
            other => other,
        };
        let (movable, gfx_id, name) = match &kind {
            ItemKind::Plain => (true, String::new(), String::new()),
            ItemKind::Sign { .. } => (false, "sign".to_string(), "Sign".to_string()),
            ItemKind::Door { .. } => (false, "door".to_string(), "Door".to_string()),
            ItemKind::TeleportRing { binding } => (
                true,
                "teleport_ring".to_string(),
                ring_name(*binding),
            ),
            ItemKind::Herb { index } => {
                let idx = usize::from(*index);
                (true, format!("herb_{idx}"), HERB_NAMES[idx].to_string())
            }
        };
        Self {
            id: EntityId::NONE,
            kind,
            movable,
            blocking: false,
            gfx_id,
            name,
            position: None,
        }
    }

    /// Builder-style position setter, for items not yet in the index.
    pub fn at(mut self, pos: Position) -> Self {
        self.position = Some(pos);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_gfx(mut self, gfx_id: impl Into<String>) -> Self {
        self.gfx_id = gfx_id.into();
        self
    }

    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    pub fn movable(mut self, movable: bool) -> Self {
        self.movable = movable;
        self
    }

    /// Wire view of this item.
    pub fn view(&self) -> ItemView {
        if self.id.is_none() {
            return ItemView::Missing;
        }
        ItemView::Present {
            id: self.id,
            movable: self.movable,
            gfx_id: self.gfx_id.clone(),
            name: self.name.clone(),
        }
    }

    /// Rebinds a teleport ring and renames it to match.
    pub fn bind_ring(&mut self, binding: Option<Position>) {
        if let ItemKind::TeleportRing { binding: b } = &mut self.kind {
            *b = binding;
            self.name = ring_name(binding);
        }
    }
}

fn ring_name(binding: Option<Position>) -> String {
    match binding {
        Some(p) => format!("Teleport Ring ({}, {})", p.x, p.y),
        None => "Teleport Ring (Unbound)".to_string(),
    }
}

impl Entity for Item {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Option<Position> {
        self.position
    }

    fn layer(&self) -> CellLayer {
        CellLayer::Items
    }
}

// ---------------------------------------------------------------------------
// Mobs
// ---------------------------------------------------------------------------

/// Per-player state carried by a player's mob.
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub player: PlayerId,
    pub portrait: u8,
    pub inventory: [EntityId; INVENTORY_SLOTS],
    pub equipment: [EntityId; EQUIPMENT_SLOTS],
    pub holding: EntityId,
    /// A select interaction is in flight.
    pub selecting: bool,
}

impl PlayerState {
    pub fn new(player: PlayerId, portrait: u8) -> Self {
        Self {
            player,
            portrait,
            inventory: [EntityId::NONE; INVENTORY_SLOTS],
            equipment: [EntityId::NONE; EQUIPMENT_SLOTS],
            holding: EntityId::NONE,
            selecting: false,
        }
    }

    /// Where in the player's own slots `item` is stored, if anywhere.
    pub fn slot_of(&self, item: EntityId) -> Option<Slot> {
        if item.is_none() {
            return None;
        }
        if let Some(i) = self.inventory.iter().position(|&id| id == item) {
            return Some(Slot::Inventory(i));
        }
        self.equipment
            .iter()
            .position(|&id| id == item)
            .map(Slot::Equipment)
    }

    /// Inventory then equipment, in wire order.
    pub fn all_slots(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.inventory.iter().chain(self.equipment.iter()).copied()
    }
}

/// An inventory or equipment slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Inventory(usize),
    Equipment(usize),
}

/// What drives a mob.
#[derive(Debug, Clone)]
pub enum MobKind {
    /// World creature.
    Creature,
    /// A player's avatar.
    Player(Box<PlayerState>),
}

/// A mob in the world.
#[derive(Debug, Clone)]
pub struct Mob {
    pub(crate) id: EntityId,
    pub kind: MobKind,
    pub name: String,
    pub gfx_id: String,
    pub hp: u16,
    pub hp_max: u16,
    pub mana: u16,
    pub mana_max: u16,
    pub visible: bool,
    pub direction: Direction,
    pub(crate) position: Option<Position>,
}

impl Mob {
    /// An unregistered creature.
    pub fn creature(name: impl Into<String>, gfx_id: impl Into<String>) -> Self {
        Self {
            id: EntityId::NONE,
            kind: MobKind::Creature,
            name: name.into(),
            gfx_id: gfx_id.into(),
            hp: 100,
            hp_max: 100,
            mana: 100,
            mana_max: 100,
            visible: true,
            direction: Direction::South,
            position: None,
        }
    }

    /// A fresh player avatar standing at `start`.
    pub fn player(
        player: PlayerId,
        name: impl Into<String>,
        portrait: u8,
        start: Position,
        direction: Direction,
    ) -> Self {
        let gfx = if player.0 % 2 == 0 {
            "3d_mob_drow_f"
        } else {
            "3d_mob_drow_m"
        };
        Self {
            id: player.entity_id(),
            kind: MobKind::Player(Box::new(PlayerState::new(player, portrait))),
            name: name.into(),
            gfx_id: gfx.to_string(),
            hp: 40,
            hp_max: 40,
            mana: 10,
            mana_max: 60,
            visible: true,
            direction,
            position: Some(start),
        }
    }

    pub fn at(mut self, pos: Position) -> Self {
        self.position = Some(pos);
        self
    }

    pub fn player_state(&self) -> Option<&PlayerState> {
        match &self.kind {
            MobKind::Player(p) => Some(p),
            MobKind::Creature => None,
        }
    }

    pub fn player_state_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.kind {
            MobKind::Player(p) => Some(p),
            MobKind::Creature => None,
        }
    }

    /// The owning player, for player avatars.
    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_state().map(|p| p.player)
    }

    /// Wire view of this mob.
    pub fn view(&self) -> MobView {
        let (x, y) = self.position.map(Position::to_wire).unwrap_or_default();
        MobView {
            id: self.id,
            visible: self.visible && self.position.is_some(),
            x,
            y,
            gfx_id: self.gfx_id.clone(),
            name: self.name.clone(),
        }
    }
}

impl Entity for Mob {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Option<Position> {
        self.position
    }

    fn layer(&self) -> CellLayer {
        CellLayer::Mobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unregistered_item_views_as_missing() {
        let item = Item::new(ItemKind::Plain);
        assert_eq!(item.view(), ItemView::Missing);
    }

    #[test]
    fn test_ring_name_follows_binding() {
        let mut ring = Item::new(ItemKind::TeleportRing { binding: None });
        assert_eq!(ring.name, "Teleport Ring (Unbound)");
        ring.bind_ring(Some(Position::new(3, 4)));
        assert_eq!(ring.name, "Teleport Ring (3, 4)");
        assert_eq!(
            ring.kind,
            ItemKind::TeleportRing {
                binding: Some(Position::new(3, 4))
            }
        );
    }

    #[test]
    fn test_herb_index_folds_onto_two_looks() {
        let even = Item::new(ItemKind::Herb { index: 12 });
        assert_eq!(even.kind, ItemKind::Herb { index: 6 });
        assert_eq!((even.gfx_id.as_str(), even.name.as_str()), ("herb_6", "Fria"));

        let odd = Item::new(ItemKind::Herb { index: 3 });
        assert_eq!(odd.kind, ItemKind::Herb { index: 8 });
        assert_eq!((odd.gfx_id.as_str(), odd.name.as_str()), ("herb_8", "Spoglow Mint"));

        // Out-of-table rolls from a map file still land in the table.
        assert_eq!(Item::new(ItemKind::Herb { index: 255 }).name, "Spoglow Mint");
        assert!(Item::new(ItemKind::Herb { index: 0 }).movable);
    }

    #[test]
    fn test_player_defaults() {
        let mob = Mob::player(
            PlayerId(3),
            "Ayla",
            1,
            Position::new(185, 428),
            Direction::West,
        );
        assert_eq!(mob.id(), EntityId(3));
        assert_eq!((mob.hp, mob.hp_max, mob.mana, mob.mana_max), (40, 40, 10, 60));
        assert_eq!(mob.gfx_id, "3d_mob_drow_m");
        let state = mob.player_state().unwrap();
        assert!(state.all_slots().all(EntityId::is_none));
        assert!(state.holding.is_none());
        assert!(!state.selecting);
    }

    #[test]
    fn test_slot_of_finds_inventory_and_equipment() {
        let mut state = PlayerState::new(PlayerId(0), 0);
        state.inventory[2] = EntityId(10);
        state.equipment[1] = EntityId(11);
        assert_eq!(state.slot_of(EntityId(10)), Some(Slot::Inventory(2)));
        assert_eq!(state.slot_of(EntityId(11)), Some(Slot::Equipment(1)));
        assert_eq!(state.slot_of(EntityId::NONE), None);
    }

    #[test]
    fn test_item_kind_json_is_tagged() {
        let kind: ItemKind =
            serde_json::from_str(r#"{"type":"sign","text":"Welcome"}"#).unwrap();
        assert_eq!(
            kind,
            ItemKind::Sign {
                text: "Welcome".into()
            }
        );
    }
}
