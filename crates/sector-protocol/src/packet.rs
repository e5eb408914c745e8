//! Packet sum types: one variant per message kind.
//!
//! Decoding goes straight from the header tag to the matching variant, so
//! there is never a half-built "generic" packet floating around.

use crate::{CorrelationId, Direction, EntityId, PacketKind, PlayerId};

/// Number of inventory slots a player has.
pub const INVENTORY_SLOTS: usize = 8;
/// Number of equipment slots a player has.
pub const EQUIPMENT_SLOTS: usize = 2;

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// A decoded client packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPacket {
    /// `ENTR`: password (NUL padding stripped) and chosen player slot.
    Enter { password: Vec<u8>, player: PlayerId },
    /// `MYPC`: new character's name (NUL padding stripped) and portrait.
    MyCharacter { name: String, portrait: u8 },
    /// `MOVE`: relative step (forward, backward, strafe left, strafe right).
    Move { step: u8 },
    /// `DIRE`: face a new direction (raw byte, validated by the handler).
    Turn { direction: u8 },
    /// `CAST`: 8 raw spell bytes.
    Cast { spell: [u8; 8] },
    /// `THIS`: reply to a selection request.
    This { target_kind: u8, target: u64 },
    /// `USEI`: use an item.
    Use { item: EntityId },
    /// `HOLD`: pick an item into the hand.
    Hold { item: EntityId },
    /// `DROP`: put the held item into a slot (0..8 inventory, 8..10
    /// equipment, anything else the ground).
    Drop { slot: u8 },
    /// `SAYS`: chat text, raw bytes.
    Say { text: Vec<u8> },
    /// `GBYE`: orderly disconnect.
    Goodbye,
    /// `PING`: keep-alive.
    Ping,
}

impl ClientPacket {
    /// The kind (tag) of this packet.
    pub fn kind(&self) -> PacketKind {
        match self {
            Self::Enter { .. } => PacketKind::Enter,
            Self::MyCharacter { .. } => PacketKind::MyCharacter,
            Self::Move { .. } => PacketKind::Move,
            Self::Turn { .. } => PacketKind::Turn,
            Self::Cast { .. } => PacketKind::Cast,
            Self::This { .. } => PacketKind::This,
            Self::Use { .. } => PacketKind::Use,
            Self::Hold { .. } => PacketKind::Hold,
            Self::Drop { .. } => PacketKind::Drop,
            Self::Say { .. } => PacketKind::Say,
            Self::Goodbye => PacketKind::Goodbye,
            Self::Ping => PacketKind::Ping,
        }
    }
}

/// A client packet together with the correlation id from its header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub correlation: CorrelationId,
    pub packet: ClientPacket,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Wire view of an item slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemView {
    /// The "does not exist" sentinel: encoded as the 8-byte sentinel id only.
    Missing,
    /// A real item.
    Present {
        id: EntityId,
        movable: bool,
        gfx_id: String,
        name: String,
    },
}

/// Wire view of a mob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobView {
    pub id: EntityId,
    pub visible: bool,
    pub x: u16,
    pub y: u16,
    pub gfx_id: String,
    pub name: String,
}

/// All items on one ground cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundCell {
    pub x: u16,
    pub y: u16,
    pub items: Vec<ItemView>,
}

/// Target kind byte of an `ANIM` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimTarget {
    Item = 0,
    Mob = 1,
}

/// A packet the server sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerPacket {
    /// `NOPC`: no character yet, send `MYPC`.
    NoCharacter,
    /// `GAME`: handshake done, world traffic follows.
    Game,
    /// `SLCT`: pick something; the reply must echo `correlation`.
    Select { correlation: CorrelationId },
    /// `PONG`: answer to `PING`.
    Pong,
    /// `POSI`: the player's own position and facing.
    Position { x: u16, y: u16, direction: Direction },
    /// `TEXT`: message for the player's log.
    Text(String),
    /// `HLDI`: what the player holds.
    Holding(ItemView),
    /// `INVT`: inventory followed by equipment.
    Inventory(Vec<ItemView>),
    /// `GRND`: item stacks around the player.
    Ground(Vec<GroundCell>),
    /// `MOBS`: mobs around the player.
    Mobs(Vec<MobView>),
    /// `INFO`: stat bars and (optionally) the character name.
    Info {
        hp: u16,
        hp_max: u16,
        mana: u16,
        mana_max: u16,
        name: String,
    },
    /// `ANIM`: play an animation on an entity.
    Anim {
        target: AnimTarget,
        id: EntityId,
        anim: u8,
    },
}

impl ServerPacket {
    /// The kind (tag) of this packet.
    pub fn kind(&self) -> PacketKind {
        match self {
            Self::NoCharacter => PacketKind::NoCharacter,
            Self::Game => PacketKind::Game,
            Self::Select { .. } => PacketKind::Select,
            Self::Pong => PacketKind::Pong,
            Self::Position { .. } => PacketKind::Position,
            Self::Text(_) => PacketKind::Text,
            Self::Holding(_) => PacketKind::Holding,
            Self::Inventory(_) => PacketKind::Inventory,
            Self::Ground(_) => PacketKind::Ground,
            Self::Mobs(_) => PacketKind::Mobs,
            Self::Info { .. } => PacketKind::Info,
            Self::Anim { .. } => PacketKind::Anim,
        }
    }

    /// Correlation id carried in the header. Only `SLCT` has one.
    pub fn correlation(&self) -> CorrelationId {
        match self {
            Self::Select { correlation } => *correlation,
            _ => CorrelationId::NONE,
        }
    }

    /// Shorthand for a text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// The message of a `TEXT` packet.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }
}
