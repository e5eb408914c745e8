//! Identity types, directions, and the packet kind table.
//!
//! Everything in this module travels on the wire in some form: ids as raw
//! little-endian integers, directions as a single byte, packet kinds as the
//! 4-byte ASCII tag in every frame header.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player slot on the server.
///
/// The client picks its slot in `ENTR` with a single byte, so there are at
/// most 256 players. A player's mob uses the slot number as its entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u8);

impl PlayerId {
    /// The entity id of this player's mob.
    pub fn entity_id(self) -> EntityId {
        EntityId(u64::from(self.0))
    }

    /// Slot index into per-player tables.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A 64-bit entity identity (item or mob).
///
/// The all-ones value is reserved: it names the "does not exist" sentinel
/// used for empty inventory slots and destroyed entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl EntityId {
    /// The "does not exist" sentinel.
    pub const NONE: EntityId = EntityId(u64::MAX);

    /// Returns `true` for the sentinel id.
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// Returns `true` for any real entity.
    pub fn is_some(self) -> bool {
        !self.is_none()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("E-none")
        } else {
            write!(f, "E-{:x}", self.0)
        }
    }
}

/// Server-issued token a client echoes back in a reply's header.
///
/// Zero means "not correlated".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub u64);

impl CorrelationId {
    /// Uncorrelated traffic.
    pub const NONE: CorrelationId = CorrelationId(0);
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Compass direction a mob faces. Wire values 0..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North = 0,
    South = 1,
    West = 2,
    East = 3,
}

impl Direction {
    /// All directions in wire order.
    pub const ALL: [Direction; 4] =
        [Direction::North, Direction::South, Direction::West, Direction::East];

    /// Parses the wire byte. `None` for anything above 3.
    pub fn from_wire(b: u8) -> Option<Self> {
        Self::ALL.get(usize::from(b)).copied()
    }

    /// The wire byte.
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    /// Unit step `(dx, dy)`; north is -y.
    pub fn vector(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
            Direction::East => (1, 0),
        }
    }
}

// ---------------------------------------------------------------------------
// Packet kinds
// ---------------------------------------------------------------------------

/// Which side may send a packet kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Client,
    Server,
}

macro_rules! packet_kinds {
    ($($variant:ident => $tag:literal, $origin:ident;)*) => {
        /// Every message kind, keyed by its 4-byte ASCII tag.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum PacketKind {
            $($variant,)*
        }

        impl PacketKind {
            /// The full table, used for exhaustive lookups.
            pub const ALL: &'static [PacketKind] = &[$(PacketKind::$variant,)*];

            /// The 4-byte tag written in the frame header.
            pub fn tag(self) -> &'static [u8; 4] {
                match self {
                    $(PacketKind::$variant => $tag,)*
                }
            }

            /// Which side sends this kind.
            pub fn origin(self) -> Origin {
                match self {
                    $(PacketKind::$variant => Origin::$origin,)*
                }
            }
        }
    };
}

packet_kinds! {
    // Client → server
    Enter => b"ENTR", Client;
    MyCharacter => b"MYPC", Client;
    Move => b"MOVE", Client;
    Turn => b"DIRE", Client;
    Cast => b"CAST", Client;
    This => b"THIS", Client;
    Use => b"USEI", Client;
    Hold => b"HOLD", Client;
    Drop => b"DROP", Client;
    Say => b"SAYS", Client;
    Goodbye => b"GBYE", Client;
    Ping => b"PING", Client;
    // Server → client
    NoCharacter => b"NOPC", Server;
    Game => b"GAME", Server;
    Select => b"SLCT", Server;
    Pong => b"PONG", Server;
    Position => b"POSI", Server;
    Text => b"TEXT", Server;
    Holding => b"HLDI", Server;
    Inventory => b"INVT", Server;
    Ground => b"GRND", Server;
    Mobs => b"MOBS", Server;
    Info => b"INFO", Server;
    Anim => b"ANIM", Server;
}

impl PacketKind {
    /// Looks a tag up in the table.
    pub fn from_tag(tag: &[u8; 4]) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.tag() == tag)
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tags are ASCII by construction.
        f.write_str(std::str::from_utf8(self.tag()).unwrap_or("????"))
    }
}
