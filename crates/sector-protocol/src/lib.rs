//! Wire protocol for the Arcane Sector server.
//!
//! - **Types** ([`PlayerId`], [`EntityId`], [`CorrelationId`], [`PacketKind`]):
//!   identities and the message kind table.
//! - **Packets** ([`ClientPacket`], [`ServerPacket`]): one variant per kind.
//! - **Codec** ([`Codec`] trait, [`BinaryCodec`]): frames to packets and
//!   back.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (frames) → Protocol (packets) → Scheduler (events)
//! ```

mod codec;
mod error;
mod packet;
mod types;

pub use codec::{BinaryCodec, Codec, FrameHeader};
pub use error::ProtocolError;
pub use packet::{
    AnimTarget, ClientPacket, EQUIPMENT_SLOTS, GroundCell, INVENTORY_SLOTS,
    Inbound, ItemView, MobView, ServerPacket,
};
pub use types::{CorrelationId, Direction, EntityId, Origin, PacketKind, PlayerId};
