//! Binary codec: frame header plus per-kind payload layouts.
//!
//! All integers are little-endian. Strings inside composite payloads are a
//! `u16` byte length followed by the bytes; `TEXT` carries its bytes raw.
//! An item slot that holds nothing is written as the sentinel id alone.

use sector_transport::{DEFAULT_MAX_PAYLOAD, FRAME_HEADER_LEN};

use crate::{
    AnimTarget, ClientPacket, CorrelationId, Direction, EntityId, GroundCell,
    Inbound, ItemView, MobView, Origin, PacketKind, PlayerId, ProtocolError,
    ServerPacket,
};

/// Width of the NUL-padded password and name fields.
const NAME_FIELD_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Frame header
// ---------------------------------------------------------------------------

/// The fixed 16-byte header every frame starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload size in bytes.
    pub size: u32,
    /// Message kind.
    pub kind: PacketKind,
    /// Correlation id (zero for uncorrelated traffic).
    pub correlation: CorrelationId,
}

impl FrameHeader {
    /// Parses the header at the start of `frame`.
    ///
    /// Checks the tag against the packet table and the size against
    /// `max_payload`, but not against the bytes that follow.
    pub fn parse(frame: &[u8], max_payload: u32) -> Result<Self, ProtocolError> {
        if frame.len() < FRAME_HEADER_LEN {
            return Err(ProtocolError::ShortFrame(frame.len()));
        }
        let size = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
        let tag = [frame[4], frame[5], frame[6], frame[7]];
        let mut corr = [0u8; 8];
        corr.copy_from_slice(&frame[8..16]);

        let kind =
            PacketKind::from_tag(&tag).ok_or(ProtocolError::UnknownTag(tag))?;
        if size > max_payload {
            return Err(ProtocolError::PayloadTooLarge {
                size,
                limit: max_payload,
            });
        }

        Ok(Self {
            size,
            kind,
            correlation: CorrelationId(u64::from_le_bytes(corr)),
        })
    }

    /// Writes the header into a fresh buffer with room for `size` more bytes.
    fn write(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FRAME_HEADER_LEN + self.size as usize);
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(self.kind.tag());
        out.extend_from_slice(&self.correlation.0.to_le_bytes());
        out
    }
}

// ---------------------------------------------------------------------------
// Codec trait
// ---------------------------------------------------------------------------

/// Converts between whole frames and packets, server side.
pub trait Codec: Send + Sync + 'static {
    /// Decodes one client frame (header and payload).
    ///
    /// # Errors
    /// Any [`ProtocolError`]; the caller treats it as fatal to the connection.
    fn decode(&self, frame: &[u8]) -> Result<Inbound, ProtocolError>;

    /// Encodes one server packet into a complete frame.
    ///
    /// # Errors
    /// [`ProtocolError::Encode`] if a string or list outgrows its prefix.
    fn encode(&self, packet: &ServerPacket) -> Result<Vec<u8>, ProtocolError>;
}

/// The game's binary codec.
#[derive(Debug, Clone, Copy)]
pub struct BinaryCodec {
    max_payload: u32,
}

impl Default for BinaryCodec {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl BinaryCodec {
    /// Codec with a custom inbound payload cap.
    pub fn with_max_payload(max_payload: u32) -> Self {
        Self { max_payload }
    }

    /// Builds a client frame. Used by test clients and tooling.
    pub fn encode_client(
        &self,
        packet: &ClientPacket,
        correlation: CorrelationId,
    ) -> Vec<u8> {
        let mut payload = Vec::new();
        match packet {
            ClientPacket::Enter { password, player } => {
                put_padded(&mut payload, password);
                payload.push(player.0);
            }
            ClientPacket::MyCharacter { name, portrait } => {
                put_padded(&mut payload, name.as_bytes());
                payload.push(*portrait);
            }
            ClientPacket::Move { step } => payload.push(*step),
            ClientPacket::Turn { direction } => payload.push(*direction),
            ClientPacket::Cast { spell } => payload.extend_from_slice(spell),
            ClientPacket::This {
                target_kind,
                target,
            } => {
                payload.push(*target_kind);
                payload.extend_from_slice(&target.to_le_bytes());
            }
            ClientPacket::Use { item } | ClientPacket::Hold { item } => {
                payload.extend_from_slice(&item.0.to_le_bytes());
            }
            ClientPacket::Drop { slot } => payload.push(*slot),
            ClientPacket::Say { text } => payload.extend_from_slice(text),
            ClientPacket::Goodbye | ClientPacket::Ping => {}
        }
        frame(packet.kind(), correlation, payload)
    }

    /// Parses a server frame. Used by test clients and tooling.
    pub fn decode_server(
        &self,
        frame: &[u8],
    ) -> Result<(CorrelationId, ServerPacket), ProtocolError> {
        let header = FrameHeader::parse(frame, u32::MAX)?;
        if header.kind.origin() != Origin::Server {
            return Err(ProtocolError::WrongDirection(header.kind));
        }
        let payload = payload_of(frame, &header)?;
        let mut r = Reader::new(header.kind, payload);

        let packet = match header.kind {
            PacketKind::NoCharacter => ServerPacket::NoCharacter,
            PacketKind::Game => ServerPacket::Game,
            PacketKind::Select => ServerPacket::Select {
                correlation: header.correlation,
            },
            PacketKind::Pong => ServerPacket::Pong,
            PacketKind::Position => {
                let x = r.u16()?;
                let y = r.u16()?;
                let dir = r.u8()?;
                let direction = Direction::from_wire(dir).ok_or_else(|| {
                    ProtocolError::InvalidMessage(format!("bad direction {dir}"))
                })?;
                ServerPacket::Position { x, y, direction }
            }
            PacketKind::Text => {
                ServerPacket::Text(String::from_utf8_lossy(payload).into_owned())
            }
            PacketKind::Holding => ServerPacket::Holding(r.item()?),
            PacketKind::Inventory => {
                let mut items = Vec::new();
                while !r.is_empty() {
                    items.push(r.item()?);
                }
                ServerPacket::Inventory(items)
            }
            PacketKind::Ground => {
                let count = r.u8()?;
                let mut cells = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    let n = r.u8()?;
                    let x = r.u16()?;
                    let y = r.u16()?;
                    let mut items = Vec::with_capacity(usize::from(n));
                    for _ in 0..n {
                        items.push(r.item()?);
                    }
                    cells.push(GroundCell { x, y, items });
                }
                ServerPacket::Ground(cells)
            }
            PacketKind::Mobs => {
                let count = r.u16()?;
                let mut mobs = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    let _mob_type = r.u8()?;
                    let visible = r.u8()? != 0;
                    let id = EntityId(r.u64()?);
                    let mut mob = MobView {
                        id,
                        visible,
                        x: 0,
                        y: 0,
                        gfx_id: String::new(),
                        name: String::new(),
                    };
                    if visible {
                        mob.x = r.u16()?;
                        mob.y = r.u16()?;
                        mob.gfx_id = r.string()?;
                        mob.name = r.string()?;
                    }
                    mobs.push(mob);
                }
                ServerPacket::Mobs(mobs)
            }
            PacketKind::Info => ServerPacket::Info {
                hp: r.u16()?,
                hp_max: r.u16()?,
                mana: r.u16()?,
                mana_max: r.u16()?,
                name: r.string()?,
            },
            PacketKind::Anim => {
                let target = match r.u8()? {
                    0 => AnimTarget::Item,
                    _ => AnimTarget::Mob,
                };
                ServerPacket::Anim {
                    target,
                    id: EntityId(r.u64()?),
                    anim: r.u8()?,
                }
            }
            other => return Err(ProtocolError::WrongDirection(other)),
        };
        Ok((header.correlation, packet))
    }
}

impl Codec for BinaryCodec {
    fn decode(&self, frame: &[u8]) -> Result<Inbound, ProtocolError> {
        let header = FrameHeader::parse(frame, self.max_payload)?;
        if header.kind.origin() != Origin::Client {
            return Err(ProtocolError::WrongDirection(header.kind));
        }
        let d = payload_of(frame, &header)?;
        let kind = header.kind;

        let packet = match kind {
            PacketKind::Enter => {
                expect_len(kind, d, NAME_FIELD_LEN + 1)?;
                ClientPacket::Enter {
                    password: trim_nul(&d[..NAME_FIELD_LEN]).to_vec(),
                    player: PlayerId(d[NAME_FIELD_LEN]),
                }
            }
            PacketKind::MyCharacter => {
                expect_len(kind, d, NAME_FIELD_LEN + 1)?;
                ClientPacket::MyCharacter {
                    name: String::from_utf8_lossy(trim_nul(&d[..NAME_FIELD_LEN]))
                        .into_owned(),
                    portrait: d[NAME_FIELD_LEN],
                }
            }
            PacketKind::Move => {
                expect_len(kind, d, 1)?;
                ClientPacket::Move { step: d[0] }
            }
            PacketKind::Turn => {
                expect_len(kind, d, 1)?;
                ClientPacket::Turn { direction: d[0] }
            }
            PacketKind::Cast => {
                expect_len(kind, d, 8)?;
                let mut spell = [0u8; 8];
                spell.copy_from_slice(d);
                ClientPacket::Cast { spell }
            }
            PacketKind::This => {
                expect_len(kind, d, 9)?;
                ClientPacket::This {
                    target_kind: d[0],
                    target: read_u64(&d[1..9]),
                }
            }
            PacketKind::Use => {
                expect_len(kind, d, 8)?;
                ClientPacket::Use {
                    item: EntityId(read_u64(d)),
                }
            }
            PacketKind::Hold => {
                expect_len(kind, d, 8)?;
                ClientPacket::Hold {
                    item: EntityId(read_u64(d)),
                }
            }
            PacketKind::Drop => {
                expect_len(kind, d, 1)?;
                ClientPacket::Drop { slot: d[0] }
            }
            PacketKind::Say => ClientPacket::Say { text: d.to_vec() },
            PacketKind::Goodbye => ClientPacket::Goodbye,
            PacketKind::Ping => ClientPacket::Ping,
            other => return Err(ProtocolError::WrongDirection(other)),
        };

        Ok(Inbound {
            correlation: header.correlation,
            packet,
        })
    }

    fn encode(&self, packet: &ServerPacket) -> Result<Vec<u8>, ProtocolError> {
        let mut p = Vec::new();
        match packet {
            ServerPacket::NoCharacter
            | ServerPacket::Game
            | ServerPacket::Select { .. }
            | ServerPacket::Pong => {}
            ServerPacket::Position { x, y, direction } => {
                p.extend_from_slice(&x.to_le_bytes());
                p.extend_from_slice(&y.to_le_bytes());
                p.push(direction.to_wire());
            }
            ServerPacket::Text(text) => p.extend_from_slice(text.as_bytes()),
            ServerPacket::Holding(item) => put_item(&mut p, item)?,
            ServerPacket::Inventory(items) => {
                for item in items {
                    put_item(&mut p, item)?;
                }
            }
            ServerPacket::Ground(cells) => {
                p.push(count_prefix::<u8>("ground cells", cells.len())?);
                for cell in cells {
                    p.push(count_prefix::<u8>("items in one cell", cell.items.len())?);
                    p.extend_from_slice(&cell.x.to_le_bytes());
                    p.extend_from_slice(&cell.y.to_le_bytes());
                    for item in &cell.items {
                        put_item(&mut p, item)?;
                    }
                }
            }
            ServerPacket::Mobs(mobs) => {
                let count = count_prefix::<u16>("mobs", mobs.len())?;
                p.extend_from_slice(&count.to_le_bytes());
                for mob in mobs {
                    p.push(0);
                    p.push(u8::from(mob.visible));
                    p.extend_from_slice(&mob.id.0.to_le_bytes());
                    if mob.visible {
                        p.extend_from_slice(&mob.x.to_le_bytes());
                        p.extend_from_slice(&mob.y.to_le_bytes());
                        put_str(&mut p, &mob.gfx_id)?;
                        put_str(&mut p, &mob.name)?;
                    }
                }
            }
            ServerPacket::Info {
                hp,
                hp_max,
                mana,
                mana_max,
                name,
            } => {
                for v in [hp, hp_max, mana, mana_max] {
                    p.extend_from_slice(&v.to_le_bytes());
                }
                put_str(&mut p, name)?;
            }
            ServerPacket::Anim { target, id, anim } => {
                p.push(*target as u8);
                p.extend_from_slice(&id.0.to_le_bytes());
                p.push(*anim);
            }
        }

        if p.len() > u32::MAX as usize {
            return Err(ProtocolError::Encode(format!(
                "{} payload of {} bytes",
                packet.kind(),
                p.len()
            )));
        }
        Ok(frame(packet.kind(), packet.correlation(), p))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn frame(kind: PacketKind, correlation: CorrelationId, payload: Vec<u8>) -> Vec<u8> {
    let header = FrameHeader {
        size: payload.len() as u32,
        kind,
        correlation,
    };
    let mut out = header.write();
    out.extend_from_slice(&payload);
    out
}

fn payload_of<'a>(
    frame: &'a [u8],
    header: &FrameHeader,
) -> Result<&'a [u8], ProtocolError> {
    let payload = &frame[FRAME_HEADER_LEN..];
    if payload.len() != header.size as usize {
        return Err(ProtocolError::SizeMismatch {
            declared: header.size,
            actual: payload.len(),
        });
    }
    Ok(payload)
}

fn expect_len(
    kind: PacketKind,
    payload: &[u8],
    expected: usize,
) -> Result<(), ProtocolError> {
    if payload.len() == expected {
        Ok(())
    } else {
        Err(ProtocolError::BadLength {
            kind,
            expected,
            actual: payload.len(),
        })
    }
}

fn read_u64(b: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&b[..8]);
    u64::from_le_bytes(raw)
}

fn trim_nul(field: &[u8]) -> &[u8] {
    let end = field.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &field[..end]
}

fn put_padded(out: &mut Vec<u8>, value: &[u8]) {
    let mut field = [0u8; NAME_FIELD_LEN];
    let n = value.len().min(NAME_FIELD_LEN);
    field[..n].copy_from_slice(&value[..n]);
    out.extend_from_slice(&field);
}

/// A list length as its wire prefix type; lists never get truncated.
fn count_prefix<T: TryFrom<usize>>(what: &str, len: usize) -> Result<T, ProtocolError> {
    T::try_from(len)
        .map_err(|_| ProtocolError::Encode(format!("{len} {what} exceed the count prefix")))
}

fn put_str(out: &mut Vec<u8>, s: &str) -> Result<(), ProtocolError> {
    let len = u16::try_from(s.len()).map_err(|_| {
        ProtocolError::Encode(format!("string of {} bytes exceeds u16 prefix", s.len()))
    })?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

fn put_item(out: &mut Vec<u8>, item: &ItemView) -> Result<(), ProtocolError> {
    match item {
        ItemView::Missing => out.extend_from_slice(&EntityId::NONE.0.to_le_bytes()),
        ItemView::Present {
            id,
            movable,
            gfx_id,
            name,
        } => {
            out.extend_from_slice(&id.0.to_le_bytes());
            out.push(u8::from(*movable));
            put_str(out, gfx_id)?;
            put_str(out, name)?;
        }
    }
    Ok(())
}

/// Cursor over a server payload.
struct Reader<'a> {
    kind: PacketKind,
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(kind: PacketKind, data: &'a [u8]) -> Self {
        Self { kind, data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(ProtocolError::BadLength {
                kind: self.kind,
                expected: end,
                actual: self.data.len(),
            });
        }
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ProtocolError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u64(&mut self) -> Result<u64, ProtocolError> {
        Ok(read_u64(self.take(8)?))
    }

    fn string(&mut self) -> Result<String, ProtocolError> {
        let len = self.u16()?;
        let b = self.take(usize::from(len))?;
        Ok(String::from_utf8_lossy(b).into_owned())
    }

    fn item(&mut self) -> Result<ItemView, ProtocolError> {
        let id = EntityId(self.u64()?);
        if id.is_none() {
            return Ok(ItemView::Missing);
        }
        Ok(ItemView::Present {
            id,
            movable: self.u8()? != 0,
            gfx_id: self.string()?,
            name: self.string()?,
        })
    }
}
