//! Building and posting packets: per-player views and area broadcasts.
//!
//! Everything here is best effort. A player without a live connection
//! simply gets nothing.

use sector_protocol::{EntityId, GroundCell, ItemView, PlayerId, ServerPacket};
use sector_world::{Entity, Position};

use super::{BROADCAST_RADIUS, Game, VIEW_RADIUS};

impl Game {
    pub(crate) fn send(&self, player: PlayerId, packet: ServerPacket) {
        self.sessions.post_packet(player, packet);
    }

    pub(crate) fn show_text(&self, player: PlayerId, text: impl Into<String>) {
        self.send(player, ServerPacket::text(text));
    }

    /// Wire view of an item slot; unknown or destroyed ids show as empty.
    pub(crate) fn item_view(&self, id: EntityId) -> ItemView {
        self.world
            .item(id)
            .map_or(ItemView::Missing, |item| item.view())
    }

    /// `INFO`. The name is only included when `full`.
    pub(crate) fn send_stats(&self, player: PlayerId, full: bool) {
        let Some(mob) = self.world.player(player) else {
            return;
        };
        self.send(
            player,
            ServerPacket::Info {
                hp: mob.hp,
                hp_max: mob.hp_max,
                mana: mob.mana,
                mana_max: mob.mana_max,
                name: if full { mob.name.clone() } else { String::new() },
            },
        );
    }

    /// `INVT`: inventory then equipment.
    pub(crate) fn send_inventory(&self, player: PlayerId) {
        let Some(state) = self.world.player(player).and_then(|m| m.player_state()) else {
            return;
        };
        let slots = state.all_slots().map(|id| self.item_view(id)).collect();
        self.send(player, ServerPacket::Inventory(slots));
    }

    /// `HLDI` for whatever the player holds now.
    pub(crate) fn send_holding(&self, player: PlayerId) {
        let Some(state) = self.world.player(player).and_then(|m| m.player_state()) else {
            return;
        };
        self.send(player, ServerPacket::Holding(self.item_view(state.holding)));
    }

    /// `POSI` followed by the ground and mob views.
    pub(crate) fn send_position(&mut self, player: PlayerId) {
        let Some(mob) = self.world.player(player) else {
            return;
        };
        let Some(pos) = mob.position() else {
            return;
        };
        let (x, y) = pos.to_wire();
        self.send(
            player,
            ServerPacket::Position {
                x,
                y,
                direction: mob.direction,
            },
        );
        self.send_ground(player);
        self.send_mobs(player);
    }

    /// `GRND`: every non-empty cell in the square view around the player.
    pub(crate) fn send_ground(&mut self, player: PlayerId) {
        let Ok(center) = self.position_of(player) else {
            return;
        };
        let mut cells = Vec::new();
        for y in center.y - VIEW_RADIUS..=center.y + VIEW_RADIUS {
            for x in center.x - VIEW_RADIUS..=center.x + VIEW_RADIUS {
                let pos = Position::new(x, y);
                if !self.world.terrain().in_bounds(pos) {
                    continue;
                }
                let items = self.world.items_at(pos);
                if items.is_empty() {
                    continue;
                }
                let (wx, wy) = pos.to_wire();
                cells.push(GroundCell {
                    x: wx,
                    y: wy,
                    items: items.into_iter().map(|id| self.item_view(id)).collect(),
                });
            }
        }
        self.send(player, ServerPacket::Ground(cells));
    }

    /// `MOBS`: mobs within view distance, not counting the player.
    pub(crate) fn send_mobs(&self, player: PlayerId) {
        let Ok(center) = self.position_of(player) else {
            return;
        };
        let mobs = self
            .world
            .mobs_near(center, VIEW_RADIUS, Some(player.entity_id()))
            .into_iter()
            .filter_map(|id| self.world.mob(id).map(|m| m.view()))
            .collect();
        self.send(player, ServerPacket::Mobs(mobs));
    }

    /// Connected players whose avatar is within `radius` of `center`.
    /// A radius of zero means the same cell.
    pub(crate) fn active_players_near(&self, center: Position, radius: i32) -> Vec<PlayerId> {
        let max = i64::from(radius) * i64::from(radius);
        self.sessions
            .active_players()
            .into_iter()
            .filter(|&p| {
                self.world
                    .player(p)
                    .and_then(|m| m.position())
                    .is_some_and(|pos| pos.distance_sq(center) <= max)
            })
            .collect()
    }

    /// Refreshes the mob view of everyone near `center`.
    pub(crate) fn broadcast_mobs(&self, center: Position, ignore: Option<PlayerId>) {
        for p in self.active_players_near(center, BROADCAST_RADIUS) {
            if Some(p) != ignore {
                self.send_mobs(p);
            }
        }
    }

    /// Refreshes the ground view of everyone near `center`.
    pub(crate) fn broadcast_ground(&mut self, center: Position, ignore: Option<PlayerId>) {
        for p in self.active_players_near(center, BROADCAST_RADIUS) {
            if Some(p) != ignore {
                self.send_ground(p);
            }
        }
    }
}
