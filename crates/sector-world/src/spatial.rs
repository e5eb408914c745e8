//! Per-cell item and mob lists.
//!
//! Cells hold entity ids, not entities. Liveness is decided by the caller
//! (the registry), which lets reads drop ids whose entity was destroyed in
//! place and rewrite the cell without the index owning any entity data.

use std::collections::HashMap;

use sector_protocol::EntityId;

use crate::{CellLayer, Position};

/// Sparse per-cell entity lists, one map per layer.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    items: HashMap<Position, Vec<EntityId>>,
    mobs: HashMap<Position, Vec<EntityId>>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn layer(&self, layer: CellLayer) -> &HashMap<Position, Vec<EntityId>> {
        match layer {
            CellLayer::Items => &self.items,
            CellLayer::Mobs => &self.mobs,
        }
    }

    fn layer_mut(&mut self, layer: CellLayer) -> &mut HashMap<Position, Vec<EntityId>> {
        match layer {
            CellLayer::Items => &mut self.items,
            CellLayer::Mobs => &mut self.mobs,
        }
    }

    /// Adds `id` to the cell at `pos`. No-op for an unplaced entity or one
    /// already listed there.
    pub fn insert(&mut self, layer: CellLayer, id: EntityId, pos: Option<Position>) {
        let Some(pos) = pos else { return };
        let cell = self.layer_mut(layer).entry(pos).or_default();
        if !cell.contains(&id) {
            cell.push(id);
        }
    }

    /// Removes every occurrence of `id` from the cell at `pos`.
    ///
    /// Returns the number of entries removed.
    pub fn remove(&mut self, layer: CellLayer, id: EntityId, pos: Option<Position>) -> usize {
        let Some(pos) = pos else { return 0 };
        let map = self.layer_mut(layer);
        let Some(cell) = map.get_mut(&pos) else {
            return 0;
        };
        let before = cell.len();
        cell.retain(|&e| e != id);
        let removed = before - cell.len();
        if cell.is_empty() {
            map.remove(&pos);
        }
        removed
    }

    /// Moves `id` between cells: remove from `from`, insert at `to`.
    pub fn relocate(
        &mut self,
        layer: CellLayer,
        id: EntityId,
        from: Option<Position>,
        to: Option<Position>,
    ) {
        self.remove(layer, id, from);
        self.insert(layer, id, to);
    }

    /// Live ids in one cell.
    ///
    /// Ids for which `is_live` returns `false` are dropped and the cell is
    /// rewritten (or removed when it ends up empty).
    pub fn at(
        &mut self,
        layer: CellLayer,
        pos: Position,
        is_live: impl Fn(EntityId) -> bool,
    ) -> Vec<EntityId> {
        let map = self.layer_mut(layer);
        let Some(cell) = map.get_mut(&pos) else {
            return Vec::new();
        };
        if cell.iter().any(|&id| !is_live(id)) {
            cell.retain(|&id| is_live(id));
            if cell.is_empty() {
                map.remove(&pos);
                return Vec::new();
            }
        }
        cell.clone()
    }

    /// Raw cell contents without liveness filtering.
    pub fn raw(&self, layer: CellLayer, pos: Position) -> &[EntityId] {
        self.layer(layer).get(&pos).map(Vec::as_slice).unwrap_or_default()
    }

    /// All ids within Euclidean `radius` of `center`, excluding `exclude`.
    ///
    /// Scans the `(2r+1)²` bounding box cell by cell. Order is row-major
    /// from the top-left corner, then cell order.
    pub fn near(
        &self,
        layer: CellLayer,
        center: Position,
        radius: i32,
        exclude: Option<EntityId>,
    ) -> Vec<EntityId> {
        let map = self.layer(layer);
        let radius_sq = i64::from(radius) * i64::from(radius);
        let mut out = Vec::new();
        if map.is_empty() {
            return out;
        }
        for y in center.y - radius..=center.y + radius {
            for x in center.x - radius..=center.x + radius {
                let pos = Position::new(x, y);
                if pos.distance_sq(center) > radius_sq {
                    continue;
                }
                if let Some(cell) = map.get(&pos) {
                    out.extend(cell.iter().copied().filter(|&id| Some(id) != exclude));
                }
            }
        }
        out
    }

    /// Positions where `id` appears. Used to check index consistency.
    pub fn cells_of(&self, layer: CellLayer, id: EntityId) -> Vec<Position> {
        let mut cells: Vec<Position> = self
            .layer(layer)
            .iter()
            .filter(|(_, ids)| ids.contains(&id))
            .map(|(pos, _)| *pos)
            .collect();
        cells.sort_by_key(|p| (p.y, p.x));
        cells
    }

    /// Forces a duplicate entry into a cell, bypassing the insert check.
    #[cfg(test)]
    pub(crate) fn push_duplicate(&mut self, layer: CellLayer, id: EntityId, pos: Position) {
        self.layer_mut(layer).entry(pos).or_default().push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: EntityId = EntityId(1);
    const B: EntityId = EntityId(2);
    const C: EntityId = EntityId(3);

    fn p(x: i32, y: i32) -> Option<Position> {
        Some(Position::new(x, y))
    }

    #[test]
    fn test_unplaced_is_noop() {
        let mut idx = SpatialIndex::new();
        idx.insert(CellLayer::Items, A, None);
        assert_eq!(idx.remove(CellLayer::Items, A, None), 0);
        assert!(idx.near(CellLayer::Items, Position::new(0, 0), 5, None).is_empty());
    }

    #[test]
    fn test_insert_does_not_duplicate() {
        let mut idx = SpatialIndex::new();
        idx.insert(CellLayer::Mobs, A, p(1, 1));
        idx.insert(CellLayer::Mobs, A, p(1, 1));
        assert_eq!(idx.raw(CellLayer::Mobs, Position::new(1, 1)), &[A]);
    }

    #[test]
    fn test_remove_clears_all_duplicates() {
        let mut idx = SpatialIndex::new();
        idx.insert(CellLayer::Items, A, p(2, 2));
        idx.insert(CellLayer::Items, B, p(2, 2));
        idx.push_duplicate(CellLayer::Items, A, Position::new(2, 2));

        assert_eq!(idx.remove(CellLayer::Items, A, p(2, 2)), 2);
        assert_eq!(idx.raw(CellLayer::Items, Position::new(2, 2)), &[B]);
    }

    #[test]
    fn test_at_filters_dead_and_rewrites_cell() {
        let mut idx = SpatialIndex::new();
        for id in [A, B, C] {
            idx.insert(CellLayer::Items, id, p(0, 0));
        }
        let live = idx.at(CellLayer::Items, Position::new(0, 0), |id| id != B);
        assert_eq!(live, vec![A, C]);
        assert_eq!(idx.raw(CellLayer::Items, Position::new(0, 0)), &[A, C]);

        let none = idx.at(CellLayer::Items, Position::new(0, 0), |_| false);
        assert!(none.is_empty());
        assert!(idx.raw(CellLayer::Items, Position::new(0, 0)).is_empty());
    }

    #[test]
    fn test_near_uses_euclidean_distance_and_exclude() {
        let mut idx = SpatialIndex::new();
        idx.insert(CellLayer::Mobs, A, p(10, 10));
        idx.insert(CellLayer::Mobs, B, p(13, 14)); // distance 5
        idx.insert(CellLayer::Mobs, C, p(14, 14)); // corner of the box, outside

        let found = idx.near(CellLayer::Mobs, Position::new(10, 10), 5, Some(A));
        assert_eq!(found, vec![B]);

        let found = idx.near(CellLayer::Mobs, Position::new(10, 10), 5, None);
        assert_eq!(found, vec![A, B]);
    }

    #[test]
    fn test_relocate_leaves_exactly_one_cell() {
        let mut idx = SpatialIndex::new();
        idx.insert(CellLayer::Mobs, A, p(5, 5));
        idx.relocate(CellLayer::Mobs, A, p(5, 5), p(6, 5));
        assert_eq!(idx.cells_of(CellLayer::Mobs, A), vec![Position::new(6, 5)]);
    }

    #[test]
    fn test_layers_are_independent() {
        let mut idx = SpatialIndex::new();
        idx.insert(CellLayer::Items, A, p(1, 1));
        assert!(idx.raw(CellLayer::Mobs, Position::new(1, 1)).is_empty());
    }
}
