//! Integration tests for the world index under random movement.

use std::sync::Arc;

use proptest::prelude::*;
use sector_protocol::{Direction, PlayerId};
use sector_world::{
    CellLayer, Entity, IdAllocator, Item, ItemKind, Mob, Position, Terrain, Tile, World,
};

fn world() -> World {
    World::new(
        Terrain::filled(32, 32, Tile::Grassland),
        Arc::new(IdAllocator::default()),
    )
}

proptest! {
    #[test]
    fn prop_moved_mobs_occupy_exactly_one_cell(
        moves in prop::collection::vec((0u8..4, 0i32..32, 0i32..32), 1..64)
    ) {
        let mut w = world();
        let ids: Vec<_> = (0..4u8)
            .map(|p| {
                let mob = Mob::player(
                    PlayerId(p),
                    "m",
                    0,
                    Position::new(i32::from(p), 0),
                    Direction::North,
                );
                w.add_player(PlayerId(p), mob).unwrap()
            })
            .collect();

        for (who, x, y) in moves {
            let id = ids[usize::from(who)];
            w.move_mob(id, Position::new(x, y)).unwrap();

            for &id in &ids {
                let pos = w.mob(id).unwrap().position().unwrap_or(Position::new(-1, -1));
                prop_assert_eq!(w.spatial().cells_of(CellLayer::Mobs, id), vec![pos]);
            }
        }

        let everyone = w.mobs_near(Position::new(16, 16), 32, None);
        prop_assert_eq!(everyone.len(), ids.len());
    }

    #[test]
    fn prop_near_matches_brute_force(
        spots in prop::collection::vec((0i32..20, 0i32..20), 0..40),
        cx in 0i32..20,
        cy in 0i32..20,
        radius in 0i32..8,
    ) {
        let mut w = world();
        let center = Position::new(cx, cy);
        let mut expected = Vec::new();
        for (x, y) in spots {
            let pos = Position::new(x, y);
            let id = w.spawn_item(Item::new(ItemKind::Plain), pos);
            if pos.distance_sq(center) <= i64::from(radius * radius) {
                expected.push(id);
            }
        }

        let mut found = w.entities_near(CellLayer::Items, center, radius, None);
        found.sort();
        expected.sort();
        prop_assert_eq!(found, expected);
    }
}
