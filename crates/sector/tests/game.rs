//! Game behaviour driven through the real world loop.
//!
//! Each test owns a `Scheduler<Game>` and steps it by hand with explicit
//! instants, so timers (select deadlines, ritual steps, ring countdowns)
//! are deterministic. Players are connected through a real
//! `SessionBridge`; what they would receive is read from their outboxes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sector::prelude::*;
use sector_protocol::{Inbound, ItemView, MobView};
use sector_scheduler::channel;
use sector_session::{CharacterProfile, ConnectionHandle, Outbox, SessionChange};
use sector_transport::ConnectionId;
use sector_world::{Entity, IdAllocator};
use tokio::time::Instant;

const START: Position = Position::new(10, 10);

struct Client {
    handle: Arc<ConnectionHandle>,
    outbox: Outbox,
}

struct Harness {
    scheduler: Scheduler<Game>,
    events: SchedulerHandle<Special>,
    sessions: Arc<SessionBridge>,
    clients: HashMap<PlayerId, Client>,
    now: Instant,
}

impl Harness {
    fn new() -> Self {
        let world = World::new(
            Terrain::filled(64, 64, Tile::Grassland),
            Arc::new(IdAllocator::default()),
        );
        Self::with_world(world)
    }

    fn with_world(world: World) -> Self {
        let (events, rx) = channel::<Special>();
        let notify = events.clone();
        let sessions = Arc::new(SessionBridge::new(move |c: SessionChange| {
            notify.post_special(Special::from(c));
        }));
        let settings = GameSettings {
            select_timeout: Duration::from_secs(60),
            spawner_interval: Duration::from_secs(30),
            start: START,
            start_direction: Direction::West,
        };
        let game = Game::new(world, Arc::clone(&sessions), settings);
        Self {
            scheduler: Scheduler::new(game, rx, SchedulerConfig::default()),
            events,
            sessions,
            clients: HashMap::new(),
            now: Instant::now(),
        }
    }

    /// Connects a player and creates their character at the start cell.
    fn join(&mut self, slot: u8, name: &str) -> PlayerId {
        let player = PlayerId(slot);
        self.connect(player);
        self.events.post_special(Special::CreatePlayer(CharacterProfile {
            player,
            name: name.to_string(),
            portrait: 0,
        }));
        self.settle();
        self.drain(player);
        player
    }

    /// A new connection for `player`, kicking any older one.
    fn connect(&mut self, player: PlayerId) -> Arc<ConnectionHandle> {
        let (handle, outbox) = ConnectionHandle::new(ConnectionId::next(), player);
        self.sessions.acquire(Arc::clone(&handle));
        self.clients.insert(
            player,
            Client {
                handle: Arc::clone(&handle),
                outbox,
            },
        );
        self.settle();
        handle
    }

    fn settle(&mut self) {
        while self.scheduler.step(self.now) {}
    }

    fn advance(&mut self, d: Duration) {
        self.now += d;
        self.settle();
    }

    fn send(&mut self, player: PlayerId, packet: ClientPacket) {
        self.reply(player, CorrelationId::NONE, packet);
    }

    fn reply(&mut self, player: PlayerId, correlation: CorrelationId, packet: ClientPacket) {
        self.events
            .post_packet(player, Inbound { correlation, packet });
        self.settle();
    }

    fn drain(&mut self, player: PlayerId) -> Vec<ServerPacket> {
        let client = self.clients.get_mut(&player).expect("unknown client");
        let mut out = Vec::new();
        while let Ok(p) = client.outbox.packets.try_recv() {
            out.push(p);
        }
        out
    }

    fn texts(&mut self, player: PlayerId) -> Vec<String> {
        self.drain(player)
            .into_iter()
            .filter_map(|p| match p {
                ServerPacket::Text(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    fn game(&self) -> &Game {
        self.scheduler.logic()
    }

    fn world(&mut self) -> &mut World {
        self.scheduler.logic_mut().world_mut()
    }

    fn place(&mut self, player: PlayerId, pos: Position) {
        self.world().move_mob(player.entity_id(), pos).unwrap();
    }

    fn position(&self, player: PlayerId) -> Position {
        self.game().world().player(player).unwrap().position().unwrap()
    }

    fn set_mana(&mut self, player: PlayerId, mana: u16) {
        self.world().player_mut(player).unwrap().mana = mana;
    }

    /// Casts and returns the correlation of the `SLCT` that followed.
    fn cast_and_select(&mut self, player: PlayerId, spell: [u8; 8]) -> CorrelationId {
        self.send(player, ClientPacket::Cast { spell });
        self.drain(player)
            .into_iter()
            .find_map(|p| match p {
                ServerPacket::Select { correlation } => Some(correlation),
                _ => None,
            })
            .expect("no SLCT sent")
    }
}

const FORCE_RAM: [u8; 8] = [0x51, 0x51, 0x51, 0, 0, 0, 0, 0];
const BIND_RING: [u8; 8] = [0x76, 0x77, 0x78, 0x79, 0, 0, 0, 0];

// =========================================================================
// Movement
// =========================================================================

#[test]
fn test_move_onto_blocking_item_is_rejected_quietly() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    let bob = h.join(2, "Bob");
    h.drain(ann);
    h.world()
        .spawn_item(Item::new(ItemKind::Plain).blocking(true), Position::new(9, 10));

    // Facing west, step 0 is forward onto the blocked cell.
    h.send(ann, ClientPacket::Move { step: 0 });

    assert_eq!(h.position(ann), START);
    assert_eq!(h.texts(ann), vec!["Way is blocked."]);
    assert!(h.drain(bob).is_empty(), "no broadcast for a rejected move");
}

#[test]
fn test_move_updates_mover_and_neighbours() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    let bob = h.join(2, "Bob");
    h.drain(ann);

    h.send(ann, ClientPacket::Move { step: 0 });

    assert_eq!(h.position(ann), Position::new(9, 10));
    let own = h.drain(ann);
    assert_eq!(
        own.first(),
        Some(&ServerPacket::Position {
            x: 9,
            y: 10,
            direction: Direction::West
        })
    );
    let seen: Vec<Vec<MobView>> = h
        .drain(bob)
        .into_iter()
        .filter_map(|p| match p {
            ServerPacket::Mobs(m) => Some(m),
            _ => None,
        })
        .collect();
    assert!(!seen.is_empty());
    let ann_view = seen
        .last()
        .unwrap()
        .iter()
        .find(|m| m.id == ann.entity_id())
        .unwrap();
    assert_eq!((ann_view.x, ann_view.y), (9, 10));
}

#[test]
fn test_move_is_relative_to_facing() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");

    h.send(ann, ClientPacket::Turn { direction: 0 });
    assert_eq!(
        h.game().world().player(ann).unwrap().direction,
        Direction::North
    );
    // Strafe right while facing north goes east.
    h.send(ann, ClientPacket::Move { step: 3 });
    assert_eq!(h.position(ann), Position::new(11, 10));
    // Backward goes south.
    h.send(ann, ClientPacket::Move { step: 1 });
    assert_eq!(h.position(ann), Position::new(11, 11));
    // Nonsense steps and directions are ignored.
    h.send(ann, ClientPacket::Move { step: 9 });
    h.send(ann, ClientPacket::Turn { direction: 7 });
    assert_eq!(h.position(ann), Position::new(11, 11));
    assert_eq!(
        h.game().world().player(ann).unwrap().direction,
        Direction::North
    );
}

#[test]
fn test_move_off_the_map() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    h.place(ann, Position::new(0, 10));
    h.drain(ann);

    h.send(ann, ClientPacket::Move { step: 0 });

    assert_eq!(h.position(ann), Position::new(0, 10));
    assert_eq!(h.texts(ann), vec!["Can't go there."]);
}

#[test]
fn test_blocking_terrain_is_silent() {
    let mut terrain = Terrain::filled(64, 64, Tile::Grassland);
    terrain.set(Position::new(9, 10), Tile::Water);
    let mut h = Harness::with_world(World::new(terrain, Arc::new(IdAllocator::default())));
    let ann = h.join(1, "Ann");

    h.send(ann, ClientPacket::Move { step: 0 });

    assert_eq!(h.position(ann), START);
    assert!(h.drain(ann).is_empty());
}

#[test]
fn test_door_moves_mob_beside_the_other_door() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    h.world()
        .spawn_item(Item::new(ItemKind::Door { group: 7 }), Position::new(20, 20));
    h.world()
        .spawn_item(Item::new(ItemKind::Door { group: 7 }), Position::new(30, 30));
    h.place(ann, Position::new(21, 20));
    h.drain(ann);

    h.send(ann, ClientPacket::Move { step: 0 });

    // North of the far door is the first free side.
    assert_eq!(h.position(ann), Position::new(30, 29));
    let mob = h.game().world().player(ann).unwrap();
    assert_eq!(mob.direction, Direction::North);
    assert!(h.drain(ann).contains(&ServerPacket::Position {
        x: 30,
        y: 29,
        direction: Direction::North
    }));
}

// =========================================================================
// Chat
// =========================================================================

#[test]
fn test_say_fades_with_distance() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    let near = h.join(2, "Near");
    let mid = h.join(3, "Mid");
    let far = h.join(4, "Far");
    let gone = h.join(5, "Gone");
    h.place(near, Position::new(10, 15));
    h.place(mid, Position::new(10, 20));
    h.place(far, Position::new(10, 27));
    h.place(gone, Position::new(10, 40));
    for p in [ann, near, mid, far, gone] {
        h.drain(p);
    }

    h.send(
        ann,
        ClientPacket::Say {
            text: b"Hello\x00 There\x07".to_vec(),
        },
    );

    assert_eq!(h.texts(near), vec!["\x13Ann says: \x17Hello There"]);
    assert_eq!(h.texts(mid), vec!["\x13Ann says: \x17hello there"]);
    let garbled = h.texts(far);
    assert_eq!(garbled.len(), 1);
    let body = garbled[0].strip_prefix("\x13Ann says: \x17").unwrap();
    assert_eq!(body.len(), "Hello There".len());
    assert!(body
        .chars()
        .zip("Hello There".chars())
        .all(|(got, want)| got == want || got == '.'));
    assert!(h.texts(gone).is_empty());
    assert!(h.texts(ann).is_empty());
}

// =========================================================================
// Items
// =========================================================================

#[test]
fn test_hold_and_drop_cycle() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    let stone = h
        .world()
        .spawn_item(Item::new(ItemKind::Plain).with_name("Stone"), START);

    h.send(ann, ClientPacket::Hold { item: stone });
    let state = h.game().world().player(ann).unwrap().player_state().unwrap();
    assert_eq!(state.holding, stone);
    assert!(h.world().items_at(START).is_empty());
    let out = h.drain(ann);
    assert!(matches!(out.last(), Some(ServerPacket::Holding(ItemView::Present { id, .. })) if *id == stone));

    // Into inventory slot 3.
    h.send(ann, ClientPacket::Drop { slot: 3 });
    let state = h.game().world().player(ann).unwrap().player_state().unwrap();
    assert_eq!(state.inventory[3], stone);
    assert!(state.holding.is_none());

    // Back into the hand from the inventory, then onto the ground.
    h.send(ann, ClientPacket::Hold { item: stone });
    let state = h.game().world().player(ann).unwrap().player_state().unwrap();
    assert!(state.inventory[3].is_none());
    assert_eq!(state.holding, stone);
    h.send(ann, ClientPacket::Drop { slot: 200 });
    assert_eq!(h.world().items_at(START), vec![stone]);
}

#[test]
fn test_hold_checks_reach_and_movability() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    let elsewhere = h
        .world()
        .spawn_item(Item::new(ItemKind::Plain), Position::new(12, 12));
    let sign = h.world().spawn_item(
        Item::new(ItemKind::Sign {
            text: "Beware".into(),
        }),
        START,
    );

    h.send(ann, ClientPacket::Hold { item: elsewhere });
    h.send(ann, ClientPacket::Hold { item: sign });
    h.send(ann, ClientPacket::Use { item: sign });
    h.send(ann, ClientPacket::Use { item: elsewhere });

    assert_eq!(
        h.texts(ann),
        vec![
            "Out of reach.",
            "Unable to take this item.",
            "The sign reads: Beware",
            "Out of reach.",
        ]
    );
}

// =========================================================================
// Spells and selection
// =========================================================================

#[test]
fn test_cast_costs_mana() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");

    // Power 3 costs 15, more than the starting 10.
    h.send(ann, ClientPacket::Cast { spell: FORCE_RAM });
    assert_eq!(h.texts(ann), vec!["Not enough mana."]);

    // Unknown power 2 spell: paid for, then fails with its hex code.
    h.send(
        ann,
        ClientPacket::Cast {
            spell: [1, 2, 0, 0, 0, 0, 0, 0],
        },
    );
    let out = h.drain(ann);
    assert!(out.contains(&ServerPacket::Info {
        hp: 40,
        hp_max: 40,
        mana: 0,
        mana_max: 60,
        name: String::new(),
    }));
    assert!(out.contains(&ServerPacket::text(
        "The spell failed miserably. (0102000000000000)"
    )));

    h.set_mana(ann, 60);
    h.send(ann, ClientPacket::Cast { spell: [9; 8] });
    assert!(h.texts(ann).contains(&"The spell failed miserably.".to_string()));
    assert_eq!(h.game().world().player(ann).unwrap().mana, 20);
}

#[test]
fn test_fire_arrow_animates_caster() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    let bob = h.join(2, "Bob");
    h.drain(ann);

    h.send(
        ann,
        ClientPacket::Cast {
            spell: [0x4a, 0x5a, 0, 0, 0, 0, 0, 0],
        },
    );

    let anim = ServerPacket::Anim {
        target: sector_protocol::AnimTarget::Mob,
        id: ann.entity_id(),
        anim: 1,
    };
    assert!(h.drain(bob).contains(&anim));
    let own = h.drain(ann);
    assert!(own.contains(&ServerPacket::text("FIRE ARROW")));
    assert!(own.contains(&anim));
}

#[test]
fn test_select_times_out_after_a_minute() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    h.set_mana(ann, 60);

    h.cast_and_select(ann, FORCE_RAM);
    assert!(h.game().world().player(ann).unwrap().player_state().unwrap().selecting);
    assert_eq!(h.scheduler.pending_replies(), 1);

    h.advance(Duration::from_secs(59));
    assert!(h.texts(ann).is_empty());

    h.advance(Duration::from_secs(1));
    assert_eq!(
        h.texts(ann),
        vec!["Not interested in selecting? Got it! Aborting select."]
    );
    assert!(!h.game().world().player(ann).unwrap().player_state().unwrap().selecting);
    assert_eq!(h.scheduler.pending_replies(), 0);
}

#[test]
fn test_second_select_is_refused_while_one_is_open() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    h.set_mana(ann, 60);

    h.cast_and_select(ann, FORCE_RAM);
    h.send(ann, ClientPacket::Cast { spell: FORCE_RAM });
    assert!(h
        .texts(ann)
        .contains(&"Too busy to select another thing.".to_string()));
    assert_eq!(h.scheduler.pending_replies(), 1);
}

#[test]
fn test_select_survives_reconnect_until_its_own_deadline() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    h.set_mana(ann, 60);
    let first = h.cast_and_select(ann, FORCE_RAM);

    let handle = Arc::clone(&h.clients[&ann].handle);
    assert!(h.sessions.release(&handle));
    h.settle();
    h.connect(ann);
    h.drain(ann);

    // Still selecting: the reconnected player cannot open a second one.
    h.advance(Duration::from_secs(30));
    h.set_mana(ann, 60);
    h.send(ann, ClientPacket::Cast { spell: FORCE_RAM });
    let out = h.drain(ann);
    assert!(out.contains(&ServerPacket::text("Too busy to select another thing.")));
    assert!(!out.iter().any(|p| matches!(p, ServerPacket::Select { .. })));
    assert_eq!(h.scheduler.pending_replies(), 1);

    // The first select times out and frees the player.
    h.advance(Duration::from_secs(30));
    assert_eq!(
        h.texts(ann),
        vec!["Not interested in selecting? Got it! Aborting select."]
    );
    assert!(!h.game().world().player(ann).unwrap().player_state().unwrap().selecting);
    assert_eq!(h.scheduler.pending_replies(), 0);

    h.set_mana(ann, 60);
    let second = h.cast_and_select(ann, FORCE_RAM);
    assert_ne!(first, second);
    assert_eq!(h.scheduler.pending_replies(), 1);
    assert!(h.game().world().player(ann).unwrap().player_state().unwrap().selecting);
}

#[test]
fn test_select_refused_while_holding() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    h.set_mana(ann, 60);
    let stone = h.world().spawn_item(Item::new(ItemKind::Plain), START);
    h.send(ann, ClientPacket::Hold { item: stone });
    h.drain(ann);

    h.send(ann, ClientPacket::Cast { spell: FORCE_RAM });

    let out = h.drain(ann);
    assert!(out.contains(&ServerPacket::text(
        "Can't select when holding an item. Let it go! Let it go!"
    )));
    assert!(!out.iter().any(|p| matches!(p, ServerPacket::Select { .. })));
    assert_eq!(h.scheduler.pending_replies(), 0);
}

#[test]
fn test_force_ram_pushes_target_with_matching_reply() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    let bob = h.join(2, "Bob");
    h.set_mana(ann, 60);

    let correlation = h.cast_and_select(ann, FORCE_RAM);

    // A reply with the wrong correlation is not the answer.
    h.reply(
        ann,
        CorrelationId(correlation.0 + 1),
        ClientPacket::This {
            target_kind: 1,
            target: bob.entity_id().0,
        },
    );
    assert_eq!(h.position(bob), START);
    assert_eq!(h.scheduler.pending_replies(), 1);

    h.reply(
        ann,
        correlation,
        ClientPacket::This {
            target_kind: 1,
            target: bob.entity_id().0,
        },
    );

    // Ann faces west, so Bob lands one cell west.
    assert_eq!(h.position(bob), Position::new(9, 10));
    assert!(h
        .texts(bob)
        .contains(&"You've been shoved away by a wall of force".to_string()));
    assert!(h
        .texts(ann)
        .contains(&"A block of force hits the target and pushes it away!".to_string()));
    assert_eq!(h.game().world().player(ann).unwrap().mana, 45);
    assert_eq!(h.scheduler.pending_replies(), 0);
}

#[test]
fn test_force_ram_needs_a_mob_on_the_same_cell() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    let bob = h.join(2, "Bob");
    h.place(bob, Position::new(11, 10));
    h.set_mana(ann, 60);

    let c = h.cast_and_select(ann, FORCE_RAM);
    h.reply(
        ann,
        c,
        ClientPacket::This {
            target_kind: 1,
            target: bob.entity_id().0,
        },
    );
    assert_eq!(h.texts(ann), vec!["The target is too far away."]);

    let c = h.cast_and_select(ann, FORCE_RAM);
    h.reply(
        ann,
        c,
        ClientPacket::This {
            target_kind: 2,
            target: 0,
        },
    );
    assert_eq!(h.texts(ann), vec!["You can only shove away mobs."]);

    let c = h.cast_and_select(ann, FORCE_RAM);
    h.reply(
        ann,
        c,
        ClientPacket::This {
            target_kind: 1,
            target: 12345,
        },
    );
    assert_eq!(h.texts(ann), vec!["Missed the mob."]);
    assert_eq!(h.position(bob), Position::new(11, 10));
}

#[test]
fn test_bound_ring_teleports_back() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    h.set_mana(ann, 60);
    let ring = h
        .world()
        .create_item(Item::new(ItemKind::TeleportRing { binding: None }));
    h.world()
        .player_mut(ann)
        .unwrap()
        .player_state_mut()
        .unwrap()
        .inventory[0] = ring;

    // Unbound rings do nothing.
    h.send(ann, ClientPacket::Use { item: ring });
    assert_eq!(
        h.texts(ann),
        vec!["Ring not bound to any location. Use proper binding spell."]
    );

    let c = h.cast_and_select(ann, BIND_RING);
    h.reply(
        ann,
        c,
        ClientPacket::This {
            target_kind: 0,
            target: ring.0,
        },
    );
    assert_eq!(h.texts(ann), vec!["Starting location binding ritual..."]);
    for _ in 0..5 {
        h.advance(Duration::from_secs(1));
    }
    assert_eq!(
        h.texts(ann),
        vec![
            "Verifying location of planets...",
            "Measuring disturbance of force...",
            "Calming local aether fields...",
            "Probing nearby dimensions...",
            "Teleport ring bound to new location!",
        ]
    );
    let item = h.game().world().item(ring).unwrap();
    assert_eq!(item.kind, ItemKind::TeleportRing { binding: Some(START) });
    assert_eq!(item.name, "Teleport Ring (10, 10)");

    h.place(ann, Position::new(40, 40));
    h.send(ann, ClientPacket::Use { item: ring });
    h.advance(Duration::from_secs(1));
    h.advance(Duration::from_secs(1));
    assert_eq!(h.position(ann), Position::new(40, 40));
    h.advance(Duration::from_secs(1));

    assert_eq!(h.position(ann), START);
    assert_eq!(
        h.texts(ann),
        vec![
            "Teleporting in 3...",
            "Teleporting in 2...",
            "Teleporting in 1...",
            "You feel dizzy, but it seems the ring worked.",
        ]
    );
}

#[test]
fn test_ritual_fails_if_caster_moves() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    h.set_mana(ann, 60);
    let ring = h
        .world()
        .spawn_item(Item::new(ItemKind::TeleportRing { binding: None }), START);

    let c = h.cast_and_select(ann, BIND_RING);
    h.reply(
        ann,
        c,
        ClientPacket::This {
            target_kind: 0,
            target: ring.0,
        },
    );
    h.advance(Duration::from_secs(1));
    h.send(ann, ClientPacket::Move { step: 0 });
    for _ in 0..4 {
        h.advance(Duration::from_secs(1));
    }

    assert!(h
        .texts(ann)
        .contains(&"Ritual failed! Don't move next time.".to_string()));
    assert_eq!(
        h.game().world().item(ring).unwrap().kind,
        ItemKind::TeleportRing { binding: None }
    );
}

#[test]
fn test_bind_rejects_other_items() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    h.set_mana(ann, 60);
    let stone = h.world().spawn_item(Item::new(ItemKind::Plain), START);

    let c = h.cast_and_select(ann, BIND_RING);
    h.reply(
        ann,
        c,
        ClientPacket::This {
            target_kind: 0,
            target: stone.0,
        },
    );
    assert_eq!(h.texts(ann), vec!["Not a teleport ring, aborting spell."]);

    let c = h.cast_and_select(ann, BIND_RING);
    h.reply(
        ann,
        c,
        ClientPacket::This {
            target_kind: 3,
            target: 2,
        },
    );
    assert_eq!(h.texts(ann), vec!["Aborting teleport ring bind."]);
}

// =========================================================================
// Sessions and specials
// =========================================================================

#[test]
fn test_basic_info_request_sends_full_view() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");

    h.events.post_special(Special::BasicInfoRequest(ann));
    h.settle();

    let out = h.drain(ann);
    assert_eq!(
        out[0],
        ServerPacket::Info {
            hp: 40,
            hp_max: 40,
            mana: 10,
            mana_max: 60,
            name: "Ann".into(),
        }
    );
    assert!(matches!(&out[1], ServerPacket::Inventory(slots) if slots.len() == 10));
    assert_eq!(
        out[2],
        ServerPacket::Position {
            x: 10,
            y: 10,
            direction: Direction::West
        }
    );
    assert_eq!(
        out.last(),
        Some(&ServerPacket::text("Welcome Ann to \x12Arcane Sector\x0f!"))
    );
}

#[test]
fn test_release_hides_mob_and_reconnect_shows_it() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    let bob = h.join(2, "Bob");

    let handle = Arc::clone(&h.clients[&bob].handle);
    assert!(h.sessions.release(&handle));
    h.settle();
    assert!(!h.game().world().mobs_near(START, 0, None).contains(&bob.entity_id()));
    // Bob's avatar keeps its position while away.
    assert_eq!(h.position(bob), START);
    h.drain(ann);

    h.connect(bob);
    assert!(h.game().world().mobs_near(START, 0, None).contains(&bob.entity_id()));
    assert!(h
        .drain(ann)
        .iter()
        .any(|p| matches!(p, ServerPacket::Mobs(m) if m.iter().any(|v| v.id == bob.entity_id()))));
}

#[test]
fn test_takeover_kicks_old_connection() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    let old = Arc::clone(&h.clients[&ann].handle);

    let new = h.connect(ann);

    assert!(!old.is_active());
    assert!(new.is_active());
    // The superseded connection winding down does not evict the new one.
    assert!(!h.sessions.release(&old));
    h.settle();
    assert!(h.game().world().mobs_near(START, 0, None).contains(&ann.entity_id()));
    assert_eq!(h.game().world().registry().mob_count(), 1);
}

#[test]
fn test_create_player_is_idempotent_and_respects_disconnects() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");
    h.events.post_special(Special::CreatePlayer(CharacterProfile {
        player: ann,
        name: "Imposter".into(),
        portrait: 3,
    }));
    h.settle();
    assert_eq!(h.game().world().player(ann).unwrap().name, "Ann");

    // Created after its connection already left: exists but unseen.
    let ghost = PlayerId(9);
    h.events.post_special(Special::CreatePlayer(CharacterProfile {
        player: ghost,
        name: "Ghost".into(),
        portrait: 0,
    }));
    h.settle();
    assert!(h.game().world().player(ghost).is_some());
    assert!(!h.game().world().mobs_near(START, 0, None).contains(&ghost.entity_id()));
}

#[test]
fn test_packets_without_character_do_not_stop_the_loop() {
    let mut h = Harness::new();
    let ann = h.join(1, "Ann");

    h.events.post_packet(
        PlayerId(42),
        Inbound {
            correlation: CorrelationId::NONE,
            packet: ClientPacket::Move { step: 0 },
        },
    );
    h.settle();
    h.send(ann, ClientPacket::Move { step: 0 });

    assert_eq!(h.position(ann), Position::new(9, 10));
    assert_eq!(h.scheduler.metrics().handler_errors, 1);
}
