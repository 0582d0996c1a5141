mod common;

use client::input::Direction;
use client::{MemoryStore, SavedSession};
use common::{Answer, Harness, config};
use protocol::{ChunkCoord, Color};

fn started(cfg: client::Config, store: MemoryStore) -> Harness {
    let mut h = Harness::new(cfg, store, |net| {
        for x in 0..4 {
            for y in 0..4 {
                net.addresses.insert(ChunkCoord::new(x, y), format!("srv{}{}:9000", x, y));
            }
        }
    });
    h.tick();
    assert!(h.game.is_ready());
    h
}

/// Spawn point that sits between pellet centers.
fn idle_config() -> client::Config {
    let mut cfg = config();
    cfg.player.spawn_x = 41.0;
    cfg.player.spawn_y = 41.0;
    cfg
}

fn count(h: &Harness, kind: &str) -> usize {
    h.wire(0).borrow().sent_types().iter().filter(|t| *t == kind).count()
}

#[test]
fn eating_a_pellet_scores_and_persists() {
    // Default spawn (60, 60) is the center of cell (1, 1).
    let mut h = started(config(), MemoryStore::new());
    h.tick();

    let player = h.game.player().unwrap();
    assert_eq!(player.score, 10);
    assert_eq!(h.game.world().unwrap().ledger.len(), 255);

    let sent = h.wire(0).borrow().sent_json();
    let notice = sent.iter().find(|m| m["type"] == "pellet").expect("no pellet notice");
    assert_eq!(notice["data"]["pelletId"], "pellet_1_1");
    assert_eq!(notice["data"]["id"], "me");
    assert_eq!(notice["data"]["score"], 10);
    assert_eq!(h.store.current().unwrap().score, 10);

    // Server echo of our own pellet is a no-op; another player's removes one.
    h.deliver(r#"{"eatenPellets": ["pellet_1_1"]}"#);
    h.tick();
    assert_eq!(h.game.world().unwrap().ledger.len(), 255);
    h.deliver(r#"{"type": "pellet", "data": {"pelletId": "pellet_5_5", "id": "p2", "score": 10, "location": {"x": 0, "y": 0}}}"#);
    h.tick();
    assert_eq!(h.game.world().unwrap().ledger.len(), 254);
    assert_eq!(h.game.player().unwrap().score, 10);
}

#[test]
fn hazard_costs_a_life_then_grants_grace() {
    let mut h = started(idle_config(), MemoryStore::new());
    h.deliver(r#"{"ghosts": {"map0_g1": {"position": {"x": 41, "y": 41}}}}"#);

    h.tick();
    assert_eq!(h.game.player().unwrap().lives, 2);
    assert_eq!(count(&h, "ghost_collision"), 1);

    h.ticks(10);
    assert_eq!(h.game.player().unwrap().lives, 2);

    // Grace is 1500 ms; the ghost is still fresh enough to hit again.
    h.ticks(100);
    assert_eq!(h.game.player().unwrap().lives, 1);
    assert_eq!(count(&h, "ghost_collision"), 2);
}

#[test]
fn hazards_in_other_chunks_are_harmless() {
    let mut h = started(idle_config(), MemoryStore::new());
    // map4 is chunk (1, 0).
    h.deliver(r#"{"ghosts": {"map4_g1": {"position": {"x": 41, "y": 41}}}}"#);
    h.ticks(3);
    assert_eq!(h.game.player().unwrap().lives, 3);
    assert_eq!(h.game.remotes().len(), 1);
}

#[test]
fn losing_every_life_ends_the_game() {
    let mut cfg = idle_config();
    cfg.player.respawn_grace_ms = 0.0;
    let mut h = started(cfg, MemoryStore::new());
    assert!(h.store.current().is_some());

    h.deliver(r#"{"ghosts": {"map0_g1": {"position": {"x": 41, "y": 41}}}}"#);
    h.ticks(3);

    assert!(h.game.is_over());
    assert!(h.game.player().is_none());
    assert!(h.game.view().is_none());
    assert!(h.store.current().is_none(), "store should be cleared");
    assert!(h.game.remotes().is_empty());

    let wire = h.wire(0);
    let wire = wire.borrow();
    assert!(wire.closed);
    let types = wire.sent_types();
    assert_eq!(types.iter().filter(|t| *t == "ghost_collision").count(), 3);
    assert_eq!(types.last().unwrap(), "player_leaving");
    drop(wire);

    // Ticking after the end does nothing.
    let sent = h.wire(0).borrow().sent.len();
    h.ticks(5);
    assert_eq!(h.wire(0).borrow().sent.len(), sent);
}

#[test]
fn shutdown_keeps_saved_session() {
    let mut h = started(idle_config(), MemoryStore::new());
    h.game.shutdown();

    assert!(h.game.is_over());
    assert!(h.wire(0).borrow().closed);
    assert_eq!(h.wire(0).borrow().sent_types().last().unwrap(), "player_leaving");
    assert_eq!(h.store.current().unwrap().id, "me");
}

#[test]
fn saved_session_is_resumed() {
    let saved = SavedSession {
        id: "old-id".into(),
        color: Color::new(0, 128, 255),
        score: 120,
        x: 2,
        y: 1,
    };
    let h = started(idle_config(), MemoryStore::with(saved));

    assert_eq!(h.net.borrow().directory_calls, vec![ChunkCoord::new(2, 1)]);
    assert_eq!(h.game.session().unwrap().address, "srv21:9000");
    let player = h.game.player().unwrap();
    assert_eq!(player.id, "old-id");
    assert_eq!(player.score, 120);
    assert_eq!(player.chunk, ChunkCoord::new(2, 1));

    let sent = h.wire(0).borrow().sent_json();
    assert_eq!(sent[0]["type"], "player");
    assert_eq!(sent[0]["data"]["id"], "old-id");
    assert_eq!(sent[0]["data"]["score"], 120);
    assert_eq!(sent[0]["data"]["location"]["x"], 2);
}

#[test]
fn saved_session_outside_world_starts_fresh() {
    let saved = SavedSession {
        id: "old-id".into(),
        color: Color::new(0, 128, 255),
        score: 120,
        x: 9,
        y: 0,
    };
    let h = started(idle_config(), MemoryStore::with(saved));
    let player = h.game.player().unwrap();
    assert_eq!(player.id, "me");
    assert_eq!(player.score, 0);
    assert_eq!(player.chunk, ChunkCoord::new(0, 0));
    assert_eq!(h.store.current().unwrap().id, "me");
}

#[test]
fn join_is_retried_after_failure() {
    let mut h = Harness::new(config(), MemoryStore::new(), |net| {
        net.addresses.insert(ChunkCoord::new(0, 0), "a:9000".into());
        net.directory_script = vec![Answer::Fail];
    });
    h.tick();
    assert!(!h.game.is_ready());
    assert!(h.game.view().is_none());
    assert_eq!(h.connection_count(), 0);

    h.tick();
    assert!(h.game.is_ready());
    assert_eq!(h.connection_count(), 1);
}

#[test]
fn state_updates_are_throttled_while_idle() {
    let mut h = started(idle_config(), MemoryStore::new());
    assert_eq!(count(&h, "player"), 1);

    // 50 ms interval at 16 ms per tick.
    h.ticks(12);
    assert_eq!(count(&h, "player"), 4);

    h.game.input_mut().press(Direction::Right);
    h.ticks(5);
    assert_eq!(count(&h, "player"), 9);
}

#[test]
fn remote_players_render_and_expire() {
    let mut h = started(idle_config(), MemoryStore::new());
    h.deliver(
        r##"{"players": {"p2": {"position": {"x": 300, "y": 300}, "location": {"x": 0, "y": 0}, "color": "#ff0000", "score": 40}}}"##,
    );
    h.tick();

    let view = h.game.view().unwrap();
    assert_eq!(view.entities.len(), 1);
    let p2 = &view.entities[0];
    assert_eq!(p2.id, "p2");
    assert_eq!(p2.kind, "player");
    assert_eq!(p2.score, Some(40));
    assert_eq!(view.player.id, "me");
    assert_eq!(view.lives, 3);
    assert!(view.walls.is_empty());

    // Liveness timeout is 5000 ms.
    h.ticks(300);
    assert!(h.game.remotes().get("p2").is_some());
    h.ticks(20);
    assert!(h.game.remotes().get("p2").is_none());
}
