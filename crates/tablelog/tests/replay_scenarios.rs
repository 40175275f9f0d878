//! end-to-end replay scenarios over hand-built logs

mod common;

use common::{cards, spectator_keys, Seat, SESSION};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tablelog::auth::validate_command;
use tablelog::envelope::Coverage;
use tablelog::replay::replay_from_genesis;
use tablelog::state::placeholder_id;
use tablelog::{
    apply_command_log, build_snapshot, load_latest_snapshot, AuthFailure, CommandDraft,
    CommandEnvelope, CommandLogMeta, CommandLogState, Outcome, ViewerContext, ZoneKind,
};

fn names(state: &CommandLogState, zone: &str) -> Vec<Option<String>> {
    state
        .cards_in(zone)
        .iter()
        .map(|c| c.identity.as_ref().map(|i| i.name.clone()))
        .collect()
}

/// zone layout and card placement with identities stripped
fn layout(state: &CommandLogState) -> Vec<(String, Vec<String>)> {
    state
        .zones
        .values()
        .map(|z| (z.id.clone(), z.card_ids.clone()))
        .collect()
}

fn game(a: &mut Seat, b: &mut Seat) -> Vec<CommandEnvelope> {
    let a_id = a.id();
    let b_id = b.id();
    let a_hand = a.zone(ZoneKind::Hand);
    let a_battlefield = a.zone(ZoneKind::Battlefield);
    vec![
        a.join("alice"),
        b.join("bob"),
        a.load_library(&["Forest", "Island", "Swamp", "Mountain"]),
        b.load_library(&["Plains", "Plains"]),
        a.sign(
            CommandDraft::raw("card.draw", Some(json!({"playerId": a_id, "count": 2})))
                .with_owner(json!({"cards": cards(&["Forest", "Island"])}))
                .with_spectator(json!({"cards": cards(&["Forest", "Island"])})),
        ),
        b.send("card.draw", json!({"playerId": b_id})),
        a.send(
            "card.move.public",
            json!({
                "cardId": placeholder_id(&a_hand, 0),
                "toZoneId": a_battlefield,
                "newCardId": "forest-1",
                "reveal": {"name": "Forest"},
            }),
        ),
        a.send("card.update.public", json!({"cardId": "forest-1", "tapped": true})),
        b.send("card.update.public", json!({"cardId": "forest-1", "tapped": false})),
        a.send("player.update", json!({"playerId": a_id, "life": 18})),
    ]
}

#[test]
fn test_replay_is_bit_identical() {
    let mut a = Seat::new(1);
    let mut b = Seat::new(2);
    let log = game(&mut a, &mut b);

    for ctx in [a.ctx(), b.ctx(), ViewerContext::bare_spectator(SESSION)] {
        let (first, first_meta) = replay_from_genesis(&log, &ctx);
        let (second, second_meta) = replay_from_genesis(&log, &ctx);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
        assert_eq!(first_meta, second_meta);
        assert_eq!(first_meta.last_applied_index, log.len());
    }
}

#[test]
fn test_viewers_agree_on_public_outcome() {
    let mut a = Seat::new(1);
    let mut b = Seat::new(2);
    let log = game(&mut a, &mut b);

    let mine = replay_from_genesis(&log, &a.ctx());
    let theirs = replay_from_genesis(&log, &b.ctx());
    let keyed = replay_from_genesis(&log, &ViewerContext::spectator(None, spectator_keys()));
    let bare = replay_from_genesis(&log, &ViewerContext::bare_spectator(SESSION));

    // authorization is decided by the envelope's actor, never the viewer
    for (state, meta) in [&theirs, &keyed, &bare] {
        assert_eq!(layout(state), layout(&mine.0));
        assert_eq!(state.players, mine.0.players);
        assert_eq!(state.room_host_id, mine.0.room_host_id);
        assert_eq!(meta.log_hash, mine.1.log_hash);
        assert!(state.cards["forest-1"].tapped);
    }

    let a_hand = a.zone(ZoneKind::Hand);
    assert_eq!(names(&mine.0, &a_hand), vec![Some("Island".into())]);
    assert_eq!(names(&keyed.0, &a_hand), vec![Some("Island".into())]);
    assert_eq!(names(&theirs.0, &a_hand), vec![None]);
    assert_eq!(names(&bare.0, &a_hand), vec![None]);
    assert_eq!(mine.0.players[&a.id()].life, 18);
}

#[test]
fn test_overlay_cannot_move_cards_per_viewer() {
    let mut a = Seat::new(1);
    let mut b = Seat::new(2);
    let mut c = Seat::new(3);
    let a_id = a.id();
    let graveyard = a.zone(ZoneKind::Graveyard);
    let exile = a.zone(ZoneKind::Exile);
    let battlefield = a.zone(ZoneKind::Battlefield);
    let mut log = vec![
        a.join("alice"),
        b.join("bob"),
        c.join("carol"),
        a.send(
            "card.create.public",
            json!({
                "cardId": "bear",
                "ownerId": a_id,
                "zoneId": battlefield,
                "identity": {"name": "Grizzly Bears"},
            }),
        ),
    ];
    log.push(
        a.sign(
            CommandDraft::raw(
                "card.move.public",
                Some(json!({"cardId": "bear", "toZoneId": graveyard})),
            )
            .with_recipient(b.id(), b.actor.encryption_public(), json!({"toZoneId": exile}))
            .with_owner(json!({"toZoneId": exile, "cardId": "elsewhere"})),
        ),
    );

    let mine = replay_from_genesis(&log, &a.ctx());
    let target = replay_from_genesis(&log, &b.ctx());
    let other = replay_from_genesis(&log, &c.ctx());
    for (state, meta) in [&mine, &target, &other] {
        assert_eq!(state.cards["bear"].zone_id, graveyard);
        assert!(state.zones[&exile].card_ids.is_empty());
        assert_eq!(layout(state), layout(&other.0));
        assert_eq!(meta.log_hash, other.1.log_hash);
    }
}

#[test]
fn test_float_payloads_survive_the_wire() {
    let mut a = Seat::new(1);
    let a_id = a.id();
    let battlefield = a.zone(ZoneKind::Battlefield);
    let mut rng = StdRng::seed_from_u64(0x7ab1e);
    let mut sent = vec![a.join("alice")];
    let mut received = sent.clone();

    for i in 0..1_500 {
        let x = match i % 3 {
            0 => rng.gen_range(-2_000.0..2_000.0),
            1 => (rng.gen_range(0..1_000_000) as f64) / 10_000.0 + rng.gen::<f64>() * 1e-9,
            _ => loop {
                let bits = f64::from_bits(rng.gen());
                if bits.is_finite() {
                    break bits;
                }
            },
        };
        let env = a.send(
            "card.create.public",
            json!({
                "cardId": format!("token-{i}"),
                "ownerId": a_id,
                "zoneId": battlefield,
                "position": {"x": x, "y": 0.1 + x / 3.0},
            }),
        );
        let wire = serde_json::to_string(&env).unwrap();
        let parsed: CommandEnvelope = serde_json::from_str(&wire).unwrap();
        assert_eq!(
            parsed.canonical_bytes(Coverage::Full).unwrap(),
            env.canonical_bytes(Coverage::Full).unwrap(),
            "x = {x:e}"
        );
        assert_eq!(
            validate_command(&parsed, &a.keys, Some(&a_id), Some(env.seq)),
            Ok(()),
            "x = {x:e}"
        );
        sent.push(env);
        received.push(parsed);
    }

    let (local, local_meta) = replay_from_genesis(&sent, &a.ctx());
    let (remote, remote_meta) = replay_from_genesis(&received, &a.ctx());
    assert_eq!(local.cards.len(), 1_500);
    assert_eq!(local, remote);
    assert_eq!(local_meta, remote_meta);
}

#[test]
fn test_reveal_to_one_recipient() {
    let mut a = Seat::new(1);
    let mut b = Seat::new(2);
    let mut c = Seat::new(3);
    let a_id = a.id();
    let hand = a.zone(ZoneKind::Hand);
    let mut log = vec![
        a.join("alice"),
        b.join("bob"),
        c.join("carol"),
        a.load_library(&["Counterspell", "Island"]),
        a.send("card.draw", json!({"playerId": a_id})),
    ];
    log.push(
        a.sign(
            CommandDraft::raw(
                "card.reveal.set",
                Some(json!({"cardId": placeholder_id(&hand, 0), "to": [b.id()]})),
            )
            .with_recipient(
                b.id(),
                b.actor.encryption_public(),
                json!({"identity": {"name": "Counterspell"}}),
            ),
        ),
    );

    let mine = replay_from_genesis(&log, &a.ctx()).0;
    let target = replay_from_genesis(&log, &b.ctx()).0;
    let other = replay_from_genesis(&log, &c.ctx()).0;

    assert_eq!(names(&mine, &hand), vec![Some("Counterspell".into())]);
    assert_eq!(names(&target, &hand), vec![Some("Counterspell".into())]);
    assert_eq!(names(&other, &hand), vec![None]);
    for state in [&mine, &target, &other] {
        let card = &state.cards[&placeholder_id(&hand, 0)];
        assert_eq!(card.revealed_to, vec![b.id()]);
        assert!(!card.revealed_to_all);
    }
}

#[test]
fn test_seq_is_strictly_monotonic() {
    let mut a = Seat::new(1);
    let a_id = a.id();
    let join = a.join("alice");
    let update = a.send("player.update", json!({"playerId": a_id, "life": 5}));

    let ctx = a.ctx();
    let mut state = CommandLogState::default();
    let mut meta = CommandLogMeta::default();

    // out of order: seq 2 before seq 1
    assert_eq!(
        apply_command_log(&mut state, &mut meta, &update, &ctx),
        Outcome::Quarantined(AuthFailure::SeqMismatch)
    );
    assert_eq!(apply_command_log(&mut state, &mut meta, &join, &ctx), Outcome::Applied);
    // replayed duplicate
    assert_eq!(
        apply_command_log(&mut state, &mut meta, &join, &ctx),
        Outcome::Quarantined(AuthFailure::SeqMismatch)
    );
    assert_eq!(apply_command_log(&mut state, &mut meta, &update, &ctx), Outcome::Applied);

    assert_eq!(state.players[&a_id].life, 5);
    assert_eq!(meta.expected_seq(&a_id), 3);
}

#[test]
fn test_foreign_envelope_under_own_actor_id_is_quarantined() {
    let mut a = Seat::new(1);
    let mut b = Seat::new(2);
    let mut forged = b.join("mallory");
    forged.actor_id = a.id();

    let (state, meta) = replay_from_genesis(&[forged, a.join("alice")], &a.ctx());
    assert_eq!(state.players.len(), 1);
    assert_eq!(state.players[&a.id()].name, "alice");
    assert_eq!(meta.expected_seq(&a.id()), 2);
}

#[test]
fn test_tampered_snapshot_is_skipped() {
    let mut a = Seat::new(1);
    let mut b = Seat::new(2);
    let log = vec![
        a.join("alice"),
        b.join("bob"),
        a.send("room.lock.set", json!({"locked": true})),
    ];

    let honest = build_snapshot(&log[..1], &[], &a.actor, &a.keys, 4, 10).unwrap();
    let mut tampered = build_snapshot(&log[..2], &[honest.clone()], &a.actor, &a.keys, 4, 20).unwrap();
    tampered.public_state["roomLockedByHost"] = json!(true);

    let viewer = ViewerContext::public(&spectator_keys());
    let loaded = load_latest_snapshot(&[honest.clone(), tampered], &log, &viewer).unwrap();
    assert_eq!(loaded.snapshot_id, honest.id);
    assert_eq!(loaded.meta.last_applied_index, 1);
    assert!(!loaded.state.room_locked_by_host);

    // a signed snapshot over a rewritten history fails the chain check
    let mut rewritten_a = Seat::new(1);
    let rewritten = vec![rewritten_a.join("not alice")];
    let lying = build_snapshot(&rewritten, &[], &a.actor, &a.keys, 4, 30).unwrap();
    assert!(load_latest_snapshot(&[lying], &log, &viewer).is_none());
}

#[test]
fn test_snapshot_plus_suffix_equals_full_replay() {
    let mut a = Seat::new(1);
    let mut b = Seat::new(2);
    let log = game(&mut a, &mut b);
    let keyed = ViewerContext::spectator(None, spectator_keys());

    let snapshot = build_snapshot(&log[..6], &[], &a.actor, &a.keys, 4, 0).unwrap();
    let loaded = load_latest_snapshot(&[snapshot], &log, &keyed).unwrap();
    let (mut state, mut meta) = (loaded.state, loaded.meta);
    tablelog::replay_log(&mut state, &mut meta, &log[6..], &keyed);

    let (full, full_meta) = replay_from_genesis(&log, &keyed);
    assert_eq!(state, full);
    assert_eq!(meta, full_meta);
}
