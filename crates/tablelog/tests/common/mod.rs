//! shared fixtures for integration tests

#![allow(dead_code)]

use serde_json::{json, Value};
use tablelog::state::zone_id;
use tablelog::{ActorId, ActorKeys, CommandDraft, CommandEnvelope, SessionKeys, ViewerContext, ZoneKind};

pub const SESSION: &str = "table-1";
pub const ROOM_SECRET: &[u8] = b"shared room secret";
pub const SPECTATOR_SECRET: &[u8] = b"spectator secret";

/// one seated player signing commands by hand
pub struct Seat {
    pub actor: ActorKeys,
    pub keys: SessionKeys,
    pub seq: u64,
}

impl Seat {
    pub fn new(n: u8) -> Self {
        Self {
            actor: ActorKeys::from_seeds(&[n; 32], [n.wrapping_add(50); 32]),
            keys: player_keys(n),
            seq: 0,
        }
    }

    pub fn id(&self) -> ActorId {
        self.actor.actor_id().clone()
    }

    pub fn zone(&self, kind: ZoneKind) -> String {
        zone_id(&self.id(), kind)
    }

    pub fn ctx(&self) -> ViewerContext {
        ViewerContext::player(&self.actor, self.keys.clone())
    }

    pub fn sign(&mut self, draft: CommandDraft) -> CommandEnvelope {
        self.seq += 1;
        draft.seal(&self.actor, &self.keys, self.seq, self.seq * 1_000).unwrap()
    }

    pub fn send(&mut self, kind: &str, public: Value) -> CommandEnvelope {
        self.sign(CommandDraft::raw(kind, Some(public)))
    }

    pub fn join(&mut self, name: &str) -> CommandEnvelope {
        let id = self.id();
        self.send("player.join", json!({"playerId": id, "name": name}))
    }

    /// replace the library with `names`, top first
    pub fn load_library(&mut self, names: &[&str]) -> CommandEnvelope {
        let library = self.zone(ZoneKind::Library);
        self.sign(
            CommandDraft::raw(
                "zone.set.hidden",
                Some(json!({"zoneId": library, "count": names.len()})),
            )
            .with_owner(json!({"cards": cards(names)})),
        )
    }
}

pub fn player_keys(n: u8) -> SessionKeys {
    SessionKeys::new(SESSION)
        .with_player_key(ROOM_SECRET)
        .unwrap()
        .with_owner_secret(&[n; 16])
        .unwrap()
        .with_spectator_secret(SPECTATOR_SECRET)
        .unwrap()
}

pub fn spectator_keys() -> SessionKeys {
    SessionKeys::new(SESSION)
        .with_player_key(ROOM_SECRET)
        .unwrap()
        .with_spectator_secret(SPECTATOR_SECRET)
        .unwrap()
}

pub fn cards(names: &[&str]) -> Value {
    json!(names.iter().map(|n| json!({"name": n})).collect::<Vec<_>>())
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
