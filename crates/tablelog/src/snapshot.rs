//! signed checkpoints of the command log
//!
//! a snapshot carries one projection per visibility class: the public state
//! in the clear, the author's own projection under its owner key, and
//! optionally the spectator projection under the spectator key.
//!
//! a signature only proves who wrote a snapshot. consumers trust its content
//! only after recomputing the hash chain over the covered prefix themselves.

use std::collections::BTreeMap;

use tracing::debug;

use crate::auth::{sign_snapshot, validate_snapshot, validate_snapshot_signature};
use crate::context::{AuthTier, ViewerContext, ViewerRole};
use crate::crypto::{open, seal};
use crate::envelope::{CommandEnvelope, SignedSnapshot, ENVELOPE_VERSION};
use crate::error::AuthFailure;
use crate::identity::{ActorKeys, SessionKeys};
use crate::publish::new_envelope_id;
use crate::replay::{authenticate, replay_from_genesis};
use crate::state::{CommandLogMeta, CommandLogState};
use crate::{Error, Result};

/// why a snapshot candidate was skipped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// covers more entries than this viewer has observed
    BeyondLog,
    Auth(AuthFailure),
    /// recomputed chain head differs from `logHash`
    HashMismatch,
    /// no branch this viewer can read
    NoBranch,
    /// branch decrypted but did not parse
    Corrupt,
}

/// a verified snapshot ready to adopt
#[derive(Clone, Debug)]
pub struct LoadedSnapshot {
    pub snapshot_id: String,
    pub state: CommandLogState,
    pub meta: CommandLogMeta,
}

/// build and sign a snapshot over the whole of `log`.
///
/// runs three independent replays from genesis: public, the author's own
/// view, and (when the spectator key is held) the spectator view.
pub fn build_snapshot(
    log: &[CommandEnvelope],
    previous: &[SignedSnapshot],
    actor: &ActorKeys,
    keys: &SessionKeys,
    max_players: usize,
    ts: u64,
) -> Result<SignedSnapshot> {
    let owner_key = keys.owner_key().ok_or(Error::MissingKey("owner key"))?;

    let public_ctx = ViewerContext::public(keys).with_max_players(max_players);
    let (public_state, meta) = replay_from_genesis(log, &public_ctx);

    let owner_ctx = ViewerContext::player(actor, keys.clone()).with_max_players(max_players);
    let (owner_state, _) = replay_from_genesis(log, &owner_ctx);
    let mut owner_enc_by_player = BTreeMap::new();
    owner_enc_by_player.insert(
        actor.actor_id().clone(),
        seal(owner_key, &serde_json::to_vec(&owner_state)?)?,
    );

    let spectator_enc = match keys.spectator_key() {
        Some(key) => {
            let ctx = ViewerContext::synthetic_spectator(keys).with_max_players(max_players);
            let (state, _) = replay_from_genesis(log, &ctx);
            Some(seal(key, &serde_json::to_vec(&state)?)?)
        }
        None => None,
    };

    let seq = previous
        .iter()
        .filter(|s| &s.actor_id == actor.actor_id())
        .map(|s| s.seq)
        .max()
        .unwrap_or(0)
        + 1;

    let mut snapshot = SignedSnapshot {
        v: ENVELOPE_VERSION,
        id: new_envelope_id(),
        actor_id: actor.actor_id().clone(),
        seq,
        ts,
        up_to_index: log.len(),
        log_hash: meta.log_hash,
        public_state: serde_json::to_value(&public_state)?,
        owner_enc_by_player: Some(owner_enc_by_player),
        spectator_enc,
        pub_key: actor.public_key_b64(),
        mac: None,
        sig: None,
        room_sig: None,
    };
    sign_snapshot(&mut snapshot, actor, keys)?;
    Ok(snapshot)
}

/// verify one candidate and decrypt the branch this viewer may read
pub fn verify_snapshot(
    snapshot: &SignedSnapshot,
    log: &[CommandEnvelope],
    ctx: &ViewerContext,
) -> std::result::Result<LoadedSnapshot, Rejection> {
    if snapshot.up_to_index > log.len() {
        return Err(Rejection::BeyondLog);
    }

    match ctx.auth_tier() {
        AuthTier::Full => validate_snapshot(snapshot, &ctx.keys, None),
        AuthTier::SignatureOnly => validate_snapshot_signature(snapshot),
    }
    .map_err(Rejection::Auth)?;

    let meta = recompute_prefix(&log[..snapshot.up_to_index], ctx);
    if meta.log_hash != snapshot.log_hash {
        return Err(Rejection::HashMismatch);
    }

    let state = decrypt_branch(snapshot, ctx)?;
    Ok(LoadedSnapshot {
        snapshot_id: snapshot.id.clone(),
        state,
        meta,
    })
}

/// newest usable snapshot: highest `upToIndex` first, newest `ts` on ties.
/// candidates failing verification are skipped entirely.
pub fn load_latest_snapshot(
    snapshots: &[SignedSnapshot],
    log: &[CommandEnvelope],
    ctx: &ViewerContext,
) -> Option<LoadedSnapshot> {
    let mut candidates: Vec<&SignedSnapshot> = snapshots
        .iter()
        .filter(|s| s.up_to_index <= log.len())
        .collect();
    candidates.sort_by(|a, b| b.up_to_index.cmp(&a.up_to_index).then(b.ts.cmp(&a.ts)));

    for candidate in candidates {
        match verify_snapshot(candidate, log, ctx) {
            Ok(loaded) => return Some(loaded),
            Err(reason) => debug!(
                id = %candidate.id,
                actor = %candidate.actor_id,
                up_to = candidate.up_to_index,
                ?reason,
                "skipping snapshot"
            ),
        }
    }
    None
}

/// rebuild the replay cursor over a prefix by running authentication only
pub fn recompute_prefix(prefix: &[CommandEnvelope], ctx: &ViewerContext) -> CommandLogMeta {
    let mut meta = CommandLogMeta::default();
    for envelope in prefix {
        // quarantined entries simply leave the cursor where it is
        let _ = authenticate(&mut meta, envelope, ctx);
        meta.last_applied_index += 1;
    }
    meta
}

fn decrypt_branch(
    snapshot: &SignedSnapshot,
    ctx: &ViewerContext,
) -> std::result::Result<CommandLogState, Rejection> {
    let plaintext = match ctx.role {
        ViewerRole::Player => {
            let viewer = ctx.viewer_id.as_ref().ok_or(Rejection::NoBranch)?;
            let key = ctx.keys.owner_key().ok_or(Rejection::NoBranch)?;
            let blob = snapshot
                .owner_enc_by_player
                .as_ref()
                .and_then(|m| m.get(viewer))
                .ok_or(Rejection::NoBranch)?;
            open(key, blob).map_err(|_| Rejection::NoBranch)?
        }
        ViewerRole::Spectator if ctx.keys.spectator_key().is_some() => {
            let key = ctx.keys.spectator_key().ok_or(Rejection::NoBranch)?;
            let blob = snapshot.spectator_enc.as_ref().ok_or(Rejection::NoBranch)?;
            open(key, blob).map_err(|_| Rejection::NoBranch)?
        }
        ViewerRole::Spectator | ViewerRole::BareSpectator => {
            return serde_json::from_value(snapshot.public_state.clone())
                .map_err(|_| Rejection::Corrupt);
        }
    };
    serde_json::from_slice(&plaintext).map_err(|_| Rejection::Corrupt)
}

/// indices to delete so that at most `keep` snapshots per author remain,
/// newest by `ts` kept. returned highest index first so they can be deleted
/// one by one without shifting the rest.
pub fn prune_indices(snapshots: &[SignedSnapshot], keep: usize) -> Vec<usize> {
    let mut by_actor: BTreeMap<_, Vec<usize>> = BTreeMap::new();
    for (i, s) in snapshots.iter().enumerate() {
        by_actor.entry(&s.actor_id).or_default().push(i);
    }

    let mut doomed = Vec::new();
    for mut indices in by_actor.into_values() {
        indices.sort_by(|&a, &b| snapshots[b].ts.cmp(&snapshots[a].ts).then(b.cmp(&a)));
        doomed.extend(indices.into_iter().skip(keep));
    }
    doomed.sort_unstable_by(|a, b| b.cmp(a));
    doomed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ActorId;
    use crate::publish::CommandDraft;
    use crate::state::{zone_id, ZoneKind};
    use serde_json::json;

    fn keys(owner: &[u8]) -> SessionKeys {
        SessionKeys::new("table")
            .with_player_key(b"room")
            .unwrap()
            .with_owner_secret(owner)
            .unwrap()
            .with_spectator_secret(b"spectators")
            .unwrap()
    }

    fn sample_log(actor: &ActorKeys, keys: &SessionKeys) -> Vec<CommandEnvelope> {
        let id = actor.actor_id().clone();
        let library = zone_id(&id, ZoneKind::Library);
        vec![
            CommandDraft::raw("player.join", Some(json!({"playerId": id, "name": "alice"})))
                .seal(actor, keys, 1, 0)
                .unwrap(),
            CommandDraft::raw("zone.set.hidden", Some(json!({"zoneId": library, "count": 2})))
                .with_owner(json!({"cards": [{"name": "Forest"}, {"name": "Island"}]}))
                .with_spectator(json!({"cards": [{"name": "Forest"}, {"name": "Island"}]}))
                .seal(actor, keys, 2, 0)
                .unwrap(),
        ]
    }

    fn snap(actor: &str, ts: u64) -> SignedSnapshot {
        SignedSnapshot {
            v: 1,
            id: format!("{actor}-{ts}"),
            actor_id: ActorId::from(actor),
            seq: 1,
            ts,
            up_to_index: 0,
            log_hash: "h".into(),
            public_state: json!({}),
            owner_enc_by_player: None,
            spectator_enc: None,
            pub_key: "pk".into(),
            mac: None,
            sig: None,
            room_sig: None,
        }
    }

    #[test]
    fn test_round_trip_per_role() {
        let actor = ActorKeys::from_seeds(&[1u8; 32], [2u8; 32]);
        let keys = keys(b"alice");
        let log = sample_log(&actor, &keys);
        let snapshot = build_snapshot(&log, &[], &actor, &keys, 4, 10).unwrap();
        assert_eq!(snapshot.up_to_index, 2);
        assert_eq!(snapshot.seq, 1);

        let owner_ctx = ViewerContext::player(&actor, keys.clone());
        let loaded = verify_snapshot(&snapshot, &log, &owner_ctx).unwrap();
        let (full, full_meta) = replay_from_genesis(&log, &owner_ctx);
        assert_eq!(loaded.state, full);
        assert_eq!(loaded.meta, full_meta);

        let spectator_ctx = ViewerContext::spectator(None, keys.without_owner_key());
        let loaded = verify_snapshot(&snapshot, &log, &spectator_ctx).unwrap();
        assert_eq!(loaded.state, replay_from_genesis(&log, &spectator_ctx).0);

        let bare = ViewerContext::bare_spectator("table");
        let loaded = verify_snapshot(&snapshot, &log, &bare).unwrap();
        assert_eq!(loaded.state, replay_from_genesis(&log, &bare).0);
    }

    #[test]
    fn test_other_players_have_no_branch() {
        let actor = ActorKeys::from_seeds(&[1u8; 32], [2u8; 32]);
        let other = ActorKeys::from_seeds(&[3u8; 32], [4u8; 32]);
        let keys = keys(b"alice");
        let log = sample_log(&actor, &keys);
        let snapshot = build_snapshot(&log, &[], &actor, &keys, 4, 10).unwrap();

        let ctx = ViewerContext::player(&other, self::keys(b"bob"));
        assert_eq!(verify_snapshot(&snapshot, &log, &ctx).unwrap_err(), Rejection::NoBranch);
    }

    #[test]
    fn test_tampered_state_or_prefix_rejected() {
        let actor = ActorKeys::from_seeds(&[1u8; 32], [2u8; 32]);
        let keys = keys(b"alice");
        let log = sample_log(&actor, &keys);
        let snapshot = build_snapshot(&log, &[], &actor, &keys, 4, 10).unwrap();
        let ctx = ViewerContext::player(&actor, keys.clone());

        let mut tampered = snapshot.clone();
        tampered.public_state["roomLockedByHost"] = json!(true);
        assert!(matches!(
            verify_snapshot(&tampered, &log, &ctx),
            Err(Rejection::Auth(AuthFailure::MacMismatch))
        ));

        // honest snapshot, different history
        let mut rewritten = log.clone();
        rewritten[1] = CommandDraft::raw("player.update", Some(json!({"playerId": actor.actor_id(), "life": 3})))
            .seal(&actor, &keys, 2, 0)
            .unwrap();
        assert_eq!(
            verify_snapshot(&snapshot, &rewritten, &ctx).unwrap_err(),
            Rejection::HashMismatch
        );

        assert_eq!(
            verify_snapshot(&snapshot, &log[..1], &ctx).unwrap_err(),
            Rejection::BeyondLog
        );
    }

    #[test]
    fn test_newest_valid_candidate_wins() {
        let actor = ActorKeys::from_seeds(&[1u8; 32], [2u8; 32]);
        let keys = keys(b"alice");
        let log = sample_log(&actor, &keys);
        let early = build_snapshot(&log[..1], &[], &actor, &keys, 4, 5).unwrap();
        let late = build_snapshot(&log, std::slice::from_ref(&early), &actor, &keys, 4, 6).unwrap();
        assert_eq!(late.seq, 2);

        let mut broken = late.clone();
        broken.log_hash = crate::chain::genesis_hash();

        let ctx = ViewerContext::player(&actor, keys.clone());
        let loaded = load_latest_snapshot(&[early.clone(), late.clone()], &log, &ctx).unwrap();
        assert_eq!(loaded.snapshot_id, late.id);
        assert_eq!(loaded.meta.last_applied_index, 2);

        let loaded = load_latest_snapshot(&[early.clone(), broken], &log, &ctx).unwrap();
        assert_eq!(loaded.snapshot_id, early.id);
        assert_eq!(loaded.meta.last_applied_index, 1);

        assert!(load_latest_snapshot(&[late], &log[..1], &ctx).is_none());
    }

    #[test]
    fn test_prune_keeps_newest_per_actor() {
        let snapshots = vec![
            snap("a", 1),
            snap("b", 1),
            snap("a", 4),
            snap("a", 2),
            snap("a", 3),
            snap("b", 2),
        ];
        // "a" at ts 1 is the only one beyond three
        assert_eq!(prune_indices(&snapshots, 3), vec![0]);
        assert_eq!(prune_indices(&snapshots, 1), vec![4, 3, 1, 0]);
        assert!(prune_indices(&snapshots[..2], 3).is_empty());
    }
}
