//! deterministic replay of the command log
//!
//! each envelope is authenticated against the viewer's cursor, folded into
//! the hash chain, then parsed and dispatched to a reducer that re-checks
//! game authorization against the envelope's actor. nothing in here returns
//! an error: a bad command contributes nothing, identically for every honest
//! viewer.

mod cards;
mod hidden;
mod players;

use tracing::debug;

use crate::auth::{validate_command, validate_command_signature};
use crate::chain;
use crate::command::Command;
use crate::context::{AuthTier, ViewerContext};
use crate::disclosure::{merge_overlay, resolve_overlay};
use crate::envelope::CommandEnvelope;
use crate::error::AuthFailure;
use crate::identity::ActorId;
use crate::state::{CommandLogMeta, CommandLogState};

/// why an authenticated command had no effect
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Denial {
    /// unknown type or payload shape
    Malformed,
    /// self-service command naming someone else
    NotSelf,
    NotOwner,
    NotController,
    NotHost,
    RoomLocked,
    UnknownPlayer,
    UnknownCard,
    UnknownZone,
    /// move/create rejected by the zone predicates
    Forbidden,
    NotPermutation,
    AlreadySet,
    IdTaken,
    InvalidValue,
}

pub(crate) type Transition = Result<(), Denial>;

/// what happened to one envelope
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// authenticated and applied
    Applied,
    /// authenticated (seq and chain advanced) but no state effect
    Denied(Denial),
    /// failed authentication; nothing advanced
    Quarantined(AuthFailure),
}

impl Outcome {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Outcome::Quarantined(_))
    }
}

/// per-command view handed to reducers
pub(crate) struct Scope<'a> {
    /// authenticated author
    pub actor: &'a ActorId,
    pub command_id: &'a str,
    pub viewer: &'a ViewerContext,
    /// a viewer overlay was merged into the payload
    pub disclosed: bool,
}

impl Scope<'_> {
    /// whether this viewer keeps identities of `owner`'s concealed cards
    pub fn owner_view(&self, owner: &ActorId) -> bool {
        self.viewer.is_owner_view(owner)
    }
}

/// authenticate one envelope and advance the cursor's seq table and chain.
/// no state is touched.
pub fn authenticate(
    meta: &mut CommandLogMeta,
    envelope: &CommandEnvelope,
    ctx: &ViewerContext,
) -> Result<(), AuthFailure> {
    let expected_seq = meta.expected_seq(&envelope.actor_id);
    match ctx.auth_tier() {
        AuthTier::Full => validate_command(envelope, &ctx.keys, None, Some(expected_seq))?,
        AuthTier::SignatureOnly => validate_command_signature(envelope, Some(expected_seq))?,
    }

    let log_hash =
        chain::advance(&meta.log_hash, envelope).map_err(|_| AuthFailure::InvalidEnvelope)?;
    meta.last_seq_by_actor
        .insert(envelope.actor_id.clone(), envelope.seq);
    meta.log_hash = log_hash;
    Ok(())
}

/// fold one envelope into the viewer's projection
pub fn apply_command_log(
    state: &mut CommandLogState,
    meta: &mut CommandLogMeta,
    envelope: &CommandEnvelope,
    ctx: &ViewerContext,
) -> Outcome {
    if let Err(reason) = authenticate(meta, envelope, ctx) {
        debug!(
            id = %envelope.id,
            actor = %envelope.actor_id,
            seq = envelope.seq,
            %reason,
            "quarantined command"
        );
        return Outcome::Quarantined(reason);
    }

    let overlay = resolve_overlay(envelope, ctx);
    let scope = Scope {
        actor: &envelope.actor_id,
        command_id: &envelope.id,
        viewer: ctx,
        disclosed: overlay.is_found(),
    };

    let transition = merge_overlay(envelope.payload_public.as_ref(), overlay)
        .and_then(|payload| Command::parse(&envelope.kind, payload))
        .ok_or(Denial::Malformed)
        .and_then(|command| dispatch(state, &scope, command));

    recompute_derived(state, ctx.max_players);

    match transition {
        Ok(()) => Outcome::Applied,
        Err(denial) => {
            debug!(
                id = %envelope.id,
                actor = %envelope.actor_id,
                kind = %envelope.kind,
                ?denial,
                "command had no effect"
            );
            Outcome::Denied(denial)
        }
    }
}

/// fold a run of entries, advancing `last_applied_index` for every one of
/// them whether or not it was accepted
pub fn replay_log<'a>(
    state: &mut CommandLogState,
    meta: &mut CommandLogMeta,
    entries: impl IntoIterator<Item = &'a CommandEnvelope>,
    ctx: &ViewerContext,
) {
    for envelope in entries {
        apply_command_log(state, meta, envelope, ctx);
        meta.last_applied_index += 1;
    }
}

/// replay from genesis into a fresh projection
pub fn replay_from_genesis<'a>(
    entries: impl IntoIterator<Item = &'a CommandEnvelope>,
    ctx: &ViewerContext,
) -> (CommandLogState, CommandLogMeta) {
    let mut state = CommandLogState::default();
    let mut meta = CommandLogMeta::default();
    replay_log(&mut state, &mut meta, entries, ctx);
    (state, meta)
}

fn dispatch(state: &mut CommandLogState, scope: &Scope<'_>, command: Command) -> Transition {
    match command {
        Command::PlayerJoin(p) => players::join(state, scope, p),
        Command::PlayerLeave(p) => players::leave(state, scope, p),
        Command::PlayerUpdate(p) => players::update(state, scope, p),
        Command::BattlefieldScaleSet(p) => players::set_scale(state, scope, p),
        Command::RoomLockSet(p) => players::set_room_lock(state, scope, p),
        Command::GlobalCounterSet(p) => players::set_global_counter(state, p),
        Command::ZoneReorder(p) => cards::reorder(state, scope, p),
        Command::CardCreate(p) => cards::create(state, scope, p),
        Command::CardUpdate(p) => cards::update(state, scope, p),
        Command::CardMove(p) => cards::move_card(state, scope, p),
        Command::CardRemove(p) => cards::remove(state, scope, p),
        Command::CardUntapAll(p) => cards::untap_all(state, scope, p),
        Command::CardDraw(p) => hidden::draw(state, scope, p),
        Command::LibraryShuffle(p) => hidden::shuffle(state, scope, p),
        Command::ZoneSetHidden(p) => hidden::set_hidden(state, scope, p),
        Command::CardRevealSet(p) => hidden::set_reveal(state, scope, p),
        Command::LibraryTopRevealSet(p) => hidden::set_top_reveal(state, scope, p),
    }
}

/// host, seat order and capacity follow from the player set
fn recompute_derived(state: &mut CommandLogState, max_players: usize) {
    let players = &state.players;
    state.player_order.retain(|id| players.contains_key(id));

    // ids never seen joining go last, in key order
    let unseen: Vec<ActorId> = players
        .keys()
        .filter(|id| !state.player_order.contains(id))
        .cloned()
        .collect();
    state.player_order.extend(unseen);

    state.room_host_id = state.player_order.first().cloned();
    state.room_over_capacity = state.players.len() > max_players;
    if state.players.is_empty() {
        state.room_locked_by_host = false;
    }
}
