//! sync orchestrator
//!
//! owns one viewer's projection and cursor and keeps them current against
//! the command and snapshot logs. every mutating operation goes through one
//! fifo async lock, so overlapping change notifications queue up and each
//! one observes the settled result of the previous.

use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::context::{ViewerContext, ViewerRole};
use crate::envelope::{CommandEnvelope, SignedSnapshot};
use crate::identity::{ActorId, ActorKeys};
use crate::log::ReplicatedLog;
use crate::publish::{now_ms, CommandDraft};
use crate::replay::{apply_command_log, replay_log};
use crate::snapshot::{build_snapshot, load_latest_snapshot, prune_indices};
use crate::state::{CommandLogMeta, CommandLogState};
use crate::{Error, Result};

/// log length and wall clock of the last emission attempt
#[derive(Clone, Copy, Debug)]
struct EmitMark {
    log_len: usize,
    at_ms: u64,
}

struct Inner {
    ctx: ViewerContext,
    /// signing identity; spectators have none
    author: Option<ActorKeys>,
    state: CommandLogState,
    meta: CommandLogMeta,
    last_emit: Option<EmitMark>,
}

impl Inner {
    fn reset(&mut self) {
        self.state = CommandLogState::default();
        self.meta = CommandLogMeta::default();
    }

    /// adopt the newest verifiable snapshot, then replay the suffix
    fn catch_up<C, S>(&mut self, commands: &C, snapshots: &S) -> usize
    where
        C: ReplicatedLog<CommandEnvelope> + ?Sized,
        S: ReplicatedLog<SignedSnapshot> + ?Sized,
    {
        let log = commands.read_from(0);
        let candidates = snapshots.read_from(0);
        if let Some(loaded) = load_latest_snapshot(&candidates, &log, &self.ctx) {
            info!(
                snapshot = %loaded.snapshot_id,
                up_to = loaded.meta.last_applied_index,
                "adopted snapshot"
            );
            self.state = loaded.state;
            self.meta = loaded.meta;
        }

        let start = self.meta.last_applied_index.min(log.len());
        replay_log(&mut self.state, &mut self.meta, &log[start..], &self.ctx);
        log.len() - start
    }

    fn apply_new<C, S>(&mut self, commands: &C, snapshots: &S) -> usize
    where
        C: ReplicatedLog<CommandEnvelope> + ?Sized,
        S: ReplicatedLog<SignedSnapshot> + ?Sized,
    {
        let observed = commands.len();
        if observed < self.meta.last_applied_index {
            info!(
                observed,
                applied = self.meta.last_applied_index,
                "command log shrank, rebuilding"
            );
            self.reset();
            return self.catch_up(commands, snapshots);
        }

        let entries = commands.read_from(self.meta.last_applied_index);
        replay_log(&mut self.state, &mut self.meta, &entries, &self.ctx);
        entries.len()
    }

    fn author(&self) -> Result<&ActorKeys> {
        match (&self.author, self.ctx.role) {
            (Some(author), ViewerRole::Player) => Ok(author),
            _ => Err(Error::NotAnAuthor),
        }
    }
}

/// keeps one viewer's projection in sync with the replicated logs
pub struct SyncEngine<C, S> {
    commands: Arc<C>,
    snapshots: Arc<S>,
    config: SyncConfig,
    inner: Mutex<Inner>,
}

impl<C, S> SyncEngine<C, S>
where
    C: ReplicatedLog<CommandEnvelope>,
    S: ReplicatedLog<SignedSnapshot>,
{
    /// `author` is the signing identity of a player; `None` for spectators
    pub fn new(
        commands: Arc<C>,
        snapshots: Arc<S>,
        viewer: ViewerContext,
        author: Option<ActorKeys>,
        config: SyncConfig,
    ) -> Result<Self> {
        config.validate()?;
        let ctx = viewer.with_max_players(config.max_players);
        Ok(Self {
            commands,
            snapshots,
            config,
            inner: Mutex::new(Inner {
                ctx,
                author,
                state: CommandLogState::default(),
                meta: CommandLogMeta::default(),
                last_emit: None,
            }),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// current projection
    pub async fn state(&self) -> CommandLogState {
        self.inner.lock().await.state.clone()
    }

    /// current replay cursor
    pub async fn meta(&self) -> CommandLogMeta {
        self.inner.lock().await.meta.clone()
    }

    pub async fn viewer_id(&self) -> Option<ActorId> {
        self.inner.lock().await.ctx.viewer_id.clone()
    }

    /// switch viewer; a different identity or role discards everything
    /// derived so far and rebuilds from scratch
    pub async fn set_viewer(&self, viewer: ViewerContext, author: Option<ActorKeys>) -> usize {
        let mut inner = self.inner.lock().await;
        let viewer = viewer.with_max_players(self.config.max_players);
        let changed = inner.ctx.trust_key() != viewer.trust_key();
        inner.ctx = viewer;
        inner.author = author;
        if !changed {
            return inner.apply_new(&*self.commands, &*self.snapshots);
        }

        info!(role = ?inner.ctx.role, viewer = ?inner.ctx.viewer_id, "viewer changed, resetting");
        inner.reset();
        inner.last_emit = None;
        inner.catch_up(&*self.commands, &*self.snapshots)
    }

    /// rebuild from the newest usable snapshot (or genesis)
    pub async fn full_sync(&self) -> usize {
        let mut inner = self.inner.lock().await;
        inner.reset();
        inner.catch_up(&*self.commands, &*self.snapshots)
    }

    /// replay entries appended since the last call
    pub async fn apply_new_commands(&self) -> usize {
        let mut inner = self.inner.lock().await;
        inner.apply_new(&*self.commands, &*self.snapshots)
    }

    /// emit a snapshot when both thresholds are met. one attempt per call,
    /// recorded even if building fails.
    pub async fn maybe_emit_snapshot(&self) -> Result<Option<SignedSnapshot>> {
        let mut inner = self.inner.lock().await;
        if inner.author().is_err() || !self.config.emit_snapshots {
            return Ok(None);
        }

        let log_len = self.commands.len();
        let now = now_ms();
        let (new_commands, since_last) = match inner.last_emit {
            Some(mark) => (
                log_len.saturating_sub(mark.log_len),
                now.saturating_sub(mark.at_ms),
            ),
            None => (log_len, u64::MAX),
        };
        if !self.config.snapshot_due(new_commands, since_last) {
            return Ok(None);
        }

        inner.last_emit = Some(EmitMark {
            log_len,
            at_ms: now,
        });
        self.emit_locked(&mut inner, now).map(Some)
    }

    /// emit a snapshot now, ignoring the throttle
    pub async fn emit_snapshot(&self) -> Result<SignedSnapshot> {
        let mut inner = self.inner.lock().await;
        let now = now_ms();
        inner.last_emit = Some(EmitMark {
            log_len: self.commands.len(),
            at_ms: now,
        });
        self.emit_locked(&mut inner, now)
    }

    fn emit_locked(&self, inner: &mut Inner, now: u64) -> Result<SignedSnapshot> {
        let author = inner.author()?.clone();
        let log = self.commands.read_from(0);
        if inner.meta.last_applied_index != log.len() {
            return Err(Error::NotCaughtUp {
                applied: inner.meta.last_applied_index,
                observed: log.len(),
            });
        }

        let previous = self.snapshots.read_from(0);
        let snapshot = build_snapshot(
            &log,
            &previous,
            &author,
            &inner.ctx.keys,
            self.config.max_players,
            now,
        )?;
        self.snapshots.push(snapshot.clone());
        info!(id = %snapshot.id, up_to = snapshot.up_to_index, seq = snapshot.seq, "emitted snapshot");

        let doomed = prune_indices(&self.snapshots.read_from(0), self.config.snapshots_kept_per_actor);
        for index in doomed {
            self.snapshots.delete(index, 1);
        }
        Ok(snapshot)
    }

    /// sign, append and apply a command as the local player.
    ///
    /// if local replay does not authenticate the entry (another writer took
    /// the seq first), it is retracted while still the log tail and
    /// [`Error::Rejected`] is returned.
    pub async fn publish(&self, draft: CommandDraft) -> Result<CommandEnvelope> {
        let mut inner = self.inner.lock().await;
        let author = inner.author()?.clone();
        inner.apply_new(&*self.commands, &*self.snapshots);

        let seq = inner.meta.expected_seq(author.actor_id());
        let envelope = draft.seal(&author, &inner.ctx.keys, seq, now_ms())?;
        self.commands.push(envelope.clone());

        let start = inner.meta.last_applied_index.min(self.commands.len());
        let mut own_outcome = None;
        for entry in self.commands.read_from(start) {
            let Inner {
                ctx, state, meta, ..
            } = &mut *inner;
            let outcome = apply_command_log(state, meta, &entry, ctx);
            meta.last_applied_index += 1;
            if entry.id == envelope.id {
                own_outcome = Some(outcome);
            }
        }

        match own_outcome {
            Some(outcome) if outcome.is_authenticated() => {
                debug!(id = %envelope.id, kind = %envelope.kind, seq, ?outcome, "published");
                Ok(envelope)
            }
            outcome => {
                let reason = match outcome {
                    Some(outcome) => format!("{outcome:?}"),
                    None => "not observed after append".to_string(),
                };
                if retract_if_tail(&*self.commands, &envelope.id) {
                    // a quarantined entry only moved the cursor
                    inner.meta.last_applied_index = inner.meta.last_applied_index.saturating_sub(1);
                    warn!(id = %envelope.id, %reason, "retracted own command");
                }
                Err(Error::Rejected {
                    id: envelope.id,
                    reason,
                })
            }
        }
    }

    /// drive `apply_new_commands` and snapshot emission from log change
    /// notifications until shutdown or until a log's notifier closes
    pub async fn run(&self, mut shutdown: oneshot::Receiver<()>) {
        let mut commands_rx = self.commands.subscribe();
        let mut snapshots_rx = self.snapshots.subscribe();
        self.full_sync().await;

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                changed = commands_rx.changed() => if changed.is_err() { break },
                changed = snapshots_rx.changed() => if changed.is_err() { break },
            }
            self.apply_new_commands().await;
            if let Err(e) = self.maybe_emit_snapshot().await {
                debug!(error = %e, "snapshot emission skipped");
            }
        }
    }
}

/// delete the entry with `id` if it is the last one in the log
pub fn retract_if_tail<C>(commands: &C, id: &str) -> bool
where
    C: ReplicatedLog<CommandEnvelope> + ?Sized,
{
    let Some(last) = commands.len().checked_sub(1) else {
        return false;
    };
    match commands.get(last) {
        Some(entry) if entry.id == id => {
            commands.delete(last, 1);
            true
        }
        _ => false,
    }
}
