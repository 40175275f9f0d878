//! # tablelog
//!
//! authenticated command-log replay for shared tabletop sessions between
//! mutually distrustful peers.
//!
//! an external replication layer totally orders an append-only log of
//! commands but guarantees nothing about who wrote them. every peer
//! authenticates and replays the log itself, deriving its own projection of
//! the table.
//!
//! ## pipeline
//!
//! ```text
//!   envelope ──► mac (room secret) ──► ed25519 sig ──► seq check
//!                                                         │
//!                                                 hash chain advance
//!                                                         │
//!        overlay (owner / recipient / spectator) ──► typed command
//!                                                         │
//!                                         authorization ──► projection
//! ```
//!
//! ## security properties
//!
//! - actor ids are derived from signing keys, no registry needed
//! - a room-secret holder can forge macs but not another actor's signature
//! - the hash chain commits to every authenticated command in order
//! - hidden information is encrypted per audience inside the public log
//! - snapshots are trusted only after recomputing the chain they claim
//! - a bad command is a local no-op, identically for every honest peer
//!
//! ## usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tablelog::{
//!     ActorKeys, CommandDraft, MemoryLog, SessionKeys, SyncConfig, SyncEngine, ViewerContext,
//! };
//!
//! let actor = ActorKeys::generate();
//! let keys = SessionKeys::new("session-1")
//!     .with_player_key(&room_secret)?
//!     .with_owner_secret(&owner_secret)?;
//!
//! let engine = SyncEngine::new(
//!     Arc::new(MemoryLog::new()),
//!     Arc::new(MemoryLog::new()),
//!     ViewerContext::player(&actor, keys),
//!     Some(actor.clone()),
//!     SyncConfig::default(),
//! )?;
//!
//! engine.publish(CommandDraft::raw("player.join", Some(payload))).await?;
//! let state = engine.state().await;
//! ```

pub mod auth;
pub mod canonical;
pub mod chain;
pub mod command;
pub mod config;
pub mod context;
pub mod crypto;
pub mod disclosure;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod log;
pub mod publish;
pub mod replay;
pub mod rules;
pub mod snapshot;
pub mod state;
pub mod sync;

pub use command::Command;
pub use config::SyncConfig;
pub use context::{AuthTier, ViewerContext, ViewerRole};
pub use disclosure::Disclosure;
pub use envelope::{CommandEnvelope, RecipientCiphertext, SignedSnapshot};
pub use error::{AuthFailure, Error, Result};
pub use identity::{ActorId, ActorKeys, SessionKeys};
pub use log::{MemoryLog, ReplicatedLog};
pub use publish::CommandDraft;
pub use replay::{apply_command_log, replay_log, Denial, Outcome};
pub use snapshot::{build_snapshot, load_latest_snapshot, LoadedSnapshot};
pub use state::{Card, CardIdentity, CommandLogMeta, CommandLogState, Player, Zone, ZoneKind};
pub use sync::SyncEngine;
