//! viewer context: who is replaying, with which keys, under which trust tier

use std::fmt;

use crate::identity::{ActorId, ActorKeys, SessionKeys};

/// default seat cap before a room is flagged over capacity
pub const DEFAULT_MAX_PLAYERS: usize = 4;

/// explicit viewer role. the authentication tier follows from the role,
/// never from which keys happen to be present.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewerRole {
    /// seated player holding the room secret
    Player,
    /// spectator holding the room secret (and possibly the spectator key)
    Spectator,
    /// spectator without the room secret
    BareSpectator,
}

/// which validation path replay uses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthTier {
    /// mac + signature
    Full,
    /// signature + strict seq only; proves authorship, not room membership
    SignatureOnly,
}

impl ViewerRole {
    pub fn auth_tier(self) -> AuthTier {
        match self {
            ViewerRole::Player | ViewerRole::Spectator => AuthTier::Full,
            ViewerRole::BareSpectator => AuthTier::SignatureOnly,
        }
    }
}

/// everything a replay needs to know about its viewer
#[derive(Clone)]
pub struct ViewerContext {
    pub role: ViewerRole,
    pub viewer_id: Option<ActorId>,
    pub keys: SessionKeys,
    /// x25519 secret for recipient-targeted payloads
    pub recipient_secret: Option<[u8; 32]>,
    pub max_players: usize,
}

impl ViewerContext {
    /// a seated player viewing with their own keys
    pub fn player(actor: &ActorKeys, keys: SessionKeys) -> Self {
        Self {
            role: ViewerRole::Player,
            viewer_id: Some(actor.actor_id().clone()),
            keys,
            recipient_secret: Some(*actor.encryption_secret()),
            max_players: DEFAULT_MAX_PLAYERS,
        }
    }

    /// a spectator inside the room; `actor` enables recipient-targeted reveals
    pub fn spectator(actor: Option<&ActorKeys>, keys: SessionKeys) -> Self {
        Self {
            role: ViewerRole::Spectator,
            viewer_id: actor.map(|a| a.actor_id().clone()),
            keys,
            recipient_secret: actor.map(|a| *a.encryption_secret()),
            max_players: DEFAULT_MAX_PLAYERS,
        }
    }

    /// a spectator with no room secret at all
    pub fn bare_spectator(session_id: impl Into<String>) -> Self {
        Self {
            role: ViewerRole::BareSpectator,
            viewer_id: None,
            keys: SessionKeys::new(session_id),
            recipient_secret: None,
            max_players: DEFAULT_MAX_PLAYERS,
        }
    }

    /// synthetic viewer that decrypts nothing: produces the public projection
    pub fn public(keys: &SessionKeys) -> Self {
        Self {
            role: ViewerRole::Spectator,
            viewer_id: None,
            keys: keys.room_only(),
            recipient_secret: None,
            max_players: DEFAULT_MAX_PLAYERS,
        }
    }

    /// synthetic keyed spectator: sees spectator payloads only
    pub fn synthetic_spectator(keys: &SessionKeys) -> Self {
        Self {
            role: ViewerRole::Spectator,
            viewer_id: None,
            keys: keys.without_owner_key(),
            recipient_secret: None,
            max_players: DEFAULT_MAX_PLAYERS,
        }
    }

    pub fn with_max_players(mut self, max_players: usize) -> Self {
        self.max_players = max_players;
        self
    }

    pub fn auth_tier(&self) -> AuthTier {
        self.role.auth_tier()
    }

    /// identity of the trust context; a change forces a hard reset
    pub fn trust_key(&self) -> (ViewerRole, Option<ActorId>) {
        (self.role, self.viewer_id.clone())
    }

    /// whether this viewer keeps identities of `owner`'s hidden cards
    pub fn is_owner_view(&self, owner: &ActorId) -> bool {
        self.role == ViewerRole::Player && self.viewer_id.as_ref() == Some(owner)
    }
}

impl fmt::Debug for ViewerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewerContext")
            .field("role", &self.role)
            .field("viewer_id", &self.viewer_id)
            .field("keys", &self.keys)
            .field("recipient_secret", &self.recipient_secret.is_some())
            .field("max_players", &self.max_players)
            .finish()
    }
}
