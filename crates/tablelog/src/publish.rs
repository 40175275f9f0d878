//! building signed command envelopes
//!
//! a draft names the command type, its public payload and any number of
//! private overlays. sealing encrypts each overlay for its audience, then
//! macs and signs the whole envelope.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::auth::sign_command;
use crate::command::Command;
use crate::crypto::random_bytes;
use crate::disclosure::{seal_owner, seal_recipient, seal_spectator};
use crate::envelope::{CommandEnvelope, ENVELOPE_VERSION};
use crate::identity::{ActorId, ActorKeys, SessionKeys};
use crate::Result;

/// wall clock in unix milliseconds; advisory only
pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// fresh random envelope id
pub fn new_envelope_id() -> String {
    hex::encode(random_bytes::<16>())
}

/// overlay addressed to one recipient's x25519 key
#[derive(Clone, Debug)]
pub struct RecipientOverlay {
    pub encryption_key: [u8; 32],
    pub payload: Value,
}

/// an unsigned command with its disclosure variants
#[derive(Clone, Debug, Default)]
pub struct CommandDraft {
    pub kind: String,
    pub public: Option<Value>,
    pub owner: Option<Value>,
    pub spectator: Option<Value>,
    pub recipients: BTreeMap<ActorId, RecipientOverlay>,
}

impl CommandDraft {
    /// draft whose public payload is the serialized command
    pub fn new(command: Command) -> Self {
        let (kind, payload) = command.into_parts();
        Self {
            kind,
            public: Some(payload),
            ..Default::default()
        }
    }

    /// draft from a raw type and public payload
    pub fn raw(kind: impl Into<String>, public: Option<Value>) -> Self {
        Self {
            kind: kind.into(),
            public,
            ..Default::default()
        }
    }

    /// overlay readable by the author's own owner key
    pub fn with_owner(mut self, overlay: Value) -> Self {
        self.owner = Some(overlay);
        self
    }

    /// overlay readable by keyed spectators
    pub fn with_spectator(mut self, overlay: Value) -> Self {
        self.spectator = Some(overlay);
        self
    }

    /// overlay readable by one recipient only
    pub fn with_recipient(mut self, id: ActorId, encryption_key: [u8; 32], overlay: Value) -> Self {
        self.recipients.insert(
            id,
            RecipientOverlay {
                encryption_key,
                payload: overlay,
            },
        );
        self
    }

    /// encrypt the overlays, then mac and sign
    pub fn seal(
        &self,
        actor: &ActorKeys,
        keys: &SessionKeys,
        seq: u64,
        ts: u64,
    ) -> Result<CommandEnvelope> {
        let payload_owner_enc = self
            .owner
            .as_ref()
            .map(|v| seal_owner(v, keys))
            .transpose()?;
        let payload_spectator_enc = self
            .spectator
            .as_ref()
            .map(|v| seal_spectator(v, keys))
            .transpose()?;

        let payload_recipients_enc = if self.recipients.is_empty() {
            None
        } else {
            let mut sealed = BTreeMap::new();
            for (id, overlay) in &self.recipients {
                sealed.insert(id.clone(), seal_recipient(&overlay.payload, &overlay.encryption_key)?);
            }
            Some(sealed)
        };

        let mut envelope = CommandEnvelope {
            v: ENVELOPE_VERSION,
            id: new_envelope_id(),
            actor_id: actor.actor_id().clone(),
            seq,
            ts,
            kind: self.kind.clone(),
            payload_public: self.public.clone(),
            payload_owner_enc,
            payload_spectator_enc,
            payload_recipients_enc,
            pub_key: actor.public_key_b64(),
            mac: None,
            sig: None,
            room_sig: None,
        };
        sign_command(&mut envelope, actor, keys)?;
        Ok(envelope)
    }
}
