//! selective disclosure of hidden information
//!
//! one logical fact may be carried up to four ways on the same envelope:
//! - `payloadPublic`: plaintext, everyone
//! - `payloadOwnerEnc`: the author's own owner key
//! - `payloadSpectatorEnc`: the shared spectator key
//! - `payloadRecipientsEnc[id]`: x25519 box per ad-hoc recipient
//!
//! at replay a viewer resolves at most one overlay and merges its identity
//! keys over the public payload for that single command. not being able to
//! decrypt is a normal outcome ([`Disclosure::Absent`]), never an error.

use serde_json::{Map, Value};

use crate::context::{ViewerContext, ViewerRole};
use crate::crypto::{
    b64_decode, b64_decode_array, b64_encode, open, open_for_recipient, seal, seal_for_recipient,
    RecipientBox,
};
use crate::envelope::{CommandEnvelope, RecipientCiphertext};
use crate::identity::SessionKeys;
use crate::{Error, Result};

/// outcome of looking up a viewer-specific overlay
#[derive(Clone, Debug, PartialEq)]
pub enum Disclosure {
    Found(Map<String, Value>),
    Absent,
}

impl Disclosure {
    pub fn is_found(&self) -> bool {
        matches!(self, Disclosure::Found(_))
    }
}

/// encrypt the author-only variant
pub fn seal_owner(value: &Value, keys: &SessionKeys) -> Result<String> {
    let key = keys.owner_key().ok_or(Error::MissingKey("owner key"))?;
    seal(key, &serde_json::to_vec(value)?)
}

/// encrypt the spectator variant
pub fn seal_spectator(value: &Value, keys: &SessionKeys) -> Result<String> {
    let key = keys.spectator_key().ok_or(Error::MissingKey("spectator key"))?;
    seal(key, &serde_json::to_vec(value)?)
}

/// encrypt a variant for one recipient's x25519 public key
pub fn seal_recipient(value: &Value, recipient_pubkey: &[u8; 32]) -> Result<RecipientCiphertext> {
    let sealed = seal_for_recipient(recipient_pubkey, &serde_json::to_vec(value)?)?;
    Ok(RecipientCiphertext {
        epk: b64_encode(&sealed.ephemeral_pubkey),
        nonce: b64_encode(&sealed.nonce),
        ct: b64_encode(&sealed.ciphertext),
    })
}

/// find the overlay this viewer may read, in resolution order:
/// own owner blob, then a recipient entry, then the spectator blob
pub fn resolve_overlay(envelope: &CommandEnvelope, ctx: &ViewerContext) -> Disclosure {
    let authored_by_viewer = ctx.viewer_id.as_ref() == Some(&envelope.actor_id);

    if authored_by_viewer && ctx.role == ViewerRole::Player {
        if let (Some(blob), Some(key)) = (&envelope.payload_owner_enc, ctx.keys.owner_key()) {
            if let found @ Disclosure::Found(_) = open_json(key, blob) {
                return found;
            }
        }
    }

    if let (Some(viewer), Some(secret), Some(recipients)) = (
        &ctx.viewer_id,
        &ctx.recipient_secret,
        &envelope.payload_recipients_enc,
    ) {
        if let Some(entry) = recipients.get(viewer) {
            if let found @ Disclosure::Found(_) = open_recipient_json(secret, entry) {
                return found;
            }
        }
    }

    if ctx.role == ViewerRole::Spectator {
        if let (Some(blob), Some(key)) = (&envelope.payload_spectator_enc, ctx.keys.spectator_key()) {
            return open_json(key, blob);
        }
    }

    Disclosure::Absent
}

/// keys an overlay may contribute. everything else in an overlay is
/// dropped so that viewers can only differ on card identities.
pub const DISCLOSED_KEYS: [&str; 2] = ["identity", "cards"];

/// merge the disclosed keys of an overlay over the public payload.
/// returns `None` when there is nothing to parse at all.
pub fn merge_overlay(public: Option<&Value>, overlay: Disclosure) -> Option<Value> {
    let mut merged = match public {
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return None,
        None => Map::new(),
    };
    match overlay {
        Disclosure::Found(extra) => {
            for (k, v) in extra {
                if DISCLOSED_KEYS.contains(&k.as_str()) {
                    merged.insert(k, v);
                }
            }
        }
        Disclosure::Absent if public.is_none() => return None,
        Disclosure::Absent => {}
    }
    Some(Value::Object(merged))
}

/// decrypt an opaque blob into a json object
pub fn open_json(key: &[u8; 32], blob: &str) -> Disclosure {
    match open(key, blob).ok().and_then(|pt| serde_json::from_slice(&pt).ok()) {
        Some(Value::Object(map)) => Disclosure::Found(map),
        _ => Disclosure::Absent,
    }
}

fn open_recipient_json(secret: &[u8; 32], entry: &RecipientCiphertext) -> Disclosure {
    let decoded = (|| -> Result<RecipientBox> {
        Ok(RecipientBox {
            ephemeral_pubkey: b64_decode_array(&entry.epk)?,
            nonce: b64_decode_array(&entry.nonce)?,
            ciphertext: b64_decode(&entry.ct)?,
        })
    })();
    let Ok(sealed) = decoded else {
        return Disclosure::Absent;
    };
    match open_for_recipient(secret, &sealed)
        .ok()
        .and_then(|pt| serde_json::from_slice(&pt).ok())
    {
        Some(Value::Object(map)) => Disclosure::Found(map),
        _ => Disclosure::Absent,
    }
}
