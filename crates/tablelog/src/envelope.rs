//! wire shapes for commands and snapshots, and the deterministic byte
//! encoding shared by the mac, the signature and the hash chain.
//!
//! fields are assembled into a json array in a fixed order and encoded with
//! [`crate::canonical`]. absent optional fields are encoded as `null`, so
//! presence is authenticated along with content.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::canonical::to_canonical_bytes;
use crate::identity::ActorId;
use crate::{Error, Result};

/// envelope format version
pub const ENVELOPE_VERSION: u32 = 1;

/// x25519 ciphertext for one recipient, all fields base64url
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientCiphertext {
    pub epk: String,
    pub nonce: String,
    pub ct: String,
}

/// one signed command as stored in the replicated log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    pub v: u32,
    pub id: String,
    pub actor_id: ActorId,
    /// 1-based, strictly increasing per actor
    pub seq: u64,
    /// advisory wall clock, never trusted for ordering
    pub ts: u64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_public: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_owner_enc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_spectator_enc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_recipients_enc: Option<BTreeMap<ActorId, RecipientCiphertext>>,
    pub pub_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
    /// room co-signatures exist on snapshots only. on a command this slot
    /// is accepted on the wire but never set, covered, hashed or checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_sig: Option<String>,
}

/// which authenticator fields to fold into the encoding
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Coverage {
    /// input to the mac
    Unsigned,
    /// input to the signatures: includes the mac
    WithMac,
    /// input to the hash chain: includes mac and sig
    Full,
}

impl CommandEnvelope {
    fn check_required(&self) -> Result<()> {
        if self.v != ENVELOPE_VERSION {
            return Err(Error::InvalidEnvelope("unsupported version"));
        }
        if self.id.is_empty() {
            return Err(Error::InvalidEnvelope("missing id"));
        }
        if self.actor_id.is_empty() {
            return Err(Error::InvalidEnvelope("missing actorId"));
        }
        if self.seq == 0 {
            return Err(Error::InvalidEnvelope("seq must be 1-based"));
        }
        if self.kind.is_empty() {
            return Err(Error::InvalidEnvelope("missing type"));
        }
        if self.pub_key.is_empty() {
            return Err(Error::InvalidEnvelope("missing pubKey"));
        }
        Ok(())
    }

    /// canonical bytes covering the requested fields
    pub fn canonical_bytes(&self, coverage: Coverage) -> Result<Vec<u8>> {
        self.check_required()?;

        let recipients = match &self.payload_recipients_enc {
            Some(map) => serde_json::to_value(map)?,
            None => Value::Null,
        };

        let mut fields = vec![
            json!(self.v),
            json!(self.id),
            json!(self.actor_id),
            json!(self.seq),
            json!(self.ts),
            json!(self.kind),
            self.payload_public.clone().unwrap_or(Value::Null),
            json!(self.payload_owner_enc),
            json!(self.payload_spectator_enc),
            recipients,
            json!(self.pub_key),
        ];
        match coverage {
            Coverage::Unsigned => {}
            Coverage::WithMac => fields.push(json!(self.mac)),
            Coverage::Full => {
                fields.push(json!(self.mac));
                fields.push(json!(self.sig));
            }
        }

        Ok(to_canonical_bytes(&Value::Array(fields)))
    }
}

/// a signed, independently verifiable checkpoint of the command log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedSnapshot {
    pub v: u32,
    pub id: String,
    pub actor_id: ActorId,
    pub seq: u64,
    pub ts: u64,
    /// number of command log entries covered, `[0, up_to_index)`
    pub up_to_index: usize,
    /// hash chain head over the covered prefix
    pub log_hash: String,
    pub public_state: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_enc_by_player: Option<BTreeMap<ActorId, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectator_enc: Option<String>,
    pub pub_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_sig: Option<String>,
}

impl SignedSnapshot {
    fn check_required(&self) -> Result<()> {
        if self.v != ENVELOPE_VERSION {
            return Err(Error::InvalidEnvelope("unsupported version"));
        }
        if self.id.is_empty() || self.actor_id.is_empty() || self.pub_key.is_empty() {
            return Err(Error::InvalidEnvelope("missing snapshot field"));
        }
        if self.log_hash.is_empty() {
            return Err(Error::InvalidEnvelope("missing logHash"));
        }
        Ok(())
    }

    /// canonical bytes covering the requested fields.
    /// `room_sig` is never covered: it signs the same bytes as `sig`.
    pub fn canonical_bytes(&self, coverage: Coverage) -> Result<Vec<u8>> {
        self.check_required()?;

        let owner = match &self.owner_enc_by_player {
            Some(map) => serde_json::to_value(map)?,
            None => Value::Null,
        };

        let mut fields = vec![
            json!(self.v),
            json!(self.id),
            json!(self.actor_id),
            json!(self.seq),
            json!(self.ts),
            json!(self.up_to_index),
            json!(self.log_hash),
            self.public_state.clone(),
            owner,
            json!(self.spectator_enc),
            json!(self.pub_key),
        ];
        match coverage {
            Coverage::Unsigned => {}
            Coverage::WithMac => fields.push(json!(self.mac)),
            Coverage::Full => {
                fields.push(json!(self.mac));
                fields.push(json!(self.sig));
            }
        }

        Ok(to_canonical_bytes(&Value::Array(fields)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CommandEnvelope {
        CommandEnvelope {
            v: 1,
            id: "c1".into(),
            actor_id: ActorId::from("a"),
            seq: 1,
            ts: 1000,
            kind: "player.join".into(),
            payload_public: Some(json!({"playerId": "a", "name": "alice"})),
            payload_owner_enc: None,
            payload_spectator_enc: None,
            payload_recipients_enc: None,
            pub_key: "pk".into(),
            mac: Some("m".into()),
            sig: Some("s".into()),
            room_sig: None,
        }
    }

    #[test]
    fn test_coverage_levels_differ() {
        let env = sample();
        let unsigned = env.canonical_bytes(Coverage::Unsigned).unwrap();
        let with_mac = env.canonical_bytes(Coverage::WithMac).unwrap();
        let full = env.canonical_bytes(Coverage::Full).unwrap();
        assert_ne!(unsigned, with_mac);
        assert_ne!(with_mac, full);

        // the mac input does not depend on the authenticators themselves
        let mut stripped = env.clone();
        stripped.mac = None;
        stripped.sig = None;
        assert_eq!(stripped.canonical_bytes(Coverage::Unsigned).unwrap(), unsigned);
    }

    #[test]
    fn test_optional_presence_is_encoded() {
        let env = sample();
        let mut with_empty_blob = env.clone();
        with_empty_blob.payload_owner_enc = Some(String::new());
        assert_ne!(
            env.canonical_bytes(Coverage::Unsigned).unwrap(),
            with_empty_blob.canonical_bytes(Coverage::Unsigned).unwrap()
        );
    }

    #[test]
    fn test_missing_required_field() {
        let mut env = sample();
        env.kind = String::new();
        assert!(matches!(
            env.canonical_bytes(Coverage::Unsigned),
            Err(Error::InvalidEnvelope(_))
        ));

        let mut env = sample();
        env.seq = 0;
        assert!(env.canonical_bytes(Coverage::Full).is_err());
    }

    #[test]
    fn test_wire_names() {
        let v = serde_json::to_value(sample()).unwrap();
        assert!(v.get("actorId").is_some());
        assert!(v.get("type").is_some());
        assert!(v.get("payloadPublic").is_some());
        assert!(v.get("payloadOwnerEnc").is_none());
        assert!(v.get("pubKey").is_some());
    }
}
