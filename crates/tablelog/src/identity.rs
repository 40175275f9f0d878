//! actor identity and session-scoped keys
//!
//! an actor is an ed25519 signing keypair; its id is the first 16 bytes of
//! sha256(pubkey), hex encoded. no registry is needed to bind the two.
//!
//! session keys are derived per session from the secrets the identity
//! provider hands us. they live in an explicit [`SessionKeys`] value that
//! callers pass around, never in a global cache.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::crypto::{b64_decode_array, b64_encode, hkdf32, random_bytes, sha256, x25519_public};
use crate::Result;

/// registry-free actor identity: hex(sha256(pubkey))[..16 bytes]
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    /// derive from raw ed25519 public key bytes
    pub fn derive(pubkey: &[u8; 32]) -> Self {
        let digest = sha256(pubkey);
        Self(hex::encode(&digest[..16]))
    }

    /// derive from the base64url pubkey carried in envelopes
    pub fn from_pubkey_b64(pubkey: &str) -> Result<Self> {
        let bytes: [u8; 32] = b64_decode_array(pubkey)?;
        Ok(Self::derive(&bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ActorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// long-lived keys of one actor (issued by the identity provider)
#[derive(Clone)]
pub struct ActorKeys {
    signing_key: SigningKey,
    /// x25519 secret for recipient-targeted payloads
    encryption_secret: [u8; 32],
    actor_id: ActorId,
}

impl ActorKeys {
    /// build from raw seeds
    pub fn from_seeds(signing_seed: &[u8; 32], encryption_secret: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(signing_seed);
        let actor_id = ActorId::derive(&signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            encryption_secret,
            actor_id,
        }
    }

    /// fresh random identity
    pub fn generate() -> Self {
        Self::from_seeds(&random_bytes(), random_bytes())
    }

    pub fn actor_id(&self) -> &ActorId {
        &self.actor_id
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// public key as carried in envelopes
    pub fn public_key_b64(&self) -> String {
        b64_encode(self.verifying_key().as_bytes())
    }

    /// x25519 public key others encrypt reveals to
    pub fn encryption_public(&self) -> [u8; 32] {
        x25519_public(&self.encryption_secret)
    }

    pub fn encryption_secret(&self) -> &[u8; 32] {
        &self.encryption_secret
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

impl fmt::Debug for ActorKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorKeys")
            .field("actor_id", &self.actor_id)
            .finish_non_exhaustive()
    }
}

/// keys scoped to one session, derived from the secrets a viewer holds
#[derive(Clone, Default)]
pub struct SessionKeys {
    session_id: String,
    mac_key: Option<[u8; 32]>,
    room_signing_key: Option<SigningKey>,
    owner_key: Option<[u8; 32]>,
    spectator_key: Option<[u8; 32]>,
}

impl SessionKeys {
    /// keys for a session with no secrets at all (bare spectator)
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    /// derive the room mac key and room co-signing key from the player key
    pub fn with_player_key(mut self, player_key: &[u8]) -> Result<Self> {
        let salt = self.session_id.as_bytes();
        self.mac_key = Some(hkdf32(player_key, salt, b"room-mac")?);
        let room_seed = hkdf32(player_key, salt, b"room-sig")?;
        self.room_signing_key = Some(SigningKey::from_bytes(&room_seed));
        Ok(self)
    }

    /// derive this actor's private owner payload key
    pub fn with_owner_secret(mut self, owner_secret: &[u8]) -> Result<Self> {
        self.owner_key = Some(hkdf32(owner_secret, self.session_id.as_bytes(), b"owner-aes")?);
        Ok(self)
    }

    /// derive the spectator payload key
    pub fn with_spectator_secret(mut self, spectator_secret: &[u8]) -> Result<Self> {
        self.spectator_key = Some(hkdf32(
            spectator_secret,
            self.session_id.as_bytes(),
            b"spectator-aes",
        )?);
        Ok(self)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn mac_key(&self) -> Option<&[u8; 32]> {
        self.mac_key.as_ref()
    }

    pub fn room_signing_key(&self) -> Option<&SigningKey> {
        self.room_signing_key.as_ref()
    }

    pub fn room_verifying_key(&self) -> Option<VerifyingKey> {
        self.room_signing_key.as_ref().map(SigningKey::verifying_key)
    }

    pub fn owner_key(&self) -> Option<&[u8; 32]> {
        self.owner_key.as_ref()
    }

    pub fn spectator_key(&self) -> Option<&[u8; 32]> {
        self.spectator_key.as_ref()
    }

    /// same session, owner key dropped (for synthetic replays)
    pub fn without_owner_key(&self) -> Self {
        Self {
            owner_key: None,
            ..self.clone()
        }
    }

    /// same session, only the room secret retained
    pub fn room_only(&self) -> Self {
        Self {
            owner_key: None,
            spectator_key: None,
            ..self.clone()
        }
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("session_id", &self.session_id)
            .field("mac_key", &self.mac_key.is_some())
            .field("owner_key", &self.owner_key.is_some())
            .field("spectator_key", &self.spectator_key.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_id_derivation() {
        let keys = ActorKeys::from_seeds(&[7u8; 32], [8u8; 32]);
        let again = ActorKeys::from_seeds(&[7u8; 32], [9u8; 32]);
        assert_eq!(keys.actor_id(), again.actor_id());
        assert_eq!(keys.actor_id().as_str().len(), 32);

        let from_b64 = ActorId::from_pubkey_b64(&keys.public_key_b64()).unwrap();
        assert_eq!(&from_b64, keys.actor_id());

        let other = ActorKeys::from_seeds(&[1u8; 32], [8u8; 32]);
        assert_ne!(keys.actor_id(), other.actor_id());
    }

    #[test]
    fn test_room_keys_shared_by_secret_holders() {
        let a = SessionKeys::new("s1").with_player_key(b"room secret").unwrap();
        let b = SessionKeys::new("s1").with_player_key(b"room secret").unwrap();
        assert_eq!(a.mac_key(), b.mac_key());
        assert_eq!(a.room_verifying_key(), b.room_verifying_key());

        let other_session = SessionKeys::new("s2").with_player_key(b"room secret").unwrap();
        assert_ne!(a.mac_key(), other_session.mac_key());

        let bare = SessionKeys::new("s1");
        assert!(bare.mac_key().is_none());
        assert!(bare.room_verifying_key().is_none());
    }
}
