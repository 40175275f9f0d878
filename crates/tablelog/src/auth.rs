//! two-layer authentication of commands and snapshots
//!
//! layer 1: hmac under the room mac key, proves session membership.
//! layer 2: ed25519 signature over the mac'd bytes, proves authorship.
//! snapshots add a room co-signature from the key every room-secret holder
//! can derive, so they verify without any pki.
//!
//! validation checks run in a fixed order and the first failure wins.

use ed25519_dalek::{Signature, Signer, Verifier, VerifyingKey};

use crate::crypto::{b64_decode, b64_decode_array, b64_encode, mac, mac_verify};
use crate::envelope::{CommandEnvelope, Coverage, SignedSnapshot};
use crate::error::AuthFailure;
use crate::identity::{ActorId, ActorKeys, SessionKeys};
use crate::{Error, Result};

/// mac and sign a command in place. any existing authenticators are replaced.
pub fn sign_command(
    envelope: &mut CommandEnvelope,
    actor: &ActorKeys,
    session: &SessionKeys,
) -> Result<()> {
    let mac_key = session.mac_key().ok_or(Error::MissingKey("room mac key"))?;

    envelope.mac = None;
    envelope.sig = None;
    envelope.room_sig = None;
    let unsigned = envelope.canonical_bytes(Coverage::Unsigned)?;
    let tag = mac(mac_key, &[unsigned.as_slice()])?;
    envelope.mac = Some(b64_encode(&tag));

    let sig = actor.sign(&envelope.canonical_bytes(Coverage::WithMac)?);
    envelope.sig = Some(b64_encode(&sig.to_bytes()));
    Ok(())
}

/// full validation of a command envelope.
///
/// `expected_actor` and `expected_seq` are checked when given; replay always
/// passes the next expected seq for the envelope's actor.
pub fn validate_command(
    envelope: &CommandEnvelope,
    session: &SessionKeys,
    expected_actor: Option<&ActorId>,
    expected_seq: Option<u64>,
) -> std::result::Result<(), AuthFailure> {
    let tag = envelope.mac.as_deref().ok_or(AuthFailure::MissingMac)?;
    let sig = envelope.sig.as_deref().ok_or(AuthFailure::MissingSig)?;
    let verifying_key = decode_pubkey(&envelope.pub_key)?;
    check_actor(&verifying_key, &envelope.actor_id, expected_actor)?;

    if let Some(seq) = expected_seq {
        if envelope.seq != seq {
            return Err(AuthFailure::SeqMismatch);
        }
    }

    let mac_key = session.mac_key().ok_or(AuthFailure::MissingRoomKey)?;
    let unsigned = envelope
        .canonical_bytes(Coverage::Unsigned)
        .map_err(|_| AuthFailure::InvalidEnvelope)?;
    let tag = b64_decode(tag).map_err(|_| AuthFailure::MacMismatch)?;
    if !mac_verify(mac_key, &unsigned, &tag) {
        return Err(AuthFailure::MacMismatch);
    }

    let signed = envelope
        .canonical_bytes(Coverage::WithMac)
        .map_err(|_| AuthFailure::InvalidEnvelope)?;
    verify_signature(&verifying_key, &signed, sig)
}

/// reduced-trust validation for viewers without the room secret.
///
/// proves authorship only, not room membership. callers enforce a strict
/// seq match through `expected_seq`.
pub fn validate_command_signature(
    envelope: &CommandEnvelope,
    expected_seq: Option<u64>,
) -> std::result::Result<(), AuthFailure> {
    let sig = envelope.sig.as_deref().ok_or(AuthFailure::MissingSig)?;
    let verifying_key = decode_pubkey(&envelope.pub_key)?;
    check_actor(&verifying_key, &envelope.actor_id, None)?;

    if let Some(seq) = expected_seq {
        if envelope.seq != seq {
            return Err(AuthFailure::SeqMismatch);
        }
    }

    let signed = envelope
        .canonical_bytes(Coverage::WithMac)
        .map_err(|_| AuthFailure::InvalidEnvelope)?;
    verify_signature(&verifying_key, &signed, sig)
}

/// mac, sign and room co-sign a snapshot in place
pub fn sign_snapshot(
    snapshot: &mut SignedSnapshot,
    actor: &ActorKeys,
    session: &SessionKeys,
) -> Result<()> {
    let mac_key = session.mac_key().ok_or(Error::MissingKey("room mac key"))?;
    let room_key = session
        .room_signing_key()
        .ok_or(Error::MissingKey("room signing key"))?;

    snapshot.mac = None;
    snapshot.sig = None;
    snapshot.room_sig = None;
    let unsigned = snapshot.canonical_bytes(Coverage::Unsigned)?;
    let tag = mac(mac_key, &[unsigned.as_slice()])?;
    snapshot.mac = Some(b64_encode(&tag));

    let signed = snapshot.canonical_bytes(Coverage::WithMac)?;
    snapshot.sig = Some(b64_encode(&actor.sign(&signed).to_bytes()));

    snapshot.room_sig = Some(b64_encode(&room_key.sign(&signed).to_bytes()));
    Ok(())
}

/// full snapshot validation: mac, author signature and room co-signature
pub fn validate_snapshot(
    snapshot: &SignedSnapshot,
    session: &SessionKeys,
    expected_actor: Option<&ActorId>,
) -> std::result::Result<(), AuthFailure> {
    let tag = snapshot.mac.as_deref().ok_or(AuthFailure::MissingMac)?;
    let sig = snapshot.sig.as_deref().ok_or(AuthFailure::MissingSig)?;
    let room_sig = snapshot.room_sig.as_deref().ok_or(AuthFailure::MissingRoomSig)?;
    let verifying_key = decode_pubkey(&snapshot.pub_key)?;
    check_actor(&verifying_key, &snapshot.actor_id, expected_actor)?;

    let mac_key = session.mac_key().ok_or(AuthFailure::MissingRoomKey)?;
    let unsigned = snapshot
        .canonical_bytes(Coverage::Unsigned)
        .map_err(|_| AuthFailure::InvalidEnvelope)?;
    let tag = b64_decode(tag).map_err(|_| AuthFailure::MacMismatch)?;
    if !mac_verify(mac_key, &unsigned, &tag) {
        return Err(AuthFailure::MacMismatch);
    }

    let signed = snapshot
        .canonical_bytes(Coverage::WithMac)
        .map_err(|_| AuthFailure::InvalidEnvelope)?;
    verify_signature(&verifying_key, &signed, sig)?;

    let room_key = session.room_verifying_key().ok_or(AuthFailure::MissingRoomKey)?;
    verify_signature(&room_key, &signed, room_sig).map_err(|_| AuthFailure::RoomSigMismatch)
}

/// room co-signature check for verifiers without per-actor expectations
pub fn validate_snapshot_room_signature(
    snapshot: &SignedSnapshot,
    session: &SessionKeys,
) -> std::result::Result<(), AuthFailure> {
    let room_sig = snapshot.room_sig.as_deref().ok_or(AuthFailure::MissingRoomSig)?;
    let verifying_key = decode_pubkey(&snapshot.pub_key)?;
    check_actor(&verifying_key, &snapshot.actor_id, None)?;

    let room_key = session.room_verifying_key().ok_or(AuthFailure::MissingRoomKey)?;
    let signed = snapshot
        .canonical_bytes(Coverage::WithMac)
        .map_err(|_| AuthFailure::InvalidEnvelope)?;
    verify_signature(&room_key, &signed, room_sig).map_err(|_| AuthFailure::RoomSigMismatch)
}

/// reduced-trust snapshot check: author signature only
pub fn validate_snapshot_signature(
    snapshot: &SignedSnapshot,
) -> std::result::Result<(), AuthFailure> {
    let sig = snapshot.sig.as_deref().ok_or(AuthFailure::MissingSig)?;
    let verifying_key = decode_pubkey(&snapshot.pub_key)?;
    check_actor(&verifying_key, &snapshot.actor_id, None)?;

    let signed = snapshot
        .canonical_bytes(Coverage::WithMac)
        .map_err(|_| AuthFailure::InvalidEnvelope)?;
    verify_signature(&verifying_key, &signed, sig)
}

fn decode_pubkey(pub_key: &str) -> std::result::Result<VerifyingKey, AuthFailure> {
    let bytes: [u8; 32] = b64_decode_array(pub_key).map_err(|_| AuthFailure::InvalidPubkey)?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| AuthFailure::InvalidPubkey)
}

fn check_actor(
    verifying_key: &VerifyingKey,
    actor_id: &ActorId,
    expected: Option<&ActorId>,
) -> std::result::Result<(), AuthFailure> {
    if &ActorId::derive(verifying_key.as_bytes()) != actor_id {
        return Err(AuthFailure::ActorIdMismatch);
    }
    match expected {
        Some(expected) if expected != actor_id => Err(AuthFailure::ExpectedActorMismatch),
        _ => Ok(()),
    }
}

fn verify_signature(
    verifying_key: &VerifyingKey,
    message: &[u8],
    sig: &str,
) -> std::result::Result<(), AuthFailure> {
    let bytes: [u8; 64] = b64_decode_array(sig).map_err(|_| AuthFailure::SigMismatch)?;
    let signature = Signature::from_bytes(&bytes);
    verifying_key
        .verify(message, &signature)
        .map_err(|_| AuthFailure::SigMismatch)
}
