//! cryptographic primitives for tablelog
//!
//! - sha256 for actor ids and the hash chain
//! - hkdf-sha256 for session-scoped keys
//! - hmac-sha256 for the room mac
//! - chacha20poly1305 for owner/spectator/recipient payloads
//! - x25519 for per-recipient key agreement
//!
//! everything here is a thin wrapper: the primitives are black boxes.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;

/// sha256 of a single buffer
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// hkdf-sha256 expand to 32 bytes
pub fn hkdf32(ikm: &[u8], salt: &[u8], info: &[u8]) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = [0u8; 32];
    hk.expand(info, &mut okm)
        .map_err(|_| Error::KeyDerivationFailed)?;
    Ok(okm)
}

/// compute hmac-sha256 tag
pub fn mac(key: &[u8], data: &[&[u8]]) -> Result<[u8; 32]> {
    let mut h = <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| Error::KeyDerivationFailed)?;
    for d in data {
        h.update(d);
    }
    Ok(h.finalize().into_bytes().into())
}

/// constant-time check of an hmac-sha256 tag
pub fn mac_verify(key: &[u8], data: &[u8], tag: &[u8]) -> bool {
    let Ok(mut h) = <HmacSha256 as Mac>::new_from_slice(key) else {
        return false;
    };
    h.update(data);
    h.verify_slice(tag).is_ok()
}

/// generate random bytes
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

pub fn b64_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn b64_decode(s: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| Error::InvalidEncoding(e.to_string()))
}

/// decode base64url into a fixed-size array
pub fn b64_decode_array<const N: usize>(s: &str) -> Result<[u8; N]> {
    let bytes = b64_decode(s)?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| Error::InvalidEncoding(format!("expected {N} bytes, got {}", v.len())))
}

/// encrypt data using chacha20poly1305
pub fn encrypt(key: &[u8; 32], plaintext: &[u8], nonce: &[u8; NONCE_LEN]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| Error::EncryptionFailed(e.to_string()))?;
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| Error::EncryptionFailed(e.to_string()))
}

/// decrypt data using chacha20poly1305
pub fn decrypt(key: &[u8; 32], ciphertext: &[u8], nonce: &[u8; NONCE_LEN]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| Error::DecryptionFailed(e.to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| Error::DecryptionFailed(e.to_string()))
}

/// encrypt under a fresh random nonce, returning the opaque
/// base64url(nonce || ciphertext) blob carried on the wire
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<String> {
    let nonce: [u8; NONCE_LEN] = random_bytes();
    let ct = encrypt(key, plaintext, &nonce)?;
    let mut out = Vec::with_capacity(NONCE_LEN + ct.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ct);
    Ok(b64_encode(&out))
}

/// inverse of [`seal`]
pub fn open(key: &[u8; 32], opaque: &str) -> Result<Vec<u8>> {
    let bytes = b64_decode(opaque)?;
    if bytes.len() < NONCE_LEN {
        return Err(Error::DecryptionFailed("blob shorter than nonce".into()));
    }
    let (nonce, ct) = bytes.split_at(NONCE_LEN);
    let nonce: [u8; NONCE_LEN] = nonce
        .try_into()
        .map_err(|_| Error::DecryptionFailed("bad nonce".into()))?;
    decrypt(key, ct, &nonce)
}

/// ciphertext addressed to one x25519 public key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecipientBox {
    pub ephemeral_pubkey: [u8; 32],
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

/// encrypt for a recipient using an ephemeral x25519 keypair
pub fn seal_for_recipient(recipient_pubkey: &[u8; 32], plaintext: &[u8]) -> Result<RecipientBox> {
    let ephemeral_secret = EphemeralSecret::random_from_rng(rand::thread_rng());
    let ephemeral_public = PublicKey::from(&ephemeral_secret);

    let shared = ephemeral_secret.diffie_hellman(&PublicKey::from(*recipient_pubkey));
    let key = recipient_key(shared.as_bytes(), ephemeral_public.as_bytes())?;

    let nonce: [u8; NONCE_LEN] = random_bytes();
    let ciphertext = encrypt(&key, plaintext, &nonce)?;

    Ok(RecipientBox {
        ephemeral_pubkey: *ephemeral_public.as_bytes(),
        nonce,
        ciphertext,
    })
}

/// decrypt a [`RecipientBox`] with the recipient's static secret
pub fn open_for_recipient(recipient_secret: &[u8; 32], sealed: &RecipientBox) -> Result<Vec<u8>> {
    let secret = StaticSecret::from(*recipient_secret);
    let shared = secret.diffie_hellman(&PublicKey::from(sealed.ephemeral_pubkey));
    let key = recipient_key(shared.as_bytes(), &sealed.ephemeral_pubkey)?;
    decrypt(&key, &sealed.ciphertext, &sealed.nonce)
}

/// x25519 public key for a static secret
pub fn x25519_public(secret: &[u8; 32]) -> [u8; 32] {
    PublicKey::from(&StaticSecret::from(*secret)).to_bytes()
}

fn recipient_key(shared_secret: &[u8], epk: &[u8]) -> Result<[u8; 32]> {
    hkdf32(shared_secret, epk, b"recipient-aes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open() {
        let key = random_bytes::<32>();
        let blob = seal(&key, b"hello world").unwrap();
        assert_eq!(open(&key, &blob).unwrap(), b"hello world");

        let wrong = random_bytes::<32>();
        assert!(open(&wrong, &blob).is_err());
        assert!(open(&key, "AAAA").is_err());
    }

    #[test]
    fn test_recipient_box() {
        let secret = random_bytes::<32>();
        let public = x25519_public(&secret);

        let sealed = seal_for_recipient(&public, b"black lotus").unwrap();
        assert_eq!(open_for_recipient(&secret, &sealed).unwrap(), b"black lotus");

        let other = random_bytes::<32>();
        assert!(open_for_recipient(&other, &sealed).is_err());
    }

    #[test]
    fn test_mac_verify() {
        let key = b"room key";
        let tag = mac(key, &[b"a".as_slice(), b"bc".as_slice()]).unwrap();
        assert!(mac_verify(key, b"abc", &tag));
        assert!(!mac_verify(key, b"abd", &tag));
        assert!(!mac_verify(b"other", b"abc", &tag));
    }

    #[test]
    fn test_hkdf_separates_info() {
        let a = hkdf32(b"secret", b"session", b"room-mac").unwrap();
        let b = hkdf32(b"secret", b"session", b"room-sig").unwrap();
        let c = hkdf32(b"secret", b"session-2", b"room-mac").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, hkdf32(b"secret", b"session", b"room-mac").unwrap());
    }
}
