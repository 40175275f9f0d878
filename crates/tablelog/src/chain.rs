//! rolling hash chain over authenticated commands
//!
//! H0 = sha256("init")
//! Hi = sha256(H(i-1) || sha256(canonical(fully signed envelope i)))
//!
//! only authenticated envelopes advance the chain. authorization failures
//! still do: the chain attests to what was authenticated, not what was legal.

use crate::crypto::sha256;
use crate::envelope::{CommandEnvelope, Coverage};
use crate::Result;

/// hex head of an empty chain
pub fn genesis_hash() -> String {
    hex::encode(sha256(b"init"))
}

/// advance the chain by one envelope
pub fn advance(prev_hex: &str, envelope: &CommandEnvelope) -> Result<String> {
    let prev = hex::decode(prev_hex)
        .map_err(|e| crate::Error::InvalidEncoding(e.to_string()))?;
    let leaf = sha256(&envelope.canonical_bytes(Coverage::Full)?);

    let mut buf = Vec::with_capacity(prev.len() + leaf.len());
    buf.extend_from_slice(&prev);
    buf.extend_from_slice(&leaf);
    Ok(hex::encode(sha256(&buf)))
}
