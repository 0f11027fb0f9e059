use base64::Engine as _;
use chacha20poly1305::aead::generic_array::GenericArray;
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, KeyInit};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::{Result, SyncError};
use crate::tree::Snapshot;

// Compressed payloads are obfuscated, not secret: every install shares this key.
const PAYLOAD_SECRET: &[u8] = b"marksync/payload/v1";
const NONCE_LEN: usize = 12;

/// A downloaded snapshot plus the wire form it arrived in.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub snapshot: Snapshot,
    pub compressed: bool,
}

fn cipher() -> ChaCha20Poly1305 {
    let key = Sha256::digest(PAYLOAD_SECRET);
    ChaCha20Poly1305::new(GenericArray::from_slice(key.as_slice()))
}

/// Render a snapshot as a file body. Compressed bodies are
/// base64(nonce || chacha20poly1305(lz4(json))).
pub fn encode_payload(snapshot: &Snapshot, compressed: bool) -> Result<String> {
    if !compressed {
        return serde_json::to_string_pretty(snapshot).map_err(|e| SyncError::Codec(format!("json: {}", e)));
    }

    let json = serde_json::to_vec(snapshot).map_err(|e| SyncError::Codec(format!("json: {}", e)))?;
    let packed = lz4_flex::compress_prepend_size(&json);

    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill(&mut nonce);
    let sealed = cipher()
        .encrypt(GenericArray::from_slice(&nonce), packed.as_ref())
        .map_err(|_| SyncError::Codec("encrypt failed".into()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(base64::engine::general_purpose::STANDARD.encode(out))
}

/// Parse a file body of either form. Plain JSON is tried first.
pub fn decode_payload(body: &str) -> Result<Payload> {
    if let Ok(snapshot) = serde_json::from_str::<Snapshot>(body) {
        return Ok(Payload { snapshot, compressed: false });
    }

    let raw = base64::engine::general_purpose::STANDARD
        .decode(body.trim())
        .map_err(|e| SyncError::Codec(format!("base64: {}", e)))?;
    if raw.len() <= NONCE_LEN {
        return Err(SyncError::Codec("payload too short".into()));
    }
    let (nonce, sealed) = raw.split_at(NONCE_LEN);
    let packed = cipher()
        .decrypt(GenericArray::from_slice(nonce), sealed)
        .map_err(|_| SyncError::Codec("decrypt failed".into()))?;
    let json = lz4_flex::decompress_size_prepended(&packed)
        .map_err(|e| SyncError::Codec(format!("lz4 decompress: {}", e)))?;
    let snapshot = serde_json::from_slice(&json).map_err(|e| SyncError::Codec(format!("json: {}", e)))?;
    Ok(Payload { snapshot, compressed: true })
}
