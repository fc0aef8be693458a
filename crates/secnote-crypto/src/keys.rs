//! One-time note keys

use rand::rngs::OsRng;
use rand::RngCore;
use secnote_core::{SecnoteError, SecnoteResult};
use zeroize::Zeroize;

use crate::{base64url, KEY_SIZE};

/// A per-note 256-bit AES key. Zeroized on drop.
///
/// Generated fresh for every sealed note and never stored; the sender hands
/// it out only as the base64url fragment of the share URL.
#[derive(Clone)]
pub struct NoteKey {
    bytes: [u8; KEY_SIZE],
}

impl NoteKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> SecnoteResult<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            SecnoteError::invalid(
                "note key",
                format!("expected {KEY_SIZE} bytes, got {}", bytes.len()),
            )
        })?;
        Ok(Self { bytes })
    }

    /// Import a key from its URL fragment form.
    ///
    /// Text of the wrong length is refused before any decoding.
    pub fn from_base64url(text: &str) -> SecnoteResult<Self> {
        let len = base64url::decoded_len(text.len());
        if len != KEY_SIZE {
            return Err(SecnoteError::invalid(
                "note key",
                format!("expected {KEY_SIZE} bytes, text encodes {len}"),
            ));
        }
        let mut raw = base64url::decode(text)?;
        let key = Self::from_slice(&raw);
        raw.zeroize();
        key
    }

    pub fn to_base64url(&self) -> String {
        base64url::encode(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for NoteKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for NoteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit note key from the OS CSPRNG.
pub fn generate_note_key() -> NoteKey {
    let mut bytes = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut bytes);
    NoteKey::from_bytes(bytes)
}
