//! Versioned AES-256-GCM envelope
//!
//! Wire format (binary):
//! ```text
//! [1 byte: version = 1][12 bytes: random IV][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! No associated data. The key never appears in the blob. The version byte is
//! read first and gates every later offset, so a future layout may change the
//! IV or tag size without ambiguity.

use aes_gcm::{
    aead::{Aead, AeadInPlace, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use secnote_core::{SecnoteError, SecnoteResult};

use crate::keys::{generate_note_key, NoteKey};
use crate::{IV_SIZE, TAG_SIZE};

/// Length of the version 1 header: version byte + IV
pub const V1_HEADER_LEN: usize = 1 + IV_SIZE;

/// GCM refuses messages longer than 2^36 - 32 bytes
const GCM_MAX_PLAINTEXT: u64 = (1 << 36) - 32;

/// Envelope layouts understood by this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EnvelopeVersion {
    V1 = 1,
}

impl EnvelopeVersion {
    pub const CURRENT: Self = Self::V1;

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Bytes the envelope adds around a plaintext of any length.
    pub fn overhead(self) -> usize {
        match self {
            Self::V1 => V1_HEADER_LEN + TAG_SIZE,
        }
    }
}

impl TryFrom<u8> for EnvelopeVersion {
    type Error = SecnoteError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            1 => Ok(Self::V1),
            other => Err(SecnoteError::UnknownVersion(other)),
        }
    }
}

/// Encrypt `plaintext` under a freshly generated key and IV.
///
/// Returns the key (to be carried out-of-band) and the wire blob. The blob is
/// written into a single buffer sized up front.
pub fn encrypt(plaintext: &[u8]) -> SecnoteResult<(NoteKey, Vec<u8>)> {
    let key = generate_note_key();
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    let version = EnvelopeVersion::CURRENT;
    let mut blob = Vec::with_capacity(plaintext.len() + version.overhead());
    blob.push(version.as_byte());
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(plaintext);

    let tag = cipher
        .encrypt_in_place_detached(nonce, b"", &mut blob[V1_HEADER_LEN..])
        .map_err(|_| SecnoteError::OutOfRange {
            field: "plaintext",
            value: plaintext.len() as u64,
            limit: GCM_MAX_PLAINTEXT,
        })?;
    blob.extend_from_slice(&tag);

    tracing::debug!(
        plaintext_len = plaintext.len(),
        blob_len = blob.len(),
        "sealed envelope"
    );
    Ok((key, blob))
}

/// Decrypt a wire blob with a key given in base64url form (the URL fragment).
pub fn decrypt(key_b64: &str, blob: &[u8]) -> SecnoteResult<Vec<u8>> {
    let key = NoteKey::from_base64url(key_b64)?;
    decrypt_with_key(&key, blob)
}

/// Decrypt a wire blob with an already imported key.
///
/// Fails fast on an empty or short blob and on an unknown version. Any tag
/// mismatch yields [`SecnoteError::Authentication`] with no partial output.
pub fn decrypt_with_key(key: &NoteKey, blob: &[u8]) -> SecnoteResult<Vec<u8>> {
    let Some(&version) = blob.first() else {
        return Err(SecnoteError::Truncated {
            field: "envelope version",
            needed: 1,
            available: 0,
        });
    };

    match EnvelopeVersion::try_from(version)? {
        EnvelopeVersion::V1 => decrypt_v1(key, blob),
    }
}

fn decrypt_v1(key: &NoteKey, blob: &[u8]) -> SecnoteResult<Vec<u8>> {
    if blob.len() < V1_HEADER_LEN {
        return Err(SecnoteError::Truncated {
            field: "envelope header",
            needed: V1_HEADER_LEN as u64,
            available: blob.len() as u64,
        });
    }

    let nonce = Nonce::from_slice(&blob[1..V1_HEADER_LEN]);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let plaintext = cipher
        .decrypt(nonce, &blob[V1_HEADER_LEN..])
        .map_err(|_| {
            tracing::warn!(blob_len = blob.len(), "envelope authentication failed");
            SecnoteError::Authentication
        })?;

    tracing::debug!(
        plaintext_len = plaintext.len(),
        blob_len = blob.len(),
        "opened envelope"
    );
    Ok(plaintext)
}
