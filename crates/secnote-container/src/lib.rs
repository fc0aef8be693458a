//! secnote-container: note payload assembly and the seal/open pipeline
//!
//! ```text
//! sender:   ContainerBuilder → Container → codec::encode → envelope::encrypt → (key, blob)
//! receiver: (key_b64, blob) → envelope::decrypt → codec::decode → DecryptedNote
//! ```

pub mod codec;
pub mod container;

pub use codec::{decode, encode, DecodedFile, DecryptedNote};
pub use container::{ByteSource, Container, ContainerBuilder, FileEntry};

use secnote_core::SecnoteResult;
use secnote_crypto::{envelope, NoteKey};
use tokio_util::sync::CancellationToken;
use zeroize::Zeroize;

/// Output of [`seal`]: the wire blob for the server and the key for the URL
/// fragment. They must travel separately.
#[derive(Debug)]
pub struct SealedNote {
    pub key: NoteKey,
    pub blob: Vec<u8>,
}

impl SealedNote {
    /// Key in the form carried by the share URL fragment.
    pub fn key_fragment(&self) -> String {
        self.key.to_base64url()
    }
}

/// Encode and encrypt a container under a fresh one-time key.
pub async fn seal(container: Container, cancel: &CancellationToken) -> SecnoteResult<SealedNote> {
    let mut plaintext = codec::encode(container, cancel).await?;
    let sealed = envelope::encrypt(&plaintext);
    plaintext.zeroize();
    let (key, blob) = sealed?;
    Ok(SealedNote { key, blob })
}

/// Decrypt and decode a wire blob with the key from the URL fragment.
pub fn open(key_b64: &str, blob: &[u8]) -> SecnoteResult<DecryptedNote> {
    let plaintext = envelope::decrypt(key_b64, blob)?;
    codec::decode(plaintext)
}

/// Like [`open`], for callers that already hold the imported key.
pub fn open_with_key(key: &NoteKey, blob: &[u8]) -> SecnoteResult<DecryptedNote> {
    let plaintext = envelope::decrypt_with_key(key, blob)?;
    codec::decode(plaintext)
}
