//! URL-safe base64 without padding, used to carry the raw note key in the
//! share URL fragment.
//!
//! Full 3-byte groups become 4 symbols; a trailing group of 1 byte becomes
//! 2 symbols and of 2 bytes becomes 3. A text whose length is 1 mod 4 cannot
//! come from any byte string and is rejected before decoding starts.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use secnote_core::{SecnoteError, SecnoteResult};

/// Encode bytes with the `A-Z a-z 0-9 - _` alphabet and no padding.
pub fn encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode text produced by [`encode`].
///
/// Fails on a structurally impossible length, on characters outside the
/// alphabet, and on non-canonical trailing bits.
pub fn decode(text: &str) -> SecnoteResult<Vec<u8>> {
    if text.len() % 4 == 1 {
        return Err(SecnoteError::invalid(
            "base64url",
            format!("length {} cannot encode any byte sequence", text.len()),
        ));
    }
    URL_SAFE_NO_PAD
        .decode(text)
        .map_err(|e| SecnoteError::invalid("base64url", e.to_string()))
}

/// Number of bytes a well-formed encoded text of `len` symbols decodes to.
pub fn decoded_len(len: usize) -> usize {
    len * 3 / 4
}
