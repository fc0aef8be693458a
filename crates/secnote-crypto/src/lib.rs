//! secnote-crypto: client-side encryption for secnote
//!
//! A note is sealed under a one-time key that never reaches the server:
//! ```text
//! container bytes ──AES-256-GCM(key, random 96-bit IV)──▶ [version][iv][ciphertext ‖ tag]
//!                        │
//!                        └── key ──base64url──▶ share URL fragment
//! ```
//!
//! The password generator lives here too since it shares the secure
//! random source.

pub mod base64url;
pub mod envelope;
pub mod keys;
pub mod password;

pub use envelope::{decrypt, decrypt_with_key, encrypt, EnvelopeVersion};
pub use keys::{generate_note_key, NoteKey};
pub use password::{generate_password, ClassRule, PasswordSpec};

/// Size of a note key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM IV (96-bit)
pub const IV_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
