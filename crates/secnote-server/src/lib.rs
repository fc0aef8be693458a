//! secnote-server: in-memory store and HTTP API for encrypted note blobs
//!
//! The server only ever sees the wire blob and its lifetime settings; the
//! decryption key travels in the share URL fragment and never reaches it.

pub mod api;
pub mod metrics;
pub mod store;

pub use api::{router, AppState};
pub use store::{NoteContent, NoteId, NoteRead, NoteStore};
