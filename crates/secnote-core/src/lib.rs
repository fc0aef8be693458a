pub mod config;
pub mod error;
pub mod types;

pub use error::{ErrorKind, SecnoteError, SecnoteResult};
pub use types::{NoteSettings, NoteStatus};
