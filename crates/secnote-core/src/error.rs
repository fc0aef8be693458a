use thiserror::Error;

pub type SecnoteResult<T> = Result<T, SecnoteError>;

/// Broad failure classes. Every class is terminal for the operation that
/// raised it; nothing in the library retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed bytes or text: unknown version, truncation, bad encoding
    Format,
    /// A length or size does not fit its integer width
    Range,
    /// AEAD tag check failed
    Authentication,
    /// Password generator constraints cannot be satisfied
    Constraint,
    /// Caller abandoned an in-flight operation
    Cancelled,
    Io,
    Config,
}

#[derive(Debug, Error)]
pub enum SecnoteError {
    #[error("unknown envelope version {0}")]
    UnknownVersion(u8),

    #[error("truncated {field}: need {needed} bytes, {available} available")]
    Truncated {
        field: &'static str,
        needed: u64,
        available: u64,
    },

    #[error("invalid {field}: {reason}")]
    InvalidEncoding { field: &'static str, reason: String },

    #[error("{field} out of range: {value} (limit {limit})")]
    OutOfRange {
        field: &'static str,
        value: u64,
        limit: u64,
    },

    /// A stored note would exceed the whole store capacity on its own.
    #[error("note too big: {size} bytes, store capacity {capacity}")]
    NoteTooBig { size: u64, capacity: u64 },

    /// Deliberately carries no detail: a wrong key and a corrupted blob are
    /// indistinguishable to the caller.
    #[error("authentication failed: wrong key or corrupted note")]
    Authentication,

    #[error("password constraint: {0}")]
    Constraint(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SecnoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownVersion(_) | Self::Truncated { .. } | Self::InvalidEncoding { .. } => {
                ErrorKind::Format
            }
            Self::OutOfRange { .. } | Self::NoteTooBig { .. } => ErrorKind::Range,
            Self::Authentication => ErrorKind::Authentication,
            Self::Constraint(_) => ErrorKind::Constraint,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidEncoding {
            field,
            reason: reason.into(),
        }
    }
}
