use serde::{Deserialize, Serialize};

/// Request/response header carrying seconds until the note expires
pub const X_EXPIRES_AFTER: &str = "x-note-expires-after";

/// Request/response header carrying the number of views left
pub const X_REMAINING_VIEWS: &str = "x-note-remaining-views";

/// Lifetime limits the sender attaches to a stored note.
///
/// The core never interprets these; they ride alongside the opaque blob.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSettings {
    /// Number of views before the note is removed, 0 for no limit
    pub remaining_views: u32,
    /// Number of seconds before the note is removed, 0 for no expiration
    pub expires_after: u32,
}

/// Lifetime state reported when a note is read back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteStatus {
    /// Seconds left before expiry, `None` when the note never expires
    pub expires_after: Option<u32>,
    /// Views left, `None` when unlimited. `Some(0)` means this was the last view.
    pub remaining_views: Option<u32>,
}

impl NoteStatus {
    pub fn is_last_view(&self) -> bool {
        self.remaining_views == Some(0)
    }
}

/// Parse a settings header value; an absent header means 0 (no limit).
pub fn parse_limit_header(value: Option<&str>) -> Result<u32, std::num::ParseIntError> {
    match value {
        Some(v) => v.trim().parse(),
        None => Ok(0),
    }
}

/// Format a status header value; "no limit" is written as `-1`.
pub fn format_status_header(value: Option<u32>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "-1".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_header_defaults_to_zero() {
        assert_eq!(parse_limit_header(None).unwrap(), 0);
        assert_eq!(parse_limit_header(Some("42")).unwrap(), 42);
        assert!(parse_limit_header(Some("-1")).is_err());
        assert!(parse_limit_header(Some("abc")).is_err());
    }

    #[test]
    fn test_status_header_format() {
        assert_eq!(format_status_header(None), "-1");
        assert_eq!(format_status_header(Some(0)), "0");
        assert_eq!(format_status_header(Some(3)), "3");
    }

    #[test]
    fn test_last_view() {
        let status = NoteStatus {
            expires_after: None,
            remaining_views: Some(0),
        };
        assert!(status.is_last_view());
        assert!(!NoteStatus::default().is_last_view());
    }
}
