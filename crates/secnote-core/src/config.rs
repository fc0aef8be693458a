use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{SecnoteError, SecnoteResult};
use crate::types::NoteSettings;

pub const MIB: u64 = 1024 * 1024;

/// Top-level server configuration (loaded from secnote.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecnoteConfig {
    pub server: ServerConfig,
    pub limits: Limits,
}

impl SecnoteConfig {
    /// Load from a TOML file. A missing file is an [`SecnoteError::Io`] with
    /// kind `NotFound`; callers decide whether defaults are acceptable.
    pub fn load(path: &Path) -> SecnoteResult<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| SecnoteError::Config(format!("parsing {}: {e}", path.display())))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP listen address (default: 0.0.0.0:3000)
    pub listen: String,
    /// Upper bound on bytes held by the note store (default: 1 GiB)
    pub max_memory_usage: u64,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".into(),
            max_memory_usage: 1024 * MIB,
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}

/// Limits published to clients at `GET /config`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum size of a stored note in bytes (after encryption and packaging)
    pub max_note_size: u64,
    /// Maximum number of files, 0 means no file allowed
    pub max_files: u32,
    /// Seconds before a note is removed, 0 for never
    pub default_expires_after: u32,
    /// Views before a note is removed, 0 for never
    pub default_remaining_views: u32,
    pub min_remaining_views: u32,
    /// 0 for no upper bound
    pub max_remaining_views: u32,
    pub min_expires_after: u32,
    /// 0 for no upper bound
    pub max_expires_after: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_note_size: 32 * MIB,
            max_files: u32::MAX,
            default_expires_after: 0,
            default_remaining_views: 1,
            min_remaining_views: 0,
            max_remaining_views: 0,
            min_expires_after: 0,
            max_expires_after: 3600 * 24,
        }
    }
}

impl Limits {
    /// Apply the configured bounds: minimum first, then the maximum if set.
    pub fn clamp_settings(&self, settings: NoteSettings) -> NoteSettings {
        let mut expires_after = settings.expires_after.max(self.min_expires_after);
        if self.max_expires_after > 0 {
            expires_after = expires_after.min(self.max_expires_after);
        }

        let mut remaining_views = settings.remaining_views.max(self.min_remaining_views);
        if self.max_remaining_views > 0 {
            remaining_views = remaining_views.min(self.max_remaining_views);
        }

        NoteSettings {
            remaining_views,
            expires_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:8080"
max_memory_usage = 2147483648
log_level = "debug"
log_format = "json"

[limits]
max_note_size = 1048576
max_files = 4
default_expires_after = 600
default_remaining_views = 2
min_remaining_views = 1
max_remaining_views = 10
min_expires_after = 60
max_expires_after = 7200
"#;
        let config: SecnoteConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.server.listen, "127.0.0.1:8080");
        assert_eq!(config.server.max_memory_usage, 2048 * MIB);
        assert_eq!(config.server.log_format, "json");
        assert_eq!(config.limits.max_note_size, MIB);
        assert_eq!(config.limits.max_files, 4);
        assert_eq!(config.limits.max_remaining_views, 10);
        assert_eq!(config.limits.max_expires_after, 7200);
    }

    #[test]
    fn test_parse_defaults() {
        let config: SecnoteConfig = toml::from_str("").unwrap();

        assert_eq!(config.server.listen, "0.0.0.0:3000");
        assert_eq!(config.server.max_memory_usage, 1024 * MIB);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.limits.max_note_size, 32 * MIB);
        assert_eq!(config.limits.max_files, u32::MAX);
        assert_eq!(config.limits.default_remaining_views, 1);
        assert_eq!(config.limits.max_expires_after, 86400);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[limits]
max_files = 0
"#;
        let config: SecnoteConfig = toml::from_str(toml_str).unwrap();

        // Overridden
        assert_eq!(config.limits.max_files, 0);
        // Defaults
        assert_eq!(config.limits.max_note_size, 32 * MIB);
        assert_eq!(config.server.listen, "0.0.0.0:3000");
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = SecnoteConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(
            matches!(&err, SecnoteError::Io(e) if e.kind() == std::io::ErrorKind::NotFound),
            "{err}"
        );
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secnote.toml");
        std::fs::write(&path, "[server]\nlisten = \"127.0.0.1:9000\"\n").unwrap();
        let config = SecnoteConfig::load(&path).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9000");
        assert_eq!(config.limits, Limits::default());
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[server\nlisten = ").unwrap();
        let err = SecnoteConfig::load(&path).unwrap_err();
        assert!(matches!(err, SecnoteError::Config(_)));
    }

    #[test]
    fn test_clamp_settings() {
        let limits = Limits {
            min_remaining_views: 1,
            max_remaining_views: 5,
            min_expires_after: 60,
            max_expires_after: 3600,
            ..Limits::default()
        };

        let clamped = limits.clamp_settings(NoteSettings {
            remaining_views: 0,
            expires_after: 0,
        });
        assert_eq!(clamped.remaining_views, 1);
        assert_eq!(clamped.expires_after, 60);

        let clamped = limits.clamp_settings(NoteSettings {
            remaining_views: 50,
            expires_after: 100_000,
        });
        assert_eq!(clamped.remaining_views, 5);
        assert_eq!(clamped.expires_after, 3600);
    }

    #[test]
    fn test_clamp_zero_max_means_unbounded() {
        let limits = Limits {
            max_remaining_views: 0,
            max_expires_after: 0,
            ..Limits::default()
        };
        let settings = NoteSettings {
            remaining_views: 1_000_000,
            expires_after: u32::MAX,
        };
        assert_eq!(limits.clamp_settings(settings), settings);
    }
}
