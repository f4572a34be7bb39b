use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use crate::error::{Result, StudioError};

/// Executable used when no tool path is configured
pub const DEFAULT_TOOL: &str = "ffmpeg";

fn default_probe_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub tool: ToolConfig,
    #[serde(default)]
    pub presets: PresetsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Path to the ffmpeg binary; empty means `ffmpeg` on PATH
    pub binary_path: String,
    /// Emit resolution, bitrate, frame rate and color space overrides
    pub advanced_mode: bool,
    /// Timeout applied to every probe invocation (-version, -codecs, -encoders, -i)
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresetsConfig {
    /// JSON document mapping encoder -> preset -> parameter string.
    /// The built-in presets are used when unset.
    pub path: Option<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            binary_path: String::new(),
            advanced_mode: false,
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl ToolConfig {
    /// Executable to invoke, falling back to `ffmpeg` on PATH
    pub fn resolved_binary(&self) -> String {
        let trimmed = self.binary_path.trim();
        if trimmed.is_empty() {
            DEFAULT_TOOL.to_string()
        } else {
            trimmed.to_string()
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }
}

/// Settings consulted on every command build and job start.
pub trait SettingsProvider: Send + Sync {
    /// Executable that commands are handed to
    fn tool_path(&self) -> String;

    /// Whether advanced overrides are emitted
    fn advanced_mode(&self) -> bool;
}

impl SettingsProvider for Config {
    fn tool_path(&self) -> String {
        self.tool.resolved_binary()
    }

    fn advanced_mode(&self) -> bool {
        self.tool.advanced_mode
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StudioError::Config(format!("Failed to read config file: {}", e)))?;

        Ok(toml::from_str(&content)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StudioError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| StudioError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_binary_path_resolves_to_ffmpeg() {
        let config = Config::default();
        assert_eq!(config.tool_path(), "ffmpeg");

        let mut config = Config::default();
        config.tool.binary_path = "  /opt/ffmpeg/bin/ffmpeg ".to_string();
        assert_eq!(config.tool_path(), "/opt/ffmpeg/bin/ffmpeg");
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: Config = toml::from_str(
            r#"
            [tool]
            binary_path = "ffmpeg"
            advanced_mode = true
            "#,
        )
        .unwrap();

        assert!(config.advanced_mode());
        assert_eq!(config.tool.probe_timeout(), Duration::from_secs(5));
        assert!(config.presets.path.is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.tool.advanced_mode = true;
        config.presets.path = Some("presets.json".to_string());
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert!(loaded.tool.advanced_mode);
        assert_eq!(loaded.presets.path.as_deref(), Some("presets.json"));
    }

    #[test]
    fn test_malformed_config_is_toml_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tool\nbinary_path = ").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, StudioError::Toml(_)));
    }

    #[test]
    fn test_unreadable_config_is_config_error() {
        let err = Config::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, StudioError::Config(_)));
    }
}
