use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, StudioError};

/// Resolves a quality preset to the opaque parameter fragment spliced into
/// the command after the encoder.
pub trait PresetLookup: Send + Sync {
    fn lookup(&self, encoder: &str, preset: &str) -> Option<String>;
}

/// Quality presets keyed by encoder name, then preset name.
///
/// The parameter strings are trusted as-is; only the presence of the encoder
/// and preset keys is checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityPresets {
    encoders: BTreeMap<String, BTreeMap<String, String>>,
}

impl QualityPresets {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading quality presets from {}", path.display());

        let content = std::fs::read_to_string(path)
            .map_err(|e| StudioError::Config(format!("Failed to read presets file {}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Presets shipped with the application
    pub fn builtin() -> Self {
        let table: &[(&str, &[(&str, &str)])] = &[
            ("libx264", &[
                ("high", "-crf 18 -preset slow"),
                ("balanced", "-crf 23 -preset medium"),
                ("fast", "-crf 28 -preset veryfast"),
            ]),
            ("libx265", &[
                ("high", "-crf 20 -preset slow"),
                ("balanced", "-crf 26 -preset medium"),
                ("fast", "-crf 30 -preset fast"),
            ]),
            ("libvpx-vp9", &[
                ("high", "-crf 24 -b:v 0 -deadline good -cpu-used 1"),
                ("balanced", "-crf 31 -b:v 0 -deadline good -cpu-used 2"),
                ("fast", "-crf 36 -b:v 0 -deadline realtime -cpu-used 5"),
            ]),
            ("libsvtav1", &[
                ("high", "-crf 24 -preset 4"),
                ("balanced", "-crf 30 -preset 7"),
                ("fast", "-crf 35 -preset 10"),
            ]),
            ("h264_nvenc", &[
                ("high", "-preset p7 -cq 19"),
                ("balanced", "-preset p4 -cq 23"),
                ("fast", "-preset p1 -cq 28"),
            ]),
            ("hevc_nvenc", &[
                ("high", "-preset p7 -cq 21"),
                ("balanced", "-preset p4 -cq 26"),
                ("fast", "-preset p1 -cq 30"),
            ]),
        ];

        let encoders = table
            .iter()
            .map(|(encoder, presets)| {
                let presets = presets
                    .iter()
                    .map(|(name, params)| (name.to_string(), params.to_string()))
                    .collect();
                (encoder.to_string(), presets)
            })
            .collect();

        Self { encoders }
    }

    /// Preset names available for an encoder, in name order
    pub fn presets_for(&self, encoder: &str) -> Vec<&str> {
        self.encoders
            .get(encoder)
            .map(|presets| presets.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn has_encoder(&self, encoder: &str) -> bool {
        self.encoders.contains_key(encoder)
    }
}

impl PresetLookup for QualityPresets {
    fn lookup(&self, encoder: &str, preset: &str) -> Option<String> {
        self.encoders.get(encoder)?.get(preset).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let presets = QualityPresets::builtin();
        assert_eq!(
            presets.lookup("libx264", "balanced").as_deref(),
            Some("-crf 23 -preset medium")
        );
        assert_eq!(presets.lookup("libx264", "nonexistent"), None);
        assert_eq!(presets.lookup("unknown_encoder", "balanced"), None);
        assert_eq!(presets.presets_for("libx265"), vec!["balanced", "fast", "high"]);
    }

    #[test]
    fn test_document_is_not_validated_beyond_keys() {
        let presets = QualityPresets::from_json(
            r#"{ "libx264": { "odd": "  -crf   17    -tune film  " } }"#,
        )
        .unwrap();

        assert!(presets.has_encoder("libx264"));
        assert_eq!(
            presets.lookup("libx264", "odd").as_deref(),
            Some("  -crf   17    -tune film  ")
        );
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            QualityPresets::from_json("{ not json"),
            Err(StudioError::Json(_))
        ));
    }
}
