//! Editor Configuration
//!
//! Preview label size and interaction settings, loaded from a JSON file.
//! Every field has a default, so `{}` is a complete config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MM_PER_INCH: f64 = 25.4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Physical label the document is previewed or rendered at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelTarget {
    #[serde(default = "default_width_mm")]
    pub width_mm: f64,
    #[serde(default = "default_height_mm")]
    pub height_mm: f64,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_width_mm() -> f64 {
    74.0
}

fn default_height_mm() -> f64 {
    26.0
}

fn default_dpi() -> u32 {
    203
}

impl Default for LabelTarget {
    fn default() -> Self {
        Self {
            width_mm: default_width_mm(),
            height_mm: default_height_mm(),
            dpi: default_dpi(),
        }
    }
}

impl LabelTarget {
    /// Width, height and dpi floored at 1; non-finite sizes fall back to 1.
    pub fn sanitized(self) -> Self {
        let floor = |v: f64| if v.is_finite() { v.max(1.0) } else { 1.0 };
        Self {
            width_mm: floor(self.width_mm),
            height_mm: floor(self.height_mm),
            dpi: self.dpi.max(1),
        }
    }

    pub fn px_per_mm(&self) -> f64 {
        f64::from(self.dpi) / MM_PER_INCH
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default)]
    pub preview: LabelTarget,
    /// On-screen pixels per millimetre for the editor canvas.
    #[serde(default = "default_scale")]
    pub scale_px_per_mm: f64,
    /// Ratio snapping while dragging a split handle, in percent. 0 disables.
    #[serde(default = "default_snap_step")]
    pub snap_percent_step: f64,
}

fn default_scale() -> f64 {
    8.0
}

fn default_snap_step() -> f64 {
    5.0
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            preview: LabelTarget::default(),
            scale_px_per_mm: default_scale(),
            snap_percent_step: default_snap_step(),
        }
    }
}

impl EditorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded editor config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_object_is_default() {
        let config: EditorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.preview.width_mm, 74.0);
        assert_eq!(config.preview.dpi, 203);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"preview": {{"dpi": 300}}, "scale_px_per_mm": 4}}"#).unwrap();
        let config = EditorConfig::load(file.path()).unwrap();
        assert_eq!(config.preview.dpi, 300);
        assert_eq!(config.preview.height_mm, 26.0);
        assert_eq!(config.scale_px_per_mm, 4.0);
        assert_eq!(config.snap_percent_step, 5.0);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = EditorConfig::load(dir.path().join("nope.json"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(EditorConfig::load(&bad), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_sanitized_target() {
        let target = LabelTarget {
            width_mm: 0.0,
            height_mm: f64::NAN,
            dpi: 0,
        }
        .sanitized();
        assert_eq!(target, LabelTarget { width_mm: 1.0, height_mm: 1.0, dpi: 1 });
    }

    #[test]
    fn test_px_per_mm() {
        let target = LabelTarget {
            dpi: 254,
            ..LabelTarget::default()
        };
        assert!((target.px_per_mm() - 10.0).abs() < 1e-9);
    }
}
