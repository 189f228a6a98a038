//! Stream configuration management
//!
//! Loads, validates, and persists the parameters of the outbound stream.
//! The persisted form is a flat key -> integer JSON object so that older
//! settings blobs (and blobs written by other tools) stay readable: unknown
//! keys are ignored, missing or out-of-range keys fall back to defaults.

use crate::errors::StreamError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const WIDTH_RANGE: std::ops::RangeInclusive<i64> = 160..=1920;
pub const HEIGHT_RANGE: std::ops::RangeInclusive<i64> = 120..=1080;
pub const FPS_RANGE: std::ops::RangeInclusive<i64> = 1..=60;
pub const BITRATE_RANGE: std::ops::RangeInclusive<i64> = 100_000..=5_000_000;
pub const PORT_RANGE: std::ops::RangeInclusive<i64> = 1024..=65535;
pub const ROTATIONS: [i64; 4] = [0, 90, 180, 270];

/// Validated stream parameters.
///
/// Every field is guaranteed to lie within its closed range; the only way
/// to mutate a config is through [`ConfigStore::apply`], which rejects
/// out-of-range values per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Target bitrate in bits per second (absolute, not kbps).
    pub bitrate_bps: u32,
    /// One of 0, 90, 180, 270.
    pub rotation_degrees: u16,
    /// RTSP listening port.
    pub port: u16,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 15,
            bitrate_bps: 1_000_000,
            rotation_degrees: 0,
            port: 8554,
        }
    }
}

/// Fields of [`StreamConfig`], used for per-field validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    Width,
    Height,
    Fps,
    BitrateBps,
    RotationDegrees,
    Port,
}

/// Range check for a single field. Values outside the range are rejected by
/// [`ConfigStore::apply`]; they are never clamped.
pub fn validate(field: ConfigField, value: i64) -> bool {
    match field {
        ConfigField::Width => WIDTH_RANGE.contains(&value),
        ConfigField::Height => HEIGHT_RANGE.contains(&value),
        ConfigField::Fps => FPS_RANGE.contains(&value),
        ConfigField::BitrateBps => BITRATE_RANGE.contains(&value),
        ConfigField::RotationDegrees => ROTATIONS.contains(&value),
        ConfigField::Port => PORT_RANGE.contains(&value),
    }
}

/// Candidate values handed to [`ConfigStore::apply`]. `None` fields are
/// left untouched; `Some` fields are merged only if they pass validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigUpdate {
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub fps: Option<i64>,
    pub bitrate_bps: Option<i64>,
    pub rotation_degrees: Option<i64>,
    pub port: Option<i64>,
}

/// In-memory source of truth for stream parameters, backed by a settings
/// blob on disk.
pub struct ConfigStore {
    path: PathBuf,
    current: StreamConfig,
    last_persist_error: Option<String>,
}

impl ConfigStore {
    /// Load the settings blob at `path`, falling back to defaults for any
    /// key that is missing, malformed, or out of range. Malformed input
    /// never fails the caller.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let current = match fs::read_to_string(&path) {
            Ok(contents) => parse_blob(&contents, &path),
            Err(_) => {
                log::info!("No settings blob at {:?}, using defaults", path);
                StreamConfig::default()
            }
        };
        Self {
            path,
            current,
            last_persist_error: None,
        }
    }

    /// Current validated config.
    pub fn config(&self) -> StreamConfig {
        self.current
    }

    /// Error message from the most recent failed persist, if any. In-memory
    /// state is still authoritative after a persist failure.
    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    /// Merge the valid fields of `update` into the current config, leaving
    /// invalid fields at their prior values, then persist the result.
    ///
    /// A persist failure is logged and recorded but does not roll back the
    /// in-memory config.
    pub fn apply(&mut self, update: &ConfigUpdate) -> StreamConfig {
        if let Some(v) = update.width {
            if validate(ConfigField::Width, v) {
                self.current.width = v as u32;
            } else {
                log::warn!("Rejected out-of-range width {}", v);
            }
        }
        if let Some(v) = update.height {
            if validate(ConfigField::Height, v) {
                self.current.height = v as u32;
            } else {
                log::warn!("Rejected out-of-range height {}", v);
            }
        }
        if let Some(v) = update.fps {
            if validate(ConfigField::Fps, v) {
                self.current.fps = v as u32;
            } else {
                log::warn!("Rejected out-of-range fps {}", v);
            }
        }
        if let Some(v) = update.bitrate_bps {
            if validate(ConfigField::BitrateBps, v) {
                self.current.bitrate_bps = v as u32;
            } else {
                log::warn!("Rejected out-of-range bitrate {}", v);
            }
        }
        if let Some(v) = update.rotation_degrees {
            if validate(ConfigField::RotationDegrees, v) {
                self.current.rotation_degrees = v as u16;
            } else {
                log::warn!("Rejected rotation {}", v);
            }
        }
        if let Some(v) = update.port {
            if validate(ConfigField::Port, v) {
                self.current.port = v as u16;
            } else {
                log::warn!("Rejected out-of-range port {}", v);
            }
        }

        match self.persist() {
            Ok(()) => self.last_persist_error = None,
            Err(e) => {
                log::warn!("Failed to persist settings: {}", e);
                self.last_persist_error = Some(e.to_string());
            }
        }

        self.current
    }

    fn persist(&self) -> Result<(), StreamError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| StreamError::IoError(format!("create settings dir: {}", e)))?;
            }
        }
        let blob = serde_json::json!({
            "width": self.current.width,
            "height": self.current.height,
            "fps": self.current.fps,
            "bitrate": self.current.bitrate_bps,
            "rotation": self.current.rotation_degrees,
            "port": self.current.port,
        });
        fs::write(&self.path, blob.to_string())
            .map_err(|e| StreamError::IoError(format!("write settings blob: {}", e)))?;
        log::info!("Saved settings to {:?}", self.path);
        Ok(())
    }
}

fn parse_blob(contents: &str, path: &Path) -> StreamConfig {
    let value: serde_json::Value = match serde_json::from_str(contents) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Malformed settings blob at {:?} ({}), using defaults", path, e);
            return StreamConfig::default();
        }
    };

    let mut config = StreamConfig::default();
    let take = |key: &str, field: ConfigField| -> Option<i64> {
        value.get(key).and_then(|v| v.as_i64()).filter(|&v| validate(field, v))
    };

    if let Some(v) = take("width", ConfigField::Width) {
        config.width = v as u32;
    }
    if let Some(v) = take("height", ConfigField::Height) {
        config.height = v as u32;
    }
    if let Some(v) = take("fps", ConfigField::Fps) {
        config.fps = v as u32;
    }
    if let Some(v) = take("bitrate", ConfigField::BitrateBps) {
        config.bitrate_bps = v as u32;
    }
    if let Some(v) = take("rotation", ConfigField::RotationDegrees) {
        config.rotation_degrees = v as u16;
    }
    if let Some(v) = take("port", ConfigField::Port) {
        config.port = v as u16;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(name)
    }

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 480);
        assert_eq!(config.fps, 15);
        assert_eq!(config.bitrate_bps, 1_000_000);
        assert_eq!(config.rotation_degrees, 0);
        assert_eq!(config.port, 8554);
    }

    #[test]
    fn test_validate_ranges() {
        assert!(validate(ConfigField::Width, 160));
        assert!(validate(ConfigField::Width, 1920));
        assert!(!validate(ConfigField::Width, 159));
        assert!(!validate(ConfigField::Width, 1921));
        assert!(validate(ConfigField::RotationDegrees, 270));
        assert!(!validate(ConfigField::RotationDegrees, 45));
        assert!(!validate(ConfigField::Port, 1023));
        assert!(validate(ConfigField::Port, 65535));
        assert!(!validate(ConfigField::BitrateBps, 99_999));
    }

    #[test]
    fn test_apply_merges_only_valid_fields() {
        let mut store = ConfigStore::load(temp_path("localcam_apply_merge.json"));
        let config = store.apply(&ConfigUpdate {
            width: Some(99),
            fps: Some(30),
            ..Default::default()
        });
        // Invalid width retained prior value, valid fps applied in same call.
        assert_eq!(config.width, 640);
        assert_eq!(config.fps, 30);
        let _ = fs::remove_file(temp_path("localcam_apply_merge.json"));
    }

    #[test]
    fn test_malformed_blob_falls_back_to_defaults() {
        let path = temp_path("localcam_malformed.json");
        fs::write(&path, "{not json at all").unwrap();
        let store = ConfigStore::load(&path);
        assert_eq!(store.config(), StreamConfig::default());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let path = temp_path("localcam_unknown_keys.json");
        fs::write(&path, r#"{"width": 800, "codec": 99, "exposure": -1}"#).unwrap();
        let store = ConfigStore::load(&path);
        assert_eq!(store.config().width, 800);
        assert_eq!(store.config().height, 480);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_out_of_range_persisted_value_defaults() {
        let path = temp_path("localcam_bad_persisted.json");
        fs::write(&path, r#"{"port": 80}"#).unwrap();
        let store = ConfigStore::load(&path);
        assert_eq!(store.config().port, 8554);
        let _ = fs::remove_file(&path);
    }
}
