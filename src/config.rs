//! Configuration management for gesture-pilot
//!
//! Settings live in `~/.gesture-pilot/config.json` unless another path is
//! given on the command line. Every section uses `#[serde(default)]`, so a
//! file only needs the values it changes. Files carry a schema version and
//! are migrated forward on load.

use crate::controls::KeyBindings;
use crate::error::{Error, Result};
use crate::gesture::{ControlScheme, DEFAULT_PINCH_THRESHOLD};
use crate::input::InputBackend;
use crate::overlay::OverlayConfig;
use crate::tracker::SidecarConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current config schema version
pub const CURRENT_VERSION: u32 = 1;

/// Directory under the home directory that holds config and logs
const APP_DIR: &str = ".gesture-pilot";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema version for migrations
    pub version: u32,
    /// Webcam settings
    pub camera: CameraConfig,
    /// Frame preparation and landmark model settings
    pub tracker: TrackerConfig,
    /// Gesture vocabulary settings
    pub gestures: GestureConfig,
    /// Physical key for each control
    pub keys: KeyBindings,
    /// Key injection settings
    pub input: InputConfig,
    /// Preview window settings
    pub overlay: OverlayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            camera: CameraConfig::default(),
            tracker: TrackerConfig::default(),
            gestures: GestureConfig::default(),
            keys: KeyBindings::default(),
            input: InputConfig::default(),
            overlay: OverlayConfig::default(),
        }
    }
}

/// Webcam configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Index of the capture device
    pub device_index: u32,
    /// Requested capture width (the driver picks the closest mode)
    pub width: u32,
    /// Requested capture height
    pub height: u32,
    /// Requested frame rate
    pub fps: u32,
    /// Flip frames horizontally so movement matches the player's view
    pub mirror: bool,
    /// How long to wait for the first frame before giving up, in milliseconds
    pub warmup_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 1280,
            height: 720,
            fps: 30,
            mirror: true,
            warmup_ms: 5000,
        }
    }
}

/// Hand tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Width frames are resized to before detection
    pub process_width: u32,
    /// Height frames are resized to before detection
    pub process_height: u32,
    /// Landmark process settings
    pub sidecar: SidecarConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            process_width: 640,
            process_height: 480,
            sidecar: SidecarConfig::default(),
        }
    }
}

/// Gesture configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Gesture vocabulary and decision table
    pub scheme: ControlScheme,
    /// Thumb-to-index distance below which the hybrid scheme sees a pinch
    pub pinch_threshold: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            scheme: ControlScheme::default(),
            pinch_threshold: DEFAULT_PINCH_THRESHOLD,
        }
    }
}

/// Key injection configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub backend: InputBackend,
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist. Older schema versions are migrated and written back.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("Config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        let original_version = config.version;
        let migrated = migrate_config(config)?;
        if migrated.version != original_version {
            tracing::info!(
                "Migrated config from version {} to {}",
                original_version,
                migrated.version
            );
            migrated.save(path)?;
        }

        tracing::debug!("Config loaded from {}", path.display());
        Ok(migrated)
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)
            .map_err(|e| Error::Config(format!("Failed to write {}: {}", path.display(), e)))?;

        tracing::info!("Config saved to {}", path.display());
        Ok(())
    }

    /// Check ranges and key bindings.
    pub fn validate(&self) -> Result<()> {
        if self.version > CURRENT_VERSION {
            return Err(Error::Config(format!(
                "config version {} is newer than supported version {}",
                self.version, CURRENT_VERSION
            )));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::Config("camera width and height must be non-zero".into()));
        }
        if self.camera.fps == 0 {
            return Err(Error::Config("camera fps must be non-zero".into()));
        }
        if self.tracker.process_width == 0 || self.tracker.process_height == 0 {
            return Err(Error::Config("process width and height must be non-zero".into()));
        }

        let sidecar = &self.tracker.sidecar;
        if sidecar.command.is_empty() {
            return Err(Error::Config("sidecar command must not be empty".into()));
        }
        if sidecar.max_hands == 0 {
            return Err(Error::Config("sidecar max_hands must be at least 1".into()));
        }
        for (name, value) in [
            ("min_detection_confidence", sidecar.min_detection_confidence),
            ("min_tracking_confidence", sidecar.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{} must be within 0..=1", name)));
            }
        }

        let threshold = self.gestures.pinch_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(Error::Config("pinch_threshold must be within (0, 1]".into()));
        }
        if !(self.overlay.scale > 0.0) {
            return Err(Error::Config("overlay scale must be positive".into()));
        }

        self.keys.validate()
    }
}

/// Get the path to the default config file (~/.gesture-pilot/config.json)
pub fn default_config_path() -> PathBuf {
    app_dir().join("config.json")
}

/// Get the directory for log files (~/.gesture-pilot/logs)
pub fn log_dir() -> PathBuf {
    app_dir().join("logs")
}

fn app_dir() -> PathBuf {
    home_dir_or_fallback().join(APP_DIR)
}

/// Get the home directory, falling back to the temp directory if unavailable
fn home_dir_or_fallback() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        tracing::error!("Could not determine home directory, using temp directory");
        std::env::temp_dir()
    })
}

/// Migrate configuration from older schema versions
fn migrate_config(mut config: Config) -> Result<Config> {
    while config.version < CURRENT_VERSION {
        config = apply_migration(config)?;
    }
    Ok(config)
}

/// Apply a single migration step
fn apply_migration(config: Config) -> Result<Config> {
    match config.version {
        // Version 0 -> 1: files written before versioning
        0 => {
            let mut migrated = config;
            migrated.version = 1;
            Ok(migrated)
        }
        v => Err(Error::Config(format!("Unknown config version: {}", v))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::KeyCode;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_has_current_version() {
        let config = Config::default();
        assert_eq!(config.version, CURRENT_VERSION);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_camera_config_defaults() {
        let camera = CameraConfig::default();
        assert_eq!(camera.device_index, 0);
        assert_eq!((camera.width, camera.height), (1280, 720));
        assert_eq!(camera.fps, 30);
        assert!(camera.mirror);
    }

    #[test]
    fn test_tracker_config_defaults() {
        let tracker = TrackerConfig::default();
        assert_eq!((tracker.process_width, tracker.process_height), (640, 480));
        assert_eq!(tracker.sidecar.max_hands, 2);
    }

    #[test]
    fn test_partial_config_deserialisation() {
        // Missing fields fall back to defaults
        let json = r#"{"version": 1, "camera": {"fps": 60}, "keys": {"nitro": "space"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.camera.fps, 60);
        assert_eq!(config.camera.width, 1280);
        assert_eq!(config.keys.nitro, KeyCode::Space);
        assert_eq!(config.keys.throttle, KeyCode::Char('w'));
        assert_eq!(config.gestures.scheme, ControlScheme::FingerCount);
    }

    #[test]
    fn test_scheme_and_backend_serialisation() {
        let json = r#"{"gestures": {"scheme": "hybrid"}, "input": {"backend": "dry_run"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.gestures.scheme, ControlScheme::Hybrid);
        assert_eq!(config.input.backend, InputBackend::DryRun);
    }

    #[test]
    fn test_unknown_key_name_rejected() {
        let json = r#"{"keys": {"throttle": "hyper"}}"#;
        assert!(serde_json::from_str::<Config>(json).is_err());
    }

    #[test]
    fn test_migration_from_version_0() {
        let old_config = Config {
            version: 0,
            ..Default::default()
        };
        let migrated = migrate_config(old_config).unwrap();
        assert_eq!(migrated.version, CURRENT_VERSION);
    }

    #[test]
    fn test_load_migrates_and_writes_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"version": 0}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.version, CURRENT_VERSION);

        let on_disk: Config = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.version, CURRENT_VERSION);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_invalid_json_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_keys() {
        let mut config = Config::default();
        config.keys.nitro = KeyCode::Char('w');
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        let mut config = Config::default();
        config.gestures.pinch_threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.camera.fps = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tracker.sidecar.min_tracking_confidence = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.version = CURRENT_VERSION + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_path_format() {
        let path = default_config_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.contains(".gesture-pilot"));
        assert!(path_str.ends_with("config.json"));
        assert!(log_dir().ends_with("logs"));
    }
}
