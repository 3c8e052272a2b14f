//! Application Configuration
//!
//! User settings stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analysis::AddressFilter;
use crate::capture::CaptureConfig;
use crate::pipeline::scanner::DEFAULT_OCR_TIMEOUT;
use crate::pipeline::throttle::DEFAULT_MIN_INTERVAL;
use crate::pipeline::{ScanStrategy, DEFAULT_RUN_TIMEOUT};
use crate::vision::{CameraPosition, DeviceOrientation, ImageOrientation, OcrModelPaths, Orientation};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Camera feed settings
    pub capture: CaptureSettings,
    /// Frame admission settings
    pub throttle: ThrottleSettings,
    /// Orientation scanning settings
    pub scanner: ScannerSettings,
    /// Address filter
    pub filter: AddressFilter,
    /// OCR engine settings
    pub ocr: OcrSettings,
}

/// Capture-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Maximum capture FPS
    pub max_fps: u32,
    /// Replay the frame source from the start when it runs out
    pub loop_feed: bool,
    /// How the device is held, when known
    pub device_orientation: Option<DeviceOrientation>,
    /// Camera that produces the frames
    pub camera: CameraPosition,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            max_fps: 30,
            loop_feed: false,
            device_orientation: None,
            camera: CameraPosition::Back,
        }
    }
}

impl CaptureSettings {
    pub fn to_capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            max_fps: self.max_fps,
        }
    }

    /// Orientation of captured images, derived from device and camera
    pub fn image_orientation(&self, fallback: Orientation) -> ImageOrientation {
        match self.device_orientation {
            Some(device) => Orientation::for_device(device, self.camera),
            None => ImageOrientation {
                rotation: fallback,
                mirrored: self.camera == CameraPosition::Front,
            },
        }
    }
}

/// Frame admission settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    /// Minimum spacing between admitted frames in milliseconds
    pub min_interval_ms: u64,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            min_interval_ms: DEFAULT_MIN_INTERVAL.as_millis() as u64,
        }
    }
}

impl ThrottleSettings {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// Orientation scanning settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerSettings {
    /// First rotation hypothesis tried
    pub first_orientation: Orientation,
    /// Sequential or parallel OCR attempts
    pub strategy: ScanStrategy,
    /// Bound on a single OCR call in milliseconds
    pub ocr_timeout_ms: u64,
    /// Bound on a whole pipeline run in milliseconds
    pub run_timeout_ms: u64,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            first_orientation: Orientation::Up,
            strategy: ScanStrategy::Sequential,
            ocr_timeout_ms: DEFAULT_OCR_TIMEOUT.as_millis() as u64,
            run_timeout_ms: DEFAULT_RUN_TIMEOUT.as_millis() as u64,
        }
    }
}

impl ScannerSettings {
    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_millis(self.ocr_timeout_ms)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }
}

/// OCR engine settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Directory holding `text-detection.rten` and `text-recognition.rten`.
    /// Defaults to the ocrs cache in the home directory.
    pub model_dir: Option<PathBuf>,
}

impl OcrSettings {
    pub fn model_paths(&self) -> Result<OcrModelPaths> {
        match &self.model_dir {
            Some(dir) => Ok(OcrModelPaths::in_dir(dir)),
            None => OcrModelPaths::default_cache(),
        }
    }
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "unitfinder", "UnitFinder")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Default location of the configuration file
pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        // Check capture defaults
        assert_eq!(config.capture.max_fps, 30);
        assert!(!config.capture.loop_feed);

        // Check throttle defaults
        assert_eq!(config.throttle.min_interval(), Duration::from_millis(333));

        // Check scanner defaults
        assert_eq!(config.scanner.first_orientation, Orientation::Up);
        assert_eq!(config.scanner.strategy, ScanStrategy::Sequential);
        assert_eq!(config.scanner.ocr_timeout(), Duration::from_secs(3));
        assert_eq!(config.scanner.run_timeout(), Duration::from_secs(10));

        // Check filter defaults
        assert_eq!(config.filter.city_substrings, vec!["lauderdale"]);
        assert_eq!(config.filter.zip_codes, vec!["33301"]);
        assert_eq!(config.filter.street_substrings, vec!["419", "2nd"]);

        // Check OCR defaults
        assert!(config.ocr.model_dir.is_none());
        assert!(config.capture.device_orientation.is_none());
        assert_eq!(config.capture.camera, CameraPosition::Back);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.capture.max_fps, parsed.capture.max_fps);
        assert_eq!(config.throttle.min_interval_ms, parsed.throttle.min_interval_ms);
        assert_eq!(config.scanner.strategy, parsed.scanner.strategy);
        assert_eq!(config.filter, parsed.filter);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [scanner]
            strategy = "parallel"
            first_orientation = "right"

            [filter]
            street_substrings = ["oak"]
            "#,
        )
        .unwrap();

        assert_eq!(parsed.scanner.strategy, ScanStrategy::Parallel);
        assert_eq!(parsed.scanner.first_orientation, Orientation::Right);
        assert_eq!(parsed.scanner.ocr_timeout_ms, 3000);
        assert_eq!(parsed.filter.street_substrings, vec!["oak"]);
        assert_eq!(parsed.filter.zip_codes, vec!["33301"]);
        assert_eq!(parsed.throttle.min_interval_ms, 333);
    }

    #[test]
    fn test_model_paths_from_dir() {
        let settings = OcrSettings {
            model_dir: Some(PathBuf::from("/opt/models")),
        };
        let paths = settings.model_paths().unwrap();
        assert_eq!(paths.detection, Path::new("/opt/models/text-detection.rten"));
    }

    #[test]
    fn test_image_orientation_from_device() {
        let mut settings = CaptureSettings::default();
        let fallback = settings.image_orientation(Orientation::Down);
        assert_eq!(fallback.rotation, Orientation::Down);
        assert!(!fallback.mirrored);

        settings.device_orientation = Some(DeviceOrientation::Portrait);
        settings.camera = CameraPosition::Front;
        let derived = settings.image_orientation(Orientation::Down);
        assert_eq!(derived.rotation, Orientation::Right);
        assert!(derived.mirrored);
    }

    #[test]
    fn test_capture_settings_from_toml() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [capture]
            device_orientation = "landscape_right"
            camera = "front"
            "#,
        )
        .unwrap();

        assert_eq!(
            parsed.capture.device_orientation,
            Some(DeviceOrientation::LandscapeRight)
        );
        assert_eq!(parsed.capture.camera, CameraPosition::Front);
        assert_eq!(parsed.capture.max_fps, 30);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.capture.max_fps = 15;
        config.filter.zip_codes.push("33304".to_string());

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(loaded.capture.max_fps, 15);
        assert_eq!(loaded.filter.zip_codes, vec!["33301", "33304"]);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
