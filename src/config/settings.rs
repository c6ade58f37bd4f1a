//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// CameraConfig
// ---------------------------------------------------------------------------

/// Settings for webcam and microphone acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Camera device index as enumerated by the platform (0 = default).
    pub device_index: u32,
    /// Microphone device name — `None` means the system default.
    pub audio_device: Option<String>,
    /// Continue without a microphone track when no input device is present.
    ///
    /// When `false`, a missing microphone fails acquisition outright.
    pub allow_missing_microphone: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            audio_device: None,
            allow_missing_microphone: true,
        }
    }
}

// ---------------------------------------------------------------------------
// RecorderConfig
// ---------------------------------------------------------------------------

/// Settings for clip encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Target video bitrate in kbit/s (0 = encoder default).
    pub bitrate_kbps: u32,
    /// Keyframe interval in frames (0 = encoder default).
    pub keyframe_interval: u32,
    /// Seconds counted down before recording starts.
    pub countdown_secs: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            bitrate_kbps: 0,
            keyframe_interval: 60,
            countdown_secs: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessingConfig
// ---------------------------------------------------------------------------

/// Artificial latencies for the mocked collaborator services.
///
/// The mock OCR and eligibility backends wait these long before answering so
/// the UI exercises its progress states the way it would against real
/// services. Tests construct the services with zero delay directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Delay before a mock document-processing response, in milliseconds.
    pub document_delay_ms: u64,
    /// Delay before a mock eligibility decision, in milliseconds.
    pub decision_delay_ms: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            document_delay_ms: 1_500,
            decision_delay_ms: 2_000,
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Window appearance and artifact-persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Last saved window position `(x, y)` in screen pixels. `None` means
    /// let the OS / window manager pick a position on first launch.
    pub window_position: Option<(f32, f32)>,
    /// Write submitted clips and the application summary to disk when the
    /// application enters processing.
    pub save_artifacts: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_position: None,
            save_artifacts: true,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use loanbooth::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Webcam / microphone settings.
    pub camera: CameraConfig,
    /// Clip encoding settings.
    pub recorder: RecorderConfig,
    /// Mock-collaborator latency settings.
    pub processing: ProcessingConfig,
    /// Window / artifact settings.
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
