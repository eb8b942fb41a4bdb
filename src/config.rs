//! Configuration management.
//!
//! Settings come from defaults, an optional TOML config file discovered next
//! to the data directory, and a handful of environment overrides. Precedence
//! is env > file > defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;
use crate::ocr::ExtractionConfig;
use crate::vision::DetectionConfig;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "scenesleuth.db";

/// Default images subdirectory name.
const IMAGES_SUBDIR: &str = "images";

/// Pipeline timeout configuration, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Per-image object detection deadline.
    #[serde(default = "default_detection_secs")]
    pub detection_secs: u64,
    /// Per-image text extraction deadline.
    #[serde(default = "default_extraction_secs")]
    pub extraction_secs: u64,
    /// Deadline for each successive inference fragment.
    #[serde(default = "default_token_secs")]
    pub token_secs: u64,
}

fn default_detection_secs() -> u64 {
    30
}
fn default_extraction_secs() -> u64 {
    30
}
fn default_token_secs() -> u64 {
    120
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            detection_secs: default_detection_secs(),
            extraction_secs: default_extraction_secs(),
            token_secs: default_token_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn detection(&self) -> Duration {
        Duration::from_secs(self.detection_secs)
    }

    pub fn extraction(&self) -> Duration {
        Duration::from_secs(self.extraction_secs)
    }

    pub fn token(&self) -> Duration {
        Duration::from_secs(self.token_secs)
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Directory for storing uploaded images.
    pub images_dir: PathBuf,
    /// Object detection adapter configuration.
    pub detection: DetectionConfig,
    /// Text extraction adapter configuration.
    pub extraction: ExtractionConfig,
    /// LLM adapter configuration.
    pub llm: LlmConfig,
    /// Pipeline stage timeouts.
    pub timeouts: TimeoutConfig,
}

impl Default for Settings {
    fn default() -> Self {
        // User data defaults to ~/Documents/scenesleuth/, falling back to the
        // home directory and then the working directory.
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scenesleuth");

        Self {
            images_dir: data_dir.join(IMAGES_SUBDIR),
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            detection: DetectionConfig::default(),
            extraction: ExtractionConfig::default(),
            llm: LlmConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            images_dir: data_dir.join(IMAGES_SUBDIR),
            data_dir,
            ..Default::default()
        }
    }

    /// Get the full path to the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Check if the database file exists yet.
    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Ensure the data and image directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.images_dir)?;
        Ok(())
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Object detection configuration.
    #[serde(default)]
    pub detection: DetectionConfig,
    /// Text extraction configuration.
    #[serde(default)]
    pub extraction: ExtractionConfig,
    /// LLM configuration.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Pipeline timeouts.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub async fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Apply file configuration on top of settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = PathBuf::from(data_dir);
            settings.images_dir = settings.data_dir.join(IMAGES_SUBDIR);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        settings.detection = self.detection.clone();
        settings.extraction = self.extraction.clone();
        settings.llm = self.llm.clone();
        settings.timeouts = self.timeouts.clone();
    }
}

/// Look for a config file inside the data directory.
fn find_config_in(data_dir: &Path) -> Option<PathBuf> {
    for basename in ["scenesleuth", "config"] {
        let path = data_dir.join(format!("{basename}.toml"));
        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load settings for a data directory, applying config file values and
/// environment overrides.
pub async fn load_settings(data_dir: Option<PathBuf>) -> Settings {
    let mut settings = match data_dir {
        Some(dir) => Settings::with_data_dir(dir),
        None => Settings::default(),
    };

    if let Some(config_path) = find_config_in(&settings.data_dir) {
        match Config::load_from_path(&config_path).await {
            Ok(config) => {
                tracing::debug!(path = %config_path.display(), "loaded config file");
                config.apply_to_settings(&mut settings);
            }
            Err(e) => {
                tracing::warn!(path = %config_path.display(), error = %e, "ignoring unreadable config file");
            }
        }
    }

    // Env overrides for the external services.
    if let Some(endpoint) = env_nonempty("OLLAMA_URL") {
        settings.llm.endpoint = endpoint;
    }
    if let Some(model) = env_nonempty("OLLAMA_MODEL") {
        settings.llm.model = model;
    }
    if let Some(endpoint) = env_nonempty("DETECTOR_URL") {
        settings.detection.endpoint = endpoint;
    }

    settings
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}
