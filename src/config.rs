use log::{error, info};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_DEBUG, DEFAULT_DURATION, DEFAULT_OUTPUT_DIR, DEFAULT_PROFILE,
    ENV_CONFIG, ENV_DEBUG, ENV_DURATION, ENV_OUTPUT_DIR, ENV_OUTPUT_FILE, ENV_PREFIX, ENV_PROFILE,
    ENV_SAMPLE_RATE,
};
use crate::error::RecorderError;
use crate::session::CaptureProfile;

/// Settings for the speaker recorder.
///
/// Values are resolved with environment variables having the highest
/// precedence, followed by the config file, and then defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Capture profile: "selectable" or "fixed"
    pub profile: Option<String>,
    /// Requested sample rate; the first supported rate when unset
    pub sample_rate: Option<u32>,
    /// Directory for auto-named recordings
    pub output_dir: Option<String>,
    /// Explicit output file, overriding auto-naming
    pub output_file: Option<String>,
    /// Stop automatically after this many seconds (0 records until Ctrl+C)
    pub duration: Option<u64>,
    /// Enable debug logging
    pub debug: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            profile: Some(DEFAULT_PROFILE.to_string()),
            sample_rate: None,
            output_dir: Some(DEFAULT_OUTPUT_DIR.to_string()),
            output_file: None,
            duration: Some(DEFAULT_DURATION),
            debug: Some(DEFAULT_DEBUG),
        }
    }
}

impl AppConfig {
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(config_path) = env::var(ENV_CONFIG) {
            let path = Path::new(&config_path);
            if path.exists() {
                return Some(path.to_path_buf());
            }
        }

        let current_dir = Path::new(CONFIG_FILE_NAME);
        if current_dir.exists() {
            return Some(current_dir.to_path_buf());
        }

        if let Ok(home) = env::var("HOME") {
            let home_config = Path::new(&home).join(".config/speaker-recorder/config.toml");
            if home_config.exists() {
                return Some(home_config);
            }
        }

        if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
            let xdg_config_path = Path::new(&xdg_config).join("speaker-recorder/config.toml");
            if xdg_config_path.exists() {
                return Some(xdg_config_path);
            }
        }

        let system_config = Path::new("/etc/speaker-recorder/config.toml");
        if system_config.exists() {
            return Some(system_config.to_path_buf());
        }

        None
    }

    /// Load configuration from file, if available, then apply env overrides.
    pub fn load() -> Self {
        let mut config = AppConfig::default();

        if let Some(config_path) = Self::find_config_file() {
            match fs::read_to_string(&config_path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(file_config) => {
                        info!("Loaded configuration from {}", config_path.display());
                        config.merge(file_config);
                    }
                    Err(e) => {
                        error!("Error parsing config file: {}", e);
                    }
                },
                Err(e) => {
                    error!("Error reading config file: {}", e);
                }
            }
        }

        config.apply_env_vars();

        config
    }

    /// Merge another configuration into this one, only taking values that are Some
    pub fn merge(&mut self, other: AppConfig) {
        if other.profile.is_some() {
            self.profile = other.profile;
        }
        if other.sample_rate.is_some() {
            self.sample_rate = other.sample_rate;
        }
        if other.output_dir.is_some() {
            self.output_dir = other.output_dir;
        }
        if other.output_file.is_some() {
            self.output_file = other.output_file;
        }
        if other.duration.is_some() {
            self.duration = other.duration;
        }
        if other.debug.is_some() {
            self.debug = other.debug;
        }
    }

    fn parse_bool(val: &str) -> Option<bool> {
        match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        }
    }

    /// Look up `SPEAKER_RECORDER_<key>` first, then the plain variable.
    fn env_value(key: &str, plain: &str) -> Option<String> {
        env::var(format!("{ENV_PREFIX}{key}"))
            .ok()
            .or_else(|| env::var(plain).ok())
            .filter(|v| !v.trim().is_empty())
    }

    fn apply_env_vars(&mut self) {
        if let Some(val) = Self::env_value("PROFILE", ENV_PROFILE) {
            self.profile = Some(val);
        }

        if let Some(val) =
            Self::env_value("SAMPLE_RATE", ENV_SAMPLE_RATE).and_then(|s| s.trim().parse().ok())
        {
            self.sample_rate = Some(val);
        }

        if let Some(val) = Self::env_value("OUTPUT_DIR", ENV_OUTPUT_DIR) {
            self.output_dir = Some(val);
        }

        if let Some(val) = Self::env_value("OUTPUT_FILE", ENV_OUTPUT_FILE) {
            self.output_file = Some(val);
        }

        if let Some(val) =
            Self::env_value("DURATION", ENV_DURATION).and_then(|s| s.trim().parse().ok())
        {
            self.duration = Some(val);
        }

        if let Some(val) = Self::env_value("DEBUG", ENV_DEBUG).and_then(|s| Self::parse_bool(&s)) {
            self.debug = Some(val);
        }
    }

    /// Generate a sample configuration file with comments
    pub fn generate_sample_config() -> String {
        let default_config = AppConfig::default();

        format!(
            r#"# Speaker Recorder Configuration
# Values set here can be overridden by environment variables
# (SPEAKER_RECORDER_<KEY> or the unprefixed name).

# Capture profile:
#   "selectable" - sample rate chosen from the rates the speaker supports,
#                  up to two channels, one-second blocks
#   "fixed"      - 16000 Hz mono in 1600-frame blocks
# Default: {DEFAULT_PROFILE}
profile = "{}"

# Sample rate in Hz for the "selectable" profile.
# Leave unset to use the lowest rate the device supports.
# sample_rate = 48000

# Directory for auto-named recordings
# Default: {DEFAULT_OUTPUT_DIR}
output_dir = "{}"

# Write to this exact file instead of an auto-generated name
# output_file = "capture.wav"

# Stop after this many seconds (0 records until Ctrl+C)
# Default: {DEFAULT_DURATION}
duration = {}

# Enable debug logging (true/false)
# Default: {DEFAULT_DEBUG}
debug = {}
"#,
            default_config.get_profile_name(),
            default_config.get_output_dir(),
            default_config.get_duration(),
            default_config.get_debug(),
        )
    }

    /// Write the commented sample configuration to `path`.
    pub fn create_config_file(&self, path: &str) -> Result<(), RecorderError> {
        let config_content = Self::generate_sample_config();

        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, config_content)?;

        Ok(())
    }

    pub fn get_profile_name(&self) -> String {
        self.profile
            .clone()
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
    }

    /// Parsed capture profile; an unknown name is a configuration error.
    pub fn get_profile(&self) -> Result<CaptureProfile, RecorderError> {
        self.get_profile_name().parse()
    }

    pub fn get_sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    pub fn get_output_dir(&self) -> String {
        self.output_dir
            .clone()
            .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string())
    }

    pub fn get_output_file(&self) -> Option<PathBuf> {
        self.output_file.as_deref().map(PathBuf::from)
    }

    pub fn get_duration(&self) -> u64 {
        self.duration.unwrap_or(DEFAULT_DURATION)
    }

    pub fn get_debug(&self) -> bool {
        self.debug.unwrap_or(DEFAULT_DEBUG)
    }
}
