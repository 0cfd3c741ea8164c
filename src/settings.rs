use anyhow::Result;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppSettings {
    #[serde(default = "default_backend_base_url")]
    pub backend_base_url: String,
    /// Predictions at or below this confidence are never accepted.
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: f64,
    /// Length of each recorded camera segment.
    #[serde(default = "default_chunk_duration_ms")]
    pub chunk_duration_ms: u64,
    /// Cadence of the camera capture loop.
    #[serde(default = "default_chunk_interval_ms")]
    pub chunk_interval_ms: u64,
    /// Null-class labels the backend uses when it saw nothing usable.
    #[serde(default = "default_discard_labels")]
    pub discard_labels: Vec<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_speech_command")]
    pub speech_command: String,
}

fn default_backend_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_acceptance_threshold() -> f64 {
    0.5
}

fn default_chunk_duration_ms() -> u64 {
    3000
}

fn default_chunk_interval_ms() -> u64 {
    3500
}

fn default_discard_labels() -> Vec<String> {
    vec![
        "No Motion".to_string(),
        "No Hands Detected".to_string(),
        "Uncertain".to_string(),
    ]
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_speech_command() -> String {
    if cfg!(target_os = "macos") {
        "say".to_string()
    } else {
        "espeak".to_string()
    }
}

pub const SETTINGS_FILE_NAME: &str = "signscribe.json";

pub fn get_default_settings() -> AppSettings {
    AppSettings {
        backend_base_url: default_backend_base_url(),
        acceptance_threshold: default_acceptance_threshold(),
        chunk_duration_ms: default_chunk_duration_ms(),
        chunk_interval_ms: default_chunk_interval_ms(),
        discard_labels: default_discard_labels(),
        request_timeout_secs: default_request_timeout_secs(),
        speech_command: default_speech_command(),
    }
}

/// Read settings from `path`, falling back to defaults (and writing them
/// back) when the file is missing or unparseable.
pub fn load_or_create_settings(path: &Path) -> AppSettings {
    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<AppSettings>(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(
                    "Failed to parse settings at {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                let defaults = get_default_settings();
                if let Err(e) = write_settings(path, &defaults) {
                    warn!("Failed to write default settings: {}", e);
                }
                defaults
            }
        },
        Err(_) => {
            let defaults = get_default_settings();
            if let Err(e) = write_settings(path, &defaults) {
                warn!("Failed to write default settings: {}", e);
            }
            defaults
        }
    }
}

pub fn write_settings(path: &Path, settings: &AppSettings) -> Result<()> {
    let contents = serde_json::to_string_pretty(settings)?;
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_detection_page() {
        let settings = get_default_settings();
        assert_eq!(settings.backend_base_url, "http://localhost:5000");
        assert_eq!(settings.acceptance_threshold, 0.5);
        assert_eq!(settings.chunk_duration_ms, 3000);
        assert_eq!(settings.chunk_interval_ms, 3500);
        assert!(settings.discard_labels.contains(&"No Motion".to_string()));
    }

    #[test]
    fn test_missing_file_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);

        let settings = load_or_create_settings(&path);
        assert_eq!(settings.acceptance_threshold, 0.5);
        assert!(path.is_file());

        // Round-trips through the file it just wrote.
        let reloaded = load_or_create_settings(&path);
        assert_eq!(reloaded.backend_base_url, settings.backend_base_url);
    }

    #[test]
    fn test_partial_settings_fill_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        fs::write(&path, r#"{"backend_base_url": "http://example.com:9000"}"#).unwrap();

        let settings = load_or_create_settings(&path);
        assert_eq!(settings.backend_base_url, "http://example.com:9000");
        assert_eq!(settings.chunk_interval_ms, 3500);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        fs::write(&path, "not json at all").unwrap();

        let settings = load_or_create_settings(&path);
        assert_eq!(settings.backend_base_url, "http://localhost:5000");
    }
}
