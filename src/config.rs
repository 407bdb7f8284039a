use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::age_band;
use crate::extraction::ExtractionClient;
use crate::parser::{TemperatureInference, VitalParser};
use crate::retry::DEFAULT_MAX_RETRIES;
use crate::session::CaptureSession;
use crate::transcription::TranscriptionClient;
use crate::vitals::VitalKind;

/// Persistent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema_version: u32,
    pub transcription_url: String,
    pub extraction_url: String,
    pub extraction_api_key: String,
    pub extraction_client_id: String,
    pub extraction_model: String,
    pub language: String,
    pub input_device_id: Option<String>,
    pub temperature_inference: TemperatureInference,
    /// Wizard steps, in order
    pub prompt_order: Vec<VitalKind>,
    pub max_retries: u32,
    pub max_recording_secs: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: 1,
            transcription_url: "http://localhost:8001".to_string(),
            extraction_url: "http://localhost:4000".to_string(),
            extraction_api_key: String::new(),
            extraction_client_id: "vitalscribe".to_string(),
            extraction_model: "fast-model".to_string(),
            language: "en".to_string(),
            input_device_id: None,
            temperature_inference: TemperatureInference::Heuristic,
            prompt_order: VitalKind::ALL.to_vec(),
            max_retries: DEFAULT_MAX_RETRIES,
            max_recording_secs: 30,
        }
    }
}

impl Config {
    /// Get the default config directory
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".vitalscribe"))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from file or return default
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                debug!("Failed to load config, using default: {}", e);
                Self::default()
            }
        }
    }

    /// Load config from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load config from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    pub fn parser(&self) -> VitalParser {
        VitalParser::new(self.temperature_inference)
    }

    pub fn transcription_client(&self) -> Result<TranscriptionClient> {
        Ok(TranscriptionClient::new(&self.transcription_url, &self.language)?
            .with_max_retries(self.max_retries))
    }

    pub fn extraction_client(&self) -> Result<ExtractionClient> {
        Ok(ExtractionClient::new(
            &self.extraction_url,
            &self.extraction_api_key,
            &self.extraction_client_id,
            &self.extraction_model,
        )?
        .with_max_retries(self.max_retries))
    }

    /// A fresh capture session for a patient of the given age.
    ///
    /// An empty prompt order falls back to every vital.
    pub fn new_session(&self, age_expression: &str) -> CaptureSession {
        let kinds = if self.prompt_order.is_empty() {
            VitalKind::ALL.to_vec()
        } else {
            self.prompt_order.clone()
        };
        CaptureSession::new(kinds, age_band::resolve(age_expression)).with_parser(self.parser())
    }

    #[cfg(feature = "microphone")]
    pub fn microphone(&self) -> crate::microphone::MicrophoneCapture {
        crate::microphone::MicrophoneCapture::new(
            self.input_device_id.clone(),
            self.max_recording_secs,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::age_band::AgeBand;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schema_version, 1);
        assert_eq!(config.temperature_inference, TemperatureInference::Heuristic);
        assert_eq!(config.prompt_order.len(), 6);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path().unwrap();
        assert!(path.to_string_lossy().contains(".vitalscribe"));
        assert!(path.to_string_lossy().ends_with("config.json"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            temperature_inference: TemperatureInference::RequireUnit,
            prompt_order: vec![VitalKind::Spo2, VitalKind::Hr],
            input_device_id: Some("USB Mic".to_string()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"language": "fr", "temperature_inference": "require_unit"}"#)
            .unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.language, "fr");
        assert_eq!(loaded.temperature_inference, TemperatureInference::RequireUnit);
        assert_eq!(loaded.transcription_url, "http://localhost:8001");
        assert_eq!(loaded.prompt_order, VitalKind::ALL.to_vec());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_clients_from_config() {
        let config = Config::default();
        assert_eq!(
            config.transcription_client().unwrap().base_url(),
            "http://localhost:8001"
        );
        assert_eq!(
            config.extraction_client().unwrap().base_url(),
            "http://localhost:4000"
        );

        let bad = Config {
            transcription_url: "ftp://example.com".to_string(),
            ..Config::default()
        };
        assert!(bad.transcription_client().is_err());
    }

    #[test]
    fn test_new_session_uses_order_and_band() {
        let config = Config {
            prompt_order: vec![VitalKind::Spo2, VitalKind::Hr],
            ..Config::default()
        };
        let session = config.new_session("3 months");
        assert_eq!(session.band(), AgeBand::Infant);
        let kinds: Vec<VitalKind> = session.prompts().iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![VitalKind::Spo2, VitalKind::Hr]);

        let empty = Config {
            prompt_order: Vec::new(),
            ..Config::default()
        };
        assert_eq!(empty.new_session("").prompts().len(), 6);
    }
}
