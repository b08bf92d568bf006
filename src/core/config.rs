use crate::models::pose::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Base URL of the posture scoring service
    pub backend_url: String,
    /// Live scoring sample interval in milliseconds
    pub sample_interval_ms: u64,
    /// JPEG quality for sampled frames (1-100)
    pub jpeg_quality: u8,
    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: u64,
    /// Draw the skeletal overlay on start
    pub overlay_enabled: bool,
    /// Pose estimation engine settings
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:5001".to_string(),
            sample_interval_ms: 600,
            jpeg_quality: 80,
            max_upload_bytes: 100 * 1024 * 1024,
            overlay_enabled: true,
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating with defaults if it doesn't exist
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            // Create default config and save it
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.validate()?;

        let config_path = Self::get_config_path()?;

        // Create parent directories if they don't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if !self.backend_url.starts_with("http://") && !self.backend_url.starts_with("https://") {
            return Err(format!(
                "Invalid backend URL: {}. Must start with http:// or https://",
                self.backend_url
            )
            .into());
        }

        // Anything faster than 100ms would flood the scoring service
        if self.sample_interval_ms < 100 || self.sample_interval_ms > 10_000 {
            return Err(format!(
                "Invalid sample interval: {}ms. Must be between 100 and 10000",
                self.sample_interval_ms
            )
            .into());
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(format!(
                "Invalid JPEG quality: {}. Must be between 1 and 100",
                self.jpeg_quality
            )
            .into());
        }

        if self.max_upload_bytes == 0 {
            return Err("Maximum upload size cannot be zero".into());
        }

        if !(0.0..=1.0).contains(&self.engine.min_detection_confidence) {
            return Err(format!(
                "Invalid detection confidence: {}. Must be between 0.0 and 1.0",
                self.engine.min_detection_confidence
            )
            .into());
        }

        if !(0.0..=1.0).contains(&self.engine.min_tracking_confidence) {
            return Err(format!(
                "Invalid tracking confidence: {}. Must be between 0.0 and 1.0",
                self.engine.min_tracking_confidence
            )
            .into());
        }

        Ok(())
    }

    /// Reset to default configuration
    pub fn reset() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Self::default();
        config.save()?;
        Ok(config)
    }

    /// Get the configuration file path
    fn get_config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| "Could not determine home directory")?;

        let mut path = PathBuf::from(home);
        path.push(".posture_studio");
        path.push("settings.json");

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pose::ModelComplexity;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend_url, "http://localhost:5001");
        assert_eq!(config.sample_interval_ms, 600);
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.max_upload_bytes, 100 * 1024 * 1024);
        assert!(config.overlay_enabled);
        assert_eq!(config.engine.min_detection_confidence, 0.5);
        assert_eq!(config.engine.model_complexity, ModelComplexity::Full);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        // Valid config should pass
        assert!(config.validate().is_ok());

        // Invalid backend URL
        config.backend_url = "localhost:5001".to_string();
        assert!(config.validate().is_err());
        config.backend_url = "http://localhost:5001".to_string();

        // Invalid sample interval
        config.sample_interval_ms = 50;
        assert!(config.validate().is_err());
        config.sample_interval_ms = 60_000;
        assert!(config.validate().is_err());
        config.sample_interval_ms = 600;

        // Invalid JPEG quality
        config.jpeg_quality = 0;
        assert!(config.validate().is_err());
        config.jpeg_quality = 101;
        assert!(config.validate().is_err());
        config.jpeg_quality = 80;

        // Invalid engine confidence
        config.engine.min_detection_confidence = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }
}
