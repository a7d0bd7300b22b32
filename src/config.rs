use serde::Deserialize;
use std::path::Path;

/// Add-on configuration, loaded once at startup and read-only thereafter.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Stream address handed verbatim to the video source.
    pub camera_rtsp_stream: String,
    /// Device identifier forwarded verbatim with every tag event.
    pub tag_event_device_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

fn default_base_url() -> String {
    "http://supervisor/core/api".into()
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_applies_defaults() {
        let config: Config = toml::from_str(
            r#"
            camera_rtsp_stream = "http://camera.local:81/stream"
            tag_event_device_id = "kiosk-door"
            "#,
        )
        .unwrap();
        assert_eq!(config.camera_rtsp_stream, "http://camera.local:81/stream");
        assert_eq!(config.tag_event_device_id, "kiosk-door");
        assert_eq!(config.api.base_url, "http://supervisor/core/api");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn sections_override_defaults() {
        let config: Config = toml::from_str(
            r#"
            camera_rtsp_stream = "http://camera.local:81/stream"
            tag_event_device_id = "kiosk-door"

            [api]
            base_url = "http://localhost:8123/api"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8123/api");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn missing_required_key_fails() {
        let result = toml::from_str::<Config>(r#"tag_event_device_id = "kiosk-door""#);
        assert!(result.is_err());
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let result = Config::load(Path::new("/nonexistent/options.toml"));
        assert!(matches!(result, Err(ConfigError::ReadFile(_, _))));
    }
}
