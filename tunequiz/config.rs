use crate::error::App;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    pub poll_interval_ms: u64,
    pub default_volume: f64,
    pub resolver: String,
    pub audio_format: String,
    pub resolve_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            poll_interval_ms: 250,
            default_volume: 0.5,
            resolver: "yt-dlp".to_string(),
            audio_format: "bestaudio".to_string(),
            resolve_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn parse(content: &str) -> Result<Self, App> {
        let mut settings: Settings = toml::from_str(content)?;
        if !settings.default_volume.is_finite() {
            settings.default_volume = Settings::default().default_volume;
        }
        settings.default_volume = settings.default_volume.clamp(0.0, 1.0);
        // A zero period would make tokio's interval panic.
        settings.poll_interval_ms = settings.poll_interval_ms.max(1);
        Ok(settings)
    }

    /// Reads `config.toml`, writing the defaults first if it does not exist yet.
    pub async fn load_or_create(path: &Path) -> Result<Self, App> {
        if !path.exists() {
            let defaults = Settings::default();
            fs::write(path, toml::to_string(&defaults)?).await?;
            return Ok(defaults);
        }
        let content = fs::read_to_string(path).await?;
        Settings::parse(&content)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Settings::parse("").unwrap(), Settings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings = Settings::parse("poll_interval_ms = 100\nresolver = \"/opt/yt-dlp\"").unwrap();
        assert_eq!(settings.poll_interval(), Duration::from_millis(100));
        assert_eq!(settings.resolver, "/opt/yt-dlp");
        assert_eq!(settings.audio_format, "bestaudio");
        assert!((settings.default_volume - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let settings = Settings::parse("default_volume = 3.0\npoll_interval_ms = 0").unwrap();
        assert!((settings.default_volume - 1.0).abs() < f64::EPSILON);
        assert_eq!(settings.poll_interval_ms, 1);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        assert!(matches!(
            Settings::parse("poll_interval_ms = \"soon\""),
            Err(App::Config(_))
        ));
    }
}
