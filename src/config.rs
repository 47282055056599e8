use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use time::UtcOffset;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_THRESHOLD_SECS: u32 = 10;
pub const DEFAULT_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_DETECT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/detect";
pub const DEFAULT_COORDINATE_DIR: &str = "adminResources/parking-coordinate";
pub const DEFAULT_ZONES_FILENAME: &str = "mobile-camera-detect";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub detection: Option<DetectionSection>,
    #[serde(default)]
    pub capture: Option<CaptureSection>,
    #[serde(default)]
    pub zones: Option<ZonesSection>,
    #[serde(default)]
    pub history: Option<HistorySection>,
    #[serde(default)]
    pub server: Option<ServerSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectionSection {
    /// URL of the remote detection service
    pub endpoint: Option<String>,
    /// Per-request timeout in milliseconds (default: 5000)
    pub timeout_ms: Option<u64>,
    /// Seconds of continuous occupancy tolerated before a violation (default: 10)
    pub threshold_secs: Option<u32>,
    /// Polling period in milliseconds (default: 1000)
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaptureSection {
    /// Still image re-read from disk on every tick
    pub frame_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ZonesSection {
    pub coordinate_dir: Option<PathBuf>,
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistorySection {
    /// Offset from UTC, in minutes, for chart time labels (default: 0)
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    pub fn log_level(&self) -> tracing::Level {
        self.logging.level.parse().unwrap_or(tracing::Level::INFO)
    }

    pub fn detection_endpoint(&self) -> &str {
        self.detection
            .as_ref()
            .and_then(|d| d.endpoint.as_deref())
            .unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn detection_timeout(&self) -> Duration {
        let ms = self
            .detection
            .as_ref()
            .and_then(|d| d.timeout_ms)
            .unwrap_or(DEFAULT_DETECT_TIMEOUT_MS);
        Duration::from_millis(ms)
    }

    pub fn threshold_secs(&self) -> u32 {
        self.detection
            .as_ref()
            .and_then(|d| d.threshold_secs)
            .unwrap_or(DEFAULT_THRESHOLD_SECS)
    }

    /// Returns the polling interval in milliseconds; zero falls back to the default.
    pub fn interval_ms(&self) -> u64 {
        self.detection
            .as_ref()
            .and_then(|d| d.interval_ms)
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_INTERVAL_MS)
    }

    pub fn frame_path(&self) -> Option<&Path> {
        let path = self.capture.as_ref()?.frame_path.as_deref()?;
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    }

    pub fn coordinate_dir(&self) -> &Path {
        self.zones
            .as_ref()
            .and_then(|z| z.coordinate_dir.as_deref())
            .unwrap_or(Path::new(DEFAULT_COORDINATE_DIR))
    }

    pub fn zones_filename(&self) -> &str {
        self.zones
            .as_ref()
            .and_then(|z| z.filename.as_deref())
            .unwrap_or(DEFAULT_ZONES_FILENAME)
    }

    /// Offset for history labels. Out-of-range values fall back to UTC.
    pub fn label_offset(&self) -> UtcOffset {
        let minutes = self
            .history
            .as_ref()
            .and_then(|h| h.utc_offset_minutes)
            .unwrap_or(0);
        UtcOffset::from_whole_seconds(minutes.saturating_mul(60)).unwrap_or(UtcOffset::UTC)
    }

    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn write_temp(tag: &str, contents: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = std::env::temp_dir().join(format!("parkwatch-config-{tag}-{unique}.toml"));
        fs::write(&path, contents)?;
        Ok(path)
    }

    #[test]
    fn default_config_parses_detection_section() -> Result<(), Box<dyn std::error::Error>> {
        let config = load_default()?;
        assert_eq!(config.threshold_secs(), 10);
        assert_eq!(config.interval_ms(), 1000);
        assert!(config.frame_path().is_some());
        Ok(())
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp(
            "minimal",
            r#"
[app]
name = "parkwatch"

[logging]
level = "debug"
"#,
        )?;

        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert_eq!(config.log_level(), tracing::Level::DEBUG);
        assert_eq!(config.detection_endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(config.detection_timeout(), Duration::from_millis(5000));
        assert_eq!(config.threshold_secs(), DEFAULT_THRESHOLD_SECS);
        assert_eq!(config.interval_ms(), DEFAULT_INTERVAL_MS);
        assert_eq!(config.server_port(), DEFAULT_SERVER_PORT);
        assert_eq!(config.zones_filename(), DEFAULT_ZONES_FILENAME);
        assert_eq!(config.label_offset(), UtcOffset::UTC);
        assert!(config.frame_path().is_none());
        Ok(())
    }

    #[test]
    fn zero_interval_and_empty_frame_path_are_ignored() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp(
            "zero-interval",
            r#"
[app]
name = "parkwatch"

[logging]
level = "nonsense"

[detection]
interval_ms = 0
threshold_secs = 3

[capture]
frame_path = ""
"#,
        )?;

        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert_eq!(config.interval_ms(), DEFAULT_INTERVAL_MS);
        assert_eq!(config.threshold_secs(), 3);
        assert_eq!(config.log_level(), tracing::Level::INFO);
        assert!(config.frame_path().is_none());
        Ok(())
    }

    #[test]
    fn history_offset_is_read_and_range_checked() -> Result<(), Box<dyn std::error::Error>> {
        let base = "[app]\nname = \"parkwatch\"\n\n[logging]\nlevel = \"info\"\n\n[history]\n";
        let path = write_temp("offset", &format!("{base}utc_offset_minutes = 330\n"))?;
        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);
        assert_eq!(config.label_offset(), UtcOffset::from_hms(5, 30, 0)?);

        let path = write_temp("offset-range", &format!("{base}utc_offset_minutes = 100000\n"))?;
        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);
        assert_eq!(config.label_offset(), UtcOffset::UTC);
        Ok(())
    }

    #[test]
    fn missing_config_file_returns_read_error() {
        let path = std::env::temp_dir().join("parkwatch-config-does-not-exist.toml");

        let result = load_from_path(&path);

        assert!(matches!(result, Err(ConfigError::Read(_))));
    }

    #[test]
    fn invalid_toml_returns_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp("invalid", "not = [valid")?;

        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        Ok(())
    }
}
