//! Run configuration
//!
//! Parameters come from `<data_dir>/config.json` (`{"parameters": {...}}`),
//! then environment variables (a `.env` file is honoured) override them.

use mcw_writer::orchestrator::{DEFAULT_MAX_IN_FLIGHT, DEFAULT_SERIAL_THRESHOLD};
use mcw_writer::poller::DEFAULT_POLL_DELAY_SECS;
use mcw_writer::{BatchPoller, Result, SubmissionMode, SubmissionSettings, WriterError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default data directory layout root
pub const DEFAULT_DATA_DIR: &str = "/data";

/// Component configuration file inside the data directory
pub const CONFIG_FILE: &str = "config.json";

/// Default number of records per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Raw `parameters` object of the configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Parameters {
    #[serde(rename = "#apikey")]
    pub api_key: Option<String>,

    #[serde(default)]
    pub debug: bool,

    pub mode: Option<SubmissionMode>,
    pub chunk_size: Option<usize>,
    pub serial_threshold: Option<usize>,
    pub max_in_flight: Option<usize>,
    pub poll_delay_secs: Option<u64>,
    pub poll_timeout_secs: Option<u64>,
    pub request_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    parameters: Parameters,
}

impl Parameters {
    /// Read parameters from a configuration file; a missing file is empty
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&content).map_err(|e| {
            WriterError::config(format!("Invalid {}: {}", path.display(), e))
        })?;
        Ok(file.parameters)
    }

    /// Apply `MCW_*` environment overrides
    pub fn merge_env(mut self) -> Result<Self> {
        if let Ok(key) = std::env::var("MCW_APIKEY") {
            self.api_key = Some(key);
        }
        if let Some(debug) = env_override("MCW_DEBUG")? {
            self.debug = debug;
        }
        self.mode = env_override("MCW_MODE")?.or(self.mode);
        self.chunk_size = env_override("MCW_CHUNK_SIZE")?.or(self.chunk_size);
        self.serial_threshold = env_override("MCW_SERIAL_THRESHOLD")?.or(self.serial_threshold);
        self.max_in_flight = env_override("MCW_MAX_IN_FLIGHT")?.or(self.max_in_flight);
        self.poll_delay_secs = env_override("MCW_POLL_DELAY_SECS")?.or(self.poll_delay_secs);
        self.poll_timeout_secs = env_override("MCW_POLL_TIMEOUT_SECS")?.or(self.poll_timeout_secs);
        self.request_delay_ms = env_override("MCW_REQUEST_DELAY_MS")?.or(self.request_delay_ms);
        Ok(self)
    }
}

fn env_override<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| WriterError::config(format!("Invalid value '{}' for {}", raw, name))),
        Err(_) => Ok(None),
    }
}

/// Validated run configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub api_key: Option<String>,
    /// API root override, used instead of the key's data center
    pub api_url: Option<String>,
    pub debug: bool,
    pub chunk_size: usize,
    pub submission: SubmissionSettings,
}

impl Config {
    /// Load configuration for a data directory
    pub fn load(data_dir: &Path) -> Result<Self> {
        dotenvy::dotenv().ok();

        let parameters = Parameters::from_file(&data_dir.join(CONFIG_FILE))?.merge_env()?;
        let mut config = Self::from_parameters(data_dir, parameters);
        config.api_url = std::env::var("MCW_API_URL").ok().filter(|u| !u.is_empty());

        config.validate()?;

        Ok(config)
    }

    /// Build a configuration from parameters, filling in defaults
    pub fn from_parameters(data_dir: &Path, parameters: Parameters) -> Self {
        let poller = BatchPoller::new(Duration::from_secs(
            parameters.poll_delay_secs.unwrap_or(DEFAULT_POLL_DELAY_SECS),
        ))
        .with_deadline(parameters.poll_timeout_secs.map(Duration::from_secs));

        Self {
            data_dir: data_dir.to_path_buf(),
            api_key: parameters.api_key.filter(|k| !k.trim().is_empty()),
            api_url: None,
            debug: parameters.debug,
            chunk_size: parameters.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            submission: SubmissionSettings {
                mode: parameters.mode.unwrap_or_default(),
                serial_threshold: parameters
                    .serial_threshold
                    .unwrap_or(DEFAULT_SERIAL_THRESHOLD),
                max_in_flight: parameters.max_in_flight.unwrap_or(DEFAULT_MAX_IN_FLIGHT),
                request_delay: parameters
                    .request_delay_ms
                    .filter(|ms| *ms > 0)
                    .map(Duration::from_millis),
                poller,
            },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(WriterError::config("chunk_size must be greater than 0"));
        }

        if self.submission.max_in_flight == 0 {
            return Err(WriterError::config("max_in_flight must be greater than 0"));
        }

        if self.submission.poller.delay().is_zero() {
            return Err(WriterError::config("poll_delay_secs must be greater than 0"));
        }

        Ok(())
    }

    /// API key, required for anything that talks to Mailchimp
    pub fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            WriterError::config("Missing '#apikey' parameter. Set it in config.json or MCW_APIKEY.")
        })
    }

    /// Override the submission mode, e.g. from the command line
    pub fn with_mode(mut self, mode: Option<SubmissionMode>) -> Self {
        if let Some(mode) = mode {
            self.submission.mode = mode;
        }
        self
    }

    pub fn input_dir(&self) -> PathBuf {
        self.data_dir.join("in").join("tables")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.data_dir.join("out").join("tables")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::from_parameters(Path::new("/data"), Parameters::default());
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.submission, SubmissionSettings::default());
        assert!(config.api_key.is_none());
        assert!(config.validate().is_ok());
        assert!(matches!(config.api_key(), Err(WriterError::Config(_))));
        assert_eq!(config.input_dir(), PathBuf::from("/data/in/tables"));
        assert_eq!(config.output_dir(), PathBuf::from("/data/out/tables"));
    }

    #[test]
    fn test_parameters_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r##"{"parameters": {"#apikey": "abc-us19", "debug": true, "mode": "batch", "chunk_size": 50, "poll_timeout_secs": 600}}"##,
        )
        .unwrap();

        let parameters = Parameters::from_file(&path).unwrap();
        let config = Config::from_parameters(dir.path(), parameters);
        assert_eq!(config.api_key().unwrap(), "abc-us19");
        assert!(config.debug);
        assert_eq!(config.chunk_size, 50);
        assert_eq!(config.submission.mode, SubmissionMode::ForceBatch);
        assert_eq!(
            config.submission.poller,
            BatchPoller::new(Duration::from_secs(DEFAULT_POLL_DELAY_SECS))
                .with_deadline(Some(Duration::from_secs(600)))
        );
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let parameters = Parameters::from_file(&dir.path().join(CONFIG_FILE)).unwrap();
        assert!(parameters.api_key.is_none());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"parameters": {"mode": "fast"}}"#).unwrap();
        assert!(matches!(Parameters::from_file(&path), Err(WriterError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let parameters = Parameters {
            chunk_size: Some(0),
            ..Parameters::default()
        };
        let config = Config::from_parameters(Path::new("/data"), parameters);
        assert!(matches!(config.validate(), Err(WriterError::Config(_))));

        let parameters = Parameters {
            max_in_flight: Some(0),
            ..Parameters::default()
        };
        let config = Config::from_parameters(Path::new("/data"), parameters);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mode_override() {
        let config = Config::from_parameters(Path::new("/data"), Parameters::default())
            .with_mode(Some(SubmissionMode::ForceSerial));
        assert_eq!(config.submission.mode, SubmissionMode::ForceSerial);
        let config = config.with_mode(None);
        assert_eq!(config.submission.mode, SubmissionMode::ForceSerial);
    }

    #[test]
    fn test_blank_api_key_counts_as_missing() {
        let parameters = Parameters {
            api_key: Some("  ".into()),
            ..Parameters::default()
        };
        let config = Config::from_parameters(Path::new("/data"), parameters);
        assert!(config.api_key().is_err());
    }
}
