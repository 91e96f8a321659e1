use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;

const ENV_PREFIX: &str = "PPG";

#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub base_url: String,
    pub poll_interval: Duration,
    pub continue_on_error: bool,
    pub request_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            poll_interval: Duration::from_millis(1000),
            continue_on_error: true,
            request_timeout: Duration::from_secs(30),
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Flat shape of the layered sources; durations are carried in milliseconds.
#[derive(Debug, Deserialize)]
struct RawConfiguration {
    base_url: String,
    poll_interval_ms: u64,
    continue_on_error: bool,
    request_timeout_ms: u64,
    max_upload_bytes: u64,
}

impl Configuration {
    /// Layers defaults, then the optional file, then `PPG_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Same as [`Configuration::load`], reading `PPG_*` variables from `env`
    /// instead of the process environment when given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let defaults = Configuration::default();
        let mut builder = config::Config::builder()
            .set_default("base_url", defaults.base_url.clone())?
            .set_default("poll_interval_ms", defaults.poll_interval.as_millis() as u64)?
            .set_default("continue_on_error", defaults.continue_on_error)?
            .set_default(
                "request_timeout_ms",
                defaults.request_timeout.as_millis() as u64,
            )?
            .set_default("max_upload_bytes", defaults.max_upload_bytes as u64)?;

        if let Some(path) = path {
            debug!("Loading configuration file {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let raw: RawConfiguration = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).source(env))
            .build()?
            .try_deserialize()?;

        let configuration = Self {
            base_url: raw.base_url,
            poll_interval: Duration::from_millis(raw.poll_interval_ms),
            continue_on_error: raw.continue_on_error,
            request_timeout: Duration::from_millis(raw.request_timeout_ms),
            max_upload_bytes: raw.max_upload_bytes as usize,
        };
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "poll interval must be a positive duration".to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    // Sets the backend base URL, this will override the loaded configuration.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    // Adjusts the wait between status queries.
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    // Whether a failed status query keeps the polling loop alive.
    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn no_env() -> config::Map<String, String> {
        config::Map::new()
    }

    fn env(vars: &[(&str, &str)]) -> config::Map<String, String> {
        vars.iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn test_default_configuration_is_valid() {
        let configuration = Configuration::default();
        assert!(configuration.validate().is_ok());
        assert_eq!(configuration.poll_interval, Duration::from_millis(1000));
        assert!(configuration.continue_on_error);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let configuration = Configuration::default().poll_interval(Duration::ZERO);
        assert!(matches!(
            configuration.validate(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_empty_base_url_is_rejected() {
        let configuration = Configuration::default().base_url("  ");
        assert!(configuration.validate().is_err());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("ppg-{}.toml", Uuid::new_v4()));
        std::fs::write(
            &path,
            "base_url = \"http://analysis.test/api\"\npoll_interval_ms = 250\ncontinue_on_error = false\n",
        )
        .unwrap();

        let configuration =
            Configuration::load_with_env(Some(path.as_path()), Some(no_env())).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(configuration.base_url, "http://analysis.test/api");
        assert_eq!(configuration.poll_interval, Duration::from_millis(250));
        assert!(!configuration.continue_on_error);
        assert_eq!(configuration.max_upload_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_load_rejects_zero_interval_file() {
        let path = std::env::temp_dir().join(format!("ppg-{}.toml", Uuid::new_v4()));
        std::fs::write(&path, "poll_interval_ms = 0\n").unwrap();

        let result = Configuration::load_with_env(Some(path.as_path()), Some(no_env()));
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("ppg-missing-{}.toml", Uuid::new_v4()));
        assert!(matches!(
            Configuration::load_with_env(Some(path.as_path()), Some(no_env())),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_environment_overrides_file() {
        let path = std::env::temp_dir().join(format!("ppg-{}.toml", Uuid::new_v4()));
        std::fs::write(
            &path,
            "base_url = \"http://file.test/api\"\npoll_interval_ms = 250\n",
        )
        .unwrap();

        let configuration = Configuration::load_with_env(
            Some(path.as_path()),
            Some(env(&[
                ("PPG_POLL_INTERVAL_MS", "500"),
                ("PPG_CONTINUE_ON_ERROR", "false"),
                ("OTHER_POLL_INTERVAL_MS", "1"),
            ])),
        )
        .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(configuration.base_url, "http://file.test/api");
        assert_eq!(configuration.poll_interval, Duration::from_millis(500));
        assert!(!configuration.continue_on_error);
    }

    #[test]
    fn test_environment_alone_overrides_defaults() {
        let configuration = Configuration::load_with_env(
            None,
            Some(env(&[("PPG_BASE_URL", "http://env.test/api")])),
        )
        .unwrap();

        assert_eq!(configuration.base_url, "http://env.test/api");
        assert_eq!(configuration.poll_interval, Duration::from_millis(1000));
    }
}
