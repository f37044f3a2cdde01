//! Blackout configuration.
//!
//! Loaded from `~/.blackout/config.toml` unless a path is given. Every key is
//! optional; a missing default file means all defaults.
//!
//! ```toml
//! interval-secs = 60
//! deliver = true
//!
//! [telegram]
//! bot-token = "123:abc"
//! timeout-secs = 15
//! channels = { "1.1" = -1001234567890, "1.2" = -1001234567891 }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

use jiff::Timestamp;
use jiff::tz::TimeZone;
use serde::{Deserialize, Serialize};

use crate::model::ScheduleDate;
use crate::storage::Storage;

/// Environment variable that overrides `telegram.bot-token`.
pub const BOT_TOKEN_ENV: &str = "BLACKOUT_BOT_TOKEN";

const DEFAULT_SOURCE_URL: &str = "https://www.poe.pl.ua/customs/newgpv-info.php";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Blackout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Page that serves the schedule table.
    pub source_url: String,

    /// Upper bound on one fetch, in seconds.
    pub fetch_timeout_secs: u64,

    /// Time between pipeline runs in `watch`, in seconds.
    pub interval_secs: u64,

    /// Where snapshots are stored. Defaults to `~/.blackout/data/`.
    pub data_dir: Option<PathBuf>,

    /// IANA zone used to decide what "today" is. System zone when unset.
    pub timezone: Option<String>,

    /// Actually send notifications. When false they are only logged.
    pub deliver: bool,

    pub telegram: TelegramConfig,
}

/// Telegram delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TelegramConfig {
    pub bot_token: String,

    /// Upper bound on one `sendMessage` call, in seconds.
    pub timeout_secs: u64,

    /// Routing key (`"queue.subqueue"`) to chat id.
    pub channels: BTreeMap<String, i64>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            timeout_secs: 15,
            channels: BTreeMap::new(),
        }
    }
}

impl TelegramConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            fetch_timeout_secs: 15,
            interval_secs: 60,
            data_dir: None,
            timezone: None,
            deliver: false,
            telegram: TelegramConfig::default(),
        }
    }
}

impl Config {
    /// Load config from `path`, or from `~/.blackout/config.toml` when `None`.
    ///
    /// An explicit path must exist. The default path may be absent, in which
    /// case defaults are used. [`BOT_TOKEN_ENV`] is applied on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_bot_token(env::var(BOT_TOKEN_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// The default config file path: `~/.blackout/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".blackout").join("config.toml"))
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Replace the bot token with `token` when it is set and non-empty.
    pub fn apply_bot_token(&mut self, token: Option<String>) {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.telegram.bot_token = token;
        }
    }

    /// Check values that would make the pipeline unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid("interval-secs must be positive".into()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch-timeout-secs must be positive".into(),
            ));
        }
        if self.telegram.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "telegram.timeout-secs must be positive".into(),
            ));
        }
        if self.deliver && self.telegram.bot_token.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "deliver is on but no bot token is set\n\
                 Add `bot-token` under [telegram] or set {BOT_TOKEN_ENV}."
            )));
        }
        self.time_zone()?;
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// The snapshot directory, falling back to the default root.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        self.data_dir
            .clone()
            .or_else(Storage::default_root)
            .ok_or_else(|| ConfigError::Invalid("could not determine home directory".into()))
    }

    pub fn time_zone(&self) -> Result<TimeZone, ConfigError> {
        match &self.timezone {
            Some(name) => TimeZone::get(name)
                .map_err(|e| ConfigError::Invalid(format!("unknown timezone '{name}': {e}"))),
            None => Ok(TimeZone::system()),
        }
    }

    /// The current date in the configured zone.
    pub fn today(&self) -> Result<ScheduleDate, ConfigError> {
        let zoned = Timestamp::now().to_zoned(self.time_zone()?);
        Ok(ScheduleDate::new(zoned.date()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.source_url, DEFAULT_SOURCE_URL);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(15));
        assert_eq!(config.interval(), Duration::from_secs(60));
        assert_eq!(config.telegram.timeout(), Duration::from_secs(15));
        assert!(!config.deliver);
        assert!(config.telegram.channels.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn parses_kebab_case_keys() {
        let config: Config = toml::from_str(
            r#"
            interval-secs = 120
            fetch-timeout-secs = 5
            data-dir = "/tmp/gpv"
            timezone = "UTC"
            deliver = true

            [telegram]
            bot-token = "123:abc"
            channels = { "1.1" = -100123, "6.2" = 42 }
            "#,
        )
        .unwrap();

        assert_eq!(config.interval_secs, 120);
        assert_eq!(config.fetch_timeout_secs, 5);
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/gpv"));
        assert_eq!(config.telegram.channels.get("1.1"), Some(&-100_123));
        assert_eq!(config.telegram.channels.get("6.2"), Some(&42));
        config.validate().unwrap();
    }

    #[test]
    fn zero_interval_is_invalid() {
        let config: Config = toml::from_str("interval-secs = 0").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let config: Config = toml::from_str("fetch-timeout-secs = 0").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_notify_timeout_is_invalid() {
        let config: Config = toml::from_str("[telegram]\ntimeout-secs = 0").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn delivery_requires_a_token() {
        let mut config: Config = toml::from_str("deliver = true").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.apply_bot_token(Some("123:abc".into()));
        config.validate().unwrap();
    }

    #[test]
    fn empty_token_override_is_ignored() {
        let mut config = Config::default();
        config.telegram.bot_token = "from-file".into();

        config.apply_bot_token(Some(String::new()));
        assert_eq!(config.telegram.bot_token, "from-file");

        config.apply_bot_token(None);
        assert_eq!(config.telegram.bot_token, "from-file");

        config.apply_bot_token(Some("from-env".into()));
        assert_eq!(config.telegram.bot_token, "from-env");
    }

    #[test]
    fn unknown_timezone_is_invalid() {
        let config: Config = toml::from_str(r#"timezone = "Mars/Olympus_Mons""#).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn today_in_utc() {
        let config: Config = toml::from_str(r#"timezone = "UTC""#).unwrap();
        let expected = Timestamp::now().to_zoned(TimeZone::UTC).date();
        // Tolerate the clock crossing midnight between the two reads.
        let today = config.today().unwrap();
        assert!(
            today == ScheduleDate::new(expected)
                || today == ScheduleDate::new(expected.tomorrow().unwrap())
        );
    }

    #[test]
    fn load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "interval-secs = 30\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.interval_secs, 30);
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_invalid_toml_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "interval-secs = \"soon\"\n").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
