use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::monitor::watcher::RECONNECT_BACKOFF;
use crate::store::writer::{DEFAULT_BUFFER_SIZE, FLUSH_INTERVAL};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TELEGRAM_TOKEN and CHAT_ID are required")]
    MissingCredentials,
    #[error("Invalid chat id '{0}'")]
    InvalidChatId(String),
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    telegram: TelegramSection,
    #[serde(default)]
    store: StoreSection,
    #[serde(default)]
    cache: CacheSection,
    #[serde(default)]
    watcher: WatcherSection,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramSection {
    token: Option<String>,
    chat_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StoreSection {
    table_uri: Option<String>,
    buffer_size: Option<usize>,
    flush_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CacheSection {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WatcherSection {
    reconnect_backoff_secs: Option<u64>,
    #[serde(default)]
    suppress_window_secs: u64,
}

/// Settings for one monitor process. The store and the cache are optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub telegram_token: String,
    pub chat_id: i64,
    pub table_uri: Option<String>,
    pub buffer_size: usize,
    pub flush_interval: Duration,
    pub redis_url: Option<String>,
    pub reconnect_backoff: Duration,
    pub suppress_window: Duration,
}

impl MonitorConfig {
    /// Reads the config file (a missing file is fine) and applies the
    /// `TELEGRAM_TOKEN`, `CHAT_ID`, `DELTA_TABLE_URI` and `REDIS_URL`
    /// environment overrides.
    pub fn try_init(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config file at {path:?}, using the environment");
                String::new()
            }
            Err(e) => return Err(e.into()),
        };
        Self::try_init_from_string(&contents, |key| std::env::var(key).ok())
    }

    fn try_init_from_string(
        contents: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        Self::resolve(toml::from_str(contents)?, env)
    }

    fn resolve(
        file: ConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let telegram_token = non_empty(env("TELEGRAM_TOKEN").or(file.telegram.token))
            .ok_or(ConfigError::MissingCredentials)?;
        let chat_id = non_empty(env("CHAT_ID").or(file.telegram.chat_id))
            .ok_or(ConfigError::MissingCredentials)?;
        let chat_id = chat_id
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidChatId(chat_id.clone()))?;

        Ok(Self {
            telegram_token,
            chat_id,
            table_uri: non_empty(env("DELTA_TABLE_URI").or(file.store.table_uri)),
            buffer_size: file.store.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE),
            flush_interval: file
                .store
                .flush_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(FLUSH_INTERVAL),
            redis_url: non_empty(env("REDIS_URL").or(file.cache.url)),
            reconnect_backoff: file
                .watcher
                .reconnect_backoff_secs
                .map(Duration::from_secs)
                .unwrap_or(RECONNECT_BACKOFF),
            suppress_window: Duration::from_secs(file.watcher.suppress_window_secs),
        })
    }
}
