//! Anker configuration file handling
//!
//! Provides default configuration generation and loading for the Anker bot.
//! Configuration files are TOML. Secrets never live here: the bot token,
//! the pepper key and the translator api key come from the environment.

use anker::anki::web::{DEFAULT_USER_URL, DEFAULT_WEB_URL};
use anker::bot::{BotSettings, DEFAULT_NOTE_TYPE};
use anker::chat::UserId;
use anker::session::{GuardPolicy, DEFAULT_MAX_ATTEMPTS};
use anker::telegram::DEFAULT_API_URL;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Anker bot configuration (operator settings)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnkerConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub bot: BotConfig,

    #[serde(default)]
    pub anki: AnkiConfig,

    #[serde(default)]
    pub translation: TranslationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Telegram Bot API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Long-poll wait per `getUpdates` call
    #[serde(default = "default_poll_timeout", with = "humantime_str")]
    pub poll_timeout: Duration,
}

/// Conversation behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Telegram user ids served; empty serves everyone
    #[serde(default)]
    pub allowed_users: Vec<i64>,

    /// Language codes offered on `/lang`
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    #[serde(default = "default_note_type")]
    pub default_note_type: String,

    /// Total attempts per account call
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Bound on every external call
    #[serde(default = "default_call_timeout", with = "humantime_str")]
    pub call_timeout: Duration,

    /// Idle period after which a chat worker exits
    #[serde(default = "default_worker_idle_timeout", with = "humantime_str")]
    pub worker_idle_timeout: Duration,

    /// Translation candidates offered per word
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

/// AnkiWeb endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnkiConfig {
    #[serde(default = "default_web_url")]
    pub web_url: String,

    #[serde(default = "default_user_url")]
    pub user_url: String,
}

/// LibreTranslate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default = "default_translation_endpoint")]
    pub endpoint: String,

    /// Alternatives requested besides the main translation
    #[serde(default = "default_alternatives")]
    pub alternatives: u8,

    /// Cached words per language pair
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (`RUST_LOG` takes precedence)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_poll_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_languages() -> Vec<String> {
    BotSettings::default().languages
}

fn default_note_type() -> String {
    DEFAULT_NOTE_TYPE.to_string()
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_worker_idle_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_max_candidates() -> usize {
    8
}

fn default_web_url() -> String {
    DEFAULT_WEB_URL.to_string()
}

fn default_user_url() -> String {
    DEFAULT_USER_URL.to_string()
}

fn default_translation_endpoint() -> String {
    "http://localhost:5000".to_string()
}

fn default_alternatives() -> u8 {
    3
}

fn default_cache_size() -> usize {
    1024
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            poll_timeout: default_poll_timeout(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            allowed_users: Vec::new(),
            languages: default_languages(),
            default_note_type: default_note_type(),
            max_attempts: default_max_attempts(),
            call_timeout: default_call_timeout(),
            worker_idle_timeout: default_worker_idle_timeout(),
            max_candidates: default_max_candidates(),
        }
    }
}

impl Default for AnkiConfig {
    fn default() -> Self {
        Self {
            web_url: default_web_url(),
            user_url: default_user_url(),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_translation_endpoint(),
            alternatives: default_alternatives(),
            cache_size: default_cache_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

/// Durations as humantime strings ("20s", "10m")
mod humantime_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

impl AnkerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: AnkerConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, contents)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        Ok(())
    }

    /// Check values that parse but cannot work
    pub fn validate(&self) -> Result<(), String> {
        if self.bot.languages.len() < 2 {
            return Err("[bot] languages needs at least two language codes".to_string());
        }
        if self.bot.max_attempts == 0 {
            return Err("[bot] max_attempts must be at least 1".to_string());
        }
        if self.bot.call_timeout.is_zero() {
            return Err("[bot] call_timeout must be positive".to_string());
        }
        if self.bot.max_candidates == 0 {
            return Err("[bot] max_candidates must be at least 1".to_string());
        }
        if self.translation.endpoint.trim().is_empty() {
            return Err("[translation] endpoint is empty".to_string());
        }
        Ok(())
    }

    /// Runtime settings of the conversation core
    pub fn bot_settings(&self) -> BotSettings {
        BotSettings {
            allowed_users: self.bot.allowed_users.iter().copied().map(UserId).collect(),
            languages: self
                .bot
                .languages
                .iter()
                .map(|code| code.trim().to_lowercase())
                .collect(),
            default_note_type: self.bot.default_note_type.clone(),
            guard: GuardPolicy {
                max_attempts: self.bot.max_attempts,
                call_timeout: self.bot.call_timeout,
            },
            max_candidates: self.bot.max_candidates,
            worker_idle_timeout: self.bot.worker_idle_timeout,
        }
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml() -> String {
        format!(
            r#"# Anker Bot Configuration
#
# Secrets are NOT stored here. Provide them through the environment:
#   ANKER_BOT_TOKEN          Telegram bot token
#   ANKER_PEPPER_KEY         64 hex chars, create one with `anker generate-key`
#   ANKER_TRANSLATE_API_KEY  LibreTranslate api key (optional)

[telegram]
api_url = "{api_url}"
# Long-poll wait per request
poll_timeout = "30s"

[bot]
# Telegram user ids allowed to use the bot (empty = everyone)
allowed_users = []

# Languages offered on /lang
languages = ["en", "de", "fi"]

# Note type picked when a deck is selected
default_note_type = "{note_type}"

# Attempts per AnkiWeb call before giving up
max_attempts = {max_attempts}

# Bound on every external call
call_timeout = "20s"

# Idle chats release their worker after this period
worker_idle_timeout = "10m"

# Translation candidates offered per word
max_candidates = 8

[anki]
web_url = "{web_url}"
user_url = "{user_url}"

[translation]
# LibreTranslate server
endpoint = "http://localhost:5000"
alternatives = 3
# Cached words per language pair
cache_size = 1024

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG overrides)
level = "info"

# Log file path (optional, logs to stderr if not specified)
# file = "/var/log/anker/anker.log"
"#,
            api_url = DEFAULT_API_URL,
            note_type = DEFAULT_NOTE_TYPE,
            max_attempts = DEFAULT_MAX_ATTEMPTS,
            web_url = DEFAULT_WEB_URL,
            user_url = DEFAULT_USER_URL,
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = Self::generate_default_toml();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(config_path, contents).map_err(|e| {
            format!(
                "Failed to write config file '{}': {}",
                config_path.display(),
                e
            )
        })?;

        Ok(())
    }

    /// Load `path`, creating the default file first if it does not exist
    pub fn load_or_create(path: &Path) -> Result<(Self, bool), Box<dyn std::error::Error>> {
        if path.exists() {
            return Ok((Self::load(path)?, false));
        }
        Self::create_default(path)?;
        Ok((Self::load(path)?, true))
    }
}

/// Get the default config file path
///
/// - Linux: ~/.config/anker/config.toml
/// - macOS: ~/Library/Application Support/anker/config.toml
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("anker")
        .join("config.toml")
}

/// Resolve `--config`, falling back to the default path
pub fn resolve_config_path(config: Option<String>) -> PathBuf {
    config.map(PathBuf::from).unwrap_or_else(default_config_path)
}
