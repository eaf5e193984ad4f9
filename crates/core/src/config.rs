use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub chat: ChatConfig,
    pub storage: StorageConfig,
    pub calendar: CalendarConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub key_word: String,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub site_url: String,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub events_path: PathBuf,
    pub users_path: PathBuf,
}

/// Calendar settings. `time_zone` stamps every calendar entry. `calendar_id` and
/// `credentials_path` are reserved for a remote calendar client; the bundled server ships
/// none, so setting them only logs a startup warning.
#[derive(Clone, Debug)]
pub struct CalendarConfig {
    pub calendar_id: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub time_zone: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub key_word: Option<String>,
    pub site_url: Option<String>,
    pub events_path: Option<PathBuf>,
    pub users_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot: BotConfig { key_word: "rsvp".to_string() },
            chat: ChatConfig { site_url: "https://zulip.com".to_string() },
            storage: StorageConfig {
                events_path: PathBuf::from("events.json"),
                users_path: PathBuf::from("zulip_users.json"),
            },
            calendar: CalendarConfig {
                calendar_id: None,
                credentials_path: None,
                time_zone: "America/New_York".to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl CalendarConfig {
    /// Both the calendar id and the credentials are known.
    pub fn is_configured(&self) -> bool {
        self.calendar_id.is_some() && self.credentials_path.is_some()
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("rsvpbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(bot) = patch.bot {
            if let Some(key_word) = bot.key_word {
                self.bot.key_word = key_word;
            }
        }

        if let Some(chat) = patch.chat {
            if let Some(site_url) = chat.site_url {
                self.chat.site_url = site_url;
            }
        }

        if let Some(storage) = patch.storage {
            if let Some(events_path) = storage.events_path {
                self.storage.events_path = events_path;
            }
            if let Some(users_path) = storage.users_path {
                self.storage.users_path = users_path;
            }
        }

        if let Some(calendar) = patch.calendar {
            if let Some(calendar_id) = calendar.calendar_id {
                self.calendar.calendar_id = Some(calendar_id);
            }
            if let Some(credentials_path) = calendar.credentials_path {
                self.calendar.credentials_path = Some(credentials_path);
            }
            if let Some(time_zone) = calendar.time_zone {
                self.calendar.time_zone = time_zone;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("RSVP_BOT_KEY_WORD").or_else(|| read_env("ZULIP_KEY_WORD"))
        {
            self.bot.key_word = value;
        }

        if let Some(value) =
            read_env("RSVP_CHAT_SITE_URL").or_else(|| read_env("ZULIP_RSVP_SITE"))
        {
            self.chat.site_url = value;
        }

        if let Some(value) = read_env("RSVP_STORAGE_EVENTS_PATH") {
            self.storage.events_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("RSVP_STORAGE_USERS_PATH") {
            self.storage.users_path = PathBuf::from(value);
        }

        let calendar_id =
            read_env("RSVP_CALENDAR_CALENDAR_ID").or_else(|| read_env("GOOGLE_CALENDAR_ID"));
        if let Some(value) = calendar_id {
            self.calendar.calendar_id = Some(value);
        }
        let credentials_path = read_env("RSVP_CALENDAR_CREDENTIALS_PATH")
            .or_else(|| read_env("GOOGLE_APPLICATION_CREDENTIALS"));
        if let Some(value) = credentials_path {
            self.calendar.credentials_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("RSVP_CALENDAR_TIME_ZONE") {
            self.calendar.time_zone = value;
        }

        let log_level = read_env("RSVP_LOGGING_LEVEL").or_else(|| read_env("RSVP_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("RSVP_LOGGING_FORMAT").or_else(|| read_env("RSVP_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(key_word) = overrides.key_word {
            self.bot.key_word = key_word;
        }
        if let Some(site_url) = overrides.site_url {
            self.chat.site_url = site_url;
        }
        if let Some(events_path) = overrides.events_path {
            self.storage.events_path = events_path;
        }
        if let Some(users_path) = overrides.users_path {
            self.storage.users_path = users_path;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_bot(&self.bot)?;
        validate_chat(&self.chat)?;
        validate_storage(&self.storage)?;
        validate_calendar(&self.calendar)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("rsvpbot.toml"), PathBuf::from("config/rsvpbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_bot(bot: &BotConfig) -> Result<(), ConfigError> {
    let key_word = bot.key_word.as_str();
    if key_word.is_empty() || key_word.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(
            "bot.key_word must be a single non-empty word (for example `rsvp`)".to_string(),
        ));
    }
    Ok(())
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ConfigError> {
    let valid = Url::parse(chat.site_url.trim())
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false);
    if !valid {
        return Err(ConfigError::Validation(
            "chat.site_url must be an absolute http:// or https:// URL".to_string(),
        ));
    }
    Ok(())
}

fn validate_storage(storage: &StorageConfig) -> Result<(), ConfigError> {
    if storage.events_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("storage.events_path must not be empty".to_string()));
    }
    if storage.users_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("storage.users_path must not be empty".to_string()));
    }
    if storage.events_path == storage.users_path {
        return Err(ConfigError::Validation(
            "storage.events_path and storage.users_path must point at different files".to_string(),
        ));
    }
    Ok(())
}

fn validate_calendar(calendar: &CalendarConfig) -> Result<(), ConfigError> {
    if calendar.time_zone.trim().is_empty() {
        return Err(ConfigError::Validation("calendar.time_zone must not be empty".to_string()));
    }
    if calendar.calendar_id.as_ref().is_some_and(|id| id.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "calendar.calendar_id must not be blank when set".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    bot: Option<BotPatch>,
    chat: Option<ChatPatch>,
    storage: Option<StoragePatch>,
    calendar: Option<CalendarPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct BotPatch {
    key_word: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    site_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    events_path: Option<PathBuf>,
    users_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct CalendarPatch {
    calendar_id: Option<String>,
    credentials_path: Option<PathBuf>,
    time_zone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
