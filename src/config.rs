//! Startup configuration.
//!
//! Values come from CLI flags with environment fallbacks (see [`crate::cli`]).
//! They are validated once into an immutable [`Config`] that is shared by the
//! store, the handlers and the scheduler.

use std::path::PathBuf;

use serde::Deserialize;

use crate::cli::Cli;

/// Errors that can occur while resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required option was not supplied.
    #[error("missing required setting {0}")]
    Missing(&'static str),

    /// The allowed user id is not a Telegram numeric id.
    #[error("ALLOWED_USER_ID must be a numeric Telegram user id, got {0:?}")]
    InvalidUserId(String),

    /// Brief hour or minute out of range.
    #[error("invalid daily brief time {hour:02}:{minute:02}")]
    InvalidBriefTime { hour: u32, minute: u32 },

    /// The credentials file could not be read.
    #[error("failed to read credentials file {path}: {source}")]
    ReadCredentials { path: PathBuf, source: std::io::Error },

    /// The credentials bundle is not a usable service-account key.
    #[error("invalid service-account credentials: {0}")]
    InvalidCredentials(#[from] serde_json::Error),
}

/// The fields of a Google service-account key file the bot uses.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    /// `None` lets everyone in and disables the scheduled brief.
    pub allowed_user_id: Option<i64>,
    pub folder_id: String,
    pub file_name: String,
    pub brief_hour: u32,
    pub brief_minute: u32,
    pub credentials: ServiceAccountKey,
    pub default_category: String,
    pub telegram_api: String,
    pub drive_api: String,
    pub poll_timeout_secs: u64,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Config {
    /// Validate CLI/environment input into a `Config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required value is missing or malformed.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let bot_token = non_empty(&cli.bot_token).ok_or(ConfigError::Missing("BOT_TOKEN"))?;
        let folder_id = non_empty(&cli.folder_id).ok_or(ConfigError::Missing("DRIVE_FOLDER_ID"))?;

        let allowed_user_id = match non_empty(&cli.allowed_user_id) {
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| ConfigError::InvalidUserId(raw))?),
            None => None,
        };

        if cli.brief_hour > 23 || cli.brief_minute > 59 {
            return Err(ConfigError::InvalidBriefTime {
                hour: cli.brief_hour,
                minute: cli.brief_minute,
            });
        }

        let raw_credentials = match (non_empty(&cli.google_creds_json), &cli.google_creds_file) {
            (Some(json), _) => json,
            (None, Some(path)) => std::fs::read_to_string(path)
                .map_err(|source| ConfigError::ReadCredentials { path: path.clone(), source })?,
            (None, None) => return Err(ConfigError::Missing("GOOGLE_CREDS_JSON")),
        };
        let credentials: ServiceAccountKey = serde_json::from_str(&raw_credentials)?;

        Ok(Config {
            bot_token,
            allowed_user_id,
            folder_id,
            file_name: cli.file_name.trim().to_string(),
            brief_hour: cli.brief_hour,
            brief_minute: cli.brief_minute,
            credentials,
            default_category: cli.default_category.trim().to_string(),
            telegram_api: cli.telegram_api.clone(),
            drive_api: cli.drive_api.clone(),
            poll_timeout_secs: cli.poll_timeout,
        })
    }

    /// Whether a caller passes the allow-list gate.
    pub fn is_allowed(&self, user_id: i64) -> bool {
        self.allowed_user_id.map_or(true, |allowed| allowed == user_id)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        bot_token: "TOKEN".into(),
        allowed_user_id: None,
        folder_id: "folder".into(),
        file_name: "tasks.json".into(),
        brief_hour: 8,
        brief_minute: 0,
        credentials: ServiceAccountKey {
            client_email: "bot@example.iam.gserviceaccount.com".into(),
            private_key: String::new(),
            token_uri: default_token_uri(),
        },
        default_category: "Inbox".into(),
        telegram_api: "http://127.0.0.1:9".into(),
        drive_api: "http://127.0.0.1:9".into(),
        poll_timeout_secs: 30,
    }
}
