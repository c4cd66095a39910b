use std::path::PathBuf;

use clap::Parser;

/// Telegram task bot backed by a JSON document on Google Drive.
/// Every option can also be supplied through the environment.
#[derive(Parser, Debug)]
#[command(name = "taskbot", version, about = "Personal task tracker over Telegram")]
pub struct Cli {
    /// Telegram bot token.
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    pub bot_token: Option<String>,

    /// Only this Telegram user id may use the bot; also receives the daily brief.
    #[arg(long, env = "ALLOWED_USER_ID")]
    pub allowed_user_id: Option<String>,

    /// Drive folder holding the task document.
    #[arg(long, env = "DRIVE_FOLDER_ID")]
    pub folder_id: Option<String>,

    /// Hour (local time) of the daily brief.
    #[arg(long, env = "MORNING_HOUR", default_value_t = 8)]
    pub brief_hour: u32,

    /// Minute of the daily brief.
    #[arg(long, env = "MORNING_MIN", default_value_t = 0)]
    pub brief_minute: u32,

    /// Service-account key as inline JSON.
    #[arg(long, env = "GOOGLE_CREDS_JSON", hide_env_values = true)]
    pub google_creds_json: Option<String>,

    /// Service-account key file, used when no inline JSON is given.
    #[arg(long, env = "GOOGLE_CREDS_FILE")]
    pub google_creds_file: Option<PathBuf>,

    /// Name of the task document inside the folder.
    #[arg(long, env = "TASKS_FILE_NAME", default_value = "tasks.json")]
    pub file_name: String,

    /// Category given to tasks added from chat.
    #[arg(long, env = "DEFAULT_CATEGORY", default_value = "Inbox")]
    pub default_category: String,

    /// Telegram Bot API base URL.
    #[arg(long, env = "TELEGRAM_API_URL", default_value = "https://api.telegram.org")]
    pub telegram_api: String,

    /// Google APIs base URL.
    #[arg(long, env = "DRIVE_API_URL", default_value = "https://www.googleapis.com")]
    pub drive_api: String,

    /// Long-poll timeout for getUpdates, in seconds.
    #[arg(long, env = "POLL_TIMEOUT_SECS", default_value_t = 30)]
    pub poll_timeout: u64,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, env = "TASKBOT_LOG", default_value = "info")]
    pub log_level: String,
}
