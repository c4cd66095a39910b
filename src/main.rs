//! # taskbot - personal task tracking over Telegram
//!
//! A single-user to-do assistant operated entirely from a chat. The task list
//! lives as one JSON array in a Google Drive folder; every interaction reads the
//! whole document, changes it if needed, and writes it back.
//!
//! ## Chat Interface
//!
//! - `/start` - help text and your Telegram id (for `ALLOWED_USER_ID`)
//! - `/tasks` - open tasks grouped by category, most urgent first
//! - `/today` - the daily brief: top 3 tasks plus anything overdue
//! - `/done` - buttons for the 10 most urgent open tasks; tap one to complete it
//! - `/stats` - counts by status, priority and category
//! - any other text - becomes a new task:
//!   - `Call the bank` - mid priority
//!   - `! Pay rent` - high priority
//!   - `~ Water plants` - low priority
//!   - `Renew passport | 2026-03-15` - with a deadline
//!
//! The daily brief is also pushed to the allowed user every day at
//! `MORNING_HOUR:MORNING_MIN` local time.
//!
//! ## Running
//!
//! ```bash
//! export BOT_TOKEN=123456:ABC...
//! export DRIVE_FOLDER_ID=1AbCdEf...
//! export GOOGLE_CREDS_JSON="$(cat service-account.json)"
//! export ALLOWED_USER_ID=987654321   # optional, but strongly recommended
//! taskbot
//! ```
//!
//! Share the Drive folder with the service account's `client_email` so it can
//! create and update the task document.

use std::sync::Arc;

use clap::Parser;

pub mod bot;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod db;
pub mod drive;
pub mod error;
pub mod fields;
pub mod format;
pub mod scheduler;
pub mod store;
pub mod task;
pub mod telegram;

use cli::Cli;
use cmd::Handlers;
use config::Config;
use drive::DriveStore;
use scheduler::DailyBrief;
use store::TaskStore;
use telegram::TelegramClient;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = match Config::from_cli(&cli) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let store: Arc<dyn TaskStore> = Arc::new(DriveStore::from_config(&config));
    let telegram = Arc::new(TelegramClient::new(&config.bot_token, &config.telegram_api));
    let handlers = Arc::new(Handlers::new(Arc::clone(&config), Arc::clone(&store)));

    let brief = DailyBrief::new(Arc::clone(&config), Arc::clone(&store), telegram.clone());
    tokio::spawn(brief.run());

    tracing::info!(
        folder = %config.folder_id,
        file = %config.file_name,
        restricted = config.allowed_user_id.is_some(),
        "taskbot running, daily brief at {:02}:{:02}",
        config.brief_hour,
        config.brief_minute
    );
    bot::run(telegram, handlers, config.poll_timeout_secs).await;
}
