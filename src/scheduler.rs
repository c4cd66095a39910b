//! Daily brief trigger.
//!
//! Sleeps until the configured local hour:minute, pushes the same summary as
//! `/today` to the allowed user, and repeats the next day. Failures are logged
//! and the next firing is the only retry.

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone};
use tracing::{error, info};

use crate::config::Config;
use crate::db::today;
use crate::format::build_daily_brief;
use crate::store::TaskStore;
use crate::telegram::{Messenger, Outgoing};

/// Next occurrence of `hour:minute` strictly after `now`.
///
/// A wall-clock time skipped by a DST change fires an hour later instead.
pub fn next_fire<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> DateTime<Tz> {
    let slot = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default();
    let tz = now.timezone();
    let mut date = now.date_naive();
    loop {
        let naive = date.and_time(slot);
        let resolved = tz
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest());
        if let Some(at) = resolved {
            if at > *now {
                return at;
            }
        }
        date = date.succ_opt().unwrap_or(date);
    }
}

/// Pushes the daily brief to the configured recipient.
pub struct DailyBrief {
    config: Arc<Config>,
    store: Arc<dyn TaskStore>,
    messenger: Arc<dyn Messenger>,
}

impl DailyBrief {
    pub fn new(config: Arc<Config>, store: Arc<dyn TaskStore>, messenger: Arc<dyn Messenger>) -> Self {
        Self { config, store, messenger }
    }

    /// Build and send one brief. No-op without a recipient.
    pub async fn fire(&self) {
        let Some(recipient) = self.config.allowed_user_id else {
            return;
        };
        let db = self.store.load().await;
        let brief = Outgoing::text(build_daily_brief(&db, today()));
        match self.messenger.send(recipient, &brief).await {
            Ok(()) => info!("daily brief sent"),
            Err(e) => error!(error = %e, "daily brief failed"),
        }
    }

    /// Fire once per day forever.
    pub async fn run(self) {
        if self.config.allowed_user_id.is_none() {
            info!("no allowed user configured, daily brief disabled");
        }
        loop {
            let now = Local::now();
            let at = next_fire(&now, self.config.brief_hour, self.config.brief_minute);
            let wait = (at.clone() - now).to_std().unwrap_or_default();
            info!(at = %at.format("%Y-%m-%d %H:%M"), "next daily brief scheduled");
            tokio::time::sleep(wait).await;
            self.fire().await;
        }
    }
}
