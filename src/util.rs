use std::time::{Instant, SystemTime, UNIX_EPOCH};

use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};

pub const HOST: &str = "HOST";
pub const PORT: &str = "PORT";

pub const VAR_APP_ID: &str = "ONESIGNAL_APP_ID";
pub const VAR_REST_API_KEY: &str = "ONESIGNAL_REST_API_KEY";
pub const VAR_SAFARI_WEB_ID: &str = "ONESIGNAL_SAFARI_WEB_ID";

pub const LOG_CONFIG_PATH: &str = "log4rs.yaml";

/// Process start marker, shared through app data for the health endpoint.
#[derive(Clone, Copy, Debug)]
pub struct ServerStart(pub Instant);

/// Initialize log4rs from `log4rs.yaml`, falling back to a plain console
/// appender when the file is absent (e.g. in tests or fresh checkouts).
pub fn init_logging() {
    if log4rs::init_file(LOG_CONFIG_PATH, Default::default()).is_ok() {
        return;
    }
    let stdout = ConsoleAppender::builder().build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info));
    if let Ok(config) = config {
        log4rs::init_config(config).ok();
    }
}

/// Last few characters of a user/subscription id, safe to log.
pub fn short_id(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    let start = chars.len().saturating_sub(6);
    chars[start..].iter().collect()
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
