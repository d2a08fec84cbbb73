use std::env::var;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;

use crate::infrastructure::delivery::email::SmtpConfig;

/// Environment configuration shared by the server, scheduler and worker
/// processes. Durations are read as whole seconds.
pub struct Config {
    pub port: u16,
    pub store_dsn: String,
    pub broker_url: String,
    /// Empty or unset disables the status cache entirely.
    pub cache_addr: Option<String>,
    pub queue_name: String,
    pub sched_interval: Duration,
    pub sched_batch: i64,
    pub visibility_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub retry_backoff: u32,
    pub smtp: Option<SmtpConfig>,
    pub telegram_bot_token: Option<String>,
}

impl Config {
    pub fn try_parse() -> Result<Config, String> {
        let _ = dotenv();

        Ok(Config {
            port: parsed_or("PORT", 8080)?,
            store_dsn: required("STORE_DSN")?,
            broker_url: required("BROKER_URL")?,
            cache_addr: optional("CACHE_ADDR"),
            queue_name: var("QUEUE_NAME").unwrap_or_else(|_| "notifications".to_string()),
            sched_interval: duration_secs("SCHED_INTERVAL", 5)?,
            sched_batch: parsed_or("SCHED_BATCH", 50)?,
            visibility_timeout: duration_secs("VISIBILITY_TIMEOUT", 600)?,
            retry_attempts: parsed_or("RETRY_ATTEMPTS", 3)?,
            retry_delay: duration_secs("RETRY_DELAY", 1)?,
            retry_backoff: parsed_or("RETRY_BACKOFF", 2)?,
            smtp: smtp_config()?,
            telegram_bot_token: optional("TELEGRAM_BOT_TOKEN"),
        })
    }
}

fn required(name: &str) -> Result<String, String> {
    var(name).map_err(|_| format!("An error occured while getting {name} env param"))
}

fn optional(name: &str) -> Option<String> {
    var(name).ok().filter(|value| !value.is_empty())
}

fn parsed_or<T: FromStr>(name: &str, default: T) -> Result<T, String> {
    match optional(name) {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| format!("An error occured while parsing {name} env param")),
        None => Ok(default),
    }
}

fn duration_secs(name: &str, default: u64) -> Result<Duration, String> {
    Ok(Duration::from_secs(parsed_or(name, default)?))
}

/// The email adapter is only built when an SMTP host is configured; a
/// worker without it parks email envelopes as failed.
fn smtp_config() -> Result<Option<SmtpConfig>, String> {
    let Some(host) = optional("SMTP_HOST") else {
        return Ok(None);
    };
    Ok(Some(SmtpConfig {
        host,
        port: parsed_or("SMTP_PORT", 1025)?,
        username: var("SMTP_USERNAME").unwrap_or_default(),
        password: var("SMTP_PASSWORD").unwrap_or_default(),
        from: var("SMTP_FROM").unwrap_or_else(|_| "notifications@localhost".to_string()),
    }))
}
