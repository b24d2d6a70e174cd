use crate::parse_duration;
use crate::pricing::UnresolvedPriceListPolicy;
use crate::queue::RetryPolicy;
use anyhow::Context;
use log_error::LogError;
use std::str::FromStr;
use std::time::Duration;
use syncdb_types::LogLevel;

pub const DEFAULT_STORAGE_PATH: &str = "storage/syncdb.db";
pub const DEFAULT_REQUESTS_PER_MINUTE: u64 = 120;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct Settings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub log_level: LogLevel,
    pub log_api_calls: bool,
    pub requests_per_minute: u64,
    pub storage_path: String,
    pub retry: RetryPolicy,
    pub poll_interval: Duration,
    pub unresolved_price_list: UnresolvedPriceListPolicy,
}

impl Settings {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let api_url: String = envmnt::get_parse("SYNCDB_API_URL").context("SYNCDB_API_URL not set")?;
        let mut retry = RetryPolicy::default();
        if let Some(max_retries) = env_parse("JOB_MAX_RETRIES") {
            retry.max_retries = max_retries;
        }
        if let Some(delay) = env_duration("JOB_RETRY_DELAY") {
            retry.delay = delay;
        }
        let api_key: Option<String> = envmnt::get_parse("SYNCDB_API_KEY").ok();
        Ok(Self {
            api_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            log_level: env_parse("SYNCDB_LOG_LEVEL").unwrap_or_default(),
            log_api_calls: env_flag("SYNCDB_LOG_API_CALLS", false),
            requests_per_minute: env_parse("SYNCDB_REQUESTS_PER_MINUTE")
                .filter(|rpm| *rpm > 0)
                .unwrap_or(DEFAULT_REQUESTS_PER_MINUTE),
            storage_path: envmnt::get_or("STORAGE_PATH", DEFAULT_STORAGE_PATH),
            retry,
            poll_interval: env_duration("POLL_INTERVAL").unwrap_or(DEFAULT_POLL_INTERVAL),
            unresolved_price_list: env_parse("UNRESOLVED_PRICE_LIST").unwrap_or_default(),
        })
    }
}

/// Parses an optional variable, logging values that fail to parse
fn env_parse<T>(key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = envmnt::get_parse(key).ok()?;
    raw.trim()
        .parse()
        .map_err(|err| anyhow::anyhow!("{err}"))
        .log_error(&format!("Unable to parse {key}={raw}"))
}

fn env_duration(key: &str) -> Option<Duration> {
    let raw: String = envmnt::get_parse(key).ok()?;
    parse_duration(&raw).log_error(&format!("Unable to parse {key}={raw}"))
}

fn env_flag(key: &str, default_value: bool) -> bool {
    let raw: Result<String, _> = envmnt::get_parse(key);
    match raw {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default_value,
        },
        Err(_) => default_value,
    }
}
