#![deny(clippy::unwrap_used)]

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::{sleep, Duration};

pub mod admin;
pub mod attribute;
pub mod engine;
pub mod mapping;
pub mod poller;
pub mod price_list;
pub mod pricing;
pub mod product;
pub mod queue;
pub mod settings;
pub mod storage;
pub mod term;
pub mod variation;
pub mod watermark;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

/// Hands out one request permit per `60s / rpm`
pub struct RateLimiter(Arc<Notify>);

impl RateLimiter {
    pub fn new(rpm: u64) -> Self {
        let notify = Arc::new(Notify::new());
        let n = notify.clone();
        let duration = Duration::from_millis(60_000 / rpm.max(1));
        tokio::spawn(async move {
            let notify = n;
            loop {
                sleep(duration).await;
                notify.notify_one();
            }
        });
        Self(notify)
    }
}

#[async_trait]
impl reqwest_ratelimit::RateLimiter for RateLimiter {
    async fn acquire_permit(&self) {
        self.0.notified().await;
    }
}

pub fn parse_duration(duration: &str) -> Result<std::time::Duration, anyhow::Error> {
    let duration = duration.trim().to_lowercase().replace(' ', "");
    duration_str::parse(duration).map_err(|err| anyhow::anyhow!("Unable to parse duration: {err}"))
}
