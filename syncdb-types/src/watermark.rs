use async_trait::async_trait;
use time::OffsetDateTime;

/// Key under which the last successful poll time is kept
pub const LAST_RUN_KEY: &str = "ipc_product_sync_product_importer_last_run";

#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn last_run(&self) -> Result<Option<OffsetDateTime>, anyhow::Error>;
    async fn set_last_run(&self, at: OffsetDateTime) -> Result<(), anyhow::Error>;
}
