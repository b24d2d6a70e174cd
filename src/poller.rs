use itertools::Itertools;
use std::sync::Arc;
use syncdb_types::catalog::CatalogClient;
use syncdb_types::watermark::WatermarkStore;
use syncdb_types::LogLevel;
use time::OffsetDateTime;

/// Discovers SyncDB products to synchronize
#[derive(Clone)]
pub struct ChangePoller {
    client: Arc<dyn CatalogClient>,
    watermark: Arc<dyn WatermarkStore>,
    log_level: LogLevel,
}

impl ChangePoller {
    pub fn new(
        client: Arc<dyn CatalogClient>,
        watermark: Arc<dyn WatermarkStore>,
        log_level: LogLevel,
    ) -> Self {
        Self {
            client,
            watermark,
            log_level,
        }
    }

    /// Ids of products modified since the last successful poll
    pub async fn poll_changes(&self) -> Result<Vec<String>, anyhow::Error> {
        self.poll_changes_at(OffsetDateTime::now_utc()).await
    }

    pub async fn poll_changes_at(&self, run_time: OffsetDateTime) -> Result<Vec<String>, anyhow::Error> {
        let ids = self.pending_changes(run_time).await?;
        self.advance_to(run_time).await?;
        Ok(ids)
    }

    /// Same ids as [`Self::poll_changes_at`] but leaves the watermark in place
    pub async fn pending_changes(&self, run_time: OffsetDateTime) -> Result<Vec<String>, anyhow::Error> {
        let modified_since = self.watermark.last_run().await?.unwrap_or(run_time);
        let ids = self.collect_pages(Some(modified_since)).await?;
        log::info!(
            "Found {} SyncDB products modified since {modified_since}",
            ids.len()
        );
        Ok(ids)
    }

    pub async fn advance_to(&self, run_time: OffsetDateTime) -> Result<(), anyhow::Error> {
        self.watermark.set_last_run(run_time).await
    }

    /// Ids of every product in the catalog
    pub async fn all_product_ids(&self) -> Result<Vec<String>, anyhow::Error> {
        self.collect_pages(None).await
    }

    async fn collect_pages(
        &self,
        modified_since: Option<OffsetDateTime>,
    ) -> Result<Vec<String>, anyhow::Error> {
        let mut ids = vec![];
        let mut page = 1;
        loop {
            let list = self
                .client
                .get_product_list(page, modified_since, self.log_level)
                .await?;
            if list.is_empty() {
                break;
            }
            log::debug!("SyncDB product list page {page}: {} products", list.len());
            ids.extend(list.into_iter().map(|s| s.product_id));
            page += 1;
        }
        Ok(ids.into_iter().unique().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{storage, FakeCatalogClient};
    use time::macros::datetime;

    fn pages(client: &FakeCatalogClient, pages: &[&[&str]]) {
        *client.pages.lock().unwrap() = pages
            .iter()
            .map(|p| p.iter().map(ToString::to_string).collect())
            .collect();
    }

    #[tokio::test]
    async fn first_poll_starts_at_run_time() {
        let storage = storage().await;
        let client = Arc::new(FakeCatalogClient::default());
        pages(&client, &[&["1", "2"], &["3", "2"]]);
        let poller = ChangePoller::new(client.clone(), storage.watermark.clone(), LogLevel(0));
        let run_time = datetime!(2024-05-01 10:00 UTC);

        let ids = poller.poll_changes_at(run_time).await.unwrap();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(
            *client.list_calls.lock().unwrap(),
            vec![(1, Some(run_time)), (2, Some(run_time)), (3, Some(run_time))]
        );
        assert_eq!(storage.watermark.last_run().await.unwrap(), Some(run_time));
    }

    #[tokio::test]
    async fn later_poll_starts_at_watermark() {
        let storage = storage().await;
        let client = Arc::new(FakeCatalogClient::default());
        let previous = datetime!(2024-05-01 10:00 UTC);
        storage.watermark.set_last_run(previous).await.unwrap();
        let poller = ChangePoller::new(client.clone(), storage.watermark.clone(), LogLevel(0));

        let ids = poller
            .poll_changes_at(datetime!(2024-05-01 10:15 UTC))
            .await
            .unwrap();
        assert!(ids.is_empty());
        assert_eq!(*client.list_calls.lock().unwrap(), vec![(1, Some(previous))]);
        assert_eq!(
            storage.watermark.last_run().await.unwrap(),
            Some(datetime!(2024-05-01 10:15 UTC))
        );
    }

    #[tokio::test]
    async fn failed_page_keeps_watermark() {
        let storage = storage().await;
        let client = Arc::new(FakeCatalogClient::default());
        pages(&client, &[&["1"], &["2"]]);
        *client.failing_page.lock().unwrap() = Some(2);
        let poller = ChangePoller::new(client.clone(), storage.watermark.clone(), LogLevel(0));

        assert!(poller
            .poll_changes_at(datetime!(2024-05-01 10:00 UTC))
            .await
            .is_err());
        assert_eq!(storage.watermark.last_run().await.unwrap(), None);
    }

    #[tokio::test]
    async fn pending_changes_leave_watermark() {
        let storage = storage().await;
        let client = Arc::new(FakeCatalogClient::default());
        pages(&client, &[&["1"]]);
        let previous = datetime!(2024-05-01 10:00 UTC);
        storage.watermark.set_last_run(previous).await.unwrap();
        let poller = ChangePoller::new(client.clone(), storage.watermark.clone(), LogLevel(0));
        let run_time = datetime!(2024-05-01 10:15 UTC);

        assert_eq!(poller.pending_changes(run_time).await.unwrap(), vec!["1"]);
        assert_eq!(storage.watermark.last_run().await.unwrap(), Some(previous));
        poller.advance_to(run_time).await.unwrap();
        assert_eq!(storage.watermark.last_run().await.unwrap(), Some(run_time));
    }

    #[tokio::test]
    async fn full_enumeration_ignores_watermark() {
        let storage = storage().await;
        let client = Arc::new(FakeCatalogClient::default());
        pages(&client, &[&["1", "2"], &["3"]]);
        storage
            .watermark
            .set_last_run(datetime!(2024-05-01 10:00 UTC))
            .await
            .unwrap();
        let poller = ChangePoller::new(client.clone(), storage.watermark.clone(), LogLevel(0));

        assert_eq!(poller.all_product_ids().await.unwrap(), vec!["1", "2", "3"]);
        assert!(client
            .list_calls
            .lock()
            .unwrap()
            .iter()
            .all(|(_, since)| since.is_none()));
        assert_eq!(
            storage.watermark.last_run().await.unwrap(),
            Some(datetime!(2024-05-01 10:00 UTC))
        );
    }
}
