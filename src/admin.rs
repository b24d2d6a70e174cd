//! One-shot maintenance operations exposed through the command line.

use crate::engine::SyncEngine;
use crate::poller::ChangePoller;
use crate::storage::Storage;
use anyhow::Context;
use log_error::LogError;
use syncdb_types::attribute::{AttributeValue, ByAttributeName, FORMAT_ATTRIBUTE};
use syncdb_types::catalog::CatalogClient;
use syncdb_types::job::{Job, JobQueue};
use syncdb_types::price_list::{ByName, PriceList};
use syncdb_types::variation::Variation;
use syncdb_types::LogLevel;
use time::OffsetDateTime;
use typesafe_repository::async_ops::{Get, List, Remove, Save, Select};

/// Queues one sync job per product id, all due immediately
pub async fn enqueue_ids(jobs: &dyn JobQueue, ids: Vec<String>) -> Result<usize, anyhow::Error> {
    let now = OffsetDateTime::now_utc();
    let count = ids.len();
    for id in ids {
        jobs.add(Job::product_sync(id, now)).await?;
    }
    Ok(count)
}

pub async fn poll_and_enqueue(
    poller: &ChangePoller,
    jobs: &dyn JobQueue,
) -> Result<usize, anyhow::Error> {
    let run_time = OffsetDateTime::now_utc();
    let ids = poller
        .pending_changes(run_time)
        .await
        .context("Unable to poll SyncDB changes")?;
    let count = ids.len();
    enqueue_ids(jobs, ids)
        .await
        .context("Unable to queue modified SyncDB products, they are polled again next run")?;
    poller.advance_to(run_time).await?;
    Ok(count)
}

pub async fn enqueue_all(
    storage: &Storage,
    engine: &SyncEngine,
    poller: &ChangePoller,
    delete_existing: bool,
) -> Result<usize, anyhow::Error> {
    let ids = poller
        .all_product_ids()
        .await
        .context("Unable to list SyncDB products")?;
    if delete_existing {
        delete_all(storage, engine).await?;
    }
    let count = enqueue_ids(storage.jobs.as_ref(), ids).await?;
    log::info!("Queued {count} SyncDB products");
    Ok(count)
}

/// Deletes every variation with its price list items, then every product
pub async fn delete_all(storage: &Storage, engine: &SyncEngine) -> Result<(), anyhow::Error> {
    let variations = storage.variations.list().await?;
    for variation in &variations {
        engine.remove_variation(variation).await?;
    }
    let products = storage.products.list().await?;
    for product in &products {
        storage.products.remove(&product.id).await?;
    }
    log::info!(
        "Deleted {} variations and {} products",
        variations.len(),
        products.len()
    );
    Ok(())
}

/// Publishes variations whose SyncDB record is visible, along with their products
pub async fn publish_all(
    storage: &Storage,
    client: &dyn CatalogClient,
    log_level: LogLevel,
) -> Result<usize, anyhow::Error> {
    let mut published = 0;
    for variation in storage.variations.list().await? {
        let Some(syncdb_id) = variation.syncdb_id.clone() else {
            continue;
        };
        let Some(record) = client
            .get_product(&syncdb_id, log_level)
            .await
            .log_error(&format!("Unable to fetch SyncDB product {syncdb_id}"))
        else {
            continue;
        };
        if !record.is_visible() {
            continue;
        }
        if publish(storage, variation)
            .await
            .log_error(&format!("Unable to publish SyncDB product {syncdb_id}"))
            .is_some()
        {
            published += 1;
        }
    }
    log::info!("Published {published} variations");
    Ok(published)
}

async fn publish(storage: &Storage, mut variation: Variation) -> Result<(), anyhow::Error> {
    let product_id = variation.product_id;
    variation.published = true;
    storage.variations.save(variation).await?;
    if let Some(mut product) = storage.products.get_one(&product_id).await? {
        if !product.published {
            product.published = true;
            storage.products.save(product).await?;
        }
    }
    Ok(())
}

/// Creates the price list unless one with the same name exists
pub async fn seed_price_list(storage: &Storage, name: &str) -> Result<bool, anyhow::Error> {
    if !storage
        .price_lists
        .select(&ByName(name.to_string()))
        .await?
        .is_empty()
    {
        return Ok(false);
    }
    storage.price_lists.save(PriceList::new(name)).await?;
    Ok(true)
}

/// Creates the format attribute value unless it exists
pub async fn seed_format(storage: &Storage, code: &str) -> Result<bool, anyhow::Error> {
    if !storage
        .attributes
        .select(&ByAttributeName::format(code))
        .await?
        .is_empty()
    {
        return Ok(false);
    }
    storage
        .attributes
        .save(AttributeValue::new(FORMAT_ATTRIBUTE, code))
        .await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SyncOptions;
    use crate::testing::{prices, record, storage, FakeCatalogClient};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use async_trait::async_trait;
    use syncdb_types::job::{ByState, JobState, NextDue};
    use syncdb_types::watermark::WatermarkStore;
    use typesafe_repository::async_ops::Add;
    use typesafe_repository::prelude::*;
    use syncdb_types::price_list::ByVariation;

    async fn setup() -> (Storage, SyncEngine, ChangePoller, Arc<FakeCatalogClient>) {
        let storage = storage().await;
        let client = Arc::new(FakeCatalogClient::default());
        let engine = SyncEngine::new(client.clone(), &storage, SyncOptions::default());
        let poller = ChangePoller::new(
            client.clone(),
            storage.watermark.clone(),
            LogLevel::default(),
        );
        (storage, engine, poller, client)
    }

    #[tokio::test]
    async fn enqueue_all_queues_every_listed_product() {
        let (storage, engine, poller, client) = setup().await;
        *client.pages.lock().unwrap() = vec![
            vec!["1".to_string(), "2".to_string()],
            vec!["3".to_string()],
        ];

        assert_eq!(enqueue_all(&storage, &engine, &poller, false).await.unwrap(), 3);
        let queued = storage.jobs.select(&ByState(JobState::Queued)).await.unwrap();
        let ids: Vec<_> = queued
            .iter()
            .map(|j| j.product_sync_payload().unwrap().product_id)
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    struct RejectingQueue;

    impl Repository<Job> for RejectingQueue {
        type Error = anyhow::Error;
    }

    #[async_trait]
    impl Add<Job> for RejectingQueue {
        async fn add(&self, _job: Job) -> Result<(), Self::Error> {
            Err(anyhow::anyhow!("database is locked"))
        }
    }

    #[async_trait]
    impl Get<Job> for RejectingQueue {
        async fn get_one(&self, _id: &IdentityOf<Job>) -> Result<Option<Job>, Self::Error> {
            Ok(None)
        }
    }

    #[async_trait]
    impl Save<Job> for RejectingQueue {
        async fn save(&self, _job: Job) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[async_trait]
    impl Select<Job, NextDue> for RejectingQueue {
        async fn select(&self, _: &NextDue) -> Result<Vec<Job>, Self::Error> {
            Ok(vec![])
        }
    }

    #[async_trait]
    impl Select<Job, ByState> for RejectingQueue {
        async fn select(&self, _: &ByState) -> Result<Vec<Job>, Self::Error> {
            Ok(vec![])
        }
    }

    #[async_trait]
    impl JobQueue for RejectingQueue {
        async fn requeue_interrupted(&self) -> Result<usize, Self::Error> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn poll_advances_watermark_after_queueing() {
        let (storage, _, poller, client) = setup().await;
        *client.pages.lock().unwrap() = vec![vec!["1".to_string(), "2".to_string()]];

        assert!(poll_and_enqueue(&poller, &RejectingQueue).await.is_err());
        assert_eq!(storage.watermark.last_run().await.unwrap(), None);

        assert_eq!(
            poll_and_enqueue(&poller, storage.jobs.as_ref()).await.unwrap(),
            2
        );
        assert!(storage.watermark.last_run().await.unwrap().is_some());
        assert_eq!(
            storage.jobs.select(&ByState(JobState::Queued)).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn enqueue_all_can_start_from_empty_catalog() {
        let (storage, engine, poller, client) = setup().await;
        client.put(record("1", "CD"));
        engine.sync_one("1").await.unwrap();
        *client.pages.lock().unwrap() = vec![vec!["1".to_string()]];

        enqueue_all(&storage, &engine, &poller, true).await.unwrap();
        assert!(storage.products.list().await.unwrap().is_empty());
        assert!(storage.variations.list().await.unwrap().is_empty());
        assert_eq!(
            storage.jobs.select(&ByState(JobState::Queued)).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn failed_listing_deletes_nothing() {
        let (storage, engine, poller, client) = setup().await;
        client.put(record("1", "CD"));
        engine.sync_one("1").await.unwrap();
        *client.failing_page.lock().unwrap() = Some(1);

        assert!(enqueue_all(&storage, &engine, &poller, true).await.is_err());
        assert_eq!(storage.products.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_all_removes_price_list_items() {
        let (storage, engine, _, client) = setup().await;
        seed_price_list(&storage, "Member").await.unwrap();
        client.put(record("1", "CD"));
        client.put_prices("1", prices("US Dollar", &[("Member", 5, dec!(20.00))]));
        engine.sync_one("1").await.unwrap();
        let variation = storage.variations.list().await.unwrap().remove(0);
        assert_eq!(
            storage
                .price_list_items
                .select(&ByVariation(variation.id))
                .await
                .unwrap()
                .len(),
            1
        );

        delete_all(&storage, &engine).await.unwrap();
        assert!(storage
            .price_list_items
            .select(&ByVariation(variation.id))
            .await
            .unwrap()
            .is_empty());
        assert!(storage.products.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_all_publishes_visible_records() {
        let (storage, engine, _, client) = setup().await;
        client.put(record("1", "CD"));
        let mut hidden = record("2", "CD");
        hidden.in_active = Some(true);
        client.put(hidden);
        engine.sync_one("1").await.unwrap();
        engine.sync_one("2").await.unwrap();
        for mut variation in storage.variations.list().await.unwrap() {
            variation.published = false;
            storage.variations.save(variation).await.unwrap();
        }
        for mut product in storage.products.list().await.unwrap() {
            product.published = false;
            storage.products.save(product).await.unwrap();
        }

        assert_eq!(
            publish_all(&storage, client.as_ref(), LogLevel::default())
                .await
                .unwrap(),
            1
        );
        let published: Vec<_> = storage
            .variations
            .list()
            .await
            .unwrap()
            .into_iter()
            .filter(|v| v.published)
            .map(|v| v.syncdb_id)
            .collect();
        assert_eq!(published, vec![Some("1".to_string())]);
        let products = storage.products.list().await.unwrap();
        assert_eq!(products.iter().filter(|p| p.published).count(), 1);
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let (storage, ..) = setup().await;
        assert!(seed_price_list(&storage, "Member").await.unwrap());
        assert!(!seed_price_list(&storage, "Member").await.unwrap());
        assert!(seed_format(&storage, "HC").await.unwrap());
        assert!(!seed_format(&storage, "HC").await.unwrap());
    }
}
