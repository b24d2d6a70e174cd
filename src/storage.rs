use crate::attribute::SqliteAttributeValueRepository;
use crate::price_list::{SqlitePriceListItemRepository, SqlitePriceListRepository};
use crate::product::SqliteProductRepository;
use crate::queue::SqliteJobQueue;
use crate::term::SqliteTermRepository;
use crate::variation::SqliteVariationRepository;
use crate::watermark::SqliteStateRepository;
use std::path::Path;
use std::sync::Arc;
use syncdb_types::attribute::AttributeValueRepository;
use syncdb_types::job::JobQueue;
use syncdb_types::price_list::{PriceListItemRepository, PriceListRepository};
use syncdb_types::product::ProductRepository;
use syncdb_types::term::TermRepository;
use syncdb_types::variation::VariationRepository;
use syncdb_types::watermark::{WatermarkStore, LAST_RUN_KEY};
use tokio_rusqlite::Connection;

/// Every repository of the local catalog, sharing one database
#[derive(Clone)]
pub struct Storage {
    pub products: Arc<dyn ProductRepository>,
    pub variations: Arc<dyn VariationRepository>,
    pub price_lists: Arc<dyn PriceListRepository>,
    pub price_list_items: Arc<dyn PriceListItemRepository>,
    pub terms: Arc<dyn TermRepository>,
    pub attributes: Arc<dyn AttributeValueRepository>,
    pub watermark: Arc<dyn WatermarkStore>,
    pub jobs: Arc<dyn JobQueue>,
}

impl Storage {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path).await?;
        conn.call(|conn| {
            let _ = conn.pragma_update(None, "journal_mode", "WAL");
            let _ = conn.pragma_update(None, "synchronous", "NORMAL");
            let _ = conn.pragma_update(None, "busy_timeout", 5000i64);
            Ok(())
        })
        .await?;
        Self::init(conn).await
    }

    pub async fn in_memory() -> Result<Self, anyhow::Error> {
        Self::init(Connection::open_in_memory().await?).await
    }

    async fn init(conn: Connection) -> Result<Self, anyhow::Error> {
        Ok(Self {
            products: Arc::new(SqliteProductRepository::init(conn.clone()).await?),
            variations: Arc::new(SqliteVariationRepository::init(conn.clone()).await?),
            price_lists: Arc::new(SqlitePriceListRepository::init(conn.clone()).await?),
            price_list_items: Arc::new(SqlitePriceListItemRepository::init(conn.clone()).await?),
            terms: Arc::new(SqliteTermRepository::init(conn.clone()).await?),
            attributes: Arc::new(SqliteAttributeValueRepository::init(conn.clone()).await?),
            watermark: Arc::new(SqliteStateRepository::init(conn.clone(), LAST_RUN_KEY).await?),
            jobs: Arc::new(SqliteJobQueue::init(conn).await?),
        })
    }
}
