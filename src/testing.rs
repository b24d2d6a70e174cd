use crate::storage::Storage;
use anyhow::anyhow;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use syncdb_types::catalog::{
    CatalogClient, CatalogRecord, CatalogSummary, CurrencyField, CurrencyPrice, FormatField,
    LanguageField, PriceBreak, PriceLevelField, PriceLevelPrice, PriceListResponse, ProductRef,
};
use syncdb_types::LogLevel;
use time::OffsetDateTime;

/// In-memory catalog recording the calls made against it
#[derive(Default)]
pub struct FakeCatalogClient {
    pub products: Mutex<HashMap<String, CatalogRecord>>,
    pub prices: Mutex<HashMap<String, PriceListResponse>>,
    pub pages: Mutex<Vec<Vec<String>>>,
    pub failing: Mutex<HashSet<String>>,
    pub failing_page: Mutex<Option<u32>>,
    pub product_calls: Mutex<Vec<String>>,
    pub list_calls: Mutex<Vec<(u32, Option<OffsetDateTime>)>>,
}

impl FakeCatalogClient {
    pub fn put(&self, record: CatalogRecord) {
        self.products
            .lock()
            .unwrap()
            .insert(record.product_id.clone(), record);
    }

    pub fn put_prices(&self, product_id: &str, prices: PriceListResponse) {
        self.prices
            .lock()
            .unwrap()
            .insert(product_id.to_string(), prices);
    }

    pub fn fail(&self, product_id: &str) {
        self.failing.lock().unwrap().insert(product_id.to_string());
    }

    pub fn fetches_of(&self, product_id: &str) -> usize {
        self.product_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|id| *id == product_id)
            .count()
    }
}

#[async_trait]
impl CatalogClient for FakeCatalogClient {
    async fn get_product(
        &self,
        product_id: &str,
        _log_level: LogLevel,
    ) -> Result<CatalogRecord, anyhow::Error> {
        self.product_calls
            .lock()
            .unwrap()
            .push(product_id.to_string());
        if self.failing.lock().unwrap().contains(product_id) {
            return Err(anyhow!("getProduct returned Error: service unavailable"));
        }
        self.products
            .lock()
            .unwrap()
            .get(product_id)
            .cloned()
            .ok_or_else(|| anyhow!("getProduct returned Error: product {product_id} not found"))
    }

    async fn get_product_list(
        &self,
        page: u32,
        modified_since: Option<OffsetDateTime>,
        _log_level: LogLevel,
    ) -> Result<Vec<CatalogSummary>, anyhow::Error> {
        self.list_calls.lock().unwrap().push((page, modified_since));
        if *self.failing_page.lock().unwrap() == Some(page) {
            return Err(anyhow!("getProductList returned HTTP 502"));
        }
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|product_id| CatalogSummary { product_id })
            .collect())
    }

    async fn get_price_list(
        &self,
        product_id: &str,
        _log_level: LogLevel,
    ) -> Result<PriceListResponse, anyhow::Error> {
        if self.failing.lock().unwrap().contains(product_id) {
            return Err(anyhow!("getProductPriceList returned Error"));
        }
        Ok(self
            .prices
            .lock()
            .unwrap()
            .get(product_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Visible record of the given format with every identity field filled in
pub fn record(product_id: &str, format: &str) -> CatalogRecord {
    CatalogRecord {
        product_id: product_id.to_string(),
        ns_product_id: Some(format!("NS-{product_id}")),
        product_number: Some(format!("SKU-{product_id}")),
        page_title: Some(format!("Title {product_id}")),
        store_detailed_description: Some(format!("<p>Body {product_id}</p>")),
        format: Some(FormatField {
            product_format: Some(format.to_string()),
        }),
        format_code: Some("HC".to_string()),
        program_code: Some("A-610".to_string()),
        special_product_code: Some(format!("SPEC-{product_id}")),
        language: Some(LanguageField {
            language: Some("English".to_string()),
        }),
        revision_code: Some("H".to_string()),
        published_year: Some("2020".to_string()),
        published_date: Some("2020-09-01T00:00:00".to_string()),
        display_in_website: Some(true),
        in_active: Some(false),
        ..Default::default()
    }
}

pub fn later_revision(product_id: &str) -> Option<ProductRef> {
    Some(ProductRef {
        product_id: Some(product_id.to_string()),
    })
}

/// Price list response holding one price level per entry
pub fn prices(currency: &str, levels: &[(&str, u32, Decimal)]) -> PriceListResponse {
    PriceListResponse {
        currency_prices: vec![CurrencyPrice {
            currency: CurrencyField {
                currency: currency.to_string(),
            },
            price_level_prices: levels
                .iter()
                .map(|(level, min_quantity, unit_price)| PriceLevelPrice {
                    price_level: PriceLevelField {
                        price_level: level.to_string(),
                    },
                    price_breaks: vec![PriceBreak {
                        min_quantity: *min_quantity,
                        unit_price: *unit_price,
                    }],
                })
                .collect(),
        }],
    }
}

pub async fn storage() -> Storage {
    Storage::in_memory().await.unwrap()
}
