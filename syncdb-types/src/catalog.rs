use crate::LogLevel;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::Deserializer;
use serde::Deserialize;
use serde_aux::field_attributes::{
    deserialize_option_number_from_string, deserialize_string_from_number,
};
use time::OffsetDateTime;

/// Read access to the remote SyncDB catalog
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn get_product(
        &self,
        product_id: &str,
        log_level: LogLevel,
    ) -> Result<CatalogRecord, anyhow::Error>;

    /// Returns one page of product ids, an empty page ends the listing
    async fn get_product_list(
        &self,
        page: u32,
        modified_since: Option<OffsetDateTime>,
        log_level: LogLevel,
    ) -> Result<Vec<CatalogSummary>, anyhow::Error>;

    async fn get_price_list(
        &self,
        product_id: &str,
        log_level: LogLevel,
    ) -> Result<PriceListResponse, anyhow::Error>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

/// Accepts a string, a number or null, blank strings become `None`
fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?
        .map(|v| match v {
            StringOrNumber::String(s) => s.trim().to_string(),
            StringOrNumber::Number(n) => n.to_string(),
        })
        .filter(|s| !s.is_empty()))
}

/// Null quantities count as zero
fn deserialize_quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_option_number_from_string::<u32, D>(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormatField {
    #[serde(default)]
    pub product_format: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductTypeField {
    #[serde(default)]
    pub product_type: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct LanguageField {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub language: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub product_id: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeightUnitsField {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub weight_units: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaxScheduleField {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub tax_schedule: Option<String>,
}

/// One product as returned by `getProduct`
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    #[serde(deserialize_with = "deserialize_string_from_number")]
    pub product_id: String,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub ns_product_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub product_number: Option<String>,
    #[serde(default)]
    pub page_title: Option<String>,
    #[serde(default)]
    pub store_detailed_description: Option<String>,
    #[serde(default)]
    pub format: Option<FormatField>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub format_code: Option<String>,
    #[serde(default, rename = "type")]
    pub product_type: Option<ProductTypeField>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub program_code: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub special_product_code: Option<String>,
    #[serde(default)]
    pub language: Option<LanguageField>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub revision_code: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub isbn: Option<String>,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub number_of_pages: Option<u32>,
    #[serde(default, rename = "tableOfContentsURL")]
    pub table_of_contents_url: Option<String>,
    #[serde(default, rename = "samplePagesURL")]
    pub sample_pages_url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub published_year: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub ansi_approved: Option<bool>,
    #[serde(default)]
    pub dod_adopted: Option<bool>,
    #[serde(default)]
    pub later_revision: Option<ProductRef>,
    #[serde(default)]
    pub weight: Option<Decimal>,
    #[serde(default)]
    pub weight_units: Option<WeightUnitsField>,
    #[serde(default)]
    pub tax_schedule: Option<TaxScheduleField>,
    #[serde(default)]
    pub drop_ship_product: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub quantity_available: Option<i64>,
    #[serde(default)]
    pub drm: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub minimum_quantity: Option<u32>,
    #[serde(default)]
    pub product_components: Option<Vec<ProductRef>>,
    #[serde(default)]
    pub display_in_website: Option<bool>,
    #[serde(default)]
    pub in_active: Option<bool>,
}

impl CatalogRecord {
    pub fn format(&self) -> Option<&str> {
        self.format.as_ref()?.product_format.as_deref()
    }

    pub fn item_type(&self) -> Option<&str> {
        self.product_type.as_ref()?.product_type.as_deref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_ref()?.language.as_deref()
    }

    pub fn title(&self) -> String {
        self.page_title.clone().unwrap_or_default()
    }

    pub fn later_revision_id(&self) -> Option<&str> {
        self.later_revision.as_ref()?.product_id.as_deref()
    }

    pub fn component_ids(&self) -> Vec<String> {
        self.product_components
            .iter()
            .flatten()
            .filter_map(|c| c.product_id.clone())
            .collect()
    }

    pub fn weight_unit(&self) -> Option<&str> {
        self.weight_units.as_ref()?.weight_units.as_deref()
    }

    pub fn taxation_code(&self) -> Option<&str> {
        self.tax_schedule.as_ref()?.tax_schedule.as_deref()
    }

    /// Shown in the storefront and not retired
    pub fn is_visible(&self) -> bool {
        self.display_in_website.unwrap_or(false) && !self.in_active.unwrap_or(false)
    }
}

/// Entry of a `getProductList` page
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSummary {
    #[serde(deserialize_with = "deserialize_string_from_number")]
    pub product_id: String,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceListResponse {
    #[serde(default)]
    pub currency_prices: Vec<CurrencyPrice>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyPrice {
    pub currency: CurrencyField,
    #[serde(default)]
    pub price_level_prices: Vec<PriceLevelPrice>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct CurrencyField {
    pub currency: String,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceLevelPrice {
    pub price_level: PriceLevelField,
    #[serde(default)]
    pub price_breaks: Vec<PriceBreak>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceLevelField {
    pub price_level: String,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreak {
    #[serde(default, deserialize_with = "deserialize_quantity")]
    pub min_quantity: u32,
    pub unit_price: Decimal,
}
