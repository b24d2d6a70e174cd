use anyhow::{anyhow, Context};
use async_trait::async_trait;
use derive_more::Constructor;
use reqwest::header::CONTENT_TYPE;
use reqwest_middleware::ClientWithMiddleware;
use serde::de::DeserializeOwned;
use serde::Serialize;
use syncdb_types::catalog::{CatalogClient, CatalogRecord, CatalogSummary, PriceListResponse};
use syncdb_types::LogLevel;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use url::Url;

pub const GET_PRODUCT: &str = "getProduct";
pub const GET_PRODUCT_LIST: &str = "getProductList";
pub const GET_PRICE_LIST: &str = "getProductPriceList";

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub base_url: Url,
    pub api_key: Option<String>,
    /// Logs request variables and raw responses of every call
    pub log_api_calls: bool,
}

impl ClientOptions {
    pub fn new(base_url: &str, api_key: Option<String>, log_api_calls: bool) -> Result<Self, anyhow::Error> {
        let base_url = match base_url.ends_with('/') {
            true => base_url.to_string(),
            false => format!("{base_url}/"),
        };
        Ok(Self {
            base_url: Url::parse(&base_url).with_context(|| format!("Invalid SyncDB url {base_url}"))?,
            api_key,
            log_api_calls,
        })
    }
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct RequestVariables<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    product_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    requested_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified_on_after: Option<String>,
    log_level: LogLevel,
}

#[derive(Constructor, Clone)]
pub struct HttpCatalogClient {
    client: ClientWithMiddleware,
    opts: ClientOptions,
}

impl HttpCatalogClient {
    async fn call<T: DeserializeOwned>(
        &self,
        operation: &str,
        vars: &RequestVariables<'_>,
        field: &str,
    ) -> Result<T, anyhow::Error> {
        let url = self
            .opts
            .base_url
            .join(operation)
            .with_context(|| format!("Unable to build {operation} url"))?;
        let body = serde_json::to_string(vars)?;
        let mut req = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.clone());
        if let Some(key) = &self.opts.api_key {
            req = req.bearer_auth(key);
        }
        let res = req
            .send()
            .await
            .with_context(|| format!("Unable to call {operation}"))?;
        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("Unable to read {operation} response"))?;
        if self.opts.log_api_calls {
            log::info!("{operation} request: {body}");
            log::info!("{operation} response ({status}): {text}");
        }
        if !status.is_success() {
            return Err(anyhow!("{operation} returned HTTP {status}: {text}"));
        }
        parse_response(operation, &text, field)
    }
}

/// Checks the response envelope and extracts `field` from it
pub fn parse_response<T: DeserializeOwned>(
    operation: &str,
    body: &str,
    field: &str,
) -> Result<T, anyhow::Error> {
    let mut value: serde_json::Value = serde_json::from_str(body)
        .with_context(|| format!("Unable to parse {operation} response"))?;
    if let Some(status) = value.get("status").and_then(serde_json::Value::as_str) {
        if !status.eq_ignore_ascii_case("success") {
            let message = value
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            return Err(anyhow!("{operation} returned {status}: {message}"));
        }
    }
    let payload = value
        .get_mut(field)
        .map(serde_json::Value::take)
        .unwrap_or(serde_json::Value::Null);
    serde_json::from_value(payload)
        .with_context(|| format!("Unable to parse {field} of {operation} response"))
}

pub fn format_modified_on(t: OffsetDateTime) -> Result<String, anyhow::Error> {
    Ok(t.to_offset(UtcOffset::UTC)
        .format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"))?)
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn get_product(
        &self,
        product_id: &str,
        log_level: LogLevel,
    ) -> Result<CatalogRecord, anyhow::Error> {
        let vars = RequestVariables {
            product_id: Some(product_id),
            log_level,
            ..Default::default()
        };
        self.call(GET_PRODUCT, &vars, "product").await
    }

    async fn get_product_list(
        &self,
        page: u32,
        modified_since: Option<OffsetDateTime>,
        log_level: LogLevel,
    ) -> Result<Vec<CatalogSummary>, anyhow::Error> {
        let vars = RequestVariables {
            requested_page: Some(page),
            modified_on_after: modified_since.map(format_modified_on).transpose()?,
            log_level,
            ..Default::default()
        };
        let list: Option<Vec<CatalogSummary>> =
            self.call(GET_PRODUCT_LIST, &vars, "productList").await?;
        Ok(list.unwrap_or_default())
    }

    async fn get_price_list(
        &self,
        product_id: &str,
        log_level: LogLevel,
    ) -> Result<PriceListResponse, anyhow::Error> {
        let vars = RequestVariables {
            product_id: Some(product_id),
            log_level,
            ..Default::default()
        };
        let prices: Option<PriceListResponse> =
            self.call(GET_PRICE_LIST, &vars, "productPriceList").await?;
        Ok(prices.unwrap_or_default())
    }
}
