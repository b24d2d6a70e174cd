use crate::attribute::AttributeValue;
use crate::product::Product;
use crate::Price;
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use typesafe_repository::async_ops::{Get, List, Remove, Save, Select};
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;
use typesafe_repository::{SelectBy, Selector};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum VariationType {
    #[display("physical_document")]
    PhysicalDocument,
    #[display("digital_document")]
    DigitalDocument,
    #[display("kit")]
    Kit,
    #[display("service")]
    Service,
}

impl VariationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PhysicalDocument => "physical_document",
            Self::DigitalDocument => "digital_document",
            Self::Kit => "kit",
            Self::Service => "service",
        }
    }
}

impl FromStr for VariationType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "physical_document" => Ok(Self::PhysicalDocument),
            "digital_document" => Ok(Self::DigitalDocument),
            "kit" => Ok(Self::Kit),
            "service" => Ok(Self::Service),
            _ => Err(anyhow::anyhow!("Unknown variation type {s}")),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Weight {
    pub number: Decimal,
    pub unit: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntervalPeriod {
    Day,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "plugin", rename_all = "snake_case")]
pub enum LicenseExpiration {
    Unlimited,
    RollingInterval { interval: u32, period: IntervalPeriod },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "plugin", rename_all = "snake_case")]
pub enum LicenseType {
    CommerceFile { file_download_limit: u32 },
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct VariationDetails {
    pub netsuite_id: Option<String>,
    pub weight: Option<Weight>,
    pub release_date: Option<String>,
    pub format: Option<IdentityOf<AttributeValue>>,
    pub taxation_code: Option<String>,
    pub product_format: Option<String>,
    pub item_type: Option<String>,
    pub dropshipped: Option<bool>,
    pub stock_level: Option<i64>,
    pub drm: Option<bool>,
    pub license_expiration: Option<LicenseExpiration>,
    pub license_type: Option<LicenseType>,
    pub minimum_order_quantity: Option<u32>,
    #[serde(default)]
    pub kit_products: Vec<Uuid>,
}

#[derive(Id, Clone, Debug, PartialEq, Eq)]
pub struct Variation {
    #[id]
    pub id: Uuid,
    pub variation_type: VariationType,
    pub product_id: IdentityOf<Product>,
    pub syncdb_id: Option<String>,
    pub sku: Option<String>,
    pub title: String,
    pub owner_id: u32,
    pub published: bool,
    pub price: Option<Price>,
    pub details: VariationDetails,
}

impl Variation {
    pub fn new(variation_type: VariationType, product_id: IdentityOf<Product>) -> Self {
        Self {
            id: Uuid::new_v4(),
            variation_type,
            product_id,
            syncdb_id: None,
            sku: None,
            title: String::new(),
            owner_id: crate::SYSTEM_OWNER,
            published: false,
            price: None,
            details: VariationDetails::default(),
        }
    }
}

pub struct ByProduct(pub IdentityOf<Product>);
pub struct BySyncDbId(pub String);

impl Selector for ByProduct {}
impl SelectBy<ByProduct> for Variation {}

impl Selector for BySyncDbId {}
impl SelectBy<BySyncDbId> for Variation {}

pub trait VariationRepository:
    Repository<Variation, Error = anyhow::Error>
    + Get<Variation>
    + Save<Variation>
    + List<Variation>
    + Remove<Variation>
    + Select<Variation, ByProduct>
    + Select<Variation, BySyncDbId>
    + Send
    + Sync
{
}
