use crate::variation::Variation;
use crate::Price;
use typesafe_repository::async_ops::{Get, List, Remove, Save, Select};
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;
use typesafe_repository::{SelectBy, Selector};
use uuid::Uuid;

pub const NON_MEMBER_PRICE_LEVEL: &str = "Non-Member";
pub const NON_MEMBER_PRICE_LIST: &str = "Nonmember bulk pricing";

/// Name of the local price list a remote price level is stored in
pub fn price_list_name(price_level: &str) -> &str {
    match price_level {
        NON_MEMBER_PRICE_LEVEL => NON_MEMBER_PRICE_LIST,
        other => other,
    }
}

#[derive(Id, Clone, Debug, PartialEq, Eq)]
pub struct PriceList {
    #[id]
    pub id: Uuid,
    pub name: String,
}

impl PriceList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

pub struct ByName(pub String);

impl Selector for ByName {}
impl SelectBy<ByName> for PriceList {}

pub trait PriceListRepository:
    Repository<PriceList, Error = anyhow::Error>
    + Get<PriceList>
    + Save<PriceList>
    + List<PriceList>
    + Select<PriceList, ByName>
    + Send
    + Sync
{
}

#[derive(Id, Clone, Debug, PartialEq, Eq)]
pub struct PriceListItem {
    #[id]
    pub id: Uuid,
    pub price_list_id: IdentityOf<PriceList>,
    pub variation_id: IdentityOf<Variation>,
    pub quantity: u32,
    pub price: Price,
}

impl PriceListItem {
    pub fn new(tier: ByTier, price: Price) -> Self {
        Self {
            id: Uuid::new_v4(),
            price_list_id: tier.price_list_id,
            variation_id: tier.variation_id,
            quantity: tier.quantity,
            price,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ByTier {
    pub price_list_id: IdentityOf<PriceList>,
    pub variation_id: IdentityOf<Variation>,
    pub quantity: u32,
}

pub struct ByVariation(pub IdentityOf<Variation>);

impl Selector for ByTier {}
impl SelectBy<ByTier> for PriceListItem {}

impl Selector for ByVariation {}
impl SelectBy<ByVariation> for PriceListItem {}

pub trait PriceListItemRepository:
    Repository<PriceListItem, Error = anyhow::Error>
    + Save<PriceListItem>
    + Remove<PriceListItem>
    + Select<PriceListItem, ByTier>
    + Select<PriceListItem, ByVariation>
    + Send
    + Sync
{
}
