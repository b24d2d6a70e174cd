use derive_more::Display;
use std::str::FromStr;
use std::sync::Arc;
use syncdb_types::catalog::{PriceLevelPrice, PriceListResponse};
use syncdb_types::price_list::{
    price_list_name, ByName, ByTier, PriceListItem, PriceListItemRepository, PriceListRepository,
    NON_MEMBER_PRICE_LEVEL,
};
use syncdb_types::variation::Variation;
use syncdb_types::Price;
use typesafe_repository::async_ops::{Save, Select};

/// Name of the only currency block taken from SyncDB
pub const USD_CURRENCY_NAME: &str = "US Dollar";

/// What to do with price levels that have no local price list
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display)]
pub enum UnresolvedPriceListPolicy {
    #[default]
    #[display("warn")]
    Warn,
    #[display("ignore")]
    Ignore,
}

impl FromStr for UnresolvedPriceListPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "ignore" => Ok(Self::Ignore),
            _ => Err(anyhow::anyhow!("Unknown unresolved price list policy {s}")),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub base_price_changed: bool,
    pub items_created: usize,
    pub items_updated: usize,
    pub skipped_price_levels: Vec<String>,
}

#[derive(Clone)]
pub struct PriceReconciler {
    price_lists: Arc<dyn PriceListRepository>,
    items: Arc<dyn PriceListItemRepository>,
    policy: UnresolvedPriceListPolicy,
}

impl PriceReconciler {
    pub fn new(
        price_lists: Arc<dyn PriceListRepository>,
        items: Arc<dyn PriceListItemRepository>,
        policy: UnresolvedPriceListPolicy,
    ) -> Self {
        Self {
            price_lists,
            items,
            policy,
        }
    }

    /// Writes the USD tiers of `response` onto the variation base price and its price list items.
    ///
    /// The variation itself is only modified in memory, the caller persists it when
    /// [`Reconciliation::base_price_changed`] is set.
    pub async fn reconcile(
        &self,
        variation: &mut Variation,
        response: &PriceListResponse,
    ) -> Result<Reconciliation, anyhow::Error> {
        let mut res = Reconciliation::default();
        for currency_price in response.currency_prices.iter() {
            if currency_price.currency.currency != USD_CURRENCY_NAME {
                continue;
            }
            self.reconcile_levels(variation, &currency_price.price_level_prices, &mut res)
                .await?;
        }
        Ok(res)
    }

    async fn reconcile_levels(
        &self,
        variation: &mut Variation,
        levels: &[PriceLevelPrice],
        res: &mut Reconciliation,
    ) -> Result<(), anyhow::Error> {
        for level in levels {
            let level_name = level.price_level.price_level.as_str();
            let list_name = price_list_name(level_name);
            let Some(price_list) = self
                .price_lists
                .select(&ByName(list_name.to_string()))
                .await?
                .into_iter()
                .next()
            else {
                if self.policy == UnresolvedPriceListPolicy::Warn {
                    log::warn!(
                        "No price list named \"{list_name}\" for price level \"{level_name}\" of variation {}",
                        variation.sku.as_deref().unwrap_or_default()
                    );
                }
                res.skipped_price_levels.push(level_name.to_string());
                continue;
            };
            for price_break in level.price_breaks.iter() {
                let quantity = price_break.min_quantity.max(1);
                let price = Price::usd(price_break.unit_price);
                if level_name == NON_MEMBER_PRICE_LEVEL && quantity == 1 {
                    if variation.price.as_ref() != Some(&price) {
                        variation.price = Some(price);
                        res.base_price_changed = true;
                    }
                    continue;
                }
                let tier = ByTier {
                    price_list_id: price_list.id,
                    variation_id: variation.id,
                    quantity,
                };
                match self.items.select(&tier).await?.into_iter().next() {
                    Some(mut item) => {
                        if item.price != price {
                            item.price = price;
                            self.items.save(item).await?;
                            res.items_updated += 1;
                        }
                    }
                    None => {
                        self.items.save(PriceListItem::new(tier, price)).await?;
                        res.items_created += 1;
                    }
                }
            }
        }
        Ok(())
    }
}
