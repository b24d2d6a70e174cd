use async_trait::async_trait;
use rusqlite::params;
use rusqlite::types::Type;
use rust_decimal::Decimal;
use syncdb_types::price_list::{
    ByName, ByTier, ByVariation, PriceList, PriceListItem, PriceListItemRepository,
    PriceListRepository,
};
use syncdb_types::Price;
use tokio_rusqlite::Connection;
use typesafe_repository::async_ops::{Get, List, Remove, Save, Select};
use typesafe_repository::prelude::*;

pub struct SqlitePriceListRepository {
    conn: Connection,
}

impl SqlitePriceListRepository {
    pub async fn init(conn: Connection) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS price_list (
                    id BLOB PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE
                )",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

impl Repository<PriceList> for SqlitePriceListRepository {
    type Error = anyhow::Error;
}

#[async_trait]
impl Save<PriceList> for SqlitePriceListRepository {
    async fn save(&self, list: PriceList) -> Result<(), Self::Error> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO price_list (id, name) VALUES (?1, ?2)
                    ON CONFLICT(id) DO UPDATE SET name=?2",
                    params![list.id, list.name],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Get<PriceList> for SqlitePriceListRepository {
    async fn get_one(&self, id: &IdentityOf<PriceList>) -> Result<Option<PriceList>, Self::Error> {
        let id = *id;
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT id, name FROM price_list WHERE id = ?1")?;
                let mut l = stmt
                    .query_map(params![id], |row| {
                        Ok(PriceList {
                            id: row.get(0)?,
                            name: row.get(1)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(l.pop())
            })
            .await?)
    }
}

#[async_trait]
impl List<PriceList> for SqlitePriceListRepository {
    async fn list(&self) -> Result<Vec<PriceList>, Self::Error> {
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT id, name FROM price_list ORDER BY name")?;
                let l = stmt
                    .query_map([], |row| {
                        Ok(PriceList {
                            id: row.get(0)?,
                            name: row.get(1)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(l)
            })
            .await?)
    }
}

#[async_trait]
impl Select<PriceList, ByName> for SqlitePriceListRepository {
    async fn select(&self, ByName(name): &ByName) -> Result<Vec<PriceList>, Self::Error> {
        let name = name.clone();
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT id, name FROM price_list WHERE name = ?1")?;
                let l = stmt
                    .query_map(params![name], |row| {
                        Ok(PriceList {
                            id: row.get(0)?,
                            name: row.get(1)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(l)
            })
            .await?)
    }
}

impl PriceListRepository for SqlitePriceListRepository {}

pub struct SqlitePriceListItemRepository {
    conn: Connection,
}

impl SqlitePriceListItemRepository {
    pub async fn init(conn: Connection) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS price_list_item (
                    id BLOB PRIMARY KEY,
                    price_list_id BLOB NOT NULL,
                    variation_id BLOB NOT NULL,
                    quantity INTEGER NOT NULL,
                    price_number TEXT NOT NULL,
                    price_currency TEXT NOT NULL
                )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS price_list_item_variation ON price_list_item (variation_id)",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

fn item_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PriceListItem> {
    Ok(PriceListItem {
        id: row.get(0)?,
        price_list_id: row.get(1)?,
        variation_id: row.get(2)?,
        quantity: row.get(3)?,
        price: Price {
            number: Decimal::from_str_exact(&row.get::<_, String>(4)?).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(err))
            })?,
            currency_code: row.get(5)?,
        },
    })
}

impl Repository<PriceListItem> for SqlitePriceListItemRepository {
    type Error = anyhow::Error;
}

#[async_trait]
impl Save<PriceListItem> for SqlitePriceListItemRepository {
    async fn save(&self, item: PriceListItem) -> Result<(), Self::Error> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO price_list_item (id, price_list_id, variation_id, quantity, price_number, price_currency)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(id)
                    DO UPDATE SET price_list_id=?2, variation_id=?3, quantity=?4, price_number=?5, price_currency=?6",
                    params![
                        item.id,
                        item.price_list_id,
                        item.variation_id,
                        item.quantity,
                        item.price.number.to_string(),
                        item.price.currency_code,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Remove<PriceListItem> for SqlitePriceListItemRepository {
    async fn remove(&self, id: &IdentityOf<PriceListItem>) -> Result<(), Self::Error> {
        let id = *id;
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM price_list_item WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Select<PriceListItem, ByTier> for SqlitePriceListItemRepository {
    async fn select(&self, tier: &ByTier) -> Result<Vec<PriceListItem>, Self::Error> {
        let tier = tier.clone();
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, price_list_id, variation_id, quantity, price_number, price_currency
                    FROM price_list_item WHERE price_list_id = ?1 AND variation_id = ?2 AND quantity = ?3",
                )?;
                let i = stmt
                    .query_map(
                        params![tier.price_list_id, tier.variation_id, tier.quantity],
                        item_from_row,
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(i)
            })
            .await?)
    }
}

#[async_trait]
impl Select<PriceListItem, ByVariation> for SqlitePriceListItemRepository {
    async fn select(&self, ByVariation(variation_id): &ByVariation) -> Result<Vec<PriceListItem>, Self::Error> {
        let variation_id = *variation_id;
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, price_list_id, variation_id, quantity, price_number, price_currency
                    FROM price_list_item WHERE variation_id = ?1 ORDER BY rowid",
                )?;
                let i = stmt
                    .query_map(params![variation_id], item_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(i)
            })
            .await?)
    }
}

impl PriceListItemRepository for SqlitePriceListItemRepository {}
