use async_trait::async_trait;
use rusqlite::params;
use rusqlite::types::Type;
use rust_decimal::Decimal;
use std::str::FromStr;
use syncdb_types::variation::{
    ByProduct, BySyncDbId, Variation, VariationRepository, VariationType,
};
use syncdb_types::Price;
use tokio_rusqlite::Connection;
use typesafe_repository::async_ops::{Get, List, Remove, Save, Select};
use typesafe_repository::prelude::*;

const COLUMNS: &str = "id, variation_type, product_id, syncdb_id, sku, title, owner_id, published, price_number, price_currency, details";

pub struct SqliteVariationRepository {
    conn: Connection,
}

impl SqliteVariationRepository {
    pub async fn init(conn: Connection) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS variation (
                    id BLOB PRIMARY KEY,
                    variation_type TEXT NOT NULL,
                    product_id BLOB NOT NULL,
                    syncdb_id TEXT,
                    sku TEXT,
                    title TEXT NOT NULL,
                    owner_id INTEGER NOT NULL,
                    published INTEGER NOT NULL,
                    price_number TEXT,
                    price_currency TEXT,
                    details TEXT NOT NULL
                )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS variation_product ON variation (product_id)",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS variation_syncdb_id ON variation (syncdb_id)",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    async fn select_where(
        &self,
        condition: &'static str,
        param: rusqlite::types::Value,
    ) -> Result<Vec<Variation>, anyhow::Error> {
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM variation WHERE {condition} ORDER BY rowid"
                ))?;
                let v = stmt
                    .query_map(params![param], variation_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(v)
            })
            .await?)
    }
}

fn variation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Variation> {
    let price = match (row.get::<_, Option<String>>(8)?, row.get::<_, Option<String>>(9)?) {
        (Some(number), Some(currency_code)) => Some(Price {
            number: Decimal::from_str_exact(&number).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(err))
            })?,
            currency_code,
        }),
        _ => None,
    };
    Ok(Variation {
        id: row.get(0)?,
        variation_type: VariationType::from_str(&row.get::<_, String>(1)?).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(1, Type::Text, err.into())
        })?,
        product_id: row.get(2)?,
        syncdb_id: row.get(3)?,
        sku: row.get(4)?,
        title: row.get(5)?,
        owner_id: row.get(6)?,
        published: row.get(7)?,
        price,
        details: serde_json::from_str(&row.get::<_, String>(10)?).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(err))
        })?,
    })
}

impl Repository<Variation> for SqliteVariationRepository {
    type Error = anyhow::Error;
}

#[async_trait]
impl Save<Variation> for SqliteVariationRepository {
    async fn save(&self, v: Variation) -> Result<(), Self::Error> {
        let details = serde_json::to_string(&v.details)?;
        let (price_number, price_currency) = match v.price {
            Some(Price {
                number,
                currency_code,
            }) => (Some(number.to_string()), Some(currency_code)),
            None => (None, None),
        };
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO variation (id, variation_type, product_id, syncdb_id, sku, title, owner_id, published, price_number, price_currency, details)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    ON CONFLICT(id)
                    DO UPDATE SET variation_type=?2, product_id=?3, syncdb_id=?4, sku=?5, title=?6, owner_id=?7, published=?8, price_number=?9, price_currency=?10, details=?11",
                    params![
                        v.id,
                        v.variation_type.as_str(),
                        v.product_id,
                        v.syncdb_id,
                        v.sku,
                        v.title,
                        v.owner_id,
                        v.published,
                        price_number,
                        price_currency,
                        details,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Get<Variation> for SqliteVariationRepository {
    async fn get_one(&self, id: &IdentityOf<Variation>) -> Result<Option<Variation>, Self::Error> {
        let id = rusqlite::types::Value::Blob(id.as_bytes().to_vec());
        Ok(self.select_where("id = ?1", id).await?.pop())
    }
}

#[async_trait]
impl List<Variation> for SqliteVariationRepository {
    async fn list(&self) -> Result<Vec<Variation>, Self::Error> {
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {COLUMNS} FROM variation ORDER BY rowid"))?;
                let v = stmt
                    .query_map([], variation_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(v)
            })
            .await?)
    }
}

#[async_trait]
impl Remove<Variation> for SqliteVariationRepository {
    async fn remove(&self, id: &IdentityOf<Variation>) -> Result<(), Self::Error> {
        let id = *id;
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM variation WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Select<Variation, ByProduct> for SqliteVariationRepository {
    async fn select(&self, ByProduct(product_id): &ByProduct) -> Result<Vec<Variation>, Self::Error> {
        let product_id = rusqlite::types::Value::Blob(product_id.as_bytes().to_vec());
        self.select_where("product_id = ?1", product_id).await
    }
}

#[async_trait]
impl Select<Variation, BySyncDbId> for SqliteVariationRepository {
    async fn select(&self, BySyncDbId(syncdb_id): &BySyncDbId) -> Result<Vec<Variation>, Self::Error> {
        let syncdb_id = rusqlite::types::Value::Text(syncdb_id.clone());
        self.select_where("syncdb_id = ?1", syncdb_id).await
    }
}

impl VariationRepository for SqliteVariationRepository {}
