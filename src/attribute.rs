use async_trait::async_trait;
use rusqlite::params;
use syncdb_types::attribute::{AttributeValue, AttributeValueRepository, ByAttributeName};
use tokio_rusqlite::Connection;
use typesafe_repository::async_ops::{Save, Select};
use typesafe_repository::prelude::*;

pub struct SqliteAttributeValueRepository {
    conn: Connection,
}

impl SqliteAttributeValueRepository {
    pub async fn init(conn: Connection) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS attribute_value (
                    id BLOB PRIMARY KEY,
                    attribute TEXT NOT NULL,
                    name TEXT NOT NULL
                )",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

impl Repository<AttributeValue> for SqliteAttributeValueRepository {
    type Error = anyhow::Error;
}

#[async_trait]
impl Save<AttributeValue> for SqliteAttributeValueRepository {
    async fn save(&self, v: AttributeValue) -> Result<(), Self::Error> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO attribute_value (id, attribute, name) VALUES (?1, ?2, ?3)
                    ON CONFLICT(id) DO UPDATE SET attribute=?2, name=?3",
                    params![v.id, v.attribute, v.name],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Select<AttributeValue, ByAttributeName> for SqliteAttributeValueRepository {
    async fn select(&self, s: &ByAttributeName) -> Result<Vec<AttributeValue>, Self::Error> {
        let (attribute, name) = (s.attribute.clone(), s.name.clone());
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, attribute, name FROM attribute_value
                    WHERE attribute = ?1 AND name = ?2 ORDER BY rowid",
                )?;
                let v = stmt
                    .query_map(params![attribute, name], |row| {
                        Ok(AttributeValue {
                            id: row.get(0)?,
                            attribute: row.get(1)?,
                            name: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(v)
            })
            .await?)
    }
}

impl AttributeValueRepository for SqliteAttributeValueRepository {}
