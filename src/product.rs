use async_trait::async_trait;
use rusqlite::params;
use rusqlite::types::Type;
use std::str::FromStr;
use syncdb_types::product::{ByIdentity, Product, ProductRepository, ProductType};
use tokio_rusqlite::Connection;
use typesafe_repository::async_ops::{Get, List, Remove, Save, Select};
use typesafe_repository::prelude::*;

const COLUMNS: &str =
    "id, product_type, program_code, spec_code, language, revision, title, owner_id, published, details";

pub struct SqliteProductRepository {
    conn: Connection,
}

impl SqliteProductRepository {
    pub async fn init(conn: Connection) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS product (
                    id BLOB PRIMARY KEY,
                    product_type TEXT NOT NULL,
                    program_code TEXT,
                    spec_code TEXT,
                    language BLOB,
                    revision BLOB,
                    title TEXT NOT NULL,
                    owner_id INTEGER NOT NULL,
                    published INTEGER NOT NULL,
                    details TEXT NOT NULL
                )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS product_identity ON product (product_type, program_code, spec_code)",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

fn product_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        product_type: ProductType::from_str(&row.get::<_, String>(1)?).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(1, Type::Text, err.into())
        })?,
        program_code: row.get(2)?,
        spec_code: row.get(3)?,
        language: row.get(4)?,
        revision: row.get(5)?,
        title: row.get(6)?,
        owner_id: row.get(7)?,
        published: row.get(8)?,
        details: serde_json::from_str(&row.get::<_, String>(9)?).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(err))
        })?,
    })
}

impl Repository<Product> for SqliteProductRepository {
    type Error = anyhow::Error;
}

#[async_trait]
impl Save<Product> for SqliteProductRepository {
    async fn save(&self, p: Product) -> Result<(), Self::Error> {
        let details = serde_json::to_string(&p.details)?;
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO product (id, product_type, program_code, spec_code, language, revision, title, owner_id, published, details)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT(id)
                    DO UPDATE SET product_type=?2, program_code=?3, spec_code=?4, language=?5, revision=?6, title=?7, owner_id=?8, published=?9, details=?10",
                    params![
                        p.id,
                        p.product_type.as_str(),
                        p.program_code,
                        p.spec_code,
                        p.language,
                        p.revision,
                        p.title,
                        p.owner_id,
                        p.published,
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
impl Get<Product> for SqliteProductRepository {
    async fn get_one(&self, id: &IdentityOf<Product>) -> Result<Option<Product>, Self::Error> {
        let id = *id;
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {COLUMNS} FROM product WHERE id = ?1"))?;
                let mut p = stmt
                    .query_map(params![id], product_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(p.pop())
            })
            .await?)
    }
}

#[async_trait]
impl List<Product> for SqliteProductRepository {
    async fn list(&self) -> Result<Vec<Product>, Self::Error> {
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM product ORDER BY rowid"))?;
                let p = stmt
                    .query_map([], product_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(p)
            })
            .await?)
    }
}

#[async_trait]
impl Remove<Product> for SqliteProductRepository {
    async fn remove(&self, id: &IdentityOf<Product>) -> Result<(), Self::Error> {
        let id = *id;
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM product WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Select<Product, ByIdentity> for SqliteProductRepository {
    async fn select(&self, ByIdentity(identity): &ByIdentity) -> Result<Vec<Product>, Self::Error> {
        let identity = identity.clone();
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM product
                    WHERE product_type = ?1 AND program_code IS ?2 AND spec_code IS ?3 AND language IS ?4 AND revision IS ?5
                    ORDER BY rowid"
                ))?;
                let p = stmt
                    .query_map(
                        params![
                            identity.product_type.as_str(),
                            identity.program_code,
                            identity.spec_code,
                            identity.language,
                            identity.revision,
                        ],
                        product_from_row,
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(p)
            })
            .await?)
    }
}

impl ProductRepository for SqliteProductRepository {}

#[cfg(test)]
mod tests {
    use super::*;
    use syncdb_types::product::ProductIdentity;
    use uuid::Uuid;

    fn identity(language: Option<Uuid>) -> ProductIdentity {
        ProductIdentity {
            product_type: ProductType::Document,
            program_code: Some("J-STD-001".to_string()),
            spec_code: None,
            language,
            revision: None,
        }
    }

    #[tokio::test]
    async fn identity_lookup_treats_missing_components_as_equal() {
        let repo = SqliteProductRepository::init(Connection::open_in_memory().await.unwrap())
            .await
            .unwrap();
        let language = Uuid::new_v4();
        let mut product = Product::new(identity(Some(language)));
        product.title = "Requirements for Soldered Assemblies".to_string();
        product.details.pages = Some(80);
        repo.save(product.clone()).await.unwrap();
        repo.save(Product::new(identity(None))).await.unwrap();

        let found = repo.select(&ByIdentity(identity(Some(language)))).await.unwrap();
        assert_eq!(found, vec![product.clone()]);
        assert_eq!(repo.select(&ByIdentity(identity(None))).await.unwrap().len(), 1);
        assert!(repo
            .select(&ByIdentity(identity(Some(Uuid::new_v4()))))
            .await
            .unwrap()
            .is_empty());

        repo.remove(&product.id).await.unwrap();
        assert_eq!(repo.get_one(&product.id).await.unwrap(), None);
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }
}
