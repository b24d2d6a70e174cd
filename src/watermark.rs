use async_trait::async_trait;
use rusqlite::params;
use syncdb_types::watermark::WatermarkStore;
use time::OffsetDateTime;
use tokio_rusqlite::Connection;

/// Key-value state table holding the poll watermark
pub struct SqliteStateRepository {
    conn: Connection,
    key: String,
}

impl SqliteStateRepository {
    pub async fn init(conn: Connection, key: impl Into<String>) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS state (
                    key TEXT PRIMARY KEY,
                    value INTEGER NOT NULL
                )",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self {
            conn,
            key: key.into(),
        })
    }
}

#[async_trait]
impl WatermarkStore for SqliteStateRepository {
    async fn last_run(&self) -> Result<Option<OffsetDateTime>, anyhow::Error> {
        let key = self.key.clone();
        let timestamp: Option<i64> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT value FROM state WHERE key = ?1")?;
                let mut v = stmt
                    .query_map(params![key], |row| row.get(0))?
                    .collect::<Result<Vec<i64>, _>>()?;
                Ok(v.pop())
            })
            .await?;
        Ok(timestamp
            .map(OffsetDateTime::from_unix_timestamp)
            .transpose()?)
    }

    async fn set_last_run(&self, at: OffsetDateTime) -> Result<(), anyhow::Error> {
        let key = self.key.clone();
        let timestamp = at.unix_timestamp();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO state (key, value) VALUES (?1, ?2)
                    ON CONFLICT(key) DO UPDATE SET value=?2",
                    params![key, timestamp],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[tokio::test]
    async fn stores_last_run_per_key() {
        let conn = Connection::open_in_memory().await.unwrap();
        let store = SqliteStateRepository::init(conn.clone(), "importer").await.unwrap();
        let other = SqliteStateRepository::init(conn, "exporter").await.unwrap();
        assert_eq!(store.last_run().await.unwrap(), None);

        store.set_last_run(datetime!(2024-05-01 10:00 UTC)).await.unwrap();
        store.set_last_run(datetime!(2024-05-02 11:30:15 UTC)).await.unwrap();
        assert_eq!(
            store.last_run().await.unwrap(),
            Some(datetime!(2024-05-02 11:30:15 UTC))
        );
        assert_eq!(other.last_run().await.unwrap(), None);
    }
}
