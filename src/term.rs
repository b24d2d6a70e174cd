use async_trait::async_trait;
use rusqlite::params;
use rusqlite::types::Type;
use std::str::FromStr;
use syncdb_types::term::{ByName, ByProgramCode, Term, TermRepository, Vocabulary};
use tokio_rusqlite::Connection;
use typesafe_repository::async_ops::{Get, Save, Select};
use typesafe_repository::prelude::*;

pub struct SqliteTermRepository {
    conn: Connection,
}

impl SqliteTermRepository {
    pub async fn init(conn: Connection) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS term (
                    id BLOB PRIMARY KEY,
                    vocabulary TEXT NOT NULL,
                    name TEXT NOT NULL,
                    program_code TEXT
                )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS term_name ON term (vocabulary, name)",
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
        vocabulary: Vocabulary,
        value: String,
    ) -> Result<Vec<Term>, anyhow::Error> {
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT id, vocabulary, name, program_code FROM term
                    WHERE vocabulary = ?1 AND {condition} ORDER BY rowid"
                ))?;
                let t = stmt
                    .query_map(params![vocabulary.as_str(), value], term_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(t)
            })
            .await?)
    }
}

fn term_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Term> {
    Ok(Term {
        id: row.get(0)?,
        vocabulary: Vocabulary::from_str(&row.get::<_, String>(1)?).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(1, Type::Text, err.into())
        })?,
        name: row.get(2)?,
        program_code: row.get(3)?,
    })
}

impl Repository<Term> for SqliteTermRepository {
    type Error = anyhow::Error;
}

#[async_trait]
impl Save<Term> for SqliteTermRepository {
    async fn save(&self, t: Term) -> Result<(), Self::Error> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO term (id, vocabulary, name, program_code) VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(id) DO UPDATE SET vocabulary=?2, name=?3, program_code=?4",
                    params![t.id, t.vocabulary.as_str(), t.name, t.program_code],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Get<Term> for SqliteTermRepository {
    async fn get_one(&self, id: &IdentityOf<Term>) -> Result<Option<Term>, Self::Error> {
        let id = *id;
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare("SELECT id, vocabulary, name, program_code FROM term WHERE id = ?1")?;
                let mut t = stmt
                    .query_map(params![id], term_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(t.pop())
            })
            .await?)
    }
}

#[async_trait]
impl Select<Term, ByName> for SqliteTermRepository {
    async fn select(&self, s: &ByName) -> Result<Vec<Term>, Self::Error> {
        self.select_where("name = ?2", s.vocabulary, s.name.clone())
            .await
    }
}

#[async_trait]
impl Select<Term, ByProgramCode> for SqliteTermRepository {
    async fn select(&self, s: &ByProgramCode) -> Result<Vec<Term>, Self::Error> {
        self.select_where("program_code = ?2", s.vocabulary, s.program_code.clone())
            .await
    }
}

impl TermRepository for SqliteTermRepository {}
