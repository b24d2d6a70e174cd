use derive_more::Display;
use std::str::FromStr;
use typesafe_repository::async_ops::{Get, Save, Select};
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;
use typesafe_repository::{SelectBy, Selector};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum Vocabulary {
    #[display("languages")]
    Languages,
    #[display("years")]
    Years,
    #[display("revisions")]
    Revisions,
    #[display("document_numbers")]
    DocumentNumbers,
}

impl Vocabulary {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Languages => "languages",
            Self::Years => "years",
            Self::Revisions => "revisions",
            Self::DocumentNumbers => "document_numbers",
        }
    }
}

impl FromStr for Vocabulary {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "languages" => Ok(Self::Languages),
            "years" => Ok(Self::Years),
            "revisions" => Ok(Self::Revisions),
            "document_numbers" => Ok(Self::DocumentNumbers),
            _ => Err(anyhow::anyhow!("Unknown vocabulary {s}")),
        }
    }
}

#[derive(Id, Clone, Debug, PartialEq, Eq)]
pub struct Term {
    #[id]
    pub id: Uuid,
    pub vocabulary: Vocabulary,
    pub name: String,
    pub program_code: Option<String>,
}

impl Term {
    pub fn new(vocabulary: Vocabulary, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            vocabulary,
            name: name.into(),
            program_code: None,
        }
    }
}

pub struct ByName {
    pub vocabulary: Vocabulary,
    pub name: String,
}

pub struct ByProgramCode {
    pub vocabulary: Vocabulary,
    pub program_code: String,
}

impl Selector for ByName {}
impl SelectBy<ByName> for Term {}

impl Selector for ByProgramCode {}
impl SelectBy<ByProgramCode> for Term {}

pub trait TermRepository:
    Repository<Term, Error = anyhow::Error>
    + Get<Term>
    + Save<Term>
    + Select<Term, ByName>
    + Select<Term, ByProgramCode>
    + Send
    + Sync
{
}
