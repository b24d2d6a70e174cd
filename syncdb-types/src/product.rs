use crate::term::Term;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use typesafe_repository::async_ops::{Get, List, Remove, Save, Select};
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;
use typesafe_repository::{SelectBy, Selector};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum ProductType {
    #[display("document")]
    Document,
    #[display("kit")]
    Kit,
    #[display("service")]
    Service,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Kit => "kit",
            Self::Service => "service",
        }
    }
}

impl FromStr for ProductType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(Self::Document),
            "kit" => Ok(Self::Kit),
            "service" => Ok(Self::Service),
            _ => Err(anyhow::anyhow!("Unknown product type {s}")),
        }
    }
}

/// Fields a local product is looked up by
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProductIdentity {
    pub product_type: ProductType,
    pub program_code: Option<String>,
    pub spec_code: Option<String>,
    pub language: Option<IdentityOf<Term>>,
    pub revision: Option<IdentityOf<Term>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ProductDetails {
    pub body: Option<String>,
    pub year: Option<IdentityOf<Term>>,
    pub published_date: Option<String>,
    pub ansi_approved: bool,
    pub dod_adopted: bool,
    pub isbn: Option<String>,
    pub pages: Option<u32>,
    pub table_of_contents: Option<String>,
    pub sample_pages_url: Option<String>,
    pub toc_url: Option<String>,
    /// Variation of the product superseding this one
    pub later_revision: Option<Uuid>,
    pub document_number: Option<IdentityOf<Term>>,
}

#[derive(Id, Clone, Debug, PartialEq, Eq)]
pub struct Product {
    #[id]
    pub id: Uuid,
    pub product_type: ProductType,
    pub program_code: Option<String>,
    pub spec_code: Option<String>,
    pub language: Option<IdentityOf<Term>>,
    pub revision: Option<IdentityOf<Term>>,
    pub title: String,
    pub owner_id: u32,
    pub published: bool,
    pub details: ProductDetails,
}

impl Product {
    pub fn new(
        ProductIdentity {
            product_type,
            program_code,
            spec_code,
            language,
            revision,
        }: ProductIdentity,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_type,
            program_code,
            spec_code,
            language,
            revision,
            title: String::new(),
            owner_id: crate::SYSTEM_OWNER,
            published: false,
            details: ProductDetails::default(),
        }
    }

    pub fn identity(&self) -> ProductIdentity {
        ProductIdentity {
            product_type: self.product_type,
            program_code: self.program_code.clone(),
            spec_code: self.spec_code.clone(),
            language: self.language,
            revision: self.revision,
        }
    }
}

pub struct ByIdentity(pub ProductIdentity);

impl Selector for ByIdentity {}
impl SelectBy<ByIdentity> for Product {}

pub trait ProductRepository:
    Repository<Product, Error = anyhow::Error>
    + Get<Product>
    + Save<Product>
    + List<Product>
    + Remove<Product>
    + Select<Product, ByIdentity>
    + Send
    + Sync
{
}
