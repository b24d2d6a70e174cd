use typesafe_repository::async_ops::{Save, Select};
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;
use typesafe_repository::{SelectBy, Selector};
use uuid::Uuid;

pub const FORMAT_ATTRIBUTE: &str = "format";

#[derive(Id, Clone, Debug, PartialEq, Eq)]
pub struct AttributeValue {
    #[id]
    pub id: Uuid,
    pub attribute: String,
    pub name: String,
}

impl AttributeValue {
    pub fn new(attribute: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            attribute: attribute.into(),
            name: name.into(),
        }
    }
}

pub struct ByAttributeName {
    pub attribute: String,
    pub name: String,
}

impl ByAttributeName {
    pub fn format(name: impl Into<String>) -> Self {
        Self {
            attribute: FORMAT_ATTRIBUTE.to_string(),
            name: name.into(),
        }
    }
}

impl Selector for ByAttributeName {}
impl SelectBy<ByAttributeName> for AttributeValue {}

pub trait AttributeValueRepository:
    Repository<AttributeValue, Error = anyhow::Error>
    + Save<AttributeValue>
    + Select<AttributeValue, ByAttributeName>
    + Send
    + Sync
{
}
