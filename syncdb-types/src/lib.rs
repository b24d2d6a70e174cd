use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub mod attribute;
pub mod catalog;
pub mod job;
pub mod price_list;
pub mod product;
pub mod term;
pub mod variation;
pub mod watermark;

/// Owner assigned to every entity written by the importer
pub const SYSTEM_OWNER: u32 = 0;

pub const USD: &str = "USD";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, Display)]
#[display("{number} {currency_code}")]
pub struct Price {
    pub number: Decimal,
    pub currency_code: String,
}

impl Price {
    pub fn usd(number: Decimal) -> Self {
        Self {
            number,
            currency_code: USD.to_string(),
        }
    }
}

/// Diagnostic verbosity forwarded verbatim to the remote catalog
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Display)]
#[serde(transparent)]
pub struct LogLevel(pub u8);

impl FromStr for LogLevel {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}
