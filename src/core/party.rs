use crate::core::currency::CurrencyCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ISO 3166-1 alpha-2 country code.
///
/// # Examples
///
/// ```
/// use royalty_settlement::core::party::CountryCode;
///
/// assert_eq!(CountryCode::new("cy"), CountryCode::new("CY"));
/// ```
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CountryCode(String);

impl CountryCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CountryCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Legal entity details of a merchant, as copied onto payout documents.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    pub country: CountryCode,
}

/// A merchant receiving royalty payouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Merchant {
    pub id: String,
    pub name: String,
    pub currency: CurrencyCode,
    pub company: Company,
}

impl Merchant {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        currency: CurrencyCode,
        country: CountryCode,
    ) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            company: Company {
                name: name.clone(),
                country,
            },
            name,
            currency,
        }
    }
}

/// The legal entity that contracts with merchants and issues payouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingCompany {
    pub id: String,
    pub name: String,
    pub country: CountryCode,
}

impl OperatingCompany {
    pub fn new(id: impl Into<String>, name: impl Into<String>, country: CountryCode) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            country,
        }
    }
}
