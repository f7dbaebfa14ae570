use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fractional digits used when a currency has no entry in the minor-unit table.
pub const DEFAULT_PRECISION: u32 = 2;

/// ISO 4217-style currency code.
///
/// # Examples
///
/// ```
/// use royalty_settlement::core::currency::CurrencyCode;
///
/// let eur = CurrencyCode::new("eur");
/// assert_eq!(eur.as_str(), "EUR");
/// assert_eq!(eur.precision(), 2);
/// assert_eq!(CurrencyCode::new("JPY").precision(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of fractional digits amounts in this currency are settled with.
    pub fn precision(&self) -> u32 {
        match self.0.as_str() {
            "BIF" | "CLP" | "DJF" | "GNF" | "ISK" | "JPY" | "KMF" | "KRW" | "PYG" | "RWF"
            | "UGX" | "VND" | "VUV" | "XAF" | "XOF" | "XPF" => 0,
            "BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" | "TND" => 3,
            _ => DEFAULT_PRECISION,
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// An amount paired with the currency it is denominated in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyValue {
    pub amount: Decimal,
    pub currency: CurrencyCode,
}

impl MoneyValue {
    pub fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// Build from a float amount. Returns `None` for non-finite or
    /// out-of-range values.
    pub fn from_f64(amount: f64, currency: CurrencyCode) -> Option<Self> {
        decimal_from_f64(amount).map(|amount| Self { amount, currency })
    }

    /// The amount rounded half away from zero to the currency's precision.
    pub fn rounded(&self) -> Self {
        let precision = self.currency.precision();
        Self {
            amount: self
                .amount
                .round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero),
            currency: self.currency.clone(),
        }
    }
}

impl fmt::Display for MoneyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self.rounded();
        write!(
            f,
            "{:.prec$} {}",
            rounded.amount,
            self.currency,
            prec = self.currency.precision() as usize
        )
    }
}

/// Convert a float through its shortest round-trip decimal rendering, so
/// `2.675_f64` becomes `2.675` rather than the binary expansion
/// `2.67499999999999982236431605997495353221893310546875`.
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string()).ok()
}

/// Inverse of [`decimal_from_f64`].
pub fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_string().parse::<f64>().unwrap_or(0.0)
}

/// Plain half-away-from-zero rounding of a float to `dp` places.
///
/// Non-finite and out-of-range inputs are returned unchanged.
pub fn round_to(value: f64, dp: u32) -> f64 {
    match decimal_from_f64(value) {
        Some(d) => {
            decimal_to_f64(d.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
        }
        None => value,
    }
}

/// Round a float to two decimal places.
pub fn round2(value: f64) -> f64 {
    round_to(value, 2)
}
