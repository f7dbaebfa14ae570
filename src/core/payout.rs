use crate::core::currency::CurrencyCode;
use crate::core::party::Company;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    #[default]
    Pending,
    InProgress,
    Paid,
    Canceled,
    Failed,
}

/// A disbursement aggregating one or more royalty reports.
///
/// The displayed period spans the earliest and latest string periods of the
/// constituent reports. In post-VAT jurisdictions `balance` is net of
/// `b2b_vat_amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutDocument {
    pub id: String,
    pub merchant_id: String,
    pub operating_company_id: String,
    #[serde(default)]
    pub status: PayoutStatus,
    pub created_at: DateTime<Utc>,
    pub currency: CurrencyCode,
    /// Ids of the constituent royalty reports, in payout order.
    #[serde(default)]
    pub source_id: Vec<String>,
    #[serde(default)]
    pub string_period_from: String,
    #[serde(default)]
    pub string_period_to: String,
    pub total_fees: f64,
    pub balance: f64,
    #[serde(default)]
    pub b2b_vat_rate: f64,
    #[serde(default)]
    pub b2b_vat_base: f64,
    #[serde(default)]
    pub b2b_vat_amount: f64,
    #[serde(default)]
    pub fees_excluding_vat: f64,
    pub company: Company,
}

/// Query for [`crate::repository::PayoutRepository::find`]. Unset fields match
/// everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayoutFilter {
    pub operating_company_id: Option<String>,
    pub statuses: Vec<PayoutStatus>,
    pub created_from: Option<DateTime<Utc>>,
}

impl PayoutFilter {
    pub fn matches(&self, payout: &PayoutDocument) -> bool {
        if let Some(oc) = &self.operating_company_id {
            if &payout.operating_company_id != oc {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&payout.status) {
            return false;
        }
        match self.created_from {
            Some(from) => payout.created_at >= from,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::party::CountryCode;
    use chrono::TimeZone;

    fn payout(status: PayoutStatus, day: u32) -> PayoutDocument {
        PayoutDocument {
            id: "p-1".into(),
            merchant_id: "m-1".into(),
            operating_company_id: "oc-1".into(),
            status,
            created_at: Utc.with_ymd_and_hms(2021, 3, day, 0, 0, 0).unwrap(),
            currency: CurrencyCode::new("EUR"),
            source_id: vec![],
            string_period_from: String::new(),
            string_period_to: String::new(),
            total_fees: 0.0,
            balance: 0.0,
            b2b_vat_rate: 0.0,
            b2b_vat_base: 0.0,
            b2b_vat_amount: 0.0,
            fees_excluding_vat: 0.0,
            company: Company {
                name: "Acme".into(),
                country: CountryCode::new("CY"),
            },
        }
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert!(PayoutFilter::default().matches(&payout(PayoutStatus::Paid, 1)));
    }

    #[test]
    fn test_filter_by_status_and_date() {
        let filter = PayoutFilter {
            operating_company_id: Some("oc-1".into()),
            statuses: vec![PayoutStatus::Pending],
            created_from: Some(Utc.with_ymd_and_hms(2021, 3, 10, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        assert!(filter.matches(&payout(PayoutStatus::Pending, 10)));
        assert!(!filter.matches(&payout(PayoutStatus::Pending, 9)));
        assert!(!filter.matches(&payout(PayoutStatus::Paid, 15)));
    }
}
