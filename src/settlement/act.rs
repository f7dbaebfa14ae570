use crate::core::currency::round2;
use crate::core::period::{PeriodError, ReportingClock};
use crate::core::rounding::{MoneyRounder, RoundingError, RoundingKey};
use crate::repository::{MerchantRepository, RepositoryError, RoyaltySummaryProvider};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub const FIELD_GROSS_TOTAL_AMOUNT: &str = "gross_total_amount";
pub const FIELD_TOTAL_FEES: &str = "total_fees";
pub const FIELD_TOTAL_VAT: &str = "total_vat";

/// Point-in-time settlement statement for a merchant. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActOfCompletionDocument {
    pub merchant_id: String,
    pub total_fees: f64,
    pub balance: f64,
    pub total_transactions: u64,
}

impl std::fmt::Display for ActOfCompletionDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Act of Completion ===")?;
        writeln!(f, "Merchant:      {}", self.merchant_id)?;
        writeln!(f, "Total fees:    {:.2}", self.total_fees)?;
        writeln!(f, "Balance:       {:.2}", self.balance)?;
        writeln!(f, "Transactions:  {}", self.total_transactions)
    }
}

#[derive(Debug, Error)]
pub enum ActError {
    #[error("date_from: {0}")]
    InvalidDateFrom(PeriodError),
    #[error("date_to: {0}")]
    InvalidDateTo(PeriodError),
    #[error("date_from {from} is after date_to {to}")]
    InvalidDateRange { from: String, to: String },
    #[error("merchant '{0}' not found")]
    InvalidMerchant(String),
    #[error(transparent)]
    Rounding(#[from] RoundingError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ActError {
    /// Caller mistakes, reported as bad data rather than system failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ActError::InvalidDateFrom(_)
                | ActError::InvalidDateTo(_)
                | ActError::InvalidDateRange { .. }
                | ActError::InvalidMerchant(_)
        )
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ActError::InvalidDateFrom(_) => "invalid_date_from",
            ActError::InvalidDateTo(_) => "invalid_date_to",
            ActError::InvalidDateRange { .. } => "invalid_date_range",
            ActError::InvalidMerchant(_) => "invalid_merchant",
            ActError::Rounding(_) => "rounding_failed",
            ActError::Repository(_) => "repository_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActOfCompletionRequest {
    pub date_from: String,
    pub date_to: String,
    pub merchant_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    BadData,
    SystemError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActOfCompletionResponse {
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<ResponseMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<ActOfCompletionDocument>,
}

/// Derives settlement figures for a merchant over an arbitrary date window.
///
/// Base quantities go through the keyed [`MoneyRounder`]; the derived totals
/// are then rounded a second time with plain two-place rounding. Both passes
/// are required: the second removes float residue picked up by the
/// subtraction chain.
pub struct ActOfCompletionCalculator<'a> {
    merchants: &'a dyn MerchantRepository,
    summaries: &'a dyn RoyaltySummaryProvider,
    rounder: Arc<MoneyRounder>,
    clock: ReportingClock,
}

impl<'a> ActOfCompletionCalculator<'a> {
    pub fn new(
        merchants: &'a dyn MerchantRepository,
        summaries: &'a dyn RoyaltySummaryProvider,
        rounder: Arc<MoneyRounder>,
        clock: ReportingClock,
    ) -> Self {
        Self {
            merchants,
            summaries,
            rounder,
            clock,
        }
    }

    pub fn rounder(&self) -> &MoneyRounder {
        &self.rounder
    }

    pub fn compute(
        &self,
        merchant_id: &str,
        date_from: &str,
        date_to: &str,
    ) -> Result<ActOfCompletionDocument, ActError> {
        let from_date = ReportingClock::parse_date(date_from).map_err(ActError::InvalidDateFrom)?;
        let to_date = ReportingClock::parse_date(date_to).map_err(ActError::InvalidDateTo)?;

        let from = self
            .clock
            .start_of_date(from_date)
            .map_err(ActError::InvalidDateFrom)?;
        let to = self.clock.end_of_date(to_date).map_err(ActError::InvalidDateTo)?;
        if from > to {
            return Err(ActError::InvalidDateRange {
                from: date_from.to_string(),
                to: date_to.to_string(),
            });
        }

        let merchant = self
            .merchants
            .get_by_id(merchant_id)?
            .ok_or_else(|| ActError::InvalidMerchant(merchant_id.to_string()))?;

        let report = self.summaries.build(&merchant, from, to)?;

        let round = |field: &str, value: f64| {
            self.rounder
                .round(&RoundingKey::new(&merchant.id, field), value)
        };
        let products = &report.products_total;
        let gross_total_amount = round(FIELD_GROSS_TOTAL_AMOUNT, products.gross_total_amount)?;
        let total_fees = round(FIELD_TOTAL_FEES, products.total_fees)?;
        let total_vat = round(FIELD_TOTAL_VAT, products.total_vat)?;

        let totals = &report.totals;
        let payout_amount = gross_total_amount - total_fees - total_vat;
        let total_fees_amount = payout_amount + totals.correction_amount;
        let balance_amount =
            payout_amount + totals.correction_amount - totals.rolling_reserve_amount;

        debug!(
            "act of completion for {} [{} .. {}]: payout {} fees {} balance {}",
            merchant.id, from, to, payout_amount, total_fees_amount, balance_amount
        );

        Ok(ActOfCompletionDocument {
            merchant_id: merchant.id,
            total_fees: round2(total_fees_amount),
            balance: round2(balance_amount),
            total_transactions: totals.transactions_count,
        })
    }

    /// Serve a request, folding every outcome into a response envelope.
    pub fn handle(&self, request: &ActOfCompletionRequest) -> ActOfCompletionResponse {
        match self.compute(&request.merchant_id, &request.date_from, &request.date_to) {
            Ok(item) => ActOfCompletionResponse {
                status: ResponseStatus::Ok,
                message: None,
                item: Some(item),
            },
            Err(e) => {
                let status = if e.is_validation() {
                    warn!("rejected act of completion request {:?}: {}", request, e);
                    ResponseStatus::BadData
                } else {
                    error!("act of completion failed for {}: {}", request.merchant_id, e);
                    ResponseStatus::SystemError
                };
                ActOfCompletionResponse {
                    status,
                    message: Some(ResponseMessage {
                        code: e.code().to_string(),
                        message: e.to_string(),
                    }),
                    item: None,
                }
            }
        }
    }
}
