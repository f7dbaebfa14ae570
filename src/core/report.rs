use crate::core::period::ReportingClock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Product-level sums over a reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductsTotal {
    pub gross_total_amount: f64,
    pub total_fees: f64,
    pub total_vat: f64,
}

/// Settlement totals derived from the product sums.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportTotals {
    pub correction_amount: f64,
    pub rolling_reserve_amount: f64,
    pub transactions_count: u64,
    pub payout_amount: f64,
    pub fee_amount: f64,
    #[serde(default)]
    pub b2b_vat_rate: f64,
    #[serde(default)]
    pub b2b_vat_base: f64,
    #[serde(default)]
    pub b2b_vat_amount: f64,
    #[serde(default)]
    pub final_payout_amount: f64,
}

/// Aggregated figures for one merchant over one period.
///
/// `period_from <= period_to`; the string forms are `YYYY-MM-DD`
/// renderings of the boundaries in the reporting timezone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoyaltyReportSummary {
    pub products_total: ProductsTotal,
    pub totals: ReportTotals,
    pub period_from: DateTime<Utc>,
    pub period_to: DateTime<Utc>,
    #[serde(default)]
    pub string_period_from: String,
    #[serde(default)]
    pub string_period_to: String,
}

impl RoyaltyReportSummary {
    pub fn empty(period_from: DateTime<Utc>, period_to: DateTime<Utc>) -> Self {
        Self {
            products_total: ProductsTotal::default(),
            totals: ReportTotals::default(),
            period_from,
            period_to,
            string_period_from: String::new(),
            string_period_to: String::new(),
        }
    }

    /// Fold another period's figures into this one.
    pub fn absorb(&mut self, other: &RoyaltyReportSummary) {
        let p = &mut self.products_total;
        p.gross_total_amount += other.products_total.gross_total_amount;
        p.total_fees += other.products_total.total_fees;
        p.total_vat += other.products_total.total_vat;

        let t = &mut self.totals;
        t.correction_amount += other.totals.correction_amount;
        t.rolling_reserve_amount += other.totals.rolling_reserve_amount;
        t.transactions_count += other.totals.transactions_count;
        t.payout_amount += other.totals.payout_amount;
        t.fee_amount += other.totals.fee_amount;
        t.b2b_vat_base += other.totals.b2b_vat_base;
        t.b2b_vat_amount += other.totals.b2b_vat_amount;
        t.final_payout_amount += other.totals.final_payout_amount;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoyaltyReportStatus {
    #[default]
    Pending,
    Accepted,
    Disputed,
    Paid,
}

/// A persisted per-merchant, per-period royalty report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoyaltyReport {
    pub id: String,
    pub merchant_id: String,
    pub operating_company_id: String,
    #[serde(default)]
    pub status: RoyaltyReportStatus,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub summary: RoyaltyReportSummary,
}

impl RoyaltyReport {
    pub fn period_from(&self) -> DateTime<Utc> {
        self.summary.period_from
    }

    pub fn period_to(&self) -> DateTime<Utc> {
        self.summary.period_to
    }

    pub fn totals(&self) -> &ReportTotals {
        &self.summary.totals
    }

    /// True when the report's period falls on the reporting days spanned by
    /// `[from, to]`. Compared by local calendar day, so a stored end of
    /// 23:59:59.999999999 still counts toward a window closing at 23:59:59.
    pub fn within(&self, clock: &ReportingClock, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        clock.local_date(self.summary.period_from) >= clock.local_date(from)
            && clock.local_date(self.summary.period_to) <= clock.local_date(to)
    }
}
