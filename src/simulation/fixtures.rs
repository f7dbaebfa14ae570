//! Random store generation.
//!
//! Produces a populated [`StoreSnapshot`] with the kinds of defects the batch
//! jobs repair: fractional start boundaries, whole-second end boundaries and
//! payouts whose displayed period is stale. Report weeks are laid out on
//! calendar days of the configured reporting clock.

use crate::config::SettlementConfig;
use crate::core::currency::{round2, CurrencyCode};
use crate::core::party::{Company, CountryCode, Merchant, OperatingCompany};
use crate::core::payout::{PayoutDocument, PayoutStatus};
use crate::core::period::ReportingClock;
use crate::core::report::{RoyaltyReport, RoyaltyReportStatus, RoyaltyReportSummary};
use crate::repository::memory::StoreSnapshot;
use chrono::{Duration, NaiveDate, Timelike, Utc};
use rand::Rng;
use uuid::Uuid;

/// Configuration for generating a random store.
#[derive(Debug, Clone)]
pub struct FixtureConfig {
    pub merchant_count: usize,
    /// Royalty reports per merchant; each covers one week.
    pub reports_per_merchant: usize,
    /// Reports folded into each payout.
    pub reports_per_payout: usize,
    pub countries: Vec<CountryCode>,
    /// First local day of the first week.
    pub first_day: NaiveDate,
    /// Clock the week boundaries are laid out in.
    pub clock: ReportingClock,
    pub max_gross: f64,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            merchant_count: 10,
            reports_per_merchant: 8,
            reports_per_payout: 4,
            countries: vec![CountryCode::new("CY"), CountryCode::new("DE"), CountryCode::new("US")],
            first_day: NaiveDate::from_ymd_opt(2020, 6, 1).unwrap_or_default(),
            clock: SettlementConfig::default().clock().unwrap_or_default(),
            max_gross: 50_000.0,
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Generate a random store. The first country hosts the operating company.
pub fn generate_random_store(config: &FixtureConfig) -> StoreSnapshot {
    let mut rng = rand::thread_rng();
    let mut snapshot = StoreSnapshot::default();

    let home = config
        .countries
        .first()
        .cloned()
        .unwrap_or_else(|| CountryCode::new("CY"));
    let operating = OperatingCompany::new(new_id(), format!("Opco {}", home), home);
    let currency = CurrencyCode::new("EUR");

    for m in 0..config.merchant_count {
        let country = if config.countries.is_empty() {
            operating.country.clone()
        } else {
            config.countries[rng.gen_range(0..config.countries.len())].clone()
        };
        let name = format!("MERCHANT-{:03}", m);
        let merchant = Merchant::new(new_id(), name, currency.clone(), country);

        let mut pending: Vec<RoyaltyReport> = Vec::new();
        for week in 0..config.reports_per_merchant {
            let first = config.first_day + Duration::weeks(week as i64);
            // Ends sit on a whole second, as the normalizer expects to find them.
            let (Ok(start), Ok(end)) = (
                config.clock.start_of_date(first),
                config.clock.end_of_date(first + Duration::days(6)),
            ) else {
                continue;
            };
            // Half the starts carry a millisecond part the normalizer must strip.
            let start = if rng.gen_bool(0.5) {
                start.with_nanosecond(rng.gen_range(1..1_000) * 1_000_000).unwrap_or(start)
            } else {
                start
            };

            let gross = round2(rng.gen_range(0.0..config.max_gross.max(1.0)));
            let fees = round2(gross * rng.gen_range(0.02..0.08));
            let vat = round2(gross * rng.gen_range(0.0..0.2));
            let correction = if rng.gen_bool(0.1) {
                round2(-rng.gen_range(0.0..gross * 0.05 + 1.0))
            } else {
                0.0
            };
            let reserve = round2(gross * 0.01);

            let mut summary = RoyaltyReportSummary::empty(start, end);
            summary.products_total.gross_total_amount = gross;
            summary.products_total.total_fees = fees;
            summary.products_total.total_vat = vat;
            summary.totals.payout_amount = round2(gross - fees - vat);
            summary.totals.fee_amount = fees;
            summary.totals.correction_amount = correction;
            summary.totals.rolling_reserve_amount = reserve;
            summary.totals.transactions_count = rng.gen_range(1..5_000);

            let report = RoyaltyReport {
                id: new_id(),
                merchant_id: merchant.id.clone(),
                operating_company_id: operating.id.clone(),
                status: RoyaltyReportStatus::Accepted,
                created_at: end + Duration::days(1),
                summary,
            };
            pending.push(report.clone());
            snapshot.royalty_reports.push(report);

            if pending.len() >= config.reports_per_payout.max(1) {
                snapshot.payouts.push(payout_for(&merchant, &operating, &pending));
                pending.clear();
            }
        }
        if !pending.is_empty() {
            snapshot.payouts.push(payout_for(&merchant, &operating, &pending));
        }
        snapshot.merchants.push(merchant);
    }

    snapshot.operating_companies.push(operating);
    snapshot
}

fn payout_for(
    merchant: &Merchant,
    operating: &OperatingCompany,
    reports: &[RoyaltyReport],
) -> PayoutDocument {
    let total_fees: f64 = reports
        .iter()
        .map(|r| r.totals().payout_amount + r.totals().correction_amount)
        .sum();
    let reserve: f64 = reports
        .iter()
        .map(|r| r.totals().rolling_reserve_amount)
        .sum();
    let balance = total_fees - reserve;
    let created_at = reports
        .last()
        .map(|r| r.created_at)
        .unwrap_or_else(Utc::now);

    PayoutDocument {
        id: new_id(),
        merchant_id: merchant.id.clone(),
        operating_company_id: operating.id.clone(),
        status: PayoutStatus::Pending,
        created_at,
        currency: merchant.currency.clone(),
        source_id: reports.iter().map(|r| r.id.clone()).collect(),
        // Left blank; the period normalizer fills these in.
        string_period_from: String::new(),
        string_period_to: String::new(),
        total_fees: round2(total_fees),
        balance: round2(balance),
        b2b_vat_rate: 0.0,
        b2b_vat_base: 0.0,
        b2b_vat_amount: 0.0,
        fees_excluding_vat: 0.0,
        company: Company {
            name: merchant.company.name.clone(),
            country: merchant.company.country.clone(),
        },
    }
}
