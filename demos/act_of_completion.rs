//! Act of completion example.
//!
//! Shows how raw float totals become reproducible settlement figures, and
//! how caller mistakes come back as bad-data responses.

use chrono::{TimeZone, Utc};
use royalty_settlement::core::currency::{CurrencyCode, MoneyValue};
use royalty_settlement::core::party::{CountryCode, Merchant};
use royalty_settlement::core::period::ReportingClock;
use royalty_settlement::core::report::{RoyaltyReport, RoyaltyReportStatus, RoyaltyReportSummary};
use royalty_settlement::core::rounding::{MoneyRounder, RoundingKey, RoundingPolicy};
use royalty_settlement::repository::memory::{InMemoryStore, ReportSummaryAggregator};
use royalty_settlement::settlement::act::{
    ActOfCompletionCalculator, ActOfCompletionRequest, FIELD_TOTAL_FEES,
};
use rust_decimal_macros::dec;
use std::sync::Arc;

fn weekly_report(id: &str, day: u32, gross: f64, fees: f64, vat: f64) -> RoyaltyReport {
    // Moscow midnight is 21:00 UTC the previous day.
    let from = Utc.with_ymd_and_hms(2021, 2, day, 21, 0, 0).unwrap();
    let to = Utc.with_ymd_and_hms(2021, 2, day + 7, 20, 59, 59).unwrap();
    let mut summary = RoyaltyReportSummary::empty(from, to);
    summary.products_total.gross_total_amount = gross;
    summary.products_total.total_fees = fees;
    summary.products_total.total_vat = vat;
    summary.totals.transactions_count = 120;
    RoyaltyReport {
        id: id.into(),
        merchant_id: "m-acme".into(),
        operating_company_id: "oc-cy".into(),
        status: RoyaltyReportStatus::Accepted,
        created_at: to,
        summary,
    }
}

fn main() {
    println!("╔══════════════════════════════════════════════╗");
    println!("║  royalty-settlement: Act of Completion       ║");
    println!("╚══════════════════════════════════════════════╝\n");

    let store = InMemoryStore::default();
    store.insert_merchant(Merchant::new(
        "m-acme",
        "Acme Games",
        CurrencyCode::new("EUR"),
        CountryCode::new("CY"),
    ));
    // Float sums as they come out of transaction aggregation.
    store.insert_report(weekly_report("r-1", 1, 1000.1 + 0.2, 70.015, 190.004));
    store.insert_report(weekly_report("r-2", 8, 2500.3, 175.021, 475.057));

    let clock = ReportingClock::from_name("Europe/Moscow").unwrap();
    let summaries = ReportSummaryAggregator::new(&store, clock);
    let policy =
        RoundingPolicy::new(2).with_override(RoundingKey::new("m-acme", FIELD_TOTAL_FEES), 3);
    let rounder = Arc::new(MoneyRounder::new(Arc::new(policy)));
    let calculator = ActOfCompletionCalculator::new(&store, &summaries, rounder, clock);

    // --- Scenario 1: a valid window ---
    println!("━━━ Scenario 1: February 2021 ━━━\n");
    let doc = calculator.compute("m-acme", "2021-02-02", "2021-02-28").unwrap();
    print!("{}", doc);
    let payable = MoneyValue::from_f64(doc.balance, CurrencyCode::new("EUR")).unwrap();
    println!("Payable:       {}", payable);
    println!("Rounding slots cached: {}\n", calculator.rounder().cached_len());

    // --- Scenario 2: caller mistakes ---
    println!("━━━ Scenario 2: Rejected requests ━━━\n");
    let requests = [
        ("2021-02-30", "2021-03-01", "m-acme"),
        ("2021-03-01", "2021-02-01", "m-acme"),
        ("2021-02-01", "2021-02-28", "m-unknown"),
    ];
    for (from, to, merchant) in requests {
        let response = calculator.handle(&ActOfCompletionRequest {
            date_from: from.into(),
            date_to: to.into(),
            merchant_id: merchant.into(),
        });
        let message = response.message.unwrap();
        println!("{:?}: {} ({})", response.status, message.code, message.message);
    }

    // --- Scenario 3: currency precision ---
    println!("\n━━━ Scenario 3: Minor units per currency ━━━\n");
    let samples = [
        (dec!(1234.5), "JPY"),
        (dec!(1234.5678), "EUR"),
        (dec!(1.23456), "KWD"),
    ];
    for (amount, code) in samples {
        let value = MoneyValue::new(amount, CurrencyCode::new(code));
        println!("{:>14} → {}", value.to_string(), value.rounded());
    }
}
