use chrono::{DateTime, TimeZone, Timelike, Utc};
use proptest::prelude::*;
use royalty_settlement::core::currency::{round2, CurrencyCode};
use royalty_settlement::core::party::{Company, CountryCode, Merchant};
use royalty_settlement::core::payout::{PayoutDocument, PayoutStatus};
use royalty_settlement::core::period::ReportingClock;
use royalty_settlement::core::report::{RoyaltyReport, RoyaltyReportStatus, RoyaltyReportSummary};
use royalty_settlement::core::rounding::{MoneyRounder, RoundingKey};
use royalty_settlement::jobs::period_normalizer::PeriodNormalizer;
use royalty_settlement::repository::memory::InMemoryStore;
use royalty_settlement::repository::{
    MerchantRepository, PayoutRepository, RepositoryError, RoyaltySummaryProvider,
};
use royalty_settlement::settlement::act::ActOfCompletionCalculator;
use std::sync::Arc;

/// Amounts in cents, up to ±1,000,000.00.
fn arb_cents() -> impl Strategy<Value = i64> {
    -100_000_000i64..100_000_000i64
}

fn cents(value: i64) -> f64 {
    value as f64 / 100.0
}

/// Instants between 2019 and 2023 with an arbitrary sub-second part.
fn arb_instant() -> impl Strategy<Value = DateTime<Utc>> {
    (1_546_300_800i64..1_672_531_200i64, prop_oneof![Just(0u32), 1u32..1_000_000_000u32])
        .prop_map(|(secs, nanos)| Utc.timestamp_opt(secs, nanos).single().unwrap())
}

fn arb_timezone() -> impl Strategy<Value = ReportingClock> {
    prop::sample::select(vec!["Europe/Moscow", "UTC", "America/New_York", "Asia/Kolkata"])
        .prop_map(|name| ReportingClock::from_name(name).unwrap())
}

struct Fixed {
    merchant: Merchant,
    gross: f64,
    fees: f64,
    vat: f64,
    correction: f64,
    reserve: f64,
}

impl MerchantRepository for Fixed {
    fn get_by_id(&self, id: &str) -> Result<Option<Merchant>, RepositoryError> {
        Ok((self.merchant.id == id).then(|| self.merchant.clone()))
    }
}

impl RoyaltySummaryProvider for Fixed {
    fn build(
        &self,
        _merchant: &Merchant,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<RoyaltyReportSummary, RepositoryError> {
        let mut s = RoyaltyReportSummary::empty(from, to);
        s.products_total.gross_total_amount = self.gross;
        s.products_total.total_fees = self.fees;
        s.products_total.total_vat = self.vat;
        s.totals.correction_amount = self.correction;
        s.totals.rolling_reserve_amount = self.reserve;
        Ok(s)
    }
}

fn report(id: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> RoyaltyReport {
    RoyaltyReport {
        id: id.into(),
        merchant_id: "m-1".into(),
        operating_company_id: "oc-1".into(),
        status: RoyaltyReportStatus::Accepted,
        created_at: to,
        summary: RoyaltyReportSummary::empty(from, to),
    }
}

fn payout(sources: Vec<String>) -> PayoutDocument {
    PayoutDocument {
        id: "p-1".into(),
        merchant_id: "m-1".into(),
        operating_company_id: "oc-1".into(),
        status: PayoutStatus::Pending,
        created_at: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
        currency: CurrencyCode::new("EUR"),
        source_id: sources,
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

proptest! {
    // Rounding an already-rounded amount changes nothing.
    #[test]
    fn rounding_is_idempotent(value in -1.0e9f64..1.0e9f64) {
        let rounder = MoneyRounder::default();
        let key = RoundingKey::new("m-1", "total_fees");
        let once = rounder.round(&key, value).unwrap();
        let twice = rounder.round(&key, once).unwrap();
        prop_assert_eq!(once, twice);
        prop_assert!((once - value).abs() <= 0.005 + 1e-6);
    }

    // Without correction or reserve the balance equals the fee total, and
    // both equal gross - fees - vat to the cent.
    #[test]
    fn settlement_identity_holds(
        gross in arb_cents(),
        fees in arb_cents(),
        vat in arb_cents(),
        correction in arb_cents(),
        reserve in arb_cents(),
    ) {
        let merchant = Merchant::new(
            "m-1",
            "Acme",
            CurrencyCode::new("EUR"),
            CountryCode::new("CY"),
        );
        let plain = Fixed {
            merchant,
            gross: cents(gross),
            fees: cents(fees),
            vat: cents(vat),
            correction: 0.0,
            reserve: 0.0,
        };
        let clock = ReportingClock::from_name("Europe/Moscow").unwrap();
        let rounder = Arc::new(MoneyRounder::default());
        let doc = ActOfCompletionCalculator::new(&plain, &plain, rounder, clock)
            .compute("m-1", "2021-01-01", "2021-01-31")
            .unwrap();
        prop_assert_eq!(doc.total_fees, doc.balance);
        prop_assert_eq!(doc.total_fees, cents(gross - fees - vat));

        let adjusted = Fixed {
            correction: cents(correction),
            reserve: cents(reserve),
            ..plain
        };
        let rounder = Arc::new(MoneyRounder::default());
        let doc = ActOfCompletionCalculator::new(&adjusted, &adjusted, rounder, clock)
            .compute("m-1", "2021-01-01", "2021-01-31")
            .unwrap();
        prop_assert_eq!(doc.total_fees, cents(gross - fees - vat + correction));
        prop_assert_eq!(doc.balance, round2(doc.total_fees - cents(reserve)));
    }

    // A second normalization pass finds nothing to change.
    #[test]
    fn period_normalization_is_idempotent(
        clock in arb_timezone(),
        from in arb_instant(),
        to in arb_instant(),
    ) {
        let store = InMemoryStore::default();
        store.insert_report(report("r-1", from, to));
        store.insert_payout(payout(vec!["r-1".into()]));

        PeriodNormalizer::new(&store, &store, clock).run().unwrap();
        let first = store.snapshot();
        let again = PeriodNormalizer::new(&store, &store, clock).run().unwrap();

        prop_assert_eq!(again.reports_updated, 0);
        prop_assert_eq!(again.payouts_updated, 0);
        let second = store.snapshot();
        prop_assert_eq!(&first, &second);

        let stored = &second.royalty_reports[0];
        if from.nanosecond() != 0 {
            prop_assert_eq!(stored.period_from(), clock.start_of_day(from).unwrap());
        } else {
            prop_assert_eq!(stored.period_from(), from);
        }
        if to.nanosecond() == 0 {
            prop_assert_eq!(stored.period_to().nanosecond(), 999_999_999);
        } else {
            prop_assert_eq!(stored.period_to(), to);
        }
    }

    // A payout's period spans exactly the earliest and latest day of the
    // reports it references.
    #[test]
    fn payout_period_spans_sources(
        periods in prop::collection::vec((arb_instant(), arb_instant()), 1..8),
    ) {
        let clock = ReportingClock::from_name("UTC").unwrap();
        let store = InMemoryStore::default();
        let mut ids = Vec::new();
        for (i, (a, b)) in periods.iter().enumerate() {
            let (from, to) = if a <= b { (*a, *b) } else { (*b, *a) };
            let id = format!("r-{}", i);
            store.insert_report(report(&id, from, to));
            ids.push(id);
        }
        store.insert_payout(payout(ids));

        PeriodNormalizer::new(&store, &store, clock).run().unwrap();

        let snapshot = store.snapshot();
        let mut days: Vec<String> = snapshot
            .royalty_reports
            .iter()
            .flat_map(|r| {
                [
                    r.summary.string_period_from.clone(),
                    r.summary.string_period_to.clone(),
                ]
            })
            .collect();
        days.sort();
        let payouts = store.find_all().unwrap();
        let stored = &payouts[0];
        prop_assert_eq!(&stored.string_period_from, &days[0]);
        prop_assert_eq!(&stored.string_period_to, days.last().unwrap());
    }
}
