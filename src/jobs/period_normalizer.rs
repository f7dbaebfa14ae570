//! Repairs royalty-report period boundaries and re-derives payout periods.
//!
//! A report's `period_from` is corrected when it carries a sub-second part;
//! its `period_to` is corrected when it does NOT. Normalized starts sit at
//! exactly 00:00:00 and normalized ends at 23:59:59.999999999 local time, so
//! a second run finds nothing to change.

use crate::core::payout::PayoutDocument;
use crate::core::period::{has_subsecond, PeriodError, ReportingClock};
use crate::core::report::RoyaltyReport;
use crate::repository::{
    AuditSource, PayoutRepository, RepositoryError, RoyaltyReportRepository, SYSTEM_ACTOR_IP,
};
use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("royalty report '{id}': {source}")]
    Period {
        id: String,
        #[source]
        source: PeriodError,
    },
}

/// Counters describing one normalization run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationReport {
    pub reports_scanned: usize,
    pub reports_updated: usize,
    pub payouts_scanned: usize,
    pub payouts_updated: usize,
    /// Payouts with no source ids, or none that resolve.
    pub payouts_skipped: usize,
    /// Source ids that referenced no known report.
    pub missing_references: usize,
    pub dry_run: bool,
}

impl std::fmt::Display for NormalizationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = if self.dry_run { " (dry run)" } else { "" };
        writeln!(f, "=== Period Normalization{} ===", mode)?;
        writeln!(
            f,
            "Reports:  {} scanned, {} updated",
            self.reports_scanned, self.reports_updated
        )?;
        writeln!(
            f,
            "Payouts:  {} scanned, {} updated, {} skipped",
            self.payouts_scanned, self.payouts_updated, self.payouts_skipped
        )?;
        writeln!(f, "Missing report references: {}", self.missing_references)
    }
}

pub struct PeriodNormalizer<'a> {
    reports: &'a dyn RoyaltyReportRepository,
    payouts: &'a dyn PayoutRepository,
    clock: ReportingClock,
    dry_run: bool,
}

impl<'a> PeriodNormalizer<'a> {
    pub fn new(
        reports: &'a dyn RoyaltyReportRepository,
        payouts: &'a dyn PayoutRepository,
        clock: ReportingClock,
    ) -> Self {
        Self {
            reports,
            payouts,
            clock,
            dry_run: false,
        }
    }

    /// Compute every change without persisting any of them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Normalize all reports, then all payouts. Aborts on the first
    /// repository failure; already-written records stay written.
    pub fn run(&self) -> Result<NormalizationReport, NormalizeError> {
        let mut summary = NormalizationReport {
            dry_run: self.dry_run,
            ..Default::default()
        };

        let mut reports_by_id: HashMap<String, RoyaltyReport> = HashMap::new();
        for mut report in self.reports.get_all()? {
            summary.reports_scanned += 1;
            if self.normalize_report(&mut report)? {
                debug!(
                    "report {} period -> {} .. {}",
                    report.id, report.summary.string_period_from, report.summary.string_period_to
                );
                if !self.dry_run {
                    self.reports.update(
                        &report,
                        SYSTEM_ACTOR_IP,
                        AuditSource::AdminPeriodNormalization,
                    )?;
                }
                summary.reports_updated += 1;
            }
            reports_by_id.insert(report.id.clone(), report);
        }

        for mut payout in self.payouts.find_all()? {
            summary.payouts_scanned += 1;
            match apply_payout_period(&mut payout, &reports_by_id) {
                PayoutPeriod::Unresolved { missing } => {
                    summary.missing_references += missing;
                    summary.payouts_skipped += 1;
                }
                PayoutPeriod::Unchanged { missing } => {
                    summary.missing_references += missing;
                }
                PayoutPeriod::Changed { missing } => {
                    summary.missing_references += missing;
                    debug!(
                        "payout {} period -> {} .. {}",
                        payout.id, payout.string_period_from, payout.string_period_to
                    );
                    if !self.dry_run {
                        self.payouts.update(
                            &payout,
                            SYSTEM_ACTOR_IP,
                            AuditSource::AdminPeriodNormalization,
                        )?;
                    }
                    summary.payouts_updated += 1;
                }
            }
        }

        info!(
            "period normalization finished: {} of {} reports, {} of {} payouts updated{}",
            summary.reports_updated,
            summary.reports_scanned,
            summary.payouts_updated,
            summary.payouts_scanned,
            if self.dry_run { " (dry run)" } else { "" }
        );
        Ok(summary)
    }

    /// Returns true when any field of the report changed.
    fn normalize_report(&self, report: &mut RoyaltyReport) -> Result<bool, NormalizeError> {
        let period_error = |source| NormalizeError::Period {
            id: report.id.clone(),
            source,
        };
        let before = report.summary.clone();
        let s = &mut report.summary;

        if has_subsecond(s.period_from) {
            s.period_from = self.clock.start_of_day(s.period_from).map_err(period_error)?;
        }
        s.string_period_from = self.clock.format_date(s.period_from);

        // Inverted on purpose relative to the start boundary; see module docs.
        if !has_subsecond(s.period_to) {
            s.period_to = self.clock.end_of_day(s.period_to).map_err(period_error)?;
        }
        s.string_period_to = self.clock.format_date(s.period_to);

        Ok(*s != before)
    }
}

enum PayoutPeriod {
    Unresolved { missing: usize },
    Unchanged { missing: usize },
    Changed { missing: usize },
}

fn apply_payout_period(
    payout: &mut PayoutDocument,
    reports_by_id: &HashMap<String, RoyaltyReport>,
) -> PayoutPeriod {
    let mut dates: Vec<&str> = Vec::with_capacity(payout.source_id.len() * 2);
    let mut missing = 0;
    for id in &payout.source_id {
        match reports_by_id.get(id) {
            Some(report) => {
                dates.push(&report.summary.string_period_from);
                dates.push(&report.summary.string_period_to);
            }
            None => missing += 1,
        }
    }

    // Zero-padded YYYY-MM-DD sorts chronologically as plain strings.
    dates.sort_unstable();
    let (Some(first), Some(last)) = (dates.first(), dates.last()) else {
        return PayoutPeriod::Unresolved { missing };
    };
    if payout.string_period_from == *first && payout.string_period_to == *last {
        return PayoutPeriod::Unchanged { missing };
    }
    payout.string_period_from = first.to_string();
    payout.string_period_to = last.to_string();
    PayoutPeriod::Changed { missing }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::CurrencyCode;
    use crate::core::party::{Company, CountryCode};
    use crate::core::payout::PayoutStatus;
    use crate::core::report::{RoyaltyReportStatus, RoyaltyReportSummary};
    use crate::repository::memory::InMemoryStore;
    use chrono::{DateTime, TimeZone, Timelike, Utc};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn report(id: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> RoyaltyReport {
        RoyaltyReport {
            id: id.into(),
            merchant_id: "m-1".into(),
            operating_company_id: "oc-1".into(),
            status: RoyaltyReportStatus::Accepted,
            created_at: utc(2021, 3, 1, 0, 0, 0),
            summary: RoyaltyReportSummary::empty(from, to),
        }
    }

    fn payout(id: &str, sources: &[&str]) -> PayoutDocument {
        PayoutDocument {
            id: id.into(),
            merchant_id: "m-1".into(),
            operating_company_id: "oc-1".into(),
            status: PayoutStatus::Pending,
            created_at: utc(2021, 3, 1, 0, 0, 0),
            currency: CurrencyCode::new("EUR"),
            source_id: sources.iter().map(|s| s.to_string()).collect(),
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

    fn clock() -> ReportingClock {
        ReportingClock::from_name("Europe/Moscow").unwrap()
    }

    #[test]
    fn test_boundaries_corrected_asymmetrically() {
        let store = InMemoryStore::default();
        // from carries a sub-second part, to sits on a whole second
        let from = utc(2021, 1, 1, 10, 0, 0).with_nanosecond(500_000_000).unwrap();
        let to = utc(2021, 1, 31, 10, 0, 0);
        store.insert_report(report("r-1", from, to));

        let result = PeriodNormalizer::new(&store, &store, clock()).run().unwrap();
        assert_eq!(result.reports_updated, 1);

        let stored = RoyaltyReportRepository::get_by_id(&store, "r-1").unwrap().unwrap();
        assert_eq!(stored.period_from(), utc(2020, 12, 31, 21, 0, 0));
        assert_eq!(stored.period_to().nanosecond(), 999_999_999);
        assert_eq!(stored.summary.string_period_from, "2021-01-01");
        assert_eq!(stored.summary.string_period_to, "2021-01-31");
    }

    #[test]
    fn test_whole_second_start_and_fractional_end_left_alone() {
        let store = InMemoryStore::default();
        let from = utc(2021, 1, 1, 10, 0, 0);
        let to = utc(2021, 1, 31, 10, 0, 0).with_nanosecond(1).unwrap();
        store.insert_report(report("r-1", from, to));

        PeriodNormalizer::new(&store, &store, clock()).run().unwrap();
        let stored = RoyaltyReportRepository::get_by_id(&store, "r-1").unwrap().unwrap();
        assert_eq!(stored.period_from(), from);
        assert_eq!(stored.period_to(), to);
        assert_eq!(stored.summary.string_period_from, "2021-01-01");
    }

    #[test]
    fn test_payout_period_spans_reports_and_skips_unknown_ids() {
        let mut a = report("r-1", utc(2021, 1, 1, 0, 0, 0), utc(2021, 1, 31, 0, 0, 0));
        a.summary.string_period_from = "2021-01-01".into();
        a.summary.string_period_to = "2021-01-31".into();
        let mut b = report("r-2", utc(2021, 2, 1, 0, 0, 0), utc(2021, 2, 28, 0, 0, 0));
        b.summary.string_period_from = "2021-02-01".into();
        b.summary.string_period_to = "2021-02-28".into();

        let mut index = HashMap::new();
        index.insert(a.id.clone(), a);
        index.insert(b.id.clone(), b);

        let mut p = payout("p-1", &["r-2", "ghost", "r-1"]);
        assert!(matches!(
            apply_payout_period(&mut p, &index),
            PayoutPeriod::Changed { missing: 1 }
        ));
        assert_eq!(p.string_period_from, "2021-01-01");
        assert_eq!(p.string_period_to, "2021-02-28");

        assert!(matches!(
            apply_payout_period(&mut p, &index),
            PayoutPeriod::Unchanged { .. }
        ));

        let mut orphan = payout("p-2", &["ghost"]);
        assert!(matches!(
            apply_payout_period(&mut orphan, &index),
            PayoutPeriod::Unresolved { missing: 1 }
        ));
        assert!(orphan.string_period_from.is_empty());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let store = InMemoryStore::default();
        let from = utc(2021, 1, 1, 10, 0, 0).with_nanosecond(7).unwrap();
        store.insert_report(report("r-1", from, utc(2021, 1, 31, 0, 0, 0)));
        store.insert_payout(payout("p-1", &["r-1"]));
        let before = store.snapshot();

        let result = PeriodNormalizer::new(&store, &store, clock())
            .dry_run(true)
            .run()
            .unwrap();
        assert_eq!(result.reports_updated, 1);
        assert_eq!(result.payouts_updated, 1);
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_payout_without_sources_skipped() {
        let store = InMemoryStore::default();
        store.insert_payout(payout("p-1", &[]));
        let result = PeriodNormalizer::new(&store, &store, clock()).run().unwrap();
        assert_eq!(result.payouts_skipped, 1);
        assert!(store.journal().is_empty());
    }
}
