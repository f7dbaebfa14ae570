//! In-process store backing every repository trait.
//!
//! The store is a JSON-loadable snapshot of merchants, operating companies,
//! royalty reports and payouts. Every update is appended to a change journal
//! with the actor address and audit source it was made under.

use super::{
    AuditSource, MerchantRepository, OperatingCompanyRepository, PayoutRepository,
    RepositoryError, RoyaltyReportRepository, RoyaltySummaryProvider,
};
use crate::core::party::{Merchant, OperatingCompany};
use crate::core::payout::{PayoutDocument, PayoutFilter};
use crate::core::period::ReportingClock;
use crate::core::report::{RoyaltyReport, RoyaltyReportSummary};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot access store file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed store file: {0}")]
    Json(#[from] serde_json::Error),
}

/// One journaled update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub entity: String,
    pub id: String,
    pub actor_ip: String,
    pub source: AuditSource,
}

/// Serializable contents of an [`InMemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub merchants: Vec<Merchant>,
    #[serde(default)]
    pub operating_companies: Vec<OperatingCompany>,
    #[serde(default)]
    pub royalty_reports: Vec<RoyaltyReport>,
    #[serde(default)]
    pub payouts: Vec<PayoutDocument>,
    #[serde(default)]
    pub journal: Vec<ChangeRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreSnapshot>,
    /// Remaining successful updates before writes start failing.
    update_budget: AtomicUsize,
    fail_updates: AtomicBool,
}

impl InMemoryStore {
    pub fn new(snapshot: StoreSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn journal(&self) -> Vec<ChangeRecord> {
        self.snapshot().journal
    }

    pub fn insert_merchant(&self, merchant: Merchant) {
        self.write().merchants.push(merchant);
    }

    pub fn insert_operating_company(&self, company: OperatingCompany) {
        self.write().operating_companies.push(company);
    }

    pub fn insert_report(&self, report: RoyaltyReport) {
        self.write().royalty_reports.push(report);
    }

    pub fn insert_payout(&self, payout: PayoutDocument) {
        self.write().payouts.push(payout);
    }

    /// Make every update after the next `successes` fail with
    /// [`RepositoryError::Unavailable`]. Simulates a storage outage mid-run.
    pub fn fail_updates_after(&self, successes: usize) {
        self.update_budget.store(successes, Ordering::SeqCst);
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    pub fn restore_updates(&self) {
        self.fail_updates.store(false, Ordering::SeqCst);
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreSnapshot> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreSnapshot> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn admit_update(&self) -> Result<(), RepositoryError> {
        if !self.fail_updates.load(Ordering::SeqCst) {
            return Ok(());
        }
        let admitted = self
            .update_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if admitted {
            Ok(())
        } else {
            Err(RepositoryError::Unavailable("injected write failure".to_string()))
        }
    }

    fn record(
        state: &mut StoreSnapshot,
        entity: &str,
        id: &str,
        actor_ip: &str,
        source: AuditSource,
    ) {
        debug!("{} '{}' updated by {} ({})", entity, id, actor_ip, source);
        state.journal.push(ChangeRecord {
            entity: entity.to_string(),
            id: id.to_string(),
            actor_ip: actor_ip.to_string(),
            source,
        });
    }
}

impl MerchantRepository for InMemoryStore {
    fn get_by_id(&self, id: &str) -> Result<Option<Merchant>, RepositoryError> {
        Ok(self.read().merchants.iter().find(|m| m.id == id).cloned())
    }
}

impl OperatingCompanyRepository for InMemoryStore {
    fn get_all(&self) -> Result<Vec<OperatingCompany>, RepositoryError> {
        Ok(self.read().operating_companies.clone())
    }
}

impl RoyaltyReportRepository for InMemoryStore {
    fn get_all(&self) -> Result<Vec<RoyaltyReport>, RepositoryError> {
        Ok(self.read().royalty_reports.clone())
    }

    fn get_by_id(&self, id: &str) -> Result<Option<RoyaltyReport>, RepositoryError> {
        Ok(self.read().royalty_reports.iter().find(|r| r.id == id).cloned())
    }

    fn update(
        &self,
        report: &RoyaltyReport,
        actor_ip: &str,
        source: AuditSource,
    ) -> Result<(), RepositoryError> {
        self.admit_update()?;
        let mut state = self.write();
        let slot = state
            .royalty_reports
            .iter_mut()
            .find(|r| r.id == report.id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "royalty report",
                id: report.id.clone(),
            })?;
        *slot = report.clone();
        Self::record(&mut state, "royalty_report", &report.id, actor_ip, source);
        Ok(())
    }
}

impl PayoutRepository for InMemoryStore {
    fn find_all(&self) -> Result<Vec<PayoutDocument>, RepositoryError> {
        Ok(self.read().payouts.clone())
    }

    fn find(&self, filter: &PayoutFilter) -> Result<Vec<PayoutDocument>, RepositoryError> {
        Ok(self
            .read()
            .payouts
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    fn update(
        &self,
        payout: &PayoutDocument,
        actor_ip: &str,
        source: AuditSource,
    ) -> Result<(), RepositoryError> {
        self.admit_update()?;
        let mut state = self.write();
        let slot = state
            .payouts
            .iter_mut()
            .find(|p| p.id == payout.id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "payout",
                id: payout.id.clone(),
            })?;
        *slot = payout.clone();
        Self::record(&mut state, "payout", &payout.id, actor_ip, source);
        Ok(())
    }
}

/// Summary provider that sums a merchant's stored reports lying entirely
/// inside the requested window.
pub struct ReportSummaryAggregator<'a, R: RoyaltyReportRepository + ?Sized> {
    reports: &'a R,
    clock: ReportingClock,
}

impl<'a, R: RoyaltyReportRepository + ?Sized> ReportSummaryAggregator<'a, R> {
    pub fn new(reports: &'a R, clock: ReportingClock) -> Self {
        Self { reports, clock }
    }
}

impl<R: RoyaltyReportRepository + ?Sized> RoyaltySummaryProvider
    for ReportSummaryAggregator<'_, R>
{
    fn build(
        &self,
        merchant: &Merchant,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<RoyaltyReportSummary, RepositoryError> {
        let mut summary = RoyaltyReportSummary::empty(from, to);
        summary.string_period_from = self.clock.format_date(from);
        summary.string_period_to = self.clock.format_date(to);

        for report in self.reports.get_all()? {
            if report.merchant_id == merchant.id && report.within(&self.clock, from, to) {
                summary.absorb(&report.summary);
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::CurrencyCode;
    use crate::core::party::CountryCode;
    use crate::core::report::RoyaltyReportStatus;
    use chrono::TimeZone;

    fn report(id: &str, merchant: &str, from_day: u32, to_day: u32, gross: f64) -> RoyaltyReport {
        let mut summary = RoyaltyReportSummary::empty(
            Utc.with_ymd_and_hms(2021, 1, from_day, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2021, 1, to_day, 23, 0, 0).unwrap(),
        );
        summary.products_total.gross_total_amount = gross;
        summary.totals.transactions_count = 1;
        RoyaltyReport {
            id: id.into(),
            merchant_id: merchant.into(),
            operating_company_id: "oc-1".into(),
            status: RoyaltyReportStatus::Pending,
            created_at: Utc.with_ymd_and_hms(2021, 2, 1, 0, 0, 0).unwrap(),
            summary,
        }
    }

    #[test]
    fn test_update_journals_change() {
        let store = InMemoryStore::default();
        let mut r = report("r-1", "m-1", 1, 7, 10.0);
        store.insert_report(r.clone());

        r.summary.totals.fee_amount = 2.0;
        RoyaltyReportRepository::update(&store, &r, "10.0.0.1", AuditSource::User).unwrap();

        let stored = RoyaltyReportRepository::get_by_id(&store, "r-1").unwrap().unwrap();
        assert_eq!(stored.totals().fee_amount, 2.0);
        assert_eq!(
            store.journal(),
            vec![ChangeRecord {
                entity: "royalty_report".into(),
                id: "r-1".into(),
                actor_ip: "10.0.0.1".into(),
                source: AuditSource::User,
            }]
        );
    }

    #[test]
    fn test_update_unknown_record_fails() {
        let store = InMemoryStore::default();
        let err = RoyaltyReportRepository::update(
            &store,
            &report("ghost", "m-1", 1, 2, 0.0),
            "127.0.0.1",
            AuditSource::User,
        )
        .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn test_injected_failure_after_budget() {
        let store = InMemoryStore::default();
        let r = report("r-1", "m-1", 1, 7, 10.0);
        store.insert_report(r.clone());
        store.fail_updates_after(1);

        assert!(RoyaltyReportRepository::update(&store, &r, "ip", AuditSource::User).is_ok());
        assert_eq!(
            RoyaltyReportRepository::update(&store, &r, "ip", AuditSource::User),
            Err(RepositoryError::Unavailable("injected write failure".into()))
        );

        store.restore_updates();
        assert!(RoyaltyReportRepository::update(&store, &r, "ip", AuditSource::User).is_ok());
    }

    #[test]
    fn test_aggregator_sums_reports_inside_window() {
        let store = InMemoryStore::default();
        store.insert_report(report("r-1", "m-1", 1, 7, 10.0));
        store.insert_report(report("r-2", "m-1", 8, 14, 20.0));
        store.insert_report(report("r-3", "m-1", 14, 25, 40.0));
        store.insert_report(report("r-4", "m-2", 1, 7, 80.0));

        let merchant = Merchant::new(
            "m-1",
            "Acme",
            CurrencyCode::new("EUR"),
            CountryCode::new("CY"),
        );
        let aggregator = ReportSummaryAggregator::new(&store, ReportingClock::default());
        let summary = aggregator
            .build(
                &merchant,
                Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2021, 1, 14, 23, 59, 59).unwrap(),
            )
            .unwrap();

        assert_eq!(summary.products_total.gross_total_amount, 30.0);
        assert_eq!(summary.totals.transactions_count, 2);
        assert_eq!(summary.string_period_from, "2021-01-01");
        assert_eq!(summary.string_period_to, "2021-01-14");
    }

    #[test]
    fn test_snapshot_json_round_trip() {
        let store = InMemoryStore::default();
        let company = OperatingCompany::new("oc-1", "Opco", CountryCode::new("CY"));
        store.insert_operating_company(company);
        let json = serde_json::to_string(&store.snapshot()).unwrap();
        let loaded = InMemoryStore::from_json(&json).unwrap();
        assert_eq!(loaded.snapshot(), store.snapshot());
    }
}
