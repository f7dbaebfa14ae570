//! Retroactive B2B VAT for payouts and royalty reports.
//!
//! Every figure is recomputed from the royalty reports' own totals, never
//! incremented, so a run interrupted half-way can simply be started again.

use crate::config::VatConfig;
use crate::core::currency::round2;
use crate::core::party::OperatingCompany;
use crate::core::payout::{PayoutDocument, PayoutFilter, PayoutStatus};
use crate::core::report::RoyaltyReport;
use crate::repository::{
    AuditSource, MerchantRepository, OperatingCompanyRepository, PayoutRepository,
    RepositoryError, RoyaltyReportRepository, SYSTEM_ACTOR_IP,
};
use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VatBackfillError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("payout '{payout_id}' references unknown royalty report '{report_id}'")]
    MissingReport { payout_id: String, report_id: String },
    #[error("royalty report '{report_id}' belongs to unknown merchant '{merchant_id}'")]
    MissingMerchant {
        report_id: String,
        merchant_id: String,
    },
}

/// Which half of the backfill to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VatBackfillScope {
    #[default]
    All,
    PayoutsOnly,
    RoyaltiesOnly,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VatBackfillReport {
    pub operating_companies: usize,
    pub reports_updated: usize,
    pub reports_skipped: usize,
    pub payouts_updated: usize,
    pub payouts_skipped: usize,
}

impl std::fmt::Display for VatBackfillReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== B2B VAT Backfill ===")?;
        writeln!(f, "Operating companies in scope: {}", self.operating_companies)?;
        writeln!(
            f,
            "Royalty reports: {} updated, {} skipped",
            self.reports_updated, self.reports_skipped
        )?;
        writeln!(
            f,
            "Payouts:         {} updated, {} skipped",
            self.payouts_updated, self.payouts_skipped
        )
    }
}

/// Payout figures recomputed from the constituent reports.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct PayoutVat {
    total_fees: f64,
    balance: f64,
    b2b_vat_base: f64,
    b2b_vat_amount: f64,
    fees_excluding_vat: f64,
}

impl PayoutVat {
    fn accumulate<'r>(reports: impl IntoIterator<Item = &'r RoyaltyReport>, rate: f64) -> Self {
        let mut acc = PayoutVat::default();
        for report in reports {
            let t = report.totals();
            acc.b2b_vat_base += t.fee_amount;
            acc.total_fees += t.payout_amount + t.correction_amount;
            acc.balance += t.payout_amount + t.correction_amount - t.rolling_reserve_amount;
        }

        acc.total_fees = round2(acc.total_fees);
        acc.balance = round2(acc.balance);
        acc.b2b_vat_base = round2(acc.b2b_vat_base);
        acc.b2b_vat_amount = round2(acc.b2b_vat_base * rate);
        acc.fees_excluding_vat = round2(acc.total_fees - acc.b2b_vat_amount);
        acc.balance = round2(acc.balance - acc.b2b_vat_amount);
        acc
    }

    fn apply(self, payout: &mut PayoutDocument, rate: f64) {
        payout.b2b_vat_rate = rate;
        payout.total_fees = self.total_fees;
        payout.balance = self.balance;
        payout.b2b_vat_base = self.b2b_vat_base;
        payout.b2b_vat_amount = self.b2b_vat_amount;
        payout.fees_excluding_vat = self.fees_excluding_vat;
    }
}

/// Set a report's B2B VAT fields for `rate`.
pub fn apply_report_vat(report: &mut RoyaltyReport, rate: f64) {
    let t = &mut report.summary.totals;
    t.b2b_vat_rate = rate;
    t.b2b_vat_base = t.fee_amount;
    t.b2b_vat_amount = round2(t.b2b_vat_base * rate);
    t.final_payout_amount = round2(t.payout_amount + t.correction_amount - t.b2b_vat_amount);
}

pub struct VatBackfillJob<'a> {
    companies: &'a dyn OperatingCompanyRepository,
    merchants: &'a dyn MerchantRepository,
    reports: &'a dyn RoyaltyReportRepository,
    payouts: &'a dyn PayoutRepository,
    config: VatConfig,
}

impl<'a> VatBackfillJob<'a> {
    pub fn new(
        companies: &'a dyn OperatingCompanyRepository,
        merchants: &'a dyn MerchantRepository,
        reports: &'a dyn RoyaltyReportRepository,
        payouts: &'a dyn PayoutRepository,
        config: VatConfig,
    ) -> Self {
        Self {
            companies,
            merchants,
            reports,
            payouts,
            config,
        }
    }

    /// Reports first, so payouts are rebuilt from reports that already carry
    /// their VAT figures.
    pub fn run(&self, scope: VatBackfillScope) -> Result<VatBackfillReport, VatBackfillError> {
        let mut report = VatBackfillReport::default();
        if scope != VatBackfillScope::PayoutsOnly {
            self.extend_royalties_with_vat(&mut report)?;
        }
        if scope != VatBackfillScope::RoyaltiesOnly {
            self.extend_payouts_with_vat(&mut report)?;
        }
        info!(
            "vat backfill finished: {} reports and {} payouts updated",
            report.reports_updated, report.payouts_updated
        );
        Ok(report)
    }

    fn companies_in_scope(&self) -> Result<Vec<OperatingCompany>, VatBackfillError> {
        Ok(self
            .companies
            .get_all()?
            .into_iter()
            .filter(|oc| self.config.covers_operating_country(&oc.country))
            .collect())
    }

    pub fn extend_payouts_with_vat(
        &self,
        summary: &mut VatBackfillReport,
    ) -> Result<(), VatBackfillError> {
        let companies = self.companies_in_scope()?;
        summary.operating_companies = companies.len();

        for oc in &companies {
            let filter = PayoutFilter {
                operating_company_id: Some(oc.id.clone()),
                statuses: vec![PayoutStatus::Pending],
                created_from: Some(self.config.cutoff_instant()),
                ..Default::default()
            };

            for mut payout in self.payouts.find(&filter)? {
                let rate = self.config.rate_for(&oc.country, &payout.company.country);
                if rate == 0.0 || payout.source_id.is_empty() {
                    summary.payouts_skipped += 1;
                    continue;
                }

                let mut sources = Vec::with_capacity(payout.source_id.len());
                for id in &payout.source_id {
                    let report = self.reports.get_by_id(id)?.ok_or_else(|| {
                        VatBackfillError::MissingReport {
                            payout_id: payout.id.clone(),
                            report_id: id.clone(),
                        }
                    })?;
                    sources.push(report);
                }

                PayoutVat::accumulate(&sources, rate).apply(&mut payout, rate);
                debug!(
                    "payout {}: fees {} vat {} balance {}",
                    payout.id, payout.total_fees, payout.b2b_vat_amount, payout.balance
                );
                self.payouts
                    .update(&payout, SYSTEM_ACTOR_IP, AuditSource::AdminVatBackfill)?;
                summary.payouts_updated += 1;
            }
        }
        Ok(())
    }

    pub fn extend_royalties_with_vat(
        &self,
        summary: &mut VatBackfillReport,
    ) -> Result<(), VatBackfillError> {
        let companies = self.companies_in_scope()?;
        summary.operating_companies = companies.len();
        let cutoff = self.config.cutoff_instant();
        let all_reports = self.reports.get_all()?;

        for oc in &companies {
            let candidates = all_reports
                .iter()
                .filter(|r| r.operating_company_id == oc.id && r.created_at >= cutoff);

            for candidate in candidates {
                let merchant = self
                    .merchants
                    .get_by_id(&candidate.merchant_id)?
                    .ok_or_else(|| VatBackfillError::MissingMerchant {
                        report_id: candidate.id.clone(),
                        merchant_id: candidate.merchant_id.clone(),
                    })?;

                let rate = self.config.rate_for(&oc.country, &merchant.company.country);
                if rate == 0.0 {
                    summary.reports_skipped += 1;
                    continue;
                }

                let mut report = candidate.clone();
                apply_report_vat(&mut report, rate);
                debug!(
                    "report {}: vat {} final payout {}",
                    report.id,
                    report.totals().b2b_vat_amount,
                    report.totals().final_payout_amount
                );
                self.reports
                    .update(&report, SYSTEM_ACTOR_IP, AuditSource::AdminVatBackfill)?;
                summary.reports_updated += 1;
            }
        }
        Ok(())
    }
}
