//! Collaborator interfaces the settlement core reads from and writes through.
//!
//! Lookups that may legitimately find nothing return `Ok(None)`; only
//! infrastructure failures surface as [`RepositoryError`].

pub mod memory;

use crate::core::party::{Merchant, OperatingCompany};
use crate::core::payout::{PayoutDocument, PayoutFilter};
use crate::core::report::{RoyaltyReport, RoyaltyReportSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Actor address recorded for changes made by batch jobs.
pub const SYSTEM_ACTOR_IP: &str = "127.0.0.1";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("{entity} '{id}' does not exist")]
    NotFound { entity: &'static str, id: String },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("summary provider failed: {0}")]
    Provider(String),
}

/// Why a record was changed, stored alongside every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSource {
    User,
    AdminPeriodNormalization,
    AdminVatBackfill,
}

impl AuditSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSource::User => "user",
            AuditSource::AdminPeriodNormalization => "admin_period_normalization",
            AuditSource::AdminVatBackfill => "admin_vat_backfill",
        }
    }
}

impl fmt::Display for AuditSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait MerchantRepository: Send + Sync {
    fn get_by_id(&self, id: &str) -> Result<Option<Merchant>, RepositoryError>;
}

/// Builds aggregated royalty figures for a merchant over a window.
pub trait RoyaltySummaryProvider: Send + Sync {
    fn build(
        &self,
        merchant: &Merchant,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<RoyaltyReportSummary, RepositoryError>;
}

pub trait RoyaltyReportRepository: Send + Sync {
    fn get_all(&self) -> Result<Vec<RoyaltyReport>, RepositoryError>;
    fn get_by_id(&self, id: &str) -> Result<Option<RoyaltyReport>, RepositoryError>;
    fn update(
        &self,
        report: &RoyaltyReport,
        actor_ip: &str,
        source: AuditSource,
    ) -> Result<(), RepositoryError>;
}

pub trait PayoutRepository: Send + Sync {
    fn find_all(&self) -> Result<Vec<PayoutDocument>, RepositoryError>;
    fn find(&self, filter: &PayoutFilter) -> Result<Vec<PayoutDocument>, RepositoryError>;
    fn update(
        &self,
        payout: &PayoutDocument,
        actor_ip: &str,
        source: AuditSource,
    ) -> Result<(), RepositoryError>;
}

pub trait OperatingCompanyRepository: Send + Sync {
    fn get_all(&self) -> Result<Vec<OperatingCompany>, RepositoryError>;
}
