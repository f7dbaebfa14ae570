//! # royalty-settlement
//!
//! Financial aggregation and rounding engine for merchant royalty payouts.
//!
//! Raw transaction totals arrive as floating-point sums. This crate turns
//! them into reproducible, auditable figures and repairs historical data
//! with batch jobs that are safe to re-run after a partial failure.
//!
//! ## Architecture
//!
//! - **core** — Currencies, key-scoped rounding, reporting periods, parties, reports, payouts
//! - **repository** — Collaborator traits and an in-memory store implementing them
//! - **settlement** — Act-of-completion computation for arbitrary date windows
//! - **jobs** — Period normalization and B2B VAT backfill
//! - **config** — Reporting timezone, rounding defaults and VAT jurisdiction table
//! - **simulation** — Random store generation for benchmarks

pub mod config;
pub mod core;
pub mod jobs;
pub mod repository;
pub mod settlement;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::{SettlementConfig, VatConfig, VatRule};
    pub use crate::core::currency::{CurrencyCode, MoneyValue};
    pub use crate::core::party::{CountryCode, Merchant, OperatingCompany};
    pub use crate::core::payout::PayoutDocument;
    pub use crate::core::period::ReportingClock;
    pub use crate::core::report::{RoyaltyReport, RoyaltyReportSummary};
    pub use crate::core::rounding::{MoneyRounder, RoundingKey, RoundingPolicy};
    pub use crate::jobs::period_normalizer::PeriodNormalizer;
    pub use crate::jobs::vat_backfill::{VatBackfillJob, VatBackfillScope};
    pub use crate::repository::memory::InMemoryStore;
    pub use crate::settlement::act::{ActOfCompletionCalculator, ActOfCompletionDocument};
}
