//! Restartable batch jobs that correct historical settlement data.
//!
//! Jobs run single-threaded and persist each record on its own. Expected
//! data gaps are skipped; any repository failure aborts the run, which can
//! then be re-run from the top.

pub mod period_normalizer;
pub mod vat_backfill;
