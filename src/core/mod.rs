//! Foundational types: currencies and rounding, periods, parties, reports and payouts.

pub mod currency;
pub mod party;
pub mod payout;
pub mod period;
pub mod report;
pub mod rounding;
