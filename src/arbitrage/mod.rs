//! Opportunity detection and execution for one pair across two venues.
//!
//! Detection is a pure function of the current books, the cached venue
//! state and configuration. Execution talks to the venues and must run
//! under the bot's trading lock.

mod book_store;
mod detector;
mod executor;
mod fees;
mod risk;

pub use book_store::OrderBookStore;
pub use detector::OpportunityDetector;
pub use executor::{
    ExecutionCoordinator, ExecutionOutcome, ExecutionReport, LegOutcome, StopLossOrder,
};
pub use fees::FeeModel;
pub use risk::RiskLimiter;

/// Ratio of the minimum trade size a leg must reach to be followed up.
/// Venues round amounts after placement, so a filled amount slightly below
/// the minimum is still tradeable.
pub const MIN_FOLLOW_UP_RATIO: rust_decimal::Decimal =
    rust_decimal::Decimal::from_parts(8, 0, 0, false, 1);

/// Share of the quote balance usable for a buy, leaving room for fees and slippage.
pub const QUOTE_BALANCE_USAGE: rust_decimal::Decimal =
    rust_decimal::Decimal::from_parts(97, 0, 0, false, 2);
