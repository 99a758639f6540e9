//! Venue balances, open order counts and low-balance alerts.

mod alert;
mod tracker;

pub use alert::AlertLatch;
pub use tracker::{BalanceTracker, VenueState};
