//! Domain models for two-venue arbitrage.

mod fees;
mod opportunity;
mod order;
mod orderbook;

pub use fees::VenueFees;
pub use opportunity::{Direction, Opportunity, VenueSlot};
pub use order::{Order, OrderSide, OrderStatus};
pub use orderbook::{BookDelta, Orderbook, PriceLevel, Quote};
