//! Opportunity detection for one direction at a time.

use chrono::Utc;
use rust_decimal::Decimal;
use std::fmt;
use tracing::debug;

use super::{FeeModel, QUOTE_BALANCE_USAGE, RiskLimiter};
use crate::balance::VenueState;
use crate::domain::{Direction, Opportunity, Orderbook};

/// Why a direction was not traded on this tick. Rejections are normal
/// results, not failures.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// The buy venue has no asks or the sell venue has no bids.
    EmptyBook,
    /// A venue's own top bid is at or above its top ask.
    CrossedBook { venue: String },
    /// The executable ask is not below the executable bid.
    NoPremium { ask: Decimal, bid: Decimal },
    /// A venue already has too many resting orders.
    OpenOrderLimit { venue: String, count: usize },
    /// The premium does not cover the estimated fees.
    BelowFees { premium: Decimal, fee: Decimal },
    /// The profit after fees is not above the direction's limit.
    BelowThreshold { pure_profit: Decimal, limit: Decimal },
    /// Aggregated book volume is below the minimum trade size.
    InsufficientDepth,
    /// The buy venue cannot afford the minimum trade size.
    InsufficientQuoteBalance { max_buy: Decimal, min_size: Decimal },
    /// The sell venue does not hold the minimum trade size.
    InsufficientBaseBalance { max_sell: Decimal, min_size: Decimal },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::EmptyBook => write!(f, "ask or bid side is empty"),
            Rejection::CrossedBook { venue } => write!(f, "book of {} is crossed", venue),
            Rejection::NoPremium { ask, bid } => write!(f, "no premium: ask {} bid {}", ask, bid),
            Rejection::OpenOrderLimit { venue, count } => {
                write!(f, "{} has {} open orders", venue, count)
            }
            Rejection::BelowFees { premium, fee } => {
                write!(f, "premium {} does not cover fee {}", premium, fee)
            }
            Rejection::BelowThreshold { pure_profit, limit } => {
                write!(f, "pure profit {} not above limit {}", pure_profit, limit)
            }
            Rejection::InsufficientDepth => write!(f, "book volume below minimum trade size"),
            Rejection::InsufficientQuoteBalance { max_buy, min_size } => {
                write!(f, "quote balance buys {} below minimum {}", max_buy, min_size)
            }
            Rejection::InsufficientBaseBalance { max_sell, min_size } => {
                write!(f, "base balance {} below minimum {}", max_sell, min_size)
            }
        }
    }
}

/// Decides whether, and how much, to trade in a direction.
#[derive(Debug, Clone)]
pub struct OpportunityDetector {
    pair: String,
    fees: FeeModel,
    risk: RiskLimiter,
    /// Pure profit limits indexed by direction, first-to-second first.
    profit_limits: [Decimal; 2],
    max_levels: usize,
    cross_venue_transfer: bool,
}

impl OpportunityDetector {
    pub fn new(
        pair: impl Into<String>,
        fees: FeeModel,
        risk: RiskLimiter,
        profit_limits: [Decimal; 2],
        max_levels: usize,
        cross_venue_transfer: bool,
    ) -> Self {
        Self {
            pair: pair.into(),
            fees,
            risk,
            profit_limits,
            max_levels,
            cross_venue_transfer,
        }
    }

    fn profit_limit(&self, direction: Direction) -> Decimal {
        match direction {
            Direction::FirstToSecond => self.profit_limits[0],
            Direction::SecondToFirst => self.profit_limits[1],
        }
    }

    /// Evaluates buying on `buy_book`'s venue and selling on `sell_book`'s venue.
    pub fn evaluate(
        &self,
        direction: Direction,
        buy_book: &Orderbook,
        sell_book: &Orderbook,
        buy_state: &VenueState,
        sell_state: &VenueState,
    ) -> Result<Opportunity, Rejection> {
        if buy_book.asks.is_empty() || sell_book.bids.is_empty() {
            return Err(Rejection::EmptyBook);
        }

        // A resting order on the same venue would take the other side first.
        for book in [buy_book, sell_book] {
            if book.is_crossed() {
                return Err(Rejection::CrossedBook {
                    venue: book.exchange.clone(),
                });
            }
        }

        let min_size = |price: Decimal| self.risk.min_trade_size(price);
        let ask = buy_book.asks.aggregate(self.max_levels, min_size);
        let bid = sell_book.bids.aggregate(self.max_levels, min_size);

        // A zero-depth walk yields a zero ask; never divide by it.
        let premium = match (bid.price - ask.price).checked_div(ask.price) {
            Some(premium) if ask.price > Decimal::ZERO && ask.price < bid.price => premium,
            _ => {
                return Err(Rejection::NoPremium {
                    ask: ask.price,
                    bid: bid.price,
                });
            }
        };
        debug!(
            pair = %self.pair,
            direction = %direction,
            buy = %buy_book.exchange,
            sell = %sell_book.exchange,
            ask = %ask.price,
            ask_volume = %ask.volume,
            bid = %bid.price,
            bid_volume = %bid.volume,
            premium = %premium,
            "Premium found"
        );

        for state in [buy_state, sell_state] {
            if self.risk.open_orders_exceeded(state.open_orders) {
                return Err(Rejection::OpenOrderLimit {
                    venue: state.name.clone(),
                    count: state.open_orders,
                });
            }
        }

        let fee = self.fees.fee_rate(bid.price, self.cross_venue_transfer);
        if premium <= fee {
            return Err(Rejection::BelowFees { premium, fee });
        }

        let pure_profit = premium - fee;
        let limit = self.profit_limit(direction);
        if pure_profit <= limit {
            return Err(Rejection::BelowThreshold { pure_profit, limit });
        }

        if ask.volume < min_size(ask.price) || bid.volume < min_size(bid.price) {
            return Err(Rejection::InsufficientDepth);
        }

        let min_price = ask.price.min(bid.price);
        let min_trade = min_size(min_price);
        let max_buy = buy_state.quote / ask.price * QUOTE_BALANCE_USAGE;
        let max_sell = sell_state.base;
        if max_buy.is_zero() || max_buy < min_trade {
            return Err(Rejection::InsufficientQuoteBalance {
                max_buy,
                min_size: min_trade,
            });
        }
        if max_sell.is_zero() || max_sell < min_trade {
            return Err(Rejection::InsufficientBaseBalance {
                max_sell,
                min_size: min_trade,
            });
        }

        let mut quantity = ask.volume.min(bid.volume).min(max_buy).min(max_sell);
        if let Some(max_trade) = self.risk.max_trade_size(min_price) {
            quantity = quantity.min(max_trade);
        }

        Ok(Opportunity {
            direction,
            pair: self.pair.clone(),
            buy_exchange: buy_book.exchange.clone(),
            sell_exchange: sell_book.exchange.clone(),
            ask,
            bid,
            premium_rate: premium,
            fee_rate: fee,
            pure_profit,
            quantity,
            detected_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BookDelta, PriceLevel, VenueFees};
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn book(name: &str, asks: &[(&str, &str)], bids: &[(&str, &str)]) -> Orderbook {
        let levels = |items: &[(&str, &str)]| {
            items
                .iter()
                .map(|(p, q)| PriceLevel::new(d(p), d(q)))
                .collect::<Vec<_>>()
        };
        let mut book = Orderbook::new(name);
        book.apply(&BookDelta::snapshot(levels(asks), levels(bids)));
        book
    }

    fn state(name: &str, base: &str, quote: &str) -> VenueState {
        VenueState {
            name: name.to_string(),
            base: d(base),
            quote: d(quote),
            open_orders: 0,
        }
    }

    fn detector(risk: RiskLimiter) -> OpportunityDetector {
        let fees = FeeModel::new(
            VenueFees::new(d("0.001"), Decimal::ZERO, Decimal::ZERO),
            VenueFees::new(d("0.001"), Decimal::ZERO, Decimal::ZERO),
            Decimal::ONE,
            true,
        );
        OpportunityDetector::new("BTC/USDT", fees, risk, [d("0.003"), d("0.003")], 5, false)
    }

    fn no_limits() -> RiskLimiter {
        RiskLimiter::new(None, None, 10)
    }

    #[test]
    fn test_profitable_direction_is_accepted() {
        let buy = book("alpha", &[("100", "1.0")], &[]);
        let sell = book("beta", &[], &[("103", "1.0")]);

        let opp = detector(no_limits())
            .evaluate(
                Direction::FirstToSecond,
                &buy,
                &sell,
                &state("alpha", "0", "1000"),
                &state("beta", "5", "0"),
            )
            .unwrap();

        assert_eq!(opp.premium_rate, d("0.03"));
        assert_eq!(opp.fee_rate, d("0.002"));
        assert_eq!(opp.pure_profit, d("0.028"));
        assert_eq!(opp.quantity, d("1.0"));
        assert_eq!(opp.buy_exchange, "alpha");
        assert_eq!(opp.sell_exchange, "beta");
        assert_eq!(opp.ask.price, d("100"));
        assert_eq!(opp.bid.price, d("103"));
    }

    #[test]
    fn test_self_crossed_buy_venue_is_rejected() {
        let buy = book("alpha", &[("100", "1.0")], &[("100", "1.0")]);
        let sell = book("beta", &[], &[("103", "1.0")]);

        let result = detector(no_limits()).evaluate(
            Direction::FirstToSecond,
            &buy,
            &sell,
            &state("alpha", "5", "1000"),
            &state("beta", "5", "1000"),
        );

        assert_eq!(
            result.unwrap_err(),
            Rejection::CrossedBook {
                venue: "alpha".to_string()
            }
        );
    }

    #[test]
    fn test_self_crossed_sell_venue_is_rejected() {
        let buy = book("alpha", &[("100", "1.0")], &[]);
        let sell = book("beta", &[("102", "1.0")], &[("103", "1.0")]);

        let result = detector(no_limits()).evaluate(
            Direction::SecondToFirst,
            &buy,
            &sell,
            &state("alpha", "5", "1000"),
            &state("beta", "5", "1000"),
        );

        assert!(matches!(result, Err(Rejection::CrossedBook { venue }) if venue == "beta"));
    }

    #[test]
    fn test_zero_priced_ask_is_rejected_without_panic() {
        let buy = book("alpha", &[("0", "1.0")], &[]);
        let sell = book("beta", &[], &[("103", "1.0")]);

        let result = detector(no_limits()).evaluate(
            Direction::FirstToSecond,
            &buy,
            &sell,
            &state("alpha", "5", "1000"),
            &state("beta", "5", "1000"),
        );
        assert_eq!(result.unwrap_err(), Rejection::EmptyBook);
    }

    #[test]
    fn test_zero_priced_level_is_skipped_when_walking_asks() {
        let buy = book("alpha", &[("0", "1.0"), ("100", "1.0")], &[]);
        let sell = book("beta", &[], &[("103", "1.0")]);

        let opp = detector(no_limits())
            .evaluate(
                Direction::FirstToSecond,
                &buy,
                &sell,
                &state("alpha", "0", "1000"),
                &state("beta", "5", "0"),
            )
            .unwrap();
        assert_eq!(opp.ask.price, d("100"));
        assert_eq!(opp.premium_rate, d("0.03"));
    }

    #[test]
    fn test_zero_depth_walk_reports_no_premium() {
        let buy = book("alpha", &[("100", "1.0")], &[]);
        let sell = book("beta", &[], &[("103", "1.0")]);
        let fees = FeeModel::new(
            VenueFees::new(d("0.001"), Decimal::ZERO, Decimal::ZERO),
            VenueFees::new(d("0.001"), Decimal::ZERO, Decimal::ZERO),
            Decimal::ONE,
            true,
        );
        let detector =
            OpportunityDetector::new("BTC/USDT", fees, no_limits(), [d("0.003"), d("0.003")], 0, false);

        let result = detector.evaluate(
            Direction::FirstToSecond,
            &buy,
            &sell,
            &state("alpha", "5", "1000"),
            &state("beta", "5", "1000"),
        );
        assert!(matches!(result, Err(Rejection::NoPremium { ask, .. }) if ask.is_zero()));
    }

    #[test]
    fn test_empty_sides_are_rejected() {
        let buy = book("alpha", &[], &[("99", "1.0")]);
        let sell = book("beta", &[], &[("103", "1.0")]);

        let result = detector(no_limits()).evaluate(
            Direction::FirstToSecond,
            &buy,
            &sell,
            &state("alpha", "5", "1000"),
            &state("beta", "5", "1000"),
        );
        assert_eq!(result.unwrap_err(), Rejection::EmptyBook);
    }

    #[test]
    fn test_no_premium() {
        let buy = book("alpha", &[("103", "1.0")], &[]);
        let sell = book("beta", &[], &[("103", "1.0")]);

        let result = detector(no_limits()).evaluate(
            Direction::FirstToSecond,
            &buy,
            &sell,
            &state("alpha", "5", "1000"),
            &state("beta", "5", "1000"),
        );
        assert!(matches!(result, Err(Rejection::NoPremium { .. })));
    }

    #[test]
    fn test_open_order_ceiling() {
        let buy = book("alpha", &[("100", "1.0")], &[]);
        let sell = book("beta", &[], &[("103", "1.0")]);
        let mut sell_state = state("beta", "5", "1000");
        sell_state.open_orders = 10;

        let result = detector(no_limits()).evaluate(
            Direction::FirstToSecond,
            &buy,
            &sell,
            &state("alpha", "5", "1000"),
            &sell_state,
        );
        assert_eq!(
            result.unwrap_err(),
            Rejection::OpenOrderLimit {
                venue: "beta".to_string(),
                count: 10
            }
        );
    }

    #[test]
    fn test_premium_below_fees() {
        let buy = book("alpha", &[("100", "1.0")], &[]);
        let sell = book("beta", &[], &[("100.1", "1.0")]);

        let result = detector(no_limits()).evaluate(
            Direction::FirstToSecond,
            &buy,
            &sell,
            &state("alpha", "5", "1000"),
            &state("beta", "5", "1000"),
        );
        assert!(matches!(result, Err(Rejection::BelowFees { .. })));
    }

    #[test]
    fn test_pure_profit_below_threshold() {
        // premium 0.4%, fee 0.2%, pure 0.2% <= 0.3%
        let buy = book("alpha", &[("100", "1.0")], &[]);
        let sell = book("beta", &[], &[("100.4", "1.0")]);

        let result = detector(no_limits()).evaluate(
            Direction::FirstToSecond,
            &buy,
            &sell,
            &state("alpha", "5", "1000"),
            &state("beta", "5", "1000"),
        );
        assert!(matches!(result, Err(Rejection::BelowThreshold { .. })));
    }

    #[test]
    fn test_thin_book_is_rejected() {
        // min size at 100 is 1 base, only 0.5 available in 2 levels
        let buy = book("alpha", &[("100", "0.2"), ("100.5", "0.3")], &[]);
        let sell = book("beta", &[], &[("103", "5")]);

        let result = detector(RiskLimiter::new(Some(d("100")), None, 10)).evaluate(
            Direction::FirstToSecond,
            &buy,
            &sell,
            &state("alpha", "5", "10000"),
            &state("beta", "5", "10000"),
        );
        assert_eq!(result.unwrap_err(), Rejection::InsufficientDepth);
    }

    #[test]
    fn test_quote_balance_too_small() {
        let buy = book("alpha", &[("100", "5")], &[]);
        let sell = book("beta", &[], &[("103", "5")]);

        // 100 quote buys 0.97 < 1 minimum
        let result = detector(RiskLimiter::new(Some(d("100")), None, 10)).evaluate(
            Direction::FirstToSecond,
            &buy,
            &sell,
            &state("alpha", "5", "100"),
            &state("beta", "5", "1000"),
        );
        assert!(matches!(
            result,
            Err(Rejection::InsufficientQuoteBalance { .. })
        ));
    }

    #[test]
    fn test_base_balance_too_small() {
        let buy = book("alpha", &[("100", "5")], &[]);
        let sell = book("beta", &[], &[("103", "5")]);

        let result = detector(RiskLimiter::new(Some(d("100")), None, 10)).evaluate(
            Direction::FirstToSecond,
            &buy,
            &sell,
            &state("alpha", "5", "1000"),
            &state("beta", "0.5", "1000"),
        );
        assert!(matches!(result, Err(Rejection::InsufficientBaseBalance { .. })));
    }

    #[test]
    fn test_size_capped_by_balances_and_max_trade() {
        let buy = book("alpha", &[("100", "10")], &[]);
        let sell = book("beta", &[], &[("103", "10")]);

        // quote cap: 500 / 100 * 0.97 = 4.85
        let opp = detector(no_limits())
            .evaluate(
                Direction::FirstToSecond,
                &buy,
                &sell,
                &state("alpha", "0", "500"),
                &state("beta", "8", "0"),
            )
            .unwrap();
        assert_eq!(opp.quantity, d("4.85"));

        // max trade 300 quote at min price 100 = 3
        let opp = detector(RiskLimiter::new(None, Some(d("300")), 10))
            .evaluate(
                Direction::FirstToSecond,
                &buy,
                &sell,
                &state("alpha", "0", "500"),
                &state("beta", "8", "0"),
            )
            .unwrap();
        assert_eq!(opp.quantity, d("3"));
    }

    #[test]
    fn test_aggregation_uses_worst_price() {
        // min size 150 quote: needs 1.5 base, reached at the second level
        let buy = book("alpha", &[("100", "1"), ("101", "1"), ("150", "5")], &[]);
        let sell = book("beta", &[], &[("110", "3")]);

        let opp = detector(RiskLimiter::new(Some(d("150")), None, 10))
            .evaluate(
                Direction::FirstToSecond,
                &buy,
                &sell,
                &state("alpha", "0", "10000"),
                &state("beta", "10", "0"),
            )
            .unwrap();
        assert_eq!(opp.ask.price, d("101"));
        assert_eq!(opp.ask.volume, d("2"));
        assert_eq!(opp.quantity, d("2"));
    }

    #[test]
    fn test_direction_threshold_is_used() {
        let buy = book("beta", &[("100", "1.0")], &[]);
        let sell = book("alpha", &[], &[("103", "1.0")]);
        let fees = FeeModel::new(VenueFees::default(), VenueFees::default(), Decimal::ONE, true);
        let detector = OpportunityDetector::new(
            "BTC/USDT",
            fees,
            no_limits(),
            [d("0.001"), d("0.05")],
            5,
            false,
        );

        let result = detector.evaluate(
            Direction::SecondToFirst,
            &buy,
            &sell,
            &state("beta", "0", "1000"),
            &state("alpha", "5", "0"),
        );
        assert!(matches!(result, Err(Rejection::BelowThreshold { limit, .. }) if limit == d("0.05")));
    }
}
