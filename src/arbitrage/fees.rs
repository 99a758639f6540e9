//! Round-trip fee estimation.

use rust_decimal::Decimal;

use crate::domain::VenueFees;

/// Estimates the fee rate of buying on one venue and selling on the other.
///
/// This is a rough, config-driven estimate. Actual charges are not metered.
#[derive(Debug, Clone)]
pub struct FeeModel {
    first: VenueFees,
    second: VenueFees,
    /// Nominal base amount a round trip is priced with.
    base_coin_notional: Decimal,
    /// Holdings are split evenly across both venues.
    bisect: bool,
}

impl FeeModel {
    pub fn new(first: VenueFees, second: VenueFees, base_coin_notional: Decimal, bisect: bool) -> Self {
        Self {
            first,
            second,
            base_coin_notional,
            bisect,
        }
    }

    /// Quote value of the nominal trade unit at `quote_price`.
    fn notional(&self, quote_price: Decimal) -> Decimal {
        let divisor = if self.bisect { Decimal::TWO } else { Decimal::ONE };
        self.base_coin_notional / divisor * quote_price
    }

    /// Fee rate of one round trip at `quote_price`.
    ///
    /// With `cross_venue_transfer` the largest base and quote withdrawal fees
    /// are added on top of both taker fees. A zero notional gives a zero rate.
    pub fn fee_rate(&self, quote_price: Decimal, cross_venue_transfer: bool) -> Decimal {
        let notional = self.notional(quote_price);
        if notional.is_zero() {
            return Decimal::ZERO;
        }

        let mut fees = notional * self.first.taker + notional * self.second.taker;
        if cross_venue_transfer {
            fees += self.first.withdraw_base.max(self.second.withdraw_base) * quote_price;
            fees += self.first.withdraw_quote.max(self.second.withdraw_quote);
        }

        fees / notional
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn model(bisect: bool) -> FeeModel {
        FeeModel::new(
            VenueFees::new(d("0.001"), d("0.0005"), d("1")),
            VenueFees::new(d("0.002"), d("0.0004"), d("2")),
            d("1"),
            bisect,
        )
    }

    #[test]
    fn test_taker_only_rate_is_sum_of_takers() {
        assert_eq!(model(true).fee_rate(d("100"), false), d("0.003"));
        assert_eq!(model(false).fee_rate(d("100"), false), d("0.003"));
    }

    #[test]
    fn test_transfer_rate_adds_largest_withdrawals() {
        // notional = 1 / 2 * 100 = 50
        // fees = 0.05 + 0.1 + 0.0005 * 100 + 2 = 2.2
        assert_eq!(model(true).fee_rate(d("100"), true), d("0.044"));
        // notional = 100, fees = 0.1 + 0.2 + 0.05 + 2 = 2.35
        assert_eq!(model(false).fee_rate(d("100"), true), d("0.0235"));
    }

    #[test]
    fn test_transfer_never_cheaper() {
        let model = model(true);
        for price in ["0.01", "1", "100", "25000.5"] {
            let price = d(price);
            assert!(model.fee_rate(price, true) >= model.fee_rate(price, false));
        }

        let free = FeeModel::new(VenueFees::default(), VenueFees::default(), d("1"), true);
        assert_eq!(free.fee_rate(d("100"), true), free.fee_rate(d("100"), false));
    }

    #[test]
    fn test_zero_notional_gives_zero_rate() {
        assert_eq!(model(true).fee_rate(Decimal::ZERO, true), Decimal::ZERO);

        let empty = FeeModel::new(VenueFees::default(), VenueFees::default(), Decimal::ZERO, false);
        assert_eq!(empty.fee_rate(d("100"), false), Decimal::ZERO);
    }
}
