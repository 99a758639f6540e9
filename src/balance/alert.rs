//! Alert hysteresis.

use rust_decimal::Decimal;

/// Emits one alert when a balance drops below its threshold and stays
/// silent until the balance has recovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertLatch {
    armed: bool,
}

impl AlertLatch {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Feeds a balance reading. Returns true exactly when a new alert is due.
    pub fn observe(&mut self, balance: Decimal, threshold: Decimal) -> bool {
        if self.armed {
            if balance >= threshold {
                self.armed = false;
            }
            false
        } else if balance < threshold {
            self.armed = true;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alerts_once_per_drop() {
        let mut latch = AlertLatch::new();
        let threshold = Decimal::from(10);
        let readings = [12, 9, 8, 5, 9, 10, 11, 3, 2];
        let alerts: Vec<bool> = readings
            .iter()
            .map(|b| latch.observe(Decimal::from(*b), threshold))
            .collect();

        assert_eq!(
            alerts,
            vec![false, true, false, false, false, false, false, true, false]
        );
        assert!(latch.is_armed());
    }

    #[test]
    fn test_recovery_at_threshold_disarms() {
        let mut latch = AlertLatch::new();
        let threshold = Decimal::from(10);

        assert!(latch.observe(Decimal::from(9), threshold));
        assert!(!latch.observe(Decimal::from(10), threshold));
        assert!(!latch.is_armed());
        assert!(latch.observe(Decimal::from(9), threshold));
    }

    #[test]
    fn test_zero_threshold_never_alerts() {
        let mut latch = AlertLatch::new();
        assert!(!latch.observe(Decimal::ZERO, Decimal::ZERO));
        assert!(!latch.is_armed());
    }
}
