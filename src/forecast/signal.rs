use crate::config::SignalConfig;
use crate::domain::{ForecastComparison, TradingSignal};

/// Tolerance-band classifier. Stateless: each delta is judged on its own.
#[derive(Debug, Clone, Copy)]
pub struct SignalClassifier {
    tolerance_mw: f64,
}

impl SignalClassifier {
    pub fn new(tolerance_mw: f64) -> Self {
        Self { tolerance_mw }
    }

    pub fn from_config(cfg: &SignalConfig) -> Self {
        Self::new(cfg.tolerance_mw)
    }

    /// SHORT above `+tolerance`, LONG below `-tolerance`, HOLD on or inside the band.
    pub fn classify(&self, delta_mw: f64) -> TradingSignal {
        if delta_mw > self.tolerance_mw {
            TradingSignal::Short
        } else if delta_mw < -self.tolerance_mw {
            TradingSignal::Long
        } else {
            TradingSignal::Hold
        }
    }

    pub fn apply(&self, comparison: &mut ForecastComparison) {
        comparison.signal = Some(self.classify(comparison.delta_mw));
    }
}

impl Default for SignalClassifier {
    fn default() -> Self {
        Self::from_config(&SignalConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, TradingSignal::Hold)]
    #[case(500.0, TradingSignal::Hold)]
    #[case(-500.0, TradingSignal::Hold)]
    #[case(500.01, TradingSignal::Short)]
    #[case(-500.01, TradingSignal::Long)]
    #[case(600.0, TradingSignal::Short)]
    #[case(-2500.0, TradingSignal::Long)]
    fn test_tolerance_band(#[case] delta: f64, #[case] expected: TradingSignal) {
        assert_eq!(SignalClassifier::default().classify(delta), expected);
    }

    #[test]
    fn test_zero_tolerance() {
        let classifier = SignalClassifier::new(0.0);
        assert_eq!(classifier.classify(0.0), TradingSignal::Hold);
        assert_eq!(classifier.classify(0.1), TradingSignal::Short);
    }
}
