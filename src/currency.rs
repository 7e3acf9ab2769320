//! Currency codes and the conversion engine

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{CoreError, CoreResult};

/// Supported currency codes.
///
/// The set is closed: anything outside it is rejected at the type
/// boundary rather than coerced at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    INR,
    USD,
    EUR,
    GBP,
    AED,
    SGD,
    AUD,
    CAD,
    JPY,
    CNY,
    CHF,
    HKD,
    NZD,
    SAR,
    ZAR,
    LKR,
    BHD,
    KWD,
    OMR,
    QAR,
}

impl Currency {
    pub const ALL: [Currency; 20] = [
        Currency::INR,
        Currency::USD,
        Currency::EUR,
        Currency::GBP,
        Currency::AED,
        Currency::SGD,
        Currency::AUD,
        Currency::CAD,
        Currency::JPY,
        Currency::CNY,
        Currency::CHF,
        Currency::HKD,
        Currency::NZD,
        Currency::SAR,
        Currency::ZAR,
        Currency::LKR,
        Currency::BHD,
        Currency::KWD,
        Currency::OMR,
        Currency::QAR,
    ];

    /// ISO-4217 alphabetic code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::INR => "INR",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::AED => "AED",
            Currency::SGD => "SGD",
            Currency::AUD => "AUD",
            Currency::CAD => "CAD",
            Currency::JPY => "JPY",
            Currency::CNY => "CNY",
            Currency::CHF => "CHF",
            Currency::HKD => "HKD",
            Currency::NZD => "NZD",
            Currency::SAR => "SAR",
            Currency::ZAR => "ZAR",
            Currency::LKR => "LKR",
            Currency::BHD => "BHD",
            Currency::KWD => "KWD",
            Currency::OMR => "OMR",
            Currency::QAR => "QAR",
        }
    }

    /// ISO-4217 minor unit exponent (2 for most currencies, 0 for JPY,
    /// 3 for the dinar/rial family).
    pub fn minor_unit(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            Currency::BHD | Currency::KWD | Currency::OMR => 3,
            _ => 2,
        }
    }

    /// One minor unit as a decimal amount, e.g. 0.01 for USD, 1 for JPY.
    pub fn minor_unit_value(&self) -> BigDecimal {
        BigDecimal::from(1) / BigDecimal::from(10u64.pow(self.minor_unit()))
    }
}

impl FromStr for Currency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Currency::ALL
            .iter()
            .copied()
            .find(|currency| currency.code() == code)
            .ok_or(CoreError::UnknownCurrency(code))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of revaluing an amount against its recorded baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainLossKind {
    Gain,
    Loss,
    Neutral,
}

impl fmt::Display for GainLossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GainLossKind::Gain => "gain",
            GainLossKind::Loss => "loss",
            GainLossKind::Neutral => "neutral",
        };
        f.write_str(name)
    }
}

/// Converts amounts between currencies and classifies revaluation
/// outcomes against a previously recorded baseline.
#[derive(Debug, Clone)]
pub struct CurrencyConverter {
    neutral_tolerance: BigDecimal,
}

impl CurrencyConverter {
    pub fn new(neutral_tolerance: BigDecimal) -> Self {
        Self { neutral_tolerance }
    }

    /// Convert `amount` from one currency to another at `rate`.
    ///
    /// A rate of zero means "not yet available" and is rejected here;
    /// storing a pending zero rate is the caller's concern.
    pub fn convert(
        &self,
        amount: &BigDecimal,
        from: Currency,
        to: Currency,
        rate: &BigDecimal,
    ) -> CoreResult<BigDecimal> {
        if *rate <= BigDecimal::from(0) {
            return Err(CoreError::RateNotPositive { rate: rate.clone() });
        }
        tracing::debug!(%from, %to, %rate, "converting amount");
        Ok(amount * rate)
    }

    /// Classify a converted amount against the expected baseline.
    /// Ties within the neutral tolerance are neither gain nor loss.
    pub fn classify(&self, expected: &BigDecimal, converted: &BigDecimal) -> GainLossKind {
        let delta = converted - expected;
        if delta.abs() <= self.neutral_tolerance {
            GainLossKind::Neutral
        } else if delta > BigDecimal::from(0) {
            GainLossKind::Gain
        } else {
            GainLossKind::Loss
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter() -> CurrencyConverter {
        CurrencyConverter::new(BigDecimal::from(1) / BigDecimal::from(100))
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!("USD".parse::<Currency>().unwrap(), Currency::USD);
        assert_eq!(" inr ".parse::<Currency>().unwrap(), Currency::INR);

        let err = "XYZ".parse::<Currency>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownCurrency(code) if code == "XYZ"));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(Currency::USD.minor_unit(), 2);
        assert_eq!(Currency::JPY.minor_unit(), 0);
        assert_eq!(Currency::KWD.minor_unit(), 3);

        assert_eq!(
            Currency::USD.minor_unit_value(),
            BigDecimal::from(1) / BigDecimal::from(100)
        );
        assert_eq!(Currency::JPY.minor_unit_value(), BigDecimal::from(1));
    }

    #[test]
    fn test_convert_applies_rate() {
        let converted = converter()
            .convert(
                &BigDecimal::from(100),
                Currency::USD,
                Currency::INR,
                &BigDecimal::from(83),
            )
            .unwrap();
        assert_eq!(converted, BigDecimal::from(8300));
    }

    #[test]
    fn test_convert_rejects_non_positive_rate() {
        let err = converter()
            .convert(
                &BigDecimal::from(100),
                Currency::USD,
                Currency::INR,
                &BigDecimal::from(0),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::RateNotPositive { .. }));
    }

    #[test]
    fn test_convert_round_trip() {
        let c = converter();
        let rate: BigDecimal = "1.25".parse().unwrap();
        let inverse = BigDecimal::from(1) / &rate;

        let there = c
            .convert(&BigDecimal::from(400), Currency::USD, Currency::EUR, &rate)
            .unwrap();
        let back = c
            .convert(&there, Currency::EUR, Currency::USD, &inverse)
            .unwrap();

        let delta = (back - BigDecimal::from(400)).abs();
        assert!(delta < "0.000001".parse::<BigDecimal>().unwrap());
    }

    #[test]
    fn test_classify_gain_loss_neutral() {
        let c = converter();
        let expected = BigDecimal::from(1000);

        assert_eq!(c.classify(&expected, &BigDecimal::from(1010)), GainLossKind::Gain);
        assert_eq!(c.classify(&expected, &BigDecimal::from(990)), GainLossKind::Loss);
        assert_eq!(c.classify(&expected, &BigDecimal::from(1000)), GainLossKind::Neutral);

        // a tie within the tolerance stays neutral
        let near: BigDecimal = "1000.005".parse().unwrap();
        assert_eq!(c.classify(&expected, &near), GainLossKind::Neutral);
    }
}
