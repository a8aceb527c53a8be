use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Strike price (AUD/MWh) above which a cap contract pays out.
pub const CAP_STRIKE_PRICE: f64 = 300.0;

/// Weighting applied to each interval's revenue as a function of how far ahead
/// of the decision time it lies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountFunction {
    /// `exp(-rate * hours_ahead)`
    Exponential,
    /// `1 / (1 + rate * hours_ahead)`
    Hyperbolic,
    /// Caller-supplied `f(hours_ahead, rate)`.
    #[serde(skip)]
    Custom(fn(f64, f64) -> f64),
}

impl DiscountFunction {
    pub fn factor(&self, hours_ahead: f64, rate: f64) -> f64 {
        match self {
            DiscountFunction::Exponential => (-rate * hours_ahead).exp(),
            DiscountFunction::Hyperbolic => 1.0 / (1.0 + rate * hours_ahead),
            DiscountFunction::Custom(f) => f(hours_ahead, rate),
        }
    }
}

/// Raised when a formulation carries a parameter no model can be built from.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulationError {
    #[error("invalid {formulation} parameter `{field}`: {reason}")]
    InvalidParameter {
        formulation: &'static str,
        field: &'static str,
        reason: String,
    },
}

/// The closed family of optimisation problems a dispatch model can be built from.
///
/// A formulation is a pure descriptor: it selects which objective terms and
/// constraints the model builder adds, and carries their parameters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Formulation {
    /// Maximise energy arbitrage revenue.
    #[default]
    StandardArbitrage,
    /// Arbitrage with a hard, pro-rata annual ceiling on discharged energy.
    StandardArbitrageThroughputLimit {
        /// Discharged energy allowed per year (MWh).
        annual_limit_mwh: f64,
    },
    /// Arbitrage net of an amortised replacement cost proportional to throughput.
    ArbitrageThroughputPenalty {
        /// Discharged energy over the device's lifetime (MWh).
        lifetime_throughput_mwh: f64,
        /// Replacement cost per MWh of energy capacity (AUD/MWh).
        capital_cost_per_mwh: f64,
    },
    /// Throughput-penalised arbitrage that also carries a cap contract obligation.
    ArbitrageCapContracted {
        lifetime_throughput_mwh: f64,
        capital_cost_per_mwh: f64,
        /// Capacity sold under the cap contract (MW).
        contracted_capacity_mw: f64,
    },
    /// Throughput-penalised arbitrage with revenue discounted by lookahead distance.
    ArbitrageDiscounted {
        lifetime_throughput_mwh: f64,
        capital_cost_per_mwh: f64,
        discount: DiscountFunction,
        /// Discount rate per hour ahead.
        rate: f64,
    },
}

impl Formulation {
    pub fn name(&self) -> &'static str {
        match self {
            Formulation::StandardArbitrage => "standard_arbitrage",
            Formulation::StandardArbitrageThroughputLimit { .. } => {
                "standard_arbitrage_throughput_limit"
            }
            Formulation::ArbitrageThroughputPenalty { .. } => "arbitrage_throughput_penalty",
            Formulation::ArbitrageCapContracted { .. } => "arbitrage_cap_contracted",
            Formulation::ArbitrageDiscounted { .. } => "arbitrage_discounted",
        }
    }

    /// Checks every parameter before any model is built from this formulation.
    pub fn validate(&self) -> Result<(), FormulationError> {
        let name = self.name();
        let invalid = |field, reason: &str| FormulationError::InvalidParameter {
            formulation: name,
            field,
            reason: reason.to_string(),
        };
        let non_negative = |field, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(invalid(field, "must be finite and >= 0"))
            }
        };

        if let Some((lifetime_throughput_mwh, capital_cost_per_mwh)) = self.throughput_penalty() {
            if !(lifetime_throughput_mwh.is_finite() && lifetime_throughput_mwh > 0.0) {
                return Err(invalid("lifetime_throughput_mwh", "must be finite and > 0"));
            }
            non_negative("capital_cost_per_mwh", capital_cost_per_mwh)?;
        }
        match *self {
            Formulation::StandardArbitrage | Formulation::ArbitrageThroughputPenalty { .. } => Ok(()),
            Formulation::StandardArbitrageThroughputLimit { annual_limit_mwh } => {
                non_negative("annual_limit_mwh", annual_limit_mwh)
            }
            Formulation::ArbitrageCapContracted {
                contracted_capacity_mw,
                ..
            } => non_negative("contracted_capacity_mw", contracted_capacity_mw),
            Formulation::ArbitrageDiscounted { rate, .. } => non_negative("rate", rate),
        }
    }

    /// Lifetime throughput and capital cost, for formulations that charge for cycling.
    pub fn throughput_penalty(&self) -> Option<(f64, f64)> {
        match *self {
            Formulation::StandardArbitrage
            | Formulation::StandardArbitrageThroughputLimit { .. } => None,
            Formulation::ArbitrageThroughputPenalty {
                lifetime_throughput_mwh,
                capital_cost_per_mwh,
            }
            | Formulation::ArbitrageCapContracted {
                lifetime_throughput_mwh,
                capital_cost_per_mwh,
                ..
            }
            | Formulation::ArbitrageDiscounted {
                lifetime_throughput_mwh,
                capital_cost_per_mwh,
                ..
            } => Some((lifetime_throughput_mwh, capital_cost_per_mwh)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discount_factors() {
        assert_eq!(DiscountFunction::Exponential.factor(0.0, 0.3), 1.0);
        assert_eq!(DiscountFunction::Hyperbolic.factor(0.0, 0.3), 1.0);
        assert!((DiscountFunction::Exponential.factor(2.0, 0.5) - (-1.0f64).exp()).abs() < 1e-12);
        assert!((DiscountFunction::Hyperbolic.factor(2.0, 0.5) - 0.5).abs() < 1e-12);

        fn linear(hours: f64, rate: f64) -> f64 {
            (1.0 - rate * hours).max(0.0)
        }
        assert_eq!(DiscountFunction::Custom(linear).factor(4.0, 0.5), 0.0);
    }

    #[test]
    fn test_validate_rejects_unusable_parameters() {
        assert!(Formulation::StandardArbitrage.validate().is_ok());
        assert!(Formulation::StandardArbitrageThroughputLimit {
            annual_limit_mwh: 0.0
        }
        .validate()
        .is_ok());

        let field_of = |formulation: Formulation| match formulation.validate() {
            Err(FormulationError::InvalidParameter { field, .. }) => field,
            Ok(()) => panic!("{} should be rejected", formulation.name()),
        };
        assert_eq!(
            field_of(Formulation::ArbitrageThroughputPenalty {
                lifetime_throughput_mwh: 0.0,
                capital_cost_per_mwh: 1000.0,
            }),
            "lifetime_throughput_mwh"
        );
        assert_eq!(
            field_of(Formulation::ArbitrageThroughputPenalty {
                lifetime_throughput_mwh: 1000.0,
                capital_cost_per_mwh: -1.0,
            }),
            "capital_cost_per_mwh"
        );
        assert_eq!(
            field_of(Formulation::StandardArbitrageThroughputLimit {
                annual_limit_mwh: -10.0
            }),
            "annual_limit_mwh"
        );
        assert_eq!(
            field_of(Formulation::ArbitrageCapContracted {
                lifetime_throughput_mwh: 1000.0,
                capital_cost_per_mwh: 1000.0,
                contracted_capacity_mw: -5.0,
            }),
            "contracted_capacity_mw"
        );
        assert_eq!(
            field_of(Formulation::ArbitrageDiscounted {
                lifetime_throughput_mwh: 1000.0,
                capital_cost_per_mwh: 1000.0,
                discount: DiscountFunction::Exponential,
                rate: f64::NAN,
            }),
            "rate"
        );
    }

    #[test]
    fn test_throughput_penalty_parameters() {
        let formulation = Formulation::ArbitrageDiscounted {
            lifetime_throughput_mwh: 1000.0,
            capital_cost_per_mwh: 300000.0,
            discount: DiscountFunction::Hyperbolic,
            rate: 0.1,
        };
        assert_eq!(formulation.name(), "arbitrage_discounted");
        assert_eq!(formulation.throughput_penalty(), Some((1000.0, 300000.0)));
        assert_eq!(Formulation::StandardArbitrage.throughput_penalty(), None);
        assert_eq!(
            Formulation::StandardArbitrageThroughputLimit {
                annual_limit_mwh: 100.0
            }
            .throughput_penalty(),
            None
        );
    }
}
