use bess_model::market::{DataType, ForecastData, PriceSeries, interval_hours};
use chrono::{NaiveDateTime, TimeDelta};

use crate::dispatch::dispatch_utils::ForecastAlignment;
use crate::error::{Result, SimulationError};

/// Prices for one solve: the intervals in `(decision_time, horizon_end]`.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonWindow {
    pub times: Vec<NaiveDateTime>,
    pub prices: Vec<f64>,
}

/// A price source the scheduler can draw lookahead windows from.
pub trait HorizonPrices {
    fn data_type(&self) -> DataType;

    fn interval(&self) -> TimeDelta;

    fn tau_hours(&self) -> f64 {
        interval_hours(self.interval())
    }

    /// Whether a solve may be triggered at `time`.
    fn contains_decision_time(&self, time: NaiveDateTime) -> bool;

    /// Prices visible at `decision_time` for the intervals up to `horizon_end`.
    fn horizon_window(
        &self,
        decision_time: NaiveDateTime,
        horizon_end: NaiveDateTime,
        alignment: ForecastAlignment,
    ) -> Result<HorizonWindow>;
}

fn expected_len(decision_time: NaiveDateTime, horizon_end: NaiveDateTime, interval: TimeDelta) -> usize {
    let span = (horizon_end - decision_time).num_seconds();
    let step = interval.num_seconds();
    if span <= 0 || step <= 0 {
        0
    } else {
        (span / step) as usize
    }
}

impl HorizonPrices for PriceSeries {
    fn data_type(&self) -> DataType {
        DataType::Actual
    }

    fn interval(&self) -> TimeDelta {
        PriceSeries::interval(self)
    }

    fn contains_decision_time(&self, time: NaiveDateTime) -> bool {
        self.contains(time)
    }

    fn horizon_window(
        &self,
        decision_time: NaiveDateTime,
        horizon_end: NaiveDateTime,
        _alignment: ForecastAlignment,
    ) -> Result<HorizonWindow> {
        if self.last_time() < horizon_end {
            return Err(SimulationError::InsufficientData {
                required_end: horizon_end,
                available_end: self.last_time(),
            });
        }
        let (times, prices) = self.window(decision_time, horizon_end);
        if times.len() != expected_len(decision_time, horizon_end, PriceSeries::interval(self)) {
            return Err(SimulationError::InvalidWindow(format!(
                "actual prices do not cover ({decision_time}, {horizon_end}]"
            )));
        }
        Ok(HorizonWindow {
            times: times.to_vec(),
            prices: prices.to_vec(),
        })
    }
}

impl HorizonPrices for ForecastData {
    fn data_type(&self) -> DataType {
        DataType::Forecast
    }

    fn interval(&self) -> TimeDelta {
        ForecastData::interval(self)
    }

    fn contains_decision_time(&self, time: NaiveDateTime) -> bool {
        self.run(time).is_some()
    }

    /// Uses the forecast run issued at `decision_time`.
    fn horizon_window(
        &self,
        decision_time: NaiveDateTime,
        horizon_end: NaiveDateTime,
        alignment: ForecastAlignment,
    ) -> Result<HorizonWindow> {
        let run = self
            .run(decision_time)
            .ok_or(SimulationError::ForecastHorizonMismatch {
                run_time: decision_time,
                expected_end: horizon_end,
                actual_end: None,
            })?;
        let reaches = match alignment {
            ForecastAlignment::Exact => run.last_time() == horizon_end,
            ForecastAlignment::Truncate => run.last_time() >= horizon_end,
        };
        if !reaches {
            return Err(SimulationError::ForecastHorizonMismatch {
                run_time: decision_time,
                expected_end: horizon_end,
                actual_end: Some(run.last_time()),
            });
        }
        let (times, prices) = run.window(decision_time, horizon_end);
        if times.len() != expected_len(decision_time, horizon_end, ForecastData::interval(self)) {
            return Err(SimulationError::InvalidWindow(format!(
                "forecast run at {decision_time} starts at {}, after the first interval",
                run.first_time()
            )));
        }
        Ok(HorizonWindow {
            times: times.to_vec(),
            prices: prices.to_vec(),
        })
    }
}
