use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a price series cannot be constructed from the given samples.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PriceSeriesError {
    #[error("price series has {times} times but {prices} prices")]
    LengthMismatch { times: usize, prices: usize },
    #[error("price series is empty")]
    Empty,
    #[error("interval length must be a positive whole number of seconds, got {0}")]
    InvalidInterval(TimeDelta),
    #[error("non-uniform spacing at {at}: expected {expected}, found {found}")]
    NonUniformSpacing {
        at: NaiveDateTime,
        expected: TimeDelta,
        found: TimeDelta,
    },
    #[error("price at {0} is not finite")]
    NonFinitePrice(NaiveDateTime),
}

/// Whether prices are realised market outcomes or forecasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Actual,
    Forecast,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Actual => "actual",
            DataType::Forecast => "forecast",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sorted, gap-free sequence of `(time, price)` samples spaced exactly one
/// interval apart. Times mark the end of each dispatch interval.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    times: Vec<NaiveDateTime>,
    prices: Vec<f64>,
    interval: TimeDelta,
}

impl PriceSeries {
    pub fn new(
        times: Vec<NaiveDateTime>,
        prices: Vec<f64>,
        interval: TimeDelta,
    ) -> Result<Self, PriceSeriesError> {
        if times.len() != prices.len() {
            return Err(PriceSeriesError::LengthMismatch {
                times: times.len(),
                prices: prices.len(),
            });
        }
        if times.is_empty() {
            return Err(PriceSeriesError::Empty);
        }
        // Indexing works in whole seconds
        if interval < TimeDelta::seconds(1) || interval.subsec_nanos() != 0 {
            return Err(PriceSeriesError::InvalidInterval(interval));
        }
        for pair in times.windows(2) {
            let found = pair[1] - pair[0];
            if found != interval {
                return Err(PriceSeriesError::NonUniformSpacing {
                    at: pair[1],
                    expected: interval,
                    found,
                });
            }
        }
        if let Some((time, _)) = times.iter().zip(&prices).find(|(_, p)| !p.is_finite()) {
            return Err(PriceSeriesError::NonFinitePrice(*time));
        }
        Ok(Self {
            times,
            prices,
            interval,
        })
    }

    /// Builds a series whose interval is inferred from the first two samples.
    pub fn from_samples(samples: Vec<(NaiveDateTime, f64)>) -> Result<Self, PriceSeriesError> {
        if samples.len() < 2 {
            return Err(PriceSeriesError::Empty);
        }
        let interval = samples[1].0 - samples[0].0;
        let (times, prices) = samples.into_iter().unzip();
        Self::new(times, prices, interval)
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    /// Interval length in hours (τ).
    pub fn tau_hours(&self) -> f64 {
        interval_hours(self.interval)
    }

    pub fn first_time(&self) -> NaiveDateTime {
        self.times[0]
    }

    pub fn last_time(&self) -> NaiveDateTime {
        self.times[self.times.len() - 1]
    }

    /// Position of `time` in the series, computed from the uniform spacing.
    pub fn index_of(&self, time: NaiveDateTime) -> Option<usize> {
        let offset = time - self.first_time();
        if offset < TimeDelta::zero() {
            return None;
        }
        let step = self.interval.num_seconds();
        let offset = offset.num_seconds();
        if offset % step != 0 {
            return None;
        }
        let index = usize::try_from(offset / step).ok()?;
        (index < self.times.len()).then_some(index)
    }

    pub fn contains(&self, time: NaiveDateTime) -> bool {
        self.index_of(time).is_some()
    }

    pub fn price_at(&self, time: NaiveDateTime) -> Option<f64> {
        self.index_of(time).map(|i| self.prices[i])
    }

    /// Samples with times in the half-open window `(after, until]`.
    pub fn window(&self, after: NaiveDateTime, until: NaiveDateTime) -> (&[NaiveDateTime], &[f64]) {
        let start = self.times.partition_point(|t| *t <= after);
        let end = self.times.partition_point(|t| *t <= until);
        let end = end.max(start);
        (&self.times[start..end], &self.prices[start..end])
    }
}

/// Converts an interval length to fractional hours.
pub fn interval_hours(interval: TimeDelta) -> f64 {
    interval.num_seconds() as f64 / 3600.0
}

/// One `(run_time, forecasted_time, price)` forecast sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    pub run_time: NaiveDateTime,
    pub forecasted_time: NaiveDateTime,
    pub price: f64,
}

/// Price forecasts keyed by the time each forecast run was issued.
///
/// Every run is itself a [`PriceSeries`], so forecasted times within a run are
/// contiguous and share the same interval.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastData {
    runs: BTreeMap<NaiveDateTime, PriceSeries>,
    interval: TimeDelta,
}

impl ForecastData {
    pub fn from_samples(
        samples: impl IntoIterator<Item = ForecastSample>,
        interval: TimeDelta,
    ) -> Result<Self, PriceSeriesError> {
        let mut grouped: BTreeMap<NaiveDateTime, Vec<(NaiveDateTime, f64)>> = BTreeMap::new();
        for sample in samples {
            grouped
                .entry(sample.run_time)
                .or_default()
                .push((sample.forecasted_time, sample.price));
        }
        if grouped.is_empty() {
            return Err(PriceSeriesError::Empty);
        }
        let mut runs = BTreeMap::new();
        for (run_time, mut points) in grouped {
            points.sort_by_key(|(time, _)| *time);
            let (times, prices) = points.into_iter().unzip();
            runs.insert(run_time, PriceSeries::new(times, prices, interval)?);
        }
        Ok(Self { runs, interval })
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    pub fn tau_hours(&self) -> f64 {
        interval_hours(self.interval)
    }

    pub fn run(&self, run_time: NaiveDateTime) -> Option<&PriceSeries> {
        self.runs.get(&run_time)
    }

    pub fn run_times(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.runs.keys().copied()
    }

    pub fn runs(&self) -> impl Iterator<Item = (NaiveDateTime, &PriceSeries)> + '_ {
        self.runs.iter().map(|(run_time, series)| (*run_time, series))
    }

    pub fn samples(&self) -> impl Iterator<Item = ForecastSample> + '_ {
        self.runs.iter().flat_map(|(run_time, series)| {
            series
                .times()
                .iter()
                .zip(series.prices())
                .map(move |(forecasted_time, price)| ForecastSample {
                    run_time: *run_time,
                    forecasted_time: *forecasted_time,
                    price: *price,
                })
        })
    }
}
