use std::collections::BTreeMap;

use bess_model::formulation::DiscountFunction;
use bess_model::market::{ForecastData, PriceSeries};
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Error thresholds (AUD/MWh) commonly used to characterise forecast quality.
pub const DEFAULT_ERROR_THRESHOLDS: [f64; 3] = [300.0, 1000.0, 10000.0];

/// Latest PREDISPATCH runs per forecasted interval that P5MIN also covers.
pub const PREDISPATCH_OVERLAP_RUNS: usize = 2;

/// Forecast product a set of runs came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastProduct {
    /// Five-minute pre-dispatch.
    P5min,
    /// Half-hourly pre-dispatch.
    Predispatch,
}

impl ForecastProduct {
    /// How long before its published run time a forecast was actually run.
    pub fn run_offset(&self) -> TimeDelta {
        match self {
            ForecastProduct::P5min => TimeDelta::minutes(5),
            ForecastProduct::Predispatch => TimeDelta::minutes(30),
        }
    }
}

/// One forecast sample compared with the price that was realised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceError {
    /// When the forecast was actually run, i.e. its published run time less the product's
    /// run offset.
    pub run_time: NaiveDateTime,
    pub forecasted_time: NaiveDateTime,
    pub ahead_minutes: i64,
    pub forecast_price: f64,
    pub actual_price: f64,
    /// `actual − forecast`
    pub error: f64,
}

/// Joins every forecast sample with the actual price at its forecasted time.
///
/// Ahead times are measured from when `product` actually ran. Samples without a matching
/// actual price are skipped.
pub fn forecast_errors(
    forecast: &ForecastData,
    actual: &PriceSeries,
    product: ForecastProduct,
) -> Vec<PriceError> {
    let offset = product.run_offset();
    forecast
        .samples()
        .filter_map(|sample| {
            let actual_price = actual.price_at(sample.forecasted_time)?;
            let run_time = sample.run_time - offset;
            Some(PriceError {
                run_time,
                forecasted_time: sample.forecasted_time,
                ahead_minutes: (sample.forecasted_time - run_time).num_minutes(),
                forecast_price: sample.price,
                actual_price,
                error: actual_price - sample.price,
            })
        })
        .collect()
}

/// Drops the `runs` latest forecasts of every forecasted interval.
///
/// Used on PREDISPATCH errors before they are pooled with P5MIN, which covers those
/// intervals with [`PREDISPATCH_OVERLAP_RUNS`] fresher runs.
pub fn drop_latest_runs(errors: &[PriceError], runs: usize) -> Vec<PriceError> {
    let mut by_interval: BTreeMap<NaiveDateTime, Vec<PriceError>> = BTreeMap::new();
    for error in errors {
        by_interval.entry(error.forecasted_time).or_default().push(*error);
    }
    by_interval
        .into_values()
        .flat_map(|mut group| {
            group.sort_by_key(|error| error.run_time);
            let keep = group.len().saturating_sub(runs);
            group.truncate(keep);
            group
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdExceedance {
    pub ahead_minutes: i64,
    pub samples: usize,
    pub exceeding: usize,
}

impl ThresholdExceedance {
    pub fn fraction(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.exceeding as f64 / self.samples as f64
        }
    }
}

/// Counts, per ahead time, how many errors have a magnitude of at least `threshold`.
pub fn exceedance_by_ahead_time(errors: &[PriceError], threshold: f64) -> Vec<ThresholdExceedance> {
    let mut counts: BTreeMap<i64, (usize, usize)> = BTreeMap::new();
    for error in errors {
        let entry = counts.entry(error.ahead_minutes).or_default();
        entry.0 += 1;
        if error.error.abs() >= threshold {
            entry.1 += 1;
        }
    }
    counts
        .into_iter()
        .map(|(ahead_minutes, (samples, exceeding))| ThresholdExceedance {
            ahead_minutes,
            samples,
            exceeding,
        })
        .collect()
}

/// Fitted discount rate and the root-mean-square deviation of the fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscountFit {
    pub rate: f64,
    pub rmsd: f64,
}

fn rmsd(function: &DiscountFunction, rate: f64, points: &[(f64, f64)]) -> f64 {
    let sse: f64 = points
        .iter()
        .map(|&(hours, target)| (function.factor(hours, rate) - target).powi(2))
        .sum();
    (sse / points.len() as f64).sqrt()
}

/// Turns exceedance fractions into discount targets: `1 − fraction / max_fraction` against
/// hours ahead. Errors that grow with lead time map onto a decaying curve.
pub fn discount_targets(exceedances: &[ThresholdExceedance]) -> Vec<(f64, f64)> {
    let max_fraction = exceedances
        .iter()
        .map(ThresholdExceedance::fraction)
        .fold(0.0, f64::max);
    if max_fraction <= 0.0 {
        return Vec::new();
    }
    exceedances
        .iter()
        .map(|e| (e.ahead_minutes as f64 / 60.0, 1.0 - e.fraction() / max_fraction))
        .collect()
}

/// Least-squares fit of a discount rate to `(hours_ahead, factor)` points.
///
/// Uses a golden-section search over `[0, max_rate]`; the discount curves are unimodal in
/// the rate for targets within `[0, 1]`.
pub fn fit_discount_rate(
    function: &DiscountFunction,
    points: &[(f64, f64)],
    max_rate: f64,
) -> Option<DiscountFit> {
    if points.is_empty() || !(max_rate > 0.0) {
        return None;
    }
    let ratio = (5.0_f64.sqrt() - 1.0) / 2.0;
    let tolerance = 1e-9;
    let max_iterations = 200;

    let (mut low, mut high) = (0.0, max_rate);
    let mut x1 = high - ratio * (high - low);
    let mut x2 = low + ratio * (high - low);
    let mut f1 = rmsd(function, x1, points);
    let mut f2 = rmsd(function, x2, points);
    for _ in 0..max_iterations {
        if (high - low).abs() < tolerance {
            break;
        }
        if f1 < f2 {
            high = x2;
            x2 = x1;
            f2 = f1;
            x1 = high - ratio * (high - low);
            f1 = rmsd(function, x1, points);
        } else {
            low = x1;
            x1 = x2;
            f1 = f2;
            x2 = low + ratio * (high - low);
            f2 = rmsd(function, x2, points);
        }
    }
    let rate = (low + high) / 2.0;
    Some(DiscountFit {
        rate,
        rmsd: rmsd(function, rate, points),
    })
}
