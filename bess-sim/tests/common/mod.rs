#![allow(dead_code)]

use bess_model::market::{ForecastData, ForecastSample, PriceSeries};
use bess_model::storage::{StorageDevice, StorageParameters};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

pub const TAU: f64 = 1.0 / 12.0;
pub const TOL: f64 = 1e-6;

/// Minutes after 2021-01-01 00:00.
pub fn t(minute: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + TimeDelta::minutes(minute)
}

/// 30 MW / 30 MWh device, 90 % efficient both ways, half full.
pub fn reference_storage() -> StorageDevice {
    StorageDevice::new(
        StorageParameters {
            power_capacity_mw: 30.0,
            energy_capacity_mwh: 30.0,
            soc_min_mwh: 0.0,
            soc_max_mwh: 30.0,
            charge_efficiency: 0.9,
            discharge_efficiency: 0.9,
        },
        15.0,
    )
    .unwrap()
}

/// Five-minute series whose first sample sits at minute 0.
pub fn five_minute_series(prices: &[f64]) -> PriceSeries {
    PriceSeries::from_samples(
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| (t(5 * i as i64), *p))
            .collect(),
    )
    .unwrap()
}

/// Forecast runs at every decision point that reach exactly `horizon_intervals` ahead,
/// echoing the actual prices plus `bias`.
pub fn echo_forecast(actual: &PriceSeries, runs: usize, horizon_intervals: usize, bias: f64) -> ForecastData {
    let mut samples = Vec::new();
    for run in 0..runs {
        let run_time = t(5 * run as i64);
        for ahead in 1..=horizon_intervals {
            let forecasted_time = run_time + TimeDelta::minutes(5 * ahead as i64);
            let price = actual.price_at(forecasted_time).unwrap() + bias;
            samples.push(ForecastSample {
                run_time,
                forecasted_time,
                price,
            });
        }
    }
    ForecastData::from_samples(samples, TimeDelta::minutes(5)).unwrap()
}
