use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use bess_model::market::{ForecastData, ForecastSample, PriceSeries};
use chrono::NaiveDateTime;
use tracing::debug;

const TIME_FORMATS: [&str; 3] = ["%Y/%m/%d %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Closed time range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: NaiveDateTime) -> bool {
        self.start <= time && time <= self.end
    }
}

/// Source of normalised price data for a market region.
///
/// Implementations return uniformly spaced, sorted, gap-free data; any gap filling happens
/// before the data reaches this interface.
pub trait PriceProvider {
    fn get_actual_series(&self, region: &str, window: TimeWindow) -> Result<PriceSeries>;

    fn get_forecast_series(
        &self,
        region: &str,
        run_window: TimeWindow,
        forecasted_window: TimeWindow,
    ) -> Result<ForecastData>;
}

pub fn parse_time(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| anyhow!("Failed to parse datetime: '{}'", value))
}

fn field<'r>(record: &'r csv::StringRecord, index: usize, line: usize) -> Result<&'r str> {
    record
        .get(index)
        .with_context(|| format!("Missing column {} on line {}", index + 1, line))
}

fn parse_price(value: &str, line: usize) -> Result<f64> {
    value
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse price on line {}: '{}'", line, value))
}

fn filter_actual(series: &PriceSeries, window: TimeWindow) -> Result<PriceSeries> {
    let samples: Vec<(NaiveDateTime, f64)> = series
        .times()
        .iter()
        .zip(series.prices())
        .filter(|(time, _)| window.contains(**time))
        .map(|(time, price)| (*time, *price))
        .collect();
    let (times, prices) = samples.into_iter().unzip();
    PriceSeries::new(times, prices, series.interval())
        .with_context(|| format!("No actual prices within {} to {}", window.start, window.end))
}

fn filter_forecast(
    data: &ForecastData,
    run_window: TimeWindow,
    forecasted_window: TimeWindow,
) -> Result<ForecastData> {
    let samples = data.samples().filter(|sample| {
        run_window.contains(sample.run_time) && forecasted_window.contains(sample.forecasted_time)
    });
    ForecastData::from_samples(samples, data.interval()).with_context(|| {
        format!(
            "No forecasts for runs {} to {}",
            run_window.start, run_window.end
        )
    })
}

/// Keeps already-normalised data in memory, keyed by region.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPriceProvider {
    actual: HashMap<String, PriceSeries>,
    forecast: HashMap<String, ForecastData>,
}

impl InMemoryPriceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actual(mut self, region: &str, series: PriceSeries) -> Self {
        self.actual.insert(region.to_string(), series);
        self
    }

    pub fn with_forecast(mut self, region: &str, data: ForecastData) -> Self {
        self.forecast.insert(region.to_string(), data);
        self
    }
}

impl PriceProvider for InMemoryPriceProvider {
    fn get_actual_series(&self, region: &str, window: TimeWindow) -> Result<PriceSeries> {
        let series = self
            .actual
            .get(region)
            .ok_or_else(|| anyhow!("No actual prices for region {}", region))?;
        filter_actual(series, window)
    }

    fn get_forecast_series(
        &self,
        region: &str,
        run_window: TimeWindow,
        forecasted_window: TimeWindow,
    ) -> Result<ForecastData> {
        let data = self
            .forecast
            .get(region)
            .ok_or_else(|| anyhow!("No forecast prices for region {}", region))?;
        filter_forecast(data, run_window, forecasted_window)
    }
}

/// Reads `{region}_actual.csv` (`time,price`) and `{region}_forecast.csv`
/// (`run_time,forecasted_time,price`) from a data directory.
#[derive(Debug, Clone)]
pub struct CsvPriceProvider {
    data_dir: PathBuf,
}

impl CsvPriceProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn actual_path(&self, region: &str) -> PathBuf {
        self.data_dir.join(format!("{}_actual.csv", region))
    }

    pub fn forecast_path(&self, region: &str) -> PathBuf {
        self.data_dir.join(format!("{}_forecast.csv", region))
    }
}

/// Loads `(time, price)` rows from a CSV file with a header line
///
/// # Arguments
/// * `file_path` - Path to a CSV file with `time` and `price` columns
///
/// # Returns
/// * Samples in file order
pub fn load_actual_prices_from_csv(file_path: &Path) -> Result<Vec<(NaiveDateTime, f64)>> {
    let mut reader = csv::Reader::from_path(file_path)
        .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

    let mut samples = Vec::new();
    for (line_num, result) in reader.records().enumerate() {
        let line = line_num + 2;
        let record = result.with_context(|| format!("Failed to read line {}", line))?;
        let time = parse_time(field(&record, 0, line)?)?;
        let price = parse_price(field(&record, 1, line)?, line)?;
        samples.push((time, price));
    }
    debug!(path = %file_path.display(), rows = samples.len(), "loaded actual prices");
    Ok(samples)
}

/// Loads `(run_time, forecasted_time, price)` rows from a CSV file with a header line
pub fn load_forecast_prices_from_csv(file_path: &Path) -> Result<Vec<ForecastSample>> {
    let mut reader = csv::Reader::from_path(file_path)
        .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

    let mut samples = Vec::new();
    for (line_num, result) in reader.records().enumerate() {
        let line = line_num + 2;
        let record = result.with_context(|| format!("Failed to read line {}", line))?;
        samples.push(ForecastSample {
            run_time: parse_time(field(&record, 0, line)?)?,
            forecasted_time: parse_time(field(&record, 1, line)?)?,
            price: parse_price(field(&record, 2, line)?, line)?,
        });
    }
    debug!(path = %file_path.display(), rows = samples.len(), "loaded forecast prices");
    Ok(samples)
}

impl PriceProvider for CsvPriceProvider {
    fn get_actual_series(&self, region: &str, window: TimeWindow) -> Result<PriceSeries> {
        let mut samples: Vec<_> = load_actual_prices_from_csv(&self.actual_path(region))?
            .into_iter()
            .filter(|(time, _)| window.contains(*time))
            .collect();
        samples.sort_by_key(|(time, _)| *time);
        PriceSeries::from_samples(samples)
            .with_context(|| format!("Invalid actual price series for region {}", region))
    }

    fn get_forecast_series(
        &self,
        region: &str,
        run_window: TimeWindow,
        forecasted_window: TimeWindow,
    ) -> Result<ForecastData> {
        let samples: Vec<ForecastSample> =
            load_forecast_prices_from_csv(&self.forecast_path(region))?
                .into_iter()
                .filter(|sample| {
                    run_window.contains(sample.run_time)
                        && forecasted_window.contains(sample.forecasted_time)
                })
                .collect();

        // Forecast files carry no interval column; take it from the first run's spacing
        let mut by_run: Vec<&ForecastSample> = samples.iter().collect();
        by_run.sort_by_key(|sample| (sample.run_time, sample.forecasted_time));
        let interval = by_run
            .windows(2)
            .find(|pair| pair[0].run_time == pair[1].run_time)
            .map(|pair| pair[1].forecasted_time - pair[0].forecasted_time)
            .ok_or_else(|| anyhow!("Cannot infer forecast interval for region {}", region))?;

        ForecastData::from_samples(samples, interval)
            .with_context(|| format!("Invalid forecast data for region {}", region))
    }
}
