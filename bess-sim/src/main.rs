use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use bess_model::market::{DataType, ResultKey};
use bess_sim::config::ScenarioFile;
use bess_sim::general::price_data::{CsvPriceProvider, PriceProvider};
use bess_sim::general::{RevenueSummary, ScenarioData, run_scenarios};
use indexmap::IndexMap;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("scenario.toml"));
    let file = ScenarioFile::from_toml_file(&config_path)?;
    let errors = file.validate();
    if !errors.is_empty() {
        for err in &errors {
            error!("{}", err);
        }
        bail!(
            "{} invalid setting(s) in {}",
            errors.len(),
            config_path.display()
        );
    }

    let provider = CsvPriceProvider::new(&file.data_dir);
    let actual = provider
        .get_actual_series(&file.region, file.actual_window())
        .context("loading actual prices")?;
    let forecast = if file.needs_forecast() {
        Some(
            provider
                .get_forecast_series(
                    &file.region,
                    file.forecast_run_window(),
                    file.actual_window(),
                )
                .context("loading forecast prices")?,
        )
    } else {
        None
    };
    info!(
        region = %file.region,
        actual_intervals = actual.len(),
        forecast_runs = forecast.as_ref().map(|f| f.run_times().count()).unwrap_or(0),
        "loaded price data"
    );

    let data = ScenarioData {
        actual: &actual,
        forecast: forecast.as_ref(),
        decision_start: file.window.decision_start,
        decision_end: file.window.decision_end,
    };

    let mut perfect_foresight: IndexMap<ResultKey, RevenueSummary> = IndexMap::new();
    if file.perfect_foresight {
        let results = run_scenarios(&file.perfect_foresight_scenarios()?, &data, file.threads)?;
        results.write_csv(&file.output_dir.join("perfect_foresight"))?;
        perfect_foresight = results.summaries(&actual)?;
        for (key, summary) in &perfect_foresight {
            info!(
                %key,
                revenue = summary.total_revenue,
                full_cycles = summary.full_cycles,
                "perfect foresight summary"
            );
        }
    }

    if !file.data_types.is_empty() {
        for horizon in &file.window.horizon_minutes {
            let results = run_scenarios(
                &file.rolling_horizon_scenarios(*horizon)?,
                &data,
                file.threads,
            )?;
            results.write_csv(&file.output_dir.join(format!("lookahead_{}min", horizon)))?;
            for (key, summary) in results.summaries(&actual)? {
                let benchmark =
                    perfect_foresight.get(&ResultKey::new(DataType::Actual, key.power_rating_mw.0));
                info!(
                    %key,
                    horizon_minutes = horizon,
                    revenue = summary.total_revenue,
                    full_cycles = summary.full_cycles,
                    value_of_perfect_foresight = ?benchmark.map(|pf| pf.value_over(&summary)),
                    "rolling horizon summary"
                );
            }
        }
    }

    info!(output_dir = %file.output_dir.display(), "simulation complete");
    Ok(())
}
