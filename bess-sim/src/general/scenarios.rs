use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use bess_model::formulation::Formulation;
use bess_model::market::{DataType, ForecastData, PriceSeries, ResultKey};
use bess_model::storage::{DegradationModel, StorageDevice};
use chrono::{NaiveDateTime, TimeDelta};
use indexmap::IndexMap;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::dispatch::dispatch_utils::{
    RollingHorizonConfig, SimulationOutput, SimulationResultRow, SolverOptions,
};
use crate::dispatch::perfect_foresight::run_perfect_foresight;
use crate::dispatch::price_window::HorizonPrices;
use crate::dispatch::rolling_horizon::run_rolling_horizon;
use crate::general::reconciliation::{RevenueSummary, reconcile};

#[derive(Debug, Clone, Copy)]
pub enum ScenarioKind {
    RollingHorizon(RollingHorizonConfig),
    /// Benchmark solved once over the intervals the rolling runs execute. Decision points
    /// include the decision end, so the period runs one `binding` window past it.
    PerfectForesight {
        formulation: Formulation,
        degradation: DegradationModel,
        solver: SolverOptions,
        binding: TimeDelta,
    },
}

/// One independent simulation. Each scenario owns its starting device snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub key: ResultKey,
    pub storage: StorageDevice,
    pub kind: ScenarioKind,
}

/// Price data and decision window shared read-only by every scenario in a batch.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioData<'a> {
    pub actual: &'a PriceSeries,
    pub forecast: Option<&'a ForecastData>,
    pub decision_start: NaiveDateTime,
    pub decision_end: NaiveDateTime,
}

/// Outputs of a batch keyed by `(data_type, power_rating)`, in scenario order.
#[derive(Debug, Clone, Default)]
pub struct ScenarioResults {
    pub outputs: IndexMap<ResultKey, SimulationOutput>,
    pub failures: Vec<(ResultKey, String)>,
}

fn run_scenario(scenario: &Scenario, data: &ScenarioData) -> Result<SimulationOutput> {
    match &scenario.kind {
        ScenarioKind::RollingHorizon(config) => {
            let prices: &dyn HorizonPrices = match scenario.key.data_type {
                DataType::Actual => data.actual,
                DataType::Forecast => data
                    .forecast
                    .ok_or_else(|| anyhow!("no forecast data loaded for {}", scenario.key))?,
            };
            Ok(run_rolling_horizon(
                &scenario.storage,
                prices,
                data.decision_start,
                data.decision_end,
                config,
            )?)
        }
        ScenarioKind::PerfectForesight {
            formulation,
            degradation,
            solver,
            binding,
        } => Ok(run_perfect_foresight(
            &scenario.storage,
            data.actual,
            data.decision_start,
            data.decision_end + *binding,
            formulation,
            *degradation,
            solver,
        )?),
    }
}

/// Runs independent scenarios on a dedicated thread pool.
///
/// A failing scenario is recorded in [`ScenarioResults::failures`] and does not stop the
/// others. `threads == 0` lets rayon pick the pool size.
pub fn run_scenarios(
    scenarios: &[Scenario],
    data: &ScenarioData,
    threads: usize,
) -> Result<ScenarioResults> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("building Rayon thread pool for scenario runs")?;

    info!(scenarios = scenarios.len(), threads, "running scenarios");
    let outcomes: Vec<(ResultKey, Result<SimulationOutput>)> = pool.install(|| {
        scenarios
            .par_iter()
            .map(|scenario| (scenario.key, run_scenario(scenario, data)))
            .collect()
    });

    let mut results = ScenarioResults::default();
    for (key, outcome) in outcomes {
        match outcome {
            Ok(output) => {
                if results.outputs.insert(key, output).is_some() {
                    warn!(%key, "duplicate scenario key, keeping the later result");
                }
            }
            Err(err) => {
                warn!(%key, error = %format!("{:#}", err), "scenario failed");
                results.failures.push((key, format!("{:#}", err)));
            }
        }
    }
    info!(
        success = results.outputs.len(),
        failure = results.failures.len(),
        "scenarios finished"
    );
    Ok(results)
}

impl ScenarioResults {
    pub fn get(&self, key: &ResultKey) -> Option<&SimulationOutput> {
        self.outputs.get(key)
    }

    /// Reconciles every output against `actual` and summarises its binding rows.
    pub fn summaries(&self, actual: &PriceSeries) -> Result<IndexMap<ResultKey, RevenueSummary>> {
        self.outputs
            .iter()
            .map(|(key, output)| {
                let reconciled = reconcile(&output.rows, actual)
                    .with_context(|| format!("reconciling {}", key))?;
                let summary = RevenueSummary::from_reconciled(
                    &reconciled,
                    actual.tau_hours(),
                    output.final_storage.energy_capacity_mwh(),
                );
                Ok((*key, summary))
            })
            .collect()
    }

    /// Writes one `{data_type}_{rating}MW.csv` file per key into `dir`.
    pub fn write_csv(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory '{}'", dir.display()))?;
        let mut paths = Vec::with_capacity(self.outputs.len());
        for (key, output) in &self.outputs {
            let path = dir.join(format!("{}.csv", key.file_stem()));
            write_result_rows(&path, &output.rows)?;
            paths.push(path);
        }
        Ok(paths)
    }
}

pub fn write_result_rows(path: &Path, rows: &[SimulationResultRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("creating CSV writer for {}", path.display()))?;
    for row in rows {
        wtr.serialize(row).context("writing CSV record")?;
    }
    wtr.flush().context("flushing CSV writer")?;
    Ok(())
}

pub fn read_result_rows(path: &Path) -> Result<Vec<SimulationResultRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    reader
        .deserialize()
        .enumerate()
        .map(|(line_num, record)| {
            record.with_context(|| format!("Failed to read line {}", line_num + 2))
        })
        .collect()
}
