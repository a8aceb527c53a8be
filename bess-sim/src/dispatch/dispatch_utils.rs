use bess_model::formulation::Formulation;
use bess_model::storage::{DegradationModel, StorageDevice};
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Options passed through to the MIP solver for every solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverOptions {
    /// Wall-clock limit per solve; the best incumbent is kept when it expires.
    pub time_limit_seconds: Option<f64>,
    /// Relative MIP gap at which a solve counts as optimal.
    pub mip_rel_gap: f64,
    /// Solver threads per solve (0 lets the solver decide).
    pub threads: u32,
    /// Print solver output.
    pub verbose: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            time_limit_seconds: Some(60.0),
            mip_rel_gap: 1e-4,
            threads: 0,
            verbose: false,
        }
    }
}

/// What to do with a forecast run that extends beyond the horizon end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastAlignment {
    /// The run must end exactly at the horizon end.
    #[default]
    Exact,
    /// Longer runs are trimmed to the horizon end.
    Truncate,
}

/// Everything the rolling-horizon scheduler needs besides the device and prices.
#[derive(Debug, Clone, Copy)]
pub struct RollingHorizonConfig {
    /// Length of the window whose decisions are executed after each solve.
    pub binding: TimeDelta,
    /// Length of the lookahead window each solve considers.
    pub horizon: TimeDelta,
    /// Keep non-binding rows in the output for diagnostics.
    pub capture_non_binding: bool,
    pub formulation: Formulation,
    pub degradation: DegradationModel,
    pub forecast_alignment: ForecastAlignment,
    pub solver: SolverOptions,
}

impl RollingHorizonConfig {
    pub fn new(binding: TimeDelta, horizon: TimeDelta, formulation: Formulation) -> Self {
        Self {
            binding,
            horizon,
            capture_non_binding: false,
            formulation,
            degradation: DegradationModel::default(),
            forecast_alignment: ForecastAlignment::default(),
            solver: SolverOptions::default(),
        }
    }
}

/// Whether a result row was executed or superseded by a later solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultStatus {
    #[serde(rename = "binding")]
    Binding,
    #[serde(rename = "non binding")]
    NonBinding,
}

impl ResultStatus {
    pub fn is_binding(&self) -> bool {
        matches!(self, ResultStatus::Binding)
    }
}

/// One dispatch decision for one interval, produced by the solve triggered at `decision_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResultRow {
    pub simulated_time: NaiveDateTime,
    pub decision_time: NaiveDateTime,
    pub status: ResultStatus,
    pub charge_mw: f64,
    pub discharge_mw: f64,
    pub soc_mwh: f64,
    pub throughput_mwh: f64,
    pub lookahead_minutes: i64,
    /// Optimality gap guaranteed by the solve, `None` when a solver limit was hit.
    pub relative_gap: Option<f64>,
}

impl SimulationResultRow {
    /// Net power delivered to the grid (MW).
    pub fn net_discharge_mw(&self) -> f64 {
        self.discharge_mw - self.charge_mw
    }
}

/// Accumulated rows of a simulation plus the device state after the last binding window.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub rows: Vec<SimulationResultRow>,
    pub final_storage: StorageDevice,
}

impl SimulationOutput {
    pub fn binding_rows(&self) -> impl Iterator<Item = &SimulationResultRow> {
        self.rows.iter().filter(|row| row.status.is_binding())
    }

    pub fn non_binding_rows(&self) -> impl Iterator<Item = &SimulationResultRow> {
        self.rows.iter().filter(|row| !row.status.is_binding())
    }
}
