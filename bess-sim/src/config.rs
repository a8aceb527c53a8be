//! TOML scenario configuration for batch simulations.

use std::fs;
use std::path::{Path, PathBuf};

use bess_model::formulation::{Formulation, FormulationError};
use bess_model::market::{DataType, ResultKey};
use bess_model::storage::{DegradationModel, StorageDevice, StorageError, StorageParameters};
use chrono::{NaiveDateTime, TimeDelta};
use serde::Deserialize;
use thiserror::Error;

use crate::dispatch::dispatch_utils::{ForecastAlignment, RollingHorizonConfig, SolverOptions};
use crate::general::price_data::TimeWindow;
use crate::general::scenarios::{Scenario, ScenarioKind};

/// Top-level scenario file.
///
/// One file describes a batch: every power rating is simulated against every listed data
/// type for each lookahead horizon, plus an optional perfect-foresight benchmark.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioFile {
    /// Market region, e.g. `"SA1"`.
    pub region: String,
    /// Directory holding `{region}_actual.csv` and `{region}_forecast.csv`.
    pub data_dir: PathBuf,
    /// Directory results are written to.
    pub output_dir: PathBuf,
    /// Worker threads for independent scenarios (0 lets the pool decide).
    pub threads: usize,
    pub data_types: Vec<DataType>,
    pub perfect_foresight: bool,
    pub window: WindowConfig,
    pub storage: StorageConfig,
    pub formulation: Formulation,
    pub degradation: DegradationModel,
    pub solver: SolverOptions,
}

impl Default for ScenarioFile {
    fn default() -> Self {
        Self {
            region: "SA1".to_string(),
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("results"),
            threads: 0,
            data_types: vec![DataType::Actual, DataType::Forecast],
            perfect_foresight: true,
            window: WindowConfig::default(),
            storage: StorageConfig::default(),
            formulation: Formulation::default(),
            degradation: DegradationModel::default(),
            solver: SolverOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub decision_start: NaiveDateTime,
    pub decision_end: NaiveDateTime,
    pub binding_minutes: i64,
    /// One batch is run per lookahead horizon.
    pub horizon_minutes: Vec<i64>,
    pub capture_non_binding: bool,
    pub forecast_alignment: ForecastAlignment,
}

impl Default for WindowConfig {
    fn default() -> Self {
        let start = NaiveDateTime::parse_from_str("2021-01-01 00:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap_or_default();
        Self {
            decision_start: start,
            decision_end: start + TimeDelta::days(1),
            binding_minutes: 5,
            horizon_minutes: vec![60],
            capture_non_binding: false,
            forecast_alignment: ForecastAlignment::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub power_ratings_mw: Vec<f64>,
    /// Energy capacity as hours at rated power.
    pub duration_hours: f64,
    pub soc_min_fraction: f64,
    pub soc_max_fraction: f64,
    pub initial_soc_fraction: f64,
    pub charge_efficiency: f64,
    pub discharge_efficiency: f64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            power_ratings_mw: vec![100.0],
            duration_hours: 2.0,
            soc_min_fraction: 0.0,
            soc_max_fraction: 1.0,
            initial_soc_fraction: 0.5,
            charge_efficiency: 0.9,
            discharge_efficiency: 0.9,
        }
    }
}

/// A configuration value that breaks a constraint, with its dotted field path.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl ScenarioFile {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Checks every field and returns all violations; empty when valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let w = &self.window;
        let s = &self.storage;

        if self.region.trim().is_empty() {
            errors.push(ConfigError::new("region", "must not be empty"));
        }
        if self.data_types.is_empty() && !self.perfect_foresight {
            errors.push(ConfigError::new(
                "data_types",
                "must list at least one data type when perfect_foresight is off",
            ));
        }
        if w.decision_end < w.decision_start {
            errors.push(ConfigError::new(
                "window.decision_end",
                format!("must not precede decision_start ({})", w.decision_start),
            ));
        }
        if w.binding_minutes <= 0 {
            errors.push(ConfigError::new("window.binding_minutes", "must be > 0"));
        }
        if w.horizon_minutes.is_empty() && !self.data_types.is_empty() {
            errors.push(ConfigError::new(
                "window.horizon_minutes",
                "must list at least one horizon",
            ));
        }
        for horizon in &w.horizon_minutes {
            if *horizon < w.binding_minutes {
                errors.push(ConfigError::new(
                    "window.horizon_minutes",
                    format!("{horizon} is shorter than binding_minutes ({})", w.binding_minutes),
                ));
            }
        }
        if s.power_ratings_mw.is_empty() {
            errors.push(ConfigError::new(
                "storage.power_ratings_mw",
                "must list at least one rating",
            ));
        }
        for power in &s.power_ratings_mw {
            if let Err(StorageError::InvalidParameter { field, reason }) = self.storage_device(*power) {
                errors.push(ConfigError::new(
                    &format!("storage ({power} MW)"),
                    format!("{field} {reason}"),
                ));
            }
        }
        if !(0.0..=1.0).contains(&s.initial_soc_fraction) {
            errors.push(ConfigError::new(
                "storage.initial_soc_fraction",
                format!("must be within [0, 1], got {}", s.initial_soc_fraction),
            ));
        }
        if let Err(FormulationError::InvalidParameter { field, reason, .. }) =
            self.formulation.validate()
        {
            errors.push(ConfigError::new(&format!("formulation.{field}"), reason));
        }
        if self.solver.mip_rel_gap < 0.0 {
            errors.push(ConfigError::new("solver.mip_rel_gap", "must be >= 0"));
        }
        errors
    }

    pub fn storage_device(&self, power_rating_mw: f64) -> Result<StorageDevice, StorageError> {
        let s = &self.storage;
        let params = StorageParameters::from_duration(
            power_rating_mw,
            s.duration_hours,
            s.soc_min_fraction,
            s.soc_max_fraction,
            s.charge_efficiency,
            s.discharge_efficiency,
        );
        StorageDevice::new(
            params,
            params.energy_capacity_mwh * s.initial_soc_fraction,
        )
    }

    pub fn rolling_horizon_config(&self, horizon_minutes: i64) -> RollingHorizonConfig {
        RollingHorizonConfig {
            binding: TimeDelta::minutes(self.window.binding_minutes),
            horizon: TimeDelta::minutes(horizon_minutes),
            capture_non_binding: self.window.capture_non_binding,
            formulation: self.formulation,
            degradation: self.degradation,
            forecast_alignment: self.window.forecast_alignment,
            solver: self.solver,
        }
    }

    /// Scenarios for one lookahead horizon: every data type crossed with every power rating.
    pub fn rolling_horizon_scenarios(&self, horizon_minutes: i64) -> Result<Vec<Scenario>, StorageError> {
        let config = self.rolling_horizon_config(horizon_minutes);
        let mut scenarios = Vec::new();
        for data_type in &self.data_types {
            for power in &self.storage.power_ratings_mw {
                scenarios.push(Scenario {
                    key: ResultKey::new(*data_type, *power),
                    storage: self.storage_device(*power)?,
                    kind: ScenarioKind::RollingHorizon(config),
                });
            }
        }
        Ok(scenarios)
    }

    pub fn perfect_foresight_scenarios(&self) -> Result<Vec<Scenario>, StorageError> {
        self.storage
            .power_ratings_mw
            .iter()
            .map(|power| {
                Ok(Scenario {
                    key: ResultKey::new(DataType::Actual, *power),
                    storage: self.storage_device(*power)?,
                    kind: ScenarioKind::PerfectForesight {
                        formulation: self.formulation,
                        degradation: self.degradation,
                        solver: self.solver,
                        binding: TimeDelta::minutes(self.window.binding_minutes),
                    },
                })
            })
            .collect()
    }

    /// Actual prices needed by every run: the decision window plus the longest horizon,
    /// and the binding window past the last decision for reconciliation.
    pub fn actual_window(&self) -> TimeWindow {
        let w = &self.window;
        let lookahead = w
            .horizon_minutes
            .iter()
            .copied()
            .chain(std::iter::once(w.binding_minutes))
            .max()
            .unwrap_or(0);
        TimeWindow::new(w.decision_start, w.decision_end + TimeDelta::minutes(lookahead))
    }

    pub fn forecast_run_window(&self) -> TimeWindow {
        TimeWindow::new(self.window.decision_start, self.window.decision_end)
    }

    pub fn needs_forecast(&self) -> bool {
        self.data_types.contains(&DataType::Forecast)
    }
}
