use bess_model::storage::StorageDevice;
use chrono::{NaiveDateTime, TimeDelta};
use tracing::{debug, info, instrument, warn};

use crate::dispatch::dispatch_utils::{
    ResultStatus, RollingHorizonConfig, SimulationOutput, SimulationResultRow,
};
use crate::dispatch::model_builder::{HighsSolver, SolvedModel, WindowSolver};
use crate::dispatch::price_window::HorizonPrices;
use crate::error::{Result, SimulationError};

/// Interval offsets for one rolling-horizon iteration, counted from the decision start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodStep {
    pub decision_index: usize,
    pub binding_start_index: usize,
    pub binding_end_index: usize,
    pub horizon_end_index: usize,
}

/// Decision points, binding windows and horizon ends, derived once before the loop runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationPeriodPlan {
    decision_start: NaiveDateTime,
    interval: TimeDelta,
    steps: Vec<PeriodStep>,
}

fn intervals_in(span: TimeDelta, interval: TimeDelta, what: &str) -> Result<usize> {
    let step = interval.num_seconds();
    let secs = span.num_seconds();
    if secs <= 0 || secs % step != 0 {
        return Err(SimulationError::InvalidWindow(format!(
            "{what} of {span} is not a positive multiple of the {interval} interval"
        )));
    }
    Ok((secs / step) as usize)
}

impl SimulationPeriodPlan {
    /// Plans decision points `start, start + binding, …, end`.
    pub fn new(
        decision_start: NaiveDateTime,
        decision_end: NaiveDateTime,
        binding: TimeDelta,
        horizon: TimeDelta,
        interval: TimeDelta,
    ) -> Result<Self> {
        if interval < TimeDelta::seconds(1) || interval.subsec_nanos() != 0 {
            return Err(SimulationError::InvalidWindow(format!(
                "interval must be a positive whole number of seconds, got {interval}"
            )));
        }
        if decision_end < decision_start {
            return Err(SimulationError::InvalidWindow(format!(
                "decision end {decision_end} precedes decision start {decision_start}"
            )));
        }
        let binding_len = intervals_in(binding, interval, "binding window")?;
        let horizon_len = intervals_in(horizon, interval, "horizon")?;
        if binding_len > horizon_len {
            return Err(SimulationError::InvalidWindow(format!(
                "binding window {binding} exceeds horizon {horizon}"
            )));
        }

        let period = decision_end - decision_start;
        if period.num_seconds() % binding.num_seconds() != 0 {
            return Err(SimulationError::IndivisibleWindow { period, binding });
        }
        let iterations = (period.num_seconds() / binding.num_seconds()) as usize + 1;

        let steps = (0..iterations)
            .map(|k| {
                let decision_index = k * binding_len;
                PeriodStep {
                    decision_index,
                    binding_start_index: decision_index + 1,
                    binding_end_index: decision_index + binding_len,
                    horizon_end_index: decision_index + horizon_len,
                }
            })
            .collect();

        Ok(Self {
            decision_start,
            interval,
            steps,
        })
    }

    pub fn steps(&self) -> &[PeriodStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn time_at(&self, index: usize) -> NaiveDateTime {
        self.decision_start + TimeDelta::seconds(self.interval.num_seconds() * index as i64)
    }

    /// Latest interval any solve in the plan looks at.
    pub fn required_end(&self) -> NaiveDateTime {
        self.steps
            .last()
            .map(|step| self.time_at(step.horizon_end_index))
            .unwrap_or(self.decision_start)
    }
}

fn collect_rows(
    solved: &SolvedModel,
    decision_time: NaiveDateTime,
    lookahead_minutes: i64,
    capture_non_binding: bool,
    rows: &mut Vec<SimulationResultRow>,
) {
    for (t, &simulated_time) in solved.times.iter().enumerate() {
        let status = if t <= solved.binding_end_index {
            ResultStatus::Binding
        } else {
            ResultStatus::NonBinding
        };
        if !status.is_binding() && !capture_non_binding {
            continue;
        }
        rows.push(SimulationResultRow {
            simulated_time,
            decision_time,
            status,
            charge_mw: solved.charge_mw[t],
            discharge_mw: solved.discharge_mw[t],
            soc_mwh: solved.soc_mwh[t],
            throughput_mwh: solved.throughput_mwh[t],
            lookahead_minutes,
            relative_gap: solved.relative_gap,
        });
    }
}

/// Carries the binding-window end state into the next device snapshot.
///
/// Solver tolerances can leave values marginally outside the device bounds, so they are
/// clamped before the snapshot is validated.
pub(crate) fn advance_storage(storage: &StorageDevice, solved: &SolvedModel) -> Result<StorageDevice> {
    let (soc, throughput) = solved.binding_end_state();
    let soc = soc.clamp(storage.soc_min_mwh(), storage.soc_max_mwh());
    let throughput = throughput.max(storage.throughput_mwh());
    Ok(storage.advance(soc, throughput)?)
}

/// Runs the rolling-horizon dispatch loop from `decision_start` to `decision_end` inclusive.
///
/// Every precondition is checked before the first solve. Iterations run strictly in
/// order because each one starts from the state the previous binding window left behind.
pub fn run_rolling_horizon<P>(
    storage: &StorageDevice,
    prices: &P,
    decision_start: NaiveDateTime,
    decision_end: NaiveDateTime,
    config: &RollingHorizonConfig,
) -> Result<SimulationOutput>
where
    P: HorizonPrices + ?Sized,
{
    run_rolling_horizon_with(
        storage,
        prices,
        decision_start,
        decision_end,
        config,
        &HighsSolver,
    )
}

/// [`run_rolling_horizon`] with each window handed to `solver`.
///
/// A window stopped at a solver limit is kept and the run continues from its end state.
#[instrument(
    skip(storage, prices, config, solver),
    fields(
        data_type = %prices.data_type(),
        binding = %config.binding,
        horizon = %config.horizon,
        formulation = config.formulation.name()
    )
)]
pub fn run_rolling_horizon_with<P, S>(
    storage: &StorageDevice,
    prices: &P,
    decision_start: NaiveDateTime,
    decision_end: NaiveDateTime,
    config: &RollingHorizonConfig,
    solver: &S,
) -> Result<SimulationOutput>
where
    P: HorizonPrices + ?Sized,
    S: WindowSolver + ?Sized,
{
    for time in [decision_start, decision_end] {
        if !prices.contains_decision_time(time) {
            return Err(SimulationError::TimeNotInSeries(time));
        }
    }
    let plan = SimulationPeriodPlan::new(
        decision_start,
        decision_end,
        config.binding,
        config.horizon,
        prices.interval(),
    )?;

    // Fail on missing or misaligned data before spending any time in the solver
    for step in plan.steps() {
        let decision_time = plan.time_at(step.decision_index);
        if !prices.contains_decision_time(decision_time) {
            return Err(SimulationError::TimeNotInSeries(decision_time));
        }
        prices.horizon_window(
            decision_time,
            plan.time_at(step.horizon_end_index),
            config.forecast_alignment,
        )?;
    }

    info!(
        iterations = plan.len(),
        required_end = %plan.required_end(),
        "starting rolling horizon simulation"
    );

    let tau = prices.tau_hours();
    let lookahead_minutes = config.horizon.num_minutes();
    let mut current = *storage;
    let mut rows = Vec::new();

    for step in plan.steps() {
        let decision_time = plan.time_at(step.decision_index);
        let window = prices.horizon_window(
            decision_time,
            plan.time_at(step.horizon_end_index),
            config.forecast_alignment,
        )?;
        let solved = solver.solve_window(
            &current,
            &window.prices,
            &window.times,
            tau,
            plan.time_at(step.binding_end_index),
            &config.formulation,
            config.degradation,
            &config.solver,
        )?;

        if solved.status.is_limit() {
            warn!(
                %decision_time,
                status = ?solved.status,
                "continuing from a window stopped at a solver limit"
            );
        }
        collect_rows(
            &solved,
            decision_time,
            lookahead_minutes,
            config.capture_non_binding,
            &mut rows,
        );
        current = advance_storage(&current, &solved)?;
        debug!(
            %decision_time,
            soc_mwh = current.soc_mwh(),
            throughput_mwh = current.throughput_mwh(),
            objective = solved.objective_value,
            "advanced storage"
        );
    }

    info!(
        rows = rows.len(),
        final_soc_mwh = current.soc_mwh(),
        final_throughput_mwh = current.throughput_mwh(),
        "finished rolling horizon simulation"
    );

    Ok(SimulationOutput {
        rows,
        final_storage: current,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::dispatch_utils::SolverOptions;
    use crate::dispatch::model_builder::SolveStatus;
    use bess_model::formulation::Formulation;
    use bess_model::market::PriceSeries;
    use bess_model::storage::{DegradationModel, StorageParameters};
    use chrono::NaiveDate;
    use std::cell::Cell;
    use std::time::Duration;

    /// Discharges a fixed power in every interval; the first window stops at a time limit.
    struct ConstantDischarge {
        power_mw: f64,
        calls: Cell<usize>,
    }

    impl WindowSolver for ConstantDischarge {
        fn solve_window(
            &self,
            storage: &StorageDevice,
            prices: &[f64],
            times: &[NaiveDateTime],
            tau: f64,
            binding_end_time: NaiveDateTime,
            _formulation: &Formulation,
            _degradation: DegradationModel,
            options: &SolverOptions,
        ) -> Result<SolvedModel> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            let n = prices.len();
            let drained = self.power_mw * tau / storage.discharge_efficiency();
            let status = if call == 0 {
                SolveStatus::TimeLimit
            } else {
                SolveStatus::Optimal
            };
            Ok(SolvedModel {
                times: times.to_vec(),
                charge_mw: vec![0.0; n],
                discharge_mw: vec![self.power_mw; n],
                soc_mwh: (1..=n)
                    .map(|i| storage.soc_mwh() - drained * i as f64)
                    .collect(),
                throughput_mwh: (1..=n)
                    .map(|i| storage.throughput_mwh() + self.power_mw * tau * i as f64)
                    .collect(),
                objective_value: 0.0,
                status,
                relative_gap: (status == SolveStatus::Optimal).then_some(options.mip_rel_gap),
                binding_end_index: times
                    .iter()
                    .position(|t| *t == binding_end_time)
                    .ok_or(SimulationError::TimeNotInSeries(binding_end_time))?,
                solve_duration: Duration::ZERO,
            })
        }
    }

    fn t(minute: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + TimeDelta::minutes(minute)
    }

    #[test]
    fn test_run_continues_from_a_window_stopped_at_a_limit() {
        let storage = StorageDevice::new(
            StorageParameters {
                power_capacity_mw: 12.0,
                energy_capacity_mwh: 12.0,
                soc_min_mwh: 0.0,
                soc_max_mwh: 12.0,
                charge_efficiency: 1.0,
                discharge_efficiency: 1.0,
            },
            6.0,
        )
        .unwrap();
        let actual =
            PriceSeries::from_samples((0..6).map(|i| (t(5 * i), 50.0)).collect()).unwrap();
        let config = RollingHorizonConfig::new(
            TimeDelta::minutes(5),
            TimeDelta::minutes(10),
            Formulation::StandardArbitrage,
        );
        let solver = ConstantDischarge {
            power_mw: 12.0,
            calls: Cell::new(0),
        };

        let output =
            run_rolling_horizon_with(&storage, &actual, t(0), t(10), &config, &solver).unwrap();

        assert_eq!(solver.calls.get(), 3);
        assert_eq!(output.rows.len(), 3);
        assert_eq!(output.rows[0].relative_gap, None);
        assert_eq!(output.rows[1].relative_gap, Some(1e-4));
        // Each binding interval drains 1 MWh from wherever the previous window ended
        for (row, expected) in output.rows.iter().zip([5.0, 4.0, 3.0]) {
            assert!((row.soc_mwh - expected).abs() < 1e-9);
        }
        assert!((output.final_storage.soc_mwh() - 3.0).abs() < 1e-9);
        assert!((output.final_storage.throughput_mwh() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_plan_enumerates_inclusive_decision_points() {
        let plan = SimulationPeriodPlan::new(
            t(0),
            t(30),
            TimeDelta::minutes(15),
            TimeDelta::minutes(60),
            TimeDelta::minutes(5),
        )
        .unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(
            plan.steps()[1],
            PeriodStep {
                decision_index: 3,
                binding_start_index: 4,
                binding_end_index: 6,
                horizon_end_index: 15,
            }
        );
        assert_eq!(plan.time_at(plan.steps()[2].decision_index), t(30));
        assert_eq!(plan.required_end(), t(90));
    }

    #[test]
    fn test_plan_rejects_indivisible_period() {
        let result = SimulationPeriodPlan::new(
            t(0),
            t(25),
            TimeDelta::minutes(10),
            TimeDelta::minutes(30),
            TimeDelta::minutes(5),
        );
        assert!(matches!(
            result,
            Err(SimulationError::IndivisibleWindow { .. })
        ));
    }

    #[test]
    fn test_plan_rejects_binding_longer_than_horizon() {
        let result = SimulationPeriodPlan::new(
            t(0),
            t(30),
            TimeDelta::minutes(30),
            TimeDelta::minutes(10),
            TimeDelta::minutes(5),
        );
        assert!(matches!(result, Err(SimulationError::InvalidWindow(_))));
    }

    #[test]
    fn test_plan_rejects_windows_off_the_interval_grid() {
        let result = SimulationPeriodPlan::new(
            t(0),
            t(14),
            TimeDelta::minutes(7),
            TimeDelta::minutes(14),
            TimeDelta::minutes(5),
        );
        assert!(matches!(result, Err(SimulationError::InvalidWindow(_))));
    }

    #[test]
    fn test_plan_rejects_sub_second_interval() {
        let result = SimulationPeriodPlan::new(
            t(0),
            t(0),
            TimeDelta::seconds(1),
            TimeDelta::seconds(1),
            TimeDelta::milliseconds(500),
        );
        assert!(matches!(result, Err(SimulationError::InvalidWindow(_))));
    }

    #[test]
    fn test_time_at_handles_offsets_beyond_i32() {
        let plan = SimulationPeriodPlan::new(
            t(0),
            t(0),
            TimeDelta::minutes(5),
            TimeDelta::minutes(5),
            TimeDelta::minutes(5),
        )
        .unwrap();
        let index = 1usize << 32;
        assert_eq!(plan.time_at(index) - t(0), TimeDelta::seconds(300 << 32));
    }

    #[test]
    fn test_single_decision_point_when_start_equals_end() {
        let plan = SimulationPeriodPlan::new(
            t(0),
            t(0),
            TimeDelta::minutes(5),
            TimeDelta::minutes(5),
            TimeDelta::minutes(5),
        )
        .unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.required_end(), t(5));
    }
}
