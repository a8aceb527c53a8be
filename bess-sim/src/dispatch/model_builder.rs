use std::time::{Duration, Instant};

use bess_model::formulation::{CAP_STRIKE_PRICE, Formulation};
use bess_model::storage::{DegradationModel, StorageDevice, StorageError};
use chrono::NaiveDateTime;
use good_lp::solvers::highs::{HighsProblem, highs};
use good_lp::{
    Constraint, Expression, ProblemVariables, ResolutionError, Solution, SolutionStatus,
    SolverModel, Variable, constraint, variable,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::dispatch::dispatch_utils::SolverOptions;
use crate::error::{Result, SimulationError};

const HOURS_PER_YEAR: f64 = 8760.0;

/// Outcome of a single solve, independent of the backend's own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    /// Stopped at a time or iteration limit with an incumbent. HiGHS reports both limits
    /// through the same good_lp status.
    TimeLimit,
    Infeasible,
    Unbounded,
    Error,
}

impl SolveStatus {
    /// A limit was reached; the incumbent is usable but not proven optimal.
    pub fn is_limit(&self) -> bool {
        matches!(self, SolveStatus::TimeLimit)
    }
}

/// Role of a constraint within the dispatch model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    MutualExclusion,
    InitialCondition,
    Intertemporal,
    SinglePeriodSocBound,
    ThroughputLimit,
}

impl ConstraintKind {
    /// Constraints that encode the device's physics rather than its starting state or policy.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ConstraintKind::MutualExclusion
                | ConstraintKind::Intertemporal
                | ConstraintKind::SinglePeriodSocBound
        )
    }
}

struct DispatchVariables {
    discharge: Vec<Variable>,
    charge: Vec<Variable>,
    indicator: Vec<Variable>,
    soc: Vec<Variable>,
    throughput: Vec<Variable>,
}

/// A dispatch problem over one horizon, built but not yet solved.
pub struct DispatchModel {
    problem_vars: ProblemVariables,
    objective: Expression,
    constraints: Vec<(ConstraintKind, Constraint)>,
    vars: DispatchVariables,
    times: Vec<NaiveDateTime>,
    binding_end_index: usize,
}

/// Variable values and solve metadata for one horizon.
#[derive(Debug, Clone)]
pub struct SolvedModel {
    pub times: Vec<NaiveDateTime>,
    pub charge_mw: Vec<f64>,
    pub discharge_mw: Vec<f64>,
    pub soc_mwh: Vec<f64>,
    pub throughput_mwh: Vec<f64>,
    pub objective_value: f64,
    pub status: SolveStatus,
    /// Upper bound on the relative optimality gap: the `mip_rel_gap` tolerance the solver
    /// proved at termination. `None` when a limit cut the search short.
    pub relative_gap: Option<f64>,
    pub binding_end_index: usize,
    pub solve_duration: Duration,
}

impl SolvedModel {
    /// State of charge and cumulative throughput at the end of the binding window.
    pub fn binding_end_state(&self) -> (f64, f64) {
        (
            self.soc_mwh[self.binding_end_index],
            self.throughput_mwh[self.binding_end_index],
        )
    }
}

fn generate_objective(
    formulation: &Formulation,
    storage: &StorageDevice,
    prices: &[f64],
    tau: f64,
    vars: &DispatchVariables,
) -> Expression {
    let mut objective = Expression::default();

    // Energy arbitrage revenue, optionally discounted by distance from the decision time
    for (t, &price) in prices.iter().enumerate() {
        let weight = match formulation {
            Formulation::ArbitrageDiscounted { discount, rate, .. } => {
                discount.factor(t as f64 * tau, *rate)
            }
            _ => 1.0,
        };
        objective += vars.discharge[t] * (tau * price * weight);
        objective -= vars.charge[t] * (tau * price * weight);
    }

    // Amortised replacement cost of the energy discharged over the horizon
    if let Some((lifetime_throughput, capital_cost)) = formulation.throughput_penalty() {
        let cost_per_mwh = storage.energy_capacity_mwh() * capital_cost / lifetime_throughput;
        if let Some(&end_throughput) = vars.throughput.last() {
            objective -= end_throughput * cost_per_mwh;
            objective += storage.throughput_mwh() * cost_per_mwh;
        }
    }

    // Cap contract payout owed whenever the price clears the strike
    if let Formulation::ArbitrageCapContracted {
        contracted_capacity_mw,
        ..
    } = formulation
    {
        let payout: f64 = prices
            .iter()
            .filter(|&&price| price > CAP_STRIKE_PRICE)
            .map(|&price| tau * contracted_capacity_mw * (price - CAP_STRIKE_PRICE))
            .sum();
        objective -= payout;
    }

    objective
}

fn add_mutual_exclusion_constraints(
    constraints: &mut Vec<(ConstraintKind, Constraint)>,
    power_mw: f64,
    vars: &DispatchVariables,
) {
    for t in 0..vars.indicator.len() {
        constraints.push((
            ConstraintKind::MutualExclusion,
            constraint!(vars.discharge[t] + power_mw * vars.indicator[t] <= power_mw),
        ));
        constraints.push((
            ConstraintKind::MutualExclusion,
            constraint!(vars.charge[t] - power_mw * vars.indicator[t] <= 0.0),
        ));
    }
}

fn add_initial_conditions(
    constraints: &mut Vec<(ConstraintKind, Constraint)>,
    storage: &StorageDevice,
    tau: f64,
    vars: &DispatchVariables,
) {
    let charge_coef = storage.charge_efficiency() * tau;
    let discharge_coef = tau / storage.discharge_efficiency();
    constraints.push((
        ConstraintKind::InitialCondition,
        constraint!(
            vars.soc[0] - charge_coef * vars.charge[0] + discharge_coef * vars.discharge[0]
                == storage.soc_mwh()
        ),
    ));
    constraints.push((
        ConstraintKind::InitialCondition,
        constraint!(vars.throughput[0] - tau * vars.discharge[0] == storage.throughput_mwh()),
    ));
}

fn add_intertemporal_constraints(
    constraints: &mut Vec<(ConstraintKind, Constraint)>,
    storage: &StorageDevice,
    tau: f64,
    vars: &DispatchVariables,
) {
    let charge_coef = storage.charge_efficiency() * tau;
    let discharge_coef = tau / storage.discharge_efficiency();
    for t in 1..vars.soc.len() {
        constraints.push((
            ConstraintKind::Intertemporal,
            constraint!(
                vars.soc[t] - vars.soc[t - 1] - charge_coef * vars.charge[t]
                    + discharge_coef * vars.discharge[t]
                    == 0.0
            ),
        ));
        constraints.push((
            ConstraintKind::Intertemporal,
            constraint!(
                vars.throughput[t] - vars.throughput[t - 1] - tau * vars.discharge[t] == 0.0
            ),
        ));
    }
}

/// With one interval there is no previous state, so the reachable SoC is bounded directly.
fn add_single_period_soc_bounds(
    constraints: &mut Vec<(ConstraintKind, Constraint)>,
    storage: &StorageDevice,
    tau: f64,
    vars: &DispatchVariables,
) {
    let charge_coef = storage.charge_efficiency() * tau;
    let discharge_coef = tau / storage.discharge_efficiency();
    let soc0 = storage.soc_mwh();
    constraints.push((
        ConstraintKind::SinglePeriodSocBound,
        constraint!(
            charge_coef * vars.charge[0] - discharge_coef * vars.discharge[0]
                <= storage.soc_max_mwh() - soc0
        ),
    ));
    constraints.push((
        ConstraintKind::SinglePeriodSocBound,
        constraint!(
            charge_coef * vars.charge[0] - discharge_coef * vars.discharge[0]
                >= storage.soc_min_mwh() - soc0
        ),
    ));
}

/// Pro-rata annual ceiling on cumulative throughput at the binding end and the horizon end.
fn add_throughput_limit_constraints(
    constraints: &mut Vec<(ConstraintKind, Constraint)>,
    storage: &StorageDevice,
    annual_limit_mwh: f64,
    tau: f64,
    binding_end_index: usize,
    vars: &DispatchVariables,
) {
    let last = vars.throughput.len() - 1;
    for index in [binding_end_index, last] {
        let elapsed_hours = (index + 1) as f64 * tau;
        let ceiling =
            storage.throughput_mwh() + annual_limit_mwh * elapsed_hours / HOURS_PER_YEAR;
        constraints.push((
            ConstraintKind::ThroughputLimit,
            constraint!(vars.throughput[index] <= ceiling),
        ));
    }
}

/// A limit hit without any incumbent surfaces as an error, never as a limit status.
fn classify_error(error: &ResolutionError) -> SolveStatus {
    match error {
        ResolutionError::Infeasible => SolveStatus::Infeasible,
        ResolutionError::Unbounded => SolveStatus::Unbounded,
        _ => SolveStatus::Error,
    }
}

fn classify_status(status: SolutionStatus) -> SolveStatus {
    match status {
        SolutionStatus::Optimal | SolutionStatus::GapLimit => SolveStatus::Optimal,
        SolutionStatus::TimeLimit => SolveStatus::TimeLimit,
    }
}

fn relative_gap_bound(status: SolveStatus, options: &SolverOptions) -> Option<f64> {
    (status == SolveStatus::Optimal).then_some(options.mip_rel_gap)
}

fn configure_solver(mut problem: HighsProblem, options: &SolverOptions) -> HighsProblem {
    if let Some(seconds) = options.time_limit_seconds {
        problem = problem.set_option("time_limit", seconds);
    }
    problem = problem.set_option("mip_rel_gap", options.mip_rel_gap);
    if options.threads > 0 {
        problem = problem.set_option("threads", options.threads as i32);
    }
    problem.set_option("output_flag", options.verbose)
}

impl DispatchModel {
    /// Translates the device state, horizon prices and formulation into a MIP.
    ///
    /// `times` are interval end times; `binding_end_time` must be one of them.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        storage: &StorageDevice,
        prices: &[f64],
        times: &[NaiveDateTime],
        tau: f64,
        binding_end_time: NaiveDateTime,
        formulation: &Formulation,
        degradation: DegradationModel,
    ) -> Result<Self> {
        if prices.len() != times.len() {
            return Err(SimulationError::LengthMismatch {
                prices: prices.len(),
                times: times.len(),
            });
        }
        if times.is_empty() {
            return Err(SimulationError::InvalidWindow(
                "horizon contains no intervals".to_string(),
            ));
        }
        if !(tau.is_finite() && tau > 0.0) {
            return Err(SimulationError::InvalidWindow(format!(
                "interval length must be positive, got {tau} h"
            )));
        }
        if storage.discharge_efficiency() <= 0.0 {
            return Err(StorageError::InvalidParameter {
                field: "discharge_efficiency",
                reason: "must be > 0 to dispatch".to_string(),
            }
            .into());
        }
        formulation.validate()?;
        let binding_end_index = times
            .iter()
            .position(|t| *t == binding_end_time)
            .ok_or(SimulationError::TimeNotInSeries(binding_end_time))?;

        match degradation {
            DegradationModel::NoDegradation => {}
        }

        let power = storage.power_capacity_mw();
        let mut problem_vars = ProblemVariables::new();
        let n = times.len();
        let mut vars = DispatchVariables {
            discharge: Vec::with_capacity(n),
            charge: Vec::with_capacity(n),
            indicator: Vec::with_capacity(n),
            soc: Vec::with_capacity(n),
            throughput: Vec::with_capacity(n),
        };
        for _ in 0..n {
            vars.discharge
                .push(problem_vars.add(variable().min(0.0).max(power)));
            vars.charge.push(problem_vars.add(variable().min(0.0).max(power)));
            vars.indicator.push(problem_vars.add(variable().binary()));
            vars.soc.push(
                problem_vars.add(
                    variable()
                        .min(storage.soc_min_mwh())
                        .max(storage.soc_max_mwh()),
                ),
            );
            vars.throughput.push(problem_vars.add(variable().min(0.0)));
        }

        let objective = generate_objective(formulation, storage, prices, tau, &vars);

        let mut constraints = Vec::new();
        add_mutual_exclusion_constraints(&mut constraints, power, &vars);
        add_initial_conditions(&mut constraints, storage, tau, &vars);
        if n > 1 {
            add_intertemporal_constraints(&mut constraints, storage, tau, &vars);
        } else {
            add_single_period_soc_bounds(&mut constraints, storage, tau, &vars);
        }
        if let Formulation::StandardArbitrageThroughputLimit { annual_limit_mwh } = formulation {
            add_throughput_limit_constraints(
                &mut constraints,
                storage,
                *annual_limit_mwh,
                tau,
                binding_end_index,
                &vars,
            );
        }

        debug!(
            formulation = formulation.name(),
            intervals = n,
            constraints = constraints.len(),
            "built dispatch model"
        );

        Ok(Self {
            problem_vars,
            objective,
            constraints,
            vars,
            times: times.to_vec(),
            binding_end_index,
        })
    }

    pub fn window_start(&self) -> NaiveDateTime {
        self.times[0]
    }

    pub fn window_end(&self) -> NaiveDateTime {
        self.times[self.times.len() - 1]
    }

    pub fn constraint_count(&self, kind: ConstraintKind) -> usize {
        self.constraints.iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn structural_constraint_count(&self) -> usize {
        self.constraints
            .iter()
            .filter(|(kind, _)| kind.is_structural())
            .count()
    }

    /// Solves the model with HiGHS and classifies the outcome.
    ///
    /// Limit outcomes are returned with a warning; every other non-optimal outcome is an error
    /// carrying the horizon window.
    #[instrument(
        skip_all,
        fields(window_start = %self.window_start(), window_end = %self.window_end())
    )]
    pub fn solve(self, options: &SolverOptions) -> Result<SolvedModel> {
        let window_start = self.window_start();
        let window_end = self.window_end();
        let DispatchModel {
            problem_vars,
            objective,
            constraints,
            vars,
            times,
            binding_end_index,
        } = self;

        let mut model = configure_solver(problem_vars.maximise(objective.clone()).using(highs), options);
        for (_, c) in constraints {
            model = model.with(c);
        }

        let start = Instant::now();
        let outcome = model.solve();
        let solve_duration = start.elapsed();

        let solution = match outcome {
            Ok(solution) => solution,
            Err(error) => {
                return Err(SimulationError::SolverFailure {
                    status: classify_error(&error),
                    window_start,
                    window_end,
                    detail: error.to_string(),
                });
            }
        };

        let status = classify_status(solution.status());
        if status.is_limit() {
            warn!(
                %window_start,
                %window_end,
                ?status,
                "solver stopped at a limit, using best incumbent"
            );
        }

        let values = |vs: &[Variable]| -> Vec<f64> { vs.iter().map(|&v| solution.value(v)).collect() };
        let solved = SolvedModel {
            charge_mw: values(&vars.charge),
            discharge_mw: values(&vars.discharge),
            soc_mwh: values(&vars.soc),
            throughput_mwh: values(&vars.throughput),
            objective_value: solution.eval(objective),
            relative_gap: relative_gap_bound(status, options),
            status,
            binding_end_index,
            solve_duration,
            times,
        };
        debug!(
            objective = solved.objective_value,
            duration_ms = solve_duration.as_millis() as u64,
            "solved dispatch model"
        );
        Ok(solved)
    }
}

/// Builds the model for one horizon and solves it.
#[allow(clippy::too_many_arguments)]
pub fn build_and_solve(
    storage: &StorageDevice,
    prices: &[f64],
    times: &[NaiveDateTime],
    tau: f64,
    binding_end_time: NaiveDateTime,
    formulation: &Formulation,
    degradation: DegradationModel,
    options: &SolverOptions,
) -> Result<SolvedModel> {
    DispatchModel::build(
        storage,
        prices,
        times,
        tau,
        binding_end_time,
        formulation,
        degradation,
    )?
    .solve(options)
}

/// Solves one horizon window. The schedulers are generic over this so a run can be driven
/// by something other than HiGHS.
pub trait WindowSolver {
    #[allow(clippy::too_many_arguments)]
    fn solve_window(
        &self,
        storage: &StorageDevice,
        prices: &[f64],
        times: &[NaiveDateTime],
        tau: f64,
        binding_end_time: NaiveDateTime,
        formulation: &Formulation,
        degradation: DegradationModel,
        options: &SolverOptions,
    ) -> Result<SolvedModel>;
}

/// Builds the MIP and solves it with HiGHS.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighsSolver;

impl WindowSolver for HighsSolver {
    fn solve_window(
        &self,
        storage: &StorageDevice,
        prices: &[f64],
        times: &[NaiveDateTime],
        tau: f64,
        binding_end_time: NaiveDateTime,
        formulation: &Formulation,
        degradation: DegradationModel,
        options: &SolverOptions,
    ) -> Result<SolvedModel> {
        build_and_solve(
            storage,
            prices,
            times,
            tau,
            binding_end_time,
            formulation,
            degradation,
            options,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bess_model::formulation::DiscountFunction;
    use bess_model::storage::StorageParameters;
    use chrono::{NaiveDate, TimeDelta};

    const TAU: f64 = 1.0 / 12.0;

    fn storage() -> StorageDevice {
        let params = StorageParameters {
            power_capacity_mw: 30.0,
            energy_capacity_mwh: 30.0,
            soc_min_mwh: 0.0,
            soc_max_mwh: 30.0,
            charge_efficiency: 0.9,
            discharge_efficiency: 0.9,
        };
        StorageDevice::new(params, 15.0).unwrap()
    }

    fn times(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2021, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (1..=n)
            .map(|i| start + TimeDelta::minutes(5 * i as i64))
            .collect()
    }

    fn solve(prices: &[f64], formulation: Formulation) -> SolvedModel {
        let times = times(prices.len());
        build_and_solve(
            &storage(),
            prices,
            &times,
            TAU,
            *times.last().unwrap(),
            &formulation,
            DegradationModel::NoDegradation,
            &SolverOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_length_mismatch_is_rejected_before_solving() {
        let times = times(3);
        let result = DispatchModel::build(
            &storage(),
            &[1.0, 2.0],
            &times,
            TAU,
            times[2],
            &Formulation::StandardArbitrage,
            DegradationModel::NoDegradation,
        );
        assert!(matches!(
            result,
            Err(SimulationError::LengthMismatch {
                prices: 2,
                times: 3
            })
        ));
    }

    #[test]
    fn test_binding_end_must_be_in_horizon() {
        let times = times(3);
        let outside = times[2] + TimeDelta::minutes(5);
        let result = DispatchModel::build(
            &storage(),
            &[1.0, 2.0, 3.0],
            &times,
            TAU,
            outside,
            &Formulation::StandardArbitrage,
            DegradationModel::NoDegradation,
        );
        assert!(matches!(result, Err(SimulationError::TimeNotInSeries(t)) if t == outside));
    }

    #[test]
    fn test_constraint_counts_by_horizon_length() {
        let times = times(4);
        let model = DispatchModel::build(
            &storage(),
            &[1.0, 2.0, 3.0, 4.0],
            &times,
            TAU,
            times[1],
            &Formulation::StandardArbitrage,
            DegradationModel::NoDegradation,
        )
        .unwrap();
        assert_eq!(model.constraint_count(ConstraintKind::MutualExclusion), 8);
        assert_eq!(model.constraint_count(ConstraintKind::InitialCondition), 2);
        assert_eq!(model.constraint_count(ConstraintKind::Intertemporal), 6);
        assert_eq!(model.constraint_count(ConstraintKind::SinglePeriodSocBound), 0);
        assert_eq!(model.constraint_count(ConstraintKind::ThroughputLimit), 0);

        let limited = DispatchModel::build(
            &storage(),
            &[1.0, 2.0, 3.0, 4.0],
            &times,
            TAU,
            times[1],
            &Formulation::StandardArbitrageThroughputLimit {
                annual_limit_mwh: 1000.0,
            },
            DegradationModel::NoDegradation,
        )
        .unwrap();
        assert_eq!(limited.constraint_count(ConstraintKind::ThroughputLimit), 2);
    }

    #[test]
    fn test_single_interval_model_solves_within_bounds() {
        let solved = solve(&[200.0], Formulation::StandardArbitrage);
        assert_eq!(solved.status, SolveStatus::Optimal);
        // Discharging the full 30 MW for 5 minutes drains 30/12/0.9 MWh, well within SoC range
        assert!((solved.discharge_mw[0] - 30.0).abs() < 1e-6);
        assert!((solved.objective_value - 200.0 * 30.0 * TAU).abs() < 1e-4);
        assert!((solved.soc_mwh[0] - (15.0 - 30.0 * TAU / 0.9)).abs() < 1e-6);
        assert!((solved.throughput_mwh[0] - 30.0 * TAU).abs() < 1e-6);
    }

    #[test]
    fn test_throughput_penalty_discourages_marginal_cycling() {
        let prices = [10.0, 12.0, 10.0, 12.0];
        let plain = solve(&prices, Formulation::StandardArbitrage);
        let penalised = solve(
            &prices,
            Formulation::ArbitrageThroughputPenalty {
                lifetime_throughput_mwh: 1000.0,
                capital_cost_per_mwh: 300000.0,
            },
        );
        assert!(plain.objective_value >= penalised.objective_value - 1e-6);
        let discharged: f64 = penalised.discharge_mw.iter().sum();
        assert!(discharged.abs() < 1e-6);
        assert!(penalised.objective_value.abs() < 1e-6);
    }

    #[test]
    fn test_cap_contract_payout_is_subtracted() {
        let prices = [350.0, 50.0];
        let penalty_only = solve(
            &prices,
            Formulation::ArbitrageThroughputPenalty {
                lifetime_throughput_mwh: 5000.0,
                capital_cost_per_mwh: 1000.0,
            },
        );
        let capped = solve(
            &prices,
            Formulation::ArbitrageCapContracted {
                lifetime_throughput_mwh: 5000.0,
                capital_cost_per_mwh: 1000.0,
                contracted_capacity_mw: 10.0,
            },
        );
        let payout = TAU * 10.0 * 50.0;
        assert!((penalty_only.objective_value - capped.objective_value - payout).abs() < 1e-4);
    }

    #[test]
    fn test_discounted_single_interval_matches_undiscounted() {
        let penalty = Formulation::ArbitrageThroughputPenalty {
            lifetime_throughput_mwh: 5000.0,
            capital_cost_per_mwh: 1000.0,
        };
        let discounted = Formulation::ArbitrageDiscounted {
            lifetime_throughput_mwh: 5000.0,
            capital_cost_per_mwh: 1000.0,
            discount: DiscountFunction::Exponential,
            rate: 2.0,
        };
        let a = solve(&[120.0], penalty);
        let b = solve(&[120.0], discounted);
        assert!((a.objective_value - b.objective_value).abs() < 1e-6);
    }

    #[test]
    fn test_repeated_builds_give_identical_objective() {
        let first = solve(&[80.0], Formulation::StandardArbitrage);
        let second = solve(&[80.0], Formulation::StandardArbitrage);
        let scale = first.objective_value.abs().max(1.0);
        assert!((first.objective_value - second.objective_value).abs() / scale < 1e-6);
    }

    #[test]
    fn test_solution_respects_soc_and_throughput_invariants() {
        let prices = [10.0, 300.0, 5.0, 5.0, 250.0, 20.0, 400.0, 1.0];
        let solved = solve(&prices, Formulation::StandardArbitrage);
        let device = storage();
        for t in 0..prices.len() {
            assert!(solved.soc_mwh[t] >= device.soc_min_mwh() - 1e-6);
            assert!(solved.soc_mwh[t] <= device.soc_max_mwh() + 1e-6);
            assert!(solved.charge_mw[t] < 1e-6 || solved.discharge_mw[t] < 1e-6);
            if t > 0 {
                assert!(solved.throughput_mwh[t] >= solved.throughput_mwh[t - 1] - 1e-9);
            }
        }
    }

    #[test]
    fn test_classify_error_statuses() {
        assert_eq!(
            classify_error(&ResolutionError::Infeasible),
            SolveStatus::Infeasible
        );
        assert_eq!(
            classify_error(&ResolutionError::Unbounded),
            SolveStatus::Unbounded
        );
        assert_eq!(
            classify_error(&ResolutionError::Other("NoSolutionFound")),
            SolveStatus::Error
        );
        assert_eq!(
            classify_error(&ResolutionError::Str("NotSet".to_string())),
            SolveStatus::Error
        );
    }

    #[test]
    fn test_limit_statuses_keep_the_incumbent_without_a_gap() {
        assert_eq!(classify_status(SolutionStatus::Optimal), SolveStatus::Optimal);
        assert_eq!(classify_status(SolutionStatus::GapLimit), SolveStatus::Optimal);

        let limited = classify_status(SolutionStatus::TimeLimit);
        assert_eq!(limited, SolveStatus::TimeLimit);
        assert!(limited.is_limit());
        assert!(!SolveStatus::Optimal.is_limit());

        let options = SolverOptions {
            mip_rel_gap: 0.01,
            ..SolverOptions::default()
        };
        assert_eq!(relative_gap_bound(SolveStatus::Optimal, &options), Some(0.01));
        assert_eq!(relative_gap_bound(limited, &options), None);
    }

    #[test]
    fn test_invalid_formulation_fails_before_solving() {
        let times = times(2);
        let result = DispatchModel::build(
            &storage(),
            &[50.0, 60.0],
            &times,
            TAU,
            times[1],
            &Formulation::ArbitrageThroughputPenalty {
                lifetime_throughput_mwh: 0.0,
                capital_cost_per_mwh: 300000.0,
            },
            DegradationModel::NoDegradation,
        );
        assert!(matches!(result, Err(SimulationError::Formulation(_))));
    }
}
