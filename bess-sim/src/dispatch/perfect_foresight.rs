use bess_model::formulation::Formulation;
use bess_model::market::PriceSeries;
use bess_model::storage::{DegradationModel, StorageDevice};
use chrono::NaiveDateTime;
use tracing::{info, instrument};

use crate::dispatch::dispatch_utils::{
    ResultStatus, SimulationOutput, SimulationResultRow, SolverOptions,
};
use crate::dispatch::model_builder::build_and_solve;
use crate::dispatch::rolling_horizon::advance_storage;
use crate::error::{Result, SimulationError};

/// Dispatches over the whole of `(start, end]` in a single solve against actual prices.
///
/// The result is the revenue upper bound other simulations are compared with, so every
/// row is binding and carries the full period as its lookahead.
#[instrument(skip(storage, actual, formulation, options), fields(formulation = formulation.name()))]
pub fn run_perfect_foresight(
    storage: &StorageDevice,
    actual: &PriceSeries,
    start: NaiveDateTime,
    end: NaiveDateTime,
    formulation: &Formulation,
    degradation: DegradationModel,
    options: &SolverOptions,
) -> Result<SimulationOutput> {
    for time in [start, end] {
        if !actual.contains(time) {
            return Err(SimulationError::TimeNotInSeries(time));
        }
    }
    if end <= start {
        return Err(SimulationError::InvalidWindow(format!(
            "perfect foresight period ({start}, {end}] is empty"
        )));
    }

    let (times, prices) = actual.window(start, end);
    let solved = build_and_solve(
        storage,
        prices,
        times,
        actual.tau_hours(),
        end,
        formulation,
        degradation,
        options,
    )?;

    let lookahead_minutes = (end - start).num_minutes();
    let rows = solved
        .times
        .iter()
        .enumerate()
        .map(|(t, &simulated_time)| SimulationResultRow {
            simulated_time,
            decision_time: start,
            status: ResultStatus::Binding,
            charge_mw: solved.charge_mw[t],
            discharge_mw: solved.discharge_mw[t],
            soc_mwh: solved.soc_mwh[t],
            throughput_mwh: solved.throughput_mwh[t],
            lookahead_minutes,
            relative_gap: solved.relative_gap,
        })
        .collect::<Vec<_>>();
    let final_storage = advance_storage(storage, &solved)?;

    info!(
        rows = rows.len(),
        objective = solved.objective_value,
        "finished perfect foresight run"
    );
    Ok(SimulationOutput {
        rows,
        final_storage,
    })
}
