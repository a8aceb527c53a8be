use bess_model::formulation::FormulationError;
use bess_model::market::PriceSeriesError;
use bess_model::storage::StorageError;
use chrono::{NaiveDateTime, TimeDelta};
use thiserror::Error;

use crate::dispatch::model_builder::SolveStatus;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    PriceSeries(#[from] PriceSeriesError),

    #[error(transparent)]
    Formulation(#[from] FormulationError),

    #[error("{prices} prices supplied for {times} times")]
    LengthMismatch { prices: usize, times: usize },

    #[error("{0} is not in the price series time index")]
    TimeNotInSeries(NaiveDateTime),

    #[error("price data ends at {available_end} but {required_end} is required")]
    InsufficientData {
        required_end: NaiveDateTime,
        available_end: NaiveDateTime,
    },

    #[error("simulation period of {period} cannot be tiled by binding windows of {binding}")]
    IndivisibleWindow { period: TimeDelta, binding: TimeDelta },

    #[error(
        "forecast run at {run_time} ends at {actual_end:?}, expected to reach exactly {expected_end}"
    )]
    ForecastHorizonMismatch {
        run_time: NaiveDateTime,
        expected_end: NaiveDateTime,
        actual_end: Option<NaiveDateTime>,
    },

    #[error("invalid simulation window: {0}")]
    InvalidWindow(String),

    #[error("solver returned {status:?} for window {window_start} to {window_end}")]
    SolverFailure {
        status: SolveStatus,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
        detail: String,
    },

    #[error("actual prices do not cover simulated time {0}")]
    Coverage(NaiveDateTime),
}

pub type Result<T, E = SimulationError> = std::result::Result<T, E>;
