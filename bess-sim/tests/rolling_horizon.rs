mod common;

use bess_model::formulation::Formulation;
use bess_model::storage::DegradationModel;
use bess_sim::dispatch::dispatch_utils::{ResultStatus, RollingHorizonConfig, SolverOptions};
use bess_sim::dispatch::model_builder::build_and_solve;
use bess_sim::dispatch::rolling_horizon::run_rolling_horizon;
use bess_sim::error::SimulationError;
use chrono::TimeDelta;
use common::{TAU, TOL, echo_forecast, five_minute_series, reference_storage, t};

fn config(binding: i64, horizon: i64) -> RollingHorizonConfig {
    RollingHorizonConfig::new(
        TimeDelta::minutes(binding),
        TimeDelta::minutes(horizon),
        Formulation::StandardArbitrage,
    )
}

#[test]
fn binding_and_non_binding_rows_are_partitioned() {
    let actual = five_minute_series(&[50.0, 20.0, 180.0, 40.0, 220.0]);
    let mut config = config(5, 10);
    config.capture_non_binding = true;

    let output = run_rolling_horizon(&reference_storage(), &actual, t(0), t(5), &config).unwrap();

    assert_eq!(output.rows.len(), 4);
    let binding: Vec<_> = output.binding_rows().collect();
    let non_binding: Vec<_> = output.non_binding_rows().collect();
    assert_eq!(binding.len(), 2);
    assert_eq!(non_binding.len(), 2);

    assert_eq!(binding[0].decision_time, t(0));
    assert_eq!(binding[0].simulated_time, t(5));
    assert_eq!(binding[1].decision_time, t(5));
    assert_eq!(binding[1].simulated_time, t(10));
    assert_eq!(non_binding[0].simulated_time, t(10));
    assert_eq!(non_binding[0].status, ResultStatus::NonBinding);
    assert!(output.rows.iter().all(|row| row.lookahead_minutes == 10));

    // The second solve starts from the first binding interval's end state
    let storage = reference_storage();
    let expected_soc = binding[0].soc_mwh
        + binding[1].charge_mw * storage.charge_efficiency() * TAU
        - binding[1].discharge_mw / storage.discharge_efficiency() * TAU;
    assert!((binding[1].soc_mwh - expected_soc).abs() < TOL);
    assert!(
        (output.final_storage.soc_mwh() - binding[1].soc_mwh).abs() < TOL,
        "final snapshot should carry the last binding SoC"
    );
}

#[test]
fn binding_equal_to_horizon_matches_independent_single_shots() {
    let pattern = [-20.0, 300.0, 50.0];
    let prices: Vec<f64> = (0..10).map(|i| pattern[i % 3]).collect();
    let actual = five_minute_series(&prices);
    let config = config(15, 15);

    let output = run_rolling_horizon(&reference_storage(), &actual, t(0), t(30), &config).unwrap();
    assert_eq!(output.rows.len(), 9);
    assert_eq!(output.non_binding_rows().count(), 0);

    let mut storage = reference_storage();
    for window in 0..3 {
        let decision = 15 * window as i64;
        let (times, window_prices) = actual.window(t(decision), t(decision + 15));
        let solved = build_and_solve(
            &storage,
            window_prices,
            times,
            TAU,
            t(decision + 15),
            &Formulation::StandardArbitrage,
            DegradationModel::NoDegradation,
            &SolverOptions::default(),
        )
        .unwrap();
        for (i, row) in output.rows[3 * window..3 * window + 3].iter().enumerate() {
            assert_eq!(row.simulated_time, times[i]);
            assert!((row.charge_mw - solved.charge_mw[i]).abs() < TOL);
            assert!((row.discharge_mw - solved.discharge_mw[i]).abs() < TOL);
            assert!((row.soc_mwh - solved.soc_mwh[i]).abs() < TOL);
        }
        let (soc, throughput) = (solved.soc_mwh[2], solved.throughput_mwh[2]);
        storage = storage.advance(soc, throughput).unwrap();
    }
    assert!((output.final_storage.soc_mwh() - storage.soc_mwh()).abs() < TOL);
    assert!((output.final_storage.throughput_mwh() - storage.throughput_mwh()).abs() < TOL);
}

#[test]
fn soc_and_throughput_invariants_hold_across_the_run() {
    let prices: Vec<f64> = (0..40)
        .map(|i| 60.0 + 80.0 * ((i as f64) * 0.7).sin() + if i % 9 == 0 { 900.0 } else { 0.0 })
        .collect();
    let actual = five_minute_series(&prices);
    let storage = reference_storage();

    let output = run_rolling_horizon(&storage, &actual, t(0), t(120), &config(10, 30)).unwrap();
    assert_eq!(output.rows.len(), 26);

    let mut previous_throughput = 0.0;
    for row in &output.rows {
        assert!(row.soc_mwh >= storage.soc_min_mwh() - TOL);
        assert!(row.soc_mwh <= storage.soc_max_mwh() + TOL);
        assert!(row.throughput_mwh >= previous_throughput - TOL);
        assert!(row.charge_mw.min(row.discharge_mw) < 1e-3);
        assert_eq!(row.relative_gap, Some(SolverOptions::default().mip_rel_gap));
        previous_throughput = row.throughput_mwh;
    }
    // The caller's snapshot is untouched
    assert_eq!(storage.soc_mwh(), 15.0);
    assert_eq!(storage.throughput_mwh(), 0.0);
}

#[test]
fn single_interval_horizon_runs_end_to_end() {
    let actual = five_minute_series(&[10.0, -5.0, 400.0, 30.0]);
    let output =
        run_rolling_horizon(&reference_storage(), &actual, t(0), t(10), &config(5, 5)).unwrap();
    assert_eq!(output.rows.len(), 3);
    assert!(output.rows[0].charge_mw > 29.0);
    assert!(output.rows[1].discharge_mw > 29.0);
}

#[test]
fn forecast_driven_run_uses_each_runs_prices() {
    let actual = five_minute_series(&[30.0, 25.0, 90.0, 15.0, 120.0, 60.0, 45.0, 70.0]);
    let forecast = echo_forecast(&actual, 4, 3, 5.0);

    let output =
        run_rolling_horizon(&reference_storage(), &forecast, t(0), t(15), &config(5, 15)).unwrap();
    assert_eq!(output.rows.len(), 4);
    assert_eq!(output.rows[3].decision_time, t(15));
}

#[test]
fn preconditions_fail_before_any_solve() {
    let actual = five_minute_series(&[30.0; 6]);
    let storage = reference_storage();

    assert!(matches!(
        run_rolling_horizon(&storage, &actual, t(0), t(15), &config(10, 10)),
        Err(SimulationError::IndivisibleWindow { .. })
    ));
    assert!(matches!(
        run_rolling_horizon(&storage, &actual, t(0), t(15), &config(5, 15)),
        Err(SimulationError::InsufficientData { .. })
    ));
    assert!(matches!(
        run_rolling_horizon(&storage, &actual, t(2), t(12), &config(5, 5)),
        Err(SimulationError::TimeNotInSeries(_))
    ));

    // Every run stops one interval short of the 15 minute horizon
    let series = five_minute_series(&[30.0; 12]);
    let forecast = echo_forecast(&series, 3, 2, 0.0);
    assert!(matches!(
        run_rolling_horizon(&storage, &forecast, t(0), t(10), &config(5, 15)),
        Err(SimulationError::ForecastHorizonMismatch { .. })
    ));
}
