use bess_model::market::PriceSeries;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::dispatch::dispatch_utils::{ResultStatus, SimulationResultRow};
use crate::error::{Result, SimulationError};

/// A simulated row joined with the realised price at its simulated time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRow {
    pub simulated_time: NaiveDateTime,
    pub decision_time: NaiveDateTime,
    pub status: ResultStatus,
    pub charge_mw: f64,
    pub discharge_mw: f64,
    pub soc_mwh: f64,
    pub actual_price: Option<f64>,
    /// Realised revenue (AUD). Absent for rows that were never executed.
    pub revenue: Option<f64>,
}

/// Prices each binding row at the actual market outcome.
///
/// Revenue is `actual_price × (discharge − charge) × τ`. Non-binding rows are kept but carry
/// no revenue. Every binding row must have an actual price, otherwise nothing is returned.
pub fn reconcile(rows: &[SimulationResultRow], actual: &PriceSeries) -> Result<Vec<ReconciledRow>> {
    let tau = actual.tau_hours();
    rows.iter()
        .map(|row| {
            let actual_price = actual.price_at(row.simulated_time);
            let revenue = match (row.status, actual_price) {
                (ResultStatus::Binding, Some(price)) => Some(price * row.net_discharge_mw() * tau),
                (ResultStatus::Binding, None) => {
                    return Err(SimulationError::Coverage(row.simulated_time));
                }
                (ResultStatus::NonBinding, _) => None,
            };
            Ok(ReconciledRow {
                simulated_time: row.simulated_time,
                decision_time: row.decision_time,
                status: row.status,
                charge_mw: row.charge_mw,
                discharge_mw: row.discharge_mw,
                soc_mwh: row.soc_mwh,
                actual_price,
                revenue,
            })
        })
        .collect()
}

/// Aggregate figures over the executed (binding) part of a simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenueSummary {
    pub total_revenue: f64,
    pub binding_intervals: usize,
    pub discharged_mwh: f64,
    pub charged_mwh: f64,
    /// Discharged energy divided by energy capacity.
    pub full_cycles: f64,
}

impl RevenueSummary {
    pub fn from_reconciled(rows: &[ReconciledRow], tau_hours: f64, energy_capacity_mwh: f64) -> Self {
        let mut summary = RevenueSummary::default();
        for row in rows.iter().filter(|row| row.status.is_binding()) {
            summary.total_revenue += row.revenue.unwrap_or(0.0);
            summary.binding_intervals += 1;
            summary.discharged_mwh += row.discharge_mw * tau_hours;
            summary.charged_mwh += row.charge_mw * tau_hours;
        }
        if energy_capacity_mwh > 0.0 {
            summary.full_cycles = summary.discharged_mwh / energy_capacity_mwh;
        }
        summary
    }

    /// Revenue gained over `baseline`, e.g. perfect foresight over a forecast-driven run.
    pub fn value_over(&self, baseline: &RevenueSummary) -> f64 {
        self.total_revenue - baseline.total_revenue
    }
}
