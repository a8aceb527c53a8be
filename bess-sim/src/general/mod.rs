pub mod price_data;
pub mod price_error;
pub mod reconciliation;
pub mod scenarios;

pub use reconciliation::{ReconciledRow, RevenueSummary, reconcile};
pub use scenarios::{Scenario, ScenarioData, ScenarioKind, ScenarioResults, run_scenarios};
