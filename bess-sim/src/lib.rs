pub mod config;
pub mod dispatch;
pub mod error;
pub mod general;

// Re-export commonly used items for convenience
pub use dispatch::model_builder::build_and_solve;
pub use dispatch::perfect_foresight::run_perfect_foresight;
pub use dispatch::rolling_horizon::run_rolling_horizon;
pub use error::SimulationError;
