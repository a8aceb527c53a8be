pub mod dispatch_utils;
pub mod model_builder;
pub mod perfect_foresight;
pub mod price_window;
pub mod rolling_horizon;
