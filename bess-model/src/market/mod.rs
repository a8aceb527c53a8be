pub mod price;
pub mod result_key;

pub use price::{
    DataType, ForecastData, ForecastSample, PriceSeries, PriceSeriesError, interval_hours,
};
pub use result_key::ResultKey;
