use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::market::price::DataType;

/// Identifies one scenario's results: which price data drove the dispatch and
/// the power rating of the simulated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResultKey {
    pub data_type: DataType,
    pub power_rating_mw: OrderedFloat<f64>,
}

impl ResultKey {
    pub fn new(data_type: DataType, power_rating_mw: f64) -> Self {
        Self {
            data_type,
            power_rating_mw: OrderedFloat(power_rating_mw),
        }
    }

    /// File-system friendly label, e.g. `actual_100.0MW`.
    pub fn file_stem(&self) -> String {
        format!("{}_{:.1}MW", self.data_type, self.power_rating_mw.0)
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:.1}MW", self.data_type, self.power_rating_mw.0)
    }
}
