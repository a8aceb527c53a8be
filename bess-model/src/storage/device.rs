use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a storage device is constructed or advanced with values that
/// break one of its invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("invalid storage parameter `{field}`: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
}

impl StorageError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }
}

/// Immutable physical and operational parameters of a battery energy storage system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageParameters {
    /// Maximum charge and discharge power (MW).
    pub power_capacity_mw: f64,
    /// Nameplate energy capacity (MWh).
    pub energy_capacity_mwh: f64,
    /// Lowest allowed state of charge (MWh).
    pub soc_min_mwh: f64,
    /// Highest allowed state of charge (MWh).
    pub soc_max_mwh: f64,
    /// Fraction of grid energy stored when charging.
    pub charge_efficiency: f64,
    /// Fraction of stored energy delivered to the grid when discharging.
    pub discharge_efficiency: f64,
}

impl StorageParameters {
    /// Parameters for a device whose usable range spans `[soc_min_fraction, soc_max_fraction]`
    /// of `duration_hours × power_capacity_mw`.
    pub fn from_duration(
        power_capacity_mw: f64,
        duration_hours: f64,
        soc_min_fraction: f64,
        soc_max_fraction: f64,
        charge_efficiency: f64,
        discharge_efficiency: f64,
    ) -> Self {
        let energy_capacity_mwh = power_capacity_mw * duration_hours;
        Self {
            power_capacity_mw,
            energy_capacity_mwh,
            soc_min_mwh: energy_capacity_mwh * soc_min_fraction,
            soc_max_mwh: energy_capacity_mwh * soc_max_fraction,
            charge_efficiency,
            discharge_efficiency,
        }
    }

    pub fn validate(&self) -> Result<(), StorageError> {
        if !(self.power_capacity_mw.is_finite() && self.power_capacity_mw > 0.0) {
            return Err(StorageError::invalid(
                "power_capacity_mw",
                format!("must be > 0, got {}", self.power_capacity_mw),
            ));
        }
        if !(self.energy_capacity_mwh.is_finite() && self.energy_capacity_mwh > 0.0) {
            return Err(StorageError::invalid(
                "energy_capacity_mwh",
                format!("must be > 0, got {}", self.energy_capacity_mwh),
            ));
        }
        if !(self.soc_min_mwh >= 0.0) {
            return Err(StorageError::invalid(
                "soc_min_mwh",
                format!("must be >= 0, got {}", self.soc_min_mwh),
            ));
        }
        if !(self.soc_min_mwh < self.soc_max_mwh) {
            return Err(StorageError::invalid(
                "soc_max_mwh",
                format!(
                    "must be greater than soc_min_mwh ({}), got {}",
                    self.soc_min_mwh, self.soc_max_mwh
                ),
            ));
        }
        if self.soc_max_mwh > self.energy_capacity_mwh {
            return Err(StorageError::invalid(
                "soc_max_mwh",
                format!(
                    "must not exceed energy_capacity_mwh ({}), got {}",
                    self.energy_capacity_mwh, self.soc_max_mwh
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.charge_efficiency) {
            return Err(StorageError::invalid(
                "charge_efficiency",
                format!("must be within [0, 1], got {}", self.charge_efficiency),
            ));
        }
        if !(0.0..=1.0).contains(&self.discharge_efficiency) {
            return Err(StorageError::invalid(
                "discharge_efficiency",
                format!("must be within [0, 1], got {}", self.discharge_efficiency),
            ));
        }
        Ok(())
    }
}

/// How the device's capacity changes with use. Only the no-degradation case is modelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationModel {
    #[default]
    NoDegradation,
}

/// A snapshot of one storage device: its parameters plus the runtime state
/// (state of charge and cumulative discharged energy).
///
/// Snapshots are never mutated. [`StorageDevice::advance`] returns a new snapshot
/// and leaves the receiver untouched, so the same device can seed several
/// independent simulations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageDevice {
    parameters: StorageParameters,
    soc_mwh: f64,
    throughput_mwh: f64,
}

impl StorageDevice {
    /// Creates a fresh device with zero throughput.
    pub fn new(parameters: StorageParameters, initial_soc_mwh: f64) -> Result<Self, StorageError> {
        parameters.validate()?;
        Self::check_soc(&parameters, initial_soc_mwh)?;
        Ok(Self {
            parameters,
            soc_mwh: initial_soc_mwh,
            throughput_mwh: 0.0,
        })
    }

    fn check_soc(parameters: &StorageParameters, soc_mwh: f64) -> Result<(), StorageError> {
        if !(0.0..=parameters.energy_capacity_mwh).contains(&soc_mwh) {
            return Err(StorageError::invalid(
                "soc_mwh",
                format!(
                    "must be within [0, {}], got {}",
                    parameters.energy_capacity_mwh, soc_mwh
                ),
            ));
        }
        Ok(())
    }

    /// Returns the next snapshot with the given state of charge and cumulative throughput.
    ///
    /// Throughput may never decrease.
    pub fn advance(&self, soc_mwh: f64, throughput_mwh: f64) -> Result<Self, StorageError> {
        Self::check_soc(&self.parameters, soc_mwh)?;
        if !(throughput_mwh >= self.throughput_mwh) {
            return Err(StorageError::invalid(
                "throughput_mwh",
                format!(
                    "must not decrease below {}, got {}",
                    self.throughput_mwh, throughput_mwh
                ),
            ));
        }
        Ok(Self {
            parameters: self.parameters,
            soc_mwh,
            throughput_mwh,
        })
    }

    pub fn parameters(&self) -> &StorageParameters {
        &self.parameters
    }

    pub fn power_capacity_mw(&self) -> f64 {
        self.parameters.power_capacity_mw
    }

    pub fn energy_capacity_mwh(&self) -> f64 {
        self.parameters.energy_capacity_mwh
    }

    pub fn soc_min_mwh(&self) -> f64 {
        self.parameters.soc_min_mwh
    }

    pub fn soc_max_mwh(&self) -> f64 {
        self.parameters.soc_max_mwh
    }

    pub fn charge_efficiency(&self) -> f64 {
        self.parameters.charge_efficiency
    }

    pub fn discharge_efficiency(&self) -> f64 {
        self.parameters.discharge_efficiency
    }

    /// Current state of charge (MWh).
    pub fn soc_mwh(&self) -> f64 {
        self.soc_mwh
    }

    /// Cumulative discharged energy (MWh).
    pub fn throughput_mwh(&self) -> f64 {
        self.throughput_mwh
    }
}
