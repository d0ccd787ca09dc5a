//! Maximum/minimum case policy.
//!
//! Everything that differs between the two fault levels is looked up here:
//! the voltage factor `c` per voltage band, the grid equivalent's
//! short-circuit power and R/X ratio, the conductor temperature correction
//! and whether current-source machines take part.

use ikss_core::{GridSource, Kilovolts, MegavoltAmperes, ScError, ScResult};
use serde::{Deserialize, Serialize};

use super::case::FaultCase;

/// Temperature coefficient of conductor resistance (1/K)
pub const RESISTANCE_TEMPERATURE_COEFFICIENT: f64 = 0.004;

/// Reference conductor temperature for tabulated resistances (°C)
pub const REFERENCE_TEMPERATURE_C: f64 = 20.0;

/// Permitted voltage tolerance of a low-voltage system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LvTolerance {
    #[serde(rename = "6%")]
    SixPercent,
    #[default]
    #[serde(rename = "10%")]
    TenPercent,
}

/// `(c_max, c_min)` pair for one voltage band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageFactor {
    pub c_max: f64,
    pub c_min: f64,
}

impl VoltageFactor {
    pub const fn new(c_max: f64, c_min: f64) -> Self {
        Self { c_max, c_min }
    }

    pub fn for_case(&self, case: FaultCase) -> f64 {
        match case {
            FaultCase::Max => self.c_max,
            FaultCase::Min => self.c_min,
        }
    }
}

/// Voltage factor `c` per voltage band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoltageFactorTable {
    /// Buses strictly below this nominal voltage are low voltage
    pub lv_threshold_kv: f64,
    pub lv_six_percent: VoltageFactor,
    pub lv_ten_percent: VoltageFactor,
    pub mv_hv: VoltageFactor,
}

impl Default for VoltageFactorTable {
    fn default() -> Self {
        Self {
            lv_threshold_kv: 1.0,
            lv_six_percent: VoltageFactor::new(1.05, 0.95),
            lv_ten_percent: VoltageFactor::new(1.10, 0.95),
            mv_hv: VoltageFactor::new(1.10, 1.00),
        }
    }
}

impl VoltageFactorTable {
    pub fn is_low_voltage(&self, vn: Kilovolts) -> bool {
        vn.value() < self.lv_threshold_kv
    }

    pub fn band(&self, vn: Kilovolts, tolerance: LvTolerance) -> VoltageFactor {
        if !self.is_low_voltage(vn) {
            return self.mv_hv;
        }
        match tolerance {
            LvTolerance::SixPercent => self.lv_six_percent,
            LvTolerance::TenPercent => self.lv_ten_percent,
        }
    }

    pub fn validate(&self) -> ScResult<()> {
        if !(self.lv_threshold_kv.is_finite() && self.lv_threshold_kv > 0.0) {
            return Err(ScError::Configuration(format!(
                "low-voltage threshold must be positive, got {}",
                self.lv_threshold_kv
            )));
        }
        for (name, factor) in [
            ("lv_six_percent", self.lv_six_percent),
            ("lv_ten_percent", self.lv_ten_percent),
            ("mv_hv", self.mv_hv),
        ] {
            let valid = factor.c_min.is_finite()
                && factor.c_max.is_finite()
                && factor.c_min > 0.0
                && factor.c_min <= factor.c_max;
            if !valid {
                return Err(ScError::Configuration(format!(
                    "voltage factor {name} must satisfy 0 < c_min <= c_max, got ({}, {})",
                    factor.c_max, factor.c_min
                )));
            }
        }
        Ok(())
    }
}

/// Case-specific lookups for one calculation.
#[derive(Debug, Clone, Copy)]
pub struct CasePolicy<'a> {
    case: FaultCase,
    table: &'a VoltageFactorTable,
    tolerance: LvTolerance,
}

impl<'a> CasePolicy<'a> {
    pub fn new(case: FaultCase, table: &'a VoltageFactorTable, tolerance: LvTolerance) -> Self {
        Self {
            case,
            table,
            tolerance,
        }
    }

    pub fn case(&self) -> FaultCase {
        self.case
    }

    pub fn table(&self) -> &VoltageFactorTable {
        self.table
    }

    /// Voltage factor `c` at a bus
    pub fn voltage_factor(&self, vn: Kilovolts) -> f64 {
        self.table.band(vn, self.tolerance).for_case(self.case)
    }

    /// Short-circuit power and R/X ratio of a grid equivalent for this case.
    pub fn grid_parameters(&self, grid: &GridSource) -> ScResult<(MegavoltAmperes, f64)> {
        match self.case {
            FaultCase::Max => Ok((grid.s_sc_max, grid.rx_max)),
            FaultCase::Min => match (grid.s_sc_min, grid.rx_min) {
                (Some(s_sc), Some(rx)) => Ok((s_sc, rx)),
                _ => Err(ScError::Configuration(format!(
                    "{} has no minimum-case short-circuit power and R/X ratio",
                    grid.id
                ))),
            },
        }
    }

    /// Multiplier on ohmic line resistance. Only the minimum case heats the
    /// conductor up to its end temperature.
    pub fn resistance_factor(&self, end_temperature_c: Option<f64>) -> f64 {
        match (self.case, end_temperature_c) {
            (FaultCase::Min, Some(t)) => {
                1.0 + RESISTANCE_TEMPERATURE_COEFFICIENT * (t - REFERENCE_TEMPERATURE_C)
            }
            _ => 1.0,
        }
    }

    /// Current-source machines are neglected in the minimum case.
    pub fn includes_current_sources(&self) -> bool {
        self.case == FaultCase::Max
    }
}
