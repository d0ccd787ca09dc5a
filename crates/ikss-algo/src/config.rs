//! Engine configuration.
//!
//! [`ShortCircuitConfig`] holds every tunable of a calculation. It can be
//! built in code, or loaded from TOML where unspecified values fall back to
//! the defaults:
//!
//! ```toml
//! base_mva = 1.0
//! lv_tolerance = "6%"
//! solver = "gauss"
//! branch_results = true
//!
//! [voltage_factors.mv_hv]
//! c_max = 1.1
//! c_min = 1.0
//! ```

use std::path::Path;

use ikss_core::{MegavoltAmperes, ScError, ScResult, SolverKind};
use serde::{Deserialize, Serialize};

use crate::short_circuit::policy::{LvTolerance, VoltageFactorTable};
use crate::short_circuit::solver::PeakTopology;

/// Configuration for a short-circuit calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortCircuitConfig {
    /// System base power for the per-unit conversion
    pub base_mva: MegavoltAmperes,

    /// Voltage tolerance of the low-voltage systems
    pub lv_tolerance: LvTolerance,

    /// Backend used to factorize the admittance matrix
    pub solver: SolverKind,

    /// Largest tolerated |Y[i,j] - Y[j,i]| before factorization
    pub symmetry_tolerance: f64,

    /// Branch currents below this (per-unit) are treated as zero
    pub zero_current_threshold: f64,

    /// Network topology assumed for the peak factor
    pub topology: PeakTopology,

    /// Compute branch currents in addition to bus currents
    pub branch_results: bool,

    /// Keep the branch currents of every individual fault in the results
    pub return_all_currents: bool,

    /// Voltage factor `c` per band and case
    pub voltage_factors: VoltageFactorTable,
}

impl Default for ShortCircuitConfig {
    fn default() -> Self {
        Self {
            base_mva: MegavoltAmperes(1.0),
            lv_tolerance: LvTolerance::TenPercent,
            solver: SolverKind::Faer,
            symmetry_tolerance: 1e-9,
            zero_current_threshold: 1e-10,
            topology: PeakTopology::Auto,
            branch_results: false,
            return_all_currents: false,
            voltage_factors: VoltageFactorTable::default(),
        }
    }
}

impl ShortCircuitConfig {
    /// Parse a (possibly partial) TOML document.
    pub fn from_toml_str(contents: &str) -> ScResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> ScResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> ScResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> ScResult<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Reject settings no calculation can run with.
    pub fn validate(&self) -> ScResult<()> {
        if !self.base_mva.is_positive() {
            return Err(ScError::Configuration(format!(
                "base_mva must be positive, got {}",
                self.base_mva.value()
            )));
        }
        if !(self.symmetry_tolerance.is_finite() && self.symmetry_tolerance >= 0.0) {
            return Err(ScError::Configuration(
                "symmetry_tolerance must be finite and non-negative".into(),
            ));
        }
        if !(self.zero_current_threshold.is_finite() && self.zero_current_threshold >= 0.0) {
            return Err(ScError::Configuration(
                "zero_current_threshold must be finite and non-negative".into(),
            ));
        }
        self.voltage_factors.validate()
    }
}
