//! Per-unit source adapter.
//!
//! Every source kind is reduced to either an admittance to the reference at
//! its bus or a current injection into it, on the system base:
//!
//! | Source | Contribution |
//! |--------|--------------|
//! | Grid equivalent | `z = c·S_base / S''k(case)` |
//! | Impedance machine | `z = S_base / (k·Sn)` |
//! | Current-source machine | `i = k·Sn / S_base` (max case only) |
//!
//! The impedance magnitude is split into R and X with the source's R/X
//! ratio: `X = z/√(1+(R/X)²)`, `R = X·(R/X)`.

use ikss_core::{
    BusId, GridSource, Kilovolts, MachineBehavior, MachineSource, MegavoltAmperes, Network,
    ScError, ScResult,
};
use num_complex::Complex64;

use super::policy::CasePolicy;

/// Closed set of short-circuit sources.
#[derive(Debug, Clone, Copy)]
pub enum SourceModel<'a> {
    Grid(&'a GridSource),
    Machine(&'a MachineSource),
}

/// What a source adds to the impedance network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceContribution {
    /// Impedance from `bus` to the reference, per-unit
    Admittance { bus: BusId, z_pu: Complex64 },
    /// Current injected into `bus`, per-unit
    Injection { bus: BusId, i_pu: Complex64 },
}

impl SourceContribution {
    pub fn bus(&self) -> BusId {
        match *self {
            SourceContribution::Admittance { bus, .. } => bus,
            SourceContribution::Injection { bus, .. } => bus,
        }
    }
}

/// Split an impedance magnitude into R + jX using the R/X ratio.
pub fn split_rx(z: f64, rx: f64) -> Complex64 {
    let x = z / (1.0 + rx * rx).sqrt();
    Complex64::new(rx * x, x)
}

fn require_positive(value: f64, what: &str, owner: impl std::fmt::Display) -> ScResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ScError::Configuration(format!(
            "{owner}: {what} must be positive, got {value}"
        )))
    }
}

fn require_ratio(rx: f64, owner: impl std::fmt::Display) -> ScResult<f64> {
    if rx.is_finite() && rx >= 0.0 {
        Ok(rx)
    } else {
        Err(ScError::Configuration(format!(
            "{owner}: R/X ratio must be finite and non-negative, got {rx}"
        )))
    }
}

impl<'a> SourceModel<'a> {
    /// In-service sources of the snapshot, grids first.
    pub fn collect(network: &'a Network) -> Vec<SourceModel<'a>> {
        let grids = network
            .grids()
            .into_iter()
            .filter(|g| g.in_service)
            .map(SourceModel::Grid);
        let machines = network
            .machines()
            .into_iter()
            .filter(|m| m.in_service)
            .map(SourceModel::Machine);
        grids.chain(machines).collect()
    }

    pub fn bus(&self) -> BusId {
        match self {
            SourceModel::Grid(g) => g.bus,
            SourceModel::Machine(m) => m.bus,
        }
    }

    pub fn label(&self) -> String {
        match self {
            SourceModel::Grid(g) => g.id.to_string(),
            SourceModel::Machine(m) => m.id.to_string(),
        }
    }

    /// Per-unit contribution for the active case.
    ///
    /// Returns `None` when the source takes no part in this case.
    pub fn contribution(
        &self,
        vn: Kilovolts,
        policy: &CasePolicy<'_>,
        base: MegavoltAmperes,
    ) -> ScResult<Option<SourceContribution>> {
        let label = self.label();
        require_positive(vn.value(), "nominal voltage of connected bus", &label)?;
        let base = require_positive(base.value(), "system base power", &label)?;

        match self {
            SourceModel::Grid(grid) => {
                let (s_sc, rx) = policy.grid_parameters(grid)?;
                let s_sc = require_positive(s_sc.value(), "short-circuit power", &label)?;
                let rx = require_ratio(rx, &label)?;
                let c = policy.voltage_factor(vn);
                Ok(Some(SourceContribution::Admittance {
                    bus: grid.bus,
                    z_pu: split_rx(c * base / s_sc, rx),
                }))
            }
            SourceModel::Machine(machine) => {
                let sn = require_positive(machine.sn.to_mva().value(), "rated power", &label)?;
                let k = require_positive(machine.k, "locked-rotor current ratio", &label)?;
                match machine.behavior {
                    MachineBehavior::Impedance => {
                        let rx = require_ratio(machine.rx, &label)?;
                        Ok(Some(SourceContribution::Admittance {
                            bus: machine.bus,
                            z_pu: split_rx(base / (k * sn), rx),
                        }))
                    }
                    MachineBehavior::CurrentSource if policy.includes_current_sources() => {
                        Ok(Some(SourceContribution::Injection {
                            bus: machine.bus,
                            i_pu: Complex64::new(k * sn / base, 0.0),
                        }))
                    }
                    MachineBehavior::CurrentSource => Ok(None),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::short_circuit::case::FaultCase;
    use crate::short_circuit::policy::{LvTolerance, VoltageFactorTable};
    use ikss_core::{GridId, KilovoltAmperes, MachineId};

    fn policy(case: FaultCase, table: &VoltageFactorTable) -> CasePolicy<'_> {
        CasePolicy::new(case, table, LvTolerance::TenPercent)
    }

    #[test]
    fn grid_impedance_uses_voltage_factor() {
        let table = VoltageFactorTable::default();
        let grid = GridSource::new(GridId::new(0), "Grid", BusId::new(0), MegavoltAmperes(10.0), 0.1);
        let contribution = SourceModel::Grid(&grid)
            .contribution(Kilovolts(0.4), &policy(FaultCase::Max, &table), MegavoltAmperes(1.0))
            .unwrap()
            .unwrap();

        let SourceContribution::Admittance { bus, z_pu } = contribution else {
            panic!("grid must be an admittance");
        };
        assert_eq!(bus, BusId::new(0));
        assert!((z_pu.norm() - 0.11).abs() < 1e-12);
        assert!((z_pu.re / z_pu.im - 0.1).abs() < 1e-12);
    }

    #[test]
    fn machine_impedance_uses_kva_rating() {
        let table = VoltageFactorTable::default();
        let motor = MachineSource::new(
            MachineId::new(0),
            "Motor",
            BusId::new(1),
            KilovoltAmperes(500.0),
            5.0,
            0.42,
        );
        for case in FaultCase::all() {
            let contribution = SourceModel::Machine(&motor)
                .contribution(Kilovolts(0.4), &policy(case, &table), MegavoltAmperes(1.0))
                .unwrap()
                .unwrap();
            let SourceContribution::Admittance { z_pu, .. } = contribution else {
                panic!("impedance machine must be an admittance");
            };
            // 1 MVA / (5 · 0.5 MVA)
            assert!((z_pu.norm() - 0.4).abs() < 1e-12);
        }
    }

    #[test]
    fn current_source_only_in_max_case() {
        let table = VoltageFactorTable::default();
        let drive = MachineSource::new(
            MachineId::new(2),
            "Drive",
            BusId::new(3),
            KilovoltAmperes(250.0),
            1.2,
            0.1,
        )
        .as_current_source();
        let model = SourceModel::Machine(&drive);

        let max = model
            .contribution(Kilovolts(0.4), &policy(FaultCase::Max, &table), MegavoltAmperes(1.0))
            .unwrap();
        assert_eq!(
            max,
            Some(SourceContribution::Injection {
                bus: BusId::new(3),
                i_pu: Complex64::new(0.3, 0.0)
            })
        );
        let min = model
            .contribution(Kilovolts(0.4), &policy(FaultCase::Min, &table), MegavoltAmperes(1.0))
            .unwrap();
        assert!(min.is_none());
    }

    #[test]
    fn rejects_invalid_parameters() {
        let table = VoltageFactorTable::default();
        let p = policy(FaultCase::Max, &table);
        let grid = GridSource::new(GridId::new(4), "Grid", BusId::new(0), MegavoltAmperes(0.0), 0.1);
        let err = SourceModel::Grid(&grid)
            .contribution(Kilovolts(0.4), &p, MegavoltAmperes(1.0))
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Grid 4"));

        let motor = MachineSource::new(
            MachineId::new(0),
            "Motor",
            BusId::new(1),
            KilovoltAmperes(5.0),
            f64::NAN,
            0.6,
        );
        assert!(SourceModel::Machine(&motor)
            .contribution(Kilovolts(0.4), &p, MegavoltAmperes(1.0))
            .is_err());

        let ok = GridSource::new(GridId::new(5), "Grid", BusId::new(0), MegavoltAmperes(5.0), 0.1);
        assert!(SourceModel::Grid(&ok)
            .contribution(Kilovolts(0.0), &p, MegavoltAmperes(1.0))
            .is_err());
    }

    #[test]
    fn split_preserves_magnitude() {
        let z = split_rx(2.0, 0.6);
        assert!((z.norm() - 2.0).abs() < 1e-12);
        assert!((z.re / z.im - 0.6).abs() < 1e-12);
    }
}
