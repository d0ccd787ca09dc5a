//! Network impedance builder.
//!
//! Turns a snapshot into the per-unit bus impedance matrix `Z = Y⁻¹`:
//!
//! 1. Buses in islands without an impedance source are left out (they are
//!    reported as having no path).
//! 2. Branch series admittances and source admittances are stamped into a
//!    sparse Y on the remaining buses.
//! 3. Y is checked for symmetry, factorized once, and only the unit columns
//!    of the requested fault buses are solved. A fault column holds every
//!    row, so branch endpoints need no extra solves.
//! 4. One more solve gives the open-circuit voltages `v = Z·I` driven by
//!    current-source machines.

use std::collections::{BTreeMap, HashMap};

use ikss_core::{
    Branch, BranchImpedance, BusId, IslandAnalysis, Kilovolts, MegavoltAmperes, Network, Ohms,
    ScError, ScResult,
};
use num_complex::Complex64;
use tracing::debug;

use super::policy::CasePolicy;
use super::sources::{SourceContribution, SourceModel};
use crate::config::ShortCircuitConfig;
use crate::sparse::{SparseYBus, YBusBuilder};

/// Per-unit series impedance of a branch for the active case.
///
/// Ohmic impedances are normalized on the from-bus nominal voltage; the
/// resistance is corrected for conductor temperature in the minimum case.
pub fn branch_impedance_pu(
    branch: &Branch,
    vn: Kilovolts,
    policy: &CasePolicy<'_>,
    base: MegavoltAmperes,
) -> Complex64 {
    match branch.impedance {
        BranchImpedance::Ohms { r, x } => {
            let z_base = vn.base_impedance(base);
            let r = r * policy.resistance_factor(branch.end_temperature_c);
            Complex64::new(r.to_per_unit(z_base).value(), x.to_per_unit(z_base).value())
        }
        BranchImpedance::PerUnit { r, x } => Complex64::new(r.value(), x.value()),
    }
}

/// Selected columns of the bus impedance matrix, built once per calculation.
#[derive(Debug, Clone)]
pub struct BusImpedanceMatrix {
    ybus: SparseYBus,
    base: MegavoltAmperes,
    vn: Vec<Kilovolts>,
    meshed: Vec<bool>,
    columns: BTreeMap<usize, Vec<Complex64>>,
    source_voltage: Vec<Complex64>,
}

impl BusImpedanceMatrix {
    /// Assemble, factorize and solve the columns of `fault_buses`.
    ///
    /// `fault_buses` must be energized buses of `islands`.
    pub fn build(
        network: &Network,
        policy: &CasePolicy<'_>,
        config: &ShortCircuitConfig,
        islands: &IslandAnalysis,
        fault_buses: &[BusId],
    ) -> ScResult<Self> {
        let base = config.base_mva;
        let bus_vn: HashMap<BusId, Kilovolts> =
            network.buses().iter().map(|b| (b.id, b.vn_kv)).collect();

        let energized: Vec<BusId> = network
            .buses()
            .iter()
            .map(|b| b.id)
            .filter(|id| islands.is_energized(*id))
            .collect();
        let mut builder = YBusBuilder::new(&energized);

        let mut stamped_branches = 0usize;
        for branch in network.branches() {
            if !branch.in_service || !islands.is_energized(branch.from_bus) {
                continue;
            }
            let vn = bus_vn.get(&branch.from_bus).copied().ok_or_else(|| {
                ScError::Configuration(format!(
                    "{} references unknown {}",
                    branch.id, branch.from_bus
                ))
            })?;
            let z = branch_impedance_pu(branch, vn, policy, base);
            builder.stamp_branch(branch.id, branch.from_bus, branch.to_bus, z)?;
            stamped_branches += 1;
        }

        let mut injections = vec![Complex64::new(0.0, 0.0); energized.len()];
        let positions: HashMap<BusId, usize> = energized
            .iter()
            .enumerate()
            .map(|(idx, id)| (*id, idx))
            .collect();
        for source in SourceModel::collect(network) {
            let Some(&idx) = positions.get(&source.bus()) else {
                debug!(source = %source.label(), "source on de-energized bus ignored");
                continue;
            };
            let vn = bus_vn[&source.bus()];
            match source.contribution(vn, policy, base)? {
                Some(SourceContribution::Admittance { bus, z_pu }) => {
                    builder.stamp_shunt(bus, z_pu.inv())?;
                }
                Some(SourceContribution::Injection { i_pu, .. }) => {
                    injections[idx] += i_pu;
                }
                None => {
                    debug!(source = %source.label(), case = %policy.case(), "source neglected");
                }
            }
        }

        let ybus = builder.build()?;
        ybus.check_symmetry(config.symmetry_tolerance)?;
        debug!(
            buses = ybus.n_bus(),
            branches = stamped_branches,
            nnz = ybus.nnz(),
            "assembled admittance matrix"
        );

        let backend = config.solver.build_solver();
        let factors = backend.factorize(&ybus.to_dense()).map_err(|err| {
            ScError::NumericIllConditioning(format!(
                "{} factorization of the admittance matrix failed: {err}",
                backend.name()
            ))
        })?;

        let mut columns = BTreeMap::new();
        for bus in fault_buses {
            let idx = ybus.bus_index(*bus).ok_or_else(|| {
                ScError::Network(format!("{bus} has no path to a short-circuit source"))
            })?;
            if columns.contains_key(&idx) {
                continue;
            }
            let column = factors
                .solve_unit(idx)
                .map_err(|err| ScError::NumericIllConditioning(format!("{bus}: {err}")))?;
            columns.insert(idx, column);
        }

        let source_voltage = if injections.iter().any(|i| i.norm() > 0.0) {
            factors.solve(&injections).map_err(|err| {
                ScError::NumericIllConditioning(format!("current-source voltages: {err}"))
            })?
        } else {
            injections
        };

        let vn = ybus
            .bus_ids()
            .iter()
            .map(|id| bus_vn[id])
            .collect();
        let meshed = ybus
            .bus_ids()
            .iter()
            .map(|id| islands.island_of(*id).is_some_and(|island| island.is_meshed()))
            .collect();

        debug!(
            columns = columns.len(),
            backend = backend.name(),
            "solved bus impedance columns"
        );

        Ok(Self {
            ybus,
            base,
            vn,
            meshed,
            columns,
            source_voltage,
        })
    }

    pub fn ybus(&self) -> &SparseYBus {
        &self.ybus
    }

    pub fn base(&self) -> MegavoltAmperes {
        self.base
    }

    pub fn dim(&self) -> usize {
        self.ybus.n_bus()
    }

    pub fn index_of(&self, bus: BusId) -> Option<usize> {
        self.ybus.bus_index(bus)
    }

    pub fn bus_at(&self, idx: usize) -> Option<BusId> {
        self.ybus.bus_id(idx)
    }

    pub fn nominal_voltage(&self, idx: usize) -> Kilovolts {
        self.vn[idx]
    }

    pub fn is_meshed(&self, idx: usize) -> bool {
        self.meshed[idx]
    }

    /// A solved column of Z
    pub fn column(&self, col: usize) -> Option<&[Complex64]> {
        self.columns.get(&col).map(Vec::as_slice)
    }

    /// Z[row, col], available when either index was solved (Z is symmetric)
    pub fn z(&self, row: usize, col: usize) -> Option<Complex64> {
        self.columns
            .get(&col)
            .and_then(|c| c.get(row).copied())
            .or_else(|| self.columns.get(&row).and_then(|r| r.get(col).copied()))
    }

    /// Thevenin impedance of a solved bus in ohms
    pub fn thevenin_ohms(&self, idx: usize) -> Option<(Ohms, Ohms)> {
        let z = self.z(idx, idx)?;
        let z_base = self.vn[idx].base_impedance(self.base);
        Some((Ohms(z.re * z_base.value()), Ohms(z.im * z_base.value())))
    }

    /// Open-circuit node voltages driven by current-source machines
    pub fn source_voltage(&self) -> &[Complex64] {
        &self.source_voltage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::short_circuit::case::FaultCase;
    use crate::short_circuit::policy::{LvTolerance, VoltageFactorTable};
    use ikss_core::*;

    fn network() -> Network {
        let mut network = Network::new();
        for id in 0..3 {
            network.add_bus(Bus::new(BusId::new(id), format!("Bus {id}"), Kilovolts(0.4)));
        }
        network.add_grid(GridSource::new(
            GridId::new(0),
            "Grid",
            BusId::new(0),
            MegavoltAmperes(10.0),
            0.1,
        ));
        network
            .add_branch(
                Branch::from_line_parameters(
                    BranchId::new(0),
                    "Line",
                    BusId::new(0),
                    BusId::new(1),
                    0.1,
                    0.08,
                    1.0,
                )
                .with_end_temperature(80.0),
            )
            .unwrap();
        network
    }

    #[test]
    fn branch_resistance_heats_up_in_min_case() {
        let net = network();
        let table = VoltageFactorTable::default();
        let branch = net.branches()[0];
        let base = MegavoltAmperes(1.0);

        let max = CasePolicy::new(FaultCase::Max, &table, LvTolerance::default());
        let min = CasePolicy::new(FaultCase::Min, &table, LvTolerance::default());
        let z_max = branch_impedance_pu(branch, Kilovolts(0.4), &max, base);
        let z_min = branch_impedance_pu(branch, Kilovolts(0.4), &min, base);

        // 0.1 Ω on a 0.16 Ω base
        assert!((z_max.re - 0.625).abs() < 1e-12);
        assert!((z_min.re - 0.625 * 1.24).abs() < 1e-12);
        assert_eq!(z_max.im, z_min.im);
    }

    #[test]
    fn excludes_dead_island_and_solves_requested_columns() {
        let net = network();
        let table = VoltageFactorTable::default();
        let policy = CasePolicy::new(FaultCase::Max, &table, LvTolerance::default());
        let config = ShortCircuitConfig::default();
        let islands = find_islands(&net);

        let zbus =
            BusImpedanceMatrix::build(&net, &policy, &config, &islands, &[BusId::new(1)]).unwrap();
        assert_eq!(zbus.dim(), 2);
        assert!(zbus.index_of(BusId::new(2)).is_none());

        let col = zbus.index_of(BusId::new(1)).unwrap();
        let other = zbus.index_of(BusId::new(0)).unwrap();
        assert!(zbus.column(col).is_some());
        assert!(zbus.column(other).is_none());
        // symmetric lookup through the solved column
        assert_eq!(zbus.z(other, col), zbus.z(col, other));
        assert!(zbus.z(other, other).is_none());

        // radial chain: Z_11 = z_grid + z_line
        let z_grid = crate::short_circuit::sources::split_rx(0.11, 0.1);
        let z_line = Complex64::new(0.625, 0.5);
        assert!((zbus.z(col, col).unwrap() - (z_grid + z_line)).norm() < 1e-12);
        assert!(zbus.source_voltage().iter().all(|v| v.norm() == 0.0));
    }

    #[test]
    fn rejects_dead_fault_bus() {
        let net = network();
        let table = VoltageFactorTable::default();
        let policy = CasePolicy::new(FaultCase::Max, &table, LvTolerance::default());
        let islands = find_islands(&net);
        let err = BusImpedanceMatrix::build(
            &net,
            &policy,
            &ShortCircuitConfig::default(),
            &islands,
            &[BusId::new(2)],
        )
        .unwrap_err();
        assert!(matches!(err, ScError::Network(_)));
    }
}
