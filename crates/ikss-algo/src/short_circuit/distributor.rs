//! Branch current distributor.
//!
//! For a fault at bus `j` the node voltage changes follow from the fault
//! column of Z. Impedance sources and current sources are superposed:
//!
//! ```text
//! I1   = c / Z_jj                         (impedance sources)
//! ΔV1  = −Z[:,j]·I1
//! V2   = v − Z[:,j]·(v_j / Z_jj)          (current sources, bus j shorted)
//! ΔV   = ΔV1 + r·V2,   r = (I1/|I1|) / (I2/|I2|),   I2 = v_j / Z_jj
//! I_ft = y_ft·(ΔV_f − ΔV_t)
//! ```
//!
//! The rotation `r` puts the current-source share in phase with `I1`, which
//! matches the arithmetic sum used for the bus current.

use std::collections::{BTreeMap, HashSet};

use ikss_core::{BranchId, BusId, Kiloamperes, ScError, ScResult};
use num_complex::Complex64;
use serde::Serialize;

use super::builder::BusImpedanceMatrix;
use super::case::FaultCase;

/// Current through one branch during one fault.
#[derive(Debug, Clone, Serialize)]
pub struct BranchFaultCurrent {
    pub branch: BranchId,
    #[serde(skip)]
    pub current_pu: Complex64,
    /// Magnitude on the from-bus voltage level
    pub ikss_ka: Kiloamperes,
    /// Magnitude on the to-bus voltage level
    pub ikss_to_ka: Kiloamperes,
    /// Angle of the from→to current relative to the fault current reference
    pub angle_deg: f64,
}

/// Branch currents of a fault at one bus.
#[derive(Debug, Clone, Serialize)]
pub struct FaultDistribution {
    pub fault_bus: BusId,
    /// Total current drawn at the fault, per-unit
    #[serde(skip)]
    pub fault_current_pu: Complex64,
    pub branches: Vec<BranchFaultCurrent>,
    /// Node voltage change per matrix index, per-unit
    #[serde(skip)]
    node_voltage_pu: Vec<Complex64>,
}

impl FaultDistribution {
    /// Distribute a fault at `fault_bus`. Only branches accepted by `keep`
    /// are recorded; node voltages always cover the whole matrix.
    pub fn compute(
        zbus: &BusImpedanceMatrix,
        fault_bus: BusId,
        c: f64,
        keep: impl Fn(BranchId) -> bool,
    ) -> ScResult<Self> {
        let j = zbus
            .index_of(fault_bus)
            .ok_or_else(|| ScError::Network(format!("{fault_bus} is not energized")))?;
        let column = zbus.column(j).ok_or_else(|| {
            ScError::Network(format!("impedance column of {fault_bus} was not solved"))
        })?;
        let z_jj = column[j];
        if z_jj.norm() == 0.0 {
            return Err(ScError::NumericIllConditioning(format!(
                "zero Thevenin impedance at {fault_bus}"
            )));
        }

        let v = zbus.source_voltage();
        let i1 = c / z_jj;
        let i2 = v[j] / z_jj;
        let rotation = if i2.norm() > 0.0 {
            (i1 / i1.norm()) / (i2 / i2.norm())
        } else {
            Complex64::new(1.0, 0.0)
        };

        let node_voltage_pu: Vec<Complex64> = column
            .iter()
            .zip(v)
            .map(|(&z_ij, &v_i)| -z_ij * i1 + rotation * (v_i - z_ij * i2))
            .collect();

        let reference = Complex64::from_polar(1.0, -i1.arg());
        let base = zbus.base();
        let branches = zbus
            .ybus()
            .branches()
            .iter()
            .filter(|b| keep(b.branch))
            .map(|b| {
                let current = b.y * (node_voltage_pu[b.from] - node_voltage_pu[b.to]);
                let i_base_from = zbus.nominal_voltage(b.from).base_current(base);
                let i_base_to = zbus.nominal_voltage(b.to).base_current(base);
                BranchFaultCurrent {
                    branch: b.branch,
                    current_pu: current,
                    ikss_ka: i_base_from * current.norm(),
                    ikss_to_ka: i_base_to * current.norm(),
                    angle_deg: (current * reference).arg().to_degrees(),
                }
            })
            .collect();

        Ok(Self {
            fault_bus,
            fault_current_pu: i1 + rotation * i2,
            branches,
            node_voltage_pu,
        })
    }

    /// Net branch current leaving each bus (matrix order), over every
    /// stamped branch. Zero at buses without a source or fault.
    pub fn bus_balance(&self, zbus: &BusImpedanceMatrix) -> Vec<Complex64> {
        let mut balance = vec![Complex64::new(0.0, 0.0); zbus.dim()];
        for b in zbus.ybus().branches() {
            let current = b.y * (self.node_voltage_pu[b.from] - self.node_voltage_pu[b.to]);
            balance[b.from] += current;
            balance[b.to] -= current;
        }
        balance
    }

    pub fn node_voltage_pu(&self) -> &[Complex64] {
        &self.node_voltage_pu
    }

    pub fn branch(&self, id: BranchId) -> Option<&BranchFaultCurrent> {
        self.branches.iter().find(|b| b.branch == id)
    }
}

/// Aggregated current of one branch over all evaluated faults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatedCurrent {
    pub ikss_ka: Kiloamperes,
    pub ikss_to_ka: Kiloamperes,
    /// Fault that produced the reported value
    pub fault_bus: Option<BusId>,
}

/// Pick the governing current per branch: the largest in the maximum case,
/// the smallest non-negligible one in the minimum case. Branches that never
/// carry more than `threshold_pu` report zero.
pub fn aggregate_branch_currents(
    distributions: &[FaultDistribution],
    case: FaultCase,
    threshold_pu: f64,
) -> BTreeMap<BranchId, AggregatedCurrent> {
    let mut selected: BTreeMap<BranchId, (f64, &BranchFaultCurrent, BusId)> = BTreeMap::new();
    let mut seen = HashSet::new();

    for dist in distributions {
        for current in &dist.branches {
            seen.insert(current.branch);
            let magnitude = current.current_pu.norm();
            if magnitude < threshold_pu {
                continue;
            }
            let replace = match selected.get(&current.branch) {
                None => true,
                Some((best, _, _)) => match case {
                    FaultCase::Max => magnitude > *best,
                    FaultCase::Min => magnitude < *best,
                },
            };
            if replace {
                selected.insert(current.branch, (magnitude, current, dist.fault_bus));
            }
        }
    }

    seen.into_iter()
        .map(|branch| {
            let aggregated = match selected.get(&branch) {
                Some((_, current, bus)) => AggregatedCurrent {
                    ikss_ka: current.ikss_ka,
                    ikss_to_ka: current.ikss_to_ka,
                    fault_bus: Some(*bus),
                },
                None => AggregatedCurrent {
                    ikss_ka: Kiloamperes(0.0),
                    ikss_to_ka: Kiloamperes(0.0),
                    fault_bus: None,
                },
            };
            (branch, aggregated)
        })
        .collect()
}
