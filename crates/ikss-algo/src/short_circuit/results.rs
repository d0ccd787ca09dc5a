//! Result assembler.
//!
//! Collects bus faults and aggregated branch currents into one serializable
//! [`ResultSet`]. Buses without a path to a source keep their entry, flagged
//! with [`BusStatus::NoPath`] and without numbers.

use std::collections::BTreeMap;

use ikss_core::{
    BranchId, BusId, DiagnosticIssue, Kiloamperes, MegavoltAmperes, Ohms, ScResult,
};
use serde::Serialize;

use super::case::FaultCase;
use super::distributor::{AggregatedCurrent, FaultDistribution};
use super::solver::BusFault;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusStatus {
    Ok,
    /// Not connected to any impedance source
    NoPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    Ok,
    NoPath,
    OutOfService,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusResult {
    pub bus: BusId,
    pub status: BusStatus,
    pub ikss_ka: Option<Kiloamperes>,
    pub skss_mva: Option<MegavoltAmperes>,
    pub ip_ka: Option<Kiloamperes>,
    pub kappa: Option<f64>,
    pub rk_ohm: Option<Ohms>,
    pub xk_ohm: Option<Ohms>,
    pub c: Option<f64>,
}

impl BusResult {
    pub fn solved(fault: &BusFault) -> Self {
        Self {
            bus: fault.bus,
            status: BusStatus::Ok,
            ikss_ka: Some(fault.ikss_ka),
            skss_mva: Some(fault.skss_mva),
            ip_ka: Some(fault.ip_ka),
            kappa: Some(fault.kappa),
            rk_ohm: Some(fault.rk_ohm),
            xk_ohm: Some(fault.xk_ohm),
            c: Some(fault.c),
        }
    }

    pub fn no_path(bus: BusId) -> Self {
        Self {
            bus,
            status: BusStatus::NoPath,
            ikss_ka: None,
            skss_mva: None,
            ip_ka: None,
            kappa: None,
            rk_ohm: None,
            xk_ohm: None,
            c: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == BusStatus::Ok
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchResult {
    pub branch: BranchId,
    pub status: BranchStatus,
    /// Governing current on the from-bus voltage level
    pub ikss_ka: Option<Kiloamperes>,
    /// Same current on the to-bus voltage level
    pub ikss_to_ka: Option<Kiloamperes>,
    /// Fault location producing `ikss_ka`
    pub fault_bus: Option<BusId>,
}

impl BranchResult {
    pub fn aggregated(branch: BranchId, current: &AggregatedCurrent) -> Self {
        Self {
            branch,
            status: BranchStatus::Ok,
            ikss_ka: Some(current.ikss_ka),
            ikss_to_ka: Some(current.ikss_to_ka),
            fault_bus: current.fault_bus,
        }
    }

    pub fn without_current(branch: BranchId, status: BranchStatus) -> Self {
        Self {
            branch,
            status,
            ikss_ka: None,
            ikss_to_ka: None,
            fault_bus: None,
        }
    }
}

/// Everything one calculation produced.
///
/// Read-only once returned; the calculator assembles it in one step.
#[derive(Debug, Clone, Serialize)]
pub struct ResultSet {
    case: FaultCase,
    base_mva: MegavoltAmperes,
    buses: BTreeMap<BusId, BusResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branches: Option<BTreeMap<BranchId, BranchResult>>,
    /// Per-fault branch currents, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    distributions: Option<Vec<FaultDistribution>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<DiagnosticIssue>,
}

impl ResultSet {
    pub(crate) fn new(
        case: FaultCase,
        base_mva: MegavoltAmperes,
        buses: BTreeMap<BusId, BusResult>,
        branches: Option<BTreeMap<BranchId, BranchResult>>,
        distributions: Option<Vec<FaultDistribution>>,
        warnings: Vec<DiagnosticIssue>,
    ) -> Self {
        Self {
            case,
            base_mva,
            buses,
            branches,
            distributions,
            warnings,
        }
    }

    pub fn case(&self) -> FaultCase {
        self.case
    }

    pub fn base_mva(&self) -> MegavoltAmperes {
        self.base_mva
    }

    /// Bus results keyed by bus id, in id order
    pub fn buses(&self) -> &BTreeMap<BusId, BusResult> {
        &self.buses
    }

    /// Branch results, present when branch results were requested
    pub fn branches(&self) -> Option<&BTreeMap<BranchId, BranchResult>> {
        self.branches.as_ref()
    }

    pub fn distributions(&self) -> Option<&[FaultDistribution]> {
        self.distributions.as_deref()
    }

    /// Snapshot warnings raised before the calculation
    pub fn warnings(&self) -> &[DiagnosticIssue] {
        &self.warnings
    }

    pub fn bus(&self, id: BusId) -> Option<&BusResult> {
        self.buses.get(&id)
    }

    pub fn branch(&self, id: BranchId) -> Option<&BranchResult> {
        self.branches.as_ref().and_then(|b| b.get(&id))
    }

    /// Initial symmetrical current at `id`, if solved
    pub fn ikss(&self, id: BusId) -> Option<Kiloamperes> {
        self.bus(id).and_then(|b| b.ikss_ka)
    }

    pub fn no_path_buses(&self) -> Vec<BusId> {
        self.buses
            .values()
            .filter(|b| b.status == BusStatus::NoPath)
            .map(|b| b.bus)
            .collect()
    }

    pub fn to_json(&self) -> ScResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> ScResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
