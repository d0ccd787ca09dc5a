//! Short-circuit calculator.
//!
//! One calculation runs the whole pipeline for a single case: snapshot
//! validation, island analysis, impedance matrix assembly with selective
//! column solves, bus faults and (optionally) branch current distribution.

use std::collections::{BTreeMap, HashSet};

use ikss_core::{
    find_islands, BranchId, BusId, Diagnostics, Kiloamperes, MegavoltAmperes, Network, ScError,
    ScResult, SolverKind,
};
use tracing::{debug, info, info_span, warn};

use super::builder::BusImpedanceMatrix;
use super::case::FaultCase;
use super::distributor::{aggregate_branch_currents, AggregatedCurrent, FaultDistribution};
use super::policy::{CasePolicy, LvTolerance};
use super::results::{BranchResult, BranchStatus, BusResult, ResultSet};
use super::solver::{solve_bus_fault, PeakTopology};
use crate::config::ShortCircuitConfig;

/// Configured short-circuit calculator.
#[derive(Debug, Clone, Default)]
pub struct ShortCircuitCalculator {
    config: ShortCircuitConfig,
    buses_of_interest: Option<Vec<BusId>>,
    branches_of_interest: Option<Vec<BranchId>>,
}

impl ShortCircuitCalculator {
    /// Create a calculator with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ShortCircuitConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_base_mva(mut self, base: MegavoltAmperes) -> Self {
        self.config.base_mva = base;
        self
    }

    pub fn with_solver(mut self, solver: SolverKind) -> Self {
        self.config.solver = solver;
        self
    }

    pub fn with_lv_tolerance(mut self, tolerance: LvTolerance) -> Self {
        self.config.lv_tolerance = tolerance;
        self
    }

    pub fn with_topology(mut self, topology: PeakTopology) -> Self {
        self.config.topology = topology;
        self
    }

    pub fn with_branch_results(mut self, enabled: bool) -> Self {
        self.config.branch_results = enabled;
        self
    }

    /// Keep the per-fault branch currents (implies branch results)
    pub fn with_return_all_currents(mut self, enabled: bool) -> Self {
        self.config.return_all_currents = enabled;
        self
    }

    /// Restrict the fault locations. Branch currents are then aggregated
    /// over these faults only.
    pub fn with_buses_of_interest(mut self, buses: impl IntoIterator<Item = BusId>) -> Self {
        self.buses_of_interest = Some(buses.into_iter().collect());
        self
    }

    pub fn with_branches_of_interest(
        mut self,
        branches: impl IntoIterator<Item = BranchId>,
    ) -> Self {
        self.branches_of_interest = Some(branches.into_iter().collect());
        self
    }

    pub fn config(&self) -> &ShortCircuitConfig {
        &self.config
    }

    fn wants_branches(&self) -> bool {
        self.config.branch_results || self.config.return_all_currents
    }

    /// Fault locations in bus order, deduplicated.
    fn fault_targets(&self, network: &Network) -> ScResult<Vec<BusId>> {
        let Some(requested) = &self.buses_of_interest else {
            return Ok(network.buses().iter().map(|b| b.id).collect());
        };
        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(requested.len());
        for bus in requested {
            if network.bus(*bus).is_none() {
                return Err(ScError::Configuration(format!(
                    "bus of interest {bus} is not part of the network"
                )));
            }
            if seen.insert(*bus) {
                targets.push(*bus);
            }
        }
        Ok(targets)
    }

    fn branch_filter(&self, network: &Network) -> ScResult<Option<HashSet<BranchId>>> {
        let Some(requested) = &self.branches_of_interest else {
            return Ok(None);
        };
        let known: HashSet<BranchId> = network.branches().iter().map(|b| b.id).collect();
        for branch in requested {
            if !known.contains(branch) {
                return Err(ScError::Configuration(format!(
                    "branch of interest {branch} is not part of the network"
                )));
            }
        }
        Ok(Some(requested.iter().copied().collect()))
    }

    /// Run one calculation for `case`.
    pub fn compute(&self, network: &Network, case: FaultCase) -> ScResult<ResultSet> {
        let span = info_span!("short_circuit", case = %case);
        let _enter = span.enter();

        self.config.validate()?;
        let diagnostics = validate_snapshot(network, case, &self.config).into_result()?;
        for issue in diagnostics.warnings() {
            warn!(%issue, "snapshot warning");
        }

        let targets = self.fault_targets(network)?;
        let branch_filter = self.branch_filter(network)?;
        let islands = find_islands(network);

        let mut buses = BTreeMap::new();
        let (energized, dead): (Vec<BusId>, Vec<BusId>) = targets
            .iter()
            .copied()
            .partition(|bus| islands.is_energized(*bus));
        for bus in &dead {
            buses.insert(*bus, BusResult::no_path(*bus));
        }
        if !dead.is_empty() {
            info!(count = dead.len(), "buses without a path to a source");
        }

        let mut distributions = Vec::new();
        if !energized.is_empty() {
            let policy =
                CasePolicy::new(case, &self.config.voltage_factors, self.config.lv_tolerance);
            let zbus =
                BusImpedanceMatrix::build(network, &policy, &self.config, &islands, &energized)?;

            for bus in &energized {
                let fault = solve_bus_fault(&zbus, *bus, &policy, self.config.topology)?;
                debug!(
                    bus = %bus,
                    ikss_ka = fault.ikss_ka.value(),
                    ip_ka = fault.ip_ka.value(),
                    "bus fault solved"
                );
                buses.insert(*bus, BusResult::solved(&fault));

                if self.wants_branches() {
                    let keep = |id: BranchId| {
                        branch_filter
                            .as_ref()
                            .map_or(true, |filter| filter.contains(&id))
                    };
                    distributions.push(FaultDistribution::compute(&zbus, *bus, fault.c, keep)?);
                }
            }
        }

        let mut branches = None;
        let mut all_currents = None;
        if self.wants_branches() {
            let aggregated =
                aggregate_branch_currents(&distributions, case, self.config.zero_current_threshold);
            let mut by_branch = BTreeMap::new();
            for branch in network.branches() {
                if let Some(filter) = &branch_filter {
                    if !filter.contains(&branch.id) {
                        continue;
                    }
                }
                let result = if !branch.in_service {
                    BranchResult::without_current(branch.id, BranchStatus::OutOfService)
                } else if let Some(current) = aggregated.get(&branch.id) {
                    BranchResult::aggregated(branch.id, current)
                } else if islands.is_energized(branch.from_bus) {
                    // energized but no fault was evaluated
                    BranchResult::aggregated(
                        branch.id,
                        &AggregatedCurrent {
                            ikss_ka: Kiloamperes(0.0),
                            ikss_to_ka: Kiloamperes(0.0),
                            fault_bus: None,
                        },
                    )
                } else {
                    BranchResult::without_current(branch.id, BranchStatus::NoPath)
                };
                by_branch.insert(branch.id, result);
            }
            branches = Some(by_branch);
            if self.config.return_all_currents {
                all_currents = Some(distributions);
            }
        }

        info!(
            buses = buses.len(),
            no_path = dead.len(),
            branches = branches.as_ref().map_or(0, BTreeMap::len),
            "short-circuit calculation finished"
        );
        Ok(ResultSet::new(
            case,
            self.config.base_mva,
            buses,
            branches,
            all_currents,
            diagnostics.warnings().cloned().collect(),
        ))
    }
}

/// Compute fault currents with the default configuration.
pub fn compute_fault_currents(
    network: &Network,
    case: FaultCase,
    branch_results: bool,
) -> ScResult<ResultSet> {
    ShortCircuitCalculator::new()
        .with_branch_results(branch_results)
        .compute(network, case)
}

/// Check a snapshot for everything that would make a calculation of `case`
/// fail, without running it.
pub fn validate_snapshot(
    network: &Network,
    case: FaultCase,
    config: &ShortCircuitConfig,
) -> Diagnostics {
    let mut diag = Diagnostics::new();
    network.validate_into(&mut diag);

    if let Err(err) = config.validate() {
        diag.add_error("configuration", &err.to_string());
    }

    let policy = CasePolicy::new(case, &config.voltage_factors, config.lv_tolerance);
    for grid in network.grids().into_iter().filter(|g| g.in_service) {
        if let Err(err) = policy.grid_parameters(grid) {
            diag.add_error_with_entity(
                "configuration",
                &err.to_string(),
                &grid.id.to_string(),
            );
        }
    }
    diag
}
