//! # ikss-core: Short-Circuit Network Model
//!
//! Provides the data structures a fault study reads: buses, lines, the
//! equivalent grid source and rotating machines, held in a graph-based
//! network snapshot.
//!
//! ## Design Philosophy
//!
//! Networks are modeled as **undirected multigraphs** where:
//! - **Nodes**: Buses, Grid equivalents (grid), Rotating machines (machine)
//! - **Edges**: Branches (lines, or transformers supplied in per-unit)
//!
//! Sources are standalone nodes that reference their bus by id, so bus
//! connectivity (and therefore island detection) only follows branches.
//! Parallel branches between the same buses are separate edges.
//!
//! ## Quick Start
//!
//! ```rust
//! use ikss_core::*;
//!
//! let mut network = Network::new();
//!
//! network.add_bus(Bus::new(BusId::new(0), "Feeder", Kilovolts(0.4)));
//! network.add_bus(Bus::new(BusId::new(1), "Motor MCC", Kilovolts(0.4)));
//!
//! network.add_grid(GridSource::new(
//!     GridId::new(0),
//!     "Utility",
//!     BusId::new(0),
//!     MegavoltAmperes(10.0),
//!     0.1,
//! ));
//!
//! network
//!     .add_branch(Branch::from_line_parameters(
//!         BranchId::new(0),
//!         "Cable 0-1",
//!         BusId::new(0),
//!         BusId::new(1),
//!         0.3211,
//!         0.069_115_04,
//!         1.0,
//!     ))
//!     .unwrap();
//!
//! network.add_machine(MachineSource::new(
//!     MachineId::new(0),
//!     "Pump motor",
//!     BusId::new(1),
//!     KilovoltAmperes(0.5),
//!     7.0,
//!     0.6,
//! ));
//!
//! let mut diag = Diagnostics::new();
//! network.validate_into(&mut diag);
//! assert!(!diag.has_errors());
//! assert_eq!(network.stats().num_machines, 1);
//! ```
//!
//! ## Modules
//!
//! - [`diagnostics`] - Validation and diagnostic reporting
//! - [`graph_utils`] - Island detection and energized-bus analysis
//! - [`solver`] - Dense complex linear-system backends
//! - [`units`] - Unit newtypes for ratings, voltages and impedances

use petgraph::{prelude::*, Undirected};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub mod diagnostics;
pub mod error;
pub mod graph_utils;
pub mod solver;
pub mod units;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{ScError, ScResult};
pub use graph_utils::*;
pub use petgraph::graph::{EdgeIndex, NodeIndex};
pub use solver::*;
pub use units::{
    Kiloamperes, KilovoltAmperes, Kilovolts, Kilowatts, MegavoltAmperes, Ohms, PerUnit,
};

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(usize);

        impl $name {
            #[inline]
            pub fn new(value: usize) -> Self {
                $name(value)
            }
            #[inline]
            pub fn value(&self) -> usize {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{} {}", $label, self.0)
            }
        }
    };
}

id_newtype!(
    /// Bus identifier, unique within a snapshot
    BusId,
    "Bus"
);
id_newtype!(BranchId, "Branch");
id_newtype!(GridId, "Grid");
id_newtype!(MachineId, "Machine");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    /// Nominal line-to-line voltage
    pub vn_kv: Kilovolts,
}

impl Bus {
    pub fn new(id: BusId, name: impl Into<String>, vn_kv: Kilovolts) -> Self {
        Self {
            id,
            name: name.into(),
            vn_kv,
        }
    }
}

/// Series impedance of a branch.
///
/// Lines are usually described in ohms. Transformers (and anything else
/// spanning two voltage levels) must be given in per-unit on the system base.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum BranchImpedance {
    /// Total series impedance in ohms
    Ohms { r: Ohms, x: Ohms },
    /// Series impedance in per-unit of the system base
    PerUnit { r: PerUnit, x: PerUnit },
}

impl BranchImpedance {
    /// (r, x) as raw numbers in whatever unit the variant carries
    pub fn components(&self) -> (f64, f64) {
        match *self {
            BranchImpedance::Ohms { r, x } => (r.value(), x.value()),
            BranchImpedance::PerUnit { r, x } => (r.value(), x.value()),
        }
    }

    pub fn is_ohmic(&self) -> bool {
        matches!(self, BranchImpedance::Ohms { .. })
    }

    /// Impedance magnitude in the variant's unit
    pub fn magnitude(&self) -> f64 {
        let (r, x) = self.components();
        r.hypot(x)
    }
}

/// Shunt admittance of a line in per-unit. Neglected in short-circuit
/// calculations.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ShuntAdmittance {
    pub g: PerUnit,
    pub b: PerUnit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub from_bus: BusId,
    pub to_bus: BusId,
    pub impedance: BranchImpedance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shunt: Option<ShuntAdmittance>,
    /// Conductor temperature at the end of the fault (°C). Raises the
    /// resistance in the minimum case.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_temperature_c: Option<f64>,
    /// Operational status flag
    #[serde(default = "default_in_service")]
    pub in_service: bool,
}

fn default_in_service() -> bool {
    true
}

impl Branch {
    pub fn new(
        id: BranchId,
        name: impl Into<String>,
        from_bus: BusId,
        to_bus: BusId,
        impedance: BranchImpedance,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            from_bus,
            to_bus,
            impedance,
            shunt: None,
            end_temperature_c: None,
            in_service: true,
        }
    }

    /// Build a line from per-kilometre parameters.
    pub fn from_line_parameters(
        id: BranchId,
        name: impl Into<String>,
        from_bus: BusId,
        to_bus: BusId,
        r_ohm_per_km: f64,
        x_ohm_per_km: f64,
        length_km: f64,
    ) -> Self {
        Self::new(
            id,
            name,
            from_bus,
            to_bus,
            BranchImpedance::Ohms {
                r: Ohms(r_ohm_per_km * length_km),
                x: Ohms(x_ohm_per_km * length_km),
            },
        )
    }

    pub fn with_end_temperature(mut self, celsius: f64) -> Self {
        self.end_temperature_c = Some(celsius);
        self
    }

    pub fn with_shunt(mut self, shunt: ShuntAdmittance) -> Self {
        self.shunt = Some(shunt);
        self
    }

    pub fn out_of_service(mut self) -> Self {
        self.in_service = false;
        self
    }
}

/// Equivalent of the upstream network at its connection bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSource {
    pub id: GridId,
    pub name: String,
    pub bus: BusId,
    /// Short-circuit power for the maximum case
    pub s_sc_max: MegavoltAmperes,
    /// Short-circuit power for the minimum case
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s_sc_min: Option<MegavoltAmperes>,
    /// R/X ratio for the maximum case
    pub rx_max: f64,
    /// R/X ratio for the minimum case
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx_min: Option<f64>,
    #[serde(default = "default_in_service")]
    pub in_service: bool,
}

impl GridSource {
    pub fn new(
        id: GridId,
        name: impl Into<String>,
        bus: BusId,
        s_sc_max: MegavoltAmperes,
        rx_max: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            bus,
            s_sc_max,
            s_sc_min: None,
            rx_max,
            rx_min: None,
            in_service: true,
        }
    }

    /// Attach the minimum-case short-circuit power and R/X ratio.
    ///
    /// `s_sc_min` must not exceed `s_sc_max`. Minimum-case currents stay at
    /// or below maximum-case currents only when `rx_min` equals `rx_max`;
    /// validation warns otherwise.
    pub fn with_min(mut self, s_sc_min: MegavoltAmperes, rx_min: f64) -> Self {
        self.s_sc_min = Some(s_sc_min);
        self.rx_min = Some(rx_min);
        self
    }
}

/// How a rotating machine is represented during the fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineBehavior {
    /// Locked-rotor impedance to ground at the machine bus
    #[default]
    Impedance,
    /// Constant current injection of `k` times rated current
    CurrentSource,
}

/// Motor or generator contributing to the fault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineSource {
    pub id: MachineId,
    pub name: String,
    pub bus: BusId,
    /// Rated apparent power
    pub sn: KilovoltAmperes,
    /// Rated active power
    #[serde(default)]
    pub p_rated: Kilowatts,
    /// Ratio of locked-rotor current to rated current
    pub k: f64,
    /// R/X ratio of the locked-rotor impedance
    pub rx: f64,
    #[serde(default)]
    pub behavior: MachineBehavior,
    #[serde(default = "default_in_service")]
    pub in_service: bool,
}

impl MachineSource {
    pub fn new(
        id: MachineId,
        name: impl Into<String>,
        bus: BusId,
        sn: KilovoltAmperes,
        k: f64,
        rx: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            bus,
            sn,
            p_rated: Kilowatts(0.0),
            k,
            rx,
            behavior: MachineBehavior::Impedance,
            in_service: true,
        }
    }

    pub fn with_active_power(mut self, p_rated: Kilowatts) -> Self {
        self.p_rated = p_rated;
        self
    }

    pub fn as_current_source(mut self) -> Self {
        self.behavior = MachineBehavior::CurrentSource;
        self
    }

    pub fn out_of_service(mut self) -> Self {
        self.in_service = false;
        self
    }

    pub fn is_current_source(&self) -> bool {
        self.behavior == MachineBehavior::CurrentSource
    }
}

// Enum to represent different types of nodes in the graph
#[derive(Debug, Clone)]
pub enum Node {
    Bus(Bus),
    Grid(GridSource),
    Machine(MachineSource),
}

// Enum to represent different types of edges in the graph
#[derive(Debug, Clone)]
pub enum Edge {
    Branch(Branch),
}

/// Absolute R/X difference below which minimum and maximum grid data agree
const RX_MISMATCH_TOLERANCE: f64 = 1e-9;

/// Network snapshot handed to a fault study
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub(crate) graph: Graph<Node, Edge, Undirected>,
    /// First node added for each bus id
    bus_nodes: HashMap<BusId, NodeIndex>,
}

impl Network {
    pub fn new() -> Self {
        Self {
            graph: Graph::new_undirected(),
            bus_nodes: HashMap::new(),
        }
    }

    /// Read-only view of the underlying graph
    pub fn graph(&self) -> &Graph<Node, Edge, Undirected> {
        &self.graph
    }

    pub fn add_bus(&mut self, bus: Bus) -> NodeIndex {
        let id = bus.id;
        let idx = self.graph.add_node(Node::Bus(bus));
        self.bus_nodes.entry(id).or_insert(idx);
        idx
    }

    /// Connect two existing buses. Both endpoints must already be present.
    pub fn add_branch(&mut self, branch: Branch) -> ScResult<EdgeIndex> {
        let from = self.bus_node(branch.from_bus).ok_or_else(|| {
            ScError::Configuration(format!(
                "{} references unknown {}",
                branch.id, branch.from_bus
            ))
        })?;
        let to = self.bus_node(branch.to_bus).ok_or_else(|| {
            ScError::Configuration(format!("{} references unknown {}", branch.id, branch.to_bus))
        })?;
        Ok(self.graph.add_edge(from, to, Edge::Branch(branch)))
    }

    pub fn add_grid(&mut self, grid: GridSource) -> NodeIndex {
        self.graph.add_node(Node::Grid(grid))
    }

    pub fn add_machine(&mut self, machine: MachineSource) -> NodeIndex {
        self.graph.add_node(Node::Machine(machine))
    }

    /// Graph node holding the given bus
    pub fn bus_node(&self, id: BusId) -> Option<NodeIndex> {
        self.bus_nodes.get(&id).copied()
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        match self.graph.node_weight(self.bus_node(id)?)? {
            Node::Bus(bus) => Some(bus),
            _ => None,
        }
    }

    /// Get all buses as a vector
    pub fn buses(&self) -> Vec<&Bus> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Bus(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    /// Get all branches as a vector
    pub fn branches(&self) -> Vec<&Branch> {
        self.graph
            .edge_weights()
            .map(|e| match e {
                Edge::Branch(b) => b,
            })
            .collect()
    }

    pub fn grids(&self) -> Vec<&GridSource> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Grid(g) => Some(g),
                _ => None,
            })
            .collect()
    }

    pub fn machines(&self) -> Vec<&MachineSource> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Machine(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    /// Find machines connected at a specific bus
    pub fn machines_at_bus(&self, bus_id: BusId) -> Vec<&MachineSource> {
        self.machines()
            .into_iter()
            .filter(|m| m.bus == bus_id)
            .collect()
    }

    /// Compute basic statistics about the network
    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats::default();

        for node in self.graph.node_weights() {
            match node {
                Node::Bus(_) => stats.num_buses += 1,
                Node::Grid(g) => {
                    stats.num_grids += 1;
                    if g.in_service {
                        stats.total_grid_ssc_max_mva += g.s_sc_max.value();
                    }
                }
                Node::Machine(m) => {
                    stats.num_machines += 1;
                    if m.is_current_source() {
                        stats.num_current_sources += 1;
                    }
                    if m.in_service {
                        stats.total_machine_kva += m.sn.value();
                    }
                }
            }
        }

        stats.num_branches = self.graph.edge_count();
        stats
    }

    /// Validate network data for issues that make a fault study meaningless.
    ///
    /// Populates the provided `Diagnostics` with any warnings/errors found.
    /// Case-dependent checks (minimum-case grid data) live with the engine.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        let stats = self.stats();

        if stats.num_buses == 0 {
            diag.add_error("configuration", "Network has no buses");
            return;
        }

        let mut seen = HashSet::new();
        for bus in self.buses() {
            let entity = bus.id.to_string();
            if !seen.insert(bus.id) {
                diag.add_error_with_entity("configuration", "Duplicate bus id", &entity);
            }
            if !bus.vn_kv.is_positive() {
                diag.add_error_with_entity(
                    "configuration",
                    &format!("Nominal voltage must be positive, got {}", bus.vn_kv.value()),
                    &entity,
                );
            }
        }

        let mut branch_ids = HashSet::new();
        for branch in self.branches() {
            self.validate_branch(branch, &mut branch_ids, diag);
        }

        for grid in self.grids() {
            let entity = grid.id.to_string();
            if self.bus(grid.bus).is_none() {
                diag.add_error_with_entity(
                    "configuration",
                    &format!("Connected to unknown {}", grid.bus),
                    &entity,
                );
            }
            if !grid.s_sc_max.is_positive() {
                diag.add_error_with_entity(
                    "configuration",
                    "Maximum short-circuit power must be positive",
                    &entity,
                );
            }
            if !(grid.rx_max.is_finite() && grid.rx_max >= 0.0) {
                diag.add_error_with_entity(
                    "configuration",
                    "R/X ratio must be finite and non-negative",
                    &entity,
                );
            }
            if let Some(s_min) = grid.s_sc_min {
                if !s_min.is_positive() {
                    diag.add_error_with_entity(
                        "configuration",
                        "Minimum short-circuit power must be positive",
                        &entity,
                    );
                } else if s_min > grid.s_sc_max {
                    diag.add_error_with_entity(
                        "configuration",
                        "Minimum short-circuit power exceeds the maximum",
                        &entity,
                    );
                }
            }
            if let Some(rx_min) = grid.rx_min {
                if !(rx_min.is_finite() && rx_min >= 0.0) {
                    diag.add_error_with_entity(
                        "configuration",
                        "Minimum-case R/X ratio must be finite and non-negative",
                        &entity,
                    );
                } else if (rx_min - grid.rx_max).abs() > RX_MISMATCH_TOLERANCE {
                    diag.add_warning_with_entity(
                        "rating",
                        &format!(
                            "Minimum-case R/X ratio {rx_min} differs from maximum-case {}; \
                             minimum-case currents may exceed maximum-case currents",
                            grid.rx_max
                        ),
                        &entity,
                    );
                }
            }
        }

        for machine in self.machines() {
            let entity = machine.id.to_string();
            if self.bus(machine.bus).is_none() {
                diag.add_error_with_entity(
                    "configuration",
                    &format!("Connected to unknown {}", machine.bus),
                    &entity,
                );
            }
            if !machine.sn.is_positive() {
                diag.add_error_with_entity(
                    "configuration",
                    "Rated apparent power must be positive",
                    &entity,
                );
            }
            if !(machine.k.is_finite() && machine.k > 0.0) {
                diag.add_error_with_entity(
                    "configuration",
                    "Locked-rotor current ratio must be positive",
                    &entity,
                );
            }
            if !(machine.rx.is_finite() && machine.rx >= 0.0) {
                diag.add_error_with_entity(
                    "configuration",
                    "R/X ratio must be finite and non-negative",
                    &entity,
                );
            }
            if machine.p_rated.value() > machine.sn.value() {
                diag.add_warning_with_entity(
                    "rating",
                    "Rated active power exceeds rated apparent power",
                    &entity,
                );
            }
        }

        let has_impedance_source = self.grids().iter().any(|g| g.in_service)
            || self
                .machines()
                .iter()
                .any(|m| m.in_service && !m.is_current_source());
        if !has_impedance_source {
            diag.add_warning(
                "topology",
                "Network has no grid or impedance machine; no bus can carry fault current",
            );
        }
    }

    fn validate_branch(
        &self,
        branch: &Branch,
        seen: &mut HashSet<BranchId>,
        diag: &mut Diagnostics,
    ) {
        let entity = branch.id.to_string();
        if !seen.insert(branch.id) {
            diag.add_error_with_entity("configuration", "Duplicate branch id", &entity);
        }

        let from = self.bus(branch.from_bus);
        let to = self.bus(branch.to_bus);
        for (end, bus) in [(branch.from_bus, from), (branch.to_bus, to)] {
            if bus.is_none() {
                diag.add_error_with_entity(
                    "configuration",
                    &format!("References unknown {}", end),
                    &entity,
                );
            }
        }
        if branch.from_bus == branch.to_bus {
            diag.add_error_with_entity("configuration", "Branch connects a bus to itself", &entity);
        }

        let (r, x) = branch.impedance.components();
        if !(r.is_finite() && x.is_finite()) || branch.impedance.magnitude() < 1e-12 {
            diag.add_error_with_entity(
                "configuration",
                "Series impedance must be finite and non-zero",
                &entity,
            );
        }
        if r < 0.0 {
            diag.add_warning_with_entity("rating", "Negative series resistance", &entity);
        }

        if let (Some(from), Some(to)) = (from, to) {
            let ratio = from.vn_kv / to.vn_kv;
            if branch.impedance.is_ohmic() && (ratio - 1.0).abs() > 1e-9 {
                diag.add_error_with_entity(
                    "configuration",
                    "Ohmic branch connects buses of different nominal voltage",
                    &entity,
                );
            }
        }

        if let Some(t) = branch.end_temperature_c {
            if !t.is_finite() {
                diag.add_error_with_entity(
                    "configuration",
                    "End temperature must be finite",
                    &entity,
                );
            }
        }
    }
}

/// Statistics about a network's size and source ratings
#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_branches: usize,
    pub num_grids: usize,
    pub num_machines: usize,
    pub num_current_sources: usize,
    pub total_grid_ssc_max_mva: f64,
    pub total_machine_kva: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} branches, {} grids ({:.1} MVA), {} machines ({:.1} kVA)",
            self.num_buses,
            self.num_branches,
            self.num_grids,
            self.total_grid_ssc_max_mva,
            self.num_machines,
            self.total_machine_kva
        )
    }
}

impl Node {
    /// Returns a human-readable label for the node (bus/grid/machine name).
    pub fn label(&self) -> &str {
        match self {
            Node::Bus(bus) => &bus.name,
            Node::Grid(grid) => &grid.name,
            Node::Machine(machine) => &machine.name,
        }
    }
}

impl Edge {
    /// Returns a human-readable label for the edge (branch name).
    pub fn label(&self) -> &str {
        match self {
            Edge::Branch(branch) => &branch.name,
        }
    }
}
