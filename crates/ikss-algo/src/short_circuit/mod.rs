//! # Short-circuit calculation engine
//!
//! Balanced three-phase fault currents by the equivalent voltage source
//! method. The pipeline for one case:
//!
//! | Stage | Module |
//! |-------|--------|
//! | Grid and machine equivalents in per-unit | [`sources`] |
//! | Maximum/minimum case lookups | [`policy`] |
//! | Admittance assembly, single factorization, selective Z columns | [`builder`] |
//! | Bus currents, short-circuit power, peak current | [`solver`] |
//! | Branch currents per fault and their aggregation | [`distributor`] |
//! | Serializable result set | [`results`] |
//!
//! [`ShortCircuitCalculator`] drives the stages; [`compute_fault_currents`]
//! runs them with the default configuration.

pub mod builder;
pub mod case;
pub mod distributor;
pub mod engine;
pub mod policy;
pub mod results;
pub mod solver;
pub mod sources;

pub use builder::{branch_impedance_pu, BusImpedanceMatrix};
pub use case::FaultCase;
pub use distributor::{
    aggregate_branch_currents, AggregatedCurrent, BranchFaultCurrent, FaultDistribution,
};
pub use engine::{compute_fault_currents, validate_snapshot, ShortCircuitCalculator};
pub use policy::{CasePolicy, LvTolerance, VoltageFactor, VoltageFactorTable};
pub use results::{BranchResult, BranchStatus, BusResult, BusStatus, ResultSet};
pub use solver::{peak_factor, solve_bus_fault, BusFault, PeakTopology};
pub use sources::{split_rx, SourceContribution, SourceModel};
