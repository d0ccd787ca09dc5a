//! # ikss-algo: Short-Circuit Calculation Engine
//!
//! Initial symmetrical short-circuit currents (Ik'') for balanced
//! three-phase faults on networks built with [`ikss_core`], following the
//! equivalent voltage source method of IEC 60909.
//!
//! ## Calculation
//!
//! | Step | Description |
//! |------|-------------|
//! | Source adapter | Grid equivalents and machines become per-unit impedances or current injections |
//! | Admittance assembly | Sparse Y over the energized buses, one factorization |
//! | Fault solver | Ik'', Sk'', κ and ip from the Thevenin impedance of each fault bus |
//! | Distributor | Branch currents per fault, aggregated per case |
//!
//! Both the maximum and the minimum fault level are supported; the
//! [`FaultCase`] selects voltage factors, grid data, conductor temperature
//! correction and whether current-source machines contribute.
//!
//! ## Batch studies
//!
//! [`run_fault_study`] runs independent `(snapshot, case)` jobs on a rayon
//! thread pool when the `parallel` feature is enabled.
//!
//! ## Example
//!
//! ```ignore
//! use ikss_algo::{FaultCase, ShortCircuitCalculator};
//! use ikss_core::Network;
//!
//! let results = ShortCircuitCalculator::new()
//!     .with_branch_results(true)
//!     .compute(&network, FaultCase::Max)?;
//!
//! for bus in results.buses().values() {
//!     println!("{}: {:?} kA", bus.bus, bus.ikss_ka);
//! }
//! ```

pub mod batch;
pub mod config;
pub mod short_circuit;
pub mod sparse;

pub use batch::{run_fault_study, FaultStudyJob, FaultStudyRecord, FaultStudySummary};
pub use config::ShortCircuitConfig;
pub use short_circuit::{
    compute_fault_currents, validate_snapshot, BranchResult, BranchStatus, BusFault, BusResult,
    BusStatus, FaultCase, FaultDistribution, LvTolerance, PeakTopology, ResultSet,
    ShortCircuitCalculator, VoltageFactor, VoltageFactorTable,
};
pub use sparse::{SparseYBus, YBusBuilder, YBusError};
