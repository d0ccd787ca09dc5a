//! Dense complex linear-system backends used to invert the bus admittance
//! matrix.

pub mod backend;
pub mod registry;

pub use backend::{FactoredSystem, FaerSolver, GaussSolver, LinearSystemBackend};
pub use registry::SolverKind;
