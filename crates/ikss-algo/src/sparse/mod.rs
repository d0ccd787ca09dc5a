//! # Sparse Matrix Infrastructure
//!
//! Distribution and industrial networks are sparse: each bus connects to a
//! handful of neighbours, so the admittance matrix is assembled in triplet
//! form and compressed to CSR before it is handed to a dense factorization.
//!
//! ## Module Organization
//!
//! - [`ybus`]: Sparse admittance matrix (Y-bus) with source stamps

pub mod ybus;

pub use ybus::{BranchAdmittance, SparseYBus, YBusBuilder, YBusError};
