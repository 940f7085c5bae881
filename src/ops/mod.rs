//! High-level operations built on the core model and graph.

pub mod canonicalize;
pub mod clean;

pub use canonicalize::canonicalize;
pub use clean::{clean, CleanOptions};
