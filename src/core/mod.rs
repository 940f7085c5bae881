//! Core entity model: suites, projects, libraries, distributions.

pub mod compliance;
pub mod distribution;
pub mod entity;
pub mod library;
pub mod project;
pub mod registry;
pub mod suite;

pub use compliance::JavaCompliance;
pub use distribution::{Distribution, UpdateListener};
pub use entity::EntityRef;
pub use library::Library;
pub use project::{JavaPackages, Project};
pub use registry::Registry;
pub use suite::Suite;
