//! The shared capability surface over projects, libraries and
//! distributions.
//!
//! Entities are identified by name alone, process-wide: two entities with
//! the same name anywhere in the loaded universe are the same entity, and
//! registering a second one is a conflict handled by the registry.

use crate::core::{Distribution, Library, Project};

/// A borrowed view of any registered entity.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Project(&'a Project),
    Library(&'a Library),
    Distribution(&'a Distribution),
}

impl<'a> EntityRef<'a> {
    /// The entity's unique name.
    pub fn name(&self) -> &'a str {
        match self {
            EntityRef::Project(p) => p.name(),
            EntityRef::Library(l) => l.name(),
            EntityRef::Distribution(d) => d.name(),
        }
    }

    /// The names this entity declares dependencies on, in declaration
    /// order.
    pub fn dep_names(&self) -> &'a [String] {
        match self {
            EntityRef::Project(p) => p.deps(),
            EntityRef::Library(l) => l.deps(),
            EntityRef::Distribution(d) => d.deps(),
        }
    }

    /// Whether this entity is an external pre-built library.
    pub fn is_library(&self) -> bool {
        matches!(self, EntityRef::Library(_))
    }

    /// Whether this entity is a buildable project.
    pub fn is_project(&self) -> bool {
        matches!(self, EntityRef::Project(_))
    }

    /// The project, if this entity is one.
    pub fn as_project(&self) -> Option<&'a Project> {
        match self {
            EntityRef::Project(p) => Some(p),
            _ => None,
        }
    }

    /// The library, if this entity is one.
    pub fn as_library(&self) -> Option<&'a Library> {
        match self {
            EntityRef::Library(l) => Some(l),
            _ => None,
        }
    }
}
