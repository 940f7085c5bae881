//! Dependency-graph queries.
//!
//! All derived graph properties needed by the orchestrator and packager:
//! transitive closure in dependency-first order, longest-distance
//! labeling, canonical (non-redundant) dependency computation, and global
//! build order. Traversals run over a [`Registry`] passed by reference.
//!
//! Well-formed input is acyclic by construction; every traversal still
//! colors its recursion stack and fails fast with the offending path
//! rather than looping.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::Result;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

use crate::core::{Distribution, Registry};

/// Graph traversal failure.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("dependency not found: {name} (required by {required_by})")]
    NotFound { name: String, required_by: String },

    #[error("project {name} is ignored (required by {required_by})")]
    Ignored { name: String, required_by: String },

    #[error("project {name} depends on itself")]
    SelfDependency { name: String },

    #[error("circular dependency: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
}

/// Options controlling [`transitive_closure`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosureOptions {
    /// Include libraries in the result set
    pub include_libs: bool,

    /// Append the requested entity itself, last
    pub include_self: bool,

    /// Treat annotation-processor edges as dependencies, ordered before
    /// ordinary dependency edges
    pub include_processors: bool,
}

/// All entities reachable from `name`, in dependency-first order: a
/// dependency always appears before any entity that depends on it.
pub fn transitive_closure(
    reg: &Registry,
    name: &str,
    opts: ClosureOptions,
) -> Result<Vec<String>> {
    let mut result = Vec::new();
    let mut placed = BTreeSet::new();
    let mut stack = Vec::new();
    visit(reg, name, "closure request", opts, true, &mut result, &mut placed, &mut stack)?;
    Ok(result)
}

/// One global dependency-first order over `roots` (all projects when no
/// roots are given), with no duplicates.
pub fn sorted_build_order(
    reg: &Registry,
    roots: Option<&[String]>,
    include_libs: bool,
    include_processors: bool,
) -> Result<Vec<String>> {
    let roots: Vec<String> = match roots {
        Some(names) => names.to_vec(),
        None => reg.projects().map(|p| p.name().to_string()).collect(),
    };

    let opts = ClosureOptions {
        include_libs,
        include_self: true,
        include_processors,
    };
    let mut result = Vec::new();
    let mut placed = BTreeSet::new();
    for root in &roots {
        let mut stack = Vec::new();
        visit(reg, root, "build order request", opts, true, &mut result, &mut placed, &mut stack)?;
    }
    Ok(result)
}

#[allow(clippy::too_many_arguments)]
fn visit(
    reg: &Registry,
    name: &str,
    required_by: &str,
    opts: ClosureOptions,
    is_root: bool,
    result: &mut Vec<String>,
    placed: &mut BTreeSet<String>,
    stack: &mut Vec<String>,
) -> Result<()> {
    if reg.is_ignored(name) {
        return Err(GraphError::Ignored {
            name: name.to_string(),
            required_by: required_by.to_string(),
        }
        .into());
    }
    let entity = reg.dependency(name).ok_or_else(|| GraphError::NotFound {
        name: name.to_string(),
        required_by: required_by.to_string(),
    })?;
    if entity.is_library() && !opts.include_libs {
        return Ok(());
    }
    if placed.contains(name) {
        return Ok(());
    }
    if stack.iter().any(|s| s == name) {
        let start = stack.iter().position(|s| s == name).unwrap();
        let mut path: Vec<String> = stack[start..].to_vec();
        path.push(name.to_string());
        return Err(GraphError::Cycle { path }.into());
    }
    stack.push(name.to_string());

    // Processor edges come first so processors land earlier in the order.
    let mut children: Vec<String> = Vec::new();
    if let Some(project) = entity.as_project() {
        if opts.include_processors {
            let processors = project.annotation_processors(reg)?;
            children.extend(processors.iter().cloned());
        }
    }
    children.extend(entity.dep_names().iter().cloned());

    for child in &children {
        if child == name {
            return Err(GraphError::SelfDependency {
                name: name.to_string(),
            }
            .into());
        }
        visit(reg, child, name, opts, false, result, placed, stack)?;
    }

    stack.pop();
    if (!is_root || opts.include_self) && placed.insert(name.to_string()) {
        result.push(name.to_string());
    }
    Ok(())
}

/// The length of the longest dependency chain from `name` to any
/// transitive dependency.
pub fn max_dependency_distance(reg: &Registry, name: &str) -> Result<u32> {
    let distances = dependency_distances(reg, name)?;
    Ok(distances.values().copied().max().unwrap_or(0))
}

/// Of all entities reachable from `project_name`, exactly those at
/// distance 1: the direct, non-redundant dependency edges.
///
/// When the computed set equals the declared set the original declared
/// (ordered) list is returned unchanged, preserving formatting.
pub fn canonical_dependencies(reg: &Registry, project_name: &str) -> Result<Vec<String>> {
    let project = reg.project(project_name).ok_or_else(|| GraphError::NotFound {
        name: project_name.to_string(),
        required_by: "canonicalization request".to_string(),
    })?;

    let distances = dependency_distances(reg, project_name)?;
    let canonical: BTreeSet<String> = distances
        .iter()
        .filter(|(_, &d)| d == 1)
        .map(|(n, _)| n.clone())
        .collect();

    let declared: BTreeSet<String> = project.deps().iter().cloned().collect();
    if declared == canonical {
        Ok(project.deps().to_vec())
    } else {
        Ok(canonical.into_iter().collect())
    }
}

/// Distance-labeling traversal keeping the maximum distance seen per
/// reachable name. The reachable subgraph is checked for cycles first so
/// the relaxation cannot recurse forever on bad input.
fn dependency_distances(reg: &Registry, name: &str) -> Result<BTreeMap<String, u32>> {
    transitive_closure(
        reg,
        name,
        ClosureOptions {
            include_libs: true,
            include_self: false,
            include_processors: false,
        },
    )?;

    let mut distances = BTreeMap::new();
    relax(reg, name, 0, &mut distances);
    distances.remove(name);
    Ok(distances)
}

fn relax(reg: &Registry, name: &str, dist: u32, distances: &mut BTreeMap<String, u32>) {
    let better = match distances.get(name) {
        Some(&current) => current < dist,
        None => true,
    };
    if !better {
        return;
    }
    distances.insert(name.to_string(), dist);
    if let Some(project) = reg.project(name) {
        for dep in project.deps() {
            relax(reg, dep, dist + 1, distances);
        }
    }
}

/// Build a classpath string for `names` (all projects when `None`),
/// joined with the platform's path-list separator.
///
/// Projects contribute their output directories; libraries contribute
/// their resolved artifact paths. With `resolve` set, missing required
/// library artifacts are downloaded; without it, entries are emitted even
/// when absent.
pub fn classpath(
    reg: &Registry,
    names: Option<&[String]>,
    resolve: bool,
    include_self: bool,
) -> Result<String> {
    let order = match names {
        None => sorted_build_order(reg, None, true, false)?,
        Some(names) => {
            let opts = ClosureOptions {
                include_libs: true,
                include_self,
                include_processors: false,
            };
            let mut result = Vec::new();
            let mut placed = BTreeSet::new();
            for name in names {
                let mut stack = Vec::new();
                visit(reg, name, "classpath request", opts, true, &mut result, &mut placed, &mut stack)?;
            }
            result
        }
    };

    let mut entries: Vec<std::path::PathBuf> = Vec::new();
    for name in &order {
        match reg.dependency(name) {
            Some(entity) => {
                if let Some(project) = entity.as_project() {
                    if let Some(out) = project.output_dir() {
                        entries.push(out);
                    }
                } else if let Some(library) = entity.as_library() {
                    let suite_dir = reg.suite_dir(library.suite());
                    let path = library.path(&suite_dir, resolve)?;
                    if path.exists() || !resolve {
                        entries.push(path);
                    }
                }
            }
            None => unreachable!("closure only yields registered entities"),
        }
    }

    let joined = std::env::join_paths(entries)
        .map_err(|e| anyhow::anyhow!("invalid classpath entry: {}", e))?;
    Ok(joined.to_string_lossy().into_owned())
}

/// Distributions ordered so that any distribution a later one depends on
/// is packaged first.
pub fn sorted_distributions(reg: &Registry) -> Result<Vec<&Distribution>> {
    let mut order: Vec<&Distribution> = Vec::new();
    let mut placed = BTreeSet::new();
    let mut stack: Vec<String> = Vec::new();

    fn visit_dist<'r>(
        reg: &'r Registry,
        name: &str,
        order: &mut Vec<&'r Distribution>,
        placed: &mut BTreeSet<String>,
        stack: &mut Vec<String>,
    ) -> Result<()> {
        if placed.contains(name) {
            return Ok(());
        }
        if stack.iter().any(|s| s == name) {
            let mut path = stack.clone();
            path.push(name.to_string());
            return Err(GraphError::Cycle { path }.into());
        }
        let dist = match reg.distribution(name) {
            Some(d) => d,
            None => {
                return Err(GraphError::NotFound {
                    name: name.to_string(),
                    required_by: stack.last().cloned().unwrap_or_else(|| "archive request".into()),
                }
                .into())
            }
        };
        stack.push(name.to_string());
        for dep in dist.dist_deps() {
            visit_dist(reg, dep, order, placed, stack)?;
        }
        stack.pop();
        placed.insert(name.to_string());
        order.push(dist);
        Ok(())
    }

    let names: Vec<String> = reg.distributions().map(|d| d.name().to_string()).collect();
    for name in &names {
        visit_dist(reg, name, &mut order, &mut placed, &mut stack)?;
    }
    Ok(order)
}

/// Graphviz/DOT rendering of the project/library dependency graph.
pub fn to_dot(reg: &Registry) -> String {
    let (graph, _) = to_petgraph(reg);
    format!("{:?}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
}

/// Project the registry into a petgraph digraph (dependent -> dependency
/// edges), used for DOT export.
pub fn to_petgraph(reg: &Registry) -> (DiGraph<String, ()>, HashMap<String, NodeIndex>) {
    let mut graph = DiGraph::new();
    let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

    for project in reg.projects() {
        let idx = graph.add_node(project.name().to_string());
        nodes.insert(project.name().to_string(), idx);
    }
    for library in reg.libraries() {
        let idx = graph.add_node(library.name().to_string());
        nodes.insert(library.name().to_string(), idx);
    }
    for project in reg.projects() {
        let from = nodes[project.name()];
        for dep in project.deps() {
            if let Some(&to) = nodes.get(dep.as_str()) {
                graph.add_edge(from, to, ());
            }
        }
    }
    for library in reg.libraries() {
        let from = nodes[library.name()];
        for dep in library.deps() {
            if let Some(&to) = nodes.get(dep.as_str()) {
                graph.add_edge(from, to, ());
            }
        }
    }
    (graph, nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Library, Project};
    use std::path::PathBuf;

    fn project(reg: &mut Registry, name: &str, deps: &[&str]) {
        reg.add_project(Project::new(
            "demo",
            name,
            PathBuf::from(format!("/tree/{}", name)),
            vec!["src".into()],
            deps.iter().map(|d| d.to_string()).collect(),
            Some("1.8".parse().unwrap()),
            false,
        ))
        .unwrap();
    }

    fn library(reg: &mut Registry, name: &str) {
        reg.add_library(
            Library::new(
                "demo",
                name,
                format!("lib/{}.jar", name.to_lowercase()),
                false,
                vec![],
                None,
                None,
                vec![],
                None,
                vec![],
            )
            .unwrap(),
        )
        .unwrap();
    }

    /// Small fixture: library A, project P depending on A, project Q
    /// depending on P.
    fn example_registry() -> Registry {
        let mut reg = Registry::new();
        library(&mut reg, "A");
        project(&mut reg, "P", &["A"]);
        project(&mut reg, "Q", &["P"]);
        reg
    }

    #[test]
    fn test_closure_is_dependency_first() {
        let reg = example_registry();
        let order = transitive_closure(
            &reg,
            "Q",
            ClosureOptions {
                include_libs: true,
                include_self: true,
                include_processors: false,
            },
        )
        .unwrap();
        assert_eq!(order, vec!["A", "P", "Q"]);
    }

    #[test]
    fn test_closure_excludes_libraries_by_default() {
        let reg = example_registry();
        let order = transitive_closure(
            &reg,
            "Q",
            ClosureOptions {
                include_libs: false,
                include_self: true,
                include_processors: false,
            },
        )
        .unwrap();
        assert_eq!(order, vec!["P", "Q"]);
    }

    #[test]
    fn test_closure_without_self() {
        let reg = example_registry();
        let order = transitive_closure(
            &reg,
            "Q",
            ClosureOptions {
                include_libs: false,
                include_self: false,
                include_processors: false,
            },
        )
        .unwrap();
        assert_eq!(order, vec!["P"]);
    }

    #[test]
    fn test_topological_validity_with_diamond() {
        let mut reg = Registry::new();
        project(&mut reg, "base", &[]);
        project(&mut reg, "left", &["base"]);
        project(&mut reg, "right", &["base"]);
        project(&mut reg, "top", &["left", "right"]);

        let order = sorted_build_order(&reg, Some(&["top".to_string()]), false, false).unwrap();
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("base") < pos("left"));
        assert!(pos("base") < pos("right"));
        assert!(pos("left") < pos("top"));
        assert!(pos("right") < pos("top"));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn test_self_dependency_is_fatal() {
        let mut reg = Registry::new();
        project(&mut reg, "X", &["X"]);

        let err = transitive_closure(&reg, "X", ClosureOptions::default()).unwrap_err();
        assert!(err.to_string().contains("depends on itself"));
    }

    #[test]
    fn test_cycle_is_reported_with_path() {
        let mut reg = Registry::new();
        project(&mut reg, "a", &["b"]);
        project(&mut reg, "b", &["c"]);
        project(&mut reg, "c", &["a"]);

        let err = transitive_closure(&reg, "a", ClosureOptions::default()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("circular dependency"));
        assert!(msg.contains("a -> b -> c -> a"));
    }

    #[test]
    fn test_unknown_dependency_names_dependent() {
        let mut reg = Registry::new();
        project(&mut reg, "p", &["missing"]);

        let err = transitive_closure(&reg, "p", ClosureOptions::default()).unwrap_err();
        assert!(err.to_string().contains("dependency not found: missing"));
        assert!(err.to_string().contains("required by p"));
    }

    #[test]
    fn test_ignored_dependency_is_fatal() {
        let mut reg = Registry::new();
        project(&mut reg, "p", &["ghost"]);
        project(&mut reg, "ghost", &[]);
        reg.set_ignored(["ghost".to_string()]);

        let err = transitive_closure(&reg, "p", ClosureOptions::default()).unwrap_err();
        assert!(err.to_string().contains("is ignored"));
    }

    #[test]
    fn test_max_dependency_distance() {
        let reg = example_registry();
        assert_eq!(max_dependency_distance(&reg, "Q").unwrap(), 2);
        assert_eq!(max_dependency_distance(&reg, "P").unwrap(), 1);
        assert_eq!(max_dependency_distance(&reg, "A").unwrap(), 0);
    }

    #[test]
    fn test_canonical_deps_drop_redundant_edge() {
        // Q declares both P and A, but A is reachable through P.
        let mut reg = Registry::new();
        library(&mut reg, "A");
        project(&mut reg, "P", &["A"]);
        reg.add_project(Project::new(
            "demo",
            "Q",
            PathBuf::from("/tree/Q"),
            vec!["src".into()],
            vec!["P".into(), "A".into()],
            Some("1.8".parse().unwrap()),
            false,
        ))
        .unwrap();

        assert_eq!(canonical_dependencies(&reg, "Q").unwrap(), vec!["P"]);
    }

    #[test]
    fn test_canonical_deps_preserve_declared_order_when_equal() {
        let mut reg = Registry::new();
        project(&mut reg, "b", &[]);
        project(&mut reg, "a", &[]);
        project(&mut reg, "top", &["b", "a"]);

        // Already canonical: the declared (ordered) list comes back as-is.
        assert_eq!(canonical_dependencies(&reg, "top").unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn test_longest_path_wins_for_distance() {
        // top -> mid -> base and top -> base: base sits at distance 2.
        let mut reg = Registry::new();
        project(&mut reg, "base", &[]);
        project(&mut reg, "mid", &["base"]);
        project(&mut reg, "top", &["base", "mid"]);

        assert_eq!(max_dependency_distance(&reg, "top").unwrap(), 2);
        assert_eq!(canonical_dependencies(&reg, "top").unwrap(), vec!["mid"]);
    }

    #[test]
    fn test_processor_edges_come_first() {
        let mut reg = Registry::new();
        project(&mut reg, "proc", &[]);
        project(&mut reg, "dep", &[]);
        reg.add_project({
            let mut p = Project::new(
                "demo",
                "user",
                PathBuf::from("/tree/user"),
                vec!["src".into()],
                vec!["dep".into()],
                Some("1.8".parse().unwrap()),
                false,
            );
            p.set_declared_processors(vec!["proc".into()]);
            p
        })
        .unwrap();

        let order = transitive_closure(
            &reg,
            "user",
            ClosureOptions {
                include_libs: false,
                include_self: true,
                include_processors: true,
            },
        )
        .unwrap();
        assert_eq!(order, vec!["proc", "dep", "user"]);
    }

    #[test]
    fn test_build_order_no_duplicates_across_roots() {
        let mut reg = Registry::new();
        project(&mut reg, "base", &[]);
        project(&mut reg, "x", &["base"]);
        project(&mut reg, "y", &["base"]);

        let order =
            sorted_build_order(&reg, Some(&["x".to_string(), "y".to_string()]), false, false)
                .unwrap();
        assert_eq!(order, vec!["base", "x", "y"]);
    }

    #[test]
    fn test_sorted_distributions_respect_dist_deps() {
        use crate::core::Distribution;
        let mut reg = Registry::new();
        reg.add_distribution(Distribution::new(
            "demo",
            "APP",
            PathBuf::from("/out/app.jar"),
            None,
            vec![],
            vec![],
            vec!["CORE".into()],
        ))
        .unwrap();
        reg.add_distribution(Distribution::new(
            "demo",
            "CORE",
            PathBuf::from("/out/core.jar"),
            None,
            vec![],
            vec![],
            vec![],
        ))
        .unwrap();

        let order: Vec<&str> = sorted_distributions(&reg)
            .unwrap()
            .iter()
            .map(|d| d.name())
            .collect();
        assert_eq!(order, vec!["CORE", "APP"]);
    }

    #[test]
    fn test_dot_export_mentions_edges() {
        let reg = example_registry();
        let dot = to_dot(&reg);
        assert!(dot.contains("digraph"));
        assert!(dot.contains("\"P\""));
        assert!(dot.contains("\"Q\""));
    }
}
