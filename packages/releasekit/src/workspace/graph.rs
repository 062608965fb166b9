//! Dependency graph construction and level assignment.
//!
//! Levels are topological generations: level 0 holds packages with no
//! internal dependencies, and every package in level k has all of its
//! internal dependencies in levels below k. Packages inside one level can
//! therefore be published concurrently.

use crate::error::GraphError;
use crate::workspace::{normalize_name, Package};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Immutable dependency graph over a workspace snapshot
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Directed graph where edges point from dependency to dependent
    graph: DiGraph<String, ()>,
    /// Mapping from package names to graph node indices
    node_map: HashMap<String, NodeIndex>,
    /// Ordered levels of package names
    levels: Vec<BTreeSet<String>>,
    /// Level index per package
    level_of: HashMap<String, usize>,
}

/// Build a dependency graph from a package snapshot
///
/// Fails on duplicate names, references to packages outside the snapshot and
/// cycles. Deterministic: the same input always yields the same levels.
pub fn build_graph(packages: &[Package]) -> Result<DependencyGraph, GraphError> {
    let mut graph = DiGraph::new();
    let mut node_map = HashMap::with_capacity(packages.len());
    let mut deps: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for package in packages {
        let name = package.key();
        if node_map.contains_key(&name) {
            return Err(GraphError::DuplicatePackage { name });
        }
        let index = graph.add_node(name.clone());
        node_map.insert(name.clone(), index);
        deps.insert(
            name,
            package.internal_deps.iter().map(|d| normalize_name(d)).collect(),
        );
    }

    for (package, dependencies) in &deps {
        let dependent_index = node_map[package];
        for dependency in dependencies {
            let dependency_index =
                *node_map
                    .get(dependency)
                    .ok_or_else(|| GraphError::UnknownDependency {
                        package: package.clone(),
                        dependency: dependency.clone(),
                    })?;
            graph.add_edge(dependency_index, dependent_index, ());
        }
    }

    let levels = assign_levels(&deps)?;
    let level_of = levels
        .iter()
        .enumerate()
        .flat_map(|(level, names)| names.iter().map(move |name| (name.clone(), level)))
        .collect();

    Ok(DependencyGraph {
        graph,
        node_map,
        levels,
        level_of,
    })
}

/// Iteratively peel off packages whose dependencies are all levelled
fn assign_levels(
    deps: &BTreeMap<String, BTreeSet<String>>,
) -> Result<Vec<BTreeSet<String>>, GraphError> {
    let mut assigned: HashMap<&str, usize> = HashMap::with_capacity(deps.len());
    let mut levels: Vec<BTreeSet<String>> = Vec::new();

    while assigned.len() < deps.len() {
        let current: BTreeSet<String> = deps
            .iter()
            .filter(|(name, _)| !assigned.contains_key(name.as_str()))
            .filter(|(_, dependencies)| {
                dependencies
                    .iter()
                    .all(|dep| assigned.contains_key(dep.as_str()))
            })
            .map(|(name, _)| name.clone())
            .collect();

        if current.is_empty() {
            let packages = deps
                .keys()
                .filter(|name| !assigned.contains_key(name.as_str()))
                .cloned()
                .collect();
            return Err(GraphError::CircularDependency { packages });
        }

        let level = levels.len();
        for name in &current {
            if let Some((key, _)) = deps.get_key_value(name) {
                assigned.insert(key.as_str(), level);
            }
        }
        levels.push(current);
    }

    Ok(levels)
}

impl DependencyGraph {
    /// Levels in ascending order
    pub fn levels(&self) -> &[BTreeSet<String>] {
        &self.levels
    }

    /// Level index of a package, if it is part of the graph
    pub fn level_of(&self, package_name: &str) -> Option<usize> {
        self.level_of.get(&normalize_name(package_name)).copied()
    }

    /// Whether the graph contains the package
    pub fn contains(&self, package_name: &str) -> bool {
        self.node_map.contains_key(&normalize_name(package_name))
    }

    /// Number of packages in the graph
    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    /// Whether the graph has no packages
    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }

    /// Packages that directly depend on the given package, sorted
    pub fn dependents(&self, package_name: &str) -> Vec<String> {
        self.neighbors(package_name, Direction::Outgoing)
    }

    /// Direct internal dependencies of the given package, sorted
    pub fn dependencies(&self, package_name: &str) -> Vec<String> {
        self.neighbors(package_name, Direction::Incoming)
    }

    fn neighbors(&self, package_name: &str, direction: Direction) -> Vec<String> {
        let Some(&index) = self.node_map.get(&normalize_name(package_name)) else {
            return Vec::new();
        };

        let mut names: Vec<String> = self
            .graph
            .neighbors_directed(index, direction)
            .map(|idx| self.graph[idx].clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pkg(name: &str, deps: &[&str]) -> Package {
        Package::new(name, "0.1.0", name).with_internal_deps(deps.iter().copied())
    }

    fn names(level: &BTreeSet<String>) -> Vec<&str> {
        level.iter().map(String::as_str).collect()
    }

    #[test]
    fn diamond_levels() {
        let graph = build_graph(&[
            pkg("d", &["b", "c"]),
            pkg("b", &["a"]),
            pkg("c", &["a"]),
            pkg("a", &[]),
        ])
        .expect("acyclic graph");

        let levels = graph.levels();
        assert_eq!(levels.len(), 3);
        assert_eq!(names(&levels[0]), vec!["a"]);
        assert_eq!(names(&levels[1]), vec!["b", "c"]);
        assert_eq!(names(&levels[2]), vec!["d"]);
        assert_eq!(graph.level_of("d"), Some(2));
    }

    #[test]
    fn level_is_longest_path_not_shortest() {
        // c depends on a directly and through b, so it must wait for b
        let graph = build_graph(&[pkg("a", &[]), pkg("b", &["a"]), pkg("c", &["a", "b"])])
            .expect("acyclic graph");

        assert_eq!(graph.level_of("c"), Some(2));
    }

    #[test]
    fn reverse_lookup() {
        let graph = build_graph(&[pkg("a", &[]), pkg("b", &["a"]), pkg("c", &["a"])])
            .expect("acyclic graph");

        assert_eq!(graph.dependents("a"), vec!["b", "c"]);
        assert_eq!(graph.dependencies("b"), vec!["a"]);
        assert!(graph.dependents("missing").is_empty());
    }

    #[test]
    fn unknown_dependency_is_fatal() {
        let err = build_graph(&[pkg("a", &["ghost"])]).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownDependency {
                package: "a".to_string(),
                dependency: "ghost".to_string(),
            }
        );
    }

    #[test]
    fn cycle_names_every_unlevelled_package() {
        let err = build_graph(&[
            pkg("root", &[]),
            pkg("x", &["root", "z"]),
            pkg("y", &["x"]),
            pkg("z", &["y"]),
        ])
        .unwrap_err();

        assert_eq!(
            err,
            GraphError::CircularDependency {
                packages: vec!["x".to_string(), "y".to_string(), "z".to_string()],
            }
        );
    }

    #[test]
    fn duplicate_after_normalization() {
        let err = build_graph(&[pkg("my_pkg", &[]), pkg("My-Pkg", &[])]).unwrap_err();
        assert_eq!(
            err,
            GraphError::DuplicatePackage {
                name: "my-pkg".to_string()
            }
        );
    }

    #[test]
    fn empty_workspace_has_no_levels() {
        let graph = build_graph(&[]).expect("empty graph");
        assert!(graph.levels().is_empty());
        assert!(graph.is_empty());
    }
}
