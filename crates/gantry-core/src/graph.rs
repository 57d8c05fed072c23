//! Repo-local package graph with topological batching.
//!
//! The graph is built once from discovered packages and is immutable
//! afterwards. An edge exists from package A to package B when A declares a
//! dependency on B's name and B's version satisfies the declared range;
//! mismatched versions are treated as external dependencies and produce no
//! edge. Batches are Kahn layers, leaves first, lexicographically sorted
//! within each batch so runs reproduce.

use crate::error::Error;
use crate::manifest::Package;
use crate::ranges;
use std::collections::BTreeMap;

/// A directed graph over the repo-local packages, keyed by name.
#[derive(Debug, Clone)]
pub struct PackageGraph {
    packages: BTreeMap<String, Package>,
    batches: Vec<Vec<String>>,
}

impl PackageGraph {
    /// Build the graph and its topological batching.
    ///
    /// # Errors
    /// Returns `Error::DependencyCycle` when the local dependency edges
    /// contain a cycle.
    pub fn build(packages: Vec<Package>) -> Result<Self, Error> {
        let packages: BTreeMap<String, Package> = packages
            .into_iter()
            .map(|pkg| (pkg.name.clone(), pkg))
            .collect();
        let batches = compute_batches(&packages)?;

        Ok(Self { packages, batches })
    }

    /// Look up a package by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    /// Look up a package by name and optional range.
    ///
    /// Returns the package iff it exists and either no range was given or
    /// the package's version satisfies it. An unparsable range never
    /// matches.
    #[must_use]
    pub fn find(&self, name: &str, range: Option<&str>) -> Option<&Package> {
        let pkg = self.packages.get(name)?;
        match range {
            None => Some(pkg),
            Some(range) => {
                matches!(ranges::satisfies(&pkg.version, range), Ok(true)).then_some(pkg)
            }
        }
    }

    /// Whether a package exists at a satisfying version.
    #[must_use]
    pub fn has(&self, name: &str, range: Option<&str>) -> bool {
        self.find(name, range).is_some()
    }

    /// Number of packages in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the graph is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// All packages, sorted by name.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    /// The precomputed topological batching: each batch is a set of
    /// packages with no dependency edges among them, and later batches
    /// depend only on earlier ones.
    #[must_use]
    pub fn topological_batches(&self) -> &[Vec<String>] {
        &self.batches
    }
}

/// Kahn-style layering over the local dependency edges.
fn compute_batches(packages: &BTreeMap<String, Package>) -> Result<Vec<Vec<String>>, Error> {
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (name, pkg) in packages {
        in_degree.entry(name.as_str()).or_insert(0);
        for (dep, range) in &pkg.dependencies {
            if dep == name {
                continue;
            }
            let Some(local) = packages.get(dep) else {
                continue;
            };
            if matches!(ranges::satisfies(&local.version, range), Ok(true)) {
                *in_degree.entry(name.as_str()).or_insert(0) += 1;
                dependents.entry(dep.as_str()).or_default().push(name.as_str());
            }
        }
    }

    let mut batches = Vec::new();

    while !in_degree.is_empty() {
        // BTreeMap iteration keeps each batch lexicographically sorted.
        let current: Vec<&str> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&name, _)| name)
            .collect();

        if current.is_empty() {
            let names: Vec<String> = in_degree.keys().map(|&n| n.to_string()).collect();
            return Err(Error::DependencyCycle { names });
        }

        for &name in &current {
            in_degree.remove(name);
            if let Some(deps) = dependents.get(name) {
                for &dependent in deps {
                    if let Some(deg) = in_degree.get_mut(dependent) {
                        *deg -= 1;
                    }
                }
            }
        }

        batches.push(current.iter().map(|&n| n.to_string()).collect());
    }

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn pkg(name: &str, version: &str, deps: &[(&str, &str)]) -> Package {
        let mut pkg = Package::new(name, version, PathBuf::from(format!("/repo/packages/{name}")));
        for (dep, range) in deps {
            pkg.dependencies
                .insert((*dep).to_string(), (*range).to_string());
        }
        pkg
    }

    #[test]
    fn test_get_and_find() {
        let graph = PackageGraph::build(vec![pkg("core", "1.2.3", &[])]).unwrap();

        assert!(graph.get("core").is_some());
        assert!(graph.get("missing").is_none());
        assert!(graph.find("core", None).is_some());
        assert!(graph.find("core", Some("^1.0.0")).is_some());
        assert!(graph.find("core", Some("^2.0.0")).is_none());
        assert!(graph.has("core", Some("~1.2.0")));
    }

    #[test]
    fn test_find_with_invalid_range_never_matches() {
        let graph = PackageGraph::build(vec![pkg("core", "1.2.3", &[])]).unwrap();
        assert!(graph.find("core", Some("not a range")).is_none());
    }

    #[test]
    fn test_batches_leaves_first() {
        let graph = PackageGraph::build(vec![
            pkg("app", "1.0.0", &[("lib", "^1.0.0")]),
            pkg("lib", "1.0.0", &[("core", "^1.0.0")]),
            pkg("core", "1.0.0", &[]),
        ])
        .unwrap();

        let batches = graph.topological_batches();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], vec!["core"]);
        assert_eq!(batches[1], vec!["lib"]);
        assert_eq!(batches[2], vec!["app"]);
    }

    #[test]
    fn test_batches_sorted_within_batch() {
        let graph = PackageGraph::build(vec![
            pkg("zebra", "1.0.0", &[]),
            pkg("alpha", "1.0.0", &[]),
            pkg("mid", "1.0.0", &[("alpha", "^1.0.0"), ("zebra", "^1.0.0")]),
        ])
        .unwrap();

        let batches = graph.topological_batches();
        assert_eq!(batches[0], vec!["alpha", "zebra"]);
        assert_eq!(batches[1], vec!["mid"]);
    }

    #[test]
    fn test_batches_cover_whole_graph() {
        let graph = PackageGraph::build(vec![
            pkg("a", "1.0.0", &[("b", "^1.0.0")]),
            pkg("b", "1.0.0", &[]),
            pkg("c", "1.0.0", &[]),
        ])
        .unwrap();

        let total: usize = graph.topological_batches().iter().map(Vec::len).sum();
        assert_eq!(total, graph.len());
    }

    #[test]
    fn test_version_mismatch_makes_no_edge() {
        // app wants lib@^2 but the local lib is 1.0.0, so there is no
        // local edge and both land in the first batch.
        let graph = PackageGraph::build(vec![
            pkg("app", "1.0.0", &[("lib", "^2.0.0")]),
            pkg("lib", "1.0.0", &[]),
        ])
        .unwrap();

        let batches = graph.topological_batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], vec!["app", "lib"]);
    }

    #[test]
    fn test_cycle_is_fatal() {
        let result = PackageGraph::build(vec![
            pkg("a", "1.0.0", &[("b", "^1.0.0")]),
            pkg("b", "1.0.0", &[("a", "^1.0.0")]),
        ]);

        match result {
            Err(Error::DependencyCycle { names }) => {
                assert_eq!(names, vec!["a", "b"]);
            }
            other => panic!("expected DependencyCycle, got {other:?}"),
        }
    }

    #[test]
    fn test_batches_deterministic() {
        let build = || {
            PackageGraph::build(vec![
                pkg("d", "1.0.0", &[("b", "^1.0.0"), ("c", "^1.0.0")]),
                pkg("c", "1.0.0", &[("a", "^1.0.0")]),
                pkg("b", "1.0.0", &[("a", "^1.0.0")]),
                pkg("a", "1.0.0", &[]),
            ])
            .unwrap()
        };

        let first = build().topological_batches().to_vec();
        let second = build().topological_batches().to_vec();
        assert_eq!(first, second);
    }
}
