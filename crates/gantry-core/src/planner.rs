//! Dependency placement planning.
//!
//! Aggregates version requirements across the repository and decides, for
//! every external dependency, whether it is installed once at the
//! repository root (hoisted) or inside each requesting package (leaf).
//! The planner is pure: the only I/O happens through the injected
//! [`InstallProbe`], and for fixed inputs the plan and diagnostic sequence
//! are identical across runs.

use crate::graph::PackageGraph;
use crate::hoist::HoistConfig;
use crate::links;
use crate::manifest::RootManifest;
use crate::ranges;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Warning codes emitted by the planner.
pub mod codes {
    /// The root manifest's range disagrees with the most common range for
    /// a hoisted dependency.
    pub const EHOIST_ROOT_VERSION: &str = "EHOIST_ROOT_VERSION";
    /// A package requires a different range than the hoisted one and gets
    /// a leaf install instead.
    pub const EHOIST_PKG_VERSION: &str = "EHOIST_PKG_VERSION";
}

/// Probe for dependencies already materialized on disk.
///
/// `location` is the directory whose `node_modules` is inspected; `name`
/// and `range` identify the dependency spec.
pub trait InstallProbe: Send + Sync {
    fn is_installed(&self, location: &Path, name: &str, range: &str) -> bool;
}

impl<F> InstallProbe for F
where
    F: Fn(&Path, &str, &str) -> bool + Send + Sync,
{
    fn is_installed(&self, location: &Path, name: &str, range: &str) -> bool {
        self(location, name, range)
    }
}

/// Production probe: reads the installed package's manifest and checks its
/// version against the requested range.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl InstallProbe for FsProbe {
    fn is_installed(&self, location: &Path, name: &str, range: &str) -> bool {
        let manifest =
            links::module_path(&location.join("node_modules"), name).join("package.json");
        let Ok(content) = fs::read_to_string(&manifest) else {
            return false;
        };
        let Ok(json) = serde_json::from_str::<Value>(&content) else {
            return false;
        };
        let Some(version) = json.get("version").and_then(Value::as_str) else {
            return false;
        };
        matches!(ranges::satisfies(version, range), Ok(true))
    }
}

/// An installation at the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootInstall {
    /// Dependency name.
    pub name: String,
    /// Graph packages relying on the root copy (de-duplicated, sorted).
    pub dependents: Vec<String>,
    /// Installer spec, `name@range`.
    pub spec: String,
    /// Whether the root already held a satisfying copy at plan time.
    pub satisfied: bool,
}

/// An installation inside a single requesting package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeafInstall {
    /// Installer spec, `name@range`.
    pub spec: String,
    /// Whether a directory for the dependency was present at plan time.
    pub satisfied: bool,
}

/// Binary-link work for one hoisted dependency: after the root install,
/// its declared binaries are linked into each dependent's `.bin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinLink {
    pub name: String,
    pub dependents: Vec<String>,
}

/// A directory that would shadow a hoisted dependency and must be removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prune {
    pub package: String,
    pub dir: PathBuf,
}

/// The computed placement plan. Built once; read-only during execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    pub root_installs: Vec<RootInstall>,
    pub leaves: BTreeMap<String, Vec<LeafInstall>>,
    pub bin_links: Vec<BinLink>,
    pub prune: Vec<Prune>,
}

impl Plan {
    /// All root specs, in plan order.
    #[must_use]
    pub fn root_specs(&self) -> Vec<String> {
        self.root_installs.iter().map(|r| r.spec.clone()).collect()
    }

    /// Whether every root install was already satisfied at plan time.
    #[must_use]
    pub fn root_satisfied(&self) -> bool {
        self.root_installs.iter().all(|r| r.satisfied)
    }

    /// Whether the plan contains no work at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root_installs.is_empty() && self.leaves.is_empty()
    }
}

/// A planner warning. Warnings never halt execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub message: String,
}

/// Per-range tally of requesters for one dependency name.
#[derive(Debug, Default)]
struct RangeEntry {
    count: usize,
    requesters: Vec<String>,
}

/// Compute the placement plan for the graph against the root manifest.
///
/// Hoisting decisions follow `hoist`; `probe` answers whether the root
/// already holds a satisfying copy of a spec.
pub fn plan(
    graph: &PackageGraph,
    root: &RootManifest,
    hoist: &HoistConfig,
    probe: &dyn InstallProbe,
) -> (Plan, Vec<Diagnostic>) {
    // name -> range -> tally. Root ranges are seeded at count 0 so the
    // root's preference is remembered without inflating the most-common
    // tally on its own.
    let mut aggregate: BTreeMap<String, BTreeMap<String, RangeEntry>> = BTreeMap::new();

    for (name, range) in &root.dependencies {
        aggregate
            .entry(name.clone())
            .or_default()
            .entry(range.clone())
            .or_default();
    }

    for pkg in graph.packages() {
        for (name, range) in &pkg.dependencies {
            if graph.has(name, Some(range.as_str())) {
                // A satisfying sibling exists; the symlink phase owns it.
                continue;
            }
            let entry = aggregate
                .entry(name.clone())
                .or_default()
                .entry(range.clone())
                .or_default();
            entry.count += 1;
            entry.requesters.push(pkg.name.clone());
        }
    }

    let mut plan = Plan::default();
    let mut diagnostics = Vec::new();

    for (name, entries) in &aggregate {
        if hoist.is_hoistable(name) {
            hoist_dependency(name, entries, graph, root, probe, &mut plan, &mut diagnostics);
        } else {
            for (range, entry) in entries {
                for requester in &entry.requesters {
                    push_leaf(&mut plan, graph, requester, name, range);
                }
            }
        }
    }

    (plan, diagnostics)
}

/// Place one hoistable dependency: a root install for the winning range,
/// leaf installs and warnings for everything else.
fn hoist_dependency(
    name: &str,
    entries: &BTreeMap<String, RangeEntry>,
    graph: &PackageGraph,
    root: &RootManifest,
    probe: &dyn InstallProbe,
    plan: &mut Plan,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // Highest requester count wins; ties break to the lexicographically
    // smallest range (BTreeMap order makes first-wins exactly that).
    let mut common_version = "";
    let mut common_count = 0usize;
    let mut seen_any = false;
    for (range, entry) in entries {
        if !seen_any || entry.count > common_count {
            common_version = range.as_str();
            common_count = entry.count;
            seen_any = true;
        }
    }

    let root_version = root
        .dependencies
        .get(name)
        .map_or(common_version, String::as_str);

    if root_version != common_version {
        diagnostics.push(Diagnostic {
            code: codes::EHOIST_ROOT_VERSION,
            message: format!(
                "the repository root depends on {name}@{root_version}, \
                 which differs from the more common {name}@{common_version}"
            ),
        });
    }

    let dependents: Vec<String> = entries
        .get(root_version)
        .map(|entry| {
            entry
                .requesters
                .iter()
                .filter(|r| graph.get(r).is_some())
                .cloned()
                .collect::<BTreeSet<String>>()
                .into_iter()
                .collect()
        })
        .unwrap_or_default();

    for (range, entry) in entries {
        if range == root_version {
            continue;
        }
        for requester in &entry.requesters {
            diagnostics.push(Diagnostic {
                code: codes::EHOIST_PKG_VERSION,
                message: format!(
                    "'{requester}' depends on {name}@{range}, \
                     which differs from the hoisted {name}@{root_version}; \
                     it will be installed inside the package"
                ),
            });
            push_leaf(plan, graph, requester, name, range);
        }
    }

    let spec = format!("{name}@{root_version}");
    let satisfied = probe.is_installed(&root.location, name, root_version);

    if !dependents.is_empty() {
        plan.bin_links.push(BinLink {
            name: name.to_string(),
            dependents: dependents.clone(),
        });
        for dependent in &dependents {
            if let Some(pkg) = graph.get(dependent) {
                if pkg.node_modules != root.node_modules {
                    plan.prune.push(Prune {
                        package: dependent.clone(),
                        dir: links::module_path(&pkg.node_modules, name),
                    });
                }
            }
        }
    }

    plan.root_installs.push(RootInstall {
        name: name.to_string(),
        dependents,
        spec,
        satisfied,
    });
}

fn push_leaf(plan: &mut Plan, graph: &PackageGraph, requester: &str, name: &str, range: &str) {
    let satisfied = graph.get(requester).is_some_and(|pkg| pkg.has_installed(name));
    plan.leaves
        .entry(requester.to_string())
        .or_default()
        .push(LeafInstall {
            spec: format!("{name}@{range}"),
            satisfied,
        });
}
