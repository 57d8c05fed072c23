//! `gantry bootstrap` command implementation.
//!
//! Discovers the workspace, plans dependency placement, and either prints
//! the plan (`--dry-run`) or executes it.

use gantry_core::config::{default_concurrency, BootstrapOptions};
use gantry_core::installer::{NpmConfig, NpmProcess};
use gantry_core::manifest::{self, find_workspace_root, RootManifest};
use gantry_core::planner::{self, FsProbe};
use gantry_core::progress::TracingSink;
use gantry_core::{Bootstrapper, Config, HoistConfig, PackageGraph};
use miette::{IntoDiagnostic, Result};
use tracing::debug;

/// Parsed arguments for the bootstrap command.
pub struct BootstrapArgs {
    pub hoist: Option<Vec<String>>,
    pub nohoist: Vec<String>,
    pub npm_client: String,
    pub registry: Option<String>,
    pub mutex: Option<String>,
    pub use_workspaces: bool,
    pub concurrency: Option<usize>,
    pub scope: Option<String>,
    pub dry_run: bool,
}

pub fn run(config: &Config, args: BootstrapArgs) -> Result<()> {
    let root_dir = find_workspace_root(&config.cwd).unwrap_or_else(|| config.cwd.clone());
    debug!(root = %root_dir.display(), "discovering workspace");

    let (root, mut packages) = manifest::load_workspace(&root_dir).into_diagnostic()?;

    if let Some(scope) = &args.scope {
        packages = manifest::filter_scope(packages, scope).into_diagnostic()?;
    }

    if packages.is_empty() {
        if config.json_logs {
            println!(
                "{}",
                serde_json::json!({ "ok": true, "packages": 0, "bootstrapped": false })
            );
        } else {
            println!("No packages found to bootstrap.");
            println!("hint: add a \"workspaces\" field to package.json");
        }
        return Ok(());
    }

    let graph = PackageGraph::build(packages).into_diagnostic()?;

    let options = BootstrapOptions {
        hoist: args.hoist,
        nohoist: args.nohoist,
        npm_client: args.npm_client,
        registry: args.registry,
        mutex: args.mutex,
        use_workspaces: args.use_workspaces,
        concurrency: args.concurrency.unwrap_or_else(default_concurrency).max(1),
    };

    if args.dry_run {
        return print_plan(config, &graph, &root, &options);
    }

    let npm_config = NpmConfig::from_options(&options).into_diagnostic()?;
    let installer = NpmProcess::new(npm_config);
    let probe = FsProbe;
    let sink = TracingSink;

    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    runtime
        .block_on(Bootstrapper::new(&graph, &root, &options, &installer, &probe, &sink).run())
        .into_diagnostic()?;

    if config.json_logs {
        println!(
            "{}",
            serde_json::json!({ "ok": true, "packages": graph.len(), "bootstrapped": true })
        );
    } else {
        println!("Bootstrapped {} package(s).", graph.len());
    }
    Ok(())
}

/// Compute and print the plan without executing it.
fn print_plan(
    config: &Config,
    graph: &PackageGraph,
    root: &RootManifest,
    options: &BootstrapOptions,
) -> Result<()> {
    let hoist = HoistConfig::from_options(options).into_diagnostic()?;
    let (plan, diagnostics) = planner::plan(graph, root, &hoist, &FsProbe);

    if config.json_logs {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "packages": graph.len(),
                "plan": plan,
                "warnings": diagnostics,
            })
        );
        return Ok(());
    }

    println!("Plan for {} package(s):", graph.len());

    if plan.root_installs.is_empty() {
        println!("  root installs: none");
    } else {
        println!("  root installs:");
        for install in &plan.root_installs {
            let state = if install.satisfied { "satisfied" } else { "missing" };
            println!(
                "    {} [{state}] ({} dependent(s))",
                install.spec,
                install.dependents.len()
            );
        }
    }

    if plan.leaves.is_empty() {
        println!("  leaf installs: none");
    } else {
        println!("  leaf installs:");
        for (requester, leaves) in &plan.leaves {
            for leaf in leaves {
                let state = if leaf.satisfied { "satisfied" } else { "missing" };
                println!("    {requester}: {} [{state}]", leaf.spec);
            }
        }
    }

    if !plan.prune.is_empty() {
        println!("  prune:");
        for prune in &plan.prune {
            println!("    {}: {}", prune.package, prune.dir.display());
        }
    }

    for diagnostic in &diagnostics {
        println!("warning {}: {}", diagnostic.code, diagnostic.message);
    }

    Ok(())
}
