//! `gantry workspaces` command implementation.
//!
//! Lists the workspace packages discovered from the root manifest.

use gantry_core::manifest::{find_workspace_root, load_workspace};
use gantry_core::Config;
use miette::{IntoDiagnostic, Result};

pub fn run(config: &Config) -> Result<()> {
    let root = find_workspace_root(&config.cwd).unwrap_or_else(|| config.cwd.clone());
    let (_, packages) = load_workspace(&root).into_diagnostic()?;

    if config.json_logs {
        let pkg_list: Vec<_> = packages
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "version": p.version,
                    "path": p.location.to_string_lossy(),
                })
            })
            .collect();

        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "workspaces": !packages.is_empty(),
                "root": root.to_string_lossy(),
                "packages": pkg_list,
            })
        );
        return Ok(());
    }

    if packages.is_empty() {
        println!("No workspaces configured.");
        println!("hint: add a \"workspaces\" field to package.json");
        return Ok(());
    }

    println!("Workspace root: {}", root.display());
    println!();
    println!("Packages ({}):", packages.len());
    for pkg in &packages {
        println!("  {} @ {}", pkg.name, pkg.version);
        println!("    {}", pkg.location.display());
    }

    Ok(())
}
