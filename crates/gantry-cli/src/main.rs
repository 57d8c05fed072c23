#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod commands;
mod logging;

use clap::Parser;
use gantry_core::Config;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gantry")]
#[command(author, version, about = "Bootstrap npm-style monorepos", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// List workspace packages
    Workspaces,

    /// Link local packages together and install remaining dependencies
    Bootstrap {
        /// Hoist shared dependencies to the repository root, optionally
        /// restricted to names matching the given globs
        #[arg(long, num_args = 0.., value_name = "GLOB")]
        hoist: Option<Vec<String>>,

        /// Never hoist dependencies whose name matches the glob
        #[arg(long, value_name = "GLOB")]
        nohoist: Vec<String>,

        /// Package manager executable used for installs and scripts
        #[arg(long, default_value = "npm")]
        npm_client: String,

        /// Registry URL passed through to the installer
        #[arg(long, value_name = "URL")]
        registry: Option<String>,

        /// Installer coordination token (e.g. "network:42424")
        #[arg(long, value_name = "TOKEN")]
        mutex: Option<String>,

        /// Delegate all installation to a single root install
        #[arg(long)]
        use_workspaces: bool,

        /// Maximum parallel installs and scripts
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,

        /// Restrict to packages whose name matches the glob
        #[arg(long, value_name = "GLOB")]
        scope: Option<String>,

        /// Compute and print the plan without executing it
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose, cli.json);

    let cwd = match cli.cwd {
        Some(cwd) => cwd,
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    let config = Config::new(cwd)
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    match cli.command {
        Commands::Version => commands::version::run(),
        Commands::Workspaces => commands::workspaces::run(&config),
        Commands::Bootstrap {
            hoist,
            nohoist,
            npm_client,
            registry,
            mutex,
            use_workspaces,
            concurrency,
            scope,
            dry_run,
        } => commands::bootstrap::run(
            &config,
            commands::bootstrap::BootstrapArgs {
                hoist,
                nohoist,
                npm_client,
                registry,
                mutex,
                use_workspaces,
                concurrency,
                scope,
                dry_run,
            },
        ),
    }
}
