#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod graph;
pub mod hoist;
pub mod installer;
pub mod links;
pub mod manifest;
pub mod planner;
pub mod progress;
pub mod ranges;
pub mod version;

pub use bootstrap::Bootstrapper;
pub use config::{BootstrapOptions, Config};
pub use error::Error;
pub use graph::PackageGraph;
pub use hoist::HoistConfig;
pub use installer::{Installer, NpmConfig, NpmProcess};
pub use manifest::{load_workspace, Package, RootManifest};
pub use planner::{plan, codes as planner_codes, Diagnostic, FsProbe, InstallProbe, Plan};
pub use progress::{ProgressEvent, ProgressSink, RecordingSink, TracingSink};
pub use ranges::satisfies;
pub use version::VERSION;
