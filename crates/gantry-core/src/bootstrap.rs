//! Bootstrap orchestration.
//!
//! Executes a placement plan across ordered phases: lifecycle rounds run
//! in dependency order with a hard barrier between topological batches,
//! the install phase runs independent actions under one concurrency cap,
//! and sibling packages are symlinked in between. The first failure wins:
//! no new work starts after it, in-flight work completes and is
//! discarded, and later phases never begin.

use crate::config::BootstrapOptions;
use crate::error::Error;
use crate::graph::PackageGraph;
use crate::hoist::HoistConfig;
use crate::installer::Installer;
use crate::links;
use crate::manifest::RootManifest;
use crate::planner::{self, InstallProbe, LeafInstall, Plan};
use crate::progress::{ProgressEvent, ProgressSink};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};

const INSTALL_PHASE: &str = "install external dependencies";
const SYMLINK_PHASE: &str = "symlink siblings";

/// Lifecycle scripts run after the install phase, in order.
const POST_INSTALL_SCRIPTS: [&str; 3] = ["postinstall", "prepublish", "prepare"];

/// Drives a full bootstrap run over an immutable graph and plan.
pub struct Bootstrapper<'a> {
    graph: &'a PackageGraph,
    root: &'a RootManifest,
    options: &'a BootstrapOptions,
    installer: &'a dyn Installer,
    probe: &'a dyn InstallProbe,
    sink: &'a dyn ProgressSink,
}

impl<'a> Bootstrapper<'a> {
    #[must_use]
    pub fn new(
        graph: &'a PackageGraph,
        root: &'a RootManifest,
        options: &'a BootstrapOptions,
        installer: &'a dyn Installer,
        probe: &'a dyn InstallProbe,
        sink: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            graph,
            root,
            options,
            installer,
            probe,
            sink,
        }
    }

    /// Run the bootstrap to completion or first failure.
    pub async fn run(&self) -> Result<(), Error> {
        self.info(format!("bootstrapping {} packages", self.graph.len()));

        if self.options.use_workspaces {
            // The root package manager owns everything in workspaces
            // mode: one install, no lifecycle rounds, no symlinking.
            self.sink.emit(ProgressEvent::PhaseStarted {
                phase: INSTALL_PHASE,
            });
            self.installer
                .install_in_dir_from_manifest(&self.root.location)
                .await?;
            self.sink.emit(ProgressEvent::PhaseFinished {
                phase: INSTALL_PHASE,
            });
            return Ok(());
        }

        let hoist = HoistConfig::from_options(self.options)?;
        let (plan, diagnostics) = planner::plan(self.graph, self.root, &hoist, self.probe);
        for diagnostic in diagnostics {
            self.sink.emit(ProgressEvent::Warning {
                code: diagnostic.code,
                message: diagnostic.message,
            });
        }

        self.lifecycle("preinstall").await?;
        self.install_external(&plan, hoist.is_enabled()).await?;
        self.symlink_siblings()?;
        for script in POST_INSTALL_SCRIPTS {
            self.lifecycle(script).await?;
        }

        Ok(())
    }

    /// Run one lifecycle script in every package that declares it,
    /// batch by batch. A batch must finish entirely before the next
    /// starts; within a batch packages run concurrently up to the cap.
    async fn lifecycle(&self, script: &'static str) -> Result<(), Error> {
        let total = self
            .graph
            .packages()
            .filter(|pkg| pkg.has_script(script))
            .count();

        self.sink.emit(ProgressEvent::PhaseStarted { phase: script });
        self.sink.emit(ProgressEvent::WorkAdded {
            phase: script,
            count: total,
        });

        for batch in self.graph.topological_batches() {
            let cancelled = AtomicBool::new(false);
            let results: Vec<Result<(), Error>> = stream::iter(
                batch
                    .iter()
                    .filter_map(|name| self.graph.get(name))
                    .filter(|pkg| pkg.has_script(script))
                    .map(|pkg| {
                        let cancelled = &cancelled;
                        async move {
                            if cancelled.load(Ordering::SeqCst) {
                                return Ok(());
                            }
                            match self
                                .installer
                                .run_script_in_dir(&pkg.location, script, &pkg.name)
                                .await
                            {
                                Ok(()) => {
                                    self.sink.emit(ProgressEvent::WorkCompleted {
                                        phase: script,
                                        unit: pkg.name.clone(),
                                    });
                                    Ok(())
                                }
                                Err(err) => {
                                    cancelled.store(true, Ordering::SeqCst);
                                    Err(err)
                                }
                            }
                        }
                    }),
            )
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

            if let Some(err) = results.into_iter().find_map(Result::err) {
                return Err(err);
            }
        }

        self.sink.emit(ProgressEvent::PhaseFinished { phase: script });
        Ok(())
    }

    /// Run the install phase: the root install, the prune pass, and one
    /// leaf install per requester with unsatisfied work. Actions are
    /// independent by construction and share the concurrency cap with no
    /// barrier between them.
    async fn install_external(&self, plan: &Plan, global_style: bool) -> Result<(), Error> {
        self.sink.emit(ProgressEvent::PhaseStarted {
            phase: INSTALL_PHASE,
        });

        let mut actions: Vec<(String, BoxFuture<'_, Result<(), Error>>)> = Vec::new();

        if !plan.root_installs.is_empty() {
            actions.push(("root".to_string(), Box::pin(self.root_install_action(plan))));
            if !plan.prune.is_empty() {
                actions.push((
                    "prune".to_string(),
                    Box::pin(async move { self.prune_action(plan) }),
                ));
            }
        }

        for (requester, leaves) in &plan.leaves {
            if leaves.iter().any(|leaf| !leaf.satisfied) {
                actions.push((
                    requester.clone(),
                    Box::pin(self.leaf_install_action(requester, leaves, global_style)),
                ));
            }
        }

        self.sink.emit(ProgressEvent::WorkAdded {
            phase: INSTALL_PHASE,
            count: actions.len(),
        });

        let cancelled = AtomicBool::new(false);
        let results: Vec<Result<(), Error>> =
            stream::iter(actions.into_iter().map(|(unit, action)| {
                let cancelled = &cancelled;
                async move {
                    if cancelled.load(Ordering::SeqCst) {
                        return Ok(());
                    }
                    match action.await {
                        Ok(()) => {
                            self.sink.emit(ProgressEvent::WorkCompleted {
                                phase: INSTALL_PHASE,
                                unit,
                            });
                            Ok(())
                        }
                        Err(err) => {
                            cancelled.store(true, Ordering::SeqCst);
                            Err(err)
                        }
                    }
                }
            }))
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        if let Some(err) = results.into_iter().find_map(Result::err) {
            return Err(err);
        }

        self.sink.emit(ProgressEvent::PhaseFinished {
            phase: INSTALL_PHASE,
        });
        Ok(())
    }

    /// Install every hoisted spec at the root, then link hoisted binaries
    /// into each dependent's `.bin`.
    async fn root_install_action(&self, plan: &Plan) -> Result<(), Error> {
        self.info("installing hoisted dependencies into root".to_string());

        // Installer clients are not reliably incremental: when anything
        // is missing, reinstall the full hoisted set together so
        // resolution stays consistent. When everything is satisfied the
        // client still runs once with no specs for its post-install
        // linking side effects.
        let specs = if plan.root_satisfied() {
            Vec::new()
        } else {
            plan.root_specs()
        };
        self.installer
            .install_in_dir(&self.root.location, &specs, false)
            .await?;

        for link in &plan.bin_links {
            let source = links::module_path(&self.root.node_modules, &link.name);
            for dependent in &link.dependents {
                if let Some(pkg) = self.graph.get(dependent) {
                    links::link_bins(&source, &link.name, &pkg.bin_dir())?;
                }
            }
        }

        self.info("finished installing in root".to_string());
        Ok(())
    }

    /// Remove directories that would shadow hoisted dependencies. A
    /// directory that cannot be removed is a hard failure, since the
    /// shadow would break resolution of the root copy.
    fn prune_action(&self, plan: &Plan) -> Result<(), Error> {
        self.info("pruning hoisted dependencies".to_string());
        for prune in &plan.prune {
            links::prune_dir(&prune.dir)?;
        }
        self.info("finished pruning".to_string());
        Ok(())
    }

    /// Install the full leaf spec list for one requester in its own
    /// directory.
    async fn leaf_install_action(
        &self,
        requester: &str,
        leaves: &[LeafInstall],
        global_style: bool,
    ) -> Result<(), Error> {
        let Some(pkg) = self.graph.get(requester) else {
            return Ok(());
        };
        let specs: Vec<String> = leaves.iter().map(|leaf| leaf.spec.clone()).collect();
        self.installer
            .install_in_dir(&pkg.location, &specs, global_style)
            .await
    }

    /// Link every satisfying sibling dependency into its dependent's
    /// local-module directory, along with the sibling's binaries.
    fn symlink_siblings(&self) -> Result<(), Error> {
        self.sink.emit(ProgressEvent::PhaseStarted {
            phase: SYMLINK_PHASE,
        });
        self.sink.emit(ProgressEvent::WorkAdded {
            phase: SYMLINK_PHASE,
            count: self.graph.len(),
        });

        for pkg in self.graph.packages() {
            for (name, range) in &pkg.dependencies {
                let Some(dep) = self.graph.find(name, Some(range.as_str())) else {
                    continue;
                };
                if dep.name == pkg.name {
                    continue;
                }
                links::symlink_sibling(&pkg.node_modules, name, &dep.location)?;
                links::link_bins(&dep.location, name, &pkg.bin_dir())?;
            }
            self.sink.emit(ProgressEvent::WorkCompleted {
                phase: SYMLINK_PHASE,
                unit: pkg.name.clone(),
            });
        }

        self.sink.emit(ProgressEvent::PhaseFinished {
            phase: SYMLINK_PHASE,
        });
        Ok(())
    }

    fn info(&self, message: String) {
        self.sink.emit(ProgressEvent::Info(message));
    }
}
