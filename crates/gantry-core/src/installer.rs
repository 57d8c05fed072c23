//! Installer subprocess client.
//!
//! The orchestrator talks to the package manager through the [`Installer`]
//! trait; [`NpmProcess`] is the production implementation that shells out
//! to the configured client. Lifecycle scripts ride the same client via
//! `<client> run <script>`.

use crate::config::BootstrapOptions;
use crate::error::Error;
use async_trait::async_trait;
use std::net::TcpListener;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Preferred start of the mutex port scan.
const MUTEX_PORT_START: u16 = 42424;
/// How many ports past the preferred start are tried before giving up.
const MUTEX_PORT_SPAN: u16 = 128;

/// The subprocess contract the orchestrator consumes.
#[async_trait]
pub trait Installer: Send + Sync {
    /// Install the given specs in `dir`. An empty spec list is valid and
    /// still runs the client, which performs post-install linking in some
    /// implementations.
    async fn install_in_dir(
        &self,
        dir: &Path,
        specs: &[String],
        global_style: bool,
    ) -> Result<(), Error>;

    /// Install whatever the manifest at `dir` declares.
    async fn install_in_dir_from_manifest(&self, dir: &Path) -> Result<(), Error>;

    /// Run a named script from `package`'s manifest in `dir`.
    async fn run_script_in_dir(
        &self,
        dir: &Path,
        script: &str,
        package: &str,
    ) -> Result<(), Error>;
}

/// Client-level configuration shared by every installer invocation.
#[derive(Debug, Clone)]
pub struct NpmConfig {
    pub client: String,
    pub registry: Option<String>,
    pub mutex: Option<String>,
}

impl NpmConfig {
    /// Derive the client configuration from bootstrap options.
    ///
    /// yarn coordinates concurrent invocations through a network mutex;
    /// when it is the chosen client and no mutex was given, a free local
    /// port is allocated for it.
    pub fn from_options(options: &BootstrapOptions) -> Result<Self, Error> {
        let mutex = match &options.mutex {
            Some(mutex) => Some(mutex.clone()),
            None if options.npm_client == "yarn" => {
                Some(format!("network:{}", allocate_mutex_port()?))
            }
            None => None,
        };

        Ok(Self {
            client: options.npm_client.clone(),
            registry: options.registry.clone(),
            mutex,
        })
    }
}

/// Find a free TCP port for the installer mutex, starting at the
/// preferred port and scanning upward on the wildcard address.
pub fn allocate_mutex_port() -> Result<u16, Error> {
    for port in MUTEX_PORT_START..MUTEX_PORT_START.saturating_add(MUTEX_PORT_SPAN) {
        if TcpListener::bind(("0.0.0.0", port)).is_ok() {
            return Ok(port);
        }
    }
    Err(Error::PortAllocationFailed)
}

/// Production installer: spawns the configured package manager.
#[derive(Debug, Clone)]
pub struct NpmProcess {
    config: NpmConfig,
}

impl NpmProcess {
    #[must_use]
    pub fn new(config: NpmConfig) -> Self {
        Self { config }
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.config.client);
        if let Some(registry) = &self.config.registry {
            cmd.arg(format!("--registry={registry}"));
        }
        if let Some(mutex) = &self.config.mutex {
            cmd.arg(format!("--mutex={mutex}"));
        }
        cmd
    }
}

#[async_trait]
impl Installer for NpmProcess {
    async fn install_in_dir(
        &self,
        dir: &Path,
        specs: &[String],
        global_style: bool,
    ) -> Result<(), Error> {
        let mut cmd = self.base_command();
        cmd.arg("install");
        cmd.args(specs);
        if global_style {
            cmd.arg("--global-style");
        }

        run(cmd, dir).await.map_err(|detail| Error::InstallerFailed {
            dir: dir.to_path_buf(),
            specs: specs.to_vec(),
            detail,
        })
    }

    async fn install_in_dir_from_manifest(&self, dir: &Path) -> Result<(), Error> {
        let mut cmd = self.base_command();
        cmd.arg("install");

        run(cmd, dir).await.map_err(|detail| Error::InstallerFailed {
            dir: dir.to_path_buf(),
            specs: Vec::new(),
            detail,
        })
    }

    async fn run_script_in_dir(
        &self,
        dir: &Path,
        script: &str,
        package: &str,
    ) -> Result<(), Error> {
        let mut cmd = self.base_command();
        cmd.arg("run");
        cmd.arg(script);

        run(cmd, dir)
            .await
            .map_err(|detail| Error::LifecycleScriptFailed {
                package: package.to_string(),
                script: script.to_string(),
                detail,
            })
    }
}

/// Run a client command in `dir`, mapping failure to a detail string with
/// the tail of stderr attached.
async fn run(mut cmd: Command, dir: &Path) -> Result<(), String> {
    cmd.current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let output = cmd
        .output()
        .await
        .map_err(|e| format!("failed to spawn: {e}"))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let tail: Vec<&str> = stderr.lines().rev().take(20).collect();
    let tail: Vec<&str> = tail.into_iter().rev().collect();
    let code = output.status.code().unwrap_or(-1);

    if tail.is_empty() {
        Err(format!("exit code {code}"))
    } else {
        Err(format!("exit code {code}\n{}", tail.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_mutex_port_allocation() {
        let port = allocate_mutex_port().unwrap();
        assert!(port >= MUTEX_PORT_START);
    }

    #[test]
    fn test_yarn_gets_network_mutex() {
        let options = BootstrapOptions::default().with_npm_client("yarn");
        let config = NpmConfig::from_options(&options).unwrap();
        assert!(config.mutex.unwrap().starts_with("network:"));
    }

    #[test]
    fn test_explicit_mutex_passes_through() {
        let mut options = BootstrapOptions::default().with_npm_client("yarn");
        options.mutex = Some("file:/tmp/gantry.lock".to_string());
        let config = NpmConfig::from_options(&options).unwrap();
        assert_eq!(config.mutex.unwrap(), "file:/tmp/gantry.lock");
    }

    #[test]
    fn test_npm_gets_no_mutex() {
        let config = NpmConfig::from_options(&BootstrapOptions::default()).unwrap();
        assert!(config.mutex.is_none());
    }

    #[tokio::test]
    async fn test_run_reports_spawn_failure() {
        let dir = tempdir().unwrap();
        let installer = NpmProcess::new(NpmConfig {
            client: "gantry-test-no-such-client".to_string(),
            registry: None,
            mutex: None,
        });

        let result = installer.install_in_dir(dir.path(), &[], false).await;
        match result {
            Err(Error::InstallerFailed { detail, .. }) => {
                assert!(detail.contains("failed to spawn"));
            }
            other => panic!("expected InstallerFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_script_annotates_package() {
        let dir = tempdir().unwrap();
        let installer = NpmProcess::new(NpmConfig {
            client: "gantry-test-no-such-client".to_string(),
            registry: None,
            mutex: None,
        });

        let result = installer
            .run_script_in_dir(dir.path(), "preinstall", "my-pkg")
            .await;
        match result {
            Err(Error::LifecycleScriptFailed {
                package, script, ..
            }) => {
                assert_eq!(package, "my-pkg");
                assert_eq!(script, "preinstall");
            }
            other => panic!("expected LifecycleScriptFailed, got {other:?}"),
        }
    }
}
