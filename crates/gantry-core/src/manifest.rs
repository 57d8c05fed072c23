//! Package manifests and workspace discovery.
//!
//! Reads the `workspaces` field from the root package.json, discovers the
//! repo-local packages it names, and loads each package's manifest into the
//! [`Package`] record the planner and orchestrator consume.

use crate::error::Error;
use crate::links;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// A repo-local package.
#[derive(Debug, Clone)]
pub struct Package {
    /// Package name from package.json (unique within the repo).
    pub name: String,
    /// Concrete semver version.
    pub version: String,
    /// Absolute path to the package directory.
    pub location: PathBuf,
    /// Local-module directory, where dependencies resolve from.
    pub node_modules: PathBuf,
    /// Declared dependency ranges, `dependencies` merged over
    /// `devDependencies` (the former wins on conflict).
    pub dependencies: BTreeMap<String, String>,
    /// Lifecycle and user scripts from package.json.
    pub scripts: BTreeMap<String, String>,
    /// Dependency names with a directory materially present under
    /// `node_modules` when the package was loaded. Presence only, no
    /// version check.
    pub installed: BTreeSet<String>,
}

impl Package {
    /// Create a package record rooted at `location`.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>, location: PathBuf) -> Self {
        let node_modules = location.join("node_modules");
        Self {
            name: name.into(),
            version: version.into(),
            location,
            node_modules,
            dependencies: BTreeMap::new(),
            scripts: BTreeMap::new(),
            installed: BTreeSet::new(),
        }
    }

    /// Whether a directory for the named dependency was present on disk at
    /// load time.
    #[must_use]
    pub fn has_installed(&self, name: &str) -> bool {
        self.installed.contains(name)
    }

    /// Whether the package declares the named script.
    #[must_use]
    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    /// The package's local binary directory.
    #[must_use]
    pub fn bin_dir(&self) -> PathBuf {
        self.node_modules.join(".bin")
    }
}

/// The repository-level manifest.
#[derive(Debug, Clone)]
pub struct RootManifest {
    /// Declared dependency ranges at the repository root.
    pub dependencies: BTreeMap<String, String>,
    /// Absolute path to the repository root.
    pub location: PathBuf,
    /// The root local-module directory.
    pub node_modules: PathBuf,
}

impl RootManifest {
    /// Create a root manifest rooted at `location`.
    #[must_use]
    pub fn new(location: PathBuf) -> Self {
        let node_modules = location.join("node_modules");
        Self {
            dependencies: BTreeMap::new(),
            location,
            node_modules,
        }
    }
}

/// Load the root manifest and discover workspace packages.
///
/// The `workspaces` field may be an array of glob patterns or a yarn-style
/// `{ "packages": [...] }` object. Directories matched by a pattern that do
/// not contain a parsable package.json are skipped.
pub fn load_workspace(root: &Path) -> Result<(RootManifest, Vec<Package>), Error> {
    let manifest_path = root.join("package.json");
    let json = read_manifest(&manifest_path)?;

    let mut manifest = RootManifest::new(root.to_path_buf());
    manifest.dependencies = extract_dependencies(&json);

    let patterns = workspace_patterns(&json);
    let mut packages = discover_packages(root, &patterns);
    packages.sort_by(|a, b| a.name.cmp(&b.name));

    Ok((manifest, packages))
}

/// Find the workspace root by walking up the directory tree.
///
/// Returns the first directory containing a package.json with a
/// `workspaces` field.
#[must_use]
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let package_json = current.join("package.json");
        if package_json.exists() {
            if let Ok(content) = fs::read_to_string(&package_json) {
                if let Ok(json) = serde_json::from_str::<Value>(&content) {
                    if json.get("workspaces").is_some() {
                        return Some(current);
                    }
                }
            }
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Restrict a package list to names matching a glob pattern.
pub fn filter_scope(packages: Vec<Package>, scope: &str) -> Result<Vec<Package>, Error> {
    let pattern =
        glob::Pattern::new(scope).map_err(|e| Error::bad_pattern(scope, e.to_string()))?;
    Ok(packages
        .into_iter()
        .filter(|pkg| pattern.matches(&pkg.name))
        .collect())
}

fn read_manifest(path: &Path) -> Result<Value, Error> {
    let content = fs::read_to_string(path).map_err(|source| Error::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| Error::ManifestParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Extract the workspace glob patterns from a root manifest.
fn workspace_patterns(json: &Value) -> Vec<String> {
    let Some(workspaces) = json.get("workspaces") else {
        return Vec::new();
    };

    match workspaces {
        Value::Array(arr) => arr
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        Value::Object(obj) => obj
            .get("packages")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Merge `devDependencies` and `dependencies`; `dependencies` wins.
fn extract_dependencies(json: &Value) -> BTreeMap<String, String> {
    let mut deps = BTreeMap::new();

    for section in ["devDependencies", "dependencies"] {
        if let Some(obj) = json.get(section).and_then(Value::as_object) {
            for (name, range) in obj {
                if let Some(range) = range.as_str() {
                    deps.insert(name.clone(), range.to_string());
                }
            }
        }
    }

    deps
}

fn extract_scripts(json: &Value) -> BTreeMap<String, String> {
    let mut scripts = BTreeMap::new();

    if let Some(obj) = json.get("scripts").and_then(Value::as_object) {
        for (name, command) in obj {
            if let Some(command) = command.as_str() {
                scripts.insert(name.clone(), command.to_string());
            }
        }
    }

    scripts
}

/// Expand glob patterns and load the packages they match.
fn discover_packages(root: &Path, patterns: &[String]) -> Vec<Package> {
    let mut packages: BTreeMap<String, Package> = BTreeMap::new();

    for pattern in patterns {
        let full_pattern = root.join(pattern);
        let pattern_str = full_pattern.to_string_lossy();

        if let Ok(entries) = glob::glob(&pattern_str) {
            for entry in entries.flatten() {
                if let Some(pkg) = read_package(&entry) {
                    packages.insert(pkg.name.clone(), pkg);
                }
            }
        }
    }

    packages.into_values().collect()
}

/// Read package info from a workspace directory.
fn read_package(dir: &Path) -> Option<Package> {
    if !dir.is_dir() {
        return None;
    }

    let content = fs::read_to_string(dir.join("package.json")).ok()?;
    let json: Value = serde_json::from_str(&content).ok()?;

    let name = json.get("name")?.as_str()?.to_string();
    let version = json
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or("0.0.0")
        .to_string();

    let mut pkg = Package::new(name, version, dir.to_path_buf());
    pkg.dependencies = extract_dependencies(&json);
    pkg.scripts = extract_scripts(&json);
    pkg.installed = probe_installed(&pkg.node_modules, &pkg.dependencies);

    Some(pkg)
}

/// Record which declared dependencies have a directory present under
/// `node_modules`. Presence of the directory is all that is checked.
fn probe_installed(
    node_modules: &Path,
    dependencies: &BTreeMap<String, String>,
) -> BTreeSet<String> {
    dependencies
        .keys()
        .filter(|name| links::module_path(node_modules, name).is_dir())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_manifest(dir: &Path, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("package.json"), content).unwrap();
    }

    #[test]
    fn test_load_workspace_array_format() {
        let root = tempdir().unwrap();
        write_manifest(
            root.path(),
            r#"{"name": "monorepo", "workspaces": ["packages/*"], "dependencies": {"left-pad": "^1.0.0"}}"#,
        );
        write_manifest(
            &root.path().join("packages/app"),
            r#"{"name": "app", "version": "1.0.0", "dependencies": {"lodash": "^4.0.0"}}"#,
        );

        let (manifest, packages) = load_workspace(root.path()).unwrap();
        assert_eq!(manifest.dependencies.get("left-pad").unwrap(), "^1.0.0");
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "app");
        assert_eq!(packages[0].dependencies.get("lodash").unwrap(), "^4.0.0");
    }

    #[test]
    fn test_load_workspace_object_format() {
        let root = tempdir().unwrap();
        write_manifest(
            root.path(),
            r#"{"name": "monorepo", "workspaces": {"packages": ["packages/*"]}}"#,
        );
        write_manifest(
            &root.path().join("packages/utils"),
            r#"{"name": "utils", "version": "2.0.0"}"#,
        );

        let (_, packages) = load_workspace(root.path()).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "utils");
        assert_eq!(packages[0].version, "2.0.0");
    }

    #[test]
    fn test_load_workspace_without_workspaces_field() {
        let root = tempdir().unwrap();
        write_manifest(root.path(), r#"{"name": "plain-project"}"#);

        let (_, packages) = load_workspace(root.path()).unwrap();
        assert!(packages.is_empty());
    }

    #[test]
    fn test_dependencies_win_over_dev_dependencies() {
        let root = tempdir().unwrap();
        write_manifest(
            root.path(),
            r#"{"name": "monorepo", "workspaces": ["packages/*"]}"#,
        );
        write_manifest(
            &root.path().join("packages/app"),
            r#"{
                "name": "app",
                "version": "1.0.0",
                "dependencies": {"shared": "^2.0.0"},
                "devDependencies": {"shared": "^1.0.0", "jest": "^29.0.0"}
            }"#,
        );

        let (_, packages) = load_workspace(root.path()).unwrap();
        let deps = &packages[0].dependencies;
        assert_eq!(deps.get("shared").unwrap(), "^2.0.0");
        assert_eq!(deps.get("jest").unwrap(), "^29.0.0");
    }

    #[test]
    fn test_installed_probe_is_directory_presence() {
        let root = tempdir().unwrap();
        write_manifest(
            root.path(),
            r#"{"name": "monorepo", "workspaces": ["packages/*"]}"#,
        );
        let app = root.path().join("packages/app");
        write_manifest(
            &app,
            r#"{"name": "app", "version": "1.0.0", "dependencies": {"present": "^1.0.0", "missing": "^1.0.0"}}"#,
        );
        fs::create_dir_all(app.join("node_modules/present")).unwrap();

        let (_, packages) = load_workspace(root.path()).unwrap();
        assert!(packages[0].has_installed("present"));
        assert!(!packages[0].has_installed("missing"));
    }

    #[test]
    fn test_scoped_installed_probe() {
        let root = tempdir().unwrap();
        write_manifest(
            root.path(),
            r#"{"name": "monorepo", "workspaces": ["packages/*"]}"#,
        );
        let app = root.path().join("packages/app");
        write_manifest(
            &app,
            r#"{"name": "app", "version": "1.0.0", "dependencies": {"@scope/dep": "^1.0.0"}}"#,
        );
        fs::create_dir_all(app.join("node_modules/@scope/dep")).unwrap();

        let (_, packages) = load_workspace(root.path()).unwrap();
        assert!(packages[0].has_installed("@scope/dep"));
    }

    #[test]
    fn test_skips_directories_without_manifest() {
        let root = tempdir().unwrap();
        write_manifest(
            root.path(),
            r#"{"name": "monorepo", "workspaces": ["packages/*"]}"#,
        );
        write_manifest(
            &root.path().join("packages/real"),
            r#"{"name": "real", "version": "1.0.0"}"#,
        );
        fs::create_dir_all(root.path().join("packages/empty")).unwrap();

        let (_, packages) = load_workspace(root.path()).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "real");
    }

    #[test]
    fn test_find_workspace_root() {
        let root = tempdir().unwrap();
        write_manifest(
            root.path(),
            r#"{"name": "monorepo", "workspaces": ["packages/*"]}"#,
        );
        let nested = root.path().join("packages/nested/deep");
        fs::create_dir_all(&nested).unwrap();

        let found = find_workspace_root(&nested).unwrap();
        assert_eq!(found, root.path());
    }

    #[test]
    fn test_filter_scope() {
        let packages = vec![
            Package::new("app-web", "1.0.0", PathBuf::from("/repo/app-web")),
            Package::new("app-api", "1.0.0", PathBuf::from("/repo/app-api")),
            Package::new("tooling", "1.0.0", PathBuf::from("/repo/tooling")),
        ];

        let filtered = filter_scope(packages, "app-*").unwrap();
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|p| p.name.starts_with("app-")));
    }

    #[test]
    fn test_filter_scope_bad_pattern() {
        let packages = vec![Package::new("a", "1.0.0", PathBuf::from("/repo/a"))];
        assert!(matches!(
            filter_scope(packages, "[unclosed"),
            Err(Error::BadPattern { .. })
        ));
    }

    #[test]
    fn test_missing_root_manifest() {
        let root = tempdir().unwrap();
        assert!(matches!(
            load_workspace(root.path()),
            Err(Error::ManifestRead { .. })
        ));
    }
}
