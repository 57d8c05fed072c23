//! Symlink, binary-link, and prune helpers for local-module directories.
//!
//! Sibling packages are linked directly (symlink on Unix, junction on
//! Windows) from a dependent's `node_modules/<name>` to the sibling's
//! package directory. Binaries declared in a source package's `bin` field
//! are linked into a dependent's `node_modules/.bin/`.

use crate::error::Error;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolve the module directory for a dependency name, handling scoped
/// names (`@scope/name` lives under a scope subdirectory).
#[must_use]
pub fn module_path(node_modules: &Path, name: &str) -> PathBuf {
    if let Some((scope, rest)) = split_scoped(name) {
        node_modules.join(scope).join(rest)
    } else {
        node_modules.join(name)
    }
}

/// Link a sibling package into a dependent's local-module directory.
///
/// Replaces whatever is already at `node_modules/<name>` and returns the
/// created link path.
pub fn symlink_sibling(
    node_modules: &Path,
    name: &str,
    target: &Path,
) -> Result<PathBuf, Error> {
    let link_path = ensure_module_parent(node_modules, name)?;

    if link_path.exists() || link_path.symlink_metadata().is_ok() {
        remove_link_or_dir(&link_path)?;
    }
    create_dir_link(target, &link_path)?;

    Ok(link_path)
}

/// Link the binaries declared by the package at `source_pkg_dir` into
/// `bin_dir`.
///
/// The `bin` field may be a string (binary named after the package) or an
/// object mapping binary names to paths. Returns the created link paths;
/// a package without a `bin` field links nothing.
pub fn link_bins(
    source_pkg_dir: &Path,
    pkg_name: &str,
    bin_dir: &Path,
) -> Result<Vec<PathBuf>, Error> {
    let manifest_path = source_pkg_dir.join("package.json");
    let content = fs::read_to_string(&manifest_path).map_err(|source| Error::ManifestRead {
        path: manifest_path.clone(),
        source,
    })?;
    let manifest: Value =
        serde_json::from_str(&content).map_err(|source| Error::ManifestParse {
            path: manifest_path,
            source,
        })?;

    let Some(bin_field) = manifest.get("bin") else {
        return Ok(Vec::new());
    };

    fs::create_dir_all(bin_dir).map_err(|e| Error::fs("create-dir", bin_dir, e))?;

    let mut linked = Vec::new();

    match bin_field {
        Value::String(bin_path) => {
            // Single binary named after the (unscoped) package name.
            let bin_name = pkg_name.split('/').next_back().unwrap_or(pkg_name);
            linked.push(link_binary(bin_dir, bin_name, source_pkg_dir, bin_path)?);
        }
        Value::Object(bins) => {
            for (bin_name, bin_path) in bins {
                if let Value::String(path) = bin_path {
                    linked.push(link_binary(bin_dir, bin_name, source_pkg_dir, path)?);
                }
            }
        }
        _ => {}
    }

    Ok(linked)
}

/// Remove a directory (or stale link) that would shadow a hoisted
/// dependency. Missing paths are fine.
pub fn prune_dir(path: &Path) -> Result<(), Error> {
    if path.exists() || path.symlink_metadata().is_ok() {
        remove_link_or_dir(path)?;
    }
    Ok(())
}

/// Split `@scope/name` into its scope and name parts.
fn split_scoped(name: &str) -> Option<(&str, &str)> {
    if !name.starts_with('@') {
        return None;
    }
    name.split_once('/')
}

/// Compute the link path for a dependency, creating the local-module
/// directory (and scope directory, for scoped names) as needed.
fn ensure_module_parent(node_modules: &Path, name: &str) -> Result<PathBuf, Error> {
    let link_path = module_path(node_modules, name);
    let parent = link_path
        .parent()
        .unwrap_or(node_modules)
        .to_path_buf();
    fs::create_dir_all(&parent).map_err(|e| Error::fs("create-dir", parent.clone(), e))?;
    Ok(link_path)
}

/// Create a symlink for a single binary.
fn link_binary(
    bin_dir: &Path,
    bin_name: &str,
    pkg_dir: &Path,
    bin_path: &str,
) -> Result<PathBuf, Error> {
    let link_path = bin_dir.join(bin_name);
    let target_path = pkg_dir.join(bin_path);

    if link_path.exists() || link_path.symlink_metadata().is_ok() {
        remove_link_or_dir(&link_path)?;
    }

    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(&target_path, &link_path)
            .map_err(|e| Error::fs("symlink", link_path.clone(), e))?;

        // Make the target executable.
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(&target_path) {
            let mut perms = metadata.permissions();
            perms.set_mode(perms.mode() | 0o111);
            let _ = fs::set_permissions(&target_path, perms);
        }
    }

    #[cfg(windows)]
    {
        create_cmd_shim(&link_path, &target_path)?;
    }

    Ok(link_path)
}

#[cfg(windows)]
fn create_cmd_shim(link_path: &Path, target_path: &Path) -> Result<(), Error> {
    let cmd_path = link_path.with_extension("cmd");
    let shim_content = format!("@ECHO off\r\nnode \"{}\" %*\r\n", target_path.display());

    fs::write(&cmd_path, shim_content).map_err(|e| Error::fs("write", cmd_path.clone(), e))
}

/// Remove a symlink, junction, or directory.
fn remove_link_or_dir(path: &Path) -> Result<(), Error> {
    #[cfg(unix)]
    {
        if let Ok(metadata) = fs::symlink_metadata(path) {
            if metadata.file_type().is_symlink() {
                return fs::remove_file(path).map_err(|e| Error::fs("remove", path, e));
            }
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;

        if let Ok(metadata) = fs::symlink_metadata(path) {
            // FILE_ATTRIBUTE_REPARSE_POINT = 0x400 marks junctions and symlinks.
            if metadata.file_attributes() & 0x400 != 0 {
                return fs::remove_dir(path).map_err(|e| Error::fs("remove", path, e));
            }
        }
    }

    if path.is_dir() {
        fs::remove_dir_all(path).map_err(|e| Error::fs("remove", path, e))
    } else if path.exists() {
        fs::remove_file(path).map_err(|e| Error::fs("remove", path, e))
    } else {
        Ok(())
    }
}

/// Create a directory link (symlink on Unix, junction on Windows).
fn create_dir_link(src: &Path, dst: &Path) -> Result<(), Error> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(src, dst).map_err(|e| Error::fs("symlink", dst, e))
    }

    #[cfg(windows)]
    {
        junction::create(src, dst).map_err(|e| Error::fs("junction", dst, e))
    }
}
