//! `package.json` backed project model
//!
//! Workspaces are directories holding a `package.json`. The project root is
//! the topmost ancestor whose manifest declares `workspaces`, or the
//! workspace itself when there is none. Dependencies are located with the
//! usual `node_modules` lookup, walking up from the workspace directory.

use crate::error::{LightrunError, LightrunResult};
use crate::project::{
    AccessibleBinaryMap, BinaryEntry, BinaryEnumerator, Locator, ProjectModel, WorkspaceContext,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

const MANIFEST: &str = "package.json";

/// The subset of `package.json` the runner reads
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PackageManifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub scripts: HashMap<String, String>,
    pub bin: Option<BinField>,
    pub dependencies: HashMap<String, String>,
    pub dev_dependencies: HashMap<String, String>,
    pub optional_dependencies: HashMap<String, String>,
    pub workspaces: Option<serde_json::Value>,
}

/// `bin` is either a single path (named after the package) or a map
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BinField {
    Single(String),
    Map(HashMap<String, String>),
}

impl PackageManifest {
    /// Parse a manifest from disk
    pub async fn from_file(path: &Path) -> LightrunResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LightrunError::io(format!("reading manifest {}", path.display()), e))?;
        Self::parse(&content).map_err(|e| LightrunError::ManifestInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Parse a manifest from a JSON string
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Declared binaries as (name, path relative to the package)
    pub fn binaries(&self) -> Vec<(String, String)> {
        match &self.bin {
            Some(BinField::Single(path)) => match self.name.as_deref() {
                Some(name) => vec![(unscoped(name).to_string(), path.clone())],
                None => vec![],
            },
            Some(BinField::Map(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            None => vec![],
        }
    }

    /// Every dependency name, sorted and deduplicated
    pub fn dependency_names(&self) -> BTreeSet<&str> {
        self.dependencies
            .keys()
            .chain(self.dev_dependencies.keys())
            .chain(self.optional_dependencies.keys())
            .map(String::as_str)
            .collect()
    }
}

/// `@scope/tool` exposes its single binary as `tool`
fn unscoped(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Join a manifest-relative path onto a package directory, dropping `./`
fn package_path(dir: &Path, relative: &str) -> PathBuf {
    let mut path = dir.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::CurDir => {}
            other => path.push(other),
        }
    }
    path
}

/// Project model reading `package.json` files from disk
#[derive(Debug, Clone)]
pub struct ManifestProject {
    pnp_file: String,
}

impl ManifestProject {
    /// Create a project model looking for `pnp_file` at the project root
    pub fn new(pnp_file: impl Into<String>) -> Self {
        Self {
            pnp_file: pnp_file.into(),
        }
    }

    /// Nearest directory at or above `cwd` holding a manifest
    pub fn find_workspace_dir(cwd: &Path) -> LightrunResult<PathBuf> {
        cwd.ancestors()
            .find(|dir| dir.join(MANIFEST).is_file())
            .map(Path::to_path_buf)
            .ok_or_else(|| LightrunError::WorkspaceNotFound(cwd.to_path_buf()))
    }

    /// Topmost ancestor declaring `workspaces`, or the workspace itself
    pub async fn find_project_root(cwd: &Path) -> LightrunResult<PathBuf> {
        let workspace_dir = Self::find_workspace_dir(cwd)?;
        let mut root = workspace_dir.clone();

        for dir in workspace_dir.ancestors() {
            let path = dir.join(MANIFEST);
            if !path.is_file() {
                continue;
            }
            match PackageManifest::from_file(&path).await {
                Ok(manifest) if manifest.workspaces.is_some() => root = dir.to_path_buf(),
                Ok(_) => {}
                Err(e) => debug!("Ignoring unreadable manifest {}: {}", path.display(), e),
            }
        }

        Ok(root)
    }

    async fn load_workspace(&self, dir: &Path) -> LightrunResult<WorkspaceContext> {
        let manifest = PackageManifest::from_file(&dir.join(MANIFEST)).await?;
        let root = Self::find_project_root(dir).await?;
        let owner = workspace_locator(&manifest, &root, dir);
        debug!("Workspace {} at {}", owner, dir.display());

        Ok(WorkspaceContext {
            working_directory: dir.to_path_buf(),
            declared_scripts: manifest.scripts,
            owner,
        })
    }

    /// Locate an installed dependency by walking `node_modules` upward
    fn locate_dependency(from: &Path, name: &str) -> Option<PathBuf> {
        from.ancestors()
            .map(|dir| dir.join("node_modules").join(name))
            .find(|dir| dir.join(MANIFEST).is_file())
    }
}

fn workspace_locator(manifest: &PackageManifest, root: &Path, dir: &Path) -> Locator {
    let name = manifest.name.as_deref().unwrap_or("unnamed-workspace");
    let relative = dir
        .strip_prefix(root)
        .ok()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|| ".".to_string());
    Locator::new(format!("{name}@workspace:{relative}"))
}

#[async_trait]
impl ProjectModel for ManifestProject {
    async fn workspace(&self, cwd: &Path) -> LightrunResult<WorkspaceContext> {
        let dir = Self::find_workspace_dir(cwd)?;
        self.load_workspace(&dir).await
    }

    async fn top_level_workspace(&self, cwd: &Path) -> LightrunResult<WorkspaceContext> {
        let root = Self::find_project_root(cwd).await?;
        self.load_workspace(&root).await
    }

    async fn pnp_loader(&self, cwd: &Path) -> LightrunResult<Option<PathBuf>> {
        let root = Self::find_project_root(cwd).await?;
        let loader = root.join(&self.pnp_file);
        Ok(loader.is_file().then_some(loader))
    }
}

#[async_trait]
impl BinaryEnumerator for ManifestProject {
    async fn enumerate(&self, directory: &Path) -> LightrunResult<AccessibleBinaryMap> {
        let manifest_path = directory.join(MANIFEST);
        if !manifest_path.is_file() {
            return Err(LightrunError::Enumeration {
                directory: directory.to_path_buf(),
                reason: "no package.json".to_string(),
            });
        }

        let manifest = PackageManifest::from_file(&manifest_path).await?;
        let root = Self::find_project_root(directory).await?;
        let mut binaries = AccessibleBinaryMap::new();

        let owner = workspace_locator(&manifest, &root, directory);
        for (name, relative) in manifest.binaries() {
            binaries.insert(
                name,
                BinaryEntry {
                    owner: owner.clone(),
                    path: package_path(directory, &relative),
                },
            );
        }

        // Dependencies are visited after the workspace itself, so a
        // dependency binary shadows a same-named workspace binary.
        for dependency in manifest.dependency_names() {
            let Some(package_dir) = Self::locate_dependency(directory, dependency) else {
                debug!("Dependency {} is not installed, skipping", dependency);
                continue;
            };

            let dep_manifest = match PackageManifest::from_file(&package_dir.join(MANIFEST)).await
            {
                Ok(m) => m,
                Err(e) => {
                    warn!("Skipping dependency {}: {}", dependency, e);
                    continue;
                }
            };

            let version = dep_manifest.version.as_deref().unwrap_or("0.0.0");
            let owner = Locator::new(format!("{dependency}@npm:{version}"));
            for (name, relative) in dep_manifest.binaries() {
                binaries.insert(
                    name,
                    BinaryEntry {
                        owner: owner.clone(),
                        path: package_path(&package_dir, &relative),
                    },
                );
            }
        }

        debug!(
            "Enumerated {} binaries for {}",
            binaries.len(),
            directory.display()
        );
        Ok(binaries)
    }
}
