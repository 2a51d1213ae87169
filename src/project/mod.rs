//! Workspace model consumed by the runner
//!
//! The runner only needs three things from the host project: the workspace
//! containing a directory (its scripts and identity), the binaries that
//! workspace may invoke, and the dependency-resolution metadata file. Those
//! are expressed as the [`ProjectModel`] and [`BinaryEnumerator`] traits;
//! [`ManifestProject`] implements both on top of `package.json` files and a
//! `node_modules` layout.

pub mod manifest;

pub use manifest::{ManifestProject, PackageManifest};

use crate::error::LightrunResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque identity of a resolved package
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A binary a workspace is entitled to invoke
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryEntry {
    /// Package that declares the binary
    pub owner: Locator,
    /// Absolute path of the script the binary points to
    pub path: PathBuf,
}

/// Binary name to entry, ordered so that serialization is stable
pub type AccessibleBinaryMap = BTreeMap<String, BinaryEntry>;

/// Read-only view of one workspace
#[derive(Debug, Clone)]
pub struct WorkspaceContext {
    /// Directory holding the workspace manifest
    pub working_directory: PathBuf,
    /// Script name to command text
    pub declared_scripts: HashMap<String, String>,
    /// Identity of the workspace package
    pub owner: Locator,
}

/// Expensive enumeration of the binaries visible from a workspace directory
#[async_trait]
pub trait BinaryEnumerator: Send + Sync {
    /// List every binary the workspace at `directory` may invoke
    async fn enumerate(&self, directory: &Path) -> LightrunResult<AccessibleBinaryMap>;
}

/// Host project model
#[async_trait]
pub trait ProjectModel: Send + Sync {
    /// Workspace containing `cwd`
    async fn workspace(&self, cwd: &Path) -> LightrunResult<WorkspaceContext>;

    /// Top-level workspace of the project containing `cwd`
    async fn top_level_workspace(&self, cwd: &Path) -> LightrunResult<WorkspaceContext>;

    /// Dependency-resolution metadata file for the project containing `cwd`,
    /// if the project has one
    async fn pnp_loader(&self, cwd: &Path) -> LightrunResult<Option<PathBuf>>;
}
