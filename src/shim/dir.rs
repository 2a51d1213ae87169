//! Temporary shim directory owned by a single execution
//!
//! The directory and everything in it is removed when the value is dropped,
//! which covers early returns, errors and cancelled futures. `close` does the
//! same removal explicitly and reports failures.

use crate::error::{LightrunError, LightrunResult};
use crate::project::AccessibleBinaryMap;
use crate::shim::materialize;
use std::path::Path;
use tempfile::TempDir;
use tracing::debug;

const PREFIX: &str = "lightrun-bin-";

/// Self-deleting directory of binary wrappers
#[derive(Debug)]
pub struct ShimDirectory {
    dir: TempDir,
}

impl ShimDirectory {
    /// Create a fresh directory under the system temp area
    pub fn create() -> LightrunResult<Self> {
        Self::create_in(std::env::temp_dir())
    }

    /// Create a fresh directory under `parent`
    pub fn create_in(parent: impl AsRef<Path>) -> LightrunResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .tempdir_in(parent)
            .map_err(|e| LightrunError::setup("creating shim directory", e))?;
        debug!("Created shim directory {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Create a directory and fill it with wrappers for `binaries`
    pub async fn with_binaries(
        binaries: &AccessibleBinaryMap,
        interpreter: &Path,
    ) -> LightrunResult<Self> {
        let shims = Self::create()?;
        materialize(binaries, shims.path(), interpreter).await?;
        Ok(shims)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now, surfacing any error
    pub async fn close(self) -> LightrunResult<()> {
        let path = self.dir.path().to_path_buf();
        tokio::task::spawn_blocking(move || self.dir.close())
            .await
            .map_err(|e| LightrunError::Internal(format!("shim cleanup task failed: {e}")))?
            .map_err(|e| LightrunError::io(format!("removing {}", path.display()), e))?;
        debug!("Removed shim directory {}", path.display());
        Ok(())
    }
}
