//! CLI command implementations
//!
//! Every command returns the exit code lightrun should terminate with.

pub mod cache;
pub mod exec;
pub mod hook;
pub mod node;
pub mod run;

pub use cache::execute as cache;
pub use exec::execute as exec;
pub use hook::execute as hook;
pub use node::execute as node;
pub use run::execute as run;

use crate::cache::{BinaryCache, CacheOptions};
use crate::config::{Config, ConfigManager};
use crate::error::{LightrunError, LightrunResult};
use crate::process::ShellCommand;
use crate::project::{BinaryEnumerator, ManifestProject, ProjectModel};
use crate::resolve::RunnerSettings;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Project model configured from `[runtime]`
pub(crate) fn project(config: &Config) -> Arc<ManifestProject> {
    Arc::new(ManifestProject::new(config.runtime.pnp_file.clone()))
}

/// Open the binary cache configured from `[cache]`
pub(crate) async fn open_cache(
    config: &Config,
    enumerator: Arc<dyn BinaryEnumerator>,
    show_progress: bool,
) -> LightrunResult<BinaryCache> {
    let options = CacheOptions {
        persist: config.cache.enabled,
        lock_timeout: Duration::from_secs(config.cache.lock_timeout_secs),
        show_progress,
    };
    BinaryCache::open(ConfigManager::cache_dir(config), enumerator, options).await
}

/// Runner settings for the project containing `cwd`
pub(crate) async fn runner_settings(
    config: &Config,
    project: &dyn ProjectModel,
    cwd: &Path,
) -> LightrunResult<RunnerSettings> {
    let pnp_loader = project.pnp_loader(cwd).await?;
    match &pnp_loader {
        Some(path) => debug!("Preloading {}", path.display()),
        None => debug!("No {} found, skipping preload", config.runtime.pnp_file),
    }

    Ok(RunnerSettings {
        interpreter: config.runtime.interpreter.clone(),
        shell: ShellCommand::from_config(config.shell.program.as_deref()),
        pnp_loader,
    })
}

pub(crate) fn current_dir() -> LightrunResult<PathBuf> {
    std::env::current_dir().map_err(|e| LightrunError::io("getting current directory", e))
}
