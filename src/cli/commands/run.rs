//! Run command - run a declared script or a dependency binary

use crate::cli::args::RunArgs;
use crate::cli::commands::{current_dir, open_cache, project, runner_settings};
use crate::config::Config;
use crate::error::LightrunResult;
use crate::process::Signals;
use crate::project::ProjectModel;
use crate::resolve::{ExecutionRequest, InspectFlags, Runner};
use crate::ui::UiContext;
use tracing::debug;

/// Execute the run command
pub async fn execute(args: RunArgs, config: &Config) -> LightrunResult<i32> {
    // before any temporary state exists
    let signals = Signals::install()?;
    let cwd = current_dir()?;
    let ui = UiContext::detect().with_silent(args.silent);
    let project = project(config);

    let workspace = if args.top_level {
        project.top_level_workspace(&cwd).await?
    } else {
        project.workspace(&cwd).await?
    };
    debug!(
        "Running {} in {} ({})",
        args.name,
        workspace.working_directory.display(),
        workspace.owner
    );

    let settings = runner_settings(config, &*project, &cwd).await?;
    let cache = open_cache(config, project, ui.show_progress()).await?;

    let request = ExecutionRequest {
        args: args.forwarded_args(),
        name: args.name,
        working_directory: cwd,
        inspect: InspectFlags {
            inspect: args.inspect,
            inspect_brk: args.inspect_brk,
        },
        binaries_only: args.binaries_only,
        top_level: args.top_level,
    };

    let result = Runner::new(&cache, settings, signals)
        .run(&request, &workspace)
        .await;
    cache.close().await?;
    result
}
