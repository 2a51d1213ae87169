//! Exec command - run any command with the workspace binaries on PATH

use crate::cli::args::ExecArgs;
use crate::cli::commands::{current_dir, open_cache, project, runner_settings};
use crate::config::Config;
use crate::error::LightrunResult;
use crate::process::Signals;
use crate::project::ProjectModel;
use crate::resolve::Runner;
use crate::ui::UiContext;

/// Execute the exec command
pub async fn execute(args: ExecArgs, config: &Config) -> LightrunResult<i32> {
    // before any temporary state exists
    let signals = Signals::install()?;
    let cwd = current_dir()?;
    let ui = UiContext::detect();
    let project = project(config);

    let workspace = project.workspace(&cwd).await?;
    let settings = runner_settings(config, &*project, &cwd).await?;
    let cache = open_cache(config, project, ui.show_progress()).await?;

    let forwarded = args.forwarded_args();
    let result = Runner::new(&cache, settings, signals)
        .exec(&args.command, forwarded, &cwd, &workspace)
        .await;
    cache.close().await?;
    result
}
