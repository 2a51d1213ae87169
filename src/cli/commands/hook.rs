//! Hook command - lifecycle events from the package manager

use crate::cache::CacheInvalidator;
use crate::cli::args::{HookArgs, HookEvent};
use crate::cli::commands::{open_cache, project};
use crate::config::Config;
use crate::error::LightrunResult;
use crate::ui::{self, UiContext};

/// Execute the hook command
pub async fn execute(args: HookArgs, config: &Config) -> LightrunResult<i32> {
    match args.event {
        HookEvent::AfterInstall => after_install(config).await,
    }
}

async fn after_install(config: &Config) -> LightrunResult<i32> {
    let ui = UiContext::detect();
    ui::step_info(&ui, "Invalidating lightweight cache");

    let cache = open_cache(config, project(config), false).await?;
    let removed = CacheInvalidator::new(&cache)
        .on_dependencies_changed()
        .await?;
    cache.close().await?;

    ui::step_ok(&ui, &format!("Removed {} cache entr{}", removed, plural(removed)));
    Ok(0)
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        "y"
    } else {
        "ies"
    }
}
