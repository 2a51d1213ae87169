//! Cache command - inspect and clear the binary cache

use crate::cache::{BinaryCache, CacheEntry};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::cli::commands::{open_cache, project};
use crate::config::{Config, ConfigManager};
use crate::error::LightrunResult;
use crate::ui::{self, UiContext};
use console::style;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> LightrunResult<i32> {
    if let CacheAction::Path = args.action {
        println!("{}", ConfigManager::cache_dir(config).display());
        return Ok(0);
    }

    let cache = open_cache(config, project(config), false).await?;
    let result = match args.action {
        CacheAction::List { format } => list_entries(&cache, format).await,
        CacheAction::Clear => clear_entries(&cache).await,
        CacheAction::Path => Ok(()),
    };
    cache.close().await?;
    result.map(|()| 0)
}

/// List every cached workspace
async fn list_entries(cache: &BinaryCache, format: OutputFormat) -> LightrunResult<()> {
    let entries = cache.entries().await?;

    match format {
        OutputFormat::Table => print_entry_table(&entries),
        OutputFormat::Json => print_entry_json(&entries)?,
        OutputFormat::Plain => print_entry_plain(&entries),
    }

    Ok(())
}

fn print_entry_table(entries: &[CacheEntry]) {
    if entries.is_empty() {
        println!("No cached workspaces.");
        return;
    }

    println!("{:<60} {:<10} {:<20}", "WORKSPACE", "BINARIES", "COMPUTED");
    println!("{}", style("-".repeat(90)).dim());

    for entry in entries {
        let computed = entry.computed_at.format("%Y-%m-%d %H:%M").to_string();
        println!(
            "{:<60} {:<10} {:<20}",
            entry.key.display(),
            entry.value.len(),
            computed
        );
    }

    println!();
    println!("Total: {} workspace(s)", entries.len());
}

fn print_entry_json(entries: &[CacheEntry]) -> LightrunResult<()> {
    #[derive(serde::Serialize)]
    struct EntryJson<'a> {
        workspace: String,
        computed_at: String,
        binaries: Vec<&'a str>,
    }

    let json_entries: Vec<EntryJson> = entries
        .iter()
        .map(|e| EntryJson {
            workspace: e.key.display().to_string(),
            computed_at: e.computed_at.to_rfc3339(),
            binaries: e.value.keys().map(String::as_str).collect(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json_entries)?);
    Ok(())
}

fn print_entry_plain(entries: &[CacheEntry]) {
    for entry in entries {
        println!("{}", entry.key.display());
    }
}

/// Remove every record
async fn clear_entries(cache: &BinaryCache) -> LightrunResult<()> {
    let ui = UiContext::detect();
    let removed = cache.invalidate_all().await?;

    if removed == 0 {
        ui::step_info(&ui, "Binary cache is already empty");
    } else {
        ui::step_ok(&ui, &format!("Removed {} cache file(s)", removed));
    }
    ui::key_value(&ui, "Location", &cache.path().display().to_string());
    Ok(())
}
