//! Status command - show applied and pending scripts

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;

use dbsync_core::{ScriptState, SyncContext, Version};

use super::{get_context, load_config, Outcome};
use crate::output;

pub fn run(schema: String, root: Option<PathBuf>, to_version: Option<Version>, json: bool) -> Result<Outcome> {
    let ctx = get_context(load_config(root)?)?;
    show_plan(&ctx, &schema, to_version.as_ref(), json)
}

/// Print what a sync would do; shared with `sync --dry-run`
pub fn show_plan(ctx: &SyncContext, schema: &str, to_version: Option<&Version>, json: bool) -> Result<Outcome> {
    let report = ctx
        .status_service
        .plan(schema, to_version)
        .with_context(|| format!("Cannot read status of schema '{}'", schema))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(Outcome::Success);
    }

    println!("{}", format!("Schema {}", report.schema).bold());
    println!();

    if !report.exists {
        output::warning(&format!(
            "Schema does not exist yet; sync will create it and run {}",
            output::plural(report.baseline_scripts, "baseline script")
        ));
        println!();
    }

    if report.folders.is_empty() {
        println!("{}", "No version folders".dimmed());
        return Ok(Outcome::Success);
    }

    println!("{}", output::status_table(&report));
    println!();

    if report.exists {
        let history = ctx.registry.history(schema)?;
        if let Some(last) = history.last() {
            let when = last
                .applied_at
                .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "unknown time".to_string());
            println!(
                "{}",
                format!(
                    "Last applied: {} {} at {} ({} recorded)",
                    last.version,
                    last.script_id,
                    when,
                    history.len()
                )
                .dimmed()
            );
        }
    }

    let pending = report.count(ScriptState::Pending);
    if pending == 0 {
        output::success("Nothing to apply");
    } else {
        output::info(&format!("{} to apply", output::plural(pending, "script")));
    }

    Ok(Outcome::Success)
}
