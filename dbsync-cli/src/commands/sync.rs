//! Sync command - provision the schema and apply pending scripts

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;

use dbsync_core::{FailurePolicy, ProvisionOutcome, SyncReport, Version};

use super::{get_context, load_config, Outcome};
use crate::output;

pub struct SyncOptions {
    pub to_version: Option<Version>,
    pub dry_run: bool,
    pub continue_on_failure: bool,
    pub json: bool,
}

pub fn run(schema: String, root: Option<PathBuf>, options: SyncOptions) -> Result<Outcome> {
    let mut config = load_config(root)?;
    if options.continue_on_failure {
        config = config.with_failure_policy(FailurePolicy::Continue);
    }
    let ctx = get_context(config)?;

    if options.dry_run {
        return super::status::show_plan(&ctx, &schema, options.to_version.as_ref(), options.json);
    }

    let report = ctx
        .engine
        .sync(&schema, options.to_version.as_ref())
        .with_context(|| format!("Sync of schema '{}' failed", schema))?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(if report.is_success() {
        Outcome::Success
    } else {
        Outcome::ScriptsFailed
    })
}

fn print_report(report: &SyncReport) {
    if report.provisioned == ProvisionOutcome::Created {
        output::success(&format!("Created schema '{}'", report.schema));
    }

    for applied in &report.applied {
        println!("  {} {} {}", "✓".green(), applied.version.to_string().dimmed(), applied.script_id);
    }
    for failure in &report.failures {
        println!(
            "  {} {} {}",
            "✗".red(),
            failure.version.to_string().dimmed(),
            failure.script_id.red()
        );
        println!("    {}", failure.message.dimmed());
    }
    println!();

    if !report.skipped_versions.is_empty() {
        let skipped: Vec<String> = report.skipped_versions.iter().map(|v| v.to_string()).collect();
        output::info(&format!("Beyond target version: {}", skipped.join(", ")));
    }

    if report.is_success() {
        if report.applied.is_empty() {
            output::success(&format!("Schema '{}' is up to date", report.schema));
        } else {
            output::success(&format!(
                "Applied {} to '{}' ({} already applied)",
                output::plural(report.applied.len(), "script"),
                report.schema,
                report.already_applied
            ));
        }
    } else {
        output::error(&format!(
            "{} failed; applied {}",
            output::plural(report.failures.len(), "script"),
            output::plural(report.applied.len(), "script")
        ));
        if report.aborted {
            output::warning("Run stopped at the first failed version folder. Fix the script and run sync again.");
        }
    }
}
